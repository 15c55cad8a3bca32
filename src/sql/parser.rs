//! Statement preparer.
//!
//! Two statements exist: `insert <id> <username> <email>` and `select`.
//! Preparation validates shape and bounds and produces a typed error for
//! everything else, so the driver can answer at the prompt and move on.

use super::statement::Statement;
use crate::errors::Error;
use crate::storage::row::{Row, COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE};
use once_cell::sync::Lazy;
use regex::Regex;

static INSERT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^insert\s+(-?\d+)\s+(\S+)\s+(\S+)\s*$").unwrap());

/// Turns a trimmed input line into a prepared statement.
pub fn prepare(input: &str) -> Result<Statement, Error> {
    if input.starts_with("select") {
        return Ok(Statement::Select);
    }
    if input.starts_with("insert") {
        return prepare_insert(input);
    }
    Err(err!(Unrecognized, "Unrecognized keyword at start of '{}'", input))
}

fn prepare_insert(input: &str) -> Result<Statement, Error> {
    let caps = INSERT_RE
        .captures(input)
        .ok_or_else(|| err!(Syntax, "Could not parse statement '{}'", input))?;

    // Parsed signed so a leading minus is reported as a negative id rather
    // than a syntax error.
    let id: i64 = caps[1]
        .parse()
        .map_err(|_| err!(Syntax, "Invalid id '{}'", &caps[1]))?;
    if id < 0 {
        return Err(err!(NegativeId, "ID cannot be negative ({})", id));
    }
    let id = u32::try_from(id).map_err(|_| err!(Syntax, "Id {} out of range", id))?;

    let username = &caps[2];
    let email = &caps[3];
    if username.len() > COLUMN_USERNAME_SIZE {
        return Err(err!(TooLong, "Username exceeds {} bytes", COLUMN_USERNAME_SIZE));
    }
    if email.len() > COLUMN_EMAIL_SIZE {
        return Err(err!(TooLong, "Email exceeds {} bytes", COLUMN_EMAIL_SIZE));
    }

    Ok(Statement::Insert(Row::new(id, username, email)))
}
