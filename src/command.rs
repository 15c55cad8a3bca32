//! Statement execution.

use crate::errors::Error;
use crate::sql::Statement;
use crate::storage::row::Row;
use crate::storage::table::{self, Table};
use tracing::trace;

/// Outcome of a successfully executed statement.
pub enum SqlResult {
    Executed,
    Rows(Vec<Row>),
}

/// Applies a prepared statement to the table.
///
/// Duplicate keys surface as [`Error::DuplicateKey`] for the driver to
/// report at the prompt; structural failures pass through untouched.
pub fn execute(table: &mut Table, statement: Statement) -> Result<SqlResult, Error> {
    match statement {
        Statement::Insert(row) => {
            trace!(id = row.id, "Executing insert");
            table::insert_row(table, &row)?;
            Ok(SqlResult::Executed)
        }
        Statement::Select => {
            trace!("Executing select");
            Ok(SqlResult::Rows(table::select_rows(table)?))
        }
    }
}
