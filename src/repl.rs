//! The read-eval-print loop.
//!
//! Reads one trimmed command per prompt, dispatches dot commands to the
//! meta handler and everything else through the preparer and executor, and
//! prints exactly one outcome per input line. User-recoverable failures are
//! answered at the prompt; structural failures bubble out and end the
//! session.

pub mod history;

use crate::command::{self, SqlResult};
use crate::errors::Error;
use crate::meta::{self, MetaResult};
use crate::session::Session;
use crate::sql;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{info, trace};

pub fn start(path: &Path) -> Result<(), Error> {
    let mut session = Session::open(path)?;
    info!(
        session_id = %session.id,
        path = %path.display(),
        "Starting REPL session..."
    );

    let history_path = history::default_path();
    if let Some(p) = &history_path {
        if let Err(e) = history::ensure_history_file(p) {
            trace!("Failed to prepare history file: {}", e);
        }
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("db > ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // End of input behaves like .exit: flush and leave cleanly.
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if let Some(p) = &history_path {
            if let Err(e) = history::append_history(input, p) {
                trace!("Failed to append history: {}", e);
            }
        }

        if input.starts_with('.') {
            match meta::execute(input, &mut session.table)? {
                MetaResult::Exit => break,
                MetaResult::Success => {}
                MetaResult::Unrecognized => {
                    println!("Unrecognized command '{}'", input);
                }
            }
            continue;
        }

        let statement = match sql::prepare(input) {
            Ok(statement) => statement,
            Err(Error::Syntax(_)) => {
                println!("Syntax error. Could not parse statement.");
                continue;
            }
            Err(Error::TooLong(_)) => {
                println!("String is too long.");
                continue;
            }
            Err(Error::NegativeId(_)) => {
                println!("ID cannot be negative.");
                continue;
            }
            Err(Error::Unrecognized(_)) => {
                println!("Unrecognized keyword at start of '{}'", input);
                continue;
            }
            Err(e) => return Err(e),
        };

        match command::execute(&mut session.table, statement) {
            Ok(SqlResult::Executed) => println!("Executed."),
            Ok(SqlResult::Rows(rows)) => {
                for row in rows {
                    println!("{}", row);
                }
                println!("Executed.");
            }
            Err(Error::DuplicateKey(_)) => println!("Error: Key already exists."),
            Err(Error::TableFull(_)) => println!("Error: Table full."),
            Err(e) => return Err(e),
        }
    }

    session.close()?;
    info!("Closed session.");
    Ok(())
}
