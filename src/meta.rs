//! Dot-prefixed meta commands.

use crate::errors::Error;
use crate::storage::btree;
use crate::storage::row::ROW_SIZE;
use crate::storage::table::{self, Table};

pub enum MetaResult {
    /// The driver should close the session and leave.
    Exit,
    Success,
    Unrecognized,
}

/// Runs a meta command against the open table. Inspection output goes
/// straight to stdout.
pub fn execute(input: &str, table: &mut Table) -> Result<MetaResult, Error> {
    match input {
        ".exit" => Ok(MetaResult::Exit),
        ".btree" => {
            println!("Tree:");
            print!("{}", table::build_tree(table)?);
            Ok(MetaResult::Success)
        }
        ".constants" => {
            println!("Constants:");
            println!("ROW_SIZE: {}", ROW_SIZE);
            println!("COMMON_NODE_HEADER_SIZE: {}", btree::COMMON_NODE_HEADER_SIZE);
            println!("LEAF_NODE_HEADER_SIZE: {}", btree::LEAF_NODE_HEADER_SIZE);
            println!("LEAF_NODE_CELL_SIZE: {}", btree::LEAF_NODE_CELL_SIZE);
            println!(
                "LEAF_NODE_SPACE_FOR_CELLS: {}",
                btree::LEAF_NODE_SPACE_FOR_CELLS
            );
            println!("LEAF_NODE_MAX_CELLS: {}", btree::LEAF_NODE_MAX_CELLS);
            Ok(MetaResult::Success)
        }
        _ => Ok(MetaResult::Unrecognized),
    }
}
