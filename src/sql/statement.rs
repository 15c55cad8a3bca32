use crate::storage::row::Row;

/// A statement validated and bound by the preparer, ready for execution.
#[derive(Debug, Clone)]
pub enum Statement {
    /// Insert carries the fully built row so execution never re-parses.
    Insert(Row),
    Select,
}
