use crate::errors::Error;
use crate::storage::table::Table;
use std::path::Path;
use uuid::Uuid;

/// One REPL session over one database file.
pub struct Session {
    pub id: Uuid,
    pub table: Table,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(Session {
            id: Uuid::new_v4(),
            table: Table::open(path)?,
        })
    }

    /// Flushes the table. The on-disk image is only guaranteed consistent
    /// after this succeeds.
    pub fn close(&mut self) -> Result<(), Error> {
        self.table.close()
    }
}
