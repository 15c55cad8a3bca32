//! Cursor-based navigation over the table's leaf nodes.
//!
//! A cursor always names a position inside a leaf. `cell_num == num_cells`
//! is a legal position meaning "just past the last cell of this leaf".

use super::btree::NodeType;
use super::table::Table;
use crate::errors::Error;

pub struct Cursor<'a> {
    /// The table being navigated; borrowed for the cursor's lifetime.
    pub table: &'a mut Table,
    pub page_num: u32,
    pub cell_num: u32,
    /// Set once the cursor advances past the rightmost leaf.
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at `key`, descending from the root.
    ///
    /// The resulting leaf position either holds `key`, or is the smallest
    /// index whose key is greater, or sits one past the last cell when `key`
    /// is larger than everything in the tree.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let mut page_num = table.root_page_num;
        loop {
            let node_type = table.pager.get_or_load(page_num)?.node_type()?;
            match node_type {
                NodeType::Leaf => return Cursor::leaf_find(table, page_num, key),
                NodeType::Internal => {
                    page_num = Self::internal_find(table, page_num, key)?;
                }
            }
        }
    }

    /// A cursor at the first row of the table, flagged empty when the
    /// leftmost leaf holds no cells.
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        let mut cursor = Cursor::find(table, 0)?;
        let num_cells = cursor
            .table
            .pager
            .get_or_load(cursor.page_num)?
            .leaf_num_cells()?;
        cursor.end_of_table = num_cells == 0;
        Ok(cursor)
    }

    fn internal_find(table: &mut Table, page_num: u32, key: u32) -> Result<u32, Error> {
        let node = table.pager.get_or_load(page_num)?;
        let child_index = node.internal_find_child(key)?;
        node.internal_child(child_index)
    }

    /// Binary search within one leaf. An exact hit returns its index;
    /// otherwise the search collapses onto the insertion position.
    pub fn leaf_find(table: &'a mut Table, page_num: u32, key: u32) -> Result<Self, Error> {
        let cell_num = {
            let node = table.pager.get_or_load(page_num)?;
            let mut min_index = 0;
            let mut one_past_max_index = node.leaf_num_cells()?;
            let mut exact = None;

            while one_past_max_index != min_index {
                let index = (min_index + one_past_max_index) / 2;
                let key_at_index = node.leaf_key(index as usize)?;
                if key == key_at_index {
                    exact = Some(index);
                    break;
                }
                if key < key_at_index {
                    one_past_max_index = index;
                } else {
                    min_index = index + 1;
                }
            }

            exact.unwrap_or(min_index)
        };

        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    /// Steps to the next cell, hopping to the sibling leaf when the current
    /// one runs out. A sibling link of 0 marks the end of the table.
    pub fn advance(&mut self) -> Result<(), Error> {
        let (num_cells, next_leaf) = {
            let node = self.table.pager.get_or_load(self.page_num)?;
            (node.leaf_num_cells()?, node.leaf_next_leaf()?)
        };

        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }

    /// Copies the row image at the current position into `buf`.
    pub fn read_value(&mut self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let node = self.table.pager.get_or_load(self.page_num)?;
        let value = node.leaf_value(self.cell_num as usize)?;
        buf.clear();
        buf.extend_from_slice(value);
        Ok(())
    }
}
