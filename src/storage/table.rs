//! The table handle and the B+ tree operations that mutate it.
//!
//! A table is a pager plus the root page number. The root always lives on
//! page 0: a leaf while everything fits in one node, an internal node after
//! the first split. Splits propagate upward through the `parent` page
//! numbers stored in each node's common header; splitting an internal node
//! itself is not supported and fails loudly.

use super::btree::{
    NodeType, INTERNAL_NODE_MAX_CELLS, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_RIGHT_SPLIT_COUNT,
};
use super::cursor::Cursor;
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Table {
    pub path: PathBuf,
    pub root_page_num: u32,
    pub pager: Pager,
}

impl Table {
    /// Opens (or creates) the database file behind a table handle. A brand
    /// new file gets page 0 initialized as an empty root leaf.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let mut root = pager.get_or_load(0)?;
            root.initialize_leaf()?;
            root.set_root(true);
        }
        info!(path = %path.display(), num_pages = pager.num_pages(), "Opened table");
        Ok(Table {
            path: path.to_path_buf(),
            root_page_num: 0,
            pager,
        })
    }

    /// Flushes every cached page and releases the pager.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.close()
    }
}

/// Inserts a row keyed by its id, rejecting duplicates.
pub fn insert_row(table: &mut Table, row: &Row) -> Result<(), Error> {
    let key = row.id;
    debug!(key, "Inserting a row...");
    let mut cursor = Cursor::find(table, key)?;

    {
        let node = cursor.table.pager.get(cursor.page_num)?;
        let num_cells = node.leaf_num_cells()?;
        if cursor.cell_num < num_cells && node.leaf_key(cursor.cell_num as usize)? == key {
            return Err(err!(DuplicateKey, "Key {} already exists", key));
        }
    }

    leaf_node_insert(&mut cursor, key, row)
}

/// Writes a cell at the cursor position, shifting later cells right. Falls
/// through to a split when the leaf is already full.
fn leaf_node_insert(cursor: &mut Cursor, key: u32, row: &Row) -> Result<(), Error> {
    let num_cells = cursor.table.pager.get(cursor.page_num)?.leaf_num_cells()?;

    if num_cells as usize >= LEAF_NODE_MAX_CELLS {
        warn!(
            page_num = cursor.page_num,
            num_cells, "Leaf node full. Splitting..."
        );
        return leaf_node_split_and_insert(cursor, key, row);
    }

    let mut node = cursor.table.pager.get(cursor.page_num)?;
    if cursor.cell_num < num_cells {
        // Make room for the new cell.
        for i in ((cursor.cell_num + 1)..=num_cells).rev() {
            let prev = node.leaf_cell(i as usize - 1)?.to_vec();
            node.leaf_cell_mut(i as usize)?.copy_from_slice(&prev);
        }
    }
    node.set_leaf_key(cursor.cell_num as usize, key)?;
    row.serialize(node.leaf_value_mut(cursor.cell_num as usize)?)?;
    node.set_leaf_num_cells(num_cells + 1)?;
    Ok(())
}

/// Creates a sibling leaf and divides the thirteen existing cells plus the
/// new one evenly across both, then hands the new leaf to the parent (or
/// mints a new root when the old leaf was the root).
fn leaf_node_split_and_insert(cursor: &mut Cursor, key: u32, row: &Row) -> Result<(), Error> {
    debug!(page_num = cursor.page_num, key, "Splitting leaf node...");
    let new_page_num = cursor.table.pager.get_unused_page_num();
    cursor.table.pager.load(new_page_num)?;

    let old_max;
    let was_root;
    let parent_page_num;
    {
        let mut old_node = cursor.table.pager.get(cursor.page_num)?;
        let mut new_node = cursor.table.pager.get(new_page_num)?;
        old_max = old_node.max_key()?;
        was_root = old_node.is_root();
        parent_page_num = old_node.parent()?;

        new_node.initialize_leaf()?;
        new_node.set_parent(parent_page_num)?;

        // The old leaf's sibling becomes the new leaf, and the new leaf's
        // sibling becomes whatever used to be the old leaf's sibling.
        new_node.set_leaf_next_leaf(old_node.leaf_next_leaf()?)?;
        old_node.set_leaf_next_leaf(new_page_num)?;

        // All existing cells plus the new one, divided evenly between the
        // old (left) and new (right) nodes. Walk from the highest index
        // down so nothing is overwritten before it has been copied out.
        let old = old_node.clone();
        let mut row_image = [0u8; ROW_SIZE];
        row.serialize(&mut row_image)?;

        for i in (0..=LEAF_NODE_MAX_CELLS).rev() {
            let dest_node = if i >= LEAF_NODE_LEFT_SPLIT_COUNT {
                &mut new_node
            } else {
                &mut old_node
            };
            let cell_num = i % LEAF_NODE_LEFT_SPLIT_COUNT;

            if i == cursor.cell_num as usize {
                dest_node.set_leaf_key(cell_num, key)?;
                dest_node.leaf_value_mut(cell_num)?.copy_from_slice(&row_image);
            } else if i > cursor.cell_num as usize {
                dest_node
                    .leaf_cell_mut(cell_num)?
                    .copy_from_slice(old.leaf_cell(i - 1)?);
            } else {
                dest_node
                    .leaf_cell_mut(cell_num)?
                    .copy_from_slice(old.leaf_cell(i)?);
            }
        }

        old_node.set_leaf_num_cells(LEAF_NODE_LEFT_SPLIT_COUNT as u32)?;
        new_node.set_leaf_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32)?;
    }

    if was_root {
        create_new_root(cursor.table, new_page_num)
    } else {
        let new_max = cursor.table.pager.get(cursor.page_num)?.max_key()?;
        {
            let mut parent = cursor.table.pager.get(parent_page_num)?;
            parent.update_internal_key(old_max, new_max)?;
        }
        internal_node_insert(cursor.table, parent_page_num, new_page_num)
    }
}

/// Splitting the root: the old root is copied wholesale to a fresh left
/// child so page 0 can stay the root, then page 0 is rebuilt as an internal
/// node over the two children.
fn create_new_root(table: &mut Table, right_child_page_num: u32) -> Result<(), Error> {
    debug!(right_child_page_num, "Creating a new root");
    let left_child_page_num = table.pager.get_unused_page_num();
    table.pager.load(left_child_page_num)?;

    let mut root = table.pager.get(table.root_page_num)?;
    let mut left_child = table.pager.get(left_child_page_num)?;
    let mut right_child = table.pager.get(right_child_page_num)?;

    left_child.data.copy_from_slice(&root.data);
    left_child.set_root(false);

    root.initialize_internal()?;
    root.set_root(true);
    root.set_internal_num_keys(1)?;
    root.set_internal_child(0, left_child_page_num)?;
    let left_child_max_key = left_child.max_key()?;
    root.set_internal_key(0, left_child_max_key)?;
    root.set_internal_right_child(right_child_page_num)?;

    left_child.set_parent(table.root_page_num)?;
    right_child.set_parent(table.root_page_num)?;
    Ok(())
}

/// Adds a child/key pair to `parent` for a freshly split-off child.
///
/// The rightmost child pointer lives apart from the cell array, so a child
/// whose max key beats the current right child's demotes that right child
/// into the last cell and takes its place. Otherwise later cells shift
/// right to open the slot at the insertion index.
fn internal_node_insert(
    table: &mut Table,
    parent_page_num: u32,
    child_page_num: u32,
) -> Result<(), Error> {
    debug!(parent_page_num, child_page_num, "Inserting child into internal node");

    // Everything touched below must be resident before page locks are taken.
    table.pager.load(parent_page_num)?;
    table.pager.load(child_page_num)?;
    let right_child_page_num = table.pager.get(parent_page_num)?.internal_right_child()?;
    table.pager.load(right_child_page_num)?;

    let mut parent = table.pager.get(parent_page_num)?;
    let child_max_key = table.pager.get(child_page_num)?.max_key()?;
    let index = parent.internal_find_child(child_max_key)?;
    let original_num_keys = parent.internal_num_keys()?;

    if original_num_keys as usize >= INTERNAL_NODE_MAX_CELLS {
        return Err(err!(
            Unimplemented,
            "Need to implement splitting internal node"
        ));
    }

    let right_child_max_key = table.pager.get(right_child_page_num)?.max_key()?;
    parent.set_internal_num_keys(original_num_keys + 1)?;

    if child_max_key > right_child_max_key {
        // The new child becomes the rightmost; the old right child moves
        // into the last cell.
        parent.set_internal_child(original_num_keys as usize, right_child_page_num)?;
        parent.set_internal_key(original_num_keys, right_child_max_key)?;
        parent.set_internal_right_child(child_page_num)?;
    } else {
        // Make room for the new cell.
        let source = parent.clone();
        for i in ((index + 1)..=original_num_keys).rev() {
            parent
                .internal_cell_mut(i as usize)?
                .copy_from_slice(source.internal_cell(i as usize - 1)?);
        }
        parent.set_internal_child(index as usize, child_page_num)?;
        parent.set_internal_key(index, child_max_key)?;
    }
    Ok(())
}

/// Every row in ascending key order, via a cursor walk over the leaf chain.
pub fn select_rows(table: &mut Table) -> Result<Vec<Row>, Error> {
    let mut rows = Vec::new();
    let mut cursor = Cursor::start(table)?;
    let mut buf = Vec::with_capacity(ROW_SIZE);
    while !cursor.end_of_table {
        cursor.read_value(&mut buf)?;
        rows.push(Row::deserialize(&buf)?);
        cursor.advance()?;
    }
    Ok(rows)
}

/// Renders the tree for the `.btree` meta command: pre-order, two spaces
/// per depth level, separator keys printed between subtrees.
pub fn build_tree(table: &mut Table) -> Result<String, Error> {
    let mut out = String::new();
    render_node(table, table.root_page_num, 0, &mut out)?;
    Ok(out)
}

fn render_node(
    table: &mut Table,
    page_num: u32,
    indent: usize,
    out: &mut String,
) -> Result<(), Error> {
    let pad = "  ".repeat(indent);
    let node_type = table.pager.get_or_load(page_num)?.node_type()?;

    match node_type {
        NodeType::Leaf => {
            let keys = {
                let node = table.pager.get(page_num)?;
                let num_cells = node.leaf_num_cells()?;
                let mut keys = Vec::with_capacity(num_cells as usize);
                for i in 0..num_cells {
                    keys.push(node.leaf_key(i as usize)?);
                }
                keys
            };
            out.push_str(&format!("{}- leaf (size {})\n", pad, keys.len()));
            for key in keys {
                out.push_str(&format!("{}  - {}\n", pad, key));
            }
        }
        NodeType::Internal => {
            let (cells, right_child) = {
                let node = table.pager.get(page_num)?;
                let num_keys = node.internal_num_keys()?;
                let mut cells = Vec::with_capacity(num_keys as usize);
                for i in 0..num_keys {
                    cells.push((node.internal_child(i)?, node.internal_key(i)?));
                }
                (cells, node.internal_right_child()?)
            };
            out.push_str(&format!("{}- internal (size {})\n", pad, cells.len()));
            for (child, key) in cells {
                render_node(table, child, indent + 1, out)?;
                out.push_str(&format!("{}  - key {}\n", pad, key));
            }
            render_node(table, right_child, indent + 1, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_table(dir: &TempDir) -> Table {
        Table::open(&dir.path().join("table.db")).unwrap()
    }

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{}", id), &format!("person{}@example.com", id))
    }

    fn ids(table: &mut Table) -> Vec<u32> {
        select_rows(table).unwrap().iter().map(|r| r.id).collect()
    }

    #[test]
    fn selects_inserts_in_key_order() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in [3, 1, 2] {
            insert_row(&mut table, &row(id)).unwrap();
        }
        assert_eq!(ids(&mut table), vec![1, 2, 3]);
    }

    #[test]
    fn rejects_duplicate_keys() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        insert_row(&mut table, &Row::new(1, "a", "a@x")).unwrap();
        match insert_row(&mut table, &Row::new(1, "b", "b@x")) {
            Err(Error::DuplicateKey(_)) => (),
            other => panic!("expected DuplicateKey, got {:?}", other),
        }
        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username(), "a");
    }

    #[test]
    fn fourteenth_insert_splits_the_root_leaf() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=14 {
            insert_row(&mut table, &row(id)).unwrap();
        }

        let root = table.pager.get(0).unwrap();
        assert_eq!(root.node_type().unwrap(), NodeType::Internal);
        assert!(root.is_root());
        assert_eq!(root.internal_num_keys().unwrap(), 1);
        assert_eq!(root.internal_key(0).unwrap(), 7);
        let left = root.internal_child(0).unwrap();
        let right = root.internal_right_child().unwrap();
        drop(root);

        for (page_num, expected) in [(left, 1..=7), (right, 8..=14)] {
            let node = table.pager.get_or_load(page_num).unwrap();
            assert_eq!(node.node_type().unwrap(), NodeType::Leaf);
            assert!(!node.is_root());
            assert_eq!(node.parent().unwrap(), 0);
            let keys: Vec<u32> = (0..node.leaf_num_cells().unwrap())
                .map(|i| node.leaf_key(i as usize).unwrap())
                .collect();
            assert_eq!(keys, expected.collect::<Vec<u32>>());
        }
    }

    #[test]
    fn leaf_chain_enumerates_every_key_in_order() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        // Reverse order stresses both split arms and the shift path.
        for id in (1..=21).rev() {
            insert_row(&mut table, &row(id)).unwrap();
        }
        assert_eq!(ids(&mut table), (1..=21).collect::<Vec<u32>>());

        // Walk the sibling links directly: every leaf strictly ascending,
        // no key missing across the chain.
        let mut page_num = {
            let root = table.pager.get(0).unwrap();
            assert_eq!(root.node_type().unwrap(), NodeType::Internal);
            root.internal_child(0).unwrap()
        };
        let mut chained = Vec::new();
        loop {
            let next = {
                let node = table.pager.get_or_load(page_num).unwrap();
                let num_cells = node.leaf_num_cells().unwrap();
                for i in 0..num_cells {
                    chained.push(node.leaf_key(i as usize).unwrap());
                }
                node.leaf_next_leaf().unwrap()
            };
            if next == 0 {
                break;
            }
            page_num = next;
        }
        assert_eq!(chained, (1..=21).collect::<Vec<u32>>());
    }

    #[test]
    fn internal_keys_track_child_maxima() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=21 {
            insert_row(&mut table, &row(id)).unwrap();
        }

        let (cells, right_child) = {
            let root = table.pager.get(0).unwrap();
            let num_keys = root.internal_num_keys().unwrap();
            assert!(num_keys >= 2);
            let mut cells = Vec::new();
            for i in 0..num_keys {
                cells.push((root.internal_key(i).unwrap(), root.internal_child(i).unwrap()));
            }
            (cells, root.internal_right_child().unwrap())
        };

        let mut previous = None;
        for (key, child) in &cells {
            if let Some(prev) = previous {
                assert!(*key > prev, "separator keys must be strictly ascending");
            }
            previous = Some(*key);
            let child_max = table.pager.get_or_load(*child).unwrap().max_key().unwrap();
            assert_eq!(*key, child_max);
        }

        // The right child holds keys greater than every separator.
        let right_min = table
            .pager
            .get_or_load(right_child)
            .unwrap()
            .leaf_key(0)
            .unwrap();
        assert!(right_min > cells.last().unwrap().0);
    }

    #[test]
    fn rows_survive_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.db");
        {
            let mut table = Table::open(&path).unwrap();
            for id in [5, 3, 9, 1] {
                insert_row(&mut table, &row(id)).unwrap();
            }
            table.close().unwrap();
        }

        let mut table = Table::open(&path).unwrap();
        assert_eq!(ids(&mut table), vec![1, 3, 5, 9]);
    }

    #[test]
    fn split_tree_survives_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.db");
        {
            let mut table = Table::open(&path).unwrap();
            for id in 1..=15 {
                insert_row(&mut table, &row(id)).unwrap();
            }
            table.close().unwrap();
        }

        let mut table = Table::open(&path).unwrap();
        assert_eq!(ids(&mut table), (1..=15).collect::<Vec<u32>>());
        // Inserting after the reopen still routes through the parent.
        insert_row(&mut table, &row(16)).unwrap();
        assert_eq!(ids(&mut table).last(), Some(&16));
    }

    #[test]
    fn renders_a_single_leaf_tree() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in [3, 1, 2] {
            insert_row(&mut table, &row(id)).unwrap();
        }
        assert_eq!(
            build_tree(&mut table).unwrap(),
            "- leaf (size 3)\n  - 1\n  - 2\n  - 3\n"
        );
    }

    #[test]
    fn renders_a_two_level_tree() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=14 {
            insert_row(&mut table, &row(id)).unwrap();
        }

        let mut expected = String::from("- internal (size 1)\n");
        expected.push_str("  - leaf (size 7)\n");
        for id in 1..=7 {
            expected.push_str(&format!("    - {}\n", id));
        }
        expected.push_str("  - key 7\n");
        expected.push_str("  - leaf (size 7)\n");
        for id in 8..=14 {
            expected.push_str(&format!("    - {}\n", id));
        }
        assert_eq!(build_tree(&mut table).unwrap(), expected);
    }

    #[test]
    fn overflowing_the_internal_node_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        // Sequential inserts demote the right child on every split, giving
        // the root one new cell per 7 rows. The root holds 3 cells plus the
        // right child; the split needing a 4th cell must be refused.
        let mut result = Ok(());
        for id in 1..=200 {
            result = insert_row(&mut table, &row(id));
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(Error::Unimplemented(_)) => (),
            other => panic!("expected Unimplemented, got {:?}", other),
        }
    }
}
