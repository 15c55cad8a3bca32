//! Fixed-size page cache over the database file.
//!
//! The pager owns every page buffer. Pages are faulted in lazily on first
//! access and written back only on flush, so between inserts the file may
//! lag behind memory. A clean close flushes everything.

use super::btree::Node;
use crate::errors::Error;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, trace};

/// Page size 4 kilobytes because it’s the same size as a page used in
/// the virtual memory systems of most computer architectures.
pub const PAGE_SIZE: usize = 4096;

pub const TABLE_MAX_PAGES: usize = 100;

pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: u32,
    pages: heapless::Vec<Option<Arc<Mutex<Node>>>, TABLE_MAX_PAGES>,
}

impl Pager {
    /// Opens the database file, creating it when absent. The file must hold
    /// a whole number of pages.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corrupt,
                "Db file holds a partial page (length={})",
                file_length
            ));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!(file_length, num_pages, "Opened database file");
        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages: heapless::Vec::new(),
        })
    }

    /// Faults the page into the cache if it is not already resident.
    ///
    /// Pages present on disk are read in (a short read zero-fills the
    /// remainder); pages past the end of the file start out blank and only
    /// reach disk on flush. Requesting a page at or past the end of the
    /// file grows `num_pages`.
    pub fn load(&mut self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(err!(
                Bounds,
                "Tried to fetch page number out of bounds: {} >= {}",
                page_num,
                TABLE_MAX_PAGES
            ));
        }
        while self.pages.len() <= page_num as usize {
            if self.pages.push(None).is_err() {
                return Err(err!(Storage, "Page cache overflow at page {}", page_num));
            }
        }
        if self.pages[page_num as usize].is_some() {
            return Ok(());
        }

        let mut buf = [0u8; PAGE_SIZE];
        let pages_on_disk = (self.file_length / PAGE_SIZE as u64) as u32;
        if page_num < pages_on_disk {
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            let mut filled = 0;
            while filled < PAGE_SIZE {
                let n = self.file.read(&mut buf[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            trace!(page_num, bytes = filled, "Read page from disk");
        }
        self.pages[page_num as usize] = Some(Arc::new(Mutex::new(Node::new(&buf))));
        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(())
    }

    /// A resident page. Fault it in first with [`Pager::load`] or use
    /// [`Pager::get_or_load`].
    pub fn get(&self, page_num: u32) -> Result<MutexGuard<Node>, Error> {
        let slot = self
            .pages
            .get(page_num as usize)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| err!(Storage, "Memory page {} not found.", page_num))?;
        slot.try_lock()
            .map_err(|_| err!(Lock, "Failed to lock page {}", page_num))
    }

    pub fn get_or_load(&mut self, page_num: u32) -> Result<MutexGuard<Node>, Error> {
        self.load(page_num)?;
        self.get(page_num)
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// In a database with N pages, numbers 0 through N-1 are allocated, so
    /// page N is always free. There is no free list; deleted pages are never
    /// reclaimed.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Writes one resident page back to its slot in the file.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        let slot = self
            .pages
            .get(page_num as usize)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| err!(Storage, "Tried to flush a page missing from the cache ({})", page_num))?;
        let node = slot
            .try_lock()
            .map_err(|_| err!(Lock, "Failed to lock page {}", page_num))?;
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&node.data)?;
        drop(node);
        self.file_length = self
            .file_length
            .max((page_num as u64 + 1) * PAGE_SIZE as u64);
        trace!(page_num, "Flushed page");
        Ok(())
    }

    /// Flushes every resident page and releases the cache. The descriptor
    /// closes when the pager is dropped.
    pub fn close(&mut self) -> Result<(), Error> {
        for i in 0..self.num_pages {
            let resident = self
                .pages
                .get(i as usize)
                .map_or(false, |slot| slot.is_some());
            if resident {
                self.flush(i)?;
            }
        }
        self.pages.clear();
        info!(num_pages = self.num_pages, "Flushed and released pages");
        Ok(())
    }
}
