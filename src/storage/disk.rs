use std::collections::HashMap;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

use super::page::{PageId, PAGE_SIZE};

/// A page-granular disk engine: pages are fixed-size byte blocks
/// addressed by their page id, and reads and writes move whole pages.
/// Both calls are blocking; the buffer pool issues them while holding
/// its latch.
///
/// The DiskManager trait is designed as `trait object` compatible so
/// the buffer pool can hold a `Box<dyn DiskManager>` and engines can
/// be swapped at configuration time.
pub trait DiskManager: Debug + Send + Sync {
    /// Read the page into the caller-provided PAGE_SIZE buffer.
    /// A page that was never written reads back as all zeroes.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Persist the PAGE_SIZE page image.
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Note that the page id is no longer in use. Page ids are never
    /// reused, so engines may treat this as a hint.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;

    /// Force written pages down to the storage medium.
    fn sync(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub enum DiskType {
    Memory,
    File,
}

pub fn new_disk_manager(typ: DiskType, path: &str) -> Result<Box<dyn DiskManager>> {
    match typ {
        DiskType::Memory => Ok(Box::new(Memory::new())),
        DiskType::File => Ok(Box::new(FileDiskManager::open(path)?)),
    }
}

/// In-memory disk engine keeping page images in a map. Mostly for tests.
#[derive(Debug)]
pub struct Memory {
    pages: HashMap<PageId, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { pages: HashMap::new() }
    }
}

impl DiskManager for Memory {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        match self.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.pages.insert(page_id, data.to_vec());
        Ok(())
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.pages.remove(&page_id);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

/// File-backed disk engine. A page lives at offset `page_id * PAGE_SIZE`
/// in a single data file; ids are never reused so deallocation leaves a
/// hole behind.
#[derive(Debug)]
pub struct FileDiskManager {
    file: File,
}

impl FileDiskManager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileDiskManager> {
        let file =
            OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(FileDiskManager { file })
    }

    fn offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let len = self.file.metadata()?.len();
        let offset = Self::offset(page_id);
        if offset >= len {
            // page was never written, hand back a zeroed image
            buf.fill(0);
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset))?;
        // the page at the tail of the file may be short of PAGE_SIZE,
        // read what is there and zero the rest.
        let mut read = 0;
        while read < buf.len() {
            let n = self.file.read(&mut buf[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        buf[read..].fill(0);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn deallocate_page(&mut self, _page_id: PageId) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
