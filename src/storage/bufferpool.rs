use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};

use super::disk::{new_disk_manager, DiskManager};
use super::page::{FrameId, Page, PageId, INVALID_PAGE_ID};
use super::replacer::{Replacer, SyncLRUKReplacer};
use super::wal::LogManager;

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows a DBMS to support databases that are
/// larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts in the system.
/// For example, the system asks the buffer pool for a page using its unique
/// identifier (page_id) and it does not know whether that page is already in
/// memory or whether the system has to retrieve it from disk.
struct BufferPool {
    pool_size: usize,
    /// Disk engine the pages are persisted to.
    disk: Box<dyn DiskManager>,
    /// Array of buffer pool pages. The array index is the FrameId,
    /// i.e. the FrameId is in range: [0, pool_size).
    pages: Vec<Arc<Page>>,
    /// Page table for keeping track of resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// Frames that currently hold no page, reused front-first.
    free_list: VecDeque<FrameId>,
    /// Replacer to find unpinned frames for replacement.
    replacer: Arc<dyn Replacer>,
    /// The next page id to be allocated. Monotonic, ids are not reused.
    /// TODO: persist this info later.
    next_page_id: PageId,
    /// Held for future WAL integration, never driven by this core.
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPool {
    fn new(
        disk: Box<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        let page_table = HashMap::new();
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(replacer_k, pool_size));
        for i in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every frame is in the free list
            free_list.push_back(i);
        }
        info!("buffer pool initialized: {} frames, k={}", pool_size, replacer_k);
        BufferPool {
            pool_size,
            disk,
            pages,
            page_table,
            free_list,
            replacer,
            next_page_id: 0,
            log_manager,
        }
    }

    /// Pick a vacant frame, preferring the front of the free list and falling
    /// back to the replacer. A frame handed out by the replacer has its
    /// resident page written back if dirty, is unlinked from the page table
    /// and reset, so the caller always receives a vacant, zeroed slot.
    ///
    /// Returns NoAvailableFrame if the free list is empty and every tracked
    /// frame is pinned.
    fn acquire_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Err(Error::NoAvailableFrame),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        debug_assert_eq!(0, guard.pin_count, "evicted frame must not be pinned");

        if guard.is_dirty {
            debug!("evicting frame {}: writing back dirty page {}", frame_id, guard.id);
            self.disk.write_page(guard.id, &guard.data)?;
        }
        self.page_table.remove(&guard.id);
        guard.reset();

        Ok(frame_id)
    }

    /// Create a new page in the buffer pool, or return NoAvailableFrame if all
    /// frames are currently in use and not evictable (in other words, pinned).
    ///
    /// Picks the replacement frame from either the free list or the replacer
    /// (always from the free list first), then allocates a new page id. The
    /// new page comes back pinned once with a zeroed image, and its frame is
    /// registered with the replacer as non-evictable.
    fn new_page(&mut self) -> Result<Arc<Page>> {
        let frame_id = self.acquire_frame()?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        debug_assert_eq!(INVALID_PAGE_ID, guard.id, "acquired frame must be vacant");

        let page_id = self.allocate_page();
        guard.id = page_id;
        guard.pin_count = 1;
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Fetch the requested page with the given page id from the buffer pool,
    /// or return NoAvailableFrame if the page has to come from disk and all
    /// frames are currently in use and not evictable.
    ///
    /// First searches for page_id in the page table; on a hit the pin count
    /// goes up and the access is recorded. On a miss a replacement frame is
    /// picked exactly as in new_page and the page image is read from disk.
    fn fetch_page(&mut self, page_id: PageId) -> Result<Arc<Page>> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            // the page frame is in the buffer pool already, increase the
            // pin count, record the frame access and return it.
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            guard.pin_count += 1;
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);

            drop(guard);
            return Ok(page);
        }

        let frame_id = self.acquire_frame()?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        guard.id = page_id;
        guard.pin_count = 1;
        self.disk.read_page(page_id, &mut guard.data)?;
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Unpin the target page. Returns false if page_id is not in the buffer
    /// pool or its pin count is already 0.
    ///
    /// Decrements the pin count of the page. When the pin count reaches 0 the
    /// frame becomes evictable by the replacer. The dirty flag is sticky: an
    /// unpin with is_dirty=false never clears an earlier dirty mark, only a
    /// write-back or a frame reset does.
    fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let mut guard = self.pages[frame_id].write()?;
        if guard.pin_count == 0 {
            return Ok(false);
        }
        guard.pin_count -= 1;
        if is_dirty {
            guard.is_dirty = true;
        }
        if guard.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        Ok(true)
    }

    /// Flush the target page to disk regardless of the dirty flag and the
    /// pin count, and unset the dirty flag of the page after flushing.
    ///
    /// Returns false if the page id is invalid or the page is not resident,
    /// true otherwise.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let mut guard = self.pages[frame_id].write()?;

        self.disk.write_page(guard.id, &guard.data)?;
        guard.is_dirty = false;

        Ok(true)
    }

    /// Flush all resident pages in the buffer pool to disk.
    fn flush_all_pages(&mut self) -> Result<()> {
        debug!("flushing all {} resident pages", self.page_table.len());
        for &frame_id in self.page_table.values() {
            let mut guard = self.pages[frame_id].write()?;
            self.disk.write_page(guard.id, &guard.data)?;
            guard.is_dirty = false;
        }
        self.disk.sync()?;
        Ok(())
    }

    /// Delete a page from the buffer pool. If the page is not resident, do
    /// nothing and return true. If the page is pinned, refuse and return
    /// false.
    ///
    /// After unlinking the page from the page table the frame stops being
    /// tracked by the replacer, goes back on the free list with a reset
    /// image, and the disk engine is notified of the deallocation.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(true),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            return Ok(false);
        }

        self.page_table.remove(&page_id);
        // the pin count reached 0, so the unpin made the frame evictable
        // and the replacer will accept the removal
        debug_assert!(self.replacer.is_evictable(frame_id));
        self.replacer.remove(frame_id);
        guard.reset();
        self.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id)?;

        Ok(true)
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }
}

/// Buffer pool manager wraps the buffer pool with a mutex for concurrent
/// access, basically all the heavy lifting happens in the buffer pool. The
/// latch is held for the whole duration of every operation, including the
/// disk I/O it may issue; when the replacer latch is also needed it is
/// always taken under this one.
#[derive(Clone)]
pub struct BufferPoolManager {
    /// Hold the actual buffer pool protected by a mutex latch.
    /// TODO: we need more granular concurrency control instead
    ///  of having this mutex latch all the operations.
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(disk: Box<dyn DiskManager>, pool_size: usize, replacer_k: usize) -> Self {
        let inner = BufferPool::new(disk, pool_size, replacer_k, None);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Like new, but keeps a reference to the log manager so upper layers
    /// can wire the WAL through the pool later.
    pub fn with_log_manager(
        disk: Box<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        log_manager: Arc<LogManager>,
    ) -> Self {
        let inner = BufferPool::new(disk, pool_size, replacer_k, Some(log_manager));
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Build a pool from the runtime configuration, constructing the disk
    /// engine through the factory.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let disk = new_disk_manager(cfg.disk_type, &cfg.path)?;
        Ok(BufferPoolManager::new(disk, cfg.pool_size, cfg.replacer_k))
    }

    /// Create a new page in the buffer pool. The page comes back pinned once;
    /// the caller owns the unpin.
    pub fn new_page(&self) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.new_page()
    }

    /// Fetch the requested page with the given page id from the buffer pool,
    /// reading it from disk if it is not resident. The page comes back with
    /// one more pin; the caller owns the unpin.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.fetch_page(page_id)
    }

    /// Unpin the target page from the buffer pool. Returns false if page_id
    /// is not in the buffer pool or its pin count is already 0. A true
    /// is_dirty marks the page dirty; false leaves an earlier mark in place.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.unpin_page(page_id, is_dirty)
    }

    /// Flush the target page to disk regardless of the dirty flag.
    /// Unset the dirty flag of the page after flushing.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Flush all the resident pages in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from the buffer pool. If the page is not resident, do
    /// nothing and return true. If the page is pinned and cannot be deleted,
    /// return false immediately.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.delete_page(page_id)
    }

    /// Number of frames the pool was built with.
    pub fn pool_size(&self) -> Result<usize> {
        let inner = self.inner.lock()?;
        Ok(inner.pool_size)
    }

    /// The log manager wired into the pool, if any.
    pub fn log_manager(&self) -> Result<Option<Arc<LogManager>>> {
        let inner = self.inner.lock()?;
        Ok(inner.log_manager.clone())
    }
}
