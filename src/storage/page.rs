use std::ops::Deref;
use std::sync::RwLock;

/// Identifier of a page on disk. Real pages are non-negative.
pub type PageId = i64;

/// Index of a frame slot in the buffer pool, in range [0, pool_size).
pub type FrameId = usize;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Reserved page id that never names a real page.
pub const INVALID_PAGE_ID: PageId = -1;

/// The actual page frame content: in-memory metadata like the dirty
/// bit and pin count, plus the page image itself. The image is always
/// exactly PAGE_SIZE bytes long.
pub struct PageData {
    pub id: PageId,
    pub data: Vec<u8>,
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl PageData {
    fn new() -> Self {
        Self { id: INVALID_PAGE_ID, data: vec![0; PAGE_SIZE], is_dirty: false, pin_count: 0 }
    }

    /// Restore the vacant state: no page, clean, unpinned, zeroed image.
    pub fn reset(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page act as the container of the actual page data for
/// providing concurrent access protection.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate a page frame in memory with the given PAGE_SIZE and init
    /// the metadata accordingly.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
