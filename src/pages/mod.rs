pub(crate) mod slotted_page;

pub const PAGE_SIZE: usize = 4096; // 4 KBs
pub const NO_PAGE: PageId = -1;

pub type PageId = i32;
pub type SlotId = u16;

/// A generic page with an underlying array of [`PAGE_SIZE`] bytes.
/// Typed views (slotted pages, headers) are layered on top of it.
#[derive(Debug)]
pub struct Page {
    /// Underlying block of memory of size [`PAGE_SIZE`]
    data: [u8; PAGE_SIZE],
    is_dirty: bool,
    page_id: PageId,
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Page {
            data: [0u8; PAGE_SIZE],
            is_dirty: false,
            page_id: NO_PAGE,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn get_page_id(&self) -> PageId {
        self.page_id
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    pub fn read_bytes(&self, start: usize, end: usize) -> &[u8] {
        &self.data[start..end]
    }

    /// Writing through the page marks it dirty.
    pub fn write_bytes(&mut self, start: usize, end: usize, bytes: &[u8]) {
        self.data[start..end].copy_from_slice(bytes);
        self.is_dirty = true;
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub(crate) fn fill_from(&mut self, bytes: &[u8; PAGE_SIZE]) {
        self.data.copy_from_slice(bytes);
    }

    /// Returns the frame buffer to its never-loaded state.
    pub(crate) fn reset(&mut self) {
        self.data = [0u8; PAGE_SIZE];
        self.is_dirty = false;
        self.page_id = NO_PAGE;
    }
}
