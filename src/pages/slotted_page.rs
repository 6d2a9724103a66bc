use super::{Page, SlotId, PAGE_SIZE};

pub const TOMBSTONE_LIVE: u8 = b'+';
pub const TOMBSTONE_DELETED: u8 = b'-';

/// View of a data page as `PAGE_SIZE / record_size` fixed-size slots. Each
/// slot is one tombstone byte followed by the attribute bytes; a tombstone
/// that is neither `'+'` nor `'-'` marks a slot that was never used.
pub struct SlottedPage<'p> {
    page: &'p mut Page,
    record_size: usize,
}

impl<'p> SlottedPage<'p> {
    pub fn new(page: &'p mut Page, record_size: usize) -> Self {
        assert!(record_size > 1 && record_size <= PAGE_SIZE);
        Self { page, record_size }
    }

    pub fn capacity(&self) -> usize {
        PAGE_SIZE / self.record_size
    }

    fn offset(&self, slot: SlotId) -> usize {
        slot as usize * self.record_size
    }

    pub fn tombstone(&self, slot: SlotId) -> u8 {
        self.page.read_bytes(self.offset(slot), self.offset(slot) + 1)[0]
    }

    pub fn is_live(&self, slot: SlotId) -> bool {
        self.tombstone(slot) == TOMBSTONE_LIVE
    }

    /// First slot not holding a live record; `None` when the page is full.
    pub fn find_free_slot(&self) -> Option<SlotId> {
        (0..self.capacity() as SlotId).find(|slot| !self.is_live(*slot))
    }

    /// Stamps the tombstone live and lays the attribute bytes behind it.
    pub fn write_record(&mut self, slot: SlotId, attrs: &[u8]) {
        debug_assert_eq!(attrs.len(), self.record_size - 1);
        let start = self.offset(slot);
        self.page.write_bytes(start, start + 1, &[TOMBSTONE_LIVE]);
        self.page.write_bytes(start + 1, start + self.record_size, attrs);
    }

    /// Overwrites the attribute bytes, leaving the tombstone untouched.
    pub fn overwrite_attrs(&mut self, slot: SlotId, attrs: &[u8]) {
        debug_assert_eq!(attrs.len(), self.record_size - 1);
        let start = self.offset(slot);
        self.page.write_bytes(start + 1, start + self.record_size, attrs);
    }

    pub fn mark_deleted(&mut self, slot: SlotId) {
        let start = self.offset(slot);
        self.page.write_bytes(start, start + 1, &[TOMBSTONE_DELETED]);
    }

    /// Full record bytes, tombstone included.
    pub fn read_record(&self, slot: SlotId) -> &[u8] {
        let start = self.offset(slot);
        self.page.read_bytes(start, start + self.record_size)
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        (0..self.capacity() as SlotId)
            .filter(|slot| self.is_live(*slot))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_lifecycle() {
        let mut page = Page::new();
        let mut slotted = SlottedPage::new(&mut page, 9);

        assert_eq!(slotted.capacity(), PAGE_SIZE / 9);
        assert_eq!(slotted.find_free_slot(), Some(0));

        slotted.write_record(0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(slotted.is_live(0));
        assert_eq!(slotted.find_free_slot(), Some(1));
        assert_eq!(slotted.read_record(0), [b'+', 1, 2, 3, 4, 5, 6, 7, 8]);

        slotted.mark_deleted(0);
        assert!(!slotted.is_live(0));
        assert_eq!(slotted.tombstone(0), TOMBSTONE_DELETED);
        // deleted slots are reusable
        assert_eq!(slotted.find_free_slot(), Some(0));
        assert_eq!(slotted.live_count(), 0);
    }

    #[test]
    fn test_full_page_has_no_free_slot() {
        let mut page = Page::new();
        let mut slotted = SlottedPage::new(&mut page, 1024);

        for slot in 0..4 {
            slotted.write_record(slot, &[0xab; 1023]);
        }
        assert_eq!(slotted.find_free_slot(), None);
    }

    #[test]
    fn test_writes_mark_page_dirty() {
        let mut page = Page::new();
        assert!(!page.is_dirty());

        SlottedPage::new(&mut page, 16).write_record(3, &[7; 15]);
        assert!(page.is_dirty());
    }
}
