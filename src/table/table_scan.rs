use crate::expr::Expr;
use crate::pages::slotted_page::SlottedPage;
use crate::pages::{PageId, SlotId, PAGE_SIZE};
use crate::record::{Record, RecordId};
use anyhow::Result;

use super::{Table, FIRST_DATA_PAGE};

/// Stateful cursor over a table's live records in (page, slot) order. Each
/// data page is pinned once, at its slot-0 visit, and unpinned when its slots
/// are exhausted. The scan stops once every live tuple has been seen or the
/// file runs out of pages.
pub struct TableScan<'t> {
    table: &'t Table,
    predicate: Expr,
    page: PageId,
    slot: SlotId,
    tuples_seen: u32,
    pinned: bool,
    finished: bool,
}

impl<'t> TableScan<'t> {
    pub(super) fn new(table: &'t Table, predicate: Expr) -> Self {
        Self {
            table,
            predicate,
            page: FIRST_DATA_PAGE,
            slot: 0,
            tuples_seen: 0,
            pinned: false,
            finished: false,
        }
    }

    fn release(&mut self) {
        if self.pinned {
            let _ = self.table.bpm.lock().unpin(&self.page);
            self.pinned = false;
        }
    }

    fn finish(&mut self) {
        self.release();
        self.finished = true;
    }
}

impl Iterator for TableScan<'_> {
    type Item = Result<(RecordId, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record_size = self.table.schema.record_size();
        let capacity = (PAGE_SIZE / record_size) as SlotId;

        loop {
            if self.finished {
                return None;
            }

            if self.tuples_seen >= self.table.tuple_count {
                self.finish();
                return None;
            }

            if self.slot >= capacity {
                self.release();
                self.page += 1;
                self.slot = 0;
            }

            let mut pool = self.table.bpm.lock();

            if !self.pinned {
                // stop instead of pinning past the file, which would grow it
                if self.page as usize >= pool.pages_on_disk() {
                    drop(pool);
                    self.finish();
                    return None;
                }
                if let Err(e) = pool.pin(self.page) {
                    drop(pool);
                    self.finished = true;
                    return Some(Err(e));
                }
                self.pinned = true;
            }

            let frame = match pool.frame(&self.page) {
                Ok(frame) => frame,
                Err(e) => {
                    drop(pool);
                    self.finish();
                    return Some(Err(e));
                }
            };

            let slotted = SlottedPage::new(frame.page_mut(), record_size);
            let slot = self.slot;
            self.slot += 1;

            if !slotted.is_live(slot) {
                continue;
            }

            self.tuples_seen += 1;
            let rid = (self.page, slot);
            let record = Record::from_bytes(rid, slotted.read_record(slot));
            drop(pool);

            match self.predicate.eval_bool(&record, &self.table.schema) {
                Ok(true) => return Some(Ok((rid, record))),
                Ok(false) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Drop for TableScan<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
