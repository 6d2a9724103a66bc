pub mod table_scan;

use crate::buffer_pool::{ArcBufferPool, BufferPool, Strategy};
use crate::disk_manager::DiskManager;
use crate::errors::Error;
use crate::expr::Expr;
use crate::pages::slotted_page::SlottedPage;
use crate::pages::{Page, PageId, PAGE_SIZE};
use crate::record::schema::{Attribute, Schema, ATTR_NAME_LEN};
use crate::record::{Record, RecordId};
use crate::types::DataType;
use anyhow::{bail, ensure, Result};
use std::path::Path;
use table_scan::TableScan;

pub const HEADER_PAGE: PageId = 0;
pub const FIRST_DATA_PAGE: PageId = 1;

/// A heap table of fixed-length records over its own buffer pool. The table
/// name doubles as the page file path; page 0 holds the header, pages 1..
/// hold slotted data.
#[derive(Debug)]
pub struct Table {
    name: String,
    schema: Schema,
    bpm: ArcBufferPool,
    tuple_count: u32,
    /// Hint for where inserts start probing, not an invariant.
    next_free_page: PageId,
}

impl Table {
    pub fn create(name: &str, schema: &Schema, pool_size: usize, strategy: Strategy) -> Result<Self> {
        ensure!(!Path::new(name).exists(), Error::TableExists(name.to_string()));
        ensure!(
            schema.record_size() <= PAGE_SIZE,
            "record of {} bytes does not fit a page",
            schema.record_size()
        );

        DiskManager::create(name)?;
        let bpm = BufferPool::shared(name, pool_size, strategy)?;

        let table = Self {
            name: name.to_string(),
            schema: schema.clone(),
            bpm,
            tuple_count: 0,
            next_free_page: FIRST_DATA_PAGE,
        };

        let mut pool = table.bpm.lock();
        let frame = pool.pin(HEADER_PAGE)?;
        write_header(frame.page_mut(), 0, FIRST_DATA_PAGE, schema);
        pool.mark_dirty(&HEADER_PAGE)?;
        pool.unpin(&HEADER_PAGE)?;
        drop(pool);

        Ok(table)
    }

    pub fn open(name: &str, pool_size: usize, strategy: Strategy) -> Result<Self> {
        let bpm = BufferPool::shared(name, pool_size, strategy)?;

        let mut pool = bpm.lock();
        let frame = pool.pin(HEADER_PAGE)?;
        let header = read_header(frame.page());
        pool.unpin(&HEADER_PAGE)?;
        drop(pool);

        let (tuple_count, next_free_page, schema) = header?;

        Ok(Self {
            name: name.to_string(),
            schema,
            bpm,
            tuple_count,
            next_free_page,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tuple_count(&self) -> u32 {
        self.tuple_count
    }

    /// Writes the record into the first free slot at or after the
    /// `next_free_page` hint, appending a fresh page when every probed page
    /// is full. A failed pin leaves the table untouched.
    pub fn insert(&mut self, record: &Record) -> Result<RecordId> {
        ensure!(
            record.data().len() == self.schema.record_size(),
            "record size mismatch"
        );

        let record_size = self.schema.record_size();
        let mut page_id = self.next_free_page.max(FIRST_DATA_PAGE);

        loop {
            let mut pool = self.bpm.lock();
            // pinning past the end of the file appends a zeroed page
            let frame = pool.pin(page_id)?;
            let mut slotted = SlottedPage::new(frame.page_mut(), record_size);

            let Some(slot) = slotted.find_free_slot() else {
                pool.unpin(&page_id)?;
                drop(pool);
                page_id += 1;
                continue;
            };

            slotted.write_record(slot, record.attr_bytes());
            pool.mark_dirty(&page_id)?;
            pool.unpin(&page_id)?;
            drop(pool);

            self.tuple_count += 1;
            self.next_free_page = page_id;
            self.save_header()?;

            return Ok((page_id, slot));
        }
    }

    pub fn delete(&mut self, rid: RecordId) -> Result<()> {
        let (page_id, slot) = rid;

        let mut pool = self.bpm.lock();
        let frame = pool.pin(page_id)?;
        let mut slotted = SlottedPage::new(frame.page_mut(), self.schema.record_size());

        if slot as usize >= slotted.capacity() || !slotted.is_live(slot) {
            pool.unpin(&page_id)?;
            bail!(Error::NoTupleWithGivenRid(page_id, slot));
        }

        slotted.mark_deleted(slot);
        pool.mark_dirty(&page_id)?;
        pool.unpin(&page_id)?;
        drop(pool);

        self.tuple_count -= 1;
        self.next_free_page = page_id;
        self.save_header()?;

        Ok(())
    }

    /// Overwrites the attributes of the record at `record.id`, leaving the
    /// tombstone alone.
    pub fn update(&mut self, record: &Record) -> Result<()> {
        let Some((page_id, slot)) = record.id else {
            bail!("record carries no id to update");
        };
        ensure!(
            record.data().len() == self.schema.record_size(),
            "record size mismatch"
        );

        let mut pool = self.bpm.lock();
        let frame = pool.pin(page_id)?;
        let mut slotted = SlottedPage::new(frame.page_mut(), self.schema.record_size());

        if slot as usize >= slotted.capacity() || !slotted.is_live(slot) {
            pool.unpin(&page_id)?;
            bail!(Error::NoTupleWithGivenRid(page_id, slot));
        }

        slotted.overwrite_attrs(slot, record.attr_bytes());
        pool.mark_dirty(&page_id)?;
        pool.unpin(&page_id)?;

        Ok(())
    }

    pub fn get(&self, rid: RecordId) -> Result<Record> {
        let (page_id, slot) = rid;

        let mut pool = self.bpm.lock();
        let frame = pool.pin(page_id)?;
        let mut slotted = SlottedPage::new(frame.page_mut(), self.schema.record_size());

        if slot as usize >= slotted.capacity() || !slotted.is_live(slot) {
            pool.unpin(&page_id)?;
            bail!(Error::NoTupleWithGivenRid(page_id, slot));
        }

        let record = Record::from_bytes(rid, slotted.read_record(slot));
        pool.unpin(&page_id)?;

        Ok(record)
    }

    /// Cursor over the live records satisfying `predicate`, in (page, slot)
    /// order.
    pub fn scan(&self, predicate: Expr) -> TableScan<'_> {
        TableScan::new(self, predicate)
    }

    /// Flushes everything and releases the pool. The header is already
    /// persisted eagerly on every mutation.
    pub fn close(self) -> Result<()> {
        self.bpm.lock().shutdown()
    }

    pub fn destroy(name: &str) -> Result<()> {
        DiskManager::destroy(name)
    }

    fn save_header(&self) -> Result<()> {
        let mut pool = self.bpm.lock();
        let frame = pool.pin(HEADER_PAGE)?;
        write_i32(frame.page_mut(), 0, self.tuple_count as i32);
        write_i32(frame.page_mut(), 4, self.next_free_page);
        pool.mark_dirty(&HEADER_PAGE)?;
        pool.unpin(&HEADER_PAGE)?;
        Ok(())
    }
}

fn read_i32(page: &Page, offset: usize) -> i32 {
    i32::from_le_bytes(page.read_bytes(offset, offset + 4).try_into().unwrap())
}

fn write_i32(page: &mut Page, offset: usize, value: i32) {
    page.write_bytes(offset, offset + 4, &value.to_le_bytes());
}

/// Page-0 layout: little-endian `tuple_count, next_free_page, num_attrs,
/// key_size`, then per attribute `name[ATTR_NAME_LEN]` NUL-padded, `dtype`,
/// `len`.
fn write_header(page: &mut Page, tuple_count: u32, next_free_page: PageId, schema: &Schema) {
    write_i32(page, 0, tuple_count as i32);
    write_i32(page, 4, next_free_page);
    write_i32(page, 8, schema.attrs.len() as i32);
    write_i32(page, 12, schema.key_attrs.len() as i32);

    let mut offset = 16;
    for attr in &schema.attrs {
        let mut name = [0u8; ATTR_NAME_LEN];
        let bytes = attr.name.as_bytes();
        let n = bytes.len().min(ATTR_NAME_LEN);
        name[..n].copy_from_slice(&bytes[..n]);

        page.write_bytes(offset, offset + ATTR_NAME_LEN, &name);
        offset += ATTR_NAME_LEN;
        write_i32(page, offset, attr.dtype.code());
        offset += 4;
        write_i32(page, offset, attr.len as i32);
        offset += 4;
    }
}

fn read_header(page: &Page) -> Result<(u32, PageId, Schema)> {
    let tuple_count = read_i32(page, 0) as u32;
    let next_free_page = read_i32(page, 4);
    let num_attrs = read_i32(page, 8) as usize;
    let key_size = read_i32(page, 12) as usize;

    let mut attrs = Vec::with_capacity(num_attrs);
    let mut offset = 16;
    for _ in 0..num_attrs {
        let raw = page.read_bytes(offset, offset + ATTR_NAME_LEN);
        let end = raw.iter().position(|b| *b == 0).unwrap_or(ATTR_NAME_LEN);
        let name = String::from_utf8_lossy(&raw[..end]).into_owned();
        offset += ATTR_NAME_LEN;

        let dtype = DataType::from_code(read_i32(page, offset))?;
        offset += 4;
        let len = read_i32(page, offset) as usize;
        offset += 4;

        attrs.push(Attribute { name, dtype, len });
    }

    // the layout persists only the key count; the indices default to the
    // leading attributes
    let schema = Schema::new(attrs, (0..key_size).collect());

    Ok((tuple_count, next_free_page, schema))
}
