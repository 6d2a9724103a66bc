mod frame;
mod replacer;

use crate::disk_manager::DiskManager;
use crate::errors::Error;
use crate::pages::{PageId, PAGE_SIZE};
use crate::printdbg;
use anyhow::{bail, ensure, Result};
use parking_lot::FairMutex;
use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

pub use frame::Frame;

pub type FrameId = usize;
pub type ArcBufferPool = Arc<FairMutex<BufferPool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fifo,
    Lru,
    Clock,
    LruK,
}

/// Cache of N page frames over one page file. Callers pin pages, read and
/// write through the returned frame, mark them dirty and unpin; writes reach
/// the file on eviction, [`BufferPool::force_page`], [`BufferPool::flush_all`]
/// or [`BufferPool::shutdown`].
#[derive(Debug)]
pub struct BufferPool {
    disk_manager: DiskManager,

    frames: Vec<Frame>,
    free_frames: LinkedList<FrameId>,
    page_table: HashMap<PageId, FrameId>,

    replacer: Box<dyn replacer::Replacer>,

    /// bumped on every pin
    use_tick: u64,
    /// bumped on every successful load
    load_tick: u64,

    num_reads: usize,
    num_writes: usize,
}

impl BufferPool {
    /// Binds to an existing page file and allocates `size` empty frames.
    pub fn new(path: &str, size: usize, strategy: Strategy) -> Result<Self> {
        ensure!(size > 0, Error::PoolSizeInvalid(size));

        let disk_manager = DiskManager::open(path)?;
        let frames = (0..size).map(|_| Frame::new()).collect::<Vec<_>>();

        let replacer: Box<dyn replacer::Replacer> = match strategy {
            Strategy::Fifo => Box::new(replacer::FIFO::new(size)),
            Strategy::Lru => Box::new(replacer::LRU::new(size)),
            Strategy::Clock => Box::new(replacer::Clock::new(size)),
            Strategy::LruK => Box::new(replacer::LruK::new(size)),
        };

        Ok(Self {
            disk_manager,
            frames,
            free_frames: LinkedList::from_iter(0..size),
            page_table: HashMap::new(),
            replacer,
            use_tick: 0,
            load_tick: 0,
            num_reads: 0,
            num_writes: 0,
        })
    }

    pub fn shared(path: &str, size: usize, strategy: Strategy) -> Result<ArcBufferPool> {
        Ok(Arc::new(FairMutex::new(Self::new(path, size, strategy)?)))
    }

    /// Returns the frame holding `page_id`, loading it first if needed. The
    /// file grows with zeroed pages when `page_id` lies past its end. Every
    /// successful pin must be matched by an [`BufferPool::unpin`].
    pub fn pin(&mut self, page_id: PageId) -> Result<&mut Frame> {
        ensure!(page_id >= 0, Error::ReadNonExistingPage(page_id));

        self.use_tick += 1;
        let tick = self.use_tick;

        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin();
            self.replacer.record_access(frame_id, tick);
            return Ok(&mut self.frames[frame_id]);
        }

        let frame_id = self.find_free_frame()?;

        self.disk_manager.ensure_capacity(page_id as usize + 1)?;
        let mut buf = [0u8; PAGE_SIZE];
        self.disk_manager.read_block(page_id, &mut buf)?;
        self.num_reads += 1;
        self.load_tick += 1;

        let frame = &mut self.frames[frame_id];
        frame.page_mut().fill_from(&buf);
        frame.page_mut().set_page_id(page_id);
        frame.page_mut().mark_clean();
        frame.pin();

        self.page_table.insert(page_id, frame_id);
        self.replacer.record_load(frame_id, self.load_tick);
        self.replacer.record_access(frame_id, tick);

        printdbg!("pinned page {page_id} into frame {frame_id}");

        Ok(&mut self.frames[frame_id])
    }

    /// A free frame, or an evicted one. A dirty victim is written back before
    /// its buffer is reused; if that write fails the victim stays resident
    /// and dirty, and the caller sees the error.
    fn find_free_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_frames.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.peek() else {
            bail!(Error::BufferPoolFull);
        };

        let frame = &self.frames[frame_id];
        assert_eq!(frame.pin_count(), 0);
        let evicted = frame.resident_page();

        if frame.page().is_dirty() {
            self.disk_manager.write_block(evicted, frame.page().data())?;
            self.num_writes += 1;
            self.frames[frame_id].page_mut().mark_clean();
        }

        let victim = self.replacer.evict();
        debug_assert_eq!(victim, frame_id);

        printdbg!("evicted page {evicted} from frame {frame_id}");

        self.page_table.remove(&evicted);
        self.frames[frame_id].release();

        Ok(frame_id)
    }

    /// The frame a resident page occupies, without touching its pin count.
    /// Callers must already hold a pin on the page.
    pub fn frame(&mut self, page_id: &PageId) -> Result<&mut Frame> {
        let Some(&frame_id) = self.page_table.get(page_id) else {
            bail!(Error::PageNotInBufferPool(*page_id));
        };

        debug_assert!(self.frames[frame_id].pin_count() > 0);
        Ok(&mut self.frames[frame_id])
    }

    /// Pages currently in the backing file.
    pub fn pages_on_disk(&self) -> usize {
        self.disk_manager.total_pages()
    }

    pub fn unpin(&mut self, page_id: &PageId) -> Result<()> {
        let Some(&frame_id) = self.page_table.get(page_id) else {
            bail!(Error::PageNotInBufferPool(*page_id));
        };

        let frame = &mut self.frames[frame_id];
        ensure!(frame.pin_count() > 0, Error::PageAlreadyUnpinned(*page_id));
        frame.unpin();

        if frame.pin_count() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }

        Ok(())
    }

    pub fn mark_dirty(&mut self, page_id: &PageId) -> Result<()> {
        let Some(&frame_id) = self.page_table.get(page_id) else {
            bail!(Error::PageNotInBufferPool(*page_id));
        };

        self.frames[frame_id].page_mut().mark_dirty();
        Ok(())
    }

    /// Writes the page out even while pinned; fails on a clean page.
    pub fn force_page(&mut self, page_id: &PageId) -> Result<()> {
        let Some(&frame_id) = self.page_table.get(page_id) else {
            bail!(Error::PageNotInBufferPool(*page_id));
        };

        let frame = &self.frames[frame_id];
        ensure!(frame.page().is_dirty(), Error::PageNotDirty(*page_id));

        self.disk_manager.write_block(*page_id, frame.page().data())?;
        self.num_writes += 1;
        self.frames[frame_id].page_mut().mark_clean();

        Ok(())
    }

    /// Writes back every dirty, unpinned frame.
    pub fn flush_all(&mut self) -> Result<()> {
        for frame_id in 0..self.frames.len() {
            let frame = &self.frames[frame_id];
            if frame.is_free() || !frame.page().is_dirty() || frame.pin_count() > 0 {
                continue;
            }

            self.disk_manager
                .write_block(frame.resident_page(), frame.page().data())?;
            self.num_writes += 1;
            self.frames[frame_id].page_mut().mark_clean();
        }

        Ok(())
    }

    /// Flushes and releases every frame. Fails while any page is pinned.
    pub fn shutdown(&mut self) -> Result<()> {
        let pinned = self.frames.iter().filter(|f| f.pin_count() > 0).count();
        ensure!(pinned == 0, Error::PagesStillPinned(pinned));

        self.flush_all()?;

        self.page_table.clear();
        self.free_frames = LinkedList::from_iter(0..self.frames.len());
        for frame in self.frames.iter_mut() {
            frame.release();
        }

        Ok(())
    }

    pub fn num_reads(&self) -> usize {
        self.num_reads
    }

    pub fn num_writes(&self) -> usize {
        self.num_writes
    }

    /// Resident page of every frame, in frame order; [`crate::pages::NO_PAGE`]
    /// for empty frames.
    pub fn frame_contents(&self) -> Vec<PageId> {
        self.frames.iter().map(Frame::resident_page).collect()
    }

    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.page().is_dirty()).collect()
    }

    pub fn fix_counts(&self) -> Vec<u16> {
        self.frames.iter().map(Frame::pin_count).collect()
    }
}
