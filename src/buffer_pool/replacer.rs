use core::fmt::Debug;
use std::collections::HashMap;

use arrayvec::ArrayVec;
use priority_queue::PriorityQueue;

use super::FrameId;

/// Accesses kept per frame by the LRU-K policy.
const HISTORY: usize = 2;

/// Eviction policy behind the pool. Pinned frames leave the candidate set via
/// [`Replacer::set_evictable`] and re-enter it when their pin count drops to
/// zero. [`Replacer::peek`] names the next victim without removing it, so the
/// pool can write a dirty victim back before committing to the eviction.
pub(super) trait Replacer: Debug {
    /// A page was loaded into `frame_id`. `tick` comes from the load counter.
    fn record_load(&mut self, frame_id: FrameId, tick: u64);
    /// `frame_id` was pinned. `tick` comes from the use counter.
    fn record_access(&mut self, frame_id: FrameId, tick: u64);
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);
    fn peek(&self) -> Option<FrameId>;
    /// Must only be called after a successful [`Replacer::peek`].
    fn evict(&mut self) -> FrameId;
}

/// Max-heap priority that selects the smallest tick, ties broken by the
/// lowest frame index.
fn priority(tick: u64, frame_id: FrameId) -> (i64, i64) {
    (-(tick as i64), -(frame_id as i64))
}

/// Evicts the unpinned frame whose page was loaded earliest.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug)]
pub(super) struct FIFO {
    heap: PriorityQueue<FrameId, (i64, i64)>,
    /// Priorities of frames currently unevictable; restored when the frame
    /// is marked evictable again.
    parked: HashMap<FrameId, (i64, i64)>,
}

impl FIFO {
    pub fn new(size: usize) -> Self {
        Self {
            heap: PriorityQueue::with_capacity(size),
            parked: HashMap::with_capacity(size),
        }
    }
}

impl Replacer for FIFO {
    fn record_load(&mut self, frame_id: FrameId, tick: u64) {
        self.heap.remove(&frame_id);
        self.parked.insert(frame_id, priority(tick, frame_id));
    }

    fn record_access(&mut self, frame_id: FrameId, _tick: u64) {
        // load order is fixed at load time; a pin only parks the frame
        if let Some((frame_id, pri)) = self.heap.remove(&frame_id) {
            self.parked.insert(frame_id, pri);
        }
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if let Some(pri) = self.parked.remove(&frame_id) {
                self.heap.push(frame_id, pri);
            }
        } else if let Some((frame_id, pri)) = self.heap.remove(&frame_id) {
            self.parked.insert(frame_id, pri);
        }
    }

    fn peek(&self) -> Option<FrameId> {
        self.heap.peek().map(|(frame_id, _)| *frame_id)
    }

    fn evict(&mut self) -> FrameId {
        self.heap.pop().unwrap().0
    }
}

/// Evicts the unpinned frame that was used least recently.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug)]
pub(super) struct LRU {
    heap: PriorityQueue<FrameId, (i64, i64)>,
    parked: HashMap<FrameId, (i64, i64)>,
}

impl LRU {
    pub fn new(size: usize) -> Self {
        Self {
            heap: PriorityQueue::with_capacity(size),
            parked: HashMap::with_capacity(size),
        }
    }
}

impl Replacer for LRU {
    fn record_load(&mut self, _frame_id: FrameId, _tick: u64) {
        // the pin following the load records the first use
    }

    fn record_access(&mut self, frame_id: FrameId, tick: u64) {
        self.heap.remove(&frame_id);
        self.parked.insert(frame_id, priority(tick, frame_id));
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if let Some(pri) = self.parked.remove(&frame_id) {
                self.heap.push(frame_id, pri);
            }
        } else if let Some((frame_id, pri)) = self.heap.remove(&frame_id) {
            self.parked.insert(frame_id, pri);
        }
    }

    fn peek(&self) -> Option<FrameId> {
        self.heap.peek().map(|(frame_id, _)| *frame_id)
    }

    fn evict(&mut self) -> FrameId {
        self.heap.pop().unwrap().0
    }
}

/// Circular sweep over reference bits. The cursor rests on the last evicted
/// frame, so every sweep starts at its successor. Bits of pinned frames are
/// left alone; a sweep needs at most two full cycles once any frame is
/// evictable.
#[derive(Debug)]
pub(super) struct Clock {
    ref_bits: Vec<bool>,
    evictable: Vec<bool>,
    cursor: usize,
}

impl Clock {
    pub fn new(size: usize) -> Self {
        Self {
            ref_bits: vec![false; size],
            evictable: vec![false; size],
            cursor: 0,
        }
    }

    fn sweep(cursor: usize, evictable: &[bool], ref_bits: &mut [bool]) -> Option<FrameId> {
        let size = ref_bits.len();
        for step in 1..=2 * size {
            let frame_id = (cursor + step) % size;
            if !evictable[frame_id] {
                continue;
            }
            if ref_bits[frame_id] {
                ref_bits[frame_id] = false;
            } else {
                return Some(frame_id);
            }
        }
        None
    }
}

impl Replacer for Clock {
    fn record_load(&mut self, frame_id: FrameId, _tick: u64) {
        self.ref_bits[frame_id] = true;
        self.evictable[frame_id] = false;
    }

    fn record_access(&mut self, frame_id: FrameId, _tick: u64) {
        self.ref_bits[frame_id] = true;
        self.evictable[frame_id] = false;
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        self.evictable[frame_id] = evictable;
    }

    fn peek(&self) -> Option<FrameId> {
        let mut ref_bits = self.ref_bits.clone();
        Self::sweep(self.cursor, &self.evictable, &mut ref_bits)
    }

    fn evict(&mut self) -> FrameId {
        let frame_id = Self::sweep(self.cursor, &self.evictable, &mut self.ref_bits)
            .expect("evict called with no evictable frame");
        self.cursor = frame_id;
        self.evictable[frame_id] = false;
        frame_id
    }
}

/// Evicts the unpinned frame with the largest backward K-distance: frames
/// with fewer than [`HISTORY`] recorded accesses first (ordered by their
/// oldest access), then frames by their K-th most recent access.
#[derive(Debug)]
pub(super) struct LruK {
    history: Vec<ArrayVec<u64, HISTORY>>,
    evictable: Vec<bool>,
}

impl LruK {
    pub fn new(size: usize) -> Self {
        Self {
            history: (0..size).map(|_| ArrayVec::new()).collect(),
            evictable: vec![false; size],
        }
    }

    fn victim(&self) -> Option<FrameId> {
        (0..self.history.len())
            .filter(|frame_id| self.evictable[*frame_id])
            .min_by_key(|frame_id| {
                let history = &self.history[*frame_id];
                (
                    history.is_full(),
                    history.first().copied().unwrap_or(0),
                    *frame_id,
                )
            })
    }
}

impl Replacer for LruK {
    fn record_load(&mut self, frame_id: FrameId, _tick: u64) {
        // history belongs to the resident page, not the frame
        self.history[frame_id].clear();
        self.evictable[frame_id] = false;
    }

    fn record_access(&mut self, frame_id: FrameId, tick: u64) {
        let history = &mut self.history[frame_id];
        if history.is_full() {
            history.remove(0);
        }
        history.push(tick);
        self.evictable[frame_id] = false;
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        self.evictable[frame_id] = evictable;
    }

    fn peek(&self) -> Option<FrameId> {
        self.victim()
    }

    fn evict(&mut self) -> FrameId {
        let frame_id = self.victim().expect("evict called with no evictable frame");
        self.evictable[frame_id] = false;
        frame_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_evicts_in_load_order() {
        let mut replacer = FIFO::new(3);
        for frame_id in 0..3 {
            replacer.record_load(frame_id, frame_id as u64 + 1);
            replacer.record_access(frame_id, frame_id as u64 + 1);
            replacer.set_evictable(frame_id, true);
        }

        // accesses do not reorder a FIFO
        replacer.record_access(0, 10);
        replacer.set_evictable(0, true);

        assert_eq!(replacer.peek(), Some(0));
        assert_eq!(replacer.evict(), 0);
        assert_eq!(replacer.evict(), 1);
        assert_eq!(replacer.evict(), 2);
    }

    #[test]
    fn test_lru_recency_and_parking() {
        let mut replacer = LRU::new(3);
        replacer.record_access(1, 1);
        replacer.record_access(2, 2);
        replacer.record_access(0, 3);
        for frame_id in 0..3 {
            replacer.set_evictable(frame_id, true);
        }
        assert_eq!(replacer.peek(), Some(1));

        // pinning frame 1 parks it; its recency survives the round trip
        replacer.set_evictable(1, false);
        assert_eq!(replacer.peek(), Some(2));
        replacer.set_evictable(1, true);
        assert_eq!(replacer.evict(), 1);
        assert_eq!(replacer.evict(), 2);
        assert_eq!(replacer.evict(), 0);
    }

    #[test]
    fn test_clock_clears_bits_on_the_way() {
        let mut replacer = Clock::new(3);
        for frame_id in 0..3 {
            replacer.record_load(frame_id, 0);
            replacer.record_access(frame_id, 0);
            replacer.set_evictable(frame_id, true);
        }
        // all reference bits set: the sweep clears 1 and 2, wraps over 0,
        // and takes 1 on the second pass
        assert_eq!(replacer.evict(), 1);
        // cursor rests on frame 1 and the first sweep cleared every bit
        assert_eq!(replacer.evict(), 2);
    }

    #[test]
    fn test_clock_skips_pinned_frames() {
        let mut replacer = Clock::new(3);
        for frame_id in 0..3 {
            replacer.record_load(frame_id, 0);
            replacer.set_evictable(frame_id, frame_id != 1);
        }
        assert_eq!(replacer.evict(), 2);
        assert_eq!(replacer.peek(), Some(0));
    }

    #[test]
    fn test_lru_k_prefers_short_history() {
        let mut replacer = LruK::new(3);
        // frame 0: two accesses, frame 1: one access, frame 2: two accesses
        replacer.record_access(0, 1);
        replacer.record_access(0, 4);
        replacer.record_access(1, 2);
        replacer.record_access(2, 3);
        replacer.record_access(2, 5);
        for frame_id in 0..3 {
            replacer.set_evictable(frame_id, true);
        }

        // frame 1 has no full history, so its K-distance is unbounded
        assert_eq!(replacer.evict(), 1);
        // between 0 and 2 the older K-th access (tick 1) loses
        assert_eq!(replacer.evict(), 0);
        assert_eq!(replacer.evict(), 2);
    }

    #[test]
    fn test_no_candidates() {
        let mut replacer = LRU::new(2);
        replacer.record_access(0, 1);
        replacer.record_access(1, 2);
        assert_eq!(replacer.peek(), None);

        replacer.set_evictable(0, true);
        assert_eq!(replacer.peek(), Some(0));
        replacer.set_evictable(0, false);
        assert_eq!(replacer.peek(), None);
    }
}
