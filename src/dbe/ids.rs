//! Buffer id array of a double-buffered window
//!
//! Most windows name one or two back buffers, so the first few ids live
//! inline. Once those slots are used up the array moves to the heap and grows
//! by a fixed increment; when enough ids are released it moves back inline.

use crate::wire::{Xid, NONE};

/// Inline capacity before the array spills to the heap
pub const INIT_MAX_IDS: usize = 2;
/// Slots added each time the heap array fills up
pub const INCR_MAX_IDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Storage {
    Inline([Xid; INIT_MAX_IDS]),
    Heap(Vec<Xid>),
}

/// Ordered, duplicate-free list of live buffer ids.
///
/// Live ids always occupy the first `len()` slots; every slot past them holds
/// the [`NONE`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferIds {
    storage: Storage,
    count: usize,
}

impl BufferIds {
    pub fn new() -> Self {
        Self {
            storage: Storage::Inline([NONE; INIT_MAX_IDS]),
            count: 0,
        }
    }

    fn slots(&self) -> &[Xid] {
        match &self.storage {
            Storage::Inline(ids) => ids,
            Storage::Heap(ids) => ids,
        }
    }

    fn slots_mut(&mut self) -> &mut [Xid] {
        match &mut self.storage {
            Storage::Inline(ids) => ids,
            Storage::Heap(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots, occupied or not
    pub fn capacity(&self) -> usize {
        self.slots().len()
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    pub fn iter(&self) -> impl Iterator<Item = Xid> + '_ {
        self.slots()[..self.count].iter().copied()
    }

    pub fn first(&self) -> Option<Xid> {
        self.iter().next()
    }

    pub fn contains(&self, id: Xid) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: Xid) -> Option<usize> {
        self.iter().position(|live| live == id)
    }

    /// Index of the first empty slot, growing the array when it is full.
    ///
    /// The slot stays empty until [`BufferIds::fill_slot`] stores an id in it.
    pub fn reserve_slot(&mut self) -> usize {
        if let Some(slot) = self.slots().iter().position(|&id| id == NONE) {
            return slot;
        }
        let slot = self.capacity();
        self.grow();
        slot
    }

    fn grow(&mut self) {
        let capacity = self.capacity() + INCR_MAX_IDS;
        match &mut self.storage {
            Storage::Inline(ids) => {
                let mut heap = Vec::with_capacity(capacity);
                heap.extend_from_slice(ids);
                heap.resize(capacity, NONE);
                log::trace!("buffer id array moved to heap ({} slots)", capacity);
                self.storage = Storage::Heap(heap);
            }
            Storage::Heap(ids) => ids.resize(capacity, NONE),
        }
    }

    /// Store `id` in a slot handed out by [`BufferIds::reserve_slot`]
    pub fn fill_slot(&mut self, slot: usize, id: Xid) {
        debug_assert_eq!(slot, self.count, "ids must stay packed");
        debug_assert!(id != NONE && !self.contains(id));
        self.slots_mut()[slot] = id;
        self.count += 1;
    }

    /// Remove `id`, keeping the remaining ids in order.
    ///
    /// Returns false if `id` is not live.
    pub fn remove(&mut self, id: Xid) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let count = self.count;
        let slots = self.slots_mut();
        slots.copy_within(pos + 1..count, pos);
        slots[count - 1] = NONE;
        self.count -= 1;

        if let Storage::Heap(ids) = &self.storage {
            if self.count <= INIT_MAX_IDS {
                let mut inline = [NONE; INIT_MAX_IDS];
                inline[..self.count].copy_from_slice(&ids[..self.count]);
                self.storage = Storage::Inline(inline);
            }
        }
        true
    }
}

impl Default for BufferIds {
    fn default() -> Self {
        Self::new()
    }
}
