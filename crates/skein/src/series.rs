//! The series manager (`SPEC_FULL.md` §3.2, §4.1) and its GC contract (§5).
//!
//! Grounded on `heap.rs`'s arena: a `Vec<Option<Slot>>` with a free-list for
//! slot reuse, an index-only ID newtype (no pointer identity, matching the
//! reasoning documented in `namespace.rs` for why this codebase avoids raw
//! pointers), and allocation routed through a [`ResourceTracker`] checkpoint
//! before the underlying buffer grows. Unlike `heap.rs`'s reference-counted
//! `HeapValue`, series here follow the spec's explicit managed/unmanaged
//! lifecycle (§4.1): a series is freed explicitly while unmanaged, or handed
//! to the garbage collector by setting `managed`, after which only
//! [`SeriesManager::collect_garbage`] may reclaim it.

use crate::{
    resource::{ResourceError, ResourceTracker},
    value::Value,
};

/// Index into the series arena. Arena-and-index, not pointer identity: two
/// `SeriesId`s compare equal iff they name the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(u32);

impl SeriesId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-series flags (§3.2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeriesFlags: u8 {
        const MANAGED      = 1 << 0;
        const LOCKED       = 1 << 1;
        const CONTEXT_VARLIST = 1 << 2;
        const KEYLIST_SHARED  = 1 << 3;
        const FIXED_SIZE   = 1 << 4;
        const EXTERNAL     = 1 << 5;
    }
}

/// The backing storage of a series. Width is implied by the variant: bytes
/// are element-width 1, arrays are element-width `size_of::<Value>()`.
#[derive(Debug, Clone)]
pub enum SeriesData {
    Bytes(Vec<u8>),
    /// Always kept with a trailing `Value::End` one past the logical length,
    /// per the array-termination invariant (§8 invariant 2). `used_len()`
    /// reports the logical length, i.e. `data.len() - 1`.
    Array(Vec<Value>),
}

impl SeriesData {
    fn estimate_size(&self) -> usize {
        match self {
            Self::Bytes(b) => b.capacity(),
            Self::Array(a) => a.capacity() * std::mem::size_of::<Value>(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    data: SeriesData,
    flags: SeriesFlags,
}

/// The arena owning every series. Generic over a [`ResourceTracker`] so a
/// host can swap in [`crate::NoLimitTracker`] or [`crate::LimitedTracker`]
/// without the arena itself knowing about limits.
#[derive(Debug)]
pub struct SeriesManager<R: ResourceTracker> {
    slots: Vec<Option<Slot>>,
    free_list: Vec<SeriesId>,
    tracker: R,
}

impl<R: ResourceTracker> SeriesManager<R> {
    #[must_use]
    pub fn new(tracker: R) -> Self {
        Self { slots: Vec::new(), free_list: Vec::new(), tracker }
    }

    fn insert(&mut self, slot: Slot) -> Result<SeriesId, ResourceError> {
        self.tracker.on_allocate(|| slot.data.estimate_size())?;
        if let Some(id) = self.free_list.pop() {
            self.slots[id.index()] = Some(slot);
            Ok(id)
        } else {
            let id = SeriesId(u32::try_from(self.slots.len()).expect("series arena exceeded u32::MAX slots"));
            self.slots.push(Some(slot));
            Ok(id)
        }
    }

    /// `make_series`/`make_array` (§4.1): allocate an unmanaged byte series.
    pub fn make_bytes(&mut self, capacity: usize) -> Result<SeriesId, ResourceError> {
        self.insert(Slot { data: SeriesData::Bytes(Vec::with_capacity(capacity)), flags: SeriesFlags::empty() })
    }

    /// `make_array` (§4.1): allocate an unmanaged array series, already
    /// carrying its terminating `END` cell at length 0.
    pub fn make_array(&mut self, capacity: usize) -> Result<SeriesId, ResourceError> {
        let mut data = Vec::with_capacity(capacity + 1);
        data.push(Value::End);
        self.insert(Slot { data: SeriesData::Array(data), flags: SeriesFlags::empty() })
    }

    fn slot(&self, id: SeriesId) -> &Slot {
        self.slots[id.index()].as_ref().expect("SeriesManager: use of freed series")
    }

    fn slot_mut(&mut self, id: SeriesId) -> &mut Slot {
        self.slots[id.index()].as_mut().expect("SeriesManager: use of freed series")
    }

    #[must_use]
    pub fn is_managed(&self, id: SeriesId) -> bool {
        self.slot(id).flags.contains(SeriesFlags::MANAGED)
    }

    #[must_use]
    pub fn is_locked(&self, id: SeriesId) -> bool {
        self.slot(id).flags.contains(SeriesFlags::LOCKED)
    }

    pub fn lock(&mut self, id: SeriesId) {
        self.slot_mut(id).flags.insert(SeriesFlags::LOCKED);
    }

    /// Clears the locked bit set by [`Self::lock`]. Used by `PARSE` (§4.8.7)
    /// to release a rule block once its sub-parse has returned, since rule
    /// locking here is scoped to a single sub-parse rather than permanent.
    pub fn unlock(&mut self, id: SeriesId) {
        self.slot_mut(id).flags.remove(SeriesFlags::LOCKED);
    }

    /// Gates every frame push the evaluator and `PARSE` perform (§4.6, §5)
    /// against the tracker's recursion ceiling; `depth` is the depth *after*
    /// the push would occur.
    pub fn check_recursion_depth(&mut self, depth: usize) -> Result<(), ResourceError> {
        self.tracker.check_recursion_depth(depth)
    }

    pub fn set_keylist_shared(&mut self, id: SeriesId, shared: bool) {
        let flags = &mut self.slot_mut(id).flags;
        if shared {
            flags.insert(SeriesFlags::KEYLIST_SHARED);
        } else {
            flags.remove(SeriesFlags::KEYLIST_SHARED);
        }
    }

    #[must_use]
    pub fn is_keylist_shared(&self, id: SeriesId) -> bool {
        self.slot(id).flags.contains(SeriesFlags::KEYLIST_SHARED)
    }

    /// `manage` (§4.1): the managed flag is monotonic (§8 invariant 4) —
    /// setting it twice is a no-op, and there is no corresponding "unmanage".
    pub fn manage(&mut self, id: SeriesId) {
        self.slot_mut(id).flags.insert(SeriesFlags::MANAGED);
    }

    /// `free` (§4.1). Precondition: `id` is not managed.
    ///
    /// # Panics
    /// Panics if `id` is managed; once managed, only [`Self::collect_garbage`]
    /// may reclaim a series (§8 invariant 4).
    pub fn free(&mut self, id: SeriesId) {
        assert!(!self.is_managed(id), "SeriesManager::free called on a managed series");
        self.reclaim(id);
    }

    fn reclaim(&mut self, id: SeriesId) {
        if let Some(slot) = self.slots[id.index()].take() {
            self.tracker.on_free(slot.data.estimate_size());
            self.free_list.push(id);
        }
    }

    /// Distinguishes an array series from a byte series without panicking,
    /// for callers (the `Interpreter`'s GC root walk) that visit both kinds
    /// without otherwise knowing which is which.
    #[must_use]
    pub fn is_array(&self, id: SeriesId) -> bool {
        matches!(self.slot(id).data, SeriesData::Array(_))
    }

    pub fn array(&self, id: SeriesId) -> &[Value] {
        match &self.slot(id).data {
            SeriesData::Array(a) => &a[..a.len() - 1],
            SeriesData::Bytes(_) => panic!("SeriesManager::array called on a byte series"),
        }
    }

    pub fn array_mut(&mut self, id: SeriesId) -> &mut [Value] {
        let locked = self.is_locked(id);
        assert!(!locked, "SeriesManager::array_mut called on a locked series");
        match &mut self.slot_mut(id).data {
            SeriesData::Array(a) => {
                let len = a.len() - 1;
                &mut a[..len]
            }
            SeriesData::Bytes(_) => panic!("SeriesManager::array_mut called on a byte series"),
        }
    }

    pub fn bytes(&self, id: SeriesId) -> &[u8] {
        match &self.slot(id).data {
            SeriesData::Bytes(b) => b,
            SeriesData::Array(_) => panic!("SeriesManager::bytes called on an array series"),
        }
    }

    pub fn bytes_mut(&mut self, id: SeriesId) -> &mut Vec<u8> {
        let locked = self.is_locked(id);
        assert!(!locked, "SeriesManager::bytes_mut called on a locked series");
        match &mut self.slot_mut(id).data {
            SeriesData::Bytes(b) => b,
            SeriesData::Array(_) => panic!("SeriesManager::bytes_mut called on an array series"),
        }
    }

    #[must_use]
    pub fn len(&self, id: SeriesId) -> usize {
        match &self.slot(id).data {
            SeriesData::Bytes(b) => b.len(),
            SeriesData::Array(a) => a.len() - 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self, id: SeriesId) -> bool {
        self.len(id) == 0
    }

    /// `expand_tail` (§4.1): grow used length by `values.len()`, appending
    /// `values` and re-terminating. Re-checks the resource budget since the
    /// buffer may need to reallocate.
    pub fn array_extend(&mut self, id: SeriesId, values: impl IntoIterator<Item = Value>) -> Result<(), ResourceError> {
        let values: Vec<Value> = values.into_iter().collect();
        let added = values.len() * std::mem::size_of::<Value>();
        self.tracker.on_allocate(|| added)?;
        match &mut self.slot_mut(id).data {
            SeriesData::Array(a) => {
                let end = a.pop().expect("array series missing its END terminator");
                debug_assert!(matches!(end, Value::End));
                a.extend(values);
                a.push(Value::End);
            }
            SeriesData::Bytes(_) => panic!("SeriesManager::array_extend called on a byte series"),
        }
        Ok(())
    }

    pub fn array_push(&mut self, id: SeriesId, value: Value) -> Result<(), ResourceError> {
        self.array_extend(id, std::iter::once(value))
    }

    /// Removes `count` elements starting at `start` and splices `insert` into
    /// their place, re-terminating afterward. Backs `PARSE`'s `REMOVE`/
    /// `INSERT`/`CHANGE` rules (§4.8.2), the one place this crate mutates an
    /// input series mid-match rather than just reading through it.
    pub fn array_splice(&mut self, id: SeriesId, start: usize, count: usize, insert: Vec<Value>) -> Result<(), ResourceError> {
        self.tracker.on_allocate(|| insert.len() * std::mem::size_of::<Value>())?;
        match &mut self.slot_mut(id).data {
            SeriesData::Array(a) => {
                let end = a.pop().expect("array series missing its END terminator");
                debug_assert!(matches!(end, Value::End));
                a.splice(start..start + count, insert);
                a.push(Value::End);
            }
            SeriesData::Bytes(_) => panic!("SeriesManager::array_splice called on a byte series"),
        }
        Ok(())
    }

    /// Byte-series counterpart of [`Self::array_splice`], for `PARSE` over a
    /// string input.
    pub fn bytes_splice(&mut self, id: SeriesId, start: usize, count: usize, insert: Vec<u8>) -> Result<(), ResourceError> {
        self.tracker.on_allocate(|| insert.len())?;
        match &mut self.slot_mut(id).data {
            SeriesData::Bytes(b) => {
                b.splice(start..start + count, insert);
            }
            SeriesData::Array(_) => panic!("SeriesManager::bytes_splice called on an array series"),
        }
        Ok(())
    }

    /// `copy_array_shallow` (§4.1): duplicate the cell buffer; nested arrays
    /// keep pointing at the same inner series.
    pub fn copy_array_shallow(&mut self, id: SeriesId, extra: usize) -> Result<SeriesId, ResourceError> {
        let cells: Vec<Value> = self.array(id).to_vec();
        let new_id = self.make_array(cells.len() + extra)?;
        self.array_extend(new_id, cells)?;
        Ok(new_id)
    }

    /// `copy_array_deep` (§4.1): as shallow, but descend into child arrays
    /// whose kind bit is set in `types_mask` (the `1 << ValueKind as u64`
    /// encoding used by [`crate::value::TYPESET_ALL_BUT_VOID`]) and deep-copy
    /// those too, instead of letting the copy alias the original's child
    /// series. Byte-backed children (string!, binary!, bitset!) have no
    /// nested arrays to descend into and are left shallow regardless of mask.
    pub fn copy_array_deep(&mut self, id: SeriesId, extra: usize, types_mask: u64) -> Result<SeriesId, ResourceError> {
        let mut cells: Vec<Value> = self.array(id).to_vec();
        for cell in &mut cells {
            let Some(child) = cell.child_series() else { continue };
            if !self.is_array(child) || types_mask & (1 << cell.kind() as u64) == 0 {
                continue;
            }
            let new_child = self.copy_array_deep(child, 0, types_mask)?;
            match cell {
                Value::Block(pos) | Value::Group(pos) | Value::Path { pos, .. } => pos.series = new_child,
                _ => {}
            }
        }
        let new_id = self.make_array(cells.len() + extra)?;
        self.array_extend(new_id, cells)?;
        Ok(new_id)
    }

    /// Marks every slot reachable from `roots` and frees every managed slot
    /// that isn't (§5: "the GC runs between evaluations"). `roots` should
    /// enumerate every series directly reachable from the frame stack, the
    /// active context chain, and any explicitly guarded series.
    pub fn collect_garbage(&mut self, roots: impl IntoIterator<Item = SeriesId>) {
        let mut marked = vec![false; self.slots.len()];
        let mut stack: Vec<SeriesId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            let idx = id.index();
            if idx >= marked.len() || marked[idx] {
                continue;
            }
            marked[idx] = true;
            if let Some(Some(slot)) = self.slots.get(idx)
                && let SeriesData::Array(cells) = &slot.data
            {
                for cell in cells {
                    if let Some(child) = cell.child_series() {
                        stack.push(child);
                    }
                }
            }
        }
        for (idx, marked) in marked.iter().enumerate() {
            if *marked {
                continue;
            }
            let is_managed = self.slots[idx].as_ref().is_some_and(|s| s.flags.contains(SeriesFlags::MANAGED));
            if is_managed {
                self.reclaim(SeriesId(u32::try_from(idx).expect("idx fits")));
            }
        }
    }
}

/// A managed or unmanaged series handle plus the data it wraps, used where
/// call sites need both together (mirrors the teacher's practice of pairing
/// an ID with a borrowed view rather than inventing a smart pointer).
pub type Series = SeriesId;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;

    #[test]
    fn fresh_array_is_terminated_and_empty() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let id = mgr.make_array(4).unwrap();
        assert_eq!(mgr.len(id), 0);
        assert!(mgr.array(id).is_empty());
    }

    #[test]
    fn extend_keeps_termination_invariant() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let id = mgr.make_array(4).unwrap();
        mgr.array_extend(id, [Value::Integer(1), Value::Integer(2)]).unwrap();
        assert_eq!(mgr.len(id), 2);
        assert_eq!(mgr.array(id), &[Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn managed_series_survives_gc_when_rooted() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let id = mgr.make_array(0).unwrap();
        mgr.manage(id);
        mgr.collect_garbage([id]);
        assert_eq!(mgr.len(id), 0); // didn't panic: still live
    }

    #[test]
    fn managed_series_freed_when_unreachable() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let id = mgr.make_array(0).unwrap();
        mgr.manage(id);
        mgr.collect_garbage([]);
        assert!(mgr.free_list.contains(&id));
    }

    #[test]
    #[should_panic(expected = "freed series")]
    fn using_a_freed_series_panics() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let id = mgr.make_array(0).unwrap();
        mgr.free(id);
        mgr.len(id);
    }

    #[test]
    fn copy_array_deep_gives_nested_blocks_their_own_series() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let inner = mgr.make_array(0).unwrap();
        mgr.array_extend(inner, [Value::Integer(1)]).unwrap();
        let outer = mgr.make_array(0).unwrap();
        mgr.array_extend(outer, [Value::Block(crate::value::SeriesPos { series: inner, index: 0 })]).unwrap();

        let mask = crate::value::TYPESET_ALL_BUT_VOID;
        let copy = mgr.copy_array_deep(outer, 0, mask).unwrap();
        let Value::Block(copied_pos) = mgr.array(copy)[0] else { panic!("expected a block cell") };
        assert_ne!(copied_pos.series, inner);
        assert_eq!(mgr.array(copied_pos.series), &[Value::Integer(1)]);

        mgr.array_mut(inner)[0] = Value::Integer(99);
        assert_eq!(mgr.array(copied_pos.series), &[Value::Integer(1)], "deep copy must not alias the original's inner series");
    }

    #[test]
    fn copy_array_deep_leaves_kinds_outside_the_mask_shared() {
        let mut mgr = SeriesManager::new(NoLimitTracker);
        let inner = mgr.make_array(0).unwrap();
        mgr.array_extend(inner, [Value::Integer(1)]).unwrap();
        let outer = mgr.make_array(0).unwrap();
        mgr.array_extend(outer, [Value::Block(crate::value::SeriesPos { series: inner, index: 0 })]).unwrap();

        let copy = mgr.copy_array_deep(outer, 0, 0).unwrap();
        let Value::Block(copied_pos) = mgr.array(copy)[0] else { panic!("expected a block cell") };
        assert_eq!(copied_pos.series, inner, "kind excluded from the mask stays aliased");
    }
}
