use crate::{GcError, Ref, Trace};
use loxvm_util::{GC_GROWTH_FACTOR, GC_INITIAL_THRESHOLD};

enum Slot<T> {
    /// Free, part of the free list threaded through `next_free`.
    Empty { next_free: Option<u32> },
    Occupied {
        generation: u32,
        marked: bool,
        size: usize,
        value: T,
    },
}

/// Summary of one sweep phase, returned so the owner can log or assert on
/// it (`spec.md` §8 scenario 6: GC stress).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub objects_freed: usize,
    pub bytes_freed: usize,
    pub objects_live: usize,
}

/// A slab of GC-managed objects of type `T`, plus the mark bit and gray
/// worklist needed to trace and collect them.
///
/// See the crate-level docs for the collection protocol. `Heap` does not run
/// a collection on its own; the owner decides when to call [`Heap::mark`],
/// [`Heap::trace_references`], and [`Heap::sweep`] (typically gated by
/// [`Heap::should_collect`]).
pub struct Heap<T: Trace> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    bytes_allocated: usize,
    next_gc: usize,
    /// The floor `update_threshold` re-applies after every sweep, set once
    /// from the caller's `with_config(initial_threshold, ..)` and never the
    /// crate-wide [`GC_INITIAL_THRESHOLD`] default, so a host that configures
    /// a smaller threshold keeps it honored past the first cycle.
    initial_threshold: usize,
    growth_factor: usize,
    gray_stack: Vec<Ref>,
    /// Reused scratch buffer for [`Heap::trace_references`], so draining the
    /// worklist doesn't allocate a fresh `Vec` per object.
    trace_scratch: Vec<Ref>,
}

impl<T: Trace> Heap<T> {
    pub fn new() -> Self {
        Self::with_config(GC_INITIAL_THRESHOLD, GC_GROWTH_FACTOR)
    }

    /// A heap with a caller-chosen initial collection threshold and growth
    /// factor, letting a host (`loxvm-cli`'s layered `Config`, per
    /// `SPEC_FULL.md` §10.3) tune GC pressure without touching this crate.
    pub fn with_config(initial_threshold: usize, growth_factor: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            bytes_allocated: 0,
            next_gc: initial_threshold,
            initial_threshold,
            growth_factor,
            gray_stack: Vec::new(),
            trace_scratch: Vec::new(),
        }
    }

    /// Allocate `value`, accounting `size` bytes against the collection
    /// threshold. The new object starts unmarked (white); it survives the
    /// *next* collection only if something roots it before then, which is
    /// why callers that might allocate again before rooting a fresh object
    /// (string concatenation, list-build) must push it onto the VM's value
    /// stack first, per `spec.md` §4.3 "Safety".
    pub fn allocate(&mut self, value: T, size: usize) -> Result<Ref, GcError> {
        self.bytes_allocated += size;
        let entry = Slot::Occupied {
            generation: 0,
            marked: false,
            size,
            value,
        };

        if let Some(index) = self.free_head {
            self.free_head = match &self.slots[index as usize] {
                Slot::Empty { next_free } => *next_free,
                Slot::Occupied { .. } => unreachable!("free list pointed at an occupied slot"),
            };
            // Bump the generation of the slot we're reusing so stale `Ref`s
            // from before it was freed don't alias the new occupant.
            let next_generation = self.slot_generation(index).wrapping_add(1);
            let Slot::Occupied { marked, size, value, .. } = entry else { unreachable!() };
            self.slots[index as usize] = Slot::Occupied { generation: next_generation, marked, size, value };
            Ok(Ref::new(index, next_generation))
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| GcError::HeapExhausted)?;
            self.slots.push(entry);
            Ok(Ref::new(index, 0))
        }
    }

    fn slot_generation(&self, index: u32) -> u32 {
        match &self.slots[index as usize] {
            Slot::Occupied { generation, .. } => *generation,
            Slot::Empty { .. } => 0,
        }
    }

    pub fn get(&self, r: Ref) -> Option<&T> {
        match self.slots.get(r.index as usize)? {
            Slot::Occupied { generation, value, .. } if *generation == r.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, r: Ref) -> Option<&mut T> {
        match self.slots.get_mut(r.index as usize)? {
            Slot::Occupied { generation, value, .. } if *generation == r.generation => Some(value),
            _ => None,
        }
    }

    pub fn is_marked(&self, r: Ref) -> bool {
        matches!(
            self.slots.get(r.index as usize),
            Some(Slot::Occupied { generation, marked: true, .. }) if *generation == r.generation
        )
    }

    /// Mark `r` gray (set its mark bit, push it onto the worklist) unless it
    /// is already marked. Returns whether this call newly marked it, mainly
    /// for tests; callers normally ignore the result.
    pub fn mark(&mut self, r: Ref) -> bool {
        let Some(Slot::Occupied { generation, marked, .. }) = self.slots.get_mut(r.index as usize)
        else {
            return false;
        };
        if *generation != r.generation || *marked {
            return false;
        }
        *marked = true;
        self.gray_stack.push(r);
        true
    }

    /// Drain the gray worklist, tracing each object's children and marking
    /// them, until nothing gray remains (every reachable object is black).
    pub fn trace_references(&mut self) {
        while let Some(r) = self.gray_stack.pop() {
            let Some(Slot::Occupied { value, .. }) = self.slots.get(r.index as usize) else {
                continue;
            };
            self.trace_scratch.clear();
            let scratch = &mut self.trace_scratch;
            value.trace(&mut |child| scratch.push(child));

            for i in 0..self.trace_scratch.len() {
                let child = self.trace_scratch[i];
                self.mark(child);
            }
        }
    }

    /// Free every unmarked object and unlink it from the slab; clear the
    /// mark bit on every survivor so the next cycle starts white. Callers
    /// must have already swept any weak structures (the intern set) that
    /// key on these `Ref`s, or those entries will dangle.
    pub fn sweep(&mut self) -> SweepStats {
        let mut stats = SweepStats::default();
        for index in 0..self.slots.len() {
            match &mut self.slots[index] {
                Slot::Occupied { marked: true, .. } => {
                    if let Slot::Occupied { marked, .. } = &mut self.slots[index] {
                        *marked = false;
                    }
                    stats.objects_live += 1;
                }
                Slot::Occupied { marked: false, size, .. } => {
                    let size = *size;
                    log::trace!("gc: freeing object at slot {index} ({size} bytes)");
                    self.bytes_allocated -= size;
                    stats.objects_freed += 1;
                    stats.bytes_freed += size;
                    let index = index as u32;
                    self.slots[index as usize] = Slot::Empty { next_free: self.free_head };
                    self.free_head = Some(index);
                }
                Slot::Empty { .. } => {}
            }
        }
        self.update_threshold();
        log::debug!(
            "gc: swept {} objects ({} bytes), {} live, next threshold {} bytes",
            stats.objects_freed,
            stats.bytes_freed,
            stats.objects_live,
            self.next_gc
        );
        stats
    }

    fn update_threshold(&mut self) {
        self.next_gc = (self.bytes_allocated * self.growth_factor).max(self.initial_threshold);
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn next_gc_threshold(&self) -> usize {
        self.next_gc
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated >= self.next_gc
    }
}

impl<T: Trace> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(u32);

    impl Trace for Leaf {
        fn trace(&self, _mark: &mut dyn FnMut(Ref)) {}
        fn size_hint(&self) -> usize {
            std::mem::size_of::<Self>()
        }
    }

    struct Node {
        children: Vec<Ref>,
    }

    impl Trace for Node {
        fn trace(&self, mark: &mut dyn FnMut(Ref)) {
            for &child in &self.children {
                mark(child);
            }
        }
        fn size_hint(&self) -> usize {
            std::mem::size_of::<Self>() + self.children.len() * std::mem::size_of::<Ref>()
        }
    }

    #[test]
    fn unreachable_object_is_freed_on_sweep() {
        let mut heap: Heap<Leaf> = Heap::new();
        let r = heap.allocate(Leaf(1), 4).unwrap();
        assert!(heap.get(r).is_some());

        let stats = heap.sweep();
        assert_eq!(stats.objects_freed, 1);
        assert!(heap.get(r).is_none());
    }

    #[test]
    fn rooted_object_survives_sweep_and_is_unmarked_after() {
        let mut heap: Heap<Leaf> = Heap::new();
        let r = heap.allocate(Leaf(1), 4).unwrap();
        heap.mark(r);
        heap.trace_references();

        let stats = heap.sweep();
        assert_eq!(stats.objects_freed, 0);
        assert!(heap.get(r).is_some());
        assert!(!heap.is_marked(r));
    }

    #[test]
    fn tracing_marks_reachable_children_through_a_cycle() {
        let mut heap: Heap<Node> = Heap::new();
        let a = heap.allocate(Node { children: vec![] }, 8).unwrap();
        let b = heap.allocate(Node { children: vec![a] }, 8).unwrap();
        // Close the cycle: a -> b -> a.
        heap.get_mut(a).unwrap().children.push(b);

        heap.mark(b);
        heap.trace_references();

        assert!(heap.is_marked(a));
        assert!(heap.is_marked(b));

        let stats = heap.sweep();
        assert_eq!(stats.objects_freed, 0);
    }

    #[test]
    fn stale_ref_after_slot_reuse_does_not_alias() {
        let mut heap: Heap<Leaf> = Heap::new();
        let first = heap.allocate(Leaf(1), 4).unwrap();
        heap.sweep(); // first is unmarked, gets freed and slot recycled.

        let second = heap.allocate(Leaf(2), 4).unwrap();
        assert_eq!(first.slot(), second.slot());
        assert!(heap.get(first).is_none());
        assert!(heap.get(second).is_some());
    }

    #[test]
    fn threshold_grows_with_live_bytes() {
        let mut heap: Heap<Leaf> = Heap::new();
        let initial = heap.next_gc_threshold();
        for i in 0..100_000u32 {
            let r = heap.allocate(Leaf(i), 64).unwrap();
            heap.mark(r);
        }
        heap.trace_references();
        heap.sweep();
        assert!(heap.next_gc_threshold() >= initial);
        assert!(heap.next_gc_threshold() >= heap.bytes_allocated() * GC_GROWTH_FACTOR);
    }
}
