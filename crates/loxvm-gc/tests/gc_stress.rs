//! GC stress test: allocate many short-lived objects across repeated
//! collection cycles and assert the resident heap stays bounded rather than
//! growing with the iteration count (`spec.md` §8 scenario 6). Mirrors the
//! allocate-and-collect shape of `fgc/tests/gc_stress.rs`, simplified to
//! this crate's single-threaded, synchronous collection model (`spec.md`
//! §5): there is no background collector to race against, so the test just
//! drives `mark`/`trace_references`/`sweep` directly after each allocation
//! crosses the threshold.

use loxvm_gc::{Heap, Ref, Trace};

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

fn collect(heap: &mut Heap<Node>, root: Ref) {
    heap.mark(root);
    heap.trace_references();
    heap.sweep();
}

#[test]
fn short_lived_allocations_do_not_grow_the_heap_unbounded() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut heap: Heap<Node> = Heap::with_config(4096, 2);
    let root = heap.allocate(Node { children: vec![] }, 8).unwrap();

    const ITERATIONS: u32 = 50_000;
    for _ in 0..ITERATIONS {
        let leaf = heap.allocate(Node { children: vec![] }, 8).unwrap();
        // `root` holds exactly the most recent leaf live; every earlier one
        // becomes unreachable the moment it's overwritten.
        heap.get_mut(root).unwrap().children = vec![leaf];

        if heap.should_collect() {
            collect(&mut heap, root);
        }
    }
    collect(&mut heap, root);

    // Only `root` and its single live child should remain resident;
    // 50,000 iterations without bounded collection would instead leave
    // every allocated `Node` live.
    assert!(
        heap.bytes_allocated() < 4096 * 4,
        "resident heap grew unbounded: {} bytes accounted after {ITERATIONS} iterations",
        heap.bytes_allocated()
    );
}

#[test]
fn interned_style_weak_root_is_not_kept_alive_by_allocation_alone() {
    // A heap that never roots anything should reclaim every object on the
    // very next collection, the same guarantee `loxvm-table::Interner`
    // depends on its weak sweep to preserve (`spec.md` §4.3 "String-table
    // sweep").
    let mut heap: Heap<Node> = Heap::with_config(64, 2);
    for _ in 0..1_000 {
        heap.allocate(Node { children: vec![] }, 8).unwrap();
    }
    let stats = heap.sweep();
    assert_eq!(stats.objects_live, 0);
    assert_eq!(stats.objects_freed, 1_000);
    assert_eq!(heap.bytes_allocated(), 0);
}
