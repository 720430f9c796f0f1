use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rayon::prelude::*;
use rtgc::{Compartment, HeapError, MemoryInstance, ModuleInstance, ObjectHeap, TableInstance};

#[test]
fn rooted_objects_survive_concurrent_collections() {
    let heap = ObjectHeap::new();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let collector = scope.spawn(|| {
            let mut collections = 0u64;
            while !done.load(Ordering::Acquire) {
                heap.collect();
                collections += 1;
            }
            collections
        });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let compartment = heap.register_rooted(Compartment::new());
                        let module = heap.register_rooted(ModuleInstance::new(compartment.id()));
                        let memory = heap.register(MemoryInstance::new(compartment.id(), 0));

                        // The unrooted memory may already be gone; rooted objects may not.
                        match heap.kind_of(memory) {
                            Ok(_) | Err(HeapError::StaleHandle { .. }) => {}
                            Err(other) => unreachable!("unexpected lookup error: {other}"),
                        }
                        assert!(heap.contains(compartment.id()));
                        assert!(heap.contains(module.id()));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker panicked");
        }
        done.store(true, Ordering::Release);
        collector.join().expect("collector panicked");
    });

    heap.collect();
    assert!(heap.is_empty());
}

#[test]
fn parallel_root_churn_balances_out() {
    let heap = ObjectHeap::new();
    let compartment = heap.register_rooted(Compartment::new());
    let table = heap.register_rooted(TableInstance::new(compartment.id(), 0));

    (0..1_000).into_par_iter().for_each(|i| {
        let root = heap.root(table.id());
        let copy = root.clone();
        if i % 10 == 0 {
            heap.collect();
        }
        drop(copy);
        drop(root);
    });

    assert_eq!(heap.root_count(table.id()), Ok(1));
    let metrics = heap.metrics();
    assert_eq!(metrics.roots_added, metrics.roots_removed + 2);
}

#[test]
fn parallel_registration_is_fully_accounted() {
    let heap = ObjectHeap::new();
    let compartment = heap.register_rooted(Compartment::new());

    let ids: Vec<_> = (0..2_000)
        .into_par_iter()
        .map(|_| heap.register(MemoryInstance::new(compartment.id(), 0)))
        .collect();

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(heap.len(), 2_001);

    let stats = heap.collect();
    assert_eq!(stats.garbage, 2_000);
    assert_eq!(stats.survivors, 1);
}
