//! Tier 4: Concurrency
//!
//! Readers on many threads against a live writer. Snapshot iterators see one
//! consistent state; instances stay unique under contention.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use strata_multi_index::{IndexConfig, Position};

use crate::test_utils::*;

#[test]
fn test_snapshot_walks_see_consistent_state_under_writes() {
    let fx = populated(50, IndexConfig::default());
    let orders = Arc::new(fx.orders);
    let by_qty = fx.by_qty;
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let orders = Arc::clone(&orders);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for round in 0..20 {
                for id in 0..50u32 {
                    orders.modify(&id, |o| o.qty = (o.qty + round) % 17).unwrap();
                }
            }
            done.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let orders = Arc::clone(&orders);
            let by_qty = by_qty.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut walks = 0;
                while !done.load(Ordering::Acquire) || walks == 0 {
                    let view = orders.index(&by_qty);
                    let mut it = view.begin().unwrap();
                    let mut ids = HashSet::new();
                    let mut last_key = i32::MIN;
                    while it.is_valid() {
                        let key = *it.key().unwrap();
                        assert!(key >= last_key);
                        last_key = key;
                        assert!(ids.insert(it.record_id().unwrap().unwrap()));
                        it.get().unwrap();
                        it.advance().unwrap();
                    }
                    assert_eq!(ids.len(), 50);
                    walks += 1;
                }
                walks
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    // Snapshot readers never leave an outdated instance behind in the cache
    let view = orders.index(&by_qty);
    let mut it = view.begin().unwrap();
    while it.is_valid() {
        let record = it.get().unwrap();
        assert_eq!(*it.key().unwrap(), record.qty);
        let id = record.id;
        assert_eq!(orders.get(&id).unwrap().unwrap().qty, record.qty);
        it.advance().unwrap();
    }
}

#[test]
fn test_removed_records_stay_gone_under_snapshot_readers() {
    let fx = populated(40, IndexConfig::default().retain_capacity(64));
    let orders = Arc::new(fx.orders);
    let by_customer = fx.by_customer;
    let barrier = Arc::new(Barrier::new(5));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let orders = Arc::clone(&orders);
            let by_customer = by_customer.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let view = orders.index(&by_customer);
                // Open before the removals so every walk reads the old state
                let mut it = view.begin().unwrap();
                barrier.wait();
                let mut seen = 0;
                while it.is_valid() {
                    it.get().unwrap();
                    seen += 1;
                    it.advance().unwrap();
                }
                seen
            })
        })
        .collect();

    barrier.wait();
    for id in (0..40u32).filter(|id| id % 2 == 0) {
        orders.remove(&id).unwrap();
    }

    for reader in readers {
        assert_eq!(reader.join().unwrap(), 40);
    }
    for id in 0..40u32 {
        assert_eq!(orders.get(&id).unwrap().is_some(), id % 2 == 1);
    }
    assert_eq!(orders.len().unwrap(), 20);
}

#[test]
fn test_contended_finds_share_one_instance() {
    let fx = populated(16, IndexConfig::default());
    let orders = Arc::new(fx.orders);
    let by_sku = fx.by_sku;
    let barrier = Arc::new(Barrier::new(12));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let orders = Arc::clone(&orders);
            let by_sku = by_sku.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let view = orders.index(&by_sku);
                (0..16u32)
                    .map(|id| view.find(format!("sku-{:04}", id)).unwrap().get().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for other in &results[1..] {
        for (a, b) in results[0].iter().zip(other) {
            assert!(Arc::ptr_eq(a, b));
        }
    }
}

#[test]
fn test_iterator_moves_between_threads() {
    let fx = populated(8, IndexConfig::default());
    let view = fx.orders.index(&fx.by_customer);
    let mut it = view.begin().unwrap();
    it.advance().unwrap();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        while it.is_valid() {
            seen.push(it.get().unwrap().id);
            it.advance().unwrap();
        }
        (seen, it.position())
    });

    let (seen, position) = handle.join().unwrap();
    assert_eq!(seen.len(), 7);
    assert_eq!(position, Position::Exhausted);
}
