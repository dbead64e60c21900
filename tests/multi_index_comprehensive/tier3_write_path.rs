//! Tier 3: Write Path
//!
//! Every write keeps all partitions in step, in one batch, or writes nothing.

use strata_multi_index::{IndexConfig, IndexError, KvEngine};

use crate::test_utils::*;

fn entry_counts(fx: &Orders) -> [usize; 4] {
    [
        fx.engine.entry_count(fx.orders.primary_partition()),
        fx.engine.entry_count(fx.by_customer.partition()),
        fx.engine.entry_count(fx.by_sku.partition()),
        fx.engine.entry_count(fx.by_qty.partition()),
    ]
}

#[test]
fn test_every_partition_holds_one_entry_per_record() {
    let fx = populated(33, IndexConfig::default());
    assert_eq!(entry_counts(&fx), [33; 4]);
    assert_eq!(fx.orders.len().unwrap(), 33);
}

#[test]
fn test_each_write_is_one_batch() {
    let fx = populated(3, IndexConfig::default());
    let batches = fx.engine.counters().batches_written();

    fx.orders.insert(order(10, "eve", "sku-x", 1)).unwrap();
    fx.orders.modify(&10, |o| o.customer = "fay".into()).unwrap();
    fx.orders.remove(&10).unwrap();

    assert_eq!(fx.engine.counters().batches_written(), batches + 3);
}

#[test]
fn test_remove_clears_every_index() {
    let fx = populated(10, IndexConfig::default());
    fx.orders.remove(&4).unwrap();

    assert_eq!(entry_counts(&fx), [9; 4]);
    assert!(fx.orders.get(&4).unwrap().is_none());
    assert!(!fx.orders.index(&fx.by_sku).contains("sku-0004").unwrap());
    for record in fx.orders.index(&fx.by_customer).iter().unwrap() {
        assert_ne!(record.unwrap().id, 4);
    }

    // The ID is free again
    fx.orders.insert(order(4, "ann", "sku-0004", 0)).unwrap();
    assert_eq!(entry_counts(&fx), [10; 4]);
}

#[test]
fn test_rejected_writes_change_nothing() {
    let fx = populated(6, IndexConfig::default());
    let before = entry_counts(&fx);
    let batches = fx.engine.counters().batches_written();

    let err = fx.orders.insert(order(2, "zed", "sku-new", 0)).unwrap_err();
    assert!(matches!(err, IndexError::DuplicateId(_)));

    let err = fx.orders.insert(order(50, "zed", "sku-0001", 0)).unwrap_err();
    assert!(matches!(err, IndexError::UniqueViolation { .. }));

    let err = fx.orders.modify(&3, |o| o.sku = "sku-0002".into()).unwrap_err();
    assert!(matches!(err, IndexError::UniqueViolation { .. }));

    let err = fx.orders.modify(&3, |o| o.id = 77).unwrap_err();
    assert!(matches!(err, IndexError::IdChanged { .. }));

    let err = fx.orders.remove(&99).unwrap_err();
    assert!(matches!(err, IndexError::NotFound(_)));
    assert!(!err.is_fatal());

    assert_eq!(entry_counts(&fx), before);
    assert_eq!(fx.engine.counters().batches_written(), batches);
    assert_eq!(fx.orders.get(&3).unwrap().unwrap().sku, "sku-0003");
}

#[test]
fn test_modify_moves_only_changed_entries() {
    let fx = populated(6, IndexConfig::default());
    let by_customer = fx.orders.index(&fx.by_customer);
    let by_qty = fx.orders.index(&fx.by_qty);

    let ann_before = by_customer.count("ann").unwrap();
    let qty = fx.orders.get(&0).unwrap().unwrap().qty;
    fx.orders.modify(&0, |o| o.customer = "zoe".into()).unwrap();

    assert_eq!(by_customer.count("ann").unwrap(), ann_before - 1);
    assert_eq!(by_customer.count("zoe").unwrap(), 1);
    assert_eq!(by_qty.count(qty).unwrap(), 1);
    assert_eq!(entry_counts(&fx), [6; 4]);

    let last = by_customer.last().unwrap();
    assert_eq!(last.get().unwrap().id, 0);
}

#[test]
fn test_collection_shares_engine_partitions_by_name() {
    let fx = orders(IndexConfig::default());
    assert_eq!(fx.engine.partition("orders"), Some(fx.orders.primary_partition()));
    assert_eq!(
        fx.engine.partition("orders/by_customer"),
        Some(fx.by_customer.partition())
    );
    assert_eq!(fx.orders.index_names(), vec!["by_customer", "by_sku", "by_qty"]);
    assert!(fx.orders.is_empty().unwrap());
}
