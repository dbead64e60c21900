//! Tier 1: Identity Invariants
//!
//! At most one live instance per record ID, whichever index it is read through.

use std::collections::HashMap;
use std::sync::Arc;

use strata_multi_index::IndexConfig;

use crate::test_utils::*;

#[test]
fn test_every_index_resolves_same_instance() {
    let fx = populated(40, IndexConfig::default());

    let held: HashMap<u32, Arc<Order>> = fx
        .orders
        .primary()
        .iter()
        .unwrap()
        .map(|r| {
            let record = r.unwrap();
            (record.id, record)
        })
        .collect();
    assert_eq!(held.len(), 40);

    for record in fx.orders.index(&fx.by_customer).iter().unwrap() {
        let record = record.unwrap();
        assert!(Arc::ptr_eq(&record, &held[&record.id]));
    }

    let by_sku = fx.orders.index(&fx.by_sku);
    for (id, record) in &held {
        let found = by_sku.find(format!("sku-{:04}", id)).unwrap().get().unwrap();
        assert!(Arc::ptr_eq(&found, record));
    }
}

#[test]
fn test_instance_lives_only_while_held() {
    let fx = populated(4, IndexConfig::default().retain_capacity(0));
    let primary = fx.orders.primary();

    let first = primary.find(2u32).unwrap().get().unwrap();
    let weak = Arc::downgrade(&first);
    assert_eq!(fx.orders.cache().live_count(), 1);

    drop(first);
    assert!(weak.upgrade().is_none());
    assert_eq!(fx.orders.cache().live_count(), 0);
    assert!(fx.orders.cache().purge() >= 1);
}

#[test]
fn test_retention_bounds_resident_records() {
    let fx = populated(40, IndexConfig::default().retain_capacity(5));

    for record in fx.orders.index(&fx.by_qty).iter().unwrap() {
        record.unwrap();
    }
    assert_eq!(fx.orders.cache().live_count(), 5);
    assert_eq!(fx.orders.retention().len(), 5);

    fx.orders.retention().clear();
    assert_eq!(fx.orders.cache().live_count(), 0);
}

#[test]
fn test_modify_publishes_new_instance() {
    let fx = populated(8, IndexConfig::default());
    let by_sku = fx.orders.index(&fx.by_sku);

    let before = by_sku.find("sku-0003").unwrap().get().unwrap();
    let after = fx.orders.modify(&3, |o| o.qty = 99).unwrap();

    assert_eq!(before.qty, (3 % 11) - 5);
    assert_eq!(after.qty, 99);
    let again = by_sku.find("sku-0003").unwrap().get().unwrap();
    assert!(Arc::ptr_eq(&after, &again));
    assert!(!Arc::ptr_eq(&before, &again));
}

#[test]
fn test_hit_ratio_reflects_reuse() {
    let fx = populated(10, IndexConfig::default().retain_capacity(10));
    let primary = fx.orders.primary();

    let first: Vec<_> = primary.iter().unwrap().map(|r| r.unwrap()).collect();
    let second: Vec<_> = primary.iter().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(first.len(), second.len());

    let stats = fx.orders.stats();
    assert_eq!(stats.cache_misses, 0);
    assert_eq!(stats.cache_hits, 20);
    assert_eq!(stats.hit_ratio(), Some(1.0));
}
