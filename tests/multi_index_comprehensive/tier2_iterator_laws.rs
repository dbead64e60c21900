//! Tier 2: Iterator Laws
//!
//! Boundary searches, movement and equality checked against the keys the
//! iterators report, over a signed non-unique index.

use strata_multi_index::{IndexConfig, Position};

use crate::test_utils::*;

#[test]
fn test_lower_bound_is_first_not_less() {
    let fx = populated(60, IndexConfig::default());
    let by_qty = fx.orders.index(&fx.by_qty);

    for needle in -7i32..=7 {
        let lb = by_qty.lower_bound(needle).unwrap();
        if let Some(found) = lb.key() {
            assert!(*found >= needle, "lower_bound({}) landed on {}", needle, found);
        }
        let mut before = lb.try_clone().unwrap();
        before.retreat().unwrap();
        if let Some(prev) = before.key() {
            assert!(*prev < needle, "entry before lower_bound({}) is {}", needle, prev);
        }
    }
}

#[test]
fn test_upper_bound_is_first_greater() {
    let fx = populated(60, IndexConfig::default());
    let by_qty = fx.orders.index(&fx.by_qty);

    for needle in -7i32..=7 {
        let ub = by_qty.upper_bound(needle).unwrap();
        if let Some(found) = ub.key() {
            assert!(*found > needle);
        }
        let mut before = ub.try_clone().unwrap();
        before.retreat().unwrap();
        if let Some(prev) = before.key() {
            assert!(*prev <= needle);
        }
    }
}

#[test]
fn test_equal_range_holds_exactly_the_equivalent_records() {
    let fx = populated(60, IndexConfig::default());
    let by_qty = fx.orders.index(&fx.by_qty);
    let all: Vec<_> = fx
        .orders
        .primary()
        .iter()
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    for needle in -6i32..=6 {
        let expected: Vec<u32> = all.iter().filter(|o| o.qty == needle).map(|o| o.id).collect();
        let walked = collect_ids(by_qty.equal_iter(needle).unwrap());
        assert_eq!(walked, expected, "equal_range({})", needle);
        assert_eq!(by_qty.count(needle).unwrap(), expected.len());
        assert_eq!(by_qty.contains(needle).unwrap(), !expected.is_empty());
    }
}

#[test]
fn test_signed_keys_iterate_in_numeric_order() {
    let fx = populated(30, IndexConfig::default());
    let by_qty = fx.orders.index(&fx.by_qty);

    let quantities: Vec<i32> = by_qty.iter().unwrap().map(|r| r.unwrap().qty).collect();
    let mut sorted = quantities.clone();
    sorted.sort();
    assert_eq!(quantities, sorted);
    assert_eq!(quantities.first(), Some(&-5));
    assert_eq!(quantities.last(), Some(&5));
}

#[test]
fn test_forward_and_backward_walks_mirror() {
    let fx = populated(25, IndexConfig::default());
    let by_customer = fx.orders.index(&fx.by_customer);

    let forward = collect_ids(by_customer.iter().unwrap());

    let mut backward = Vec::new();
    let mut it = by_customer.last().unwrap();
    while it.is_valid() {
        backward.push(it.get().unwrap().id);
        it.retreat().unwrap();
    }
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn test_end_wraps_to_either_boundary() {
    let fx = populated(12, IndexConfig::default());
    let by_customer = fx.orders.index(&fx.by_customer);
    let begin = by_customer.begin().unwrap();

    let mut past_front = begin.try_clone().unwrap();
    past_front.retreat().unwrap();
    assert_eq!(past_front.position(), Position::Exhausted);
    assert!(past_front == by_customer.end());

    let mut from_end = by_customer.end();
    from_end.advance().unwrap();
    assert!(from_end == begin);
    assert!(from_end.same_record(&begin).unwrap());

    let mut from_end = by_customer.end();
    from_end.retreat().unwrap();
    assert_eq!(from_end.key().map(String::as_str), Some("dan"));
}

#[test]
fn test_equal_keys_compare_equal_across_records() {
    let fx = populated(12, IndexConfig::default());
    let by_customer = fx.orders.index(&fx.by_customer);

    let first = by_customer.find("bob").unwrap();
    let mut second = first.try_clone().unwrap();
    second.advance().unwrap();

    // Same key, different records
    assert!(first == second);
    assert!(!first.same_record(&second).unwrap());
}

#[test]
fn test_primary_and_unique_searches_agree() {
    let fx = populated(20, IndexConfig::default());
    let primary = fx.orders.primary();
    let by_sku = fx.orders.index(&fx.by_sku);

    for id in [0u32, 7, 19] {
        let via_id = primary.find(id).unwrap();
        let via_sku = by_sku.find(format!("sku-{:04}", id)).unwrap();
        assert!(via_id.same_record(&via_sku).unwrap());
    }
    assert!(primary.find(20u32).unwrap() == primary.end());
    assert!(by_sku.find("sku-9999").unwrap() == by_sku.end());
}
