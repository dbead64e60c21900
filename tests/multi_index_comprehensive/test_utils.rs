//! Shared fixtures for the comprehensive suite

#![allow(dead_code)]

use std::sync::{Arc, Once};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use strata_multi_index::{
    Collection, IndexConfig, IndexError, MemoryEngine, Record, SecondaryIndex,
};

static TRACING: Once = Once::new();

/// Route `strata::*` logs at `debug` and above to the test writer.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Record type used across the suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u32,
    pub customer: String,
    pub sku: String,
    pub qty: i32,
}

impl Record for Order {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

pub fn order(id: u32, customer: &str, sku: &str, qty: i32) -> Order {
    Order {
        id,
        customer: customer.to_string(),
        sku: sku.to_string(),
        qty,
    }
}

/// An orders collection with a non-unique customer index and a unique SKU index.
pub struct Orders {
    pub engine: Arc<MemoryEngine>,
    pub orders: Collection<MemoryEngine, Order>,
    pub by_customer: SecondaryIndex<Order, String>,
    pub by_sku: SecondaryIndex<Order, String>,
    pub by_qty: SecondaryIndex<Order, i32>,
}

pub fn orders(config: IndexConfig) -> Orders {
    init_tracing();
    let engine = Arc::new(MemoryEngine::new());
    let mut builder =
        strata_multi_index::CollectionBuilder::new(Arc::clone(&engine), "orders").config(config);
    let by_customer = builder
        .secondary("by_customer", |o: &Order| o.customer.clone())
        .unwrap();
    let by_sku = builder.unique("by_sku", |o: &Order| o.sku.clone()).unwrap();
    let by_qty = builder.secondary("by_qty", |o: &Order| o.qty).unwrap();
    Orders {
        engine,
        orders: builder.build().unwrap(),
        by_customer,
        by_sku,
        by_qty,
    }
}

/// `n` orders spread over four customers, inserted in a seeded shuffled order.
pub fn populated(n: u32, config: IndexConfig) -> Orders {
    let fixture = orders(config);
    let mut ids: Vec<u32> = (0..n).collect();
    ids.shuffle(&mut rand::rngs::StdRng::seed_from_u64(0x5eed));
    for id in ids {
        let customer = ["ann", "bob", "cat", "dan"][(id % 4) as usize];
        let qty = (id as i32 % 11) - 5;
        fixture
            .orders
            .insert(order(id, customer, &format!("sku-{:04}", id), qty))
            .unwrap();
    }
    fixture
}

/// Collect record IDs from a walk, failing on the first error.
pub fn collect_ids<I>(walk: I) -> Vec<u32>
where
    I: Iterator<Item = Result<Arc<Order>, IndexError>>,
{
    walk.map(|r| r.unwrap().id).collect()
}
