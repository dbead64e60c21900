//! Multi-Index Comprehensive Test Suite
//!
//! Exercises collections end to end through the public facade.
//!
//! ## Test Tiers
//!
//! - **Tier 1**: Identity cache invariants (one instance per ID)
//! - **Tier 2**: Iterator laws (boundaries, movement, equality)
//! - **Tier 3**: Write path (index maintenance, rejected writes)
//! - **Tier 4**: Concurrency and snapshot isolation
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test multi_index_comprehensive
//! ```

// Test modules
mod test_utils;

// Tier 1: Identity
mod tier1_identity_invariants;

// Tier 2: Iterator laws
mod tier2_iterator_laws;

// Tier 3: Write path
mod tier3_write_path;

// Tier 4: Concurrency
mod tier4_concurrency;
