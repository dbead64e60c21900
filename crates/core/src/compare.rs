//! Key-compare policy
//!
//! Each index carries a strict weak order over its key type. The engine's raw
//! byte order is trusted for seeks; the policy is consulted only where byte
//! order cannot answer the question: whether the entry a seek landed on is
//! *equivalent* to the search key (`find`), and whether it is still *not
//! greater* than it (`upper_bound`), and when comparing two iterators.
//!
//! Equivalence is always mutual non-less, never `==`. Two distinct encodings
//! may be equivalent under a policy (see [`FirstField`]).
//!
//! The codec must keep byte order consistent with the policy for every key it
//! encodes. That contract is not re-checked at runtime.

/// A strict weak order over keys of type `K`.
pub trait KeyCompare<K: ?Sized>: Clone + Default + Send + Sync + 'static {
    /// Whether `a` orders strictly before `b`.
    fn less(&self, a: &K, b: &K) -> bool;

    /// Whether neither key orders before the other.
    fn equivalent(&self, a: &K, b: &K) -> bool {
        !self.less(a, b) && !self.less(b, a)
    }
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrdLess;

impl<K: Ord + ?Sized> KeyCompare<K> for OrdLess {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Orders composite keys by their first component only.
///
/// Every key sharing a first component is equivalent, whatever follows.
/// Useful for indices keyed by `(group, tiebreak)` that are searched by group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstField;

impl<A: Ord, B> KeyCompare<(A, B)> for FirstField {
    #[inline]
    fn less(&self, a: &(A, B), b: &(A, B)) -> bool {
        a.0 < b.0
    }
}

impl<A: Ord, B, C> KeyCompare<(A, B, C)> for FirstField {
    #[inline]
    fn less(&self, a: &(A, B, C), b: &(A, B, C)) -> bool {
        a.0 < b.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ord_less_equivalence_is_equality() {
        let cmp = OrdLess;
        assert!(cmp.less(&1, &2));
        assert!(!cmp.less(&2, &2));
        assert!(cmp.equivalent(&2, &2));
        assert!(!cmp.equivalent(&"a", &"b"));
    }

    #[test]
    fn test_first_field_ignores_tail() {
        let cmp = FirstField;
        assert!(cmp.equivalent(&("a", 1), &("a", 9)));
        assert!(cmp.less(&("a", 9), &("b", 0)));
        assert!(!cmp.less(&("a", 1), &("a", 2)));
        assert!(cmp.equivalent(&(1, "x", 2.5), &(1, "y", 0.0)));
    }
}
