//! Testing utilities for rowflow pipelines.
//!
//! Collection assertions for integration tests: exact order-dependent
//! comparison, order-independent comparison for streams whose scheduling
//! order is not promised, and predicate checks.
//!
//! ```no_run
//! use rowflow::*;
//! use rowflow::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = Env::local();
//! let p = Pipeline::default();
//! let out = rise(&p, from_mem(vec![1, 2, 3]))
//!     .map_to(|&(x,): &(i32,)| x * 2)
//!     .get(&env)?;
//! assert_collections_equal(&out, &[(2,), (4,), (6,)]);
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;

/// Assert two collections are equal element-by-element, in order.
///
/// # Panics
///
/// With a readable diff if lengths or any position differ.
pub fn assert_collections_equal<T: PartialEq + Debug>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "collection sizes differ: actual {actual:?}, expected {expected:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(a, e, "collections differ at index {i}: actual {actual:?}, expected {expected:?}");
    }
}

/// Assert two collections hold the same multiset of elements, ignoring
/// order. Elements are compared through their `Debug` rendering, so no
/// `Ord` bound is required.
pub fn assert_collections_unordered_equal<T: Debug>(actual: &[T], expected: &[T]) {
    let mut a: Vec<String> = actual.iter().map(|t| format!("{t:?}")).collect();
    let mut e: Vec<String> = expected.iter().map(|t| format!("{t:?}")).collect();
    a.sort();
    e.sort();
    assert_eq!(
        a, e,
        "collections differ as multisets: actual {actual:?}, expected {expected:?}"
    );
}

/// Assert every element satisfies the predicate.
pub fn assert_all<T: Debug>(collection: &[T], pred: impl Fn(&T) -> bool) {
    for (i, t) in collection.iter().enumerate() {
        assert!(pred(t), "element at index {i} failed predicate: {t:?}");
    }
}

/// Assert at least one element satisfies the predicate.
pub fn assert_any<T: Debug>(collection: &[T], pred: impl Fn(&T) -> bool) {
    assert!(
        collection.iter().any(pred),
        "no element satisfied the predicate: {collection:?}"
    );
}

/// Assert no element satisfies the predicate.
pub fn assert_none<T: Debug>(collection: &[T], pred: impl Fn(&T) -> bool) {
    for (i, t) in collection.iter().enumerate() {
        assert!(!pred(t), "element at index {i} matched unexpectedly: {t:?}");
    }
}
