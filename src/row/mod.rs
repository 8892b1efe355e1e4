//! Row types and the compile-time column algebra.
//!
//! A *row* is a native Rust tuple whose components are its columns; a
//! single-column row is `(T,)`. The algebra in this module manipulates the
//! column-type sequence of a row entirely at compile time:
//!
//! - [`Select`]: pick columns by 1-based index, in any order.
//! - [`Without`]: drop columns by index.
//! - [`Concat`]: append one row to another.
//! - [`IntoRow`]: lift a bare value (scalar, `Vec`, array) into a
//!   one-column row; tuples pass through unchanged.
//! - [`Emit`]: the kernel return convention—how a user function's return
//!   value maps to zero, one, or many output rows.
//!
//! Column indices are the marker type [`Ix`]; index lists are tuples of
//! markers, e.g. `(Ix<1>, Ix<3>)`. The empty list `()` selects nothing
//! (used by reduces as "no key, one global group").
//!
//! The implementations are macro-generated tables over bounded arities
//! (rows up to eight columns, selections up to four). Exceeding those
//! bounds is a compile error, never a runtime one.

pub mod concat;
pub mod emit;
pub mod select;

pub use concat::Concat;
pub use emit::{Emit, IntoRow};
pub use select::{Ix, Select, Without};

/// The standard trait bound for rows carried on an edge.
///
/// The runtime may move rows across rank threads and share one row with
/// several downstream units. To keep this simple and predictable, all row
/// types must be:
///
/// - `'static` (no non-'static borrows inside columns),
/// - `Send + Sync` (safe to pass/share across rank threads),
/// - `Clone` (kernels and buffers duplicate values).
///
/// This blanket impl allows any type fitting these constraints to be used.
pub trait RowBound: 'static + Send + Sync + Clone {}
impl<T> RowBound for T where T: 'static + Send + Sync + Clone {}
