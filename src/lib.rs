//! A type-safe, in-process dataflow engine for distributed pipelines over
//! typed column-rows.
//!
//! Sources, transforms, and sinks compose declaratively into a directed
//! graph—cycles and diamonds included—whose edges carry row streams of
//! statically known column tuples. The engine distributes work across
//! worker ranks, routes rows by partitioning keys, and executes the graph
//! to completion with distributed termination detection.
//!
//! ```no_run
//! use rowflow::*;
//! use rowflow::helpers::gt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = Env::local();
//! let p = Pipeline::default();
//! let doubled = rise(&p, from_mem(vec![1, 2, 3, 4, 5]))
//!     .map_to(|&(x,): &(i32,)| x * 2)
//!     .filter_cols::<Ix<1>, _>(gt(4))
//!     .get(&env)?;
//! assert_eq!(doubled, vec![(6,), (8,), (10,)]);
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod flow;
pub mod helpers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod partitioner;
pub mod pipeline;
pub mod row;
mod scheduler;
pub mod testing;
pub mod transport;
pub mod type_token;
pub mod unit;
pub mod unit_id;

pub use env::Env;
pub use flow::{flow, rise, AsStream, Flow, ReduceAllStream, ReduceStream, Stream};
pub use helpers::sources::{from_mem, FromMem};
pub use partitioner::{Placement, Routing};
pub use pipeline::Pipeline;
pub use row::{Concat, Emit, IntoRow, Ix, RowBound, Select, Without};
pub use unit::rise::{SourceAdapter, SourceCursor};
pub use unit_id::UnitId;
