//! Type-erased execution units.
//!
//! The typed builder layer compiles down to [`Unit`]s stored in the graph
//! arena: an immutable kernel object (shared by every rank) plus a
//! [`UnitConfig`] describing placement, routing, and reduce flags. All
//! mutable per-run data—reduce accumulators, zip buffers, source
//! cursors—lives in a per-rank state box created by
//! [`UnitKernel::new_state`], so one graph can be executed by many rank
//! threads concurrently.
//!
//! Rows cross the kernel boundary as [`SharedRow`]: a cheaply cloneable,
//! type-erased `Arc`. A row forwarded to several consumers is the *same*
//! allocation; kernels never mutate their input.

use std::any::Any;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use crate::partitioner::{Placement, Routing};
use crate::type_token::TypeTag;

pub mod filter;
pub mod map;
pub mod reduce;
pub mod rise;
pub mod zip;

/// A row in flight: immutable, shared, type-erased.
pub type SharedRow = Arc<dyn Any + Send + Sync>;

/// Per-rank mutable state of one unit.
pub type UnitState = Box<dyn Any + Send>;

/// What kind of unit a node is; used for validation and diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnitKind {
    Rise,
    Map,
    Filter,
    Reduce,
    ReduceAll,
    Zip,
    Relay,
    Collect,
}

/// Sink attachment that prints a unit's output rows.
///
/// An empty prefix writes to stdout; otherwise each rank appends to its own
/// `{prefix}{rank}.txt`. The header is written before the first row.
pub struct DumpSpec {
    pub prefix: String,
    pub header: String,
    pub fmt: Box<dyn Fn(&SharedRow) -> Option<String> + Send + Sync>,
}

/// Immutable per-unit configuration, cheap to clone into a run snapshot.
#[derive(Clone)]
pub struct UnitConfig {
    pub kind: UnitKind,
    pub placement: Placement,
    pub routing: Routing,
    /// Reduce: input is key-contiguous; flush on every key change.
    pub ordered: bool,
    /// Reduce: emit the accumulator snapshot after every input row.
    pub scan: bool,
    /// Reduce: no cross-rank shuffle; every rank reduces locally.
    pub inprocess: bool,
    /// Rise: the source pre-splits its sequence across placement ranks.
    pub split: bool,
    /// Input row tag per port (zip has two ports, everything else one).
    pub in_tags: Vec<TypeTag>,
    pub out_tag: TypeTag,
    pub dump: Option<Arc<DumpSpec>>,
}

impl UnitConfig {
    pub(crate) fn new(kind: UnitKind, in_tags: Vec<TypeTag>, out_tag: TypeTag) -> Self {
        Self {
            kind,
            placement: Placement::All,
            routing: Routing::NONE,
            ordered: false,
            scan: false,
            inprocess: false,
            split: false,
            in_tags,
            out_tag,
            dump: None,
        }
    }
}

/// A node of the graph arena: shared kernel + configuration.
#[derive(Clone)]
pub(crate) struct Unit {
    pub kernel: Arc<dyn UnitKernel>,
    pub cfg: UnitConfig,
}

/// The behavior object of a unit, shared read-only by all ranks.
///
/// `process` handles one delivered row; `tick` drives a rise; `flush`
/// drains buffered reduce state at end of run. Implementations downcast
/// the state box and the row to their concrete types; a mismatch is an
/// engine bug surfaced as an error, never UB.
pub(crate) trait UnitKernel: Send + Sync {
    /// Create this unit's per-rank state. `slot` is the rank's index within
    /// the unit's placement (used by splitting rises), `nslots` the
    /// placement size, `rank` the world rank.
    fn new_state(&self, rank: usize, slot: usize, nslots: usize) -> UnitState;

    /// Handle one input row arriving on `port`.
    fn process(
        &self,
        cfg: &UnitConfig,
        rank: usize,
        port: u8,
        row: &SharedRow,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()>;

    /// Advance a rise by one step. Returns whether more input remains.
    fn tick(
        &self,
        _cfg: &UnitConfig,
        _state: &mut dyn Any,
        _out: &mut dyn FnMut(SharedRow),
    ) -> Result<bool> {
        bail!("tick on a non-source unit");
    }

    /// Emit buffered state (reduce accumulators). Returns whether any
    /// state was pending.
    fn flush(
        &self,
        _cfg: &UnitConfig,
        _state: &mut dyn Any,
        _out: &mut dyn FnMut(SharedRow),
    ) -> Result<bool> {
        Ok(false)
    }

    /// Hash of the row's key columns, for keyed shuffle routing.
    fn shuffle_hash(&self, _cfg: &UnitConfig, _row: &SharedRow) -> Option<u64> {
        None
    }
}

/// Run a user kernel, converting a panic into a run-aborting error.
pub(crate) fn run_kernel<R>(f: impl FnOnce() -> R) -> Result<R> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        anyhow!("kernel failed: {msg}")
    })
}

/// Downcast an input row, reporting the expected type on mismatch.
pub(crate) fn expect_row<'a, T: 'static>(row: &'a SharedRow, what: &str) -> Result<&'a T> {
    row.downcast_ref::<T>().ok_or_else(|| {
        anyhow!(
            "{what}: unexpected row type (expected {})",
            std::any::type_name::<T>()
        )
    })
}

/// Downcast a unit's state box, which the scheduler created via
/// [`UnitKernel::new_state`].
pub(crate) fn expect_state<'a, S: 'static>(state: &'a mut dyn Any, what: &str) -> Result<&'a mut S> {
    state
        .downcast_mut::<S>()
        .ok_or_else(|| anyhow!("{what}: corrupt unit state"))
}
