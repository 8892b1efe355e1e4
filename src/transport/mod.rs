//! Point-to-point and collective primitives over a set of worker ranks.
//!
//! The engine never talks to a concrete message-passing substrate; it uses
//! this trait. Sends are non-blocking enqueues, receives are polls, and the
//! two collectives—barrier and allreduce—are what termination detection
//! and run entry/exit are built from. Transport errors are fatal: they
//! surface as a run abort, never as a retry.
//!
//! Two implementations ship with the crate: [`local::LoopbackTransport`]
//! for a one-rank world and [`threaded::ThreadedTransport`] which backs a
//! multi-rank world with one thread per rank inside the current process.
//! An out-of-process substrate (e.g. MPI) slots in behind the same trait,
//! with row serialization layered at its boundary.

use anyhow::Result;

use crate::unit::SharedRow;
use crate::UnitId;

pub mod local;
pub mod threaded;

/// Identifies the destination input queue of a message: which unit, and
/// which of its input ports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Tag {
    pub unit: UnitId,
    pub port: u8,
}

/// Combining operator for [`Transport::allreduce`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReduceOp {
    Sum,
    Max,
}

/// One rank's endpoint into the process group.
pub trait Transport: Send + Sync {
    /// This rank's index within the world group.
    fn rank(&self) -> usize;

    /// Number of ranks in the world group.
    fn size(&self) -> usize;

    /// Non-blocking enqueue of a row toward `dst`.
    fn send(&self, dst: usize, tag: Tag, row: SharedRow) -> Result<()>;

    /// Non-blocking poll of this rank's inbox.
    fn recv_any(&self) -> Result<Option<(usize, Tag, SharedRow)>>;

    /// Collective: block until every rank arrives (or the group aborts).
    fn barrier(&self) -> Result<()>;

    /// Collective: combine `vals` element-wise across all ranks.
    fn allreduce(&self, vals: &[u64], op: ReduceOp) -> Result<Vec<u64>>;

    /// Mark the whole group as failed; all collective waits return errors.
    fn signal_abort(&self);

    /// Whether any rank has signalled an abort.
    fn aborted(&self) -> bool;
}
