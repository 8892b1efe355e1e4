//! Source units and the adapter contract.

use std::any::Any;
use std::sync::Arc;

use anyhow::{bail, Result};

use super::{run_kernel, SharedRow, UnitConfig, UnitKernel, UnitState};
use crate::row::RowBound;

/// External producer a rise pulls from.
///
/// `open` creates one cursor per hosting rank per run. When
/// [`splits`](SourceAdapter::splits) is true the adapter partitions its
/// sequence across the rise's placement (`slot` of `nslots`); otherwise
/// every rank receives the full sequence and `open` is called as `(0, 1)`.
pub trait SourceAdapter: Send + Sync + 'static {
    type Row: RowBound;

    /// Whether the sequence is pre-split across placement ranks.
    fn splits(&self) -> bool {
        false
    }

    fn open(&self, slot: usize, nslots: usize) -> Box<dyn SourceCursor<Row = Self::Row>>;
}

/// One rank's view of a source for one run.
pub trait SourceCursor: Send {
    type Row;

    /// Produce the next batch of rows and whether more remain.
    ///
    /// Returning `(vec![], false)` signals exhaustion. Cursors should make
    /// progress on every call; a cursor forever answering `(vec![], true)`
    /// spins the scheduler.
    fn next(&mut self) -> (Vec<Self::Row>, bool);
}

/// Leaf source node driving an adapter.
pub(crate) struct RiseKernel<S: SourceAdapter> {
    pub src: S,
}

struct RiseState<R> {
    cursor: Box<dyn SourceCursor<Row = R>>,
}

impl<S: SourceAdapter> UnitKernel for RiseKernel<S> {
    fn new_state(&self, _rank: usize, slot: usize, nslots: usize) -> UnitState {
        let cursor = if self.src.splits() {
            self.src.open(slot, nslots)
        } else {
            self.src.open(0, 1)
        };
        Box::new(RiseState::<S::Row> { cursor })
    }

    fn process(
        &self,
        _cfg: &UnitConfig,
        _rank: usize,
        _port: u8,
        _row: &SharedRow,
        _state: &mut dyn Any,
        _out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        bail!("source unit received a row");
    }

    fn tick(
        &self,
        _cfg: &UnitConfig,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<bool> {
        let st = super::expect_state::<RiseState<S::Row>>(state, "rise")?;
        let (rows, more) = run_kernel(|| st.cursor.next())?;
        for r in rows {
            out(Arc::new(r) as SharedRow);
        }
        Ok(more)
    }
}
