//! Forwarding units: filter, relay, and the collect sink.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::{expect_row, run_kernel, SharedRow, UnitConfig, UnitKernel, UnitState};
use crate::row::RowBound;

/// Filter: forward the entire input row untouched when the predicate holds.
///
/// The predicate sees the columns the builder selected for it; the
/// forwarded row is always the full input (reshaping is a separate unit).
/// Forwarding clones the `Arc`, not the row.
pub(crate) struct FilterKernel<T> {
    pred: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> FilterKernel<T> {
    pub(crate) fn new(pred: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            pred: Box::new(pred),
        }
    }
}

impl<T: RowBound> UnitKernel for FilterKernel<T> {
    fn new_state(&self, _rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        Box::new(())
    }

    fn process(
        &self,
        _cfg: &UnitConfig,
        _rank: usize,
        _port: u8,
        row: &SharedRow,
        _state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        let t = expect_row::<T>(row, "filter")?;
        if run_kernel(|| (self.pred)(t))? {
            out(row.clone());
        }
        Ok(())
    }
}

/// Unconditional pass-through; the joint behind identity flows and flow
/// composition. Untyped—the endpoint tags carry the row type.
pub(crate) struct RelayKernel;

impl UnitKernel for RelayKernel {
    fn new_state(&self, _rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        Box::new(())
    }

    fn process(
        &self,
        _cfg: &UnitConfig,
        _rank: usize,
        _port: u8,
        row: &SharedRow,
        _state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        out(row.clone());
        Ok(())
    }
}

/// Terminal buffer behind `get`: each rank appends its delivered rows to
/// its slot of a shared map, read back after the run.
pub(crate) struct CollectKernel<T> {
    pub sink: Arc<Mutex<BTreeMap<usize, Vec<T>>>>,
}

impl<T: RowBound> UnitKernel for CollectKernel<T> {
    fn new_state(&self, rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        // A fresh run starts from an empty buffer.
        self.sink
            .lock()
            .expect("collect sink poisoned")
            .insert(rank, Vec::new());
        Box::new(())
    }

    fn process(
        &self,
        _cfg: &UnitConfig,
        rank: usize,
        _port: u8,
        row: &SharedRow,
        _state: &mut dyn Any,
        _out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        let t = expect_row::<T>(row, "collect")?;
        self.sink
            .lock()
            .expect("collect sink poisoned")
            .entry(rank)
            .or_default()
            .push(t.clone());
        Ok(())
    }
}
