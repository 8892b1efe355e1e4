//! Map units.
//!
//! A map kernel is a boxed per-row behavior built by the typed layer: it
//! downcasts the input row, applies the user function to the selected
//! columns, and assembles output rows per the unit's column mode (append,
//! result-only, or transform-in-place). The assembly is monomorphized in
//! the builder, so this file only holds the type-erased shells.

use std::any::Any;

use anyhow::Result;

use super::{expect_row, expect_state, run_kernel, SharedRow, UnitConfig, UnitKernel, UnitState};
use crate::row::RowBound;

/// Stateless map: one boxed closure covering kernel call and row assembly.
pub(crate) struct MapKernel<T> {
    run: Box<dyn Fn(&T, &mut dyn FnMut(SharedRow)) + Send + Sync>,
}

impl<T> MapKernel<T> {
    pub(crate) fn new(
        run: impl Fn(&T, &mut dyn FnMut(SharedRow)) + Send + Sync + 'static,
    ) -> Self {
        Self { run: Box::new(run) }
    }
}

impl<T: RowBound> UnitKernel for MapKernel<T> {
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
        let t = expect_row::<T>(row, "map")?;
        run_kernel(|| (self.run)(t, out))
    }
}

/// Map with rank-local kernel state (serial numbering and the like).
///
/// The state is created per rank per run from `init`, so numbering restarts
/// on every run and never races across ranks.
pub(crate) struct StatefulMapKernel<T, St> {
    init: Box<dyn Fn() -> St + Send + Sync>,
    run: Box<dyn Fn(&mut St, &T, &mut dyn FnMut(SharedRow)) + Send + Sync>,
}

impl<T, St> StatefulMapKernel<T, St> {
    pub(crate) fn new(
        init: impl Fn() -> St + Send + Sync + 'static,
        run: impl Fn(&mut St, &T, &mut dyn FnMut(SharedRow)) + Send + Sync + 'static,
    ) -> Self {
        Self {
            init: Box::new(init),
            run: Box::new(run),
        }
    }
}

impl<T: RowBound, St: Send + 'static> UnitKernel for StatefulMapKernel<T, St> {
    fn new_state(&self, _rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        Box::new((self.init)())
    }

    fn process(
        &self,
        _cfg: &UnitConfig,
        _rank: usize,
        _port: u8,
        row: &SharedRow,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        let t = expect_row::<T>(row, "map")?;
        let st = expect_state::<St>(state, "map")?;
        run_kernel(|| (self.run)(st, t, out))
    }
}
