//! Positional merge of two input streams.

use std::any::Any;
use std::collections::VecDeque;

use anyhow::Result;

use super::{expect_row, expect_state, SharedRow, UnitConfig, UnitKernel, UnitState};
use crate::row::RowBound;

/// Binary unit pairing its two inputs by position.
///
/// Port 0 is the left stream, port 1 the right. Whenever both buffers hold
/// a row, one is dequeued from each and their concatenation is emitted.
/// Rows left over when one side ends are dropped with the run state.
pub(crate) struct ZipKernel<L, R> {
    pair: Box<dyn Fn(L, R) -> SharedRow + Send + Sync>,
}

impl<L, R> ZipKernel<L, R> {
    pub(crate) fn new(pair: impl Fn(L, R) -> SharedRow + Send + Sync + 'static) -> Self {
        Self {
            pair: Box::new(pair),
        }
    }
}

struct ZipState<L, R> {
    left: VecDeque<L>,
    right: VecDeque<R>,
}

impl<L: RowBound, R: RowBound> UnitKernel for ZipKernel<L, R> {
    fn new_state(&self, _rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        Box::new(ZipState::<L, R> {
            left: VecDeque::new(),
            right: VecDeque::new(),
        })
    }

    fn process(
        &self,
        _cfg: &UnitConfig,
        _rank: usize,
        port: u8,
        row: &SharedRow,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        let st = expect_state::<ZipState<L, R>>(state, "zip")?;
        match port {
            0 => st.left.push_back(expect_row::<L>(row, "zip")?.clone()),
            _ => st.right.push_back(expect_row::<R>(row, "zip")?.clone()),
        }
        while !st.left.is_empty() && !st.right.is_empty() {
            let l = st.left.pop_front().expect("checked non-empty");
            let r = st.right.pop_front().expect("checked non-empty");
            out((self.pair)(l, r));
        }
        Ok(())
    }
}
