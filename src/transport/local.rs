//! Single-rank loopback transport.
//!
//! A world of one: sends loop back into the own inbox, collectives are
//! identities. This is the substrate behind `Env::local` and keeps the
//! scheduler code path identical between one rank and many.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};

use super::{ReduceOp, Tag, Transport};
use crate::unit::SharedRow;

#[derive(Default)]
pub struct LoopbackTransport {
    inbox: Mutex<VecDeque<(Tag, SharedRow)>>,
    abort: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LoopbackTransport {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, dst: usize, tag: Tag, row: SharedRow) -> Result<()> {
        if dst != 0 {
            bail!("loopback transport has a single rank, got destination {dst}");
        }
        self.inbox.lock().unwrap().push_back((tag, row));
        Ok(())
    }

    fn recv_any(&self) -> Result<Option<(usize, Tag, SharedRow)>> {
        Ok(self
            .inbox
            .lock()
            .unwrap()
            .pop_front()
            .map(|(tag, row)| (0, tag, row)))
    }

    fn barrier(&self) -> Result<()> {
        if self.aborted() {
            bail!("run aborted");
        }
        Ok(())
    }

    fn allreduce(&self, vals: &[u64], _op: ReduceOp) -> Result<Vec<u64>> {
        if self.aborted() {
            bail!("run aborted");
        }
        Ok(vals.to_vec())
    }

    fn signal_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }
}
