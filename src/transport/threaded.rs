//! In-process multi-rank transport.
//!
//! Ranks are threads of one process sharing a [`ThreadedGroup`]: a mailbox
//! per rank plus the collective machinery. Rows cross rank boundaries as
//! `Arc` clones—no serialization—which is exactly the semantics an
//! out-of-process substrate would provide after deserializing.
//!
//! The barrier is hand-rolled rather than `std::sync::Barrier` so that a
//! group abort (kernel panic on any rank) wakes every waiter with an error
//! instead of deadlocking the survivors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use super::{ReduceOp, Tag, Transport};
use crate::unit::SharedRow;

type Msg = (usize, Tag, SharedRow);

/// Shared state of one in-process rank group.
pub struct ThreadedGroup {
    nranks: usize,
    inboxes: Vec<Mutex<VecDeque<Msg>>>,
    abort: AtomicBool,
    barrier: GroupBarrier,
    /// Per-rank contribution slots for `allreduce`.
    slots: Mutex<Vec<Vec<u64>>>,
}

impl ThreadedGroup {
    pub fn new(nranks: usize) -> Arc<Self> {
        Arc::new(Self {
            nranks,
            inboxes: (0..nranks).map(|_| Mutex::new(VecDeque::new())).collect(),
            abort: AtomicBool::new(false),
            barrier: GroupBarrier::new(nranks),
            slots: Mutex::new(vec![Vec::new(); nranks]),
        })
    }
}

pub struct ThreadedTransport {
    group: Arc<ThreadedGroup>,
    rank: usize,
}

impl ThreadedTransport {
    /// The endpoint of one rank into `group`.
    pub fn new(group: Arc<ThreadedGroup>, rank: usize) -> ThreadedTransport {
        assert!(rank < group.nranks, "rank {rank} out of range");
        ThreadedTransport { group, rank }
    }
}

impl Transport for ThreadedTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.nranks
    }

    fn send(&self, dst: usize, tag: Tag, row: SharedRow) -> Result<()> {
        if self.aborted() {
            bail!("run aborted");
        }
        if dst >= self.group.nranks {
            bail!("send to rank {dst} outside world of {}", self.group.nranks);
        }
        self.group.inboxes[dst]
            .lock()
            .unwrap()
            .push_back((self.rank, tag, row));
        Ok(())
    }

    fn recv_any(&self) -> Result<Option<(usize, Tag, SharedRow)>> {
        Ok(self.group.inboxes[self.rank].lock().unwrap().pop_front())
    }

    fn barrier(&self) -> Result<()> {
        self.group.barrier.wait(&self.group.abort)
    }

    fn allreduce(&self, vals: &[u64], op: ReduceOp) -> Result<Vec<u64>> {
        {
            let mut slots = self.group.slots.lock().unwrap();
            slots[self.rank] = vals.to_vec();
        }
        // All contributions deposited...
        self.group.barrier.wait(&self.group.abort)?;
        let combined = {
            let slots = self.group.slots.lock().unwrap();
            let mut acc = vec![match op {
                ReduceOp::Sum => 0u64,
                ReduceOp::Max => u64::MIN,
            }; vals.len()];
            for slot in slots.iter() {
                for (a, &v) in acc.iter_mut().zip(slot.iter()) {
                    match op {
                        ReduceOp::Sum => *a += v,
                        ReduceOp::Max => *a = (*a).max(v),
                    }
                }
            }
            acc
        };
        // ...and all ranks done reading before anyone deposits again.
        self.group.barrier.wait(&self.group.abort)?;
        Ok(combined)
    }

    fn signal_abort(&self) {
        self.group.abort.store(true, Ordering::SeqCst);
    }

    fn aborted(&self) -> bool {
        self.group.abort.load(Ordering::SeqCst)
    }
}

/// Reusable counting barrier whose waiters observe a group abort.
struct GroupBarrier {
    n: usize,
    state: Mutex<BarrierState>,
    cv: Condvar,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
}

impl GroupBarrier {
    fn new(n: usize) -> Self {
        Self {
            n,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            cv: Condvar::new(),
        }
    }

    fn wait(&self, abort: &AtomicBool) -> Result<()> {
        if abort.load(Ordering::SeqCst) {
            bail!("run aborted");
        }
        let mut st = self.state.lock().unwrap();
        let gen = st.generation;
        st.arrived += 1;
        if st.arrived == self.n {
            st.arrived = 0;
            st.generation += 1;
            self.cv.notify_all();
            return Ok(());
        }
        while st.generation == gen {
            if abort.load(Ordering::SeqCst) {
                // Wake the rest so every rank unwinds.
                self.cv.notify_all();
                bail!("run aborted");
            }
            let (guard, _timeout) = self
                .cv
                .wait_timeout(st, Duration::from_millis(20))
                .unwrap();
            st = guard;
        }
        if abort.load(Ordering::SeqCst) {
            bail!("run aborted");
        }
        Ok(())
    }
}
