//! Execution engine.
//!
//! One scheduler instance runs per rank and drives the graph to
//! completion:
//!
//! 1. **Plan**: resolve every reachable unit's placement against the world
//!    size, validate flags, and build per-rank unit state for locally
//!    hosted units. Every rank plans the same component, so even a rank
//!    hosting nothing participates in the collectives.
//! 2. **Drive**: poll the transport inbox and the local rises round-robin;
//!    dispatch queued rows in arrival order. A kernel invocation runs to
//!    completion and may enqueue further rows locally or via transport.
//! 3. **Quiesce**: once local rises are exhausted and the queue is empty,
//!    termination-detect with a two-phase allreduce over the rows-sent and
//!    rows-received counters. A single matching barrier is not enough in
//!    the presence of cycles; quiescence requires two consecutive
//!    agreeing rounds.
//! 4. **Flush**: emit buffered reduce state through normal dispatch, then
//!    quiesce again; repeated until no rank holds pending state, which
//!    settles reduce-into-reduce chains of any depth.
//!
//! Within a single producer-rank-to-consumer-unit stream FIFO order is
//! preserved; across producers no order is promised.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::partitioner::route_targets;
use crate::pipeline::{Edge, GraphSnapshot};
use crate::transport::{ReduceOp, Tag, Transport};
use crate::unit::{DumpSpec, SharedRow, UnitKind, UnitState};
use crate::UnitId;

/// Execute one rank's share of the component reachable from `seeds`.
///
/// This call is a collective: every rank of the world group must enter it
/// with the same graph snapshot and seeds.
pub(crate) fn run_rank(graph: &GraphSnapshot, seeds: &[UnitId], tp: &dyn Transport) -> Result<()> {
    let mut sched = Scheduler::plan(graph, seeds, tp)?;
    tp.barrier()?;
    sched.drive()?;
    sched.flush_loop()?;
    tp.barrier()?;
    Ok(())
}

struct DumpState {
    spec: Arc<DumpSpec>,
    header_done: bool,
    file: Option<File>,
}

struct Scheduler<'a> {
    graph: &'a GraphSnapshot,
    tp: &'a dyn Transport,
    rank: usize,
    /// Resolved placement of every reachable unit (host ranks, ordered).
    places: HashMap<UnitId, Vec<usize>>,
    out_edges: HashMap<UnitId, Vec<Edge>>,
    /// Per-rank state of units hosted here.
    states: HashMap<UnitId, UnitState>,
    /// Rows awaiting dispatch, in arrival order.
    queue: VecDeque<(UnitId, u8, SharedRow)>,
    /// Locally hosted rises and their exhaustion flags.
    rises: Vec<(UnitId, bool)>,
    next_rise: usize,
    /// Round-robin counters for task-routed consumers.
    task_ctr: HashMap<UnitId, usize>,
    dumps: HashMap<UnitId, DumpState>,
    sent: u64,
    recvd: u64,
}

impl<'a> Scheduler<'a> {
    fn plan(graph: &'a GraphSnapshot, seeds: &[UnitId], tp: &'a dyn Transport) -> Result<Self> {
        let rank = tp.rank();
        let world = tp.size();
        let live = graph.reachable(seeds);

        let mut ids: Vec<UnitId> = live.iter().copied().collect();
        ids.sort();

        let mut places = HashMap::new();
        let mut states = HashMap::new();
        let mut rises = Vec::new();
        let mut dumps = HashMap::new();

        for &id in &ids {
            let unit = &graph.units[&id];
            if unit.cfg.scan && unit.cfg.ordered {
                bail!("reduce cannot combine scan with ordered");
            }
            let ranks = unit
                .cfg
                .placement
                .resolve(world)
                .with_context(|| format!("unit {}", id.raw()))?;

            if let Some(slot) = ranks.iter().position(|&r| r == rank) {
                states.insert(id, unit.kernel.new_state(rank, slot, ranks.len()));
                if unit.cfg.kind == UnitKind::Rise {
                    rises.push((id, false));
                }
                if let Some(spec) = &unit.cfg.dump {
                    let file = if spec.prefix.is_empty() {
                        None
                    } else {
                        let path = format!("{}{}.txt", spec.prefix, rank);
                        Some(File::create(&path).with_context(|| format!("dump to {path}"))?)
                    };
                    dumps.insert(
                        id,
                        DumpState {
                            spec: Arc::clone(spec),
                            header_done: false,
                            file,
                        },
                    );
                }
            }
            places.insert(id, ranks);
        }

        let out_edges = {
            let mut m: HashMap<UnitId, Vec<Edge>> = HashMap::new();
            for (id, edges) in graph.out_edges() {
                if live.contains(&id) {
                    m.insert(id, edges);
                }
            }
            m
        };

        Ok(Self {
            graph,
            tp,
            rank,
            places,
            out_edges,
            states,
            queue: VecDeque::new(),
            rises,
            next_rise: 0,
            task_ctr: HashMap::new(),
            dumps,
            sent: 0,
            recvd: 0,
        })
    }

    /// Process until this rank is idle and the group agrees it is done.
    fn drive(&mut self) -> Result<()> {
        loop {
            if self.tp.aborted() {
                bail!("run aborted");
            }
            let mut progress = self.drain_inbox()?;
            while let Some((unit, port, row)) = self.queue.pop_front() {
                self.dispatch(unit, port, row)?;
                self.drain_inbox()?;
                progress = true;
            }
            if self.tick_one_rise()? {
                progress = true;
            }
            if !progress && self.quiescent()? {
                return Ok(());
            }
        }
    }

    /// Pull everything currently in the transport inbox into the queue.
    fn drain_inbox(&mut self) -> Result<bool> {
        let mut got = false;
        while let Some((_src, tag, row)) = self.tp.recv_any()? {
            self.recvd += 1;
            self.queue.push_back((tag.unit, tag.port, row));
            got = true;
        }
        Ok(got)
    }

    /// Advance the next non-exhausted local rise by one step.
    fn tick_one_rise(&mut self) -> Result<bool> {
        let n = self.rises.len();
        for k in 0..n {
            let i = (self.next_rise + k) % n;
            let (id, done) = self.rises[i];
            if done {
                continue;
            }
            self.next_rise = (i + 1) % n;
            let unit = &self.graph.units[&id];
            let mut outs: Vec<SharedRow> = Vec::new();
            let state = self.states.get_mut(&id).expect("rise without state");
            let more = unit
                .kernel
                .tick(&unit.cfg, state.as_mut(), &mut |r| outs.push(r))?;
            if !more {
                self.rises[i].1 = true;
            }
            #[cfg(feature = "metrics")]
            if let Some(m) = &self.graph.metrics {
                m.add_rows(id, outs.len() as u64);
            }
            self.emit(id, outs)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Run one delivered row through its unit's kernel.
    fn dispatch(&mut self, id: UnitId, port: u8, row: SharedRow) -> Result<()> {
        let Some(unit) = self.graph.units.get(&id) else {
            bail!("row delivered to unknown unit {}", id.raw());
        };
        let mut outs: Vec<SharedRow> = Vec::new();
        let Some(state) = self.states.get_mut(&id) else {
            bail!("row routed to rank {} which does not host unit {}", self.rank, id.raw());
        };
        unit.kernel
            .process(&unit.cfg, self.rank, port, &row, state.as_mut(), &mut |r| {
                outs.push(r)
            })?;
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.graph.metrics {
            m.add_rows(id, 1);
        }
        self.emit(id, outs)
    }

    /// Dump and route a unit's freshly produced rows.
    fn emit(&mut self, from: UnitId, rows: Vec<SharedRow>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        if self.dumps.contains_key(&from) {
            self.write_dump(from, &rows)?;
        }
        let Some(edges) = self.out_edges.get(&from).cloned() else {
            return Ok(());
        };
        for row in rows {
            for e in &edges {
                self.route(e, &row)?;
            }
        }
        Ok(())
    }

    fn route(&mut self, e: &Edge, row: &SharedRow) -> Result<()> {
        let dst = &self.graph.units[&e.to];
        let ranks = self.places[&e.to].clone();
        let shuffle = dst.kernel.shuffle_hash(&dst.cfg, row);
        let ctr = self.task_ctr.entry(e.to).or_insert(0);
        let targets = route_targets(self.rank, &ranks, dst.cfg.routing, shuffle, ctr);
        for t in targets {
            if t == self.rank {
                self.queue.push_back((e.to, e.port, row.clone()));
            } else {
                self.tp.send(
                    t,
                    Tag {
                        unit: e.to,
                        port: e.port,
                    },
                    row.clone(),
                )?;
                self.sent += 1;
            }
        }
        Ok(())
    }

    /// Two-phase termination detection over (rows-sent, rows-received).
    ///
    /// Equality of the global counters means no message is in flight; a
    /// second agreeing round guards against a rank racing new work between
    /// the reduction and its own idle check.
    fn quiescent(&mut self) -> Result<bool> {
        let a = self.tp.allreduce(&[self.sent, self.recvd], ReduceOp::Sum)?;
        if a[0] != a[1] {
            return Ok(false);
        }
        let got = self.drain_inbox()?;
        let b = self.tp.allreduce(&[self.sent, self.recvd], ReduceOp::Sum)?;
        Ok(!got && a == b)
    }

    /// Flush buffered reduce state until no rank holds any, re-driving the
    /// graph to quiescence after every round.
    fn flush_loop(&mut self) -> Result<()> {
        loop {
            let mut flushed = 0u64;
            let mut ids: Vec<UnitId> = self.states.keys().copied().collect();
            ids.sort();
            for id in ids {
                let unit = &self.graph.units[&id];
                let mut outs: Vec<SharedRow> = Vec::new();
                let state = self.states.get_mut(&id).expect("flush without state");
                if unit
                    .kernel
                    .flush(&unit.cfg, state.as_mut(), &mut |r| outs.push(r))?
                {
                    flushed = 1;
                }
                self.emit(id, outs)?;
            }
            let any = self.tp.allreduce(&[flushed], ReduceOp::Max)?;
            if any[0] == 0 {
                return Ok(());
            }
            self.drive()?;
        }
    }

    fn write_dump(&mut self, id: UnitId, rows: &[SharedRow]) -> Result<()> {
        let st = self.dumps.get_mut(&id).expect("dump without state");
        let mut buf = String::new();
        if !st.header_done {
            st.header_done = true;
            if !st.spec.header.is_empty() {
                buf.push_str(&st.spec.header);
                buf.push('\n');
            }
        }
        for r in rows {
            if let Some(line) = (st.spec.fmt)(r) {
                buf.push_str(&line);
                buf.push('\n');
            }
        }
        match &mut st.file {
            Some(f) => f.write_all(buf.as_bytes()).context("dump write")?,
            None => print!("{buf}"),
        }
        Ok(())
    }
}
