//! In-memory representation of a dataflow pipeline graph.
//!
//! The [`Pipeline`] acts as the central registry for all execution units
//! and their directed connections. It is lightweight, cloneable, and
//! thread-safe via internal `Arc<Mutex<_>>` wrapping, allowing concurrent
//! construction and inspection from different builder contexts.
//!
//! # Overview
//! - Each builder operation on a stream inserts a new [`Unit`].
//! - Edges are `(from, to, port)` triples of [`UnitId`]s; zip consumers use
//!   port 1 for their right input, everything else port 0.
//! - Linking is idempotent—an edge already present is not added twice—and
//!   may form cycles and diamonds.
//! - The scheduler takes a *snapshot* of the current graph state before
//!   execution, so the graph can keep evolving between runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::unit::{Unit, UnitConfig, UnitKernel};
use crate::type_token::TypeTag;
use crate::UnitId;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;

/// A directed connection carrying the producer's output stream into one
/// input port of the consumer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct Edge {
    pub from: UnitId,
    pub to: UnitId,
    pub port: u8,
}

/// Thread-safe pipeline graph structure holding all units and edges.
///
/// The `Pipeline` itself is cheaply cloneable; all clones share the same
/// underlying `PipelineInner`.
pub struct Pipeline {
    pub(crate) inner: Arc<Mutex<PipelineInner>>,
}

/// Inner mutable graph state for a [`Pipeline`].
pub(crate) struct PipelineInner {
    pub next_id: u64,
    pub units: HashMap<UnitId, Unit>,
    pub edges: Vec<Edge>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<MetricsCollector>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PipelineInner {
                next_id: 0,
                units: HashMap::new(),
                edges: vec![],
                #[cfg(feature = "metrics")]
                metrics: None,
            })),
        }
    }
}

impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Pipeline {
    /// Insert a new unit into the graph and return its [`UnitId`].
    pub(crate) fn insert_unit(&self, kernel: Arc<dyn UnitKernel>, cfg: UnitConfig) -> UnitId {
        let mut g = self.inner.lock().unwrap();
        let id = UnitId::new(g.next_id);
        g.next_id += 1;
        g.units.insert(id, Unit { kernel, cfg });
        id
    }

    /// Connect `from`'s output stream into input `port` of `to`.
    ///
    /// Linking the same edge twice is a no-op. Endpoint row types are
    /// asserted via their [`TypeTag`]s; a mismatch means a hand-wired or
    /// rewound builder produced an ill-typed edge.
    ///
    /// # Panics
    ///
    /// If the endpoint types disagree, or either unit is unknown.
    pub(crate) fn connect(&self, from: UnitId, to: UnitId, port: u8) {
        let mut g = self.inner.lock().unwrap();
        let out_tag = g.units.get(&from).expect("unknown producer unit").cfg.out_tag;
        let in_tag = {
            let dst = g.units.get(&to).expect("unknown consumer unit");
            dst.cfg.in_tags[port as usize]
        };
        assert_eq!(
            out_tag.id, in_tag.id,
            "link type mismatch: producer streams {} but consumer expects {}",
            out_tag.name, in_tag.name
        );
        let e = Edge { from, to, port };
        if !g.edges.contains(&e) {
            g.edges.push(e);
        }
    }

    /// Mutate a unit's configuration in place (placement, flags, dump).
    pub(crate) fn update_cfg(&self, id: UnitId, f: impl FnOnce(&mut UnitConfig)) {
        let mut g = self.inner.lock().unwrap();
        let u = g.units.get_mut(&id).expect("unknown unit");
        f(&mut u.cfg);
    }

    /// Drop every edge delivering rows *into* `id`.
    pub(crate) fn unlink_incoming(&self, id: UnitId) {
        self.inner.lock().unwrap().edges.retain(|e| e.to != id);
    }

    /// Drop every edge carrying rows *out of* `id`.
    pub(crate) fn unlink_outgoing(&self, id: UnitId) {
        self.inner.lock().unwrap().edges.retain(|e| e.from != id);
    }

    /// Remove a unit and all its incident edges.
    pub(crate) fn remove_unit(&self, id: UnitId) {
        let mut g = self.inner.lock().unwrap();
        g.units.remove(&id);
        g.edges.retain(|e| e.from != id && e.to != id);
    }

    pub(crate) fn out_tag(&self, id: UnitId) -> TypeTag {
        self.inner.lock().unwrap().units[&id].cfg.out_tag
    }

    /// Return a **snapshot** of the current graph (units and edges).
    ///
    /// Unit kernels are shared by `Arc`, so a snapshot is cheap; the
    /// scheduler executes against it without blocking further building.
    pub(crate) fn snapshot(&self) -> GraphSnapshot {
        let g = self.inner.lock().unwrap();
        GraphSnapshot {
            units: g.units.clone(),
            edges: g.edges.clone(),
            #[cfg(feature = "metrics")]
            metrics: g.metrics.clone(),
        }
    }

    /// Set the metrics collector for this pipeline.
    #[cfg(feature = "metrics")]
    pub fn set_metrics(&self, metrics: MetricsCollector) {
        self.inner.lock().unwrap().metrics = Some(metrics);
    }

    /// Take the metrics collector from this pipeline, leaving `None`.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn take_metrics(&self) -> Option<MetricsCollector> {
        self.inner.lock().unwrap().metrics.take()
    }
}

/// An immutable view of the graph taken at `run` entry.
pub(crate) struct GraphSnapshot {
    pub units: HashMap<UnitId, Unit>,
    pub edges: Vec<Edge>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<MetricsCollector>,
}

impl GraphSnapshot {
    /// Every unit connected to any seed, following edges in both
    /// directions. A run executes exactly this component; unlinked units
    /// stay invisible.
    pub fn reachable(&self, seeds: &[UnitId]) -> HashSet<UnitId> {
        let mut seen: HashSet<UnitId> = seeds
            .iter()
            .copied()
            .filter(|s| self.units.contains_key(s))
            .collect();
        let mut work: Vec<UnitId> = seen.iter().copied().collect();
        while let Some(u) = work.pop() {
            for e in &self.edges {
                let next = if e.from == u {
                    e.to
                } else if e.to == u {
                    e.from
                } else {
                    continue;
                };
                if seen.insert(next) {
                    work.push(next);
                }
            }
        }
        seen
    }

    /// Outgoing edges grouped by producer, in insertion order.
    pub fn out_edges(&self) -> HashMap<UnitId, Vec<Edge>> {
        let mut m: HashMap<UnitId, Vec<Edge>> = HashMap::new();
        for e in &self.edges {
            m.entry(e.from).or_default().push(*e);
        }
        m
    }
}
