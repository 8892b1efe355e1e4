//! Process-group environment.
//!
//! An [`Env`] owns the transport for a group of worker ranks and makes
//! `run` a *collective*: every rank enters and leaves a run together, even
//! ranks that host none of the executed units. Two shapes ship here:
//!
//! - [`Env::local`]: a single rank, no threads, deterministic dispatch.
//! - [`Env::threaded`]: `n` ranks as threads of a dedicated rayon pool,
//!   one pool thread per rank, communicating through the in-process
//!   transport.
//!
//! There is no process-wide singleton; the env is an explicit handle
//! passed to `run`/`get`.

use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;

use crate::pipeline::Pipeline;
use crate::scheduler::run_rank;
use crate::transport::local::LoopbackTransport;
use crate::transport::threaded::{ThreadedGroup, ThreadedTransport};
use crate::transport::Transport;
use crate::UnitId;

enum EnvKind {
    Local,
    Threaded {
        pool: rayon::ThreadPool,
        nranks: usize,
    },
}

/// Handle to a worker process group.
pub struct Env {
    kind: EnvKind,
}

impl Env {
    /// A one-rank world. Everything runs on the calling thread.
    pub fn local() -> Env {
        Env {
            kind: EnvKind::Local,
        }
    }

    /// An `nranks`-rank world backed by a dedicated thread pool.
    pub fn threaded(nranks: usize) -> Result<Env> {
        let nranks = nranks.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(nranks)
            .thread_name(|i| format!("rowflow-rank-{i}"))
            .build()
            .context("building rank pool")?;
        Ok(Env {
            kind: EnvKind::Threaded { pool, nranks },
        })
    }

    /// A threaded world sized to the hardware (at least two ranks).
    pub fn auto() -> Result<Env> {
        Self::threaded(num_cpus::get().max(2))
    }

    /// Number of ranks in this world.
    pub fn world_size(&self) -> usize {
        match &self.kind {
            EnvKind::Local => 1,
            EnvKind::Threaded { nranks, .. } => *nranks,
        }
    }

    /// Execute the component reachable from `seeds` on every rank.
    pub(crate) fn execute(&self, pipeline: &Pipeline, seeds: Vec<UnitId>) -> Result<()> {
        let graph = pipeline.snapshot();
        #[cfg(feature = "metrics")]
        if let Some(m) = &graph.metrics {
            m.record_start();
        }

        let result = match &self.kind {
            EnvKind::Local => {
                let tp = LoopbackTransport::new();
                run_rank(&graph, &seeds, &tp).map_err(|e| {
                    tp.signal_abort();
                    e
                })
            }
            EnvKind::Threaded { pool, nranks } => {
                let group = ThreadedGroup::new(*nranks);
                let results = pool.broadcast(|ctx| {
                    let tp = ThreadedTransport::new(Arc::clone(&group), ctx.index());
                    run_rank(&graph, &seeds, &tp).map_err(|e| {
                        // Unblock peers stuck in collectives before unwinding.
                        tp.signal_abort();
                        e
                    })
                });
                // Prefer the originating failure over "run aborted" collateral.
                let mut collateral: Option<anyhow::Error> = None;
                let mut primary: Option<anyhow::Error> = None;
                for r in results {
                    if let Err(e) = r {
                        if e.to_string().contains("run aborted") {
                            collateral.get_or_insert(e);
                        } else if primary.is_none() {
                            primary = Some(e);
                        }
                    }
                }
                match primary.or(collateral) {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
        };

        #[cfg(feature = "metrics")]
        if let Some(m) = &graph.metrics {
            m.record_end();
        }
        result
    }

    /// Tear down with an exit code; the caller's last resort after a
    /// failed run.
    pub fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}
