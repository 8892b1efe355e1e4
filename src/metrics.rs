//! Run statistics, collected when the `metrics` feature is enabled.
//!
//! A [`MetricsCollector`] attached to a [`Pipeline`](crate::Pipeline)
//! records wall time per run and rows processed per unit, summed across
//! ranks. Retrieve it after a run with
//! [`take_metrics`](crate::Pipeline::take_metrics).
//!
//! ```no_run
//! use rowflow::*;
//! use rowflow::metrics::MetricsCollector;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = Env::local();
//! let p = Pipeline::default();
//! p.set_metrics(MetricsCollector::new());
//! rise(&p, from_mem(vec![1, 2, 3])).map(|&(x,): &(i32,)| x * 2).run(&env)?;
//! if let Some(m) = p.take_metrics() {
//!     m.print();
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::UnitId;

#[derive(Default)]
struct Inner {
    start: Option<Instant>,
    end: Option<Instant>,
    rows: HashMap<u64, u64>,
}

/// Shared, thread-safe collector of run statistics.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Inner>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&self) {
        self.inner.lock().unwrap().start = Some(Instant::now());
    }

    pub(crate) fn record_end(&self) {
        self.inner.lock().unwrap().end = Some(Instant::now());
    }

    pub(crate) fn add_rows(&self, unit: UnitId, n: u64) {
        *self
            .inner
            .lock()
            .unwrap()
            .rows
            .entry(unit.raw())
            .or_insert(0) += n;
    }

    /// Wall time of the last run, if one completed.
    pub fn elapsed(&self) -> Option<Duration> {
        let g = self.inner.lock().unwrap();
        Some(g.end? - g.start?)
    }

    /// Rows processed by one unit, summed across ranks.
    pub fn rows_processed(&self, unit: UnitId) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .rows
            .get(&unit.raw())
            .copied()
            .unwrap_or(0)
    }

    /// All statistics as a JSON value.
    pub fn to_json(&self) -> Value {
        let g = self.inner.lock().unwrap();
        let elapsed_ms = match (g.start, g.end) {
            (Some(s), Some(e)) => Some((e - s).as_millis() as u64),
            _ => None,
        };
        let rows: HashMap<String, u64> =
            g.rows.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        json!({
            "elapsed_ms": elapsed_ms,
            "rows_per_unit": rows,
        })
    }

    /// Print the statistics to stdout.
    pub fn print(&self) {
        println!("{}", self.to_json());
    }

    /// Save the statistics as JSON to a file.
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        std::fs::write(path, self.to_json().to_string())
            .with_context(|| format!("writing metrics to {path}"))
    }
}
