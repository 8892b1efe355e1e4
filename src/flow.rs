//! Typed stream handles, the graph builder, and the linking algebra.
//!
//! [`Stream<In, Out>`] is the builder cursor: each transform inserts a
//! type-erased unit into the shared [`Pipeline`] arena, wires an edge from
//! the current tail, and returns a new handle whose `Out` is the
//! transform's statically computed row type. An ill-typed link does not
//! compile.
//!
//! [`Flow<In, Out>`] is a built sub-graph identified by its two ends: a
//! head that consumes `In` rows and a tail that produces `Out` rows. Flows
//! splice into other graphs via [`Stream::pipe`]/[`Stream::tee`] and via
//! the runtime linking operators:
//!
//! - `&dest << &source` (and the mirrored `&source >> &dest`) append the
//!   source's output stream to the dest's input set and return the dest;
//!   linking the same pair twice is a no-op.
//! - `&a + &b` composes two flows with equal end types into one flow whose
//!   sources and sinks are the union—the building block for diamonds.
//!
//! Cycles are formed by piping back into an upstream flow; the scheduler
//! runs them as long as some unit on the cycle eventually drops every
//! in-flight row.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{Add, Deref, Shl, Shr};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::env::Env;
use crate::partitioner::{Placement, Routing};
use crate::pipeline::Pipeline;
use crate::row::{Concat, Emit, IntoRow, RowBound, Select, Without};
use crate::type_token::TypeTag;
use crate::unit::filter::{CollectKernel, FilterKernel, RelayKernel};
use crate::unit::map::{MapKernel, StatefulMapKernel};
use crate::unit::reduce::{ReduceAllKernel, ReduceKernel};
use crate::unit::rise::{RiseKernel, SourceAdapter};
use crate::unit::zip::ZipKernel;
use crate::unit::{DumpSpec, SharedRow, UnitConfig, UnitKernel, UnitKind};
use crate::UnitId;

/// Builder cursor over a pipeline graph.
///
/// `In` is the row type the chain's head consumes (`()` when the chain
/// starts at a rise); `Out` is the row type the current tail produces.
/// Handles are cheap to clone and share the underlying graph, so keeping
/// an earlier handle around and transforming it again fans the stream out.
pub struct Stream<In, Out> {
    pub(crate) p: Pipeline,
    pub(crate) head: Option<UnitId>,
    pub(crate) tail: UnitId,
    prev: Option<UnitId>,
    _t: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Clone for Stream<In, Out> {
    fn clone(&self) -> Self {
        Self {
            p: self.p.clone(),
            head: self.head,
            tail: self.tail,
            prev: self.prev,
            _t: PhantomData,
        }
    }
}

/// A built sub-graph: head consumes `In`, tail produces `Out`.
pub struct Flow<In, Out> {
    pub(crate) p: Pipeline,
    pub(crate) head: Option<UnitId>,
    pub(crate) tail: UnitId,
    _t: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Clone for Flow<In, Out> {
    fn clone(&self) -> Self {
        Self {
            p: self.p.clone(),
            head: self.head,
            tail: self.tail,
            _t: PhantomData,
        }
    }
}

/// Anything that denotes a producing endpoint of `T` rows.
pub trait AsStream<T> {
    /// The unit whose output stream this handle denotes.
    fn tail_id(&self) -> UnitId;
}

impl<In, T> AsStream<T> for Stream<In, T> {
    fn tail_id(&self) -> UnitId {
        self.tail
    }
}

impl<In, T> AsStream<T> for Flow<In, T> {
    fn tail_id(&self) -> UnitId {
        self.tail
    }
}

/// Start a stream from an external source.
///
/// Without [`SourceAdapter::splits`] every hosting rank replays the full
/// sequence; with it, the sequence is sharded across the rise's placement.
pub fn rise<S: SourceAdapter>(p: &Pipeline, src: S) -> Stream<(), S::Row> {
    let splits = src.splits();
    let mut cfg = UnitConfig::new(
        UnitKind::Rise,
        vec![TypeTag::of::<()>()],
        TypeTag::of::<S::Row>(),
    );
    cfg.split = splits;
    if splits {
        cfg.routing = Routing::SHARD;
    }
    let id = p.insert_unit(Arc::new(RiseKernel { src }), cfg);
    Stream {
        p: p.clone(),
        head: None,
        tail: id,
        prev: None,
        _t: PhantomData,
    }
}

/// An identity flow: consumes and produces `T` rows unchanged.
///
/// Extend it with [`Flow::stream`] to grow a sub-graph that can be built
/// before any source exists, then spliced in later.
pub fn flow<T: RowBound>(p: &Pipeline) -> Flow<T, T> {
    let cfg = UnitConfig::new(
        UnitKind::Relay,
        vec![TypeTag::of::<T>()],
        TypeTag::of::<T>(),
    );
    let id = p.insert_unit(Arc::new(RelayKernel), cfg);
    Flow {
        p: p.clone(),
        head: Some(id),
        tail: id,
        _t: PhantomData,
    }
}

impl<In, Out: RowBound> Stream<In, Out> {
    fn push<NewOut: 'static>(
        &self,
        kernel: Arc<dyn UnitKernel>,
        kind: UnitKind,
    ) -> Stream<In, NewOut> {
        let cfg = UnitConfig::new(kind, vec![TypeTag::of::<Out>()], TypeTag::of::<NewOut>());
        let id = self.p.insert_unit(kernel, cfg);
        self.p.connect(self.tail, id, 0);
        Stream {
            p: self.p.clone(),
            head: self.head,
            tail: id,
            prev: Some(self.tail),
            _t: PhantomData,
        }
    }

    // |-----------|
    // | Map units |
    // |-----------|

    /// Map over the full row; the kernel's result columns are appended
    /// after the input columns.
    pub fn map<F, K>(&self, f: F) -> Stream<In, <Out as Concat<K::Row>>::Out>
    where
        F: Fn(&Out) -> K + Send + Sync + 'static,
        K: Emit,
        Out: Concat<K::Row>,
        <Out as Concat<K::Row>>::Out: RowBound,
    {
        let run = move |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            f(t).emit(&mut |r| out(Arc::new(t.clone().concat(r)) as SharedRow));
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    /// Map over the selected columns; result columns are appended after
    /// the full input row.
    pub fn map_cols<L, F, K>(&self, f: F) -> Stream<In, <Out as Concat<K::Row>>::Out>
    where
        Out: Select<L> + Concat<K::Row>,
        F: Fn(<Out as Select<L>>::Out) -> K + Send + Sync + 'static,
        K: Emit,
        <Out as Concat<K::Row>>::Out: RowBound,
    {
        let run = move |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            f(<Out as Select<L>>::select(t))
                .emit(&mut |r| out(Arc::new(t.clone().concat(r)) as SharedRow));
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    /// Map over the full row; the output row is exactly the kernel's
    /// result columns.
    pub fn map_to<F, K>(&self, f: F) -> Stream<In, K::Row>
    where
        F: Fn(&Out) -> K + Send + Sync + 'static,
        K: Emit,
        K::Row: RowBound,
    {
        let run = move |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            f(t).emit(&mut |r| out(Arc::new(r) as SharedRow));
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    /// Map over the selected columns; the output row is exactly the
    /// kernel's result columns.
    pub fn map_cols_to<L, F, K>(&self, f: F) -> Stream<In, K::Row>
    where
        Out: Select<L>,
        F: Fn(<Out as Select<L>>::Out) -> K + Send + Sync + 'static,
        K: Emit,
        K::Row: RowBound,
    {
        let run = move |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            f(<Out as Select<L>>::select(t)).emit(&mut |r| out(Arc::new(r) as SharedRow));
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    /// Transform the selected columns in place: the non-selected columns
    /// keep their relative order and precede the kernel's result columns.
    pub fn transform<L, F, K>(
        &self,
        f: F,
    ) -> Stream<In, <<Out as Without<L>>::Out as Concat<K::Row>>::Out>
    where
        Out: Select<L> + Without<L>,
        F: Fn(<Out as Select<L>>::Out) -> K + Send + Sync + 'static,
        K: Emit,
        <Out as Without<L>>::Out: Concat<K::Row> + Clone,
        <<Out as Without<L>>::Out as Concat<K::Row>>::Out: RowBound,
    {
        let run = move |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            let rest = <Out as Without<L>>::without(t);
            f(<Out as Select<L>>::select(t))
                .emit(&mut |r| out(Arc::new(rest.clone().concat(r)) as SharedRow));
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    /// Map with rank-local kernel state; result columns are appended.
    ///
    /// `init` seeds a fresh state per rank per run, so stateful kernels
    /// stay deterministic under re-runs and never race across ranks.
    pub fn map_with<St, F, K>(&self, init: St, f: F) -> Stream<In, <Out as Concat<K::Row>>::Out>
    where
        St: RowBound,
        F: Fn(&mut St, &Out) -> K + Send + Sync + 'static,
        K: Emit,
        Out: Concat<K::Row>,
        <Out as Concat<K::Row>>::Out: RowBound,
    {
        let kernel = StatefulMapKernel::new(
            move || init.clone(),
            move |st: &mut St, t: &Out, out: &mut dyn FnMut(SharedRow)| {
                f(st, t).emit(&mut |r| out(Arc::new(t.clone().concat(r)) as SharedRow));
            },
        );
        self.push(Arc::new(kernel), UnitKind::Map)
    }

    /// Append a running per-rank serial number column, starting at `start`.
    pub fn serial_number(&self, start: i64) -> Stream<In, <Out as Concat<(i64,)>>::Out>
    where
        Out: Concat<(i64,)>,
        <Out as Concat<(i64,)>>::Out: RowBound,
    {
        self.map_with(start, |n: &mut i64, _t: &Out| {
            let current = *n;
            *n += 1;
            current
        })
    }

    // |-----------------------|
    // | Filter and reshapers  |
    // |-----------------------|

    /// Forward rows for which the predicate over the full row holds.
    pub fn filter<F>(&self, f: F) -> Stream<In, Out>
    where
        F: Fn(&Out) -> bool + Send + Sync + 'static,
    {
        self.push(Arc::new(FilterKernel::new(f)), UnitKind::Filter)
    }

    /// Forward rows for which the predicate over the selected columns
    /// holds; the forwarded row is always the full input.
    pub fn filter_cols<L, F>(&self, f: F) -> Stream<In, Out>
    where
        Out: Select<L>,
        F: Fn(&<Out as Select<L>>::Out) -> bool + Send + Sync + 'static,
    {
        let pred = move |t: &Out| f(&<Out as Select<L>>::select(t));
        self.push(Arc::new(FilterKernel::new(pred)), UnitKind::Filter)
    }

    /// Reshape the stream to the selected columns, in selection order.
    pub fn cols<L>(&self) -> Stream<In, <<Out as Select<L>>::Out as IntoRow>::Row>
    where
        Out: Select<L>,
        <Out as Select<L>>::Out: IntoRow,
        <<Out as Select<L>>::Out as IntoRow>::Row: RowBound,
    {
        let run = |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            out(Arc::new(<Out as Select<L>>::select(t).into_row()) as SharedRow);
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    /// Reshape the stream by dropping the selected columns.
    pub fn drop_cols<L>(&self) -> Stream<In, <Out as Without<L>>::Out>
    where
        Out: Without<L>,
        <Out as Without<L>>::Out: RowBound,
    {
        let run = |t: &Out, out: &mut dyn FnMut(SharedRow)| {
            out(Arc::new(<Out as Without<L>>::without(t)) as SharedRow);
        };
        self.push(Arc::new(MapKernel::new(run)), UnitKind::Map)
    }

    // |---------|
    // | Reduces |
    // |---------|

    /// Keyed fold: key columns selected by `KL`, values are the remaining
    /// columns. Flushes one `(key…, accumulator…)` row per key at end of
    /// input unless `scan` or `ordered` changes the discipline.
    pub fn reduce<KL, A, F>(
        &self,
        f: F,
        init: A,
    ) -> ReduceStream<
        In,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<<A as IntoRow>::Row>>::Out,
    >
    where
        Out: Select<KL> + Without<KL>,
        <Out as Select<KL>>::Out: RowBound + Hash + Eq + IntoRow,
        <Out as Without<KL>>::Out: RowBound,
        A: RowBound + IntoRow,
        F: Fn(&mut A, &<Out as Select<KL>>::Out, &<Out as Without<KL>>::Out)
            + Send
            + Sync
            + 'static,
        <<Out as Select<KL>>::Out as IntoRow>::Row: Concat<<A as IntoRow>::Row>,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<<A as IntoRow>::Row>>::Out:
            RowBound,
    {
        let kernel = ReduceKernel::new(
            |t: &Out| <Out as Select<KL>>::select(t),
            |t: &Out| <Out as Without<KL>>::without(t),
            init,
            f,
            |k: <Out as Select<KL>>::Out, a: A| {
                Arc::new(k.into_row().concat(a.into_row())) as SharedRow
            },
        );
        ReduceStream {
            s: self.push(Arc::new(kernel), UnitKind::Reduce),
        }
    }

    /// Keyed fold with explicit key and value column selections.
    pub fn reduce_cols<KL, VL, A, F>(
        &self,
        f: F,
        init: A,
    ) -> ReduceStream<
        In,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<<A as IntoRow>::Row>>::Out,
    >
    where
        Out: Select<KL> + Select<VL>,
        <Out as Select<KL>>::Out: RowBound + Hash + Eq + IntoRow,
        <Out as Select<VL>>::Out: RowBound,
        A: RowBound + IntoRow,
        F: Fn(&mut A, &<Out as Select<KL>>::Out, &<Out as Select<VL>>::Out)
            + Send
            + Sync
            + 'static,
        <<Out as Select<KL>>::Out as IntoRow>::Row: Concat<<A as IntoRow>::Row>,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<<A as IntoRow>::Row>>::Out:
            RowBound,
    {
        let kernel = ReduceKernel::new(
            |t: &Out| <Out as Select<KL>>::select(t),
            |t: &Out| <Out as Select<VL>>::select(t),
            init,
            f,
            |k: <Out as Select<KL>>::Out, a: A| {
                Arc::new(k.into_row().concat(a.into_row())) as SharedRow
            },
        );
        ReduceStream {
            s: self.push(Arc::new(kernel), UnitKind::Reduce),
        }
    }

    /// Keyed fold over the materialized value list of each key; values are
    /// the non-key columns. The kernel runs once per key at flush time and
    /// its result columns follow the key columns.
    pub fn reduce_all<KL, F, K>(
        &self,
        f: F,
    ) -> ReduceAllStream<
        In,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<K::Row>>::Out,
    >
    where
        Out: Select<KL> + Without<KL>,
        <Out as Select<KL>>::Out: RowBound + Hash + Eq + IntoRow,
        <Out as Without<KL>>::Out: RowBound,
        F: Fn(&<Out as Select<KL>>::Out, &[<Out as Without<KL>>::Out]) -> K
            + Send
            + Sync
            + 'static,
        K: Emit,
        <<Out as Select<KL>>::Out as IntoRow>::Row: Concat<K::Row> + Clone,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<K::Row>>::Out: RowBound,
    {
        let kernel = ReduceAllKernel::new(
            |t: &Out| <Out as Select<KL>>::select(t),
            |t: &Out| <Out as Without<KL>>::without(t),
            move |k: <Out as Select<KL>>::Out,
                  vals: Vec<<Out as Without<KL>>::Out>,
                  out: &mut dyn FnMut(SharedRow)| {
                let krow = k.clone().into_row();
                f(&k, &vals).emit(&mut |r| out(Arc::new(krow.clone().concat(r)) as SharedRow));
            },
        );
        ReduceAllStream {
            s: self.push(Arc::new(kernel), UnitKind::ReduceAll),
        }
    }

    /// [`reduce_all`](Self::reduce_all) with explicit value columns.
    pub fn reduce_all_cols<KL, VL, F, K>(
        &self,
        f: F,
    ) -> ReduceAllStream<
        In,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<K::Row>>::Out,
    >
    where
        Out: Select<KL> + Select<VL>,
        <Out as Select<KL>>::Out: RowBound + Hash + Eq + IntoRow,
        <Out as Select<VL>>::Out: RowBound,
        F: Fn(&<Out as Select<KL>>::Out, &[<Out as Select<VL>>::Out]) -> K
            + Send
            + Sync
            + 'static,
        K: Emit,
        <<Out as Select<KL>>::Out as IntoRow>::Row: Concat<K::Row> + Clone,
        <<<Out as Select<KL>>::Out as IntoRow>::Row as Concat<K::Row>>::Out: RowBound,
    {
        let kernel = ReduceAllKernel::new(
            |t: &Out| <Out as Select<KL>>::select(t),
            |t: &Out| <Out as Select<VL>>::select(t),
            move |k: <Out as Select<KL>>::Out,
                  vals: Vec<<Out as Select<VL>>::Out>,
                  out: &mut dyn FnMut(SharedRow)| {
                let krow = k.clone().into_row();
                f(&k, &vals).emit(&mut |r| out(Arc::new(krow.clone().concat(r)) as SharedRow));
            },
        );
        ReduceAllStream {
            s: self.push(Arc::new(kernel), UnitKind::ReduceAll),
        }
    }

    // |------------------|
    // | Binary and wiring |
    // |------------------|

    /// Merge with another stream by position: whenever both sides have a
    /// buffered row, emit their concatenation. Leftovers on the longer
    /// side are dropped at end of input.
    pub fn zip<B, S>(&self, other: &S) -> Stream<In, <Out as Concat<B>>::Out>
    where
        B: RowBound,
        S: AsStream<B>,
        Out: Concat<B>,
        <Out as Concat<B>>::Out: RowBound,
    {
        let pair = |l: Out, r: B| Arc::new(l.concat(r)) as SharedRow;
        let cfg = UnitConfig::new(
            UnitKind::Zip,
            vec![TypeTag::of::<Out>(), TypeTag::of::<B>()],
            TypeTag::of::<<Out as Concat<B>>::Out>(),
        );
        let id = self.p.insert_unit(Arc::new(ZipKernel::new(pair)), cfg);
        self.p.connect(self.tail, id, 0);
        self.p.connect(other.tail_id(), id, 1);
        Stream {
            p: self.p.clone(),
            head: self.head,
            tail: id,
            prev: Some(self.tail),
            _t: PhantomData,
        }
    }

    /// Branch a copy of this stream into `branch`; the builder cursor
    /// stays put, so the next transform becomes a sibling of the branch.
    pub fn tee<X>(&self, branch: &Flow<Out, X>) -> Stream<In, Out> {
        let head = branch.head.expect("tee into a flow without an input end");
        self.p.connect(self.tail, head, 0);
        self.clone()
    }

    /// Splice `next` downstream of the current tail and continue building
    /// at `next`'s tail. Piping into an upstream flow closes a cycle.
    pub fn pipe<X>(&self, next: &Flow<Out, X>) -> Stream<In, X> {
        let head = next.head.expect("pipe into a flow without an input end");
        self.p.connect(self.tail, head, 0);
        Stream {
            p: self.p.clone(),
            head: self.head,
            tail: next.tail,
            prev: Some(self.tail),
            _t: PhantomData,
        }
    }

    /// Rewind the builder cursor one unit, to fan out from the previous
    /// tail. `P` must name that unit's output row type; it is checked
    /// against the unit's runtime tag.
    ///
    /// # Panics
    ///
    /// If there is no previous unit in this chain, or `P` mismatches.
    pub fn one_up<P: RowBound>(&self) -> Stream<In, P> {
        let prev = self.prev.expect("no previous unit to rewind to");
        let tag = self.p.out_tag(prev);
        assert_eq!(
            tag.id,
            TypeTag::of::<P>().id,
            "one_up type mismatch: previous unit streams {}",
            tag.name
        );
        Stream {
            p: self.p.clone(),
            head: self.head,
            tail: prev,
            prev: None,
            _t: PhantomData,
        }
    }

    // |---------------------|
    // | Unit configuration  |
    // |---------------------|

    /// Host the current unit on an explicit set of ranks.
    pub fn on_ranks(&self, ranks: &[usize]) -> Self {
        let ranks = ranks.to_vec();
        self.p
            .update_cfg(self.tail, move |c| c.placement = Placement::Ranks(ranks));
        self.clone()
    }

    /// Host the current unit on the first `ceil(f * world)` ranks.
    pub fn on_fraction(&self, f: f64) -> Self {
        self.p
            .update_cfg(self.tail, move |c| c.placement = Placement::Fraction(f));
        self.clone()
    }

    /// Set how producers route rows to the current unit.
    pub fn routing(&self, r: Routing) -> Self {
        self.p.update_cfg(self.tail, move |c| {
            c.routing = r;
            if r.contains(Routing::ALL) {
                c.placement = Placement::All;
            }
        });
        self.clone()
    }

    /// Print this unit's output rows: to stdout with an empty prefix,
    /// otherwise each rank appends to `{prefix}{rank}.txt`. The header is
    /// written before the first row.
    pub fn dump(&self, prefix: &str, header: &str) -> Self
    where
        Out: Debug,
    {
        let spec = Arc::new(DumpSpec {
            prefix: prefix.to_string(),
            header: header.to_string(),
            fmt: Box::new(|row: &SharedRow| {
                row.downcast_ref::<Out>().map(|t| format!("{t:?}"))
            }),
        });
        self.p
            .update_cfg(self.tail, move |c| c.dump = Some(spec));
        self.clone()
    }

    // |----------------------|
    // | Building and running |
    // |----------------------|

    /// Freeze this chain into a [`Flow`] handle for splicing and linking.
    pub fn build(&self) -> Flow<In, Out> {
        Flow {
            p: self.p.clone(),
            head: self.head,
            tail: self.tail,
            _t: PhantomData,
        }
    }

    fn seeds(&self) -> Vec<UnitId> {
        let mut s = vec![self.tail];
        if let Some(h) = self.head {
            s.push(h);
        }
        s
    }

    /// Execute the connected component this chain belongs to. Collective:
    /// every rank of the env participates, hosting units or not.
    pub fn run(&self, env: &Env) -> Result<()> {
        env.execute(&self.p, self.seeds())
    }

    /// Run and collect the tail's rows delivered to rank 0.
    pub fn get(&self, env: &Env) -> Result<Vec<Out>> {
        Ok(self.collect(env)?.remove(&0).unwrap_or_default())
    }

    /// Run and collect the tail's rows per rank, indexed by rank.
    pub fn get_per_rank(&self, env: &Env) -> Result<Vec<Vec<Out>>> {
        let mut m = self.collect(env)?;
        Ok((0..env.world_size())
            .map(|r| m.remove(&r).unwrap_or_default())
            .collect())
    }

    fn collect(&self, env: &Env) -> Result<BTreeMap<usize, Vec<Out>>> {
        let sink = Arc::new(Mutex::new(BTreeMap::new()));
        let kernel = CollectKernel {
            sink: Arc::clone(&sink),
        };
        let cfg = UnitConfig::new(
            UnitKind::Collect,
            vec![TypeTag::of::<Out>()],
            TypeTag::of::<()>(),
        );
        let id = self.p.insert_unit(Arc::new(kernel), cfg);
        self.p.connect(self.tail, id, 0);
        let res = env.execute(&self.p, self.seeds());
        self.p.remove_unit(id);
        res?;
        let m = std::mem::take(&mut *sink.lock().expect("collect sink poisoned"));
        Ok(m)
    }
}

/// A freshly built reduce, exposing the reduce-only knobs.
///
/// Dereferences to [`Stream`], so chains continue naturally.
pub struct ReduceStream<In, Out> {
    s: Stream<In, Out>,
}

impl<In, Out> Clone for ReduceStream<In, Out> {
    fn clone(&self) -> Self {
        Self { s: self.s.clone() }
    }
}

impl<In, Out> Deref for ReduceStream<In, Out> {
    type Target = Stream<In, Out>;
    fn deref(&self) -> &Stream<In, Out> {
        &self.s
    }
}

impl<In, Out> ReduceStream<In, Out> {
    /// Assert the input is key-contiguous: the accumulator for a key is
    /// flushed and discarded as soon as a different key arrives, keeping
    /// output order aligned with input order.
    pub fn ordered(&self) -> Self {
        self.s.p.update_cfg(self.s.tail, |c| c.ordered = true);
        self.clone()
    }

    /// Emit the current per-key accumulator snapshot after every input
    /// row instead of once per key at the end.
    pub fn scan(&self) -> Self {
        self.s.p.update_cfg(self.s.tail, |c| c.scan = true);
        self.clone()
    }

    /// Reduce locally on each rank, without the keyed cross-rank shuffle;
    /// a downstream reduce combines the partials.
    pub fn inprocess(&self) -> Self {
        self.s.p.update_cfg(self.s.tail, |c| c.inprocess = true);
        self.clone()
    }
}

/// A freshly built reduce-all. Like [`ReduceStream`] but with no `scan`:
/// a materializing reduce has nothing meaningful to emit per row.
pub struct ReduceAllStream<In, Out> {
    s: Stream<In, Out>,
}

impl<In, Out> Clone for ReduceAllStream<In, Out> {
    fn clone(&self) -> Self {
        Self { s: self.s.clone() }
    }
}

impl<In, Out> Deref for ReduceAllStream<In, Out> {
    type Target = Stream<In, Out>;
    fn deref(&self) -> &Stream<In, Out> {
        &self.s
    }
}

impl<In, Out> ReduceAllStream<In, Out> {
    pub fn ordered(&self) -> Self {
        self.s.p.update_cfg(self.s.tail, |c| c.ordered = true);
        self.clone()
    }

    pub fn inprocess(&self) -> Self {
        self.s.p.update_cfg(self.s.tail, |c| c.inprocess = true);
        self.clone()
    }
}

impl<In, Out: RowBound> Flow<In, Out> {
    /// Continue building at this flow's tail.
    pub fn stream(&self) -> Stream<In, Out> {
        Stream {
            p: self.p.clone(),
            head: self.head,
            tail: self.tail,
            prev: None,
            _t: PhantomData,
        }
    }

    /// Execute the connected component this flow belongs to.
    pub fn run(&self, env: &Env) -> Result<()> {
        self.stream().run(env)
    }

    /// Run and collect the tail's rows delivered to rank 0.
    pub fn get(&self, env: &Env) -> Result<Vec<Out>> {
        self.stream().get(env)
    }

    /// Run and collect the tail's rows per rank.
    pub fn get_per_rank(&self, env: &Env) -> Result<Vec<Vec<Out>>> {
        self.stream().get_per_rank(env)
    }

    /// Detach this flow from all peers: its head stops receiving, its
    /// tail stops sending. Subsequent runs do not see the removed edges.
    pub fn unlink(&self) {
        if let Some(h) = self.head {
            self.p.unlink_incoming(h);
        }
        self.p.unlink_outgoing(self.tail);
    }
}

// `dest << source`: append the source's output stream to the dest's input
// set; returns the dest for chaining. Idempotent, and commutative with the
// mirrored `>>`.
impl<'a, 'b, SI, I: RowBound, O> Shl<&'b Flow<SI, I>> for &'a Flow<I, O> {
    type Output = Flow<I, O>;
    fn shl(self, src: &'b Flow<SI, I>) -> Flow<I, O> {
        let head = self.head.expect("dest flow has no input end");
        self.p.connect(src.tail, head, 0);
        self.clone()
    }
}

// `source >> dest`: mirror of `<<`.
impl<'a, 'b, SI, I: RowBound, O> Shr<&'b Flow<I, O>> for &'a Flow<SI, I> {
    type Output = Flow<I, O>;
    fn shr(self, dest: &'b Flow<I, O>) -> Flow<I, O> {
        dest << self
    }
}

// `a + b`: union-compose two flows with equal end types. The result's head
// feeds both heads, its tail merges both tails.
impl<'a, 'b, I: RowBound, O: RowBound> Add<&'b Flow<I, O>> for &'a Flow<I, O> {
    type Output = Flow<I, O>;
    fn add(self, other: &'b Flow<I, O>) -> Flow<I, O> {
        let p = &self.p;
        let tail_cfg = UnitConfig::new(
            UnitKind::Relay,
            vec![TypeTag::of::<O>()],
            TypeTag::of::<O>(),
        );
        let tail = p.insert_unit(Arc::new(RelayKernel), tail_cfg);
        p.connect(self.tail, tail, 0);
        p.connect(other.tail, tail, 0);

        let head = if self.head.is_none() && other.head.is_none() {
            None
        } else {
            let head_cfg = UnitConfig::new(
                UnitKind::Relay,
                vec![TypeTag::of::<I>()],
                TypeTag::of::<I>(),
            );
            let head = p.insert_unit(Arc::new(RelayKernel), head_cfg);
            for h in [self.head, other.head].into_iter().flatten() {
                p.connect(head, h, 0);
            }
            Some(head)
        };

        Flow {
            p: p.clone(),
            head,
            tail,
            _t: PhantomData,
        }
    }
}
