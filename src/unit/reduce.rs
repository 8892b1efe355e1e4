//! Keyed folds.
//!
//! A reduce owns a per-key accumulator map for the duration of one run.
//! Three emission disciplines share the kernel:
//!
//! - **batched** (default): accumulate until end of input, then flush one
//!   row `(key…, accumulator…)` per key;
//! - **ordered**: the input is asserted key-contiguous; the single live
//!   accumulator is flushed the moment a different key arrives, so output
//!   order follows input order;
//! - **scan**: a snapshot row is emitted after every input row.
//!
//! [`ReduceAllKernel`] instead materializes the full value list per key and
//! hands it to the kernel at flush time.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use anyhow::Result;

use super::{expect_row, expect_state, run_kernel, SharedRow, UnitConfig, UnitKernel, UnitState};
use crate::row::RowBound;

fn hash_key<K: Hash>(k: &K) -> u64 {
    let mut h = DefaultHasher::new();
    k.hash(&mut h);
    h.finish()
}

pub(crate) struct ReduceKernel<T, Key, Val, A> {
    key: Box<dyn Fn(&T) -> Key + Send + Sync>,
    val: Box<dyn Fn(&T) -> Val + Send + Sync>,
    init: A,
    fold: Box<dyn Fn(&mut A, &Key, &Val) + Send + Sync>,
    finish: Box<dyn Fn(Key, A) -> SharedRow + Send + Sync>,
}

impl<T, Key, Val, A> ReduceKernel<T, Key, Val, A> {
    pub(crate) fn new(
        key: impl Fn(&T) -> Key + Send + Sync + 'static,
        val: impl Fn(&T) -> Val + Send + Sync + 'static,
        init: A,
        fold: impl Fn(&mut A, &Key, &Val) + Send + Sync + 'static,
        finish: impl Fn(Key, A) -> SharedRow + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: Box::new(key),
            val: Box::new(val),
            init,
            fold: Box::new(fold),
            finish: Box::new(finish),
        }
    }
}

struct ReduceState<Key, A> {
    groups: HashMap<Key, A>,
    /// Ordered mode: the one live (key, accumulator) pair.
    current: Option<(Key, A)>,
}

impl<T, Key, Val, A> UnitKernel for ReduceKernel<T, Key, Val, A>
where
    T: RowBound,
    Key: RowBound + Hash + Eq,
    Val: RowBound,
    A: RowBound,
{
    fn new_state(&self, _rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        Box::new(ReduceState::<Key, A> {
            groups: HashMap::new(),
            current: None,
        })
    }

    fn process(
        &self,
        cfg: &UnitConfig,
        _rank: usize,
        _port: u8,
        row: &SharedRow,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        let t = expect_row::<T>(row, "reduce")?;
        let st = expect_state::<ReduceState<Key, A>>(state, "reduce")?;
        let k = (self.key)(t);
        let v = (self.val)(t);

        if cfg.ordered {
            match st.current.take() {
                Some((ck, mut acc)) if ck == k => {
                    run_kernel(|| (self.fold)(&mut acc, &k, &v))?;
                    st.current = Some((ck, acc));
                }
                prev => {
                    if let Some((ck, acc)) = prev {
                        out((self.finish)(ck, acc));
                    }
                    let mut acc = self.init.clone();
                    run_kernel(|| (self.fold)(&mut acc, &k, &v))?;
                    st.current = Some((k, acc));
                }
            }
            return Ok(());
        }

        let acc = st
            .groups
            .entry(k.clone())
            .or_insert_with(|| self.init.clone());
        run_kernel(|| (self.fold)(&mut *acc, &k, &v))?;
        if cfg.scan {
            let snap = acc.clone();
            out((self.finish)(k, snap));
        }
        Ok(())
    }

    fn flush(
        &self,
        cfg: &UnitConfig,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<bool> {
        let st = expect_state::<ReduceState<Key, A>>(state, "reduce")?;
        let mut any = false;
        if let Some((k, acc)) = st.current.take() {
            out((self.finish)(k, acc));
            any = true;
        }
        if cfg.scan {
            // Snapshots already went out per row.
            st.groups.clear();
        } else {
            for (k, acc) in st.groups.drain() {
                out((self.finish)(k, acc));
                any = true;
            }
        }
        Ok(any)
    }

    fn shuffle_hash(&self, cfg: &UnitConfig, row: &SharedRow) -> Option<u64> {
        if cfg.inprocess {
            return None;
        }
        let t = row.downcast_ref::<T>()?;
        Some(hash_key(&(self.key)(t)))
    }
}

/// Keyed fold over the materialized value list of each key.
pub(crate) struct ReduceAllKernel<T, Key, Val> {
    key: Box<dyn Fn(&T) -> Key + Send + Sync>,
    val: Box<dyn Fn(&T) -> Val + Send + Sync>,
    apply: Box<dyn Fn(Key, Vec<Val>, &mut dyn FnMut(SharedRow)) + Send + Sync>,
}

impl<T, Key, Val> ReduceAllKernel<T, Key, Val> {
    pub(crate) fn new(
        key: impl Fn(&T) -> Key + Send + Sync + 'static,
        val: impl Fn(&T) -> Val + Send + Sync + 'static,
        apply: impl Fn(Key, Vec<Val>, &mut dyn FnMut(SharedRow)) + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: Box::new(key),
            val: Box::new(val),
            apply: Box::new(apply),
        }
    }
}

struct ReduceAllState<Key, Val> {
    groups: HashMap<Key, Vec<Val>>,
    current: Option<(Key, Vec<Val>)>,
}

impl<T, Key, Val> UnitKernel for ReduceAllKernel<T, Key, Val>
where
    T: RowBound,
    Key: RowBound + Hash + Eq,
    Val: RowBound,
{
    fn new_state(&self, _rank: usize, _slot: usize, _nslots: usize) -> UnitState {
        Box::new(ReduceAllState::<Key, Val> {
            groups: HashMap::new(),
            current: None,
        })
    }

    fn process(
        &self,
        cfg: &UnitConfig,
        _rank: usize,
        _port: u8,
        row: &SharedRow,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<()> {
        let t = expect_row::<T>(row, "reduce_all")?;
        let st = expect_state::<ReduceAllState<Key, Val>>(state, "reduce_all")?;
        let k = (self.key)(t);
        let v = (self.val)(t);

        if cfg.ordered {
            match st.current.take() {
                Some((ck, mut vals)) if ck == k => {
                    vals.push(v);
                    st.current = Some((ck, vals));
                }
                prev => {
                    if let Some((ck, vals)) = prev {
                        run_kernel(|| (self.apply)(ck, vals, &mut *out))?;
                    }
                    st.current = Some((k, vec![v]));
                }
            }
        } else {
            st.groups.entry(k).or_default().push(v);
        }
        Ok(())
    }

    fn flush(
        &self,
        _cfg: &UnitConfig,
        state: &mut dyn Any,
        out: &mut dyn FnMut(SharedRow),
    ) -> Result<bool> {
        let st = expect_state::<ReduceAllState<Key, Val>>(state, "reduce_all")?;
        let mut any = false;
        if let Some((k, vals)) = st.current.take() {
            run_kernel(|| (self.apply)(k, vals, &mut *out))?;
            any = true;
        }
        for (k, vals) in st.groups.drain() {
            run_kernel(|| (self.apply)(k, vals, &mut *out))?;
            any = true;
        }
        Ok(any)
    }

    fn shuffle_hash(&self, cfg: &UnitConfig, row: &SharedRow) -> Option<u64> {
        if cfg.inprocess {
            return None;
        }
        let t = row.downcast_ref::<T>()?;
        Some(hash_key(&(self.key)(t)))
    }
}
