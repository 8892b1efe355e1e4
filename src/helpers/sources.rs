//! In-memory source adapter.

use std::sync::{Arc, Mutex};

use crate::row::{IntoRow, RowBound};
use crate::unit::rise::{SourceAdapter, SourceCursor};

/// Source over an owned, shared buffer of rows.
///
/// The buffer is shared between clones, so [`buffer`](FromMem::buffer)
/// appends input that an already-risen source observes on its next run.
/// With [`split`](FromMem::split), the sequence is sharded contiguously
/// across the hosting ranks; without it, every rank replays the full
/// sequence.
pub struct FromMem<R> {
    data: Arc<Mutex<Vec<R>>>,
    split: bool,
}

impl<R> Clone for FromMem<R> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            split: self.split,
        }
    }
}

/// Build a [`FromMem`] from any iterable; bare scalars become one-column
/// rows.
pub fn from_mem<I>(items: I) -> FromMem<<I::Item as IntoRow>::Row>
where
    I: IntoIterator,
    I::Item: IntoRow,
    <I::Item as IntoRow>::Row: RowBound,
{
    FromMem {
        data: Arc::new(Mutex::new(
            items.into_iter().map(IntoRow::into_row).collect(),
        )),
        split: false,
    }
}

impl<R: RowBound> FromMem<R> {
    /// Shard the sequence across the rise's placement ranks.
    pub fn split(mut self) -> Self {
        self.split = true;
        self
    }

    /// Append rows for a subsequent run. Affects every clone of this
    /// source, including one already captured by a rise.
    pub fn buffer<I>(&self, extra: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoRow<Row = R>,
    {
        self.data
            .lock()
            .expect("source buffer poisoned")
            .extend(extra.into_iter().map(IntoRow::into_row));
        self.clone()
    }
}

impl<R: RowBound> SourceAdapter for FromMem<R> {
    type Row = R;

    fn splits(&self) -> bool {
        self.split
    }

    fn open(&self, slot: usize, nslots: usize) -> Box<dyn SourceCursor<Row = R>> {
        let data = self.data.lock().expect("source buffer poisoned");
        let rows: Vec<R> = if nslots <= 1 {
            data.clone()
        } else {
            let chunk = data.len().div_ceil(nslots).max(1);
            data.chunks(chunk)
                .nth(slot)
                .map(|c| c.to_vec())
                .unwrap_or_default()
        };
        Box::new(MemCursor { rows, pos: 0 })
    }
}

struct MemCursor<R> {
    rows: Vec<R>,
    pos: usize,
}

impl<R: RowBound> SourceCursor for MemCursor<R> {
    type Row = R;

    fn next(&mut self) -> (Vec<R>, bool) {
        if self.pos >= self.rows.len() {
            return (vec![], false);
        }
        let row = self.rows[self.pos].clone();
        self.pos += 1;
        (vec![row], self.pos < self.rows.len())
    }
}
