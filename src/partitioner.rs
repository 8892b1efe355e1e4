//! Placement policies and row routing across ranks.
//!
//! Every unit carries a [`Placement`] (which ranks host it) and a
//! [`Routing`] flag set (how producers pick destination ranks among the
//! placement). The scheduler resolves a placement against the world size
//! once per run, then consults [`route_targets`] for every row crossing an
//! edge.

use anyhow::{bail, Result};

/// The set of ranks that host a unit.
///
/// `All` is the whole world; `Ranks` is an explicit set; `Fraction(f)`
/// takes the first `ceil(f * world)` ranks. An empty or out-of-range
/// placement is a misconfiguration reported at `run` entry.
#[derive(Clone, Debug)]
pub enum Placement {
    All,
    Ranks(Vec<usize>),
    Fraction(f64),
}

impl Default for Placement {
    fn default() -> Self {
        Placement::All
    }
}

impl Placement {
    /// Resolve to a concrete, ordered rank list for a given world size.
    pub(crate) fn resolve(&self, world: usize) -> Result<Vec<usize>> {
        let ranks = match self {
            Placement::All => (0..world).collect::<Vec<_>>(),
            Placement::Ranks(rs) => {
                for &r in rs {
                    if r >= world {
                        bail!("placement rank {r} out of range (world size {world})");
                    }
                }
                rs.clone()
            }
            Placement::Fraction(f) => {
                if !(0.0..=1.0).contains(f) {
                    bail!("placement fraction {f} not in [0, 1]");
                }
                let n = ((f * world as f64).ceil() as usize).min(world);
                (0..n).collect()
            }
        };
        if ranks.is_empty() {
            bail!("empty placement set");
        }
        Ok(ranks)
    }
}

/// Flag set controlling how rows are routed to a unit's placement ranks.
///
/// Flags combine with `|`. `DUPE` broadcasts every row to all placement
/// ranks; `TASK` round-robins for load balance without key semantics;
/// `ALL` is shorthand for placing on every world rank; `SHARD` marks a
/// rise whose source pre-splits its sequence across ranks. With no flag
/// set, delivery is in-process where possible.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Routing(u8);

impl Routing {
    pub const NONE: Routing = Routing(0);
    pub const DUPE: Routing = Routing(1);
    pub const TASK: Routing = Routing(1 << 1);
    pub const ALL: Routing = Routing(1 << 2);
    pub const SHARD: Routing = Routing(1 << 3);

    pub fn contains(&self, other: Routing) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Routing {
    type Output = Routing;
    fn bitor(self, rhs: Routing) -> Routing {
        Routing(self.0 | rhs.0)
    }
}

/// Decide the destination rank(s) for one row sent from `me` to a consumer
/// hosted on `ranks`.
///
/// Precedence: `DUPE` broadcasts; a shuffle hash (keyed reduce) picks by
/// key modulo the placement; `TASK` round-robins; otherwise delivery is
/// local when the sender hosts the consumer, and round-robin when it does
/// not.
pub(crate) fn route_targets(
    me: usize,
    ranks: &[usize],
    routing: Routing,
    shuffle: Option<u64>,
    task_counter: &mut usize,
) -> Vec<usize> {
    if routing.contains(Routing::DUPE) {
        return ranks.to_vec();
    }
    if let Some(h) = shuffle {
        return vec![ranks[(h % ranks.len() as u64) as usize]];
    }
    if !routing.contains(Routing::TASK) && ranks.contains(&me) {
        return vec![me];
    }
    let dst = ranks[*task_counter % ranks.len()];
    *task_counter += 1;
    vec![dst]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_resolves_to_prefix() {
        let r = Placement::Fraction(0.5).resolve(4).unwrap();
        assert_eq!(r, vec![0, 1]);
    }

    #[test]
    fn empty_placement_is_rejected() {
        assert!(Placement::Ranks(vec![]).resolve(4).is_err());
        assert!(Placement::Ranks(vec![4]).resolve(4).is_err());
    }

    #[test]
    fn dupe_broadcasts() {
        let mut ctr = 0;
        let t = route_targets(0, &[0, 1, 2], Routing::DUPE | Routing::TASK, None, &mut ctr);
        assert_eq!(t, vec![0, 1, 2]);
    }

    #[test]
    fn task_round_robins() {
        let mut ctr = 0;
        let mut seen = vec![];
        for _ in 0..4 {
            seen.extend(route_targets(0, &[1, 2], Routing::TASK, None, &mut ctr));
        }
        assert_eq!(seen, vec![1, 2, 1, 2]);
    }

    #[test]
    fn shuffle_picks_by_key() {
        let mut ctr = 0;
        let t = route_targets(0, &[3, 5], Routing::NONE, Some(7), &mut ctr);
        assert_eq!(t, vec![5]);
    }
}
