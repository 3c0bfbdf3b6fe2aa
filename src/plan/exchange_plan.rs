//! `ExchangePlan`: the cached product of the copy-tag geometry engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use crate::plan::tag::CopyTag;

/// Tag lists per remote rank, rank-ordered for deterministic traversal.
pub type RankTagMap = BTreeMap<usize, Vec<CopyTag>>;

/// The full set of local, send, and receive copy tags for one
/// `(identity, parameters)` combination.
///
/// Once published by the registry a plan is immutable; concurrent worker
/// threads read it freely. The reuse counter is the only mutable state and
/// is atomic.
#[derive(Debug)]
pub struct ExchangePlan {
    /// Copies whose source and destination grids live on this rank.
    pub local: Vec<CopyTag>,
    /// Outgoing tags keyed by the receiving rank.
    pub send: RankTagMap,
    /// Incoming tags keyed by the sending rank.
    pub recv: RankTagMap,
    /// True iff no two local tags write overlapping destination cells, so
    /// local copies may run concurrently without ordering.
    pub local_threadsafe: bool,
    /// Same property for the unpack side of the receive tags.
    pub recv_threadsafe: bool,
    nuse: AtomicU64,
}

impl ExchangePlan {
    /// Assemble and normalize a plan: sort every tag list, drop duplicate
    /// tags (coincident periodic images), prune empty rank slots, and
    /// compute the thread-safety flags.
    pub fn assemble(local: Vec<CopyTag>, send: RankTagMap, recv: RankTagMap) -> Self {
        let mut local = local;
        local.sort_unstable();
        local.dedup();
        let normalize = |map: RankTagMap| -> RankTagMap {
            map.into_iter()
                .filter_map(|(rank, mut tags)| {
                    tags.sort_unstable();
                    tags.dedup();
                    (!tags.is_empty()).then_some((rank, tags))
                })
                .collect()
        };
        let send = normalize(send);
        let recv = normalize(recv);
        let local_threadsafe = disjoint_destinations(&local);
        let recv_threadsafe = recv.values().all(|tags| disjoint_destinations(tags));
        let plan = ExchangePlan {
            local,
            send,
            recv,
            local_threadsafe,
            recv_threadsafe,
            nuse: AtomicU64::new(0),
        };
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        plan.debug_assert_invariants();
        plan
    }

    /// Structural invariants every published plan upholds: tag lists
    /// sorted and duplicate-free, no empty rank slot, and no tag whose
    /// boxes disagree on cell count.
    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    fn debug_assert_invariants(&self) {
        let check = |tags: &[CopyTag]| {
            assert!(tags.windows(2).all(|w| w[0] < w[1]), "tags unsorted");
            for t in tags {
                assert_eq!(
                    t.dbox.num_cells(),
                    t.sbox.num_cells(),
                    "tag boxes disagree on cell count"
                );
            }
        };
        check(&self.local);
        for (map_name, map) in [("send", &self.send), ("recv", &self.recv)] {
            for tags in map.values() {
                assert!(!tags.is_empty(), "empty {map_name} rank slot");
                check(tags);
            }
        }
    }

    /// Record one use of this cached plan.
    #[inline]
    pub fn record_use(&self) {
        self.nuse.fetch_add(1, Relaxed);
    }

    /// How many times this plan has been served from the cache.
    #[inline]
    pub fn uses(&self) -> u64 {
        self.nuse.load(Relaxed)
    }

    /// True when there is no work at all.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.send.is_empty() && self.recv.is_empty()
    }

    /// Destination cells covered by the tags bound for `rank`.
    pub fn send_cells(&self, rank: usize) -> usize {
        self.send
            .get(&rank)
            .map_or(0, |tags| tags.iter().map(|t| t.dbox.num_cells()).sum())
    }

    /// Destination cells expected from `rank`.
    pub fn recv_cells(&self, rank: usize) -> usize {
        self.recv
            .get(&rank)
            .map_or(0, |tags| tags.iter().map(|t| t.dbox.num_cells()).sum())
    }

    /// Approximate heap footprint, for cache diagnostics.
    pub fn bytes(&self) -> usize {
        let tag = std::mem::size_of::<CopyTag>();
        let per_map = |m: &RankTagMap| -> usize {
            m.values()
                .map(|v| v.len() * tag + std::mem::size_of::<Vec<CopyTag>>())
                .sum::<usize>()
        };
        self.local.len() * tag + per_map(&self.send) + per_map(&self.recv)
    }
}

/// No two tags write overlapping cells of the same destination grid.
fn disjoint_destinations(tags: &[CopyTag]) -> bool {
    for (n, a) in tags.iter().enumerate() {
        for b in &tags[n + 1..] {
            if a.dst_index == b.dst_index && a.dbox.intersect(&b.dbox).is_some() {
                return false;
            }
        }
    }
    true
}
