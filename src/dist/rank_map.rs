//! `RankMap`: owning rank per partition rectangle, identity-compared.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use crate::dist::partition::Partition;
use crate::halo_error::PatchHaloError;

static NEXT_RANK_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// Assignment of each partition rectangle to an owning rank.
///
/// Like [`Partition`], a `RankMap` carries a generation id assigned at
/// construction; `clone` shares it, rebuilding does not.
#[derive(Clone, Debug)]
pub struct RankMap {
    inner: Arc<RankMapInner>,
}

#[derive(Debug)]
struct RankMapInner {
    id: u64,
    ranks: Vec<usize>,
}

impl RankMap {
    /// Build a rank map, assigning a fresh identity.
    pub fn new(ranks: Vec<usize>) -> Self {
        let id = NEXT_RANK_MAP_ID.fetch_add(1, Relaxed);
        RankMap {
            inner: Arc::new(RankMapInner { id, ranks }),
        }
    }

    /// Round-robin assignment of `n` rectangles over `size` ranks.
    pub fn round_robin(n: usize, size: usize) -> Self {
        Self::new((0..n).map(|i| i % size.max(1)).collect())
    }

    /// Validate against a partition and communicator size.
    pub fn validate(&self, partition: &Partition, size: usize) -> Result<(), PatchHaloError> {
        if self.len() != partition.len() {
            return Err(PatchHaloError::RankMapLength {
                boxes: partition.len(),
                ranks: self.len(),
            });
        }
        if let Some(&rank) = self.inner.ranks.iter().find(|&&r| r >= size) {
            return Err(PatchHaloError::RankOutOfRange { rank, size });
        }
        Ok(())
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.ranks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.ranks.is_empty()
    }

    /// Owning rank of partition index `i`.
    #[inline]
    pub fn rank_of(&self, i: usize) -> usize {
        self.inner.ranks[i]
    }

    #[inline]
    pub fn ranks(&self) -> &[usize] {
        &self.inner.ranks
    }

    #[inline]
    pub fn same_identity(&self, other: &RankMap) -> bool {
        self.inner.id == other.inner.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{IndexVec, Rect};

    #[test]
    fn round_robin_cycles() {
        let rm = RankMap::round_robin(5, 2);
        assert_eq!(rm.ranks(), &[0, 1, 0, 1, 0]);
    }

    #[test]
    fn validate_checks_length_and_range() {
        let p = Partition::new(vec![Rect::new(IndexVec::zero(), IndexVec::splat(1))]);
        assert!(RankMap::new(vec![0]).validate(&p, 1).is_ok());
        assert!(matches!(
            RankMap::new(vec![0, 1]).validate(&p, 2),
            Err(PatchHaloError::RankMapLength { boxes: 1, ranks: 2 })
        ));
        assert!(matches!(
            RankMap::new(vec![3]).validate(&p, 2),
            Err(PatchHaloError::RankOutOfRange { rank: 3, size: 2 })
        ));
    }

    #[test]
    fn identity_semantics() {
        let a = RankMap::new(vec![0, 1]);
        let b = a.clone();
        let c = RankMap::new(vec![0, 1]);
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }
}
