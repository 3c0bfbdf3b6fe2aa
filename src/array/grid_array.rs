//! `GridArray`: a distributed array over a partitioned grid.
//!
//! A `GridArray` owns one [`Patch`] per rectangle assigned to this rank.
//! Constructing one registers its [`PartitionKey`] with the injected
//! [`PlanRegistry`]; dropping the last array referencing an identity flushes
//! that identity's cached plans, bounding cache memory without invalidating
//! plans still in use by sibling arrays.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::array::patch::Patch;
use crate::array::Scalar;
use crate::dist::{Partition, PartitionKey, RankMap};
use crate::geom::IndexVec;
use crate::halo_error::PatchHaloError;
use crate::plan::PlanRegistry;

/// Distributed grid array: partition, rank assignment, and local patches.
pub struct GridArray<T: Scalar> {
    partition: Partition,
    ranks: RankMap,
    ncomp: usize,
    ghost: IndexVec,
    my_rank: usize,
    patches: BTreeMap<usize, Patch<T>>,
    registry: Arc<PlanRegistry>,
    key: PartitionKey,
    /// Ghost cells currently up to date, per dimension; maintained by the
    /// fill operations as a convenience for callers.
    ghost_filled: IndexVec,
}

impl<T: Scalar> GridArray<T> {
    /// Define an array over `(partition, ranks)` with `ncomp` components
    /// and `ghost` cells, owning the patches assigned to `my_rank`.
    pub fn new(
        partition: Partition,
        ranks: RankMap,
        ncomp: usize,
        ghost: IndexVec,
        my_rank: usize,
        registry: Arc<PlanRegistry>,
    ) -> Result<Self, PatchHaloError> {
        if ranks.len() != partition.len() {
            return Err(PatchHaloError::RankMapLength {
                boxes: partition.len(),
                ranks: ranks.len(),
            });
        }
        if !ghost.all_ge(IndexVec::zero()) {
            return Err(PatchHaloError::GhostWidth {
                requested: ghost,
                allocated: IndexVec::zero(),
            });
        }
        let patches = partition
            .iter()
            .filter(|&(i, _)| ranks.rank_of(i) == my_rank)
            .map(|(i, rect)| (i, Patch::new(rect, ghost, ncomp)))
            .collect();
        let key = PartitionKey::new(&partition, &ranks);
        registry.register(key);
        Ok(GridArray {
            partition,
            ranks,
            ncomp,
            ghost,
            my_rank,
            patches,
            registry,
            key,
            ghost_filled: IndexVec::zero(),
        })
    }

    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    #[inline]
    pub fn rank_map(&self) -> &RankMap {
        &self.ranks
    }

    #[inline]
    pub fn key(&self) -> PartitionKey {
        self.key
    }

    #[inline]
    pub fn registry(&self) -> &Arc<PlanRegistry> {
        &self.registry
    }

    #[inline]
    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    #[inline]
    pub fn ghost(&self) -> IndexVec {
        self.ghost
    }

    #[inline]
    pub fn my_rank(&self) -> usize {
        self.my_rank
    }

    /// Ghost cells currently known to be up to date.
    #[inline]
    pub fn ghost_filled(&self) -> IndexVec {
        self.ghost_filled
    }

    pub fn set_ghost_filled(&mut self, ng: IndexVec) {
        self.ghost_filled = ng;
    }

    /// The local patch for partition index `i`.
    pub fn patch(&self, i: usize) -> Result<&Patch<T>, PatchHaloError> {
        self.patches.get(&i).ok_or(PatchHaloError::NotLocal(i))
    }

    pub fn patch_mut(&mut self, i: usize) -> Result<&mut Patch<T>, PatchHaloError> {
        self.patches.get_mut(&i).ok_or(PatchHaloError::NotLocal(i))
    }

    /// Iterate local `(partition index, patch)` pairs in index order.
    pub fn local_patches(&self) -> impl Iterator<Item = (usize, &Patch<T>)> {
        self.patches.iter().map(|(&i, p)| (i, p))
    }

    pub fn local_patches_mut(&mut self) -> impl Iterator<Item = (usize, &mut Patch<T>)> {
        self.patches.iter_mut().map(|(&i, p)| (i, p))
    }

    /// Validate a component range against this array.
    pub fn check_comps(&self, comps: &Range<usize>) -> Result<(), PatchHaloError> {
        if comps.start >= comps.end || comps.end > self.ncomp {
            return Err(PatchHaloError::ComponentRange {
                start: comps.start,
                end: comps.end,
                ncomp: self.ncomp,
            });
        }
        Ok(())
    }

    /// Validate a requested exchange ghost width against the allocation.
    pub fn check_ghost(&self, ghost: IndexVec) -> Result<(), PatchHaloError> {
        if !(ghost.all_ge(IndexVec::zero()) && ghost.all_le(self.ghost)) {
            return Err(PatchHaloError::GhostWidth {
                requested: ghost,
                allocated: self.ghost,
            });
        }
        Ok(())
    }

    /// True iff every partition rectangle is cell-centered.
    pub fn is_cell_centered(&self) -> bool {
        self.partition.rects().iter().all(|r| r.centering().is_cell())
    }
}

impl<T: Scalar> Drop for GridArray<T> {
    fn drop(&mut self) {
        if self.registry.deregister(self.key) == 0 {
            self.registry.flush(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use crate::plan::PlanFamily;

    fn two_grid_setup() -> (Partition, RankMap) {
        let r0 = Rect::new(IndexVec::zero(), IndexVec::new(3, 0, 0));
        let r1 = Rect::new(IndexVec::new(4, 0, 0), IndexVec::new(7, 0, 0));
        (Partition::new(vec![r0, r1]), RankMap::new(vec![0, 0]))
    }

    #[test]
    fn owns_only_local_patches() {
        let reg = Arc::new(PlanRegistry::new());
        let (p, _) = two_grid_setup();
        let rm = RankMap::new(vec![0, 1]);
        let a = GridArray::<f64>::new(p, rm, 1, IndexVec::splat(0), 0, reg).unwrap();
        assert!(a.patch(0).is_ok());
        assert!(matches!(a.patch(1), Err(PatchHaloError::NotLocal(1))));
    }

    #[test]
    fn registers_and_flushes_identity() {
        let reg = Arc::new(PlanRegistry::new());
        let (p, rm) = two_grid_setup();
        let dom = crate::geom::Domain::new(Rect::new(IndexVec::zero(), IndexVec::new(7, 0, 0)));
        let g = IndexVec::new(1, 0, 0);

        let a = GridArray::<f64>::new(p.clone(), rm.clone(), 1, g, 0, Arc::clone(&reg)).unwrap();
        let b = GridArray::<f64>::new(p.clone(), rm.clone(), 2, g, 0, Arc::clone(&reg)).unwrap();
        assert_eq!(reg.live_arrays(a.key()), 2);

        reg.fill_plan(&p, &rm, g, &dom, 0, false).unwrap();
        drop(a);
        // sibling still alive: plans survive
        assert_eq!(reg.stats(PlanFamily::Fill).size, 1);
        drop(b);
        assert_eq!(reg.stats(PlanFamily::Fill).size, 0);
    }

    #[test]
    fn component_and_ghost_validation() {
        let reg = Arc::new(PlanRegistry::new());
        let (p, rm) = two_grid_setup();
        let a = GridArray::<f64>::new(p, rm, 2, IndexVec::new(1, 0, 0), 0, reg).unwrap();
        assert!(a.check_comps(&(0..2)).is_ok());
        assert!(a.check_comps(&(2..2)).is_err());
        assert!(a.check_comps(&(0..3)).is_err());
        assert!(a.check_ghost(IndexVec::new(1, 0, 0)).is_ok());
        assert!(a.check_ghost(IndexVec::new(2, 0, 0)).is_err());
    }

    #[test]
    fn rank_map_length_checked() {
        let reg = Arc::new(PlanRegistry::new());
        let (p, _) = two_grid_setup();
        let rm = RankMap::new(vec![0]);
        assert!(matches!(
            GridArray::<f64>::new(p, rm, 1, IndexVec::zero(), 0, reg),
            Err(PatchHaloError::RankMapLength { boxes: 2, ranks: 1 })
        ));
    }
}
