//! The copy-tag geometry engine.
//!
//! Given one or two partitions, a ghost width, and a periodicity or
//! coordinate-transform rule, these builders compute every data movement
//! needed on the calling rank and classify it as local, send, or receive.
//! Tags for grids owned by neither endpoint are never materialized.
//!
//! Plan construction is pure geometry: it never touches the network, so a
//! cache miss can be served while other threads keep computing.

use log::trace;

use crate::dist::{Partition, RankMap};
use crate::geom::{Domain, IndexVec, Rect};
use crate::halo_error::PatchHaloError;
use crate::plan::exchange_plan::{ExchangePlan, RankTagMap};
use crate::plan::tag::CopyTag;
use crate::xform::CoordMap;

/// Tile extents used to split local destinations when a fill requests
/// independent-write safety; chosen long in the unit-stride dimension.
pub const COMM_TILE: IndexVec = IndexVec([1_024_000, 8, 8]);

struct TagSink {
    my_rank: usize,
    local: Vec<CopyTag>,
    send: RankTagMap,
    recv: RankTagMap,
    split_local: bool,
}

impl TagSink {
    fn new(my_rank: usize, split_local: bool) -> Self {
        TagSink {
            my_rank,
            local: Vec::new(),
            send: RankTagMap::new(),
            recv: RankTagMap::new(),
            split_local,
        }
    }

    /// Classify one movement; the caller guarantees `dbox` and `sbox` are
    /// congruent under the active transform.
    fn push(
        &mut self,
        dbox: Rect,
        sbox: Rect,
        dst_index: usize,
        src_index: usize,
        dst_owner: usize,
        src_owner: usize,
    ) {
        if dst_owner == src_owner {
            if dst_owner != self.my_rank {
                return;
            }
            if self.split_local {
                // shift-invariant tiling: tile the destination and carry
                // the same relative split to the source box
                let shift = sbox.lo() - dbox.lo();
                for tile in dbox.tiles(COMM_TILE) {
                    self.local
                        .push(CopyTag::new(tile, tile.shift(shift), dst_index, src_index));
                }
            } else {
                self.local.push(CopyTag::new(dbox, sbox, dst_index, src_index));
            }
        } else if src_owner == self.my_rank {
            self.send
                .entry(dst_owner)
                .or_default()
                .push(CopyTag::new(dbox, sbox, dst_index, src_index));
        } else if dst_owner == self.my_rank {
            self.recv
                .entry(src_owner)
                .or_default()
                .push(CopyTag::new(dbox, sbox, dst_index, src_index));
        }
    }

    fn finish(self) -> ExchangePlan {
        ExchangePlan::assemble(self.local, self.send, self.recv)
    }
}

/// Build a boundary-fill plan: every ghost cell of every grid receives the
/// value of the grid that owns that cell, honoring periodic wrap.
///
/// `cross` splits local destinations into tiles so local copies can run
/// concurrently without write overlap between work items.
pub fn build_fill_plan(
    partition: &Partition,
    ranks: &RankMap,
    ghost: IndexVec,
    domain: &Domain,
    my_rank: usize,
    cross: bool,
) -> Result<ExchangePlan, PatchHaloError> {
    let shifts = domain.shifts_covering(ghost);
    let mut sink = TagSink::new(my_rank, cross);
    for (i, rect_i) in partition.iter() {
        domain.validate_rect(&rect_i)?;
        let dst_owner = ranks.rank_of(i);
        let grown = rect_i.grow(ghost);
        // the region to fill is the ghost shell, never the valid region
        for cand in grown.box_diff(&rect_i) {
            for (k, rect_k) in partition.iter() {
                let src_owner = ranks.rank_of(k);
                if dst_owner != my_rank && src_owner != my_rank {
                    continue;
                }
                for &s in &shifts {
                    if let Some(isect) = cand.intersect(&rect_k.shift(s)) {
                        sink.push(isect, isect.shift(-s), i, k, dst_owner, src_owner);
                    }
                }
            }
        }
    }
    let plan = sink.finish();
    trace!(
        "fill plan: {} local, {} send ranks, {} recv ranks",
        plan.local.len(),
        plan.send.len(),
        plan.recv.len()
    );
    Ok(plan)
}

/// Build a cross-partition copy plan from `src` grids into `dst` grids.
///
/// The destination region is each grid grown by `dst_ghost` (restricted to
/// the ghost shell when `to_ghost_only` is set); sources are broadened by
/// their own ghost width and by periodic images.
#[allow(clippy::too_many_arguments)]
pub fn build_copy_plan(
    dst_partition: &Partition,
    dst_ranks: &RankMap,
    dst_ghost: IndexVec,
    src_partition: &Partition,
    src_ranks: &RankMap,
    src_ghost: IndexVec,
    domain: &Domain,
    my_rank: usize,
    to_ghost_only: bool,
) -> Result<ExchangePlan, PatchHaloError> {
    let same_identity =
        dst_partition.same_identity(src_partition) && dst_ranks.same_identity(src_ranks);
    let shifts = domain.shifts_covering(dst_ghost + src_ghost);
    let mut sink = TagSink::new(my_rank, false);
    for (i, drect) in dst_partition.iter() {
        domain.validate_rect(&drect)?;
        let dst_owner = dst_ranks.rank_of(i);
        let grown = drect.grow(dst_ghost);
        let candidates = if to_ghost_only {
            grown.box_diff(&drect)
        } else {
            vec![grown]
        };
        for cand in &candidates {
            for (k, srect) in src_partition.iter() {
                let src_owner = src_ranks.rank_of(k);
                if dst_owner != my_rank && src_owner != my_rank {
                    continue;
                }
                let sgrown = srect.grow(src_ghost);
                for &s in &shifts {
                    if let Some(isect) = cand.intersect(&sgrown.shift(s)) {
                        // a grid never copies onto itself in place
                        if same_identity && i == k && s == IndexVec::zero() {
                            continue;
                        }
                        sink.push(isect, isect.shift(-s), i, k, dst_owner, src_owner);
                    }
                }
            }
        }
    }
    Ok(sink.finish())
}

/// Build a symmetry-fill plan: ghost regions outside the (periodically
/// grown) domain read through `map` from the interior.
///
/// Destination candidates are split at the map's cut planes so every piece
/// maps affinely; intersections in source space are carried back through
/// the exact per-piece inverse.
pub fn build_transform_plan<M: CoordMap>(
    partition: &Partition,
    ranks: &RankMap,
    ghost: IndexVec,
    domain: &Domain,
    my_rank: usize,
    map: M,
) -> Result<ExchangePlan, PatchHaloError> {
    let pdom = domain.grow_periodic(ghost);
    let mut sink = TagSink::new(my_rank, false);
    for (i, rect_i) in partition.iter() {
        domain.validate_rect(&rect_i)?;
        let dst_owner = ranks.rank_of(i);
        let grown = rect_i.grow(ghost);
        for cand in grown.box_diff(&pdom) {
            for (piece, aff) in map.pieces(&cand) {
                let img = aff.apply_rect(&piece);
                let inv = aff.inverse();
                for (k, rect_k) in partition.iter() {
                    let src_owner = ranks.rank_of(k);
                    if dst_owner != my_rank && src_owner != my_rank {
                        continue;
                    }
                    if let Some(sisect) = img.intersect(&rect_k) {
                        let dsub = inv.apply_rect(&sisect);
                        debug_assert!(piece.contains_rect(&dsub));
                        sink.push(dsub, sisect, i, k, dst_owner, src_owner);
                    }
                }
            }
        }
    }
    Ok(sink.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Centering;

    fn rect1d(lo: i32, hi: i32) -> Rect {
        Rect::new(IndexVec::new(lo, 0, 0), IndexVec::new(hi, 0, 0))
    }

    /// Two grids on one rank, non-periodic: each interface produces one
    /// local tag per side.
    #[test]
    fn fill_two_grids_serial() {
        let p = Partition::new(vec![rect1d(0, 3), rect1d(4, 7)]);
        let rm = RankMap::new(vec![0, 0]);
        let dom = Domain::new(rect1d(0, 7));
        let plan =
            build_fill_plan(&p, &rm, IndexVec::new(1, 0, 0), &dom, 0, false).unwrap();
        assert!(plan.send.is_empty() && plan.recv.is_empty());
        assert_eq!(plan.local.len(), 2);
        // ghost cell 4 of grid 0 reads interior cell 4 of grid 1
        let t = plan
            .local
            .iter()
            .find(|t| t.dst_index == 0)
            .expect("tag filling grid 0");
        assert_eq!(t.dbox, rect1d(4, 4));
        assert_eq!(t.sbox, rect1d(4, 4));
        assert_eq!(t.src_index, 1);
    }

    /// The concrete periodic scenario: [0,4) and [4,8) on two ranks,
    /// ghost 1, periodic in x.
    #[test]
    fn fill_two_grids_periodic_two_ranks() {
        let p = Partition::new(vec![rect1d(0, 3), rect1d(4, 7)]);
        let rm = RankMap::new(vec![0, 1]);
        let dom = Domain::periodic(rect1d(0, 7), [true, false, false]);
        let g = IndexVec::new(1, 0, 0);

        let plan0 = build_fill_plan(&p, &rm, g, &dom, 0, false).unwrap();
        // rank 0 owns grid 0: receives both its ghost cells from rank 1,
        // sends both interface cells of grid 0 to rank 1
        assert!(plan0.local.is_empty());
        assert_eq!(plan0.recv.get(&1).map(Vec::len), Some(2));
        assert_eq!(plan0.send.get(&1).map(Vec::len), Some(2));

        // the low ghost cell of grid 0 wraps to grid 1's high interior cell
        let wrap = plan0
            .recv
            .get(&1)
            .unwrap()
            .iter()
            .find(|t| t.dbox == rect1d(-1, -1))
            .expect("low-ghost wrap tag");
        assert_eq!(wrap.sbox, rect1d(7, 7));
        assert_eq!(wrap.src_index, 1);

        let plan1 = build_fill_plan(&p, &rm, g, &dom, 1, false).unwrap();
        // the low ghost cell of [4,8) equals interior cell 3 of [0,4)
        let low = plan1
            .recv
            .get(&0)
            .unwrap()
            .iter()
            .find(|t| t.dbox == rect1d(3, 3))
            .expect("low-ghost tag of grid 1");
        assert_eq!(low.sbox, rect1d(3, 3));
        assert_eq!(low.src_index, 0);
    }

    /// Send and receive plans of paired ranks describe the same tags in the
    /// same order.
    #[test]
    fn paired_ranks_agree_on_tag_order() {
        let p = Partition::new(vec![rect1d(0, 3), rect1d(4, 7)]);
        let rm = RankMap::new(vec![0, 1]);
        let dom = Domain::periodic(rect1d(0, 7), [true, false, false]);
        let g = IndexVec::new(1, 0, 0);
        let plan0 = build_fill_plan(&p, &rm, g, &dom, 0, false).unwrap();
        let plan1 = build_fill_plan(&p, &rm, g, &dom, 1, false).unwrap();
        assert_eq!(plan0.send.get(&1), plan1.recv.get(&0));
        assert_eq!(plan0.recv.get(&1), plan1.send.get(&0));
    }

    #[test]
    fn no_tags_for_foreign_pairs() {
        let p = Partition::new(vec![rect1d(0, 3), rect1d(4, 7)]);
        let rm = RankMap::new(vec![1, 2]);
        let dom = Domain::new(rect1d(0, 7));
        let plan = build_fill_plan(&p, &rm, IndexVec::new(1, 0, 0), &dom, 0, false).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn cross_splits_local_tags_into_tiles() {
        let big = Rect::new(IndexVec::zero(), IndexVec::new(15, 31, 0));
        let other = Rect::new(IndexVec::new(0, 32, 0), IndexVec::new(15, 63, 0));
        let p = Partition::new(vec![big, other]);
        let rm = RankMap::new(vec![0, 0]);
        let dom = Domain::new(Rect::new(IndexVec::zero(), IndexVec::new(15, 63, 0)));
        let g = IndexVec::new(0, 9, 0);
        let plain = build_fill_plan(&p, &rm, g, &dom, 0, false).unwrap();
        let tiled = build_fill_plan(&p, &rm, g, &dom, 0, true).unwrap();
        // a 9-deep shell does not fit one 8-wide tile
        assert!(tiled.local.len() > plain.local.len());
        let plain_cells: usize = plain.local.iter().map(|t| t.dbox.num_cells()).sum();
        let tiled_cells: usize = tiled.local.iter().map(|t| t.dbox.num_cells()).sum();
        assert_eq!(plain_cells, tiled_cells);
        assert!(tiled.local_threadsafe);
    }

    #[test]
    fn copy_plan_covers_destination_interior() {
        // destination partition is one grid over the whole domain; source
        // partition splits it in two
        let dstp = Partition::new(vec![rect1d(0, 7)]);
        let dstr = RankMap::new(vec![0]);
        let srcp = Partition::new(vec![rect1d(0, 3), rect1d(4, 7)]);
        let srcr = RankMap::new(vec![0, 0]);
        let dom = Domain::new(rect1d(0, 7));
        let plan = build_copy_plan(
            &dstp,
            &dstr,
            IndexVec::zero(),
            &srcp,
            &srcr,
            IndexVec::zero(),
            &dom,
            0,
            false,
        )
        .unwrap();
        assert_eq!(plan.local.len(), 2);
        let covered: usize = plan.local.iter().map(|t| t.dbox.num_cells()).sum();
        assert_eq!(covered, 8);
    }

    #[test]
    fn copy_plan_same_identity_skips_self() {
        let p = Partition::new(vec![rect1d(0, 3), rect1d(4, 7)]);
        let rm = RankMap::new(vec![0, 0]);
        let dom = Domain::new(rect1d(0, 7));
        let plan = build_copy_plan(
            &p,
            &rm,
            IndexVec::zero(),
            &p,
            &rm,
            IndexVec::zero(),
            &dom,
            0,
            false,
        )
        .unwrap();
        // with zero ghost the only candidate overlaps are the grids
        // themselves; the self no-op rule leaves nothing
        assert!(plan.is_empty());
    }

    #[test]
    fn transform_plan_rotate180_spans_the_low_x_shell() {
        use crate::xform::Rotate180;
        let nx = 8;
        let dombox = Rect::new(IndexVec::zero(), IndexVec::new(nx - 1, 7, 0));
        let p = Partition::new(vec![
            Rect::new(IndexVec::zero(), IndexVec::new(nx - 1, 3, 0)),
            Rect::new(IndexVec::new(0, 4, 0), IndexVec::new(nx - 1, 7, 0)),
        ]);
        let rm = RankMap::new(vec![0, 0]);
        let dom = Domain::new(dombox);
        let g = IndexVec::new(1, 0, 0);
        let plan =
            build_transform_plan(&p, &rm, g, &dom, 0, Rotate180 { ly: 8 }).unwrap();
        // every tag's destination lies outside the domain, sources inside
        for t in &plan.local {
            assert!(dombox.intersect(&t.dbox).is_none());
            assert!(dombox.contains_rect(&t.sbox));
        }
        let filled: usize = plan.local.iter().map(|t| t.dbox.num_cells()).sum();
        // the rotation reaches only the low-x shell: one cell deep, both grids
        assert_eq!(filled, 2 * 4);
        assert!(plan.local.iter().all(|t| t.dbox.lo()[0] == -1));
    }

    #[test]
    fn malformed_centering_is_rejected() {
        let p = Partition::new(vec![rect1d(0, 3).with_centering(Centering::node())]);
        let rm = RankMap::new(vec![0]);
        let dom = Domain::new(rect1d(0, 7));
        let err = build_fill_plan(&p, &rm, IndexVec::new(1, 0, 0), &dom, 0, false);
        assert!(matches!(err, Err(PatchHaloError::CenteringMismatch)));
    }
}
