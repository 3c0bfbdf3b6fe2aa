//! `Rect`: an axis-aligned, closed integer index range with a centering tag.
//!
//! `Rect` is an immutable value type; every operation returns a new
//! rectangle. A constructed `Rect` always satisfies `lo <= hi` in every
//! dimension — inverted ranges are rejected at the construction boundary, so
//! the geometry engine never has to re-check.

use crate::geom::index::{Centering, DIM, IndexVec};
use crate::halo_error::PatchHaloError;

/// Axis-aligned rectangle `[lo, hi]` (both ends inclusive) in index space.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
pub struct Rect {
    lo: IndexVec,
    hi: IndexVec,
    centering: Centering,
}

impl Rect {
    /// Construct a cell-centered rectangle.
    ///
    /// # Panics
    /// Panics if `lo` exceeds `hi` in any dimension; a malformed rectangle
    /// is a programming error, not a runtime condition.
    #[inline]
    pub fn new(lo: IndexVec, hi: IndexVec) -> Self {
        Self::try_new(lo, hi).expect("Rect lo must not exceed hi")
    }

    /// Fallible constructor for inputs that cross an API boundary.
    pub fn try_new(lo: IndexVec, hi: IndexVec) -> Result<Self, PatchHaloError> {
        if lo.all_le(hi) {
            Ok(Rect {
                lo,
                hi,
                centering: Centering::cell(),
            })
        } else {
            Err(PatchHaloError::InvalidRect { lo, hi })
        }
    }

    /// Same rectangle with a different centering tag.
    #[inline]
    pub fn with_centering(mut self, centering: Centering) -> Self {
        self.centering = centering;
        self
    }

    #[inline]
    pub fn lo(&self) -> IndexVec {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> IndexVec {
        self.hi
    }

    #[inline]
    pub fn centering(&self) -> Centering {
        self.centering
    }

    /// Extent along dimension `d` (number of indices, `>= 1`).
    #[inline]
    pub fn length(&self, d: usize) -> i32 {
        self.hi[d] - self.lo[d] + 1
    }

    /// Extents in all dimensions.
    #[inline]
    pub fn lengths(&self) -> IndexVec {
        IndexVec::new(self.length(0), self.length(1), self.length(2))
    }

    /// Total number of indices covered.
    #[inline]
    pub fn num_cells(&self) -> usize {
        (0..DIM).map(|d| self.length(d) as usize).product()
    }

    /// Grow by `n` indices on both the low and high side of each dimension.
    ///
    /// Shrinking (negative `n`) past the opposite face is a programming
    /// error.
    #[inline]
    pub fn grow(&self, n: IndexVec) -> Self {
        let lo = self.lo - n;
        let hi = self.hi + n;
        debug_assert!(lo.all_le(hi), "grow inverted rectangle");
        Rect {
            lo,
            hi,
            centering: self.centering,
        }
    }

    /// Translate by `shift`.
    #[inline]
    pub fn shift(&self, shift: IndexVec) -> Self {
        Rect {
            lo: self.lo + shift,
            hi: self.hi + shift,
            centering: self.centering,
        }
    }

    /// True iff `iv` lies inside the rectangle.
    #[inline]
    pub fn contains(&self, iv: IndexVec) -> bool {
        self.lo.all_le(iv) && iv.all_le(self.hi)
    }

    /// True iff `other` lies entirely inside `self`.
    #[inline]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.lo.all_le(other.lo) && other.hi.all_le(self.hi)
    }

    /// Intersection, or `None` when the rectangles do not overlap.
    ///
    /// Degenerate (zero-volume) results are reported as `None`; callers in
    /// the geometry engine discard them by construction.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        debug_assert_eq!(
            self.centering, other.centering,
            "intersecting rectangles of different centerings"
        );
        let lo = self.lo.elem_max(other.lo);
        let hi = self.hi.elem_min(other.hi);
        lo.all_le(hi).then_some(Rect {
            lo,
            hi,
            centering: self.centering,
        })
    }

    /// `self` minus `other`, as disjoint rectangles.
    ///
    /// Returns `self` unchanged (one piece) when the two do not overlap and
    /// nothing when `other` covers `self`. Pieces are produced in a fixed
    /// dimension-major order.
    pub fn box_diff(&self, other: &Rect) -> Vec<Rect> {
        let Some(mid) = self.intersect(other) else {
            return vec![*self];
        };
        let mut pieces = Vec::new();
        let mut rem = *self;
        for d in 0..DIM {
            if rem.lo[d] < mid.lo[d] {
                let mut below = rem;
                below.hi[d] = mid.lo[d] - 1;
                pieces.push(below);
                rem.lo[d] = mid.lo[d];
            }
            if rem.hi[d] > mid.hi[d] {
                let mut above = rem;
                above.lo[d] = mid.hi[d] + 1;
                pieces.push(above);
                rem.hi[d] = mid.hi[d];
            }
        }
        pieces
    }

    /// Split into axis-aligned tiles of at most `tile` indices per side.
    ///
    /// Tiles are produced in the same traversal order as [`Rect::cells`].
    pub fn tiles(&self, tile: IndexVec) -> Vec<Rect> {
        debug_assert!(tile.all_ge(IndexVec::splat(1)), "tile extents must be positive");
        let mut out = Vec::new();
        let mut lo = self.lo;
        loop {
            let mut hi = lo;
            for d in 0..DIM {
                hi[d] = (lo[d] + tile[d] - 1).min(self.hi[d]);
            }
            out.push(Rect {
                lo,
                hi,
                centering: self.centering,
            });
            // advance the tile origin like an odometer
            let mut d = 0;
            loop {
                lo[d] += tile[d];
                if lo[d] <= self.hi[d] {
                    break;
                }
                lo[d] = self.lo[d];
                d += 1;
                if d == DIM {
                    return out;
                }
            }
        }
    }

    /// Lexicographic iterator over all indices (first dimension fastest).
    #[inline]
    pub fn cells(&self) -> CellIter {
        CellIter {
            rect: *self,
            cur: self.lo,
            done: false,
        }
    }

    /// Position of `iv` in the `cells()` traversal order.
    ///
    /// The caller guarantees `iv` is inside the rectangle.
    #[inline]
    pub fn linear_offset(&self, iv: IndexVec) -> usize {
        debug_assert!(self.contains(iv), "index {iv:?} outside {self:?}");
        let rel = iv - self.lo;
        let nx = self.length(0) as usize;
        let ny = self.length(1) as usize;
        (rel[2] as usize * ny + rel[1] as usize) * nx + rel[0] as usize
    }
}

/// Iterator over a rectangle's indices; see [`Rect::cells`].
pub struct CellIter {
    rect: Rect,
    cur: IndexVec,
    done: bool,
}

impl Iterator for CellIter {
    type Item = IndexVec;

    fn next(&mut self) -> Option<IndexVec> {
        if self.done {
            return None;
        }
        let out = self.cur;
        let mut d = 0;
        loop {
            self.cur[d] += 1;
            if self.cur[d] <= self.rect.hi[d] {
                break;
            }
            self.cur[d] = self.rect.lo[d];
            d += 1;
            if d == DIM {
                self.done = true;
                break;
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(lo: [i32; 3], hi: [i32; 3]) -> Rect {
        Rect::new(IndexVec(lo), IndexVec(hi))
    }

    #[test]
    fn inverted_rejected() {
        assert!(Rect::try_new(IndexVec::new(1, 0, 0), IndexVec::zero()).is_err());
        assert!(std::panic::catch_unwind(|| Rect::new(IndexVec::splat(2), IndexVec::splat(1)))
            .is_err());
    }

    #[test]
    fn lengths_and_cells() {
        let b = r([0, 0, 0], [3, 1, 0]);
        assert_eq!(b.length(0), 4);
        assert_eq!(b.num_cells(), 8);
        assert_eq!(b.lengths(), IndexVec::new(4, 2, 1));
    }

    #[test]
    fn intersect_and_empty() {
        let a = r([0, 0, 0], [3, 3, 0]);
        let b = r([2, 2, 0], [5, 5, 0]);
        assert_eq!(a.intersect(&b), Some(r([2, 2, 0], [3, 3, 0])));
        let c = r([4, 0, 0], [5, 1, 0]);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn grow_shift_roundtrip() {
        let a = r([0, 0, 0], [3, 3, 3]);
        let g = a.grow(IndexVec::splat(2));
        assert_eq!(g.lo(), IndexVec::splat(-2));
        assert_eq!(g.hi(), IndexVec::splat(5));
        assert_eq!(a.shift(IndexVec::new(8, 0, 0)).lo(), IndexVec::new(8, 0, 0));
    }

    #[test]
    fn box_diff_shell() {
        let inner = r([0, 0, 0], [3, 3, 0]);
        let grown = inner.grow(IndexVec::new(1, 1, 0));
        let shell = grown.box_diff(&inner);
        let shell_cells: usize = shell.iter().map(Rect::num_cells).sum();
        assert_eq!(shell_cells, grown.num_cells() - inner.num_cells());
        // pieces are pairwise disjoint
        for (i, a) in shell.iter().enumerate() {
            for b in shell.iter().skip(i + 1) {
                assert!(a.intersect(b).is_none());
            }
        }
    }

    #[test]
    fn box_diff_disjoint_is_identity() {
        let a = r([0, 0, 0], [1, 1, 0]);
        let b = r([5, 5, 0], [6, 6, 0]);
        assert_eq!(a.box_diff(&b), vec![a]);
        assert!(a.box_diff(&a).is_empty());
    }

    #[test]
    fn tiles_cover_disjointly() {
        let a = r([0, 0, 0], [6, 4, 0]);
        let tiles = a.tiles(IndexVec::new(4, 2, 1));
        let total: usize = tiles.iter().map(Rect::num_cells).sum();
        assert_eq!(total, a.num_cells());
        for (i, t) in tiles.iter().enumerate() {
            assert!(a.contains_rect(t));
            for u in tiles.iter().skip(i + 1) {
                assert!(t.intersect(u).is_none());
            }
        }
    }

    #[test]
    fn cell_iter_matches_linear_offset() {
        let a = r([-1, 2, 0], [1, 3, 1]);
        for (n, iv) in a.cells().enumerate() {
            assert_eq!(a.linear_offset(iv), n);
        }
        assert_eq!(a.cells().count(), a.num_cells());
    }

    #[test]
    fn serde_roundtrip() {
        let a = r([0, -2, 1], [4, 2, 3]).with_centering(Centering::face(0));
        let bytes = bincode::serialize(&a).unwrap();
        let back: Rect = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, a);
    }
}
