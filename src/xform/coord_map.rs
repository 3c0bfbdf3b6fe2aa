//! Destination-to-source coordinate maps.
//!
//! A `CoordMap` answers two questions: where does one destination index read
//! from (`dest_to_src`, used cell-by-cell during packing, unpacking, and
//! local copies), and how does a destination rectangle decompose into
//! affine pieces (`pieces`, used once at plan-build time). The two views
//! must agree; each implementation's tests check one against the other.

use crate::geom::index::{DIM, IndexVec};
use crate::geom::rect::Rect;
use crate::xform::affine::AffineMap;

/// A destination-to-source index map usable by the exchange executor.
pub trait CoordMap: Copy + Send + Sync + 'static {
    /// Source index read by destination index `iv`.
    fn dest_to_src(&self, iv: IndexVec) -> IndexVec;

    /// Decompose `dst` into sub-rectangles on which the map is affine,
    /// paired with the affine piece valid there.
    fn pieces(&self, dst: &Rect) -> Vec<(Rect, AffineMap)>;
}

/// Split `rect` along dimension `d` so that no piece straddles a cut; a cut
/// at `c` separates indices `< c` from indices `>= c`.
fn split_dim(rects: Vec<Rect>, d: usize, cuts: &[i32]) -> Vec<Rect> {
    let mut out = Vec::with_capacity(rects.len());
    for r in rects {
        let mut cur = r;
        for &c in cuts {
            if cur.lo()[d] < c && c <= cur.hi()[d] {
                let mut below_hi = cur.hi();
                below_hi[d] = c - 1;
                out.push(Rect::new(cur.lo(), below_hi).with_centering(cur.centering()));
                let mut above_lo = cur.lo();
                above_lo[d] = c;
                cur = Rect::new(above_lo, cur.hi()).with_centering(cur.centering());
            }
        }
        out.push(cur);
    }
    out
}

/// Split `rect` at the given per-dimension cuts (ascending order).
fn split_all(rect: &Rect, cuts: [&[i32]; DIM]) -> Vec<Rect> {
    let mut pieces = vec![*rect];
    for d in 0..DIM {
        pieces = split_dim(pieces, d, cuts[d]);
    }
    pieces
}

/// The identity map: plain boundary fills and cross-partition copies.
#[derive(Copy, Clone, Debug, Default)]
pub struct Identity;

impl CoordMap for Identity {
    #[inline]
    fn dest_to_src(&self, iv: IndexVec) -> IndexVec {
        iv
    }

    fn pieces(&self, dst: &Rect) -> Vec<(Rect, AffineMap)> {
        vec![(*dst, AffineMap::identity())]
    }
}

/// Quarter-turn rotation where the destination chooses the direction by the
/// sign of its x index: `x < 0` reads through the clockwise map
/// `(i,j) -> (j, -1-i)`, `x >= 0` through the counter-clockwise inverse
/// `(i,j) -> (-1-j, i)`. One plan therefore serves both directions of the
/// corner region.
#[derive(Copy, Clone, Debug, Default)]
pub struct Rotate90;

const ROT90_CW: AffineMap = AffineMap::new([1, 0, 2], [1, -1, 1], [0, -1, 0]);
const ROT90_CCW: AffineMap = AffineMap::new([1, 0, 2], [-1, 1, 1], [-1, 0, 0]);

impl CoordMap for Rotate90 {
    #[inline]
    fn dest_to_src(&self, iv: IndexVec) -> IndexVec {
        if iv[0] < 0 {
            ROT90_CW.apply(iv)
        } else {
            ROT90_CCW.apply(iv)
        }
    }

    fn pieces(&self, dst: &Rect) -> Vec<(Rect, AffineMap)> {
        split_all(dst, [&[0], &[], &[]])
            .into_iter()
            .map(|p| {
                let m = if p.lo()[0] < 0 { ROT90_CW } else { ROT90_CCW };
                (p, m)
            })
            .collect()
    }
}

/// Half-turn rotation `(i,j) -> (-1-i, Ly-1-j)`.
#[derive(Copy, Clone, Debug)]
pub struct Rotate180 {
    pub ly: i32,
}

impl Rotate180 {
    #[inline]
    fn affine(&self) -> AffineMap {
        AffineMap::new([0, 1, 2], [-1, -1, 1], [-1, self.ly - 1, 0])
    }
}

impl CoordMap for Rotate180 {
    #[inline]
    fn dest_to_src(&self, iv: IndexVec) -> IndexVec {
        self.affine().apply(iv)
    }

    fn pieces(&self, dst: &Rect) -> Vec<(Rect, AffineMap)> {
        vec![(*dst, self.affine())]
    }
}

/// Polar wrap at a coordinate singularity: x mirrors across the domain ends
/// (`i -> -1-i` below the midline, `i -> 2Lx-1-i` above), y shifts by half
/// the domain length, with the out-of-domain y branches covering the x-y
/// corner regions.
#[derive(Copy, Clone, Debug)]
pub struct PolarMap {
    pub lx: i32,
    pub ly: i32,
}

impl PolarMap {
    #[inline]
    fn i_index(&self, i: i32) -> i32 {
        if i < self.lx / 2 { -1 - i } else { 2 * self.lx - 1 - i }
    }

    #[inline]
    fn j_index(&self, j: i32) -> i32 {
        if j < 0 {
            j + self.ly / 2
        } else if j >= self.ly {
            j - self.ly / 2
        } else if j < self.ly / 2 {
            j + self.ly / 2
        } else {
            j - self.ly / 2
        }
    }

    fn affine_at(&self, iv: IndexVec) -> AffineMap {
        let (isign, ioff) = if iv[0] < self.lx / 2 {
            (-1, -1)
        } else {
            (-1, 2 * self.lx - 1)
        };
        let joff = self.j_index(iv[1]) - iv[1];
        AffineMap::new([0, 1, 2], [isign, 1, 1], [ioff, joff, 0])
    }
}

impl CoordMap for PolarMap {
    #[inline]
    fn dest_to_src(&self, iv: IndexVec) -> IndexVec {
        IndexVec::new(self.i_index(iv[0]), self.j_index(iv[1]), iv[2])
    }

    fn pieces(&self, dst: &Rect) -> Vec<(Rect, AffineMap)> {
        let half = self.ly / 2;
        split_all(dst, [&[self.lx / 2], &[0, half, self.ly], &[]])
            .into_iter()
            .map(|p| (p, self.affine_at(p.lo())))
            .collect()
    }
}
