//! `AffineMap`: a signed, permuting, translating index map.
//!
//! Every coordinate transform in this crate is piecewise affine; an
//! `AffineMap` is one piece. Rectangles map to rectangles exactly, and the
//! inverse is exact, which is what lets the plan builder carry intersection
//! sub-rectangles back into destination space without searching.

use crate::geom::index::{DIM, IndexVec};
use crate::geom::rect::Rect;

/// `src[d] = sign[d] * iv[perm[d]] + offset[d]` per dimension.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AffineMap {
    perm: [usize; DIM],
    sign: [i32; DIM],
    offset: [i32; DIM],
}

impl AffineMap {
    pub const fn new(perm: [usize; DIM], sign: [i32; DIM], offset: [i32; DIM]) -> Self {
        AffineMap { perm, sign, offset }
    }

    /// The identity map.
    pub const fn identity() -> Self {
        AffineMap {
            perm: [0, 1, 2],
            sign: [1; DIM],
            offset: [0; DIM],
        }
    }

    /// Pure translation by `shift`.
    pub const fn translation(shift: IndexVec) -> Self {
        AffineMap {
            perm: [0, 1, 2],
            sign: [1; DIM],
            offset: shift.0,
        }
    }

    /// Map a single index.
    #[inline]
    pub fn apply(&self, iv: IndexVec) -> IndexVec {
        let mut out = IndexVec::zero();
        for d in 0..DIM {
            out[d] = self.sign[d] * iv[self.perm[d]] + self.offset[d];
        }
        out
    }

    /// Image of a rectangle (exact for affine maps).
    pub fn apply_rect(&self, rect: &Rect) -> Rect {
        let a = self.apply(rect.lo());
        let b = self.apply(rect.hi());
        Rect::new(a.elem_min(b), a.elem_max(b)).with_centering(rect.centering())
    }

    /// The exact inverse map.
    pub fn inverse(&self) -> AffineMap {
        let mut inv = AffineMap::identity();
        for d in 0..DIM {
            let p = self.perm[d];
            inv.perm[p] = d;
            inv.sign[p] = self.sign[d];
            inv.offset[p] = -self.sign[d] * self.offset[d];
        }
        inv
    }
}
