//! Problem-domain description: extent rectangle plus periodicity flags.

use itertools::iproduct;

use crate::geom::index::{DIM, IndexVec};
use crate::geom::rect::Rect;
use crate::halo_error::PatchHaloError;

/// The logical problem domain and its periodic dimensions.
///
/// Periodic shift vectors are whole-domain translations; the geometry engine
/// enumerates them (up to `3^d` images) when intersecting against a
/// partition's rectangles.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
pub struct Domain {
    rect: Rect,
    periodic: [bool; DIM],
}

impl Domain {
    /// A non-periodic domain covering `rect`.
    #[inline]
    pub fn new(rect: Rect) -> Self {
        Domain {
            rect,
            periodic: [false; DIM],
        }
    }

    /// A domain with the given periodic dimensions.
    pub fn periodic(rect: Rect, periodic: [bool; DIM]) -> Self {
        Domain { rect, periodic }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline]
    pub fn is_periodic(&self, d: usize) -> bool {
        self.periodic[d]
    }

    #[inline]
    pub fn is_any_periodic(&self) -> bool {
        self.periodic.iter().any(|&p| p)
    }

    /// The domain grown by `n` in its periodic dimensions only.
    ///
    /// Ghost regions inside this rectangle are fillable by periodic wrap;
    /// anything outside it needs a physical or symmetry boundary fill.
    pub fn grow_periodic(&self, n: IndexVec) -> Rect {
        let mut g = IndexVec::zero();
        for d in 0..DIM {
            if self.periodic[d] {
                g[d] = n[d];
            }
        }
        self.rect.grow(g)
    }

    /// All periodic shift vectors reaching one domain length, the zero
    /// shift first.
    ///
    /// Non-periodic dimensions contribute only a zero component, so the
    /// result has `3^p` entries for `p` periodic dimensions.
    pub fn shifts(&self) -> Vec<IndexVec> {
        self.shifts_covering(IndexVec::zero())
    }

    /// Periodic shift vectors sufficient to reach `extent` cells beyond the
    /// domain: multiples of the domain length up to
    /// `ceil(extent / length)` (at least one) per periodic dimension.
    ///
    /// Ghost regions wider than the domain itself wrap more than once; the
    /// extra image multiples keep the intersection sweep exhaustive for
    /// those topologies too.
    pub fn shifts_covering(&self, extent: IndexVec) -> Vec<IndexVec> {
        let steps = |d: usize| -> Vec<i32> {
            if self.periodic[d] {
                let len = self.rect.length(d);
                let reach = 1 + (extent[d].max(0) + len - 1) / len;
                let mut s = vec![0];
                for k in 1..reach.max(2) {
                    s.push(-k * len);
                    s.push(k * len);
                }
                s
            } else {
                vec![0]
            }
        };
        let (sx, sy, sz) = (steps(0), steps(1), steps(2));
        iproduct!(sz, sy, sx)
            .map(|(k, j, i)| IndexVec::new(i, j, k))
            .collect()
    }

    /// Check that a partition rectangle agrees with this domain's centering.
    pub fn validate_rect(&self, rect: &Rect) -> Result<(), PatchHaloError> {
        if rect.centering() != self.rect.centering() {
            return Err(PatchHaloError::CenteringMismatch);
        }
        Ok(())
    }
}
