//! `CopyTag`: one planned data movement between two rectangles.

use std::cmp::Ordering;

use crate::geom::Rect;

/// One planned copy: destination rectangle, source rectangle, and the
/// partition indices of the grids they belong to.
///
/// Tag sequences are sorted with [`CopyTag::cmp`] before storage so that two
/// ranks planning the same logical pair of grids agree on the wire ordering
/// of paired sends and receives without extra coordination.
#[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct CopyTag {
    pub dbox: Rect,
    pub sbox: Rect,
    pub dst_index: usize,
    pub src_index: usize,
}

impl CopyTag {
    pub fn new(dbox: Rect, sbox: Rect, dst_index: usize, src_index: usize) -> Self {
        CopyTag {
            dbox,
            sbox,
            dst_index,
            src_index,
        }
    }
}

impl Ord for CopyTag {
    /// Source index, then source lower corner, then destination index, then
    /// destination lower corner; full boxes break residual ties so the
    /// ordering stays consistent with equality.
    fn cmp(&self, rhs: &Self) -> Ordering {
        (self.src_index, self.sbox.lo(), self.dst_index, self.dbox.lo())
            .cmp(&(rhs.src_index, rhs.sbox.lo(), rhs.dst_index, rhs.dbox.lo()))
            .then_with(|| (self.sbox, self.dbox).cmp(&(rhs.sbox, rhs.dbox)))
    }
}

impl PartialOrd for CopyTag {
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}
