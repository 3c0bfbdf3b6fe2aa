//! `Patch`: storage for one rectangle, grown by the ghost width.

use crate::array::Scalar;
use crate::geom::{IndexVec, Rect};

/// One grid's data: the valid region plus its surrounding ghost cells, with
/// a fixed number of components per cell.
///
/// Storage is component-major: component `n`'s values for all cells are
/// contiguous, cells within a component in [`Rect::cells`] order.
#[derive(Clone, Debug)]
pub struct Patch<T> {
    valid: Rect,
    grown: Rect,
    ncomp: usize,
    data: Vec<T>,
}

impl<T: Scalar> Patch<T> {
    /// Allocate a zero-initialized patch for `valid` with `ghost` cells.
    pub fn new(valid: Rect, ghost: IndexVec, ncomp: usize) -> Self {
        let grown = valid.grow(ghost);
        Patch {
            valid,
            grown,
            ncomp,
            data: vec![T::default(); grown.num_cells() * ncomp],
        }
    }

    /// The owned (non-ghost) region.
    #[inline]
    pub fn valid(&self) -> Rect {
        self.valid
    }

    /// The allocated region including ghost cells.
    #[inline]
    pub fn grown(&self) -> Rect {
        self.grown
    }

    #[inline]
    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    #[inline]
    fn slot(&self, iv: IndexVec, comp: usize) -> usize {
        debug_assert!(self.grown.contains(iv), "index {iv:?} outside patch");
        debug_assert!(comp < self.ncomp);
        comp * self.grown.num_cells() + self.grown.linear_offset(iv)
    }

    /// Value at absolute index `iv`, component `comp`.
    ///
    /// # Panics
    /// Panics (in debug builds) if `iv` is outside the allocated region.
    #[inline]
    pub fn read(&self, iv: IndexVec, comp: usize) -> T {
        self.data[self.slot(iv, comp)]
    }

    /// Store `value` at absolute index `iv`, component `comp`.
    #[inline]
    pub fn write(&mut self, iv: IndexVec, comp: usize, value: T) {
        let s = self.slot(iv, comp);
        self.data[s] = value;
    }

    /// Set every cell (ghosts included) of component `comp` to `value`.
    pub fn fill(&mut self, comp: usize, value: T) {
        let n = self.grown.num_cells();
        self.data[comp * n..(comp + 1) * n].fill(value);
    }

    /// Set `value` on the valid region of component `comp`, leaving ghosts.
    pub fn fill_valid(&mut self, comp: usize, value: T) {
        for iv in self.valid.cells() {
            self.write(iv, comp, value);
        }
    }
}
