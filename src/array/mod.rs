//! Grid-array storage: per-rectangle patches and the distributed array.

pub mod grid_array;
pub mod patch;

pub use grid_array::GridArray;
pub use patch::Patch;

/// Element types that can travel through packed exchange buffers.
///
/// `Pod` gives the byte view, `Signed` gives the negation used by
/// sign-flipping value projections.
pub trait Scalar:
    bytemuck::Pod
    + Default
    + PartialEq
    + std::fmt::Debug
    + num_traits::Signed
    + Send
    + Sync
    + 'static
{
}

impl<T> Scalar for T where
    T: bytemuck::Pod
        + Default
        + PartialEq
        + std::fmt::Debug
        + num_traits::Signed
        + Send
        + Sync
        + 'static
{
}
