//! Coordinate-transform adapters: destination-to-source index maps and
//! per-component value projections plugged into the exchange executor.

pub mod affine;
pub mod coord_map;
pub mod projection;

pub use affine::AffineMap;
pub use coord_map::{CoordMap, Identity, PolarMap, Rotate90, Rotate180};
pub use projection::{IdentityProjection, PolarComponentFlip, SignFlip, ValueProjection};
