//! Integer index-space geometry: index vectors, rectangles, domains.

pub mod domain;
pub mod index;
pub mod rect;

pub use domain::Domain;
pub use index::{Centering, IndexKind, IndexVec};
pub use rect::Rect;
