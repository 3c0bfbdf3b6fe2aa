//! Non-blocking exchange: executor, execution backends, and the public
//! fill/copy/symmetry operations.

pub mod backend;
pub mod executor;
pub mod ops;
pub mod symmetry;

pub use backend::{ExecutionBackend, HostBackend};
pub use executor::ExchangeHandle;
pub use ops::{
    fill_boundary, fill_boundary_finish, fill_boundary_start, parallel_copy,
    parallel_copy_finish, parallel_copy_ghosts_only, parallel_copy_start,
};
pub use symmetry::{fill_polar, fill_polar_vector, rotate90, rotate180};
