//! PatchHaloError: Unified error type for patch-halo public APIs
//!
//! This error type is used throughout the patch-halo library to provide
//! robust, non-panicking error handling for all public APIs. Variants in the
//! "protocol" group signal desynchronization between cooperating ranks; they
//! are not recoverable within a run and callers are expected to terminate.

use std::fmt::Debug;
use thiserror::Error;

use crate::geom::IndexVec;

/// Unified error type for patch-halo operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchHaloError {
    /// Attempted to construct a rectangle with an inverted index range.
    #[error("malformed rectangle: lo {lo:?} exceeds hi {hi:?}")]
    InvalidRect { lo: IndexVec, hi: IndexVec },
    /// Two rectangles with different centerings were combined.
    #[error("centering mismatch between rectangles")]
    CenteringMismatch,
    /// A component range was out of bounds for the array.
    #[error("component range {start}..{end} out of bounds for {ncomp} components")]
    ComponentRange {
        start: usize,
        end: usize,
        ncomp: usize,
    },
    /// The requested ghost width exceeds what the array allocates.
    #[error("requested ghost width {requested:?} exceeds allocated {allocated:?}")]
    GhostWidth {
        requested: IndexVec,
        allocated: IndexVec,
    },
    /// A rotation or polar fill was requested on an incompatible domain.
    #[error("symmetry fill precondition violated: {0}")]
    SymmetryDomain(&'static str),
    /// The rank map does not assign exactly one rank per rectangle.
    #[error("rank map has {ranks} entries for {boxes} rectangles")]
    RankMapLength { boxes: usize, ranks: usize },
    /// A rank map entry names a rank outside the communicator.
    #[error("rank {rank} out of range for communicator of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
    /// A patch was addressed that this rank does not own.
    #[error("rectangle index {0} is not owned by this rank")]
    NotLocal(usize),
    /// The two arrays of a cross-partition copy disagree on component count.
    #[error("component count mismatch: destination has {dst}, source has {src}")]
    NcompMismatch { dst: usize, src: usize },
    /// A received message's byte length did not match the plan geometry.
    ///
    /// This indicates a plan/data desynchronization between ranks. There is
    /// no safe recovery; the exchange (and the run) cannot continue.
    #[error("receive from rank {neighbor}: expected {expected} bytes, got {got}")]
    RecvSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// The transport layer failed outright for a neighbor.
    #[error("communication with rank {neighbor} failed: {message}")]
    CommError {
        neighbor: usize,
        message: Box<str>,
    },
    /// A transfer buffer could not be allocated. Not retried.
    #[error("failed to allocate a {bytes}-byte transfer buffer")]
    BufferAlloc { bytes: usize },
}
