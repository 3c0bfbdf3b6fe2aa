//! `Partition`: an ordered, reference-counted set of rectangles.
//!
//! Equality of partitions is *identity* equality: every construction draws a
//! fresh generation id from a process-wide counter, and `clone` shares it.
//! Two partitions built independently from equal boxes are distinct cache
//! keys. This is what makes plan caching sound — a partition id can never
//! refer to two different box sets over its lifetime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use crate::geom::Rect;

static NEXT_PARTITION_ID: AtomicU64 = AtomicU64::new(1);

/// Ordered collection of non-overlapping rectangles tiling an index space.
#[derive(Clone, Debug)]
pub struct Partition {
    inner: Arc<PartitionInner>,
}

#[derive(Debug)]
struct PartitionInner {
    id: u64,
    rects: Vec<Rect>,
}

impl Partition {
    /// Build a partition from rectangles, assigning a fresh identity.
    pub fn new(rects: Vec<Rect>) -> Self {
        let id = NEXT_PARTITION_ID.fetch_add(1, Relaxed);
        Partition {
            inner: Arc::new(PartitionInner { id, rects }),
        }
    }

    /// The generation id assigned at construction.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Number of rectangles.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.rects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.rects.is_empty()
    }

    /// Rectangle at partition index `i`.
    #[inline]
    pub fn rect(&self, i: usize) -> Rect {
        self.inner.rects[i]
    }

    /// All rectangles in partition order.
    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.inner.rects
    }

    /// Iterate `(index, rect)` in partition order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Rect)> + '_ {
        self.inner.rects.iter().copied().enumerate()
    }

    /// True iff `other` is the same partition object (shared identity).
    #[inline]
    pub fn same_identity(&self, other: &Partition) -> bool {
        self.inner.id == other.inner.id
    }
}
