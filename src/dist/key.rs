//! `PartitionKey`: the identity-based cache key for everything downstream.

use crate::dist::partition::Partition;
use crate::dist::rank_map::RankMap;

/// Unique key for a `(Partition, RankMap)` pair.
///
/// Built from the two generation ids, never from box contents; any two
/// arrays sharing this key share all cached exchange plans. Totally ordered
/// so it can key ordered maps deterministically.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct PartitionKey {
    partition_id: u64,
    rank_map_id: u64,
}

impl PartitionKey {
    pub fn new(partition: &Partition, ranks: &RankMap) -> Self {
        PartitionKey {
            partition_id: partition.id(),
            rank_map_id: ranks.id(),
        }
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.partition_id, self.rank_map_id)
    }
}
