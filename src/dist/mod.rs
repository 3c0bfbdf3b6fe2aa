//! Distribution primitives: partitions, rank maps, and identity keys.

pub mod key;
pub mod partition;
pub mod rank_map;

pub use key::PartitionKey;
pub use partition::Partition;
pub use rank_map::RankMap;
