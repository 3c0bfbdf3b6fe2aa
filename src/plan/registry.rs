//! `PlanRegistry`: per-process memoization of exchange plans.
//!
//! One registry serves one rank. It is an explicit object injected into
//! every distributed array (not ambient global state), so construction
//! order is deterministic and tests get isolated caches. Lookups are exact
//! key matches; a miss builds through the geometry engine and inserts, a
//! hit bumps the plan's reuse counter and returns the shared plan. Eviction
//! is demand-driven: an array's destructor asks for its identity's entries
//! to be flushed, and the flush is skipped while sibling arrays still hold
//! the same identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use log::debug;
use parking_lot::Mutex;

use crate::dist::{Partition, PartitionKey, RankMap};
use crate::geom::{Domain, IndexVec};
use crate::halo_error::PatchHaloError;
use crate::plan::build;
use crate::plan::exchange_plan::ExchangePlan;
use crate::xform::{CoordMap, PolarMap, Rotate90, Rotate180};

/// The independent plan families sharing one registry.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PlanFamily {
    /// Boundary fills (ghost exchange within one partition).
    Fill,
    /// Cross-partition copies.
    Copy,
    /// Quarter-turn rotation boundary.
    Rotate90,
    /// Half-turn rotation boundary.
    Rotate180,
    /// Polar wrap boundary.
    Polar,
}

/// Build/erase/use accounting for one plan family. Diagnostics only.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub name: &'static str,
    /// Current number of cached plans (builds minus erases).
    pub size: usize,
    /// Highest water mark of `size`.
    pub max_size: usize,
    /// Most uses any single erased plan had accumulated.
    pub max_use: u64,
    /// Total cache hits across all plans.
    pub n_use: u64,
    pub n_build: u64,
    pub n_erase: u64,
    /// Current heap footprint of cached tag containers.
    pub bytes: usize,
}

impl CacheStats {
    fn new(name: &'static str) -> Self {
        CacheStats {
            name,
            size: 0,
            max_size: 0,
            max_use: 0,
            n_use: 0,
            n_build: 0,
            n_erase: 0,
            bytes: 0,
        }
    }

    fn record_build(&mut self, bytes: usize) {
        self.size += 1;
        self.n_build += 1;
        self.max_size = self.max_size.max(self.size);
        self.bytes += bytes;
    }

    fn record_erase(&mut self, uses: u64, bytes: usize) {
        self.size -= 1;
        self.n_erase += 1;
        self.max_use = self.max_use.max(uses);
        self.bytes -= bytes;
    }

    fn record_use(&mut self) {
        self.n_use += 1;
    }

    /// One-paragraph human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "### {} ###\n    tot # of builds  : {}\n    tot # of erasures: {}\n    tot # of uses    : {}\n    max cache size   : {}\n    max # of uses    : {}",
            self.name, self.n_build, self.n_erase, self.n_use, self.max_size, self.max_use
        )
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct FillKey {
    key: PartitionKey,
    ghost: IndexVec,
    domain: Domain,
    cross: bool,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct CopyKey {
    dst: PartitionKey,
    src: PartitionKey,
    dst_ghost: IndexVec,
    src_ghost: IndexVec,
    domain: Domain,
    to_ghost_only: bool,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct SymKey {
    key: PartitionKey,
    ghost: IndexVec,
    domain: Domain,
}

struct Inner {
    fill: BTreeMap<FillKey, Arc<ExchangePlan>>,
    copy: BTreeMap<CopyKey, Arc<ExchangePlan>>,
    rb90: BTreeMap<SymKey, Arc<ExchangePlan>>,
    rb180: BTreeMap<SymKey, Arc<ExchangePlan>>,
    polar: BTreeMap<SymKey, Arc<ExchangePlan>>,
    /// Live distributed arrays per identity; guards premature eviction.
    live: HashMap<PartitionKey, usize>,
    fill_stats: CacheStats,
    copy_stats: CacheStats,
    rb90_stats: CacheStats,
    rb180_stats: CacheStats,
    polar_stats: CacheStats,
}

/// Process-local plan cache; see the module docs.
pub struct PlanRegistry {
    inner: Mutex<Inner>,
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanRegistry {
    pub fn new() -> Self {
        PlanRegistry {
            inner: Mutex::new(Inner {
                fill: BTreeMap::new(),
                copy: BTreeMap::new(),
                rb90: BTreeMap::new(),
                rb180: BTreeMap::new(),
                polar: BTreeMap::new(),
                live: HashMap::new(),
                fill_stats: CacheStats::new("FillBoundary cache"),
                copy_stats: CacheStats::new("ParallelCopy cache"),
                rb90_stats: CacheStats::new("Rotate90 cache"),
                rb180_stats: CacheStats::new("Rotate180 cache"),
                polar_stats: CacheStats::new("Polar cache"),
            }),
        }
    }

    /// Record a live array for `key`.
    pub fn register(&self, key: PartitionKey) {
        let mut inner = self.inner.lock();
        *inner.live.entry(key).or_insert(0) += 1;
    }

    /// Drop a live-array reference; returns how many remain.
    pub fn deregister(&self, key: PartitionKey) -> usize {
        let mut inner = self.inner.lock();
        match inner.live.get_mut(&key) {
            Some(n) if *n > 1 => {
                *n -= 1;
                *n
            }
            Some(_) => {
                inner.live.remove(&key);
                0
            }
            None => 0,
        }
    }

    /// Number of live arrays currently sharing `key`.
    pub fn live_arrays(&self, key: PartitionKey) -> usize {
        self.inner.lock().live.get(&key).copied().unwrap_or(0)
    }

    /// Boundary-fill plan for `(partition, ranks)`; built on first request.
    pub fn fill_plan(
        &self,
        partition: &Partition,
        ranks: &RankMap,
        ghost: IndexVec,
        domain: &Domain,
        my_rank: usize,
        cross: bool,
    ) -> Result<Arc<ExchangePlan>, PatchHaloError> {
        let key = FillKey {
            key: PartitionKey::new(partition, ranks),
            ghost,
            domain: *domain,
            cross,
        };
        let mut inner = self.inner.lock();
        if let Some(plan) = inner.fill.get(&key) {
            let plan = Arc::clone(plan);
            plan.record_use();
            inner.fill_stats.record_use();
            return Ok(plan);
        }
        debug!("building fill plan for identity {}", key.key);
        let plan = Arc::new(build::build_fill_plan(
            partition, ranks, ghost, domain, my_rank, cross,
        )?);
        inner.fill_stats.record_build(plan.bytes());
        inner.fill.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    /// Cross-partition copy plan; built on first request.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_plan(
        &self,
        dst_partition: &Partition,
        dst_ranks: &RankMap,
        dst_ghost: IndexVec,
        src_partition: &Partition,
        src_ranks: &RankMap,
        src_ghost: IndexVec,
        domain: &Domain,
        my_rank: usize,
        to_ghost_only: bool,
    ) -> Result<Arc<ExchangePlan>, PatchHaloError> {
        let key = CopyKey {
            dst: PartitionKey::new(dst_partition, dst_ranks),
            src: PartitionKey::new(src_partition, src_ranks),
            dst_ghost,
            src_ghost,
            domain: *domain,
            to_ghost_only,
        };
        let mut inner = self.inner.lock();
        if let Some(plan) = inner.copy.get(&key) {
            let plan = Arc::clone(plan);
            plan.record_use();
            inner.copy_stats.record_use();
            return Ok(plan);
        }
        debug!(
            "building copy plan for identities {} <- {}",
            key.dst, key.src
        );
        let plan = Arc::new(build::build_copy_plan(
            dst_partition,
            dst_ranks,
            dst_ghost,
            src_partition,
            src_ranks,
            src_ghost,
            domain,
            my_rank,
            to_ghost_only,
        )?);
        inner.copy_stats.record_build(plan.bytes());
        inner.copy.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    #[allow(clippy::too_many_arguments)]
    fn symmetry_plan<M: CoordMap>(
        &self,
        family: PlanFamily,
        partition: &Partition,
        ranks: &RankMap,
        ghost: IndexVec,
        domain: &Domain,
        my_rank: usize,
        map: M,
    ) -> Result<Arc<ExchangePlan>, PatchHaloError> {
        let key = SymKey {
            key: PartitionKey::new(partition, ranks),
            ghost,
            domain: *domain,
        };
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let (cache, stats) = match family {
            PlanFamily::Rotate90 => (&mut inner.rb90, &mut inner.rb90_stats),
            PlanFamily::Rotate180 => (&mut inner.rb180, &mut inner.rb180_stats),
            PlanFamily::Polar => (&mut inner.polar, &mut inner.polar_stats),
            _ => unreachable!("symmetry_plan called for a non-symmetry family"),
        };
        if let Some(plan) = cache.get(&key) {
            let plan = Arc::clone(plan);
            plan.record_use();
            stats.record_use();
            return Ok(plan);
        }
        debug!("building {family:?} plan for identity {}", key.key);
        let plan = Arc::new(build::build_transform_plan(
            partition, ranks, ghost, domain, my_rank, map,
        )?);
        stats.record_build(plan.bytes());
        cache.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    pub fn rotate90_plan(
        &self,
        partition: &Partition,
        ranks: &RankMap,
        ghost: IndexVec,
        domain: &Domain,
        my_rank: usize,
    ) -> Result<Arc<ExchangePlan>, PatchHaloError> {
        self.symmetry_plan(
            PlanFamily::Rotate90,
            partition,
            ranks,
            ghost,
            domain,
            my_rank,
            Rotate90,
        )
    }

    pub fn rotate180_plan(
        &self,
        partition: &Partition,
        ranks: &RankMap,
        ghost: IndexVec,
        domain: &Domain,
        my_rank: usize,
    ) -> Result<Arc<ExchangePlan>, PatchHaloError> {
        let ly = domain.rect().length(1);
        self.symmetry_plan(
            PlanFamily::Rotate180,
            partition,
            ranks,
            ghost,
            domain,
            my_rank,
            Rotate180 { ly },
        )
    }

    pub fn polar_plan(
        &self,
        partition: &Partition,
        ranks: &RankMap,
        ghost: IndexVec,
        domain: &Domain,
        my_rank: usize,
    ) -> Result<Arc<ExchangePlan>, PatchHaloError> {
        let lx = domain.rect().length(0);
        let ly = domain.rect().length(1);
        self.symmetry_plan(
            PlanFamily::Polar,
            partition,
            ranks,
            ghost,
            domain,
            my_rank,
            PolarMap { lx, ly },
        )
    }

    /// Evict every cache entry under `key`, unless a live array still
    /// shares the identity (then the flush is skipped).
    pub fn flush(&self, key: PartitionKey) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.live.contains_key(&key) {
            debug!("flush of identity {key} skipped: still referenced");
            return;
        }
        macro_rules! drain {
            ($cache:ident, $stats:ident, $pred:expr) => {{
                let doomed: Vec<_> = inner
                    .$cache
                    .keys()
                    .filter(|k| $pred(*k))
                    .cloned()
                    .collect();
                for k in doomed {
                    if let Some(plan) = inner.$cache.remove(&k) {
                        let (uses, bytes) = (plan.uses(), plan.bytes());
                        inner.$stats.record_erase(uses, bytes);
                    }
                }
            }};
        }
        drain!(fill, fill_stats, |k: &FillKey| k.key == key);
        drain!(copy, copy_stats, |k: &CopyKey| k.dst == key || k.src == key);
        drain!(rb90, rb90_stats, |k: &SymKey| k.key == key);
        drain!(rb180, rb180_stats, |k: &SymKey| k.key == key);
        drain!(polar, polar_stats, |k: &SymKey| k.key == key);
        debug!("flushed cache entries for identity {key}");
    }

    /// Evict every plan of one family regardless of identity.
    pub fn flush_all(&self, family: PlanFamily) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        macro_rules! clear {
            ($cache:ident, $stats:ident) => {{
                let doomed: Vec<_> = inner.$cache.keys().cloned().collect();
                for k in doomed {
                    if let Some(plan) = inner.$cache.remove(&k) {
                        let (uses, bytes) = (plan.uses(), plan.bytes());
                        inner.$stats.record_erase(uses, bytes);
                    }
                }
            }};
        }
        match family {
            PlanFamily::Fill => clear!(fill, fill_stats),
            PlanFamily::Copy => clear!(copy, copy_stats),
            PlanFamily::Rotate90 => clear!(rb90, rb90_stats),
            PlanFamily::Rotate180 => clear!(rb180, rb180_stats),
            PlanFamily::Polar => clear!(polar, polar_stats),
        }
    }

    /// Snapshot of one family's statistics.
    pub fn stats(&self, family: PlanFamily) -> CacheStats {
        let inner = self.inner.lock();
        match family {
            PlanFamily::Fill => inner.fill_stats.clone(),
            PlanFamily::Copy => inner.copy_stats.clone(),
            PlanFamily::Rotate90 => inner.rb90_stats.clone(),
            PlanFamily::Rotate180 => inner.rb180_stats.clone(),
            PlanFamily::Polar => inner.polar_stats.clone(),
        }
    }
}
