//! Shared fixtures for the integration tests.
#![allow(dead_code)] // each test crate uses a different subset

use std::sync::Arc;

use patch_halo::prelude::*;

/// Deterministic per-cell value: distinct for every (index, component).
pub fn encode(iv: IndexVec, comp: usize) -> f64 {
    (iv[0] as f64) * 1_000_000.0
        + (iv[1] as f64) * 10_000.0
        + (iv[2] as f64) * 100.0
        + comp as f64
}

/// Build an f64 array and set every owned interior cell to its encoding.
pub fn seeded_array(
    rects: Vec<Rect>,
    ranks: Vec<usize>,
    ncomp: usize,
    ghost: IndexVec,
    my_rank: usize,
    registry: Arc<PlanRegistry>,
) -> GridArray<f64> {
    let partition = Partition::new(rects);
    let rank_map = RankMap::new(ranks);
    let mut array =
        GridArray::<f64>::new(partition, rank_map, ncomp, ghost, my_rank, registry).unwrap();
    seed_interior(&mut array);
    array
}

/// Write the encoding into every owned interior cell, zero into ghosts.
pub fn seed_interior(array: &mut GridArray<f64>) {
    let ncomp = array.ncomp();
    for (_, patch) in array.local_patches_mut() {
        for n in 0..ncomp {
            patch.fill(n, 0.0);
        }
        for iv in patch.valid().cells() {
            for n in 0..ncomp {
                patch.write(iv, n, encode(iv, n));
            }
        }
    }
}

/// Full contents of every local patch (ghosts included), for idempotence
/// comparisons.
pub fn snapshot(array: &GridArray<f64>) -> Vec<(usize, Vec<f64>)> {
    array
        .local_patches()
        .map(|(i, p)| {
            let mut vals = Vec::with_capacity(p.grown().num_cells() * p.ncomp());
            for n in 0..p.ncomp() {
                for iv in p.grown().cells() {
                    vals.push(p.read(iv, n));
                }
            }
            (i, vals)
        })
        .collect()
}

/// Wrap `iv` into `domain` along its periodic dimensions; `None` when the
/// index stays outside (a physical-boundary ghost no fill touches).
pub fn wrap_into(domain: &Domain, iv: IndexVec) -> Option<IndexVec> {
    let rect = domain.rect();
    let mut out = iv;
    for d in 0..3 {
        let len = rect.length(d);
        if domain.is_periodic(d) {
            out[d] = (out[d] - rect.lo()[d]).rem_euclid(len) + rect.lo()[d];
        }
        if out[d] < rect.lo()[d] || out[d] > rect.hi()[d] {
            return None;
        }
    }
    Some(out)
}
