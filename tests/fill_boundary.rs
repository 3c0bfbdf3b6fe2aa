//! Single-rank boundary-fill behavior: copy correctness across internal
//! boundaries, periodic wrap, idempotence, and ghost-only mutation.

mod util;

use std::sync::Arc;

use patch_halo::prelude::*;
use util::{encode, seeded_array, snapshot, wrap_into};

fn rect2d(lo: [i32; 2], hi: [i32; 2]) -> Rect {
    Rect::new(IndexVec::new(lo[0], lo[1], 0), IndexVec::new(hi[0], hi[1], 0))
}

/// After a fill, every ghost cell whose (possibly wrapped) position is
/// owned by some grid holds that owner's interior value; the rest stay
/// untouched.
fn check_ghosts(array: &GridArray<f64>, domain: &Domain) {
    for (_, patch) in array.local_patches() {
        for iv in patch.grown().cells() {
            if patch.valid().contains(iv) {
                continue;
            }
            for n in 0..array.ncomp() {
                let got = patch.read(iv, n);
                match wrap_into(domain, iv) {
                    Some(owner) => assert_eq!(
                        got,
                        encode(owner, n),
                        "ghost {iv:?} comp {n} should mirror {owner:?}"
                    ),
                    None => assert_eq!(got, 0.0, "ghost {iv:?} outside domain was written"),
                }
            }
        }
    }
}

#[test]
fn internal_boundary_copies_interior_values() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::new(rect2d([0, 0], [7, 7]));
    let mut a = seeded_array(
        vec![rect2d([0, 0], [3, 7]), rect2d([4, 0], [7, 7])],
        vec![0, 0],
        2,
        IndexVec::new(1, 1, 0),
        0,
        reg,
    );
    fill_boundary(&mut a, 0..2, IndexVec::new(1, 1, 0), &domain, &NoComm).unwrap();
    check_ghosts(&a, &domain);
    assert_eq!(a.ghost_filled(), IndexVec::new(1, 1, 0));
}

#[test]
fn periodic_wrap_mirrors_opposite_face() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::periodic(rect2d([0, 0], [7, 7]), [true, true, false]);
    let mut a = seeded_array(
        vec![
            rect2d([0, 0], [3, 3]),
            rect2d([4, 0], [7, 3]),
            rect2d([0, 4], [3, 7]),
            rect2d([4, 4], [7, 7]),
        ],
        vec![0; 4],
        1,
        IndexVec::new(2, 2, 0),
        0,
        reg,
    );
    fill_boundary(&mut a, 0..1, IndexVec::new(2, 2, 0), &domain, &NoComm).unwrap();
    check_ghosts(&a, &domain);

    // spot checks: low-face ghost equals the mirrored high-face interior
    let p = a.patch(0).unwrap();
    assert_eq!(
        p.read(IndexVec::new(-1, 0, 0), 0),
        encode(IndexVec::new(7, 0, 0), 0)
    );
    assert_eq!(
        p.read(IndexVec::new(0, -2, 0), 0),
        encode(IndexVec::new(0, 6, 0), 0)
    );
    // corner ghost wraps in both dimensions
    assert_eq!(
        p.read(IndexVec::new(-1, -1, 0), 0),
        encode(IndexVec::new(7, 7, 0), 0)
    );
}

#[test]
fn single_grid_periodic_self_exchange() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::periodic(
        Rect::new(IndexVec::zero(), IndexVec::new(7, 0, 0)),
        [true, false, false],
    );
    let mut a = seeded_array(
        vec![Rect::new(IndexVec::zero(), IndexVec::new(7, 0, 0))],
        vec![0],
        1,
        IndexVec::new(1, 0, 0),
        0,
        reg,
    );
    fill_boundary(&mut a, 0..1, IndexVec::new(1, 0, 0), &domain, &NoComm).unwrap();
    let p = a.patch(0).unwrap();
    assert_eq!(
        p.read(IndexVec::new(-1, 0, 0), 0),
        encode(IndexVec::new(7, 0, 0), 0)
    );
    assert_eq!(
        p.read(IndexVec::new(8, 0, 0), 0),
        encode(IndexVec::new(0, 0, 0), 0)
    );
}

#[test]
fn ghost_wider_than_the_domain_wraps_repeatedly() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::periodic(
        Rect::new(IndexVec::zero(), IndexVec::new(3, 0, 0)),
        [true, false, false],
    );
    let g = IndexVec::new(5, 0, 0);
    let mut a = seeded_array(
        vec![Rect::new(IndexVec::zero(), IndexVec::new(3, 0, 0))],
        vec![0],
        1,
        g,
        0,
        reg,
    );
    fill_boundary(&mut a, 0..1, g, &domain, &NoComm).unwrap();
    check_ghosts(&a, &domain);
    // a second-wrap spot check
    let p = a.patch(0).unwrap();
    assert_eq!(
        p.read(IndexVec::new(-5, 0, 0), 0),
        encode(IndexVec::new(3, 0, 0), 0)
    );
}

#[test]
fn fill_is_idempotent() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::periodic(rect2d([0, 0], [7, 7]), [true, false, false]);
    let g = IndexVec::new(1, 1, 0);
    let mut a = seeded_array(
        vec![rect2d([0, 0], [7, 3]), rect2d([0, 4], [7, 7])],
        vec![0, 0],
        1,
        g,
        0,
        reg,
    );
    fill_boundary(&mut a, 0..1, g, &domain, &NoComm).unwrap();
    let first = snapshot(&a);
    fill_boundary(&mut a, 0..1, g, &domain, &NoComm).unwrap();
    assert_eq!(snapshot(&a), first);
}

#[test]
fn interior_is_never_mutated() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::new(rect2d([0, 0], [7, 7]));
    let g = IndexVec::new(1, 1, 0);
    let mut a = seeded_array(
        vec![rect2d([0, 0], [3, 7]), rect2d([4, 0], [7, 7])],
        vec![0, 0],
        1,
        g,
        0,
        reg,
    );
    fill_boundary(&mut a, 0..1, g, &domain, &NoComm).unwrap();
    for (_, patch) in a.local_patches() {
        for iv in patch.valid().cells() {
            assert_eq!(patch.read(iv, 0), encode(iv, 0));
        }
    }
}

#[test]
fn component_subrange_leaves_other_components() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::new(rect2d([0, 0], [7, 7]));
    let g = IndexVec::new(1, 0, 0);
    let mut a = seeded_array(
        vec![rect2d([0, 0], [3, 7]), rect2d([4, 0], [7, 7])],
        vec![0, 0],
        3,
        g,
        0,
        reg,
    );
    fill_boundary(&mut a, 1..2, g, &domain, &NoComm).unwrap();
    let p = a.patch(0).unwrap();
    let ghost = IndexVec::new(4, 0, 0);
    assert_eq!(p.read(ghost, 1), encode(ghost, 1));
    // untouched components keep their zero ghost
    assert_eq!(p.read(ghost, 0), 0.0);
    assert_eq!(p.read(ghost, 2), 0.0);
}

#[test]
fn bad_arguments_are_rejected_eagerly() {
    let reg = Arc::new(PlanRegistry::new());
    let domain = Domain::new(rect2d([0, 0], [7, 7]));
    let g = IndexVec::new(1, 0, 0);
    let mut a = seeded_array(
        vec![rect2d([0, 0], [7, 7])],
        vec![0],
        1,
        g,
        0,
        reg,
    );
    assert!(matches!(
        fill_boundary(&mut a, 0..2, g, &domain, &NoComm),
        Err(PatchHaloError::ComponentRange { .. })
    ));
    assert!(matches!(
        fill_boundary(&mut a, 0..1, IndexVec::new(2, 0, 0), &domain, &NoComm),
        Err(PatchHaloError::GhostWidth { .. })
    ));
    // a rank map naming a rank outside the communicator
    let reg2 = Arc::new(PlanRegistry::new());
    let mut b = seeded_array(
        vec![rect2d([0, 0], [7, 7])],
        vec![1],
        1,
        g,
        0,
        reg2,
    );
    assert!(matches!(
        fill_boundary(&mut b, 0..1, g, &domain, &NoComm),
        Err(PatchHaloError::RankOutOfRange { rank: 1, size: 1 })
    ));
}
