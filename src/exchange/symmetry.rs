//! Symmetry boundary fills: rotation and polar wrap.
//!
//! These reuse the plan cache and exchange executor with a coordinate
//! transform plugged in, so local and networked data take identical logical
//! paths. Each is gated by eagerly-checked domain preconditions and becomes
//! a no-op when the requested ghost width is zero in x.

use std::ops::Range;

use crate::array::{GridArray, Scalar};
use crate::comm::Communicator;
use crate::exchange::backend::HostBackend;
use crate::exchange::executor;
use crate::geom::{Domain, IndexVec, Rect};
use crate::halo_error::PatchHaloError;
use crate::xform::{IdentityProjection, PolarComponentFlip, PolarMap, Rotate90, Rotate180};

fn check_symmetry<T: Scalar>(
    array: &GridArray<T>,
    comps: &Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
) -> Result<bool, PatchHaloError> {
    array.check_comps(comps)?;
    array.check_ghost(ghost)?;
    if !domain.rect().centering().is_cell() || !array.is_cell_centered() {
        return Err(PatchHaloError::SymmetryDomain(
            "domain and array must be cell-centered",
        ));
    }
    if domain.rect().lo() != IndexVec::zero() {
        return Err(PatchHaloError::SymmetryDomain(
            "domain must be anchored at the origin",
        ));
    }
    // nothing to do without ghost cells in x
    Ok(ghost[0] > 0)
}

/// Fill boundary cells across the quarter-turn symmetry of `domain`.
///
/// One cached plan serves both rotation directions: destinations left of
/// the y axis read clockwise, destinations right of it counter-clockwise.
/// The `(x<0, y<0)` corner block is then reflected locally through the
/// origin.
pub fn rotate90<T, C>(
    array: &mut GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    if domain.rect().length(0) != domain.rect().length(1) {
        return Err(PatchHaloError::SymmetryDomain(
            "quarter-turn rotation needs a square x-y domain",
        ));
    }
    if ghost[0] != ghost[1] {
        return Err(PatchHaloError::SymmetryDomain(
            "quarter-turn rotation needs matching x and y ghost widths",
        ));
    }
    if !check_symmetry(array, &comps, ghost, domain)? {
        return Ok(());
    }
    array.rank_map().validate(array.partition(), comm.size())?;
    let plan = array.registry().rotate90_plan(
        array.partition(),
        array.rank_map(),
        ghost,
        domain,
        comm.rank(),
    )?;
    let handle = executor::start(
        array,
        None,
        &plan,
        comps.clone(),
        Rotate90,
        IdentityProjection,
        HostBackend::default(),
        comm,
    )?;
    executor::finish(
        handle,
        array,
        Rotate90,
        IdentityProjection,
        HostBackend::default(),
    )?;
    reflect_origin_corner(array, &comps, ghost, domain);
    Ok(())
}

/// The rotation cannot reach the `(x<0, y<0)` corner block; its values are
/// the patch's own data reflected through the origin.
fn reflect_origin_corner<T: Scalar>(
    array: &mut GridArray<T>,
    comps: &Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
) {
    let corner = Rect::new(
        IndexVec::new(-ghost[0], -ghost[1], domain.rect().lo()[2] - ghost[2]),
        IndexVec::new(-1, -1, domain.rect().hi()[2] + ghost[2]),
    );
    for (_, patch) in array.local_patches_mut() {
        let Some(bx) = corner.intersect(&patch.grown()) else {
            continue;
        };
        let mut scratch = Vec::with_capacity(bx.num_cells() * comps.len());
        for iv in bx.cells() {
            let mirror = IndexVec::new(-1 - iv[0], -1 - iv[1], iv[2]);
            for n in comps.clone() {
                scratch.push(patch.read(mirror, n));
            }
        }
        let mut slot = 0;
        for iv in bx.cells() {
            for n in comps.clone() {
                patch.write(iv, n, scratch[slot]);
                slot += 1;
            }
        }
    }
}

/// Fill boundary cells across the half-turn symmetry of `domain`.
pub fn rotate180<T, C>(
    array: &mut GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    if domain.rect().length(1) % 2 != 0 {
        return Err(PatchHaloError::SymmetryDomain(
            "half-turn rotation needs an even y extent",
        ));
    }
    if !check_symmetry(array, &comps, ghost, domain)? {
        return Ok(());
    }
    array.rank_map().validate(array.partition(), comm.size())?;
    let plan = array.registry().rotate180_plan(
        array.partition(),
        array.rank_map(),
        ghost,
        domain,
        comm.rank(),
    )?;
    let handle = executor::start(
        array,
        None,
        &plan,
        comps,
        Rotate180 {
            ly: domain.rect().length(1),
        },
        IdentityProjection,
        HostBackend::default(),
        comm,
    )?;
    executor::finish(
        handle,
        array,
        Rotate180 {
            ly: domain.rect().length(1),
        },
        IdentityProjection,
        HostBackend::default(),
    )
}

/// Fill boundary cells across the polar singularity: x mirrors over the
/// domain ends while y shifts by half its length.
pub fn fill_polar<T, C>(
    array: &mut GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    fill_polar_vector(array, comps, ghost, domain, 0, comm)
}

/// Polar fill that also negates the components in the `flip_comps` bitmask
/// wherever the copy crosses the pole — used for vector fields whose
/// azimuthal or radial components change sign across the singularity.
pub fn fill_polar_vector<T, C>(
    array: &mut GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    flip_comps: u32,
    comm: &C,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    if domain.rect().length(1) % 2 != 0 {
        return Err(PatchHaloError::SymmetryDomain(
            "polar fill needs an even y extent",
        ));
    }
    if !check_symmetry(array, &comps, ghost, domain)? {
        return Ok(());
    }
    array.rank_map().validate(array.partition(), comm.size())?;
    let lx = domain.rect().length(0);
    let ly = domain.rect().length(1);
    let plan = array.registry().polar_plan(
        array.partition(),
        array.rank_map(),
        ghost,
        domain,
        comm.rank(),
    )?;
    let map = PolarMap { lx, ly };
    let proj = PolarComponentFlip {
        lx,
        comps: flip_comps,
    };
    let handle = executor::start(
        array,
        None,
        &plan,
        comps,
        map,
        proj,
        HostBackend::default(),
        comm,
    )?;
    executor::finish(handle, array, map, proj, HostBackend::default())
}
