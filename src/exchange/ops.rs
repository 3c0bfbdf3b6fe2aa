//! Public boundary-fill and cross-partition-copy operations.

use std::ops::Range;

use crate::array::{GridArray, Scalar};
use crate::comm::Communicator;
use crate::exchange::backend::HostBackend;
use crate::exchange::executor::{self, ExchangeHandle};
use crate::geom::{Domain, IndexVec};
use crate::halo_error::PatchHaloError;
use crate::xform::{Identity, IdentityProjection};

/// Fill every ghost cell of `array` up to `ghost` deep from the grid that
/// owns it, honoring `domain`'s periodicity.
///
/// Idempotent: repeated calls with identical arguments leave the array
/// unchanged after the first. Only ghost cells are written.
pub fn fill_boundary<T, C>(
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
    let handle = fill_boundary_start(array, comps, ghost, domain, comm)?;
    fill_boundary_finish(handle, array)
}

/// Begin a boundary fill; local copies and sends are already under way when
/// this returns, so the caller can overlap interior computation before
/// calling [`fill_boundary_finish`].
pub fn fill_boundary_start<T, C>(
    array: &mut GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<ExchangeHandle<C>, PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    array.check_comps(&comps)?;
    array.check_ghost(ghost)?;
    array.rank_map().validate(array.partition(), comm.size())?;
    debug_assert_eq!(array.my_rank(), comm.rank());
    let plan = array.registry().fill_plan(
        array.partition(),
        array.rank_map(),
        ghost,
        domain,
        comm.rank(),
        false,
    )?;
    let handle = executor::start(
        array,
        None,
        &plan,
        comps,
        Identity,
        IdentityProjection,
        HostBackend::default(),
        comm,
    )?;
    array.set_ghost_filled(ghost);
    Ok(handle)
}

/// Complete a boundary fill begun by [`fill_boundary_start`].
pub fn fill_boundary_finish<T, C>(
    handle: ExchangeHandle<C>,
    array: &mut GridArray<T>,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    executor::finish(
        handle,
        array,
        Identity,
        IdentityProjection,
        HostBackend::default(),
    )
}

/// Copy component data from `src` into `dst` where their index regions
/// overlap (destination regions grown by `ghost`), between independently
/// partitioned arrays.
pub fn parallel_copy<T, C>(
    dst: &mut GridArray<T>,
    src: &GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    let handle = parallel_copy_start(dst, src, comps, ghost, domain, comm)?;
    parallel_copy_finish(handle, dst)
}

/// Begin a cross-partition copy; see [`parallel_copy`].
pub fn parallel_copy_start<T, C>(
    dst: &mut GridArray<T>,
    src: &GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<ExchangeHandle<C>, PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    dst.check_comps(&comps)?;
    src.check_comps(&comps)?;
    dst.check_ghost(ghost)?;
    dst.rank_map().validate(dst.partition(), comm.size())?;
    src.rank_map().validate(src.partition(), comm.size())?;
    let plan = dst.registry().copy_plan(
        dst.partition(),
        dst.rank_map(),
        ghost,
        src.partition(),
        src.rank_map(),
        IndexVec::zero(),
        domain,
        comm.rank(),
        false,
    )?;
    let handle = executor::start(
        dst,
        Some(src),
        &plan,
        comps,
        Identity,
        IdentityProjection,
        HostBackend::default(),
        comm,
    )?;
    dst.set_ghost_filled(ghost);
    Ok(handle)
}

/// Like [`parallel_copy`], but only the destination's ghost shell is
/// written; interior cells are left alone.
pub fn parallel_copy_ghosts_only<T, C>(
    dst: &mut GridArray<T>,
    src: &GridArray<T>,
    comps: Range<usize>,
    ghost: IndexVec,
    domain: &Domain,
    comm: &C,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    dst.check_comps(&comps)?;
    src.check_comps(&comps)?;
    dst.check_ghost(ghost)?;
    dst.rank_map().validate(dst.partition(), comm.size())?;
    src.rank_map().validate(src.partition(), comm.size())?;
    let plan = dst.registry().copy_plan(
        dst.partition(),
        dst.rank_map(),
        ghost,
        src.partition(),
        src.rank_map(),
        IndexVec::zero(),
        domain,
        comm.rank(),
        true,
    )?;
    let handle = executor::start(
        dst,
        Some(src),
        &plan,
        comps,
        Identity,
        IdentityProjection,
        HostBackend::default(),
        comm,
    )?;
    dst.set_ghost_filled(ghost);
    executor::finish(
        handle,
        dst,
        Identity,
        IdentityProjection,
        HostBackend::default(),
    )
}

/// Complete a cross-partition copy begun by [`parallel_copy_start`].
pub fn parallel_copy_finish<T, C>(
    handle: ExchangeHandle<C>,
    dst: &mut GridArray<T>,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
{
    executor::finish(
        handle,
        dst,
        Identity,
        IdentityProjection,
        HostBackend::default(),
    )
}
