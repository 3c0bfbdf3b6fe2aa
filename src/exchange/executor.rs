//! The non-blocking exchange protocol.
//!
//! `start` posts receives sized from the plan's tag geometry, packs and
//! posts sends, then runs local copies so local work overlaps network
//! latency. `finish` waits for the receives, verifies every message's byte
//! count against the plan (a mismatch is a protocol desynchronization
//! between ranks and is not recoverable), unpacks through the coordinate
//! map and value projection, and finally waits for the sends so buffers
//! outlive their transmission.
//!
//! Both the packing and unpacking sides traverse each tag's *destination*
//! box in a fixed order, components contiguous per cell, tags in the plan's
//! sorted order; the sender reads through the same destination-to-source
//! map the receiver uses, so the byte streams align without any metadata.

use std::ops::Range;
use std::sync::Arc;

use bytemuck::cast_slice;
use log::trace;

use crate::array::{GridArray, Patch, Scalar};
use crate::comm::{Communicator, Wait};
use crate::exchange::backend::ExecutionBackend;
use crate::halo_error::PatchHaloError;
use crate::plan::exchange_plan::ExchangePlan;
use crate::plan::tag::CopyTag;
use crate::xform::{CoordMap, ValueProjection};

/// In-flight exchange: posted requests and the plan that shaped them.
///
/// Obtained from `start`; must be passed to `finish` before the destination
/// array's ghost data may be read.
pub struct ExchangeHandle<C: Communicator> {
    seq: u16,
    plan: Arc<ExchangePlan>,
    comps: Range<usize>,
    recvs: Vec<(usize, C::RecvHandle, usize)>,
    sends: Vec<C::SendHandle>,
    active: bool,
}

impl<C: Communicator> ExchangeHandle<C> {
    fn inactive(plan: &Arc<ExchangePlan>, comps: Range<usize>) -> Self {
        ExchangeHandle {
            seq: 0,
            plan: Arc::clone(plan),
            comps,
            recvs: Vec::new(),
            sends: Vec::new(),
            active: false,
        }
    }

    /// The sequence number tagging this exchange on the wire.
    pub fn seq(&self) -> u16 {
        self.seq
    }
}

fn tags_bytes<T: Scalar>(tags: &[CopyTag], ncomp: usize) -> usize {
    tags.iter().map(|t| t.dbox.num_cells()).sum::<usize>() * ncomp * std::mem::size_of::<T>()
}

/// Read one tag's values from the source array, traversing the destination
/// box through the coordinate map.
fn gather_tag<T: Scalar, M: CoordMap>(
    src: &GridArray<T>,
    tag: &CopyTag,
    comps: &Range<usize>,
    map: &M,
    out: &mut Vec<T>,
) -> Result<(), PatchHaloError> {
    let patch = src.patch(tag.src_index)?;
    for cell in tag.dbox.cells() {
        let si = map.dest_to_src(cell);
        debug_assert!(
            tag.sbox.contains(si),
            "mapped index {si:?} escapes source box {:?}",
            tag.sbox
        );
        for n in comps.clone() {
            out.push(patch.read(si, n));
        }
    }
    Ok(())
}

/// Write one tag's values into a destination patch, applying the value
/// projection per destination cell and component.
fn scatter_into_patch<T: Scalar, M: CoordMap, P: ValueProjection<T>>(
    patch: &mut Patch<T>,
    tag: &CopyTag,
    comps: &Range<usize>,
    map: &M,
    proj: &P,
    vals: &[T],
) {
    debug_assert_eq!(vals.len(), tag.dbox.num_cells() * comps.len());
    let mut slot = 0;
    for cell in tag.dbox.cells() {
        debug_assert!(tag.sbox.contains(map.dest_to_src(cell)));
        for n in comps.clone() {
            patch.write(cell, n, proj.project(vals[slot], cell, n));
            slot += 1;
        }
    }
}

fn gather_all<T: Scalar, M: CoordMap, B: ExecutionBackend>(
    src: &GridArray<T>,
    tags: &[CopyTag],
    comps: &Range<usize>,
    map: &M,
    backend: B,
) -> Result<Vec<Vec<T>>, PatchHaloError> {
    let one = |tag: &CopyTag| -> Result<Vec<T>, PatchHaloError> {
        let mut out = Vec::with_capacity(tag.dbox.num_cells() * comps.len());
        gather_tag(src, tag, comps, map, &mut out)?;
        Ok(out)
    };
    #[cfg(feature = "rayon")]
    if backend.concurrent() {
        use rayon::prelude::*;
        return tags.par_iter().map(one).collect();
    }
    let _ = backend;
    tags.iter().map(one).collect()
}

/// Apply gathered values; tag-parallel per destination patch when the plan
/// certifies non-overlapping writes, sequential otherwise.
fn scatter_all<T: Scalar, M: CoordMap, P: ValueProjection<T>, B: ExecutionBackend>(
    dst: &mut GridArray<T>,
    jobs: Vec<(CopyTag, Vec<T>)>,
    comps: &Range<usize>,
    map: &M,
    proj: &P,
    backend: B,
    threadsafe: bool,
) -> Result<(), PatchHaloError> {
    #[cfg(feature = "rayon")]
    if backend.concurrent() && threadsafe {
        use rayon::prelude::*;
        let mut groups: hashbrown::HashMap<usize, Vec<(CopyTag, Vec<T>)>> =
            hashbrown::HashMap::new();
        for job in jobs {
            groups.entry(job.0.dst_index).or_default().push(job);
        }
        let mut work: Vec<(&mut Patch<T>, Vec<(CopyTag, Vec<T>)>)> = Vec::new();
        for (i, patch) in dst.local_patches_mut() {
            if let Some(g) = groups.remove(&i) {
                work.push((patch, g));
            }
        }
        if let Some(&i) = groups.keys().next() {
            return Err(PatchHaloError::NotLocal(i));
        }
        work.par_iter_mut().for_each(|(patch, group)| {
            for (tag, vals) in group {
                scatter_into_patch(*patch, tag, comps, map, proj, vals);
            }
        });
        return Ok(());
    }
    let _ = (backend, threadsafe);
    for (tag, vals) in jobs {
        let patch = dst.patch_mut(tag.dst_index)?;
        scatter_into_patch(patch, &tag, comps, map, proj, &vals);
    }
    Ok(())
}

/// Execute the plan's local tags: gather from the source (which may be the
/// destination array itself), then scatter. The two-phase form makes
/// self-to-self ghost fills well-defined even when a tag's source and
/// destination share a patch.
fn run_local_tags<T: Scalar, M: CoordMap, P: ValueProjection<T>, B: ExecutionBackend>(
    dst: &mut GridArray<T>,
    src: Option<&GridArray<T>>,
    plan: &ExchangePlan,
    comps: &Range<usize>,
    map: &M,
    proj: &P,
    backend: B,
) -> Result<(), PatchHaloError> {
    if plan.local.is_empty() {
        return Ok(());
    }
    let gathered = match src {
        Some(s) => gather_all(s, &plan.local, comps, map, backend)?,
        None => gather_all(&*dst, &plan.local, comps, map, backend)?,
    };
    let jobs: Vec<_> = plan.local.iter().copied().zip(gathered).collect();
    scatter_all(dst, jobs, comps, map, proj, backend, plan.local_threadsafe)
}

fn pack_tags<T: Scalar, M: CoordMap, B: ExecutionBackend>(
    src: &GridArray<T>,
    tags: &[CopyTag],
    comps: &Range<usize>,
    map: &M,
    backend: B,
) -> Result<Vec<u8>, PatchHaloError> {
    let nvals = tags_bytes::<T>(tags, comps.len()) / std::mem::size_of::<T>();
    let mut vals: Vec<T> = Vec::new();
    vals.try_reserve_exact(nvals)
        .map_err(|_| PatchHaloError::BufferAlloc {
            bytes: nvals * std::mem::size_of::<T>(),
        })?;
    for tag in tags {
        gather_tag(src, tag, comps, map, &mut vals)?;
    }
    Ok(backend.stage_out(cast_slice(&vals).to_vec()))
}

#[allow(clippy::too_many_arguments)]
fn unpack_tags<T: Scalar, M: CoordMap, P: ValueProjection<T>, B: ExecutionBackend>(
    dst: &mut GridArray<T>,
    tags: &[CopyTag],
    comps: &Range<usize>,
    map: &M,
    proj: &P,
    data: &[u8],
    backend: B,
    threadsafe: bool,
) -> Result<(), PatchHaloError> {
    let elem = std::mem::size_of::<T>();
    let mut offset = 0;
    let mut jobs = Vec::with_capacity(tags.len());
    for tag in tags {
        let n = tag.dbox.num_cells() * comps.len();
        let mut vals = vec![T::default(); n];
        cast_slice_mut_bytes(&mut vals).copy_from_slice(&data[offset..offset + n * elem]);
        offset += n * elem;
        jobs.push((*tag, vals));
    }
    debug_assert_eq!(offset, data.len());
    scatter_all(dst, jobs, comps, map, proj, backend, threadsafe)
}

/// Byte view of a scalar slice; always aligned in this direction.
fn cast_slice_mut_bytes<T: Scalar>(vals: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(vals)
}

/// Begin an exchange described by `plan`, moving data from `src` (or from
/// `dst` itself for boundary fills) into `dst`.
///
/// On a single rank all local copies execute immediately and the returned
/// handle is inert. Otherwise receives are posted first, sized from the tag
/// geometry; sends are packed and posted; local copies run last so they
/// overlap the in-flight messages.
#[allow(clippy::too_many_arguments)]
pub fn start<T, C, M, P, B>(
    dst: &mut GridArray<T>,
    src: Option<&GridArray<T>>,
    plan: &Arc<ExchangePlan>,
    comps: Range<usize>,
    map: M,
    proj: P,
    backend: B,
    comm: &C,
) -> Result<ExchangeHandle<C>, PatchHaloError>
where
    T: Scalar,
    C: Communicator,
    M: CoordMap,
    P: ValueProjection<T>,
    B: ExecutionBackend,
{
    if comm.size() == 1 {
        debug_assert!(plan.send.is_empty() && plan.recv.is_empty());
        run_local_tags(dst, src, plan, &comps, &map, &proj, backend)?;
        return Ok(ExchangeHandle::inactive(plan, comps));
    }

    // Draw the sequence number before any early exit so paired ranks stay
    // aligned on the wire.
    let seq = comm.next_seq();

    let mut recvs = Vec::with_capacity(plan.recv.len());
    for (&rank, tags) in &plan.recv {
        let expected = tags_bytes::<T>(tags, comps.len());
        recvs.push((rank, comm.irecv(rank, seq, expected), expected));
    }

    let mut sends = Vec::with_capacity(plan.send.len());
    for (&rank, tags) in &plan.send {
        let buf = match src {
            Some(s) => pack_tags(s, tags, &comps, &map, backend)?,
            None => pack_tags(&*dst, tags, &comps, &map, backend)?,
        };
        trace!("exchange {seq}: sending {} bytes to rank {rank}", buf.len());
        sends.push(comm.isend(rank, seq, &buf));
    }

    run_local_tags(dst, src, plan, &comps, &map, &proj, backend)?;

    Ok(ExchangeHandle {
        seq,
        plan: Arc::clone(plan),
        comps,
        recvs,
        sends,
        active: true,
    })
}

/// Complete an exchange begun by [`start`].
///
/// Blocks until every posted receive has completed, verifies each message's
/// byte length against the plan geometry, unpacks into `dst`, then blocks
/// until every posted send has completed.
pub fn finish<T, C, M, P, B>(
    handle: ExchangeHandle<C>,
    dst: &mut GridArray<T>,
    map: M,
    proj: P,
    backend: B,
) -> Result<(), PatchHaloError>
where
    T: Scalar,
    C: Communicator,
    M: CoordMap,
    P: ValueProjection<T>,
    B: ExecutionBackend,
{
    if !handle.active {
        return Ok(());
    }
    let ExchangeHandle {
        seq,
        plan,
        comps,
        recvs,
        sends,
        ..
    } = handle;

    let mut buffers = Vec::with_capacity(recvs.len());
    for (rank, h, expected) in recvs {
        let data = h.wait().ok_or_else(|| PatchHaloError::CommError {
            neighbor: rank,
            message: "receive completed without data".into(),
        })?;
        if data.len() != expected {
            return Err(PatchHaloError::RecvSizeMismatch {
                neighbor: rank,
                expected,
                got: data.len(),
            });
        }
        buffers.push((rank, backend.stage_in(data)));
    }

    for (rank, data) in buffers {
        let tags = &plan.recv[&rank];
        unpack_tags(
            dst,
            tags,
            &comps,
            &map,
            &proj,
            &data,
            backend,
            plan.recv_threadsafe,
        )?;
    }

    for s in sends {
        let _ = s.wait();
    }
    trace!("exchange {seq} complete");
    Ok(())
}
