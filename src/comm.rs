//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. All handles are waitable but
//! non-blocking — the exchange executor calls `.wait()` before it trusts
//! that data has arrived, and verifies the byte count itself.

use std::sync::atomic::{AtomicU16, Ordering::Relaxed};

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait + Send;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait + Send;

    /// This process's rank.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;

    /// Next exchange sequence number. Ranks call this in the same order at
    /// every collective exchange, so paired sends and receives agree on the
    /// wire tag without coordination.
    fn next_seq(&self) -> u16;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for pure single-rank use.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn next_seq(&self) -> u16 {
        0
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}
}

// --- ThreadComm: intra-process, multiple simulated ranks ---

type MailKey = (usize, usize, u16); // (src, dst, tag)

static MAILBOX: Lazy<DashMap<MailKey, Bytes>> = Lazy::new(DashMap::new);

/// Intra-process communicator backed by a global mailbox; one instance per
/// simulated rank. Used for multi-rank tests without an MPI launcher.
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    seq: AtomicU16,
}

impl ThreadComm {
    pub fn new(rank: usize, size: usize) -> Self {
        ThreadComm {
            rank,
            size,
            seq: AtomicU16::new(1),
        }
    }

    /// Drop all undelivered messages. Tests sharing the process-wide
    /// mailbox call this between scenarios.
    pub fn clear_mailbox() {
        MAILBOX.clear();
    }
}

/// Pending receive from the mailbox; resolved by polling in `wait`.
pub struct MailboxHandle {
    key: MailKey,
}

impl Wait for MailboxHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some((_, bytes)) = MAILBOX.remove(&self.key) {
                return Some(bytes.to_vec());
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = MailboxHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn next_seq(&self) -> u16 {
        self.seq.fetch_add(1, Relaxed)
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        MAILBOX.insert((self.rank, peer, tag), Bytes::from(buf.to_vec()));
    }

    fn irecv(&self, peer: usize, tag: u16, _len: usize) -> MailboxHandle {
        MailboxHandle {
            key: (peer, self.rank, tag),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::Rank;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    static SEQ: AtomicU16 = AtomicU16::new(1);

    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Wrap the world communicator; MPI must already be initialized.
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            MpiComm { world, rank, size }
        }
    }

    /// In-flight request owning its (leaked) buffer until completion.
    pub struct MpiHandle {
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
        deliver: bool,
    }

    // the raw buffer pointer is owned exclusively by this handle
    unsafe impl Send for MpiHandle {}

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            let buf = unsafe { Box::from_raw(self.buf) };
            self.deliver.then(|| buf.into_vec())
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn next_seq(&self) -> u16 {
            SEQ.fetch_add(1, Relaxed)
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let stable: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr = stable as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as Rank)
                .immediate_send_with_tag(StaticScope, &*stable, tag as i32);
            MpiHandle {
                req,
                buf: ptr,
                deliver: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, len: usize) -> MpiHandle {
            let stable: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
            let ptr = stable as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as Rank)
                .immediate_receive_into_with_tag(StaticScope, stable, tag as i32);
            MpiHandle {
                req,
                buf: ptr,
                deliver: true,
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn thread_comm_roundtrip_two_ranks() {
        ThreadComm::clear_mailbox();
        let comm0 = ThreadComm::new(0, 2);
        let comm1 = ThreadComm::new(1, 2);

        let recv = comm1.irecv(0, 7, 4);
        comm0.isend(1, 7, &[1, 2, 3, 4]);
        let data = recv.wait().expect("data from rank 0");
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    #[serial]
    fn seq_numbers_advance_in_lockstep_per_rank() {
        let comm0 = ThreadComm::new(0, 2);
        let comm1 = ThreadComm::new(1, 2);
        // each rank draws from its own counter, so matched exchange
        // instances observe matching sequence numbers
        assert_eq!(comm0.next_seq(), comm1.next_seq());
        assert_eq!(comm0.next_seq(), comm1.next_seq());
    }

    #[test]
    fn no_comm_is_single_rank() {
        let c = NoComm;
        assert_eq!(c.rank(), 0);
        assert_eq!(c.size(), 1);
        assert!(c.isend(0, 0, &[1]).wait().is_none());
    }
}
