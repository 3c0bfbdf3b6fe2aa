//! Execution backends: where packing, unpacking, and copies run.
//!
//! The executor is generic over a backend so the host path and an
//! accelerator path share one protocol. A device backend would override the
//! staging hooks to move packed buffers across the device boundary
//! (synchronizing its stream before handing a buffer to the network and
//! after receiving one); the host backend stages in place.

/// Execution environment for the data-movement side of an exchange.
pub trait ExecutionBackend: Copy + Send + Sync + 'static {
    /// May tag-level work run concurrently when the plan certifies that no
    /// two tags write overlapping destination cells?
    fn concurrent(&self) -> bool {
        false
    }

    /// Stage an outgoing packed buffer for transmission.
    fn stage_out(&self, buf: Vec<u8>) -> Vec<u8> {
        buf
    }

    /// Stage a received buffer for unpacking.
    fn stage_in(&self, buf: Vec<u8>) -> Vec<u8> {
        buf
    }
}

/// CPU execution; optionally tag-parallel via the thread pool.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostBackend {
    parallel: bool,
}

impl HostBackend {
    /// Strictly sequential tag processing.
    pub fn serial() -> Self {
        HostBackend { parallel: false }
    }

    /// Tag-parallel processing where plans certify it is safe. Falls back
    /// to sequential when the `rayon` feature is disabled.
    pub fn parallel() -> Self {
        HostBackend { parallel: true }
    }
}

impl ExecutionBackend for HostBackend {
    fn concurrent(&self) -> bool {
        cfg!(feature = "rayon") && self.parallel
    }
}
