// A lock-guarded byte region that can be copied out atomically

use std::fmt;

use tracing::debug;

use super::semaphore::{semaphore_name, NamedSemaphore, WaitPolicy};
use super::SharedMemory::{attach_shared_memory, SharedMemoryBackend};
use crate::error::Result;

/// Source of segment snapshots.
///
/// Implementations copy the whole region into `dst` while holding whatever
/// lock the producer honours, and release it before returning. Decoding never
/// happens under the lock.
pub trait SegmentSource: Send + fmt::Debug {
    /// Segment name (without leading slash).
    fn name(&self) -> &str;

    /// Number of bytes a snapshot copies: header plus payload.
    fn len(&self) -> usize;

    /// Copy `self.len()` bytes into `dst` under the segment lock.
    ///
    /// `dst` must be exactly `self.len()` bytes long.
    fn copy_into(&self, dst: &mut [u8], wait: &WaitPolicy) -> Result<()>;
}

/// The producer's POSIX segment plus its `SEM_<name>` semaphore.
pub struct PosixSegment {
    shm: Box<dyn SharedMemoryBackend>,
    semaphore: NamedSemaphore,
    name: String,
}

impl PosixSegment {
    /// Attach to the segment `name`, mapping `total_size` bytes, and open its semaphore.
    ///
    /// Neither object is created; both must already be published by the producer.
    pub fn attach(name: &str, total_size: usize) -> Result<Self> {
        let name = name.trim_start_matches('/');
        let shm = attach_shared_memory(name, total_size)?;
        let semaphore = NamedSemaphore::open(&semaphore_name(name))?;
        debug!(segment = name, semaphore = semaphore.name(), "attached segment");

        Ok(Self {
            shm,
            semaphore,
            name: name.to_string(),
        })
    }

    pub(crate) fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    pub(crate) fn semaphore(&self) -> &NamedSemaphore {
        &self.semaphore
    }
}

impl SegmentSource for PosixSegment {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.shm.size()
    }

    fn copy_into(&self, dst: &mut [u8], wait: &WaitPolicy) -> Result<()> {
        debug_assert_eq!(dst.len(), self.shm.size());
        let len = std::cmp::min(dst.len(), self.shm.size());

        let _guard = self.semaphore.acquire(wait)?;
        // Safety: the mapping is at least `size()` bytes for the lifetime of `self.shm`,
        // and the producer does not write while we hold the semaphore.
        unsafe {
            std::ptr::copy_nonoverlapping(self.shm.as_ptr(), dst.as_mut_ptr(), len);
        }
        Ok(())
    }
}

impl fmt::Debug for PosixSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_posix_segment(self, f)
    }
}
