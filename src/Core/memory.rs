// In-process segment for tests, demos and fake producers

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::semaphore::{wait_until, WaitPolicy};
use super::segment::SegmentSource;
use crate::error::{Error, Result};

/// A heap-backed segment guarded by a parking_lot mutex.
///
/// Clones share the same bytes, so a test can hand one clone to a
/// [`Channel`](crate::IPC::Channel) and keep another to play the producer.
#[derive(Debug, Clone)]
pub struct MemorySegment {
    name: String,
    len: usize,
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemorySegment {
    /// A zero-filled segment of `total_size` bytes.
    pub fn new(name: &str, total_size: usize) -> Self {
        Self {
            name: name.trim_start_matches('/').to_string(),
            len: total_size,
            bytes: Arc::new(Mutex::new(vec![0; total_size])),
        }
    }

    /// Overwrite the segment from offset 0, the way a producer publishes a sample.
    ///
    /// Bytes beyond `data.len()` keep their old contents; `data` longer than
    /// the segment is truncated.
    pub fn publish(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock();
        let n = std::cmp::min(bytes.len(), data.len());
        bytes[..n].copy_from_slice(&data[..n]);
    }

    /// Take the segment lock and keep it, simulating a producer stuck mid-write.
    pub fn hold(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock()
    }

    /// Current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }
}

impl SegmentSource for MemorySegment {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.len
    }

    fn copy_into(&self, dst: &mut [u8], wait: &WaitPolicy) -> Result<()> {
        let mut guard = None;
        wait_until(wait, || {
            guard = self.bytes.try_lock();
            Ok(guard.is_some())
        })?
        .map_err(|failure| failure.into_error(&self.name))?;

        let Some(bytes) = guard else {
            return Err(Error::Cancelled {
                name: self.name.clone(),
            });
        };
        let n = std::cmp::min(dst.len(), bytes.len());
        dst[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }
}
