use tracing::trace;

use crate::Core::segment::SegmentSource;
use crate::Core::semaphore::WaitPolicy;
use crate::error::Result;

/// A private copy of a whole segment, taken under the segment lock.
///
/// The copy is the consistency boundary: all fields decoded from one snapshot
/// come from the same producer write. Decoding happens after the lock is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    buf: Vec<u8>,
    refreshed: u64,
}

impl Snapshot {
    /// A zeroed snapshot of `len` bytes.
    pub fn with_len(len: usize) -> Self {
        Self {
            buf: vec![0; len],
            refreshed: 0,
        }
    }

    /// Copy the current segment contents into this snapshot.
    ///
    /// The lock is held only for the copy. Sources copy nothing until they hold
    /// the lock, so a failed wait leaves the previous contents in place.
    pub fn refresh(&mut self, source: &dyn SegmentSource, wait: &WaitPolicy) -> Result<()> {
        if self.buf.len() != source.len() {
            self.buf.resize(source.len(), 0);
        }
        source.copy_into(&mut self.buf, wait)?;
        self.refreshed += 1;
        trace!(segment = source.name(), bytes = self.buf.len(), "snapshot refreshed");
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of successful refreshes.
    pub fn refresh_count(&self) -> u64 {
        self.refreshed
    }
}
