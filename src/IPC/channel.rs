use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::cursor::{Cursor, OverrunPolicy};
use super::freshness::{Freshness, ProducerTime};
use super::layout::{segment_size, SegmentHeader};
use super::snapshot::Snapshot;
use super::Schema::Decodable;
use crate::error::{Error, Result, StaleDataWarning};
use crate::Core::segment::{PosixSegment, SegmentSource};
use crate::Core::semaphore::WaitPolicy;

/// Outcome of one [`Channel::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The producer wrote since the previous read; the record was refreshed.
    NewSample,
    /// Same producer timestamp as last time. The record was decoded again from
    /// the identical snapshot, so its values do not change.
    Unchanged,
    /// The channel is in its error state or detached; nothing was read.
    Unavailable,
}

/// A reader attached to one producer segment, decoding it as `T`.
///
/// `read` takes `&mut self`: one channel owns one snapshot and one cursor, so
/// concurrent reads must be serialised by the caller. Wrap it in a
/// [`SharedChannel`] to hand it to another thread. Distinct channels are
/// independent and can be read in parallel.
pub struct Channel<T: Decodable> {
    name: String,
    payload_size: usize,
    source: Option<Box<dyn SegmentSource>>,
    error: Option<Error>,
    snapshot: Snapshot,
    header: SegmentHeader,
    freshness: Freshness,
    record: T,
    policy: OverrunPolicy,
    wait: WaitPolicy,
    last_overruns: usize,
}

/// A channel shared between threads behind a parking_lot mutex.
pub type SharedChannel<T> = Arc<Mutex<Channel<T>>>;

impl<T: Decodable> Channel<T> {
    /// Attach to the segment named after `T`'s message type.
    ///
    /// Never fails: if the producer's segment or semaphore is missing the
    /// channel is returned in its error state. Check [`no_error`](Self::no_error).
    pub fn attach() -> Self {
        Self::attach_named(T::CHANNEL)
    }

    /// Attach to segment `name`, decoding it as `T`.
    pub fn attach_named(name: &str) -> Self {
        Self::attach_with(name, OverrunPolicy::default(), WaitPolicy::default())
    }

    pub(crate) fn attach_with(name: &str, policy: OverrunPolicy, wait: WaitPolicy) -> Self {
        let name = name.trim_start_matches('/');
        let mut channel = Self::empty(name, policy, wait);
        match PosixSegment::attach(name, segment_size(T::PAYLOAD_SIZE)) {
            Ok(segment) => {
                debug!(channel = name, record = T::RECORD, "channel attached");
                channel.source = Some(Box::new(segment));
            }
            Err(err) => {
                warn!(channel = name, error = %err, "channel unavailable");
                channel.error = Some(err);
            }
        }
        channel
    }

    /// Read from an arbitrary segment source, such as an in-process [`MemorySegment`](crate::Core::MemorySegment).
    pub fn from_source(source: Box<dyn SegmentSource>) -> Self {
        Self::from_source_with(source, OverrunPolicy::default(), WaitPolicy::default())
    }

    pub(crate) fn from_source_with(
        source: Box<dyn SegmentSource>,
        policy: OverrunPolicy,
        wait: WaitPolicy,
    ) -> Self {
        let mut channel = Self::empty(source.name(), policy, wait);
        channel.snapshot = Snapshot::with_len(source.len());
        channel.source = Some(source);
        channel
    }

    fn empty(name: &str, policy: OverrunPolicy, wait: WaitPolicy) -> Self {
        Self {
            name: name.to_string(),
            payload_size: T::PAYLOAD_SIZE,
            source: None,
            error: None,
            snapshot: Snapshot::with_len(segment_size(T::PAYLOAD_SIZE)),
            header: SegmentHeader::default(),
            freshness: Freshness::new(),
            record: T::default(),
            policy,
            wait,
            last_overruns: 0,
        }
    }

    /// Take a snapshot and decode it.
    ///
    /// Blocks for at most the wait policy's timeout. A timeout, cancellation
    /// or decode failure is returned for this read only; the channel stays
    /// usable. On a decode failure the fields decoded before the failing one
    /// hold new values and the rest keep their previous ones.
    ///
    /// The header timestamp is recorded before the payload is decoded, so a
    /// sample whose payload fails to decode still counts as seen: reading it
    /// again returns `Unchanged`.
    pub fn read(&mut self) -> Result<ReadStatus> {
        let Some(source) = self.source.as_deref() else {
            return Ok(ReadStatus::Unavailable);
        };
        if self.error.is_some() {
            return Ok(ReadStatus::Unavailable);
        }

        self.snapshot.refresh(source, &self.wait)?;
        let bytes = self.snapshot.as_bytes();

        let mut cursor = Cursor::new(bytes, self.policy);
        self.header = SegmentHeader::decode(&mut cursor).map_err(|source| Error::Decode {
            name: self.name.clone(),
            source,
        })?;
        let is_new = self.freshness.observe(self.header.updated);

        let mut cursor = Cursor::at_payload(bytes, self.policy);
        let decoded = self.record.decode(&mut cursor);
        self.last_overruns = cursor.overruns();
        cursor.unpack_done();
        decoded.map_err(|source| Error::Decode {
            name: self.name.clone(),
            source,
        })?;

        if self.last_overruns > 0 {
            warn!(
                channel = %self.name,
                overruns = self.last_overruns,
                "payload shorter than schema, zero-filled fields"
            );
        }
        trace!(channel = %self.name, new_sample = is_new, "read");

        Ok(if is_new {
            ReadStatus::NewSample
        } else {
            ReadStatus::Unchanged
        })
    }

    /// True while the channel is attached and attach succeeded.
    pub fn no_error(&self) -> bool {
        self.error.is_none() && self.source.is_some()
    }

    /// The attach failure that put the channel in its error state.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Release the semaphore handle and unmap the segment. Calling it again does nothing.
    pub fn detach(&mut self) {
        if let Some(source) = self.source.take() {
            debug!(channel = %self.name, "channel detached");
            drop(source);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    /// Always fails: the consumer never writes into the producer's segment.
    pub fn write(&mut self, _record: &T) -> Result<()> {
        Err(Error::WriteUnsupported {
            name: self.name.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// The latest decoded record; zeroed until the first successful read.
    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    pub fn policy(&self) -> OverrunPolicy {
        self.policy
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_new_sample(&self) -> bool {
        self.freshness.is_new_sample()
    }

    pub fn last_update_time(&self) -> ProducerTime {
        self.freshness.last_update_time()
    }

    pub fn last_read_time(&self) -> ProducerTime {
        self.freshness.last_read_time()
    }

    /// Host wall clock minus the producer's last update time.
    pub fn data_age(&self) -> Duration {
        self.freshness.data_age()
    }

    /// A warning if the newest sample is older than `threshold`.
    pub fn check_stale(&self, threshold: Duration) -> Option<StaleDataWarning> {
        self.check_stale_at(threshold, SystemTime::now())
    }

    pub fn check_stale_at(&self, threshold: Duration, now: SystemTime) -> Option<StaleDataWarning> {
        let age = self.freshness.stale_at(threshold, now)?;
        Some(StaleDataWarning {
            channel: self.name.clone(),
            age,
            threshold,
        })
    }

    /// Lenient overruns absorbed during the last read.
    pub fn last_overruns(&self) -> usize {
        self.last_overruns
    }

    pub(crate) fn source(&self) -> Option<&dyn SegmentSource> {
        self.source.as_deref()
    }

    /// Wrap in an `Arc<Mutex<_>>` for sharing with worker threads.
    pub fn into_shared(self) -> SharedChannel<T> {
        Arc::new(Mutex::new(self))
    }
}

impl<T: Decodable> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_channel(self, f)
    }
}
