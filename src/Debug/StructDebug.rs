use std::fmt;

use crate::Core::segment::{PosixSegment, SegmentSource};
use crate::Core::semaphore::NamedSemaphore;
use crate::Core::SharedMemory::{PosixSharedMemory, RawHandle, SharedMemoryBackend};
use crate::IPC::channel::Channel;
use crate::IPC::Schema::Decodable;

/// Debug function for PosixSharedMemory
///
/// Shows the mapping address and size without dereferencing the producer's bytes.
pub fn debug_posix_shared_memory(shm: &PosixSharedMemory, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let RawHandle::Fd(fd) = shm.raw_handle();
    f.debug_struct("PosixSharedMemory")
        .field("name", &shm.name())
        .field("ptr", &format_args!("{:p}", shm.as_ptr()))
        .field("size", &shm.size())
        .field("fd", &fd)
        .finish()
}

/// Debug function for NamedSemaphore
///
/// The `sem_t` is opaque; only its address is shown.
pub fn debug_named_semaphore(sem: &NamedSemaphore, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NamedSemaphore")
        .field("name", &sem.name())
        .field("sem", &format_args!("{:p}", sem.raw()))
        .finish()
}

pub fn debug_posix_segment(segment: &PosixSegment, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PosixSegment")
        .field("name", &segment.name())
        .field("shm", &format_args!("{:p}+{}", segment.shm().as_ptr(), segment.shm().size()))
        .field("semaphore", &segment.semaphore().name())
        .finish()
}

/// Debug function for Channel
///
/// Shows attach state, freshness and the latest record. Snapshot bytes are
/// summarised by length only.
pub fn debug_channel<T: Decodable>(channel: &Channel<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
        .field("name", &channel.name())
        .field("record", &T::RECORD)
        .field("payload_size", &channel.payload_size())
        .field("source", &channel.source().map(|s| s.name()))
        .field("error", &channel.error().map(ToString::to_string))
        .field("snapshot_len", &channel.snapshot().len())
        .field("last_update", &channel.last_update_time())
        .field("new_sample", &channel.is_new_sample())
        .field("policy", &channel.policy())
        .field("value", channel.record())
        .finish_non_exhaustive()
}
