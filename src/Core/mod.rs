pub mod SharedMemory;
pub mod memory;
pub mod segment;
pub mod semaphore;

pub use memory::MemorySegment;
pub use segment::{PosixSegment, SegmentSource};
pub use semaphore::{CancelToken, NamedSemaphore, SemaphoreGuard, WaitPolicy};
pub use SharedMemory::{attach_shared_memory, PosixSharedMemory, RawHandle, SharedMemoryBackend};
