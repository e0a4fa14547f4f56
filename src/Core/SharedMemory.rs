// Shared memory backend abstraction for POSIX systems
// Attaches to segments published by the producer via shm_open + mmap

use std::ffi::CString;
use std::fmt;
use std::fmt::Debug;
use std::io;
use std::ptr::NonNull;

use tracing::debug;

use crate::error::{Error, Result};

/// Shared memory backend trait for read-only memory mappings
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *const u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Unix file descriptor
    Fd(i32),
}

/// Normalise a segment name into the `/name` form `shm_open` and `sem_open` expect.
///
/// A single leading slash is accepted; the remainder must be non-empty and free
/// of `/` and NUL bytes.
pub fn posix_name(name: &str) -> io::Result<CString> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty name"));
    }
    if bare.contains('/') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "name may not contain '/' after the leading slash",
        ));
    }
    CString::new(format!("/{bare}"))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains a NUL byte"))
}

/// Attach to an existing shared memory region published by a producer.
///
/// # Arguments
/// * `name` - Name of the shared memory object (with or without leading `/`)
/// * `size` - Number of bytes to map; the object must be at least this large
///
/// # Returns
/// A boxed trait object implementing SharedMemoryBackend
pub fn attach_shared_memory(name: &str, size: usize) -> Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(PosixSharedMemory::attach(name, size)?))
}

/// A read-only mapping of a POSIX shared memory object.
pub struct PosixSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    name: String,
}

// The mapping is read-only from this side; the producer synchronises writes
// through the paired semaphore.
unsafe impl Send for PosixSharedMemory {}
unsafe impl Sync for PosixSharedMemory {}

impl PosixSharedMemory {
    /// Open `name` with `shm_open` and map exactly `size` bytes of it.
    pub fn attach(name: &str, size: usize) -> Result<Self> {
        let c_name = posix_name(name).map_err(|source| Error::Attach {
            name: name.to_string(),
            source,
        })?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
        if fd < 0 {
            return Err(Error::Attach {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        // Get the size from the existing object
        let actual_size = unsafe {
            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) != 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(Error::Map {
                    name: name.to_string(),
                    source: err,
                });
            }
            usize::try_from(stat.st_size).unwrap_or(0)
        };

        if actual_size < size {
            unsafe { libc::close(fd) };
            return Err(Error::SegmentTooSmall {
                name: name.to_string(),
                expected: size,
                actual: actual_size,
            });
        }

        let ptr = unsafe {
            let ptr = libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                0,
            );

            if ptr == libc::MAP_FAILED {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(Error::Map {
                    name: name.to_string(),
                    source: err,
                });
            }
            ptr as *mut u8
        };

        let Some(ptr) = NonNull::new(ptr) else {
            unsafe { libc::close(fd) };
            return Err(Error::Map {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"),
            });
        };

        debug!(segment = name, size, object_size = actual_size, "mapped shared memory");

        Ok(Self {
            ptr,
            size,
            fd,
            name: name.to_string(),
        })
    }

    /// Name the segment was attached under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PosixSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}

impl SharedMemoryBackend for PosixSharedMemory {
    fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }
}

impl fmt::Debug for PosixSharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_posix_shared_memory(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_name_adds_slash() {
        assert_eq!(posix_name("GGA").unwrap().to_str().unwrap(), "/GGA");
        assert_eq!(posix_name("/GGA").unwrap().to_str().unwrap(), "/GGA");
    }

    #[test]
    fn test_posix_name_rejects_bad_names() {
        assert!(posix_name("").is_err());
        assert!(posix_name("/").is_err());
        assert!(posix_name("a/b").is_err());
        assert!(posix_name("nul\0byte").is_err());
    }
}
