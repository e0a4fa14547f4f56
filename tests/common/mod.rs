// Shared helpers for integration tests: a little-endian payload builder and,
// on Linux, a stand-in producer that creates the segment and its semaphore.
#![allow(dead_code)]

use smipc_telemetry::IPC::HEADER_SIZE;

/// Builds header + payload bytes the way the producer lays them out.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    /// Start with a 40-byte header.
    pub fn header(length: u64, sec: i64, nsec: i64) -> Self {
        let mut w = Self::default();
        w.buf.extend_from_slice(&length.to_le_bytes());
        w.buf.extend_from_slice(&sec.to_le_bytes());
        w.buf.extend_from_slice(&nsec.to_le_bytes());
        w.buf.extend_from_slice(&0f64.to_le_bytes());
        w.buf.extend_from_slice(&0i64.to_le_bytes());
        assert_eq!(w.buf.len(), HEADER_SIZE);
        w
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f64(mut self, v: f64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn bytes(mut self, v: &[u8]) -> Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn zeros(mut self, n: usize) -> Self {
        self.buf.resize(self.buf.len() + n, 0);
        self
    }

    /// Bytes written after the header.
    pub fn payload_len(&self) -> usize {
        self.buf.len() - HEADER_SIZE
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// A unique segment name for this test process.
pub fn unique_name(tag: &str) -> String {
    format!("smipc_test_{tag}_{}", std::process::id())
}

#[cfg(target_os = "linux")]
pub use producer::TestProducer;

#[cfg(target_os = "linux")]
mod producer {
    use std::ffi::CString;
    use std::ptr;

    /// Creates and owns a segment (and optionally its `SEM_` semaphore),
    /// unlinking both on drop.
    pub struct TestProducer {
        name: String,
        shm_name: CString,
        sem_name: CString,
        ptr: *mut u8,
        size: usize,
        sem: Option<*mut libc::sem_t>,
    }

    pub struct HeldSemaphore<'a> {
        sem: *mut libc::sem_t,
        _producer: &'a TestProducer,
    }

    impl Drop for HeldSemaphore<'_> {
        fn drop(&mut self) {
            unsafe {
                libc::sem_post(self.sem);
            }
        }
    }

    impl TestProducer {
        pub fn create(name: &str, size: usize) -> Self {
            Self::create_inner(name, size, true)
        }

        /// A segment whose semaphore was never published.
        pub fn create_without_semaphore(name: &str, size: usize) -> Self {
            Self::create_inner(name, size, false)
        }

        fn create_inner(name: &str, size: usize, with_semaphore: bool) -> Self {
            let shm_name = CString::new(format!("/{name}")).unwrap();
            let sem_name = CString::new(format!("/SEM_{name}")).unwrap();

            unsafe {
                libc::shm_unlink(shm_name.as_ptr());
                libc::sem_unlink(sem_name.as_ptr());

                let fd = libc::shm_open(shm_name.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600);
                assert!(fd >= 0, "shm_open failed: {}", std::io::Error::last_os_error());
                assert_eq!(libc::ftruncate(fd, size as libc::off_t), 0);

                let ptr = libc::mmap(
                    ptr::null_mut(),
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                );
                libc::close(fd);
                assert_ne!(ptr, libc::MAP_FAILED, "mmap failed");

                let sem = if with_semaphore {
                    let sem = libc::sem_open(
                        sem_name.as_ptr(),
                        libc::O_CREAT,
                        0o600 as libc::c_uint,
                        1 as libc::c_uint,
                    );
                    assert_ne!(sem, libc::SEM_FAILED, "sem_open failed");
                    Some(sem)
                } else {
                    None
                };

                Self {
                    name: name.to_string(),
                    shm_name,
                    sem_name,
                    ptr: ptr as *mut u8,
                    size,
                    sem,
                }
            }
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        /// Publish `data` from offset 0 under the semaphore.
        pub fn write(&self, data: &[u8]) {
            assert!(data.len() <= self.size);
            unsafe {
                if let Some(sem) = self.sem {
                    libc::sem_wait(sem);
                }
                ptr::copy_nonoverlapping(data.as_ptr(), self.ptr, data.len());
                if let Some(sem) = self.sem {
                    libc::sem_post(sem);
                }
            }
        }

        /// Take the semaphore and keep it until the guard drops.
        pub fn hold(&self) -> HeldSemaphore<'_> {
            let sem = self.sem.expect("producer has no semaphore");
            unsafe {
                libc::sem_wait(sem);
            }
            HeldSemaphore {
                sem,
                _producer: self,
            }
        }

        /// Current semaphore count.
        pub fn semaphore_value(&self) -> i32 {
            let sem = self.sem.expect("producer has no semaphore");
            let mut value = 0;
            unsafe {
                libc::sem_getvalue(sem, &mut value);
            }
            value
        }
    }

    impl Drop for TestProducer {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
                if let Some(sem) = self.sem {
                    libc::sem_close(sem);
                    libc::sem_unlink(self.sem_name.as_ptr());
                }
                libc::shm_unlink(self.shm_name.as_ptr());
            }
        }
    }
}
