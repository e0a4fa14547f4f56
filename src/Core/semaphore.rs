// Named POSIX semaphore paired with a producer's shared memory segment

use std::fmt;
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;
use tracing::{trace, warn};

use super::SharedMemory::posix_name;
use crate::error::{Error, Result};

/// Default bound on how long a reader waits for the producer to release the semaphore.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(500);

/// Longest single sleep between `sem_trywait` attempts once spinning is exhausted.
const MAX_POLL_SLEEP: Duration = Duration::from_millis(1);

/// Name of the semaphore guarding segment `name`.
pub fn semaphore_name(name: &str) -> String {
    format!("SEM_{}", name.trim_start_matches('/'))
}

/// Shared flag that aborts an in-flight semaphore wait.
///
/// Clones observe the same flag, so a token handed to a channel can be fired
/// from any thread (a shutdown handler, a request timeout).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing stop flag.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { cancelled: flag }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// How long, and under which cancellation, a reader may wait for a segment lock.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub cancel: Option<CancelToken>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_ACQUIRE_TIMEOUT,
            cancel: None,
        }
    }
}

impl WaitPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Outcome of a bounded wait, before it is tied to a channel name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFailure {
    TimedOut(Duration),
    Cancelled,
}

impl WaitFailure {
    /// Attach the channel name to produce a reportable error.
    pub fn into_error(self, name: &str) -> Error {
        match self {
            Self::TimedOut(waited) => Error::ProducerUnresponsive {
                name: name.to_string(),
                waited,
            },
            Self::Cancelled => Error::Cancelled {
                name: name.to_string(),
            },
        }
    }
}

/// Poll `try_acquire` until it succeeds, the deadline passes, or the wait is cancelled.
///
/// Spins with a crossbeam `Backoff` first, then sleeps in slices no longer
/// than the remaining time.
pub fn wait_until<F>(policy: &WaitPolicy, mut try_acquire: F) -> io::Result<std::result::Result<(), WaitFailure>>
where
    F: FnMut() -> io::Result<bool>,
{
    let start = Instant::now();
    let backoff = Backoff::new();

    loop {
        if policy.is_cancelled() {
            return Ok(Err(WaitFailure::Cancelled));
        }
        if try_acquire()? {
            return Ok(Ok(()));
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Ok(Err(WaitFailure::TimedOut(elapsed)));
        }

        if backoff.is_completed() {
            let remaining = policy.timeout.saturating_sub(elapsed);
            std::thread::sleep(std::cmp::min(remaining, MAX_POLL_SLEEP));
        } else {
            backoff.snooze();
        }
    }
}

/// An opened (never created) named semaphore.
///
/// Dropping it only closes this process's handle. It never posts: a reader
/// cannot know whether the producer is mid-write, so releasing on its behalf
/// would break the producer's exclusion.
pub struct NamedSemaphore {
    sem: NonNull<libc::sem_t>,
    name: String,
}

// sem_t handles returned by sem_open may be used from any thread.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Open the existing semaphore `name`.
    pub fn open(name: &str) -> Result<Self> {
        let c_name = posix_name(name).map_err(|source| Error::Semaphore {
            name: name.to_string(),
            source,
        })?;

        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(Error::Semaphore {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let sem = NonNull::new(sem).ok_or_else(|| Error::Semaphore {
            name: name.to_string(),
            source: io::Error::new(io::ErrorKind::Other, "sem_open returned null"),
        })?;

        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One non-blocking attempt. `Ok(false)` means the semaphore is held elsewhere.
    pub fn try_acquire(&self) -> io::Result<bool> {
        loop {
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(err),
            }
        }
    }

    /// Acquire within `policy`, returning a guard that releases on drop.
    pub fn acquire(&self, policy: &WaitPolicy) -> Result<SemaphoreGuard<'_>> {
        let outcome = wait_until(policy, || self.try_acquire()).map_err(|source| Error::Semaphore {
            name: self.name.clone(),
            source,
        })?;

        match outcome {
            Ok(()) => {
                trace!(semaphore = %self.name, "acquired");
                Ok(SemaphoreGuard { sem: self })
            }
            Err(failure) => Err(failure.into_error(&self.name)),
        }
    }

    fn release(&self) {
        if unsafe { libc::sem_post(self.sem.as_ptr()) } != 0 {
            warn!(
                semaphore = %self.name,
                error = %io::Error::last_os_error(),
                "sem_post failed"
            );
        }
    }

    pub(crate) fn raw(&self) -> *const libc::sem_t {
        self.sem.as_ptr()
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem.as_ptr());
        }
    }
}

impl fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_named_semaphore(self, f)
    }
}

/// Holds the semaphore for the duration of a snapshot copy.
#[derive(Debug)]
pub struct SemaphoreGuard<'a> {
    sem: &'a NamedSemaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.sem.release();
        trace!(semaphore = %self.sem.name, "released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_semaphore_name() {
        assert_eq!(semaphore_name("GGA"), "SEM_GGA");
        assert_eq!(semaphore_name("/GPS_Position"), "SEM_GPS_Position");
    }

    #[test]
    fn test_wait_until_succeeds_after_retries() {
        let attempts = Cell::new(0);
        let policy = WaitPolicy::with_timeout(Duration::from_secs(1));
        let outcome = wait_until(&policy, || {
            attempts.set(attempts.get() + 1);
            Ok(attempts.get() >= 3)
        })
        .unwrap();
        assert_eq!(outcome, Ok(()));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_wait_until_times_out() {
        let policy = WaitPolicy::with_timeout(Duration::from_millis(20));
        let start = Instant::now();
        let outcome = wait_until(&policy, || Ok(false)).unwrap();
        assert!(matches!(outcome, Err(WaitFailure::TimedOut(w)) if w >= Duration::from_millis(20)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_until_cancelled() {
        let token = CancelToken::new();
        let policy = WaitPolicy {
            timeout: Duration::from_secs(10),
            cancel: Some(token.clone()),
        };
        token.cancel();
        let outcome = wait_until(&policy, || Ok(false)).unwrap();
        assert_eq!(outcome, Err(WaitFailure::Cancelled));
    }

    #[test]
    fn test_wait_until_propagates_os_error() {
        let policy = WaitPolicy::default();
        let result = wait_until(&policy, || Err(io::Error::from_raw_os_error(libc::EINVAL)));
        assert!(result.is_err());
    }

    #[test]
    fn test_wait_failure_into_error() {
        let err = WaitFailure::TimedOut(Duration::from_millis(5)).into_error("IMU");
        assert!(err.is_timeout());
        let err = WaitFailure::Cancelled.into_error("IMU");
        assert!(matches!(err, Error::Cancelled { name } if name == "IMU"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_release_at_max_value_is_logged_not_fatal() {
        crate::logging::init_test_logging();
        let name = format!("SEM_smipc_unit_max_{}", std::process::id());
        let c_name = posix_name(&name).unwrap();
        let raw = unsafe {
            libc::sem_unlink(c_name.as_ptr());
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o600 as libc::c_uint,
                i32::MAX as libc::c_uint,
            )
        };
        assert_ne!(raw, libc::SEM_FAILED);

        let sem = NamedSemaphore::open(&name).unwrap();
        // sem_post fails with EOVERFLOW; the guard path must survive it
        sem.release();
        let mut value = 0;
        unsafe {
            libc::sem_getvalue(raw, &mut value);
            libc::sem_close(raw);
            libc::sem_unlink(c_name.as_ptr());
        }
        assert_eq!(value, i32::MAX);
    }

    #[test]
    fn test_open_missing_semaphore() {
        let err = NamedSemaphore::open("SEM_smipc_unit_missing").unwrap_err();
        assert!(matches!(err, Error::Semaphore { .. }));
    }
}
