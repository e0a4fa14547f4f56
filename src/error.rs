//! Error types for the telemetry reader.
//!
//! Attach-time failures (`Attach`, `Semaphore`, `Map`, `SegmentTooSmall`) are
//! terminal for a channel and are kept as its persistent error state. Read-time
//! failures (`ProducerUnresponsive`, `Cancelled`, `Decode`) are returned from the
//! read that hit them and do not poison the channel.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// The main error type for shared-memory telemetry operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Attach Errors ===
    /// The shared memory segment could not be opened (usually: no producer running).
    #[error("failed to attach to shared memory segment `{name}`: {source}")]
    Attach {
        /// Segment name as requested.
        name: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The paired `SEM_<name>` semaphore could not be opened.
    #[error("failed to open semaphore `{name}`: {source}")]
    Semaphore {
        /// Semaphore name as requested.
        name: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Mapping the segment into the process failed.
    #[error("failed to map shared memory segment `{name}`: {source}")]
    Map {
        /// Segment name.
        name: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The segment is smaller than the 40-byte header plus the declared payload.
    #[error("shared memory `{name}` too small: expected at least {expected} bytes, got {actual}")]
    SegmentTooSmall {
        /// Segment name.
        name: String,
        /// Header plus declared payload size.
        expected: usize,
        /// Size reported by `fstat`.
        actual: usize,
    },

    // === Read Errors ===
    /// The semaphore was not released within the configured wait.
    #[error("producer for `{name}` unresponsive: semaphore not acquired within {waited:?}")]
    ProducerUnresponsive {
        /// Channel name.
        name: String,
        /// How long the reader waited.
        waited: Duration,
    },

    /// The semaphore wait was cancelled through a `CancelToken`.
    #[error("read on `{name}` cancelled while waiting for the semaphore")]
    Cancelled {
        /// Channel name.
        name: String,
    },

    /// The snapshot could not be decoded with the channel's schema.
    #[error("failed to decode `{name}`: {source}")]
    Decode {
        /// Channel name.
        name: String,
        /// What went wrong in the cursor.
        #[source]
        source: DecodeError,
    },

    /// Writing into a segment is not supported by the consumer.
    #[error("channel `{name}` is read-only; the consumer never writes to the producer's segment")]
    WriteUnsupported {
        /// Channel name.
        name: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A channel name that no schema is registered for.
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),

    // === I/O Errors ===
    /// Other OS-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// True for the failures that put a channel into its persistent error state.
    #[must_use]
    pub fn is_attach_error(&self) -> bool {
        matches!(
            self,
            Self::Attach { .. } | Self::Semaphore { .. } | Self::Map { .. } | Self::SegmentTooSmall { .. }
        )
    }

    /// True when the producer held the semaphore past the wait limit.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProducerUnresponsive { .. })
    }

    /// The cursor-level error, if this is a decode failure.
    #[must_use]
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised by the cursor decoder while walking a snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A field would read past the end of the snapshot.
    #[error("buffer overrun at offset {offset}: field needs {needed} bytes, {available} available")]
    BufferOverrun {
        /// Cursor position when the read was attempted.
        offset: usize,
        /// Width of the requested field.
        needed: usize,
        /// Bytes left in the snapshot.
        available: usize,
    },

    /// A string payload has no NUL terminator within its maximum length.
    #[error("string at offset {offset} not terminated within {max} bytes")]
    Truncation {
        /// Where the string starts.
        offset: usize,
        /// Maximum string length including the terminator.
        max: usize,
    },
}

/// Non-fatal notice that the newest sample is older than a caller-chosen limit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("data on `{channel}` is stale: {age:?} old (limit {threshold:?})")]
pub struct StaleDataWarning {
    /// Channel name.
    pub channel: String,
    /// Wall-clock age of the producer's last update.
    pub age: Duration,
    /// Limit it was compared against.
    pub threshold: Duration,
}
