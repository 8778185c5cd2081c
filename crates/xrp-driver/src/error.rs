//! Error types for XRP hardware operations

use thiserror::Error;

/// Result type alias for XRP operations
pub type Result<T> = std::result::Result<T, XrpError>;

/// Failures reported by platform collaborators (clock, reset, mailbox,
/// resource providers).
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Named resource is not described for this device
    #[error("resource not found: {name}")]
    NotFound {
        /// Resource name or description
        name: String,
    },

    /// Provider call failed with an errno-style code
    #[error("{operation} failed ({code})")]
    Failed {
        /// Operation that failed
        operation: &'static str,
        /// Negative errno-style code
        code: i32,
    },

    /// Allocation failed
    #[error("out of memory allocating {size} bytes")]
    NoMemory {
        /// Requested size
        size: usize,
    },

    /// I/O error from a file-backed provider
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl PlatformError {
    /// Create a not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a provider failure
    pub const fn failed(operation: &'static str, code: i32) -> Self {
        Self::Failed { operation, code }
    }
}

/// Errors that can occur while driving the DSP
#[derive(Debug, Error)]
pub enum XrpError {
    /// A resource needed at probe time could not be acquired
    #[error("failed to acquire {resource}: {source}")]
    Resource {
        /// Resource description
        resource: String,
        /// Provider failure
        #[source]
        source: PlatformError,
    },

    /// Firmware memory region is empty or inverted
    #[error("invalid memory range {index}: start {start:#x}, end {end:#x}")]
    InvalidMemoryRange {
        /// Region index in the firmware node
        index: usize,
        /// Start address
        start: u64,
        /// Inclusive end address as described
        end: u64,
    },

    /// Comm buffer cannot hold every queue slot
    #[error("comm buffer of {size} bytes cannot hold {queues} queues (need {required})")]
    CommBufferTooSmall {
        /// Buffer size
        size: usize,
        /// Requested queue count
        queues: usize,
        /// Bytes required
        required: usize,
    },

    /// Queue count whose comm buffer size cannot be represented
    #[error("{queues} queues do not fit any comm buffer")]
    QueueCountTooLarge {
        /// Requested queue count
        queues: usize,
    },

    /// LUT slot index out of range
    #[error("LUT slot {slot} out of range (have {count} slots)")]
    InvalidSlot {
        /// Requested slot
        slot: usize,
        /// Number of slots
        count: usize,
    },

    /// Clock operation failed during a lifecycle step
    #[error("clock {clock}: {source}")]
    Clock {
        /// Clock name
        clock: &'static str,
        /// Provider failure
        #[source]
        source: PlatformError,
    },

    /// Reset line operation failed
    #[error("reset: {source}")]
    Reset {
        /// Provider failure
        #[source]
        source: PlatformError,
    },

    /// Mailbox channel could not be opened
    #[error("mailbox: {source}")]
    Mailbox {
        /// Provider failure
        #[source]
        source: PlatformError,
    },

    /// No target frequency was configured for the DSP clock
    #[error("DSP clock frequency not configured")]
    MissingClockFrequency,

    /// Config register accessed while the config clock is gated
    #[error("config register {offset:#x} accessed with config clock disabled")]
    ClockGated {
        /// Register offset
        offset: usize,
    },

    /// Device latched the fatal state
    #[error("DSP is in fatal state")]
    Fatal,

    /// Operation not allowed in the current lifecycle state
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Queue index out of range
    #[error("queue {index} out of range (have {count} queues)")]
    InvalidQueue {
        /// Requested index
        index: usize,
        /// Number of queues
        count: usize,
    },

    /// Request does not fit the queue payload area
    #[error("payload of {len} bytes exceeds queue capacity {capacity}")]
    PayloadTooLarge {
        /// Request length in bytes
        len: usize,
        /// Capacity in bytes
        capacity: usize,
    },

    /// Operation timeout
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// I/O error while mapping a register window or memory
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl XrpError {
    /// Create a resource acquisition error
    pub fn resource(resource: impl Into<String>, source: PlatformError) -> Self {
        Self::Resource {
            resource: resource.into(),
            source,
        }
    }

    /// Create a clock error
    pub const fn clock(clock: &'static str, source: PlatformError) -> Self {
        Self::Clock { clock, source }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Create a timeout error
    #[allow(clippy::cast_possible_truncation)]
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }
}
