//! Per-device configuration
//!
//! Everything the platform does not describe itself: how many queues to lay
//! out, where the DSP sees the shared buffers, and the reset vector. The
//! DSP clock frequency normally comes from the firmware property
//! "clock-frequency"; setting it here overrides that.

use std::time::Duration;

use tracing::{debug, warn};
use xrp_chip::comm::comm_size_for;
use xrp_chip::memmap::{DEFAULT_COMM_DSP_ADDR, DEFAULT_LOG_DSP_ADDR, DSP_CODE_MAPPED};

/// Page size comm buffers are rounded to.
const COMM_ALIGN: usize = 4096;

/// Device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Number of completion queues
    pub queue_count: usize,

    /// DSP clock target (Hz); `None` defers to the platform property
    pub clock_frequency: Option<u32>,

    /// Address the DSP starts executing at after release
    pub reset_vector: u32,

    /// DSP address of the cyclic log buffer
    pub log_dsp_address: u32,

    /// DSP address of the comm buffer
    pub comm_dsp_address: u32,

    /// Comm buffer size; `None` sizes it for `queue_count`
    pub comm_size: Option<usize>,

    /// Mailbox channel index
    pub mailbox_index: usize,

    /// Delay after changing the DSP clock rate
    pub clock_settle: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            queue_count: 1,
            clock_frequency: None,
            reset_vector: DSP_CODE_MAPPED,
            log_dsp_address: DEFAULT_LOG_DSP_ADDR,
            comm_dsp_address: DEFAULT_COMM_DSP_ADDR,
            comm_size: None,
            mailbox_index: 0,
            clock_settle: Duration::ZERO,
        }
    }
}

impl DeviceConfig {
    /// Defaults with `XRP_*` environment overrides applied.
    ///
    /// Recognised: `XRP_QUEUE_COUNT`, `XRP_CLOCK_FREQUENCY`,
    /// `XRP_RESET_VECTOR` (decimal or `0x` hex). Unparseable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply `XRP_*` environment overrides to `self`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Some(count) = env_number("XRP_QUEUE_COUNT") {
            self.queue_count = usize::try_from(count).unwrap_or(self.queue_count);
        }
        if let Some(hz) = env_number("XRP_CLOCK_FREQUENCY") {
            self.clock_frequency = u32::try_from(hz).ok().or(self.clock_frequency);
        }
        if let Some(vector) = env_number("XRP_RESET_VECTOR") {
            self.reset_vector = u32::try_from(vector).unwrap_or(self.reset_vector);
        }
        debug!("Device config: {self:?}");
        self
    }

    /// Set the queue count.
    #[must_use]
    pub const fn with_queue_count(mut self, count: usize) -> Self {
        self.queue_count = count;
        self
    }

    /// Set the DSP clock frequency.
    #[must_use]
    pub const fn with_clock_frequency(mut self, hz: u32) -> Self {
        self.clock_frequency = Some(hz);
        self
    }

    /// Set the reset vector.
    #[must_use]
    pub const fn with_reset_vector(mut self, address: u32) -> Self {
        self.reset_vector = address;
        self
    }

    /// Set the comm buffer DSP address and size.
    #[must_use]
    pub const fn with_comm(mut self, dsp_address: u32, size: usize) -> Self {
        self.comm_dsp_address = dsp_address;
        self.comm_size = Some(size);
        self
    }

    /// Set the cyclic log DSP address.
    #[must_use]
    pub const fn with_log_address(mut self, dsp_address: u32) -> Self {
        self.log_dsp_address = dsp_address;
        self
    }

    /// Set the post-rate-change settle delay.
    #[must_use]
    pub const fn with_clock_settle(mut self, delay: Duration) -> Self {
        self.clock_settle = delay;
        self
    }

    /// Comm buffer size to allocate; `None` if `queue_count` slots overflow.
    pub fn effective_comm_size(&self) -> Option<usize> {
        match self.comm_size {
            Some(size) => Some(size),
            None => comm_size_for(self.queue_count)?.checked_next_multiple_of(COMM_ALIGN),
        }
    }
}

/// Parse a decimal or `0x`-prefixed environment variable.
fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse_number(&raw);
    if parsed.is_none() {
        warn!("Ignoring {name}={raw:?}: not a number");
    }
    parsed
}

/// Parse a decimal or `0x`-prefixed number.
pub fn parse_number(raw: &str) -> Option<u64> {
    let raw = raw.trim().replace('_', "");
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.queue_count, 1);
        assert_eq!(config.reset_vector, 0x8000_0000);
        assert_eq!(config.effective_comm_size(), Some(4096));
    }

    #[test]
    fn comm_size_grows_with_queues() {
        let config = DeviceConfig::default().with_queue_count(40);
        assert_eq!(config.effective_comm_size(), Some(8192));
        let config = config.with_comm(0x9000_0000, 0x1_0000);
        assert_eq!(config.effective_comm_size(), Some(0x1_0000));
    }

    #[test]
    fn comm_size_overflow() {
        let config = DeviceConfig::default().with_queue_count(usize::MAX / 64);
        assert_eq!(config.effective_comm_size(), None);
        // Rounding up to a page would overflow as well.
        let config = DeviceConfig::default().with_queue_count(usize::MAX / 128);
        assert_eq!(config.effective_comm_size(), None);
    }

    #[test]
    fn parse_number_forms() {
        assert_eq!(parse_number("600000000"), Some(600_000_000));
        assert_eq!(parse_number("0x8000_0000"), Some(0x8000_0000));
        assert_eq!(parse_number(" 0X10 "), Some(16));
        assert_eq!(parse_number("fast"), None);
    }
}
