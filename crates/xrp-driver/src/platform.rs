//! Contracts consumed from the platform layer.
//!
//! Device-tree binding, clock and reset providers and the mailbox controller
//! live outside this crate. The driver only needs the calls below; a board
//! integration implements them, and [`crate::sim`] provides a software
//! implementation for CI.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::PlatformError;
use crate::mmio::Mmio;
use crate::shared::SharedBuffer;

/// Name of the reset line.
pub const RESET_NAME: &str = "dsp-reset";
/// Name of the config-domain clock.
pub const CONFIG_CLOCK_NAME: &str = "dsp-config-clock";
/// Name of the main DSP clock.
pub const DSP_CLOCK_NAME: &str = "dsp-clock";
/// Name of the firmware reserved-memory node.
pub const FIRMWARE_REGION_NAME: &str = "dsp-fw";
/// Property holding the DSP clock target frequency.
pub const CLOCK_FREQUENCY_PROPERTY: &str = "clock-frequency";

/// Gateable clock.
pub trait Clock: Debug + Send + Sync {
    /// Prepare and enable the clock.
    ///
    /// # Errors
    ///
    /// Returns error if the provider refuses.
    fn prepare_enable(&self) -> Result<(), PlatformError>;

    /// Disable and unprepare the clock.
    fn disable_unprepare(&self);

    /// Whether the clock is currently enabled.
    fn is_enabled(&self) -> bool;

    /// Change the clock rate.
    ///
    /// # Errors
    ///
    /// Returns error if the rate cannot be applied.
    fn set_rate(&self, hz: u64) -> Result<(), PlatformError>;
}

/// Exclusive reset line.
pub trait ResetControl: Debug + Send + Sync {
    /// Put the DSP into reset.
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be driven.
    fn assert_reset(&self) -> Result<(), PlatformError>;

    /// Take the DSP out of reset.
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be driven.
    fn deassert_reset(&self) -> Result<(), PlatformError>;
}

/// Inbound message callback. Runs in interrupt-like context: must not block.
pub type RxCallback = Arc<dyn Fn() + Send + Sync>;

/// Host mailbox controller.
pub trait Mailbox: Debug + Send + Sync {
    /// Request channel `index`, registering `rx` for inbound messages.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unavailable.
    fn request_channel(
        &self,
        index: usize,
        rx: RxCallback,
    ) -> Result<Box<dyn MailboxChannel>, PlatformError>;
}

/// Open mailbox channel. Dropping it frees the channel.
pub trait MailboxChannel: Debug + Send + Sync {
    /// Post a message without blocking for delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the controller rejects the message.
    fn send(&self, message: &[u8]) -> Result<(), PlatformError>;
}

/// Physical memory resource as described by the platform (inclusive end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemResource {
    /// First byte
    pub start: u64,
    /// Last byte (inclusive)
    pub end: u64,
}

impl MemResource {
    /// Resource covering `[start, end]`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

/// Mapped config block plus the physical address it was mapped from.
#[derive(Debug)]
pub struct ConfigWindow {
    /// Register window
    pub regs: Box<dyn Mmio>,
    /// Physical base of the window
    pub phys_base: u64,
}

/// Resource provider for one DSP instance.
pub trait Platform {
    /// Map the config register block (memory resource 0).
    ///
    /// # Errors
    ///
    /// Returns error if the resource is missing or cannot be mapped.
    fn config_window(&self) -> Result<ConfigWindow, PlatformError>;

    /// Look up an exclusive reset line by name.
    ///
    /// # Errors
    ///
    /// Returns error if no such line is described.
    fn reset_control(&self, name: &str) -> Result<Arc<dyn ResetControl>, PlatformError>;

    /// Look up a clock by name.
    ///
    /// # Errors
    ///
    /// Returns error if no such clock is described.
    fn clock(&self, name: &str) -> Result<Arc<dyn Clock>, PlatformError>;

    /// The mailbox controller serving this DSP.
    ///
    /// # Errors
    ///
    /// Returns error if no mailbox is described.
    fn mailbox(&self) -> Result<Arc<dyn Mailbox>, PlatformError>;

    /// Entry `index` of the named reserved-memory node.
    ///
    /// # Errors
    ///
    /// Returns error if the node or entry does not exist.
    fn memory_region(&self, name: &str, index: usize) -> Result<MemResource, PlatformError>;

    /// Read a `u32` firmware property.
    fn property_u32(&self, name: &str) -> Option<u32>;

    /// Allocate zeroed host memory the DSP can reach through the LUT.
    ///
    /// # Errors
    ///
    /// Returns error if the allocation fails.
    fn allocate_shared(&self, size: usize) -> Result<SharedBuffer, PlatformError>;
}
