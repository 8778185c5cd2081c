//! Hardware layer for the Hailo XRP DSP.
//!
//! Brings the DSP out of reset, programs its AXI address translation, opens
//! the doorbell and moves requests through the completion queues in the
//! shared comm buffer. Board-specific resources (clocks, reset line, mailbox,
//! reserved memory) come in through the [`platform`] traits; [`sim`] ships a
//! complete in-memory platform.
//!
//! # Layering
//!
//! ```text
//!   DeviceContext ── probe / enable / disable / post_and_wait
//!      │
//!      ├─ power      reset + clock sequencing, fatal latch
//!      ├─ translate  AXI LUT windows
//!      ├─ hw_ops     per-variant register recipes (Hailo15L)
//!      ├─ gate       config registers behind the config clock
//!      ├─ doorbell   mailbox channel, rx → QueueSet::scan
//!      ├─ queue      completion slots in the comm buffer
//!      └─ ranges     firmware-addressable memory table
//! ```
//!
//! # Quick start
//!
//! ```
//! use xrp_driver::sim::{SimDsp, SimPlatform};
//! use xrp_driver::{DeviceConfig, DeviceContext, Variant};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = SimPlatform::new();
//! let mut dsp = DeviceContext::probe(&platform, Variant::Hailo15l, &DeviceConfig::default())?;
//! dsp.enable()?;
//! dsp.release();
//!
//! let firmware = SimDsp::new(dsp.comm().memory().clone(), platform.sim_mailbox().clone());
//! dsp.queues().post(0, &[42])?;
//! firmware.serve(0, |req| vec![req[0] + 1]);
//! dsp.queues().wait(0, None)?;
//! assert_eq!(dsp.queues().take_response(0)?, vec![43]);
//!
//! dsp.disable()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod config;
mod device;
pub mod doorbell;
mod error;
pub mod gate;
pub mod hw_ops;
pub mod memory;
pub mod mmio;
pub mod platform;
mod power;
pub mod queue;
pub mod ranges;
pub mod shared;
pub mod sim;
mod translate;
pub mod variants;

/// Chip-level constants (re-exported from xrp-chip).
pub mod chip {
    pub use xrp_chip::{comm, lut, memmap, regs};
}

pub use config::{parse_number, DeviceConfig};
pub use device::{DeviceContext, DspState, LifecycleState};
pub use doorbell::Doorbell;
pub use error::{PlatformError, Result, XrpError};
pub use gate::{RegisterGate, CLOCK_GATED_SENTINEL};
pub use hw_ops::{HardwareOps, Variant};
pub use memory::{copy_to_device, copy_words_to_device, fill_device};
pub use mmio::{MappedRegion, Mmio};
pub use platform::{Clock, Mailbox, MailboxChannel, MemResource, Platform, ResetControl};
pub use queue::{Completion, QueueSet, ScanResult};
pub use ranges::{MemRange, MemoryRanges};
pub use shared::{DspBuffer, SharedBuffer};
pub use translate::TranslationWindow;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        DeviceConfig, DeviceContext, DspState, MemoryRanges, Platform, QueueSet, Result,
        ScanResult, TranslationWindow, Variant, XrpError,
    };
}
