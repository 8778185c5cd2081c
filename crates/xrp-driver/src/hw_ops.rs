//! Per-SoC hardware operations
//!
//! The sequencing logic is common; where a register lives and which bits
//! mean what differs per SoC. Each variant implements [`HardwareOps`] once,
//! and [`Variant::ops`] hands out a `'static` instance that the device
//! context holds for its whole lifetime.

use std::fmt::Debug;
use std::str::FromStr;

use xrp_chip::regs::ConfigReg;

use crate::error::XrpError;
use crate::gate::RegisterGate;
use crate::ranges::MemoryRanges;

/// Register-level operations one SoC variant provides
///
/// Every method that touches registers goes through the [`RegisterGate`], so
/// calls made with the config clock off are dropped and logged.
pub trait HardwareOps: Debug + Send + Sync {
    /// Which variant this is.
    fn variant(&self) -> Variant;

    /// Offset of a named config register on this variant.
    fn config_reg_offset(&self, reg: ConfigReg) -> usize;

    /// Point the LUT slot covering `dsp_address` at the 128 MiB page holding
    /// `physical_address`.
    fn map_address(&self, gate: &RegisterGate, dsp_address: u32, physical_address: u64);

    /// Populate the on-chip memory entries.
    fn init_memory_ranges(&self, ranges: &mut MemoryRanges);

    /// Disable the DSP's external watchdog counter.
    fn disable_watchdog(&self, gate: &RegisterGate);

    /// Unmask every DSP fault / interrupt source.
    fn open_interrupt_masks(&self, gate: &RegisterGate);

    /// Program the alternate reset vector.
    fn configure_reset_vector(&self, gate: &RegisterGate, address: u32);

    /// Stall DSP execution.
    fn halt(&self, gate: &RegisterGate);

    /// Let the DSP run.
    fn release(&self, gate: &RegisterGate);
}

/// Supported SoC variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Hailo-15L
    #[default]
    Hailo15l,
}

impl Variant {
    /// Hardware operations for this variant.
    pub fn ops(self) -> &'static dyn HardwareOps {
        match self {
            Self::Hailo15l => &crate::variants::hailo15l::Hailo15lOps,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hailo15l => write!(f, "hailo15l"),
        }
    }
}

impl FromStr for Variant {
    type Err = XrpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hailo15l" | "hailo-15l" => Ok(Self::Hailo15l),
            other => Err(XrpError::invalid_state(format!("unknown SoC variant '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_parses_both_spellings() {
        assert_eq!("hailo15l".parse::<Variant>().unwrap(), Variant::Hailo15l);
        assert_eq!("Hailo-15L".parse::<Variant>().unwrap(), Variant::Hailo15l);
        assert!("hailo8".parse::<Variant>().is_err());
    }

    #[test]
    fn ops_report_their_variant() {
        assert_eq!(Variant::Hailo15l.ops().variant(), Variant::Hailo15l);
    }
}
