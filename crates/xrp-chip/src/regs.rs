//! `dsp_config` register map for Hailo-15L.
//!
//! The config block is a single MMIO window. The DSP-side AXI sub-block,
//! which holds the master lookup table, lives at a fixed `+0x1000` from the
//! same base and is reached through the same window.
//!
//! ```text
//! 0x0000  DSP_CFG                      streaming mode / misc config, WWDT disable bit 18
//! 0x0004  AltResetVec                  alternate reset vector
//! 0x0010  DSP_PARITY_ERR_MASK
//! 0x0020  DSP_IP_FAULT_MASK
//! 0x0030  DSP_INT_FATAL_MASK
//! 0x0038  DSP_INT_NONFATAL_MASK
//! 0x0040  RUNSTALL                     1 = stalled
//! 0x004c  DSP_FAULT_MASK(n)            stride 4, per lane
//! 0x0094  DSP_IP_SYSRAM_ERROR_INT_MASK
//! 0x00a4  DSP_ERR_INTERRUPT_MASK
//! 0x1008  DSP_AXI_MASTER(n)            stride 4, 16 slots
//! ```

// ── Config block ─────────────────────────────────────────────────────────────

/// Main config register (streaming mode, watchdog disable).
pub const DSP_CFG: usize = 0x0000;
/// Alternate reset vector.
pub const ALT_RESET_VEC: usize = 0x0004;
/// Parity error interrupt mask.
pub const DSP_PARITY_ERR_MASK: usize = 0x0010;
/// IP fault interrupt mask.
pub const DSP_IP_FAULT_MASK: usize = 0x0020;
/// Fatal interrupt mask.
pub const DSP_INT_FATAL_MASK: usize = 0x0030;
/// Non-fatal interrupt mask.
pub const DSP_INT_NONFATAL_MASK: usize = 0x0038;
/// Run/stall control.
pub const RUNSTALL: usize = 0x0040;
/// First per-lane fault mask register.
pub const DSP_FAULT_MASK_BASE: usize = 0x004C;
/// Number of per-lane fault mask registers.
pub const DSP_FAULT_MASK_COUNT: usize = 2;
/// Sysram error interrupt mask.
pub const DSP_IP_SYSRAM_ERROR_INT_MASK: usize = 0x0094;
/// Error interrupt mask.
pub const DSP_ERR_INTERRUPT_MASK: usize = 0x00A4;

// ── AXI sub-block ────────────────────────────────────────────────────────────

/// Offset of the AXI sub-block from the config base.
pub const AXI_BLOCK_OFFSET: usize = 0x1000;
/// First AXI master LUT register.
pub const DSP_AXI_MASTER_BASE: usize = AXI_BLOCK_OFFSET + 0x8;
/// Stride between LUT registers.
pub const DSP_AXI_MASTER_STRIDE: usize = 4;

/// Bytes the host must map to reach every register above.
pub const CONFIG_WINDOW_SIZE: usize = 0x2000;

/// Offset of `DSP_FAULT_MASK(lane)`.
#[must_use]
pub const fn dsp_fault_mask(lane: usize) -> usize {
    DSP_FAULT_MASK_BASE + 4 * lane
}

/// Offset of `DSP_AXI_MASTER(slot)`.
#[must_use]
pub const fn dsp_axi_master(slot: usize) -> usize {
    DSP_AXI_MASTER_BASE + DSP_AXI_MASTER_STRIDE * slot
}

/// `DSP_CFG` bit definitions.
pub mod dsp_cfg {
    /// Bit position of the external watchdog counter disable.
    pub const WWDT_EXT_COUNTER_DIS_SHIFT: u32 = 18;
    /// Disables the external windowed watchdog counter.
    pub const WWDT_EXT_COUNTER_DIS: u32 = 1 << WWDT_EXT_COUNTER_DIS_SHIFT;
}

/// `RUNSTALL` values.
pub mod runstall {
    /// DSP execution stalled.
    pub const STALL: u32 = 1;
    /// DSP executing.
    pub const RUN: u32 = 0;
}

/// Value written to every interrupt mask register to unmask all sources.
pub const MASK_ALL_OPEN: u32 = 0xFFFF_FFFF;

/// Named config registers.
///
/// Used by the driver's register-level API so callers never juggle raw
/// offsets. Lane and slot indices are not range-checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigReg {
    /// `DSP_CFG`
    DspCfg,
    /// `AltResetVec`
    AltResetVec,
    /// `DSP_PARITY_ERR_MASK`
    ParityErrMask,
    /// `DSP_IP_FAULT_MASK`
    IpFaultMask,
    /// `DSP_INT_FATAL_MASK`
    IntFatalMask,
    /// `DSP_INT_NONFATAL_MASK`
    IntNonfatalMask,
    /// `DSP_IP_SYSRAM_ERROR_INT_MASK`
    IpSysramErrorIntMask,
    /// `DSP_ERR_INTERRUPT_MASK`
    ErrInterruptMask,
    /// `RUNSTALL`
    RunStall,
    /// `DSP_FAULT_MASK(lane)`
    FaultMask(u8),
    /// `DSP_AXI_MASTER(slot)`
    AxiMaster(u8),
}

impl ConfigReg {
    /// Every interrupt mask register opened during bring-up, in write order.
    pub const INTERRUPT_MASKS: [Self; 8] = [
        Self::IntFatalMask,
        Self::IntNonfatalMask,
        Self::IpFaultMask,
        Self::IpSysramErrorIntMask,
        Self::ErrInterruptMask,
        Self::FaultMask(0),
        Self::FaultMask(1),
        Self::ParityErrMask,
    ];

    /// Byte offset from the config base.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::DspCfg => DSP_CFG,
            Self::AltResetVec => ALT_RESET_VEC,
            Self::ParityErrMask => DSP_PARITY_ERR_MASK,
            Self::IpFaultMask => DSP_IP_FAULT_MASK,
            Self::IntFatalMask => DSP_INT_FATAL_MASK,
            Self::IntNonfatalMask => DSP_INT_NONFATAL_MASK,
            Self::IpSysramErrorIntMask => DSP_IP_SYSRAM_ERROR_INT_MASK,
            Self::ErrInterruptMask => DSP_ERR_INTERRUPT_MASK,
            Self::RunStall => RUNSTALL,
            Self::FaultMask(lane) => dsp_fault_mask(lane as usize),
            Self::AxiMaster(slot) => dsp_axi_master(slot as usize),
        }
    }

    /// Register name as it appears in the hardware manual.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DspCfg => "DSP_CFG",
            Self::AltResetVec => "AltResetVec",
            Self::ParityErrMask => "DSP_PARITY_ERR_MASK",
            Self::IpFaultMask => "DSP_IP_FAULT_MASK",
            Self::IntFatalMask => "DSP_INT_FATAL_MASK",
            Self::IntNonfatalMask => "DSP_INT_NONFATAL_MASK",
            Self::IpSysramErrorIntMask => "DSP_IP_SYSRAM_ERROR_INT_MASK",
            Self::ErrInterruptMask => "DSP_ERR_INTERRUPT_MASK",
            Self::RunStall => "RUNSTALL",
            Self::FaultMask(_) => "DSP_FAULT_MASK",
            Self::AxiMaster(_) => "DSP_AXI_MASTER",
        }
    }
}

impl std::fmt::Display for ConfigReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FaultMask(i) | Self::AxiMaster(i) => write!(f, "{}({i})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hailo15l_offsets() {
        assert_eq!(ConfigReg::RunStall.offset(), 0x40);
        assert_eq!(ConfigReg::FaultMask(0).offset(), 0x4C);
        assert_eq!(ConfigReg::FaultMask(1).offset(), 0x50);
        assert_eq!(ConfigReg::AxiMaster(0).offset(), 0x1008);
        assert_eq!(ConfigReg::AxiMaster(15).offset(), 0x1044);
    }

    #[test]
    fn axi_block_fits_config_window() {
        assert!(dsp_axi_master(15) + 4 <= CONFIG_WINDOW_SIZE);
    }

    #[test]
    fn display_includes_index() {
        assert_eq!(ConfigReg::AxiMaster(3).to_string(), "DSP_AXI_MASTER(3)");
        assert_eq!(ConfigReg::DspCfg.to_string(), "DSP_CFG");
    }

    #[test]
    fn watchdog_bit() {
        assert_eq!(dsp_cfg::WWDT_EXT_COUNTER_DIS, 0x0004_0000);
    }
}
