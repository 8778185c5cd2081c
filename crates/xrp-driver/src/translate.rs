//! AXI master lookup-table programming.
//!
//! The table must only be written while the DSP is stalled; bring-up calls
//! [`DeviceContext::configure_axi_master_lut`] right after forcing a halt.
//! Windows are direct-mapped at 128 MiB granularity and not checked for
//! overlap, so two windows landing in one slot silently overwrite each other.

use tracing::debug;
use xrp_chip::lut;
use xrp_chip::memmap::{
    DdrRegion, DSP_CODE_MAPPED, DSP_CONFIG_MAPPED, DSP_FASTBUS_MEM_MAPPED, DSP_MAILBOX_MAPPED,
    FASTBUS_MEM_PHYS, MAILBOX_PHYS,
};
use xrp_chip::regs::ConfigReg;

use crate::device::DeviceContext;
use crate::error::{Result, XrpError};

/// One DSP-to-physical window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationWindow {
    /// What the window is for
    pub name: &'static str,
    /// DSP-side address inside the window
    pub dsp_address: u32,
    /// Host physical address it maps to
    pub physical_address: u64,
}

impl TranslationWindow {
    /// LUT slot this window occupies.
    pub const fn slot(&self) -> usize {
        lut::dsp_slot(self.dsp_address)
    }

    /// Page id written into the slot.
    pub const fn page(&self) -> u32 {
        lut::physical_page(self.physical_address)
    }
}

impl DeviceContext {
    /// Point the LUT slot for `dsp_address` at the page of `physical_address`.
    ///
    /// Only safe while the DSP is stalled.
    pub fn map_address(&self, dsp_address: u32, physical_address: u64) {
        self.ops.map_address(&self.gate, dsp_address, physical_address);
    }

    /// Read back the page stored in LUT `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidSlot`] if `slot` is not below
    /// [`lut::SLOT_COUNT`] and [`XrpError::ClockGated`] if the config clock
    /// is off.
    pub fn read_translation(&self, slot: usize) -> Result<u32> {
        let index = u8::try_from(slot)
            .ok()
            .filter(|&s| usize::from(s) < lut::SLOT_COUNT)
            .ok_or(XrpError::InvalidSlot {
                slot,
                count: lut::SLOT_COUNT,
            })?;
        self.try_read_config(ConfigReg::AxiMaster(index))
    }

    /// The six windows programmed at bring-up, in programming order.
    pub fn translation_windows(&self) -> [TranslationWindow; 6] {
        [
            TranslationWindow {
                name: "firmware code",
                dsp_address: DSP_CODE_MAPPED,
                physical_address: self.ranges.ddr(DdrRegion::Code).start,
            },
            TranslationWindow {
                name: "mailbox",
                dsp_address: DSP_MAILBOX_MAPPED,
                physical_address: MAILBOX_PHYS,
            },
            TranslationWindow {
                name: "fast-bus sram",
                dsp_address: DSP_FASTBUS_MEM_MAPPED,
                physical_address: FASTBUS_MEM_PHYS,
            },
            // The AXI sub-block sits at +0x1000 inside this same window.
            TranslationWindow {
                name: "dsp config",
                dsp_address: DSP_CONFIG_MAPPED,
                physical_address: self.config_phys,
            },
            TranslationWindow {
                name: "cyclic log",
                dsp_address: self.cyclic_log.dsp_addr(),
                physical_address: self.cyclic_log.paddr(),
            },
            TranslationWindow {
                name: "comm",
                dsp_address: self.comm.dsp_addr(),
                physical_address: self.comm.paddr(),
            },
        ]
    }

    /// Program every bring-up window into the LUT.
    pub(crate) fn configure_axi_master_lut(&self) {
        debug!("Configure AXI lookup table");
        for window in self.translation_windows() {
            debug!(
                "{}: dsp {:#010x} -> phys {:#x}",
                window.name, window.dsp_address, window.physical_address
            );
            self.map_address(window.dsp_address, window.physical_address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_slot_and_page() {
        let window = TranslationWindow {
            name: "code",
            dsp_address: 0x8000_0000,
            physical_address: 0x10_0000,
        };
        assert_eq!(window.slot(), 0);
        assert_eq!(window.page(), 0);

        let window = TranslationWindow {
            name: "comm",
            dsp_address: 0x9000_0000,
            physical_address: 0x2_4000_0000,
        };
        assert_eq!(window.slot(), 2);
        assert_eq!(window.page(), 0x48);
    }
}
