//! Hailo-15L DSP subsystem

use tracing::debug;
use xrp_chip::lut::{dsp_slot, physical_page};
use xrp_chip::memmap::LocalRegion;
use xrp_chip::regs::{dsp_cfg, runstall, ConfigReg, MASK_ALL_OPEN};

use crate::gate::RegisterGate;
use crate::hw_ops::{HardwareOps, Variant};
use crate::ranges::MemoryRanges;

/// Hailo-15L register layout, as described by `xrp_chip::regs`
#[derive(Debug, Clone, Copy, Default)]
pub struct Hailo15lOps;

impl HardwareOps for Hailo15lOps {
    fn variant(&self) -> Variant {
        Variant::Hailo15l
    }

    fn config_reg_offset(&self, reg: ConfigReg) -> usize {
        reg.offset()
    }

    #[allow(clippy::cast_possible_truncation)] // slot is 4 bits
    fn map_address(&self, gate: &RegisterGate, dsp_address: u32, physical_address: u64) {
        let slot = dsp_slot(dsp_address);
        let page = physical_page(physical_address);
        debug!("Mapping dsp lut {slot} to page {page:#x}");
        gate.write(ConfigReg::AxiMaster(slot as u8).offset(), page);
    }

    fn init_memory_ranges(&self, ranges: &mut MemoryRanges) {
        for region in LocalRegion::ALL {
            let (start, size) = region.span();
            ranges.set_local(region, start, size);
        }
    }

    fn disable_watchdog(&self, gate: &RegisterGate) {
        let offset = ConfigReg::DspCfg.offset();
        let value = gate.read(offset);
        gate.write(offset, value | dsp_cfg::WWDT_EXT_COUNTER_DIS);
    }

    fn open_interrupt_masks(&self, gate: &RegisterGate) {
        for reg in ConfigReg::INTERRUPT_MASKS {
            gate.write(reg.offset(), MASK_ALL_OPEN);
        }
    }

    fn configure_reset_vector(&self, gate: &RegisterGate, address: u32) {
        gate.write(ConfigReg::AltResetVec.offset(), address);
    }

    fn halt(&self, gate: &RegisterGate) {
        gate.write(ConfigReg::RunStall.offset(), runstall::STALL);
    }

    fn release(&self, gate: &RegisterGate) {
        gate.write(ConfigReg::RunStall.offset(), runstall::RUN);
    }
}
