//! DSP memory map.
//!
//! ```text
//! DSP address       Size     Host target                 Purpose
//! ───────────────── ──────── ─────────────────────────── ──────────────────────
//! 0x8000_0000       128 MB   DDR "dsp-fw" code region    firmware code
//! 0xF000_0000       128 MB   0x7800_0000                 mailbox block
//! 0x6000_0000       128 MB   0x6000_0000                 fast-bus SRAM
//! 0xF800_0000       128 MB   dsp_config base             config + AXI block
//! caller-chosen     64 KB    host allocation             cyclic log buffer
//! caller-chosen     caller   host allocation             comm buffer
//! ```

/// DSP address the firmware code region is linked at.
pub const DSP_CODE_MAPPED: u32 = 0x8000_0000;
/// DSP window onto the mailbox block.
pub const DSP_MAILBOX_MAPPED: u32 = 0xF000_0000;
/// Host physical address of the mailbox block.
pub const MAILBOX_PHYS: u64 = 0x7800_0000;
/// DSP window onto fast-bus SRAM.
pub const DSP_FASTBUS_MEM_MAPPED: u32 = 0x6000_0000;
/// Host physical address of fast-bus SRAM.
pub const FASTBUS_MEM_PHYS: u64 = 0x6000_0000;
/// DSP window onto the config block (AXI sub-block included).
pub const DSP_CONFIG_MAPPED: u32 = 0xF800_0000;

/// Default DSP address for the cyclic log buffer.
pub const DEFAULT_LOG_DSP_ADDR: u32 = 0x8800_0000;
/// Default DSP address for the comm buffer.
pub const DEFAULT_COMM_DSP_ADDR: u32 = 0x9000_0000;

/// Size of the cyclic log buffer.
pub const CYCLIC_LOG_SIZE: usize = 64 * 1024;

// ── On-chip memories ─────────────────────────────────────────────────────────

/// Instruction RAM.
pub const IRAM_ADDR: u64 = 0x6018_0000;
/// Instruction RAM size.
pub const IRAM_SIZE: u64 = 0x4000;
/// Data RAM 0.
pub const DRAM0_ADDR: u64 = 0x6010_0000;
/// Data RAM 0 size.
pub const DRAM0_SIZE: u64 = 0x4_0000;
/// Data RAM 1.
pub const DRAM1_ADDR: u64 = 0x6020_0000;
/// Data RAM 1 size.
pub const DRAM1_SIZE: u64 = 0x4_0000;

/// Firmware DDR regions, in the order they appear in the "dsp-fw"
/// reserved-memory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum DdrRegion {
    /// Firmware code, mapped at [`DSP_CODE_MAPPED`].
    Code = 0,
    /// Firmware data / heap.
    Data = 1,
}

/// Number of [`DdrRegion`] entries.
pub const DDR_REGION_COUNT: usize = 2;

impl DdrRegion {
    /// All regions in resource order.
    pub const ALL: [Self; DDR_REGION_COUNT] = [Self::Code, Self::Data];
}

/// On-chip memories the firmware may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum LocalRegion {
    /// Instruction RAM.
    Iram = 0,
    /// Data RAM 0.
    Dram0 = 1,
    /// Data RAM 1.
    Dram1 = 2,
}

/// Number of [`LocalRegion`] entries.
pub const LOCAL_REGION_COUNT: usize = 3;

impl LocalRegion {
    /// All regions in table order.
    pub const ALL: [Self; LOCAL_REGION_COUNT] = [Self::Iram, Self::Dram0, Self::Dram1];

    /// `(start, size)` of this memory.
    #[must_use]
    pub const fn span(self) -> (u64, u64) {
        match self {
            Self::Iram => (IRAM_ADDR, IRAM_SIZE),
            Self::Dram0 => (DRAM0_ADDR, DRAM0_SIZE),
            Self::Dram1 => (DRAM1_ADDR, DRAM1_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::dsp_slot;

    #[test]
    fn fixed_windows_use_distinct_slots() {
        let slots = [
            dsp_slot(DSP_CODE_MAPPED),
            dsp_slot(DSP_MAILBOX_MAPPED),
            dsp_slot(DSP_FASTBUS_MEM_MAPPED),
            dsp_slot(DSP_CONFIG_MAPPED),
            dsp_slot(DEFAULT_LOG_DSP_ADDR),
            dsp_slot(DEFAULT_COMM_DSP_ADDR),
        ];
        for (i, a) in slots.iter().enumerate() {
            for b in &slots[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn local_memories_do_not_overlap() {
        for (i, a) in LocalRegion::ALL.iter().enumerate() {
            let (a_start, a_size) = a.span();
            for b in &LocalRegion::ALL[i + 1..] {
                let (b_start, b_size) = b.span();
                assert!(a_start + a_size <= b_start || b_start + b_size <= a_start);
            }
        }
    }
}
