//! AXI master lookup table arithmetic.
//!
//! The DSP sees a 32-bit address space; the host bus is 35 bits wide. The
//! LUT splits the DSP space into 16 windows of 128 MiB and points each at a
//! 128 MiB page of host physical memory. Translation is direct-mapped: the
//! low 27 bits pass through unchanged.
//!
//! ```text
//!  DSP address   [31:27] slot (4 bits) | [26:0] offset
//!  host phys     [35:27] page (9 bits) | [26:0] offset
//! ```

/// log2 of the window size.
pub const WINDOW_SHIFT: u32 = 27;
/// Size of one translation window (128 MiB).
pub const WINDOW_SIZE: u64 = 1 << WINDOW_SHIFT;
/// Number of LUT slots.
pub const SLOT_COUNT: usize = 16;
/// Mask applied to the shifted DSP address.
pub const SLOT_MASK: u32 = 0xF;
/// Mask applied to the shifted physical address.
pub const PAGE_MASK: u64 = 0x1FF;

/// LUT slot addressed by a DSP-side address.
#[must_use]
pub const fn dsp_slot(dsp_address: u32) -> usize {
    ((dsp_address >> WINDOW_SHIFT) & SLOT_MASK) as usize
}

/// Physical page id written into a LUT slot.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // masked to 9 bits
pub const fn physical_page(physical_address: u64) -> u32 {
    ((physical_address >> WINDOW_SHIFT) & PAGE_MASK) as u32
}

/// Host physical address a DSP address resolves to, given the page stored in
/// its slot.
#[must_use]
pub const fn translate(dsp_address: u32, page: u32) -> u64 {
    ((page as u64 & PAGE_MASK) << WINDOW_SHIFT) | (dsp_address as u64 & (WINDOW_SIZE - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_window_example() {
        assert_eq!(dsp_slot(0x8000_0000), 0);
        assert_eq!(physical_page(0x0010_0000), 0);
    }

    #[test]
    fn mailbox_window() {
        assert_eq!(dsp_slot(0xF000_0000), 0xE);
        assert_eq!(physical_page(0x7800_0000), 0xF);
        assert_eq!(translate(0xF000_0010, 0xF), 0x7800_0010);
    }

    #[test]
    fn page_uses_bits_above_32() {
        // 35-bit host address
        assert_eq!(physical_page(0x4_0800_0000), 0x81);
        assert_eq!(translate(0x9000_1234, 0x81), 0x4_0800_1234);
    }

    #[test]
    fn window_offsets_alias() {
        assert_eq!(dsp_slot(0x8000_0000), dsp_slot(0x87FF_FFFF));
        assert_ne!(dsp_slot(0x8000_0000), dsp_slot(0x8800_0000));
    }
}
