//! Memory the DSP firmware is allowed to reference.
//!
//! Two tables: DDR regions read from the "dsp-fw" reserved-memory node, and
//! on-chip memories filled in by the SoC variant. Both are checked the same
//! way by [`MemoryRanges::is_valid`].

use xrp_chip::memmap::{DdrRegion, LocalRegion, DDR_REGION_COUNT, LOCAL_REGION_COUNT};

use crate::error::{Result, XrpError};
use crate::platform::MemResource;

/// Half-open physical range `[start, end)`; all-zero when unpopulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemRange {
    /// First byte
    pub start: u64,
    /// One past the last byte
    pub end: u64,
}

impl MemRange {
    /// Range `[start, end)`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Whether the entry holds a range.
    pub const fn is_populated(&self) -> bool {
        self.end > self.start
    }

    /// `start <= addr < end`.
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Firmware-addressable memory table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryRanges {
    ddr: [MemRange; DDR_REGION_COUNT],
    local: [MemRange; LOCAL_REGION_COUNT],
}

impl MemoryRanges {
    /// Empty table; nothing is valid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a DDR region from its platform resource (inclusive end).
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidMemoryRange`] if the resource is inverted
    /// or its end cannot be made exclusive.
    pub fn set_ddr(&mut self, region: DdrRegion, res: MemResource) -> Result<()> {
        let index = region as usize;
        let end = res
            .end
            .checked_add(1)
            .filter(|&end| end > res.start)
            .ok_or(XrpError::InvalidMemoryRange {
                index,
                start: res.start,
                end: res.end,
            })?;
        self.ddr[index] = MemRange::new(res.start, end);
        Ok(())
    }

    /// Store an on-chip memory `[start, start + size)`.
    pub fn set_local(&mut self, region: LocalRegion, start: u64, size: u64) {
        self.local[region as usize] = MemRange::new(start, start + size);
    }

    /// DDR region entry.
    pub fn ddr(&self, region: DdrRegion) -> MemRange {
        self.ddr[region as usize]
    }

    /// On-chip region entry.
    pub fn local(&self, region: LocalRegion) -> MemRange {
        self.local[region as usize]
    }

    /// Every entry, DDR first.
    pub fn all(&self) -> impl Iterator<Item = &MemRange> {
        self.ddr.iter().chain(self.local.iter())
    }

    /// True iff `addr` lies inside a populated entry.
    pub fn is_valid(&self, addr: u64) -> bool {
        self.all().any(|range| range.is_populated() && range.contains(addr))
    }
}
