//! Host memory shared with the DSP.
//!
//! A [`SharedBuffer`] is word-addressed memory with a known host physical
//! address; a [`DspBuffer`] adds the address the DSP uses to reach it
//! through the AXI LUT. The cyclic log and the comm buffer are both
//! `DspBuffer`s, allocated once at probe and released when the device
//! context drops.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::mmio::{MappedRegion, Mmio};

#[derive(Debug)]
enum Storage {
    Heap(Box<[AtomicU32]>),
    Mapped(MappedRegion),
}

/// Word-addressed memory visible to both host and DSP
#[derive(Debug)]
pub struct SharedBuffer {
    storage: Storage,
    paddr: u64,
    size: usize,
}

impl SharedBuffer {
    /// Zeroed heap-backed buffer of at least `size` bytes, reported at
    /// physical address `paddr` by whoever pinned it.
    pub fn zeroed(size: usize, paddr: u64) -> Self {
        let words = size.div_ceil(4);
        let storage = Storage::Heap((0..words).map(|_| AtomicU32::new(0)).collect());
        Self {
            storage,
            paddr,
            size: words * 4,
        }
    }

    /// Buffer backed by a mapped physical window (reserved memory).
    pub fn from_mapped(region: MappedRegion) -> Self {
        let paddr = region.phys();
        let size = region.size() & !3;
        Self {
            storage: Storage::Mapped(region),
            paddr,
            size,
        }
    }

    /// Host physical address.
    pub const fn paddr(&self) -> u64 {
        self.paddr
    }

    /// Size in bytes (multiple of 4).
    pub const fn len(&self) -> usize {
        self.size
    }

    /// True if the buffer holds no words.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Atomic view of the word at byte `offset`.
    ///
    /// Flags words shared with the DSP are accessed through this so the
    /// caller picks the memory ordering.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is unaligned or out of bounds.
    pub fn word(&self, offset: usize) -> &AtomicU32 {
        assert!(offset % 4 == 0, "Unaligned word offset {offset:#x}");
        assert!(offset + 4 <= self.size, "Word offset {offset:#x} out of bounds");
        match &self.storage {
            Storage::Heap(words) => &words[offset / 4],
            Storage::Mapped(region) => region.atomic32(offset),
        }
    }
}

impl Mmio for SharedBuffer {
    fn read32(&self, offset: usize) -> u32 {
        self.word(offset).load(Ordering::Relaxed)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.word(offset).store(value, Ordering::Relaxed);
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// Shared buffer plus its DSP-side address
#[derive(Debug, Clone)]
pub struct DspBuffer {
    mem: Arc<SharedBuffer>,
    dsp_addr: u32,
}

impl DspBuffer {
    /// Pair `mem` with the DSP address it will be mapped at.
    pub fn new(mem: SharedBuffer, dsp_addr: u32) -> Self {
        Self {
            mem: Arc::new(mem),
            dsp_addr,
        }
    }

    /// Underlying memory.
    pub const fn memory(&self) -> &Arc<SharedBuffer> {
        &self.mem
    }

    /// Host physical address.
    pub fn paddr(&self) -> u64 {
        self.mem.paddr()
    }

    /// DSP-visible address.
    pub const fn dsp_addr(&self) -> u32 {
        self.dsp_addr
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.mem.len()
    }
}
