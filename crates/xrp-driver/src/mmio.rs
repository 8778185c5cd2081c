//! Memory-mapped I/O for the DSP config block and shared memory
//!
//! [`Mmio`] is the word-access contract every register window and
//! DSP-visible memory implements. [`MappedRegion`] is the real backing: a
//! `rustix` mmap of a device file (`/dev/mem`, a UIO node, or a
//! reserved-memory export) at a physical offset.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cast_possible_truncation)]

use crate::error::Result;
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::Path;
use std::sync::atomic::AtomicU32;

/// 32-bit word access to a device-visible window.
pub trait Mmio: Debug + Send + Sync {
    /// Read the word at byte `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Write the word at byte `offset`.
    fn write32(&self, offset: usize, value: u32);

    /// Window size in bytes.
    fn size(&self) -> usize;
}

impl<T: Mmio + ?Sized> Mmio for std::sync::Arc<T> {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

/// Mapped physical window
pub struct MappedRegion {
    /// Memory-mapped pointer
    ptr: *mut u8,
    /// Size of the mapping
    size: usize,
    /// Physical (file) offset the mapping starts at
    phys: u64,
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("phys", &format_args!("{:#x}", self.phys))
            .finish()
    }
}

// SAFETY: Send - MappedRegion owns the mapping exclusively. Moving between threads
// doesn't invalidate it (mmap'd memory is process-wide). No thread-local state.
unsafe impl Send for MappedRegion {}

// SAFETY: Sync - all accesses are single volatile or atomic word operations on
// device memory; the hardware defines the result of concurrent accesses.
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Open `path` and map `size` bytes starting at physical offset `phys`.
    ///
    /// The file is opened `O_SYNC` so `/dev/mem` mappings are uncached.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open(path: impl AsRef<Path>, phys: u64, size: usize) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: OFlags::SYNC.bits() is always a valid i32 value
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(path)?;

        tracing::debug!("Opened {} for mapping", path.display());
        Self::map(&file, phys, size)
    }

    /// Map `size` bytes of `file` starting at `phys`.
    ///
    /// `phys` must be page aligned.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping fails.
    pub fn map(file: &File, phys: u64, size: usize) -> Result<Self> {
        // SAFETY: mmap necessary for MMIO - maps the window into process address space.
        // Invariants: (1) file is open read/write; (2) size and offset come from the
        // caller and the kernel validates them; (3) ptr valid for size bytes or Err.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                phys,
            )
            .map_err(std::io::Error::from)?
        };

        tracing::info!("Mapped {phys:#x} at {ptr:p}, size={size:#x}");

        Ok(Self {
            ptr: ptr.cast(),
            size,
            phys,
        })
    }

    /// Physical address of the first byte.
    pub const fn phys(&self) -> u64 {
        self.phys
    }

    /// Atomic view of the word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is unaligned or `offset + 4` exceeds the mapping.
    pub fn atomic32(&self, offset: usize) -> &AtomicU32 {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        assert!(offset % 4 == 0, "Unaligned word offset");
        // SAFETY: ptr from mmap, valid for self.size and page aligned; offset is in bounds
        // and 4-byte aligned. AtomicU32 has the layout of u32. The reference lives no
        // longer than &self, and the mapping lives until Drop.
        unsafe { &*self.ptr.add(offset).cast::<AtomicU32>() }
    }
}

impl Mmio for MappedRegion {
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped region size.
    fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        // SAFETY: read_volatile necessary for MMIO - hardware can change value.
        // Invariants: (1) ptr from mmap, valid for self.size; (2) offset+4 <= size;
        // (3) u32 aligned.
        unsafe { std::ptr::read_volatile(self.ptr.add(offset).cast::<u32>()) }
    }

    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped region size.
    fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side effects.
        // Invariants: (1) ptr from mmap; (2) offset+4 <= size; (3) u32 aligned.
        unsafe {
            std::ptr::write_volatile(self.ptr.add(offset).cast::<u32>(), value);
        }
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: munmap with the ptr+size previously returned by mmap; Drop runs once
        // and no references outlive &self.
        if let Err(e) = unsafe { munmap(self.ptr.cast(), self.size) } {
            tracing::warn!("munmap of {:#x} failed: {e}", self.phys);
        }
        tracing::debug!("Unmapped {:#x}", self.phys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn backing(size: u64) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(size).unwrap();
        file
    }

    #[test]
    fn file_backed_window_roundtrip() {
        let file = backing(0x2000);
        let region = MappedRegion::map(file.as_file(), 0, 0x2000).unwrap();

        region.write32(0x40, 1);
        region.write32(0x1008, 0x1FF);
        assert_eq!(region.read32(0x40), 1);
        assert_eq!(region.read32(0x1008), 0x1FF);
        assert_eq!(region.size(), 0x2000);
    }

    #[test]
    fn atomic_view_aliases_volatile_access() {
        let file = backing(0x1000);
        let region = MappedRegion::map(file.as_file(), 0, 0x1000).unwrap();

        region.atomic32(8).store(3, Ordering::Release);
        assert_eq!(region.read32(8), 3);
    }

    #[test]
    fn open_by_path_maps_existing_contents() {
        let file = backing(0x1000);
        {
            let first = MappedRegion::map(file.as_file(), 0, 0x1000).unwrap();
            first.write32(0x10, 0xDEAD_BEEF);
        }
        let region = MappedRegion::open(file.path(), 0, 0x1000).unwrap();
        assert_eq!(region.read32(0x10), 0xDEAD_BEEF);
        assert_eq!(region.phys(), 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn read_past_end_panics() {
        let file = backing(0x1000);
        let region = MappedRegion::map(file.as_file(), 0, 0x1000).unwrap();
        let _ = region.read32(0x1000);
    }
}
