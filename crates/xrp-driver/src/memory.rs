//! Word-granular writes into DSP-visible memory.
//!
//! DSP memories reject sub-word stores, so every operation here moves whole
//! 32-bit words. Misaligned destinations, sources or sizes are a contract
//! violation and panic before the first store; nothing is partially written.

use crate::mmio::Mmio;

fn check_destination(dst: &dyn Mmio, offset: usize, size: usize) {
    assert!(offset % 4 == 0, "DSP memory offset {offset:#x} not word aligned");
    assert!(size % 4 == 0, "DSP memory size {size:#x} not a multiple of 4");
    assert!(
        offset.checked_add(size).is_some_and(|end| end <= dst.size()),
        "DSP memory write {offset:#x}+{size:#x} out of bounds"
    );
}

/// Copy `src` into `dst` at `offset`, one word at a time.
///
/// # Panics
///
/// Panics if `offset`, `src.len()` or the address of `src` is not 4-byte
/// aligned, or the copy would run past the end of `dst`.
pub fn copy_to_device(dst: &dyn Mmio, offset: usize, src: &[u8]) {
    check_destination(dst, offset, src.len());
    assert!(
        (src.as_ptr() as usize) % 4 == 0,
        "DSP memory source {:p} not word aligned",
        src.as_ptr()
    );

    let words: &[u32] = bytemuck::cast_slice(src);
    copy_words(dst, offset, words);
}

/// Copy `src` words into `dst` at `offset`.
///
/// # Panics
///
/// Panics if `offset` is not 4-byte aligned or the copy would run past the
/// end of `dst`.
pub fn copy_words_to_device(dst: &dyn Mmio, offset: usize, src: &[u32]) {
    check_destination(dst, offset, std::mem::size_of_val(src));
    copy_words(dst, offset, src);
}

fn copy_words(dst: &dyn Mmio, offset: usize, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        dst.write32(offset + 4 * i, word);
    }
}

/// Store `value` into every word of `dst[offset..offset + size]`.
///
/// `value` is written as a whole word, not replicated per byte.
///
/// # Panics
///
/// Panics if `offset` or `size` is not 4-byte aligned, or the range runs
/// past the end of `dst`.
pub fn fill_device(dst: &dyn Mmio, offset: usize, value: u32, size: usize) {
    check_destination(dst, offset, size);
    for word_offset in (offset..offset + size).step_by(4) {
        dst.write32(word_offset, value);
    }
}
