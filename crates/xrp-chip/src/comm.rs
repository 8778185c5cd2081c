//! Completion-queue slot layout in the comm buffer.
//!
//! Queue `n` occupies `QUEUE_STRIDE` bytes starting at `n * QUEUE_STRIDE`.
//!
//! ```text
//! +0x00  flags      REQUEST_VALID | RESPONSE_VALID
//! +0x04  in_size    request payload bytes (host writes)
//! +0x08  out_size   response payload bytes (DSP writes)
//! +0x0c  reserved
//! +0x10  payload    request in, response out (in place)
//! ```
//!
//! The host sets `REQUEST_VALID` after the payload is in place. The DSP sets
//! `RESPONSE_VALID` after writing the response. Whoever issued the request
//! clears both once the response is consumed.

/// Bytes per queue slot.
pub const QUEUE_STRIDE: usize = 128;
/// Offset of the flags word.
pub const FLAGS_OFFSET: usize = 0x00;
/// Offset of the request size word.
pub const IN_SIZE_OFFSET: usize = 0x04;
/// Offset of the response size word.
pub const OUT_SIZE_OFFSET: usize = 0x08;
/// Offset of the payload area.
pub const PAYLOAD_OFFSET: usize = 0x10;
/// Payload capacity in bytes.
pub const PAYLOAD_CAPACITY: usize = QUEUE_STRIDE - PAYLOAD_OFFSET;
/// Payload capacity in 32-bit words.
pub const PAYLOAD_WORDS: usize = PAYLOAD_CAPACITY / 4;

/// Flag bits.
pub mod flags {
    /// Host posted a request.
    pub const REQUEST_VALID: u32 = 1 << 0;
    /// DSP posted a response.
    pub const RESPONSE_VALID: u32 = 1 << 1;
    /// Both bits: request answered.
    pub const COMPLETE: u32 = REQUEST_VALID | RESPONSE_VALID;
}

/// True iff both flag bits are set.
#[must_use]
pub const fn is_complete(flags: u32) -> bool {
    flags & flags::COMPLETE == flags::COMPLETE
}

/// Byte offset of queue `index` in the comm buffer.
#[must_use]
pub const fn queue_offset(index: usize) -> usize {
    index * QUEUE_STRIDE
}

/// Minimum comm buffer size for `queue_count` queues; `None` on overflow.
#[must_use]
pub const fn comm_size_for(queue_count: usize) -> Option<usize> {
    queue_count.checked_mul(QUEUE_STRIDE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_needs_both_bits() {
        assert!(!is_complete(0));
        assert!(!is_complete(flags::REQUEST_VALID));
        assert!(!is_complete(flags::RESPONSE_VALID));
        assert!(is_complete(flags::COMPLETE));
        assert!(is_complete(flags::COMPLETE | 0x100));
    }

    #[test]
    fn slot_layout() {
        assert_eq!(PAYLOAD_WORDS, 28);
        assert_eq!(queue_offset(3), 384);
        assert_eq!(PAYLOAD_CAPACITY % 4, 0);
    }

    #[test]
    fn comm_size_overflow_is_none() {
        assert_eq!(comm_size_for(2), Some(256));
        assert_eq!(comm_size_for(usize::MAX / 64), None);
    }
}
