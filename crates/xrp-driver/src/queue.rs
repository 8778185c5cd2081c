//! Completion queues in the shared comm buffer
//!
//! Each queue is one fixed slot of the comm buffer (layout in
//! [`xrp_chip::comm`]) plus a host-side [`Completion`]. The DSP raises a
//! single doorbell for all of them; [`QueueSet::scan`] runs from the doorbell
//! callback and wakes whichever waiters now have a response.
//!
//! One request at a time per queue: posting again before the previous
//! response was taken is a caller error and is only logged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace, warn};
use xrp_chip::comm::{
    self, flags, FLAGS_OFFSET, IN_SIZE_OFFSET, OUT_SIZE_OFFSET, PAYLOAD_CAPACITY,
    PAYLOAD_OFFSET, PAYLOAD_WORDS,
};

use crate::error::{Result, XrpError};
use crate::memory::copy_words_to_device;
use crate::mmio::Mmio;
use crate::shared::SharedBuffer;

/// Outcome of a doorbell scan, for a possibly shared interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// At least one waiter was woken
    Handled,
    /// Nothing new completed
    NotMine,
}

/// One-shot wake-up, re-armed per request
///
/// `complete` never waits on the waiter: it flips an atomic latch and only
/// takes the inner lock to publish the wake-up, which the waiter releases
/// while parked. Every holder of that lock (`reinit`, `complete`, the
/// waiter's predicate check) does a single store or load under it, so
/// `complete` runs in bounded time and is safe from a [`RxCallback`].
///
/// [`RxCallback`]: crate::platform::RxCallback
#[derive(Debug, Default)]
pub struct Completion {
    signalled: AtomicBool,
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    /// New, unsignalled.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arm for the next request.
    pub fn reinit(&self) {
        let mut done = self.lock();
        *done = false;
        self.signalled.store(false, Ordering::Release);
    }

    /// Wake the waiter. Returns `false` if it was already signalled since the
    /// last [`reinit`](Self::reinit).
    pub fn complete(&self) -> bool {
        if self.signalled.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.lock() = true;
        self.cond.notify_all();
        true
    }

    /// Whether [`complete`](Self::complete) ran since the last re-arm.
    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::Acquire)
    }

    /// Block until signalled or `timeout` elapses (`None` waits forever).
    /// Returns whether it was signalled.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let guard = self.lock();
        match timeout {
            Some(timeout) => {
                let (done, _) = self
                    .cond
                    .wait_timeout_while(guard, timeout, |done| !*done)
                    .unwrap_or_else(PoisonError::into_inner);
                *done
            }
            None => *self
                .cond
                .wait_while(guard, |done| !*done)
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// One queue slot
#[derive(Debug)]
pub struct CompletionQueue {
    index: usize,
    offset: usize,
    completion: Completion,
}

impl CompletionQueue {
    /// Queue index.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the slot in the comm buffer.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Wait object for this queue.
    pub const fn completion(&self) -> &Completion {
        &self.completion
    }
}

/// All completion queues sharing one comm buffer and one doorbell
#[derive(Debug)]
pub struct QueueSet {
    comm: Arc<SharedBuffer>,
    queues: Box<[CompletionQueue]>,
}

impl QueueSet {
    /// Lay `count` queues out over `comm`.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::CommBufferTooSmall`] if the slots do not fit.
    pub fn new(comm: Arc<SharedBuffer>, count: usize) -> Result<Self> {
        let required =
            comm::comm_size_for(count).ok_or(XrpError::QueueCountTooLarge { queues: count })?;
        if comm.len() < required {
            return Err(XrpError::CommBufferTooSmall {
                size: comm.len(),
                queues: count,
                required,
            });
        }

        let queues = (0..count)
            .map(|index| CompletionQueue {
                index,
                offset: comm::queue_offset(index),
                completion: Completion::new(),
            })
            .collect();

        Ok(Self { comm, queues })
    }

    /// Number of queues.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// True if there are no queues.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queue `index`.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidQueue`] if out of range.
    pub fn get(&self, index: usize) -> Result<&CompletionQueue> {
        self.queues.get(index).ok_or(XrpError::InvalidQueue {
            index,
            count: self.queues.len(),
        })
    }

    /// Comm buffer backing the slots.
    pub const fn comm(&self) -> &Arc<SharedBuffer> {
        &self.comm
    }

    fn flags_of(&self, queue: &CompletionQueue) -> u32 {
        // Acquire: a response written before RESPONSE_VALID is visible after this load.
        self.comm.word(queue.offset + FLAGS_OFFSET).load(Ordering::Acquire)
    }

    /// Both flags set on queue `index`.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidQueue`] if out of range.
    pub fn is_complete(&self, index: usize) -> Result<bool> {
        let queue = self.get(index)?;
        Ok(comm::is_complete(self.flags_of(queue)))
    }

    /// Wake every waiter whose queue completed since it was last woken.
    ///
    /// Safe from the doorbell callback: no allocation, no blocking, flags are
    /// only read.
    pub fn scan(&self) -> ScanResult {
        let mut woken = 0usize;
        for queue in self.queues.iter() {
            if comm::is_complete(self.flags_of(queue)) && queue.completion.complete() {
                trace!(queue = queue.index, "response ready");
                woken += 1;
            }
        }
        if woken == 0 {
            ScanResult::NotMine
        } else {
            ScanResult::Handled
        }
    }

    /// Write `request` into queue `index` and mark it valid.
    ///
    /// Does not ring the doorbell.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidQueue`] or [`XrpError::PayloadTooLarge`].
    pub fn post(&self, index: usize, request: &[u32]) -> Result<()> {
        let queue = self.get(index)?;
        if request.len() > PAYLOAD_WORDS {
            return Err(XrpError::PayloadTooLarge {
                len: std::mem::size_of_val(request),
                capacity: PAYLOAD_CAPACITY,
            });
        }

        let flags_word = self.comm.word(queue.offset + FLAGS_OFFSET);
        if flags_word.load(Ordering::Acquire) & flags::REQUEST_VALID != 0 {
            warn!(queue = index, "posting over an unconsumed request");
        }

        // Clear before re-arming: a scan between the two must not see a stale
        // COMPLETE and signal the new request.
        flags_word.store(0, Ordering::Release);
        queue.completion.reinit();
        copy_words_to_device(self.comm.as_ref(), queue.offset + PAYLOAD_OFFSET, request);
        #[allow(clippy::cast_possible_truncation)] // bounded by PAYLOAD_CAPACITY
        self.comm.write32(
            queue.offset + IN_SIZE_OFFSET,
            std::mem::size_of_val(request) as u32,
        );
        self.comm.write32(queue.offset + OUT_SIZE_OFFSET, 0);
        // Release: payload and sizes are visible before the DSP sees REQUEST_VALID.
        flags_word.store(flags::REQUEST_VALID, Ordering::Release);

        debug!(queue = index, words = request.len(), "request posted");
        Ok(())
    }

    /// Block until queue `index` is signalled.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::Timeout`] if `timeout` elapses first; the slot is
    /// left as is.
    pub fn wait(&self, index: usize, timeout: Option<Duration>) -> Result<()> {
        let queue = self.get(index)?;
        if queue.completion.wait(timeout) {
            Ok(())
        } else {
            Err(XrpError::timeout(timeout.unwrap_or_default()))
        }
    }

    /// Read the response from queue `index` and clear its flags for reuse.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidState`] if the queue is not complete.
    pub fn take_response(&self, index: usize) -> Result<Vec<u32>> {
        let queue = self.get(index)?;
        if !comm::is_complete(self.flags_of(queue)) {
            return Err(XrpError::invalid_state(format!("queue {index} has no response")));
        }

        let out_size = self.comm.read32(queue.offset + OUT_SIZE_OFFSET) as usize;
        let words = out_size.div_ceil(4).min(PAYLOAD_WORDS);
        let response = (0..words)
            .map(|i| self.comm.read32(queue.offset + PAYLOAD_OFFSET + 4 * i))
            .collect();

        self.comm
            .word(queue.offset + FLAGS_OFFSET)
            .store(0, Ordering::Release);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn set(count: usize) -> QueueSet {
        let comm = Arc::new(SharedBuffer::zeroed(comm::comm_size_for(count).unwrap(), 0));
        QueueSet::new(comm, count).unwrap()
    }

    fn dsp_respond(queues: &QueueSet, index: usize, payload: &[u32]) {
        let base = comm::queue_offset(index);
        for (i, w) in payload.iter().enumerate() {
            queues.comm().write32(base + PAYLOAD_OFFSET + 4 * i, *w);
        }
        #[allow(clippy::cast_possible_truncation)]
        queues
            .comm()
            .write32(base + OUT_SIZE_OFFSET, (payload.len() * 4) as u32);
        queues
            .comm()
            .word(base + FLAGS_OFFSET)
            .fetch_or(flags::RESPONSE_VALID, Ordering::Release);
    }

    #[test]
    fn comm_buffer_must_hold_all_slots() {
        let comm = Arc::new(SharedBuffer::zeroed(comm::QUEUE_STRIDE, 0));
        let err = QueueSet::new(comm, 2).unwrap_err();
        assert!(matches!(err, XrpError::CommBufferTooSmall { required: 256, .. }));
    }

    #[test]
    fn scan_without_responses_is_not_mine() {
        let queues = set(3);
        queues.post(1, &[1]).unwrap();
        assert_eq!(queues.scan(), ScanResult::NotMine);
    }

    #[test]
    fn response_alone_is_not_complete() {
        let queues = set(1);
        queues
            .comm()
            .word(FLAGS_OFFSET)
            .store(flags::RESPONSE_VALID, Ordering::Release);
        assert!(!queues.is_complete(0).unwrap());
        assert_eq!(queues.scan(), ScanResult::NotMine);
    }

    #[test]
    fn scan_signals_only_once_per_request() {
        let queues = set(2);
        queues.post(0, &[7]).unwrap();
        dsp_respond(&queues, 0, &[8]);

        assert_eq!(queues.scan(), ScanResult::Handled);
        assert!(queues.get(0).unwrap().completion().is_signalled());
        // flags still set, waiter already woken
        assert!(queues.is_complete(0).unwrap());
        assert_eq!(queues.scan(), ScanResult::NotMine);
    }

    #[test]
    fn scan_wakes_each_completed_queue() {
        let queues = set(4);
        for q in 0..4 {
            queues.post(q, &[q as u32]).unwrap();
        }
        dsp_respond(&queues, 1, &[]);
        dsp_respond(&queues, 3, &[]);

        assert_eq!(queues.scan(), ScanResult::Handled);
        assert!(!queues.get(0).unwrap().completion().is_signalled());
        assert!(queues.get(1).unwrap().completion().is_signalled());
        assert!(!queues.get(2).unwrap().completion().is_signalled());
        assert!(queues.get(3).unwrap().completion().is_signalled());
    }

    #[test]
    fn post_writes_payload_then_flags() {
        let queues = set(2);
        queues.post(1, &[0xAA, 0xBB]).unwrap();
        let base = comm::queue_offset(1);
        assert_eq!(queues.comm().read32(base + FLAGS_OFFSET), flags::REQUEST_VALID);
        assert_eq!(queues.comm().read32(base + IN_SIZE_OFFSET), 8);
        assert_eq!(queues.comm().read32(base + PAYLOAD_OFFSET), 0xAA);
        assert_eq!(queues.comm().read32(base + PAYLOAD_OFFSET + 4), 0xBB);
    }

    #[test]
    fn oversized_request_rejected() {
        let queues = set(1);
        let request = vec![0u32; PAYLOAD_WORDS + 1];
        assert!(matches!(
            queues.post(0, &request),
            Err(XrpError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn take_response_clears_flags() {
        let queues = set(1);
        queues.post(0, &[1, 2, 3]).unwrap();
        dsp_respond(&queues, 0, &[4, 5]);

        assert_eq!(queues.take_response(0).unwrap(), vec![4, 5]);
        assert_eq!(queues.comm().read32(FLAGS_OFFSET), 0);
        assert!(queues.take_response(0).is_err());
    }

    #[test]
    fn stale_response_does_not_signal_next_request() {
        let queues = set(2);
        queues.post(0, &[1]).unwrap();
        // Response lands after the caller gave up and never took it.
        dsp_respond(&queues, 0, &[0xDEAD]);

        queues.post(0, &[2]).unwrap();
        assert_eq!(queues.comm().read32(FLAGS_OFFSET), flags::REQUEST_VALID);
        // Doorbell for another queue.
        assert_eq!(queues.scan(), ScanResult::NotMine);
        assert!(!queues.get(0).unwrap().completion().is_signalled());
        assert!(queues.wait(0, Some(Duration::from_millis(10))).is_err());

        dsp_respond(&queues, 0, &[3]);
        assert_eq!(queues.scan(), ScanResult::Handled);
        assert_eq!(queues.take_response(0).unwrap(), vec![3]);
    }

    #[test]
    fn oversized_queue_count_rejected() {
        let comm = Arc::new(SharedBuffer::zeroed(4096, 0));
        assert!(matches!(
            QueueSet::new(comm, usize::MAX / 64),
            Err(XrpError::QueueCountTooLarge { .. })
        ));
    }

    #[test]
    fn repost_rearms_the_waiter() {
        let queues = set(1);
        queues.post(0, &[1]).unwrap();
        dsp_respond(&queues, 0, &[1]);
        assert_eq!(queues.scan(), ScanResult::Handled);
        queues.take_response(0).unwrap();

        queues.post(0, &[2]).unwrap();
        assert!(!queues.get(0).unwrap().completion().is_signalled());
        dsp_respond(&queues, 0, &[2]);
        assert_eq!(queues.scan(), ScanResult::Handled);
    }

    #[test]
    fn wait_times_out_without_response() {
        let queues = set(1);
        queues.post(0, &[1]).unwrap();
        let err = queues.wait(0, Some(Duration::from_millis(20))).unwrap_err();
        assert!(matches!(err, XrpError::Timeout { duration_ms: 20 }));
        // slot untouched
        assert_eq!(queues.comm().read32(FLAGS_OFFSET), flags::REQUEST_VALID);
    }

    #[test]
    fn waiter_woken_from_another_thread() {
        let queues = Arc::new(set(1));
        queues.post(0, &[1]).unwrap();

        let responder = {
            let queues = Arc::clone(&queues);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                dsp_respond(&queues, 0, &[42]);
                queues.scan()
            })
        };

        queues.wait(0, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(responder.join().unwrap(), ScanResult::Handled);
        assert_eq!(queues.take_response(0).unwrap(), vec![42]);
    }

    #[test]
    fn invalid_queue_index() {
        let queues = set(2);
        assert!(matches!(
            queues.post(2, &[]),
            Err(XrpError::InvalidQueue { index: 2, count: 2 })
        ));
    }
}
