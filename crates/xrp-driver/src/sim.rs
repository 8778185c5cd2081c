// SPDX-License-Identifier: AGPL-3.0-only

//! Software platform for running the hardware layer without a DSP
//!
//! Implements every [`crate::platform`] contract in memory:
//!
//! - [`SimRegisters`]: config block backed by atomics
//! - [`SimClock`] / [`SimReset`]: gate state plus failure injection
//! - [`SimMailbox`]: one channel whose inbound side is driven by the test
//! - [`SimPlatform`]: bundles the above, hands out firmware regions and
//!   bump-allocated shared buffers
//! - [`SimDsp`]: plays the DSP side of the completion-queue protocol
//!
//! Every externally visible step is appended to an [`EventLog`] so tests can
//! assert on ordering.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use xrp_chip::comm::{self, flags, FLAGS_OFFSET, IN_SIZE_OFFSET, OUT_SIZE_OFFSET, PAYLOAD_OFFSET};
use xrp_chip::regs::CONFIG_WINDOW_SIZE;

use crate::error::PlatformError;
use crate::mmio::Mmio;
use crate::platform::{
    Clock, ConfigWindow, Mailbox, MailboxChannel, MemResource, Platform, ResetControl,
    RxCallback, CLOCK_FREQUENCY_PROPERTY, CONFIG_CLOCK_NAME, DSP_CLOCK_NAME,
    FIRMWARE_REGION_NAME, RESET_NAME,
};
use crate::shared::SharedBuffer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observable platform step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Reset line asserted
    ResetAsserted,
    /// Reset line released
    ResetDeasserted,
    /// Clock enabled
    ClockEnabled(String),
    /// Clock disabled
    ClockDisabled(String),
    /// Clock re-rated
    ClockRate(String, u64),
    /// Mailbox channel requested
    MailboxOpened(usize),
    /// Mailbox channel freed
    MailboxClosed(usize),
    /// Message sent to the DSP
    MailboxSend,
}

/// Shared, ordered record of [`SimEvent`]s
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<SimEvent>>>);

impl EventLog {
    /// Append an event.
    pub fn push(&self, event: SimEvent) {
        lock(&self.0).push(event);
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<SimEvent> {
        lock(&self.0).clone()
    }

    /// How many times `event` occurred.
    pub fn count(&self, event: &SimEvent) -> usize {
        lock(&self.0).iter().filter(|e| *e == event).count()
    }

    /// Position of the first `event`.
    pub fn position(&self, event: &SimEvent) -> Option<usize> {
        lock(&self.0).iter().position(|e| e == event)
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

// ── Registers ────────────────────────────────────────────────────────────────

/// In-memory register block
#[derive(Debug)]
pub struct SimRegisters {
    words: Box<[AtomicU32]>,
    writes: AtomicUsize,
}

impl SimRegisters {
    /// Zeroed block of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            words: (0..size.div_ceil(4)).map(|_| AtomicU32::new(0)).collect(),
            writes: AtomicUsize::new(0),
        }
    }

    /// Read a register bypassing any gate.
    pub fn peek(&self, offset: usize) -> u32 {
        self.words[offset / 4].load(Ordering::Acquire)
    }

    /// Set a register as the hardware would.
    pub fn poke(&self, offset: usize, value: u32) {
        self.words[offset / 4].store(value, Ordering::Release);
    }

    /// Number of writes that reached the block.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }
}

impl Mmio for SimRegisters {
    fn read32(&self, offset: usize) -> u32 {
        self.peek(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.poke(offset, value);
    }

    fn size(&self) -> usize {
        self.words.len() * 4
    }
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Gateable clock with failure injection
#[derive(Debug)]
pub struct SimClock {
    name: String,
    enabled: AtomicBool,
    rate: AtomicU64,
    fail_enable: AtomicBool,
    fail_set_rate: AtomicBool,
    redundant_disables: AtomicUsize,
    log: EventLog,
}

impl SimClock {
    /// Disabled clock recording into `log`.
    pub fn new(name: impl Into<String>, log: EventLog) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(false),
            rate: AtomicU64::new(0),
            fail_enable: AtomicBool::new(false),
            fail_set_rate: AtomicBool::new(false),
            redundant_disables: AtomicUsize::new(0),
            log,
        }
    }

    /// Make the next `prepare_enable` calls fail.
    pub fn fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::Release);
    }

    /// Make `set_rate` fail.
    pub fn fail_set_rate(&self, fail: bool) {
        self.fail_set_rate.store(fail, Ordering::Release);
    }

    /// Current rate.
    pub fn rate(&self) -> u64 {
        self.rate.load(Ordering::Acquire)
    }

    /// Disables issued while already disabled.
    pub fn redundant_disables(&self) -> usize {
        self.redundant_disables.load(Ordering::Acquire)
    }
}

impl Clock for SimClock {
    fn prepare_enable(&self) -> Result<(), PlatformError> {
        if self.fail_enable.load(Ordering::Acquire) {
            return Err(PlatformError::failed("clk_prepare_enable", -5));
        }
        self.enabled.store(true, Ordering::Release);
        self.log.push(SimEvent::ClockEnabled(self.name.clone()));
        Ok(())
    }

    fn disable_unprepare(&self) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            warn!("{} already disabled", self.name);
            self.redundant_disables.fetch_add(1, Ordering::AcqRel);
        }
        self.log.push(SimEvent::ClockDisabled(self.name.clone()));
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_rate(&self, hz: u64) -> Result<(), PlatformError> {
        if self.fail_set_rate.load(Ordering::Acquire) {
            return Err(PlatformError::failed("clk_set_rate", -22));
        }
        self.rate.store(hz, Ordering::Release);
        self.log.push(SimEvent::ClockRate(self.name.clone(), hz));
        Ok(())
    }
}

// ── Reset ────────────────────────────────────────────────────────────────────

/// Reset line, asserted at power-on
#[derive(Debug)]
pub struct SimReset {
    asserted: AtomicBool,
    fail_assert: AtomicBool,
    fail_deassert: AtomicBool,
    log: EventLog,
}

impl SimReset {
    /// Asserted line recording into `log`.
    pub fn new(log: EventLog) -> Self {
        Self {
            asserted: AtomicBool::new(true),
            fail_assert: AtomicBool::new(false),
            fail_deassert: AtomicBool::new(false),
            log,
        }
    }

    /// Make `assert_reset` fail.
    pub fn fail_assert(&self, fail: bool) {
        self.fail_assert.store(fail, Ordering::Release);
    }

    /// Make `deassert_reset` fail.
    pub fn fail_deassert(&self, fail: bool) {
        self.fail_deassert.store(fail, Ordering::Release);
    }

    /// Whether the DSP is held in reset.
    pub fn is_asserted(&self) -> bool {
        self.asserted.load(Ordering::Acquire)
    }
}

impl ResetControl for SimReset {
    fn assert_reset(&self) -> Result<(), PlatformError> {
        if self.fail_assert.load(Ordering::Acquire) {
            return Err(PlatformError::failed("reset_control_assert", -110));
        }
        self.asserted.store(true, Ordering::Release);
        self.log.push(SimEvent::ResetAsserted);
        Ok(())
    }

    fn deassert_reset(&self) -> Result<(), PlatformError> {
        if self.fail_deassert.load(Ordering::Acquire) {
            return Err(PlatformError::failed("reset_control_deassert", -110));
        }
        self.asserted.store(false, Ordering::Release);
        self.log.push(SimEvent::ResetDeasserted);
        Ok(())
    }
}

// ── Mailbox ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MailboxInner {
    rx: Mutex<Option<RxCallback>>,
    index: AtomicUsize,
    sent: AtomicUsize,
    fail_send: AtomicBool,
    fail_request: AtomicBool,
}

impl std::fmt::Debug for MailboxInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxInner")
            .field("open", &lock(&self.rx).is_some())
            .field("index", &self.index)
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

/// Single-channel mailbox controller
#[derive(Debug)]
pub struct SimMailbox {
    inner: Arc<MailboxInner>,
    log: EventLog,
}

#[derive(Debug)]
struct SimChannel {
    inner: Arc<MailboxInner>,
    log: EventLog,
}

impl SimMailbox {
    /// Controller with no channel open.
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: Arc::new(MailboxInner::default()),
            log,
        }
    }

    /// Deliver an inbound doorbell. Returns `false` if no channel is open.
    pub fn ring_host(&self) -> bool {
        let rx = lock(&self.inner.rx).clone();
        match rx {
            Some(rx) => {
                rx();
                true
            }
            None => false,
        }
    }

    /// Whether a channel is open.
    pub fn is_open(&self) -> bool {
        lock(&self.inner.rx).is_some()
    }

    /// Messages delivered to the DSP.
    pub fn sent(&self) -> usize {
        self.inner.sent.load(Ordering::Acquire)
    }

    /// Make `send` fail.
    pub fn fail_send(&self, fail: bool) {
        self.inner.fail_send.store(fail, Ordering::Release);
    }

    /// Make `request_channel` fail.
    pub fn fail_request(&self, fail: bool) {
        self.inner.fail_request.store(fail, Ordering::Release);
    }
}

impl Mailbox for SimMailbox {
    fn request_channel(
        &self,
        index: usize,
        rx: RxCallback,
    ) -> Result<Box<dyn MailboxChannel>, PlatformError> {
        if self.inner.fail_request.load(Ordering::Acquire) {
            return Err(PlatformError::failed("mbox_request_channel", -517));
        }
        let mut slot = lock(&self.inner.rx);
        if slot.is_some() {
            return Err(PlatformError::failed("mbox_request_channel", -16));
        }
        *slot = Some(rx);
        self.inner.index.store(index, Ordering::Release);
        self.log.push(SimEvent::MailboxOpened(index));
        Ok(Box::new(SimChannel {
            inner: Arc::clone(&self.inner),
            log: self.log.clone(),
        }))
    }
}

impl MailboxChannel for SimChannel {
    fn send(&self, _message: &[u8]) -> Result<(), PlatformError> {
        if self.inner.fail_send.load(Ordering::Acquire) {
            return Err(PlatformError::failed("mbox_send_message", -62));
        }
        self.inner.sent.fetch_add(1, Ordering::AcqRel);
        self.log.push(SimEvent::MailboxSend);
        Ok(())
    }
}

impl Drop for SimChannel {
    fn drop(&mut self) {
        lock(&self.inner.rx).take();
        self.log
            .push(SimEvent::MailboxClosed(self.inner.index.load(Ordering::Acquire)));
    }
}

// ── Platform ─────────────────────────────────────────────────────────────────

/// Physical base of the simulated config block.
pub const SIM_CONFIG_PHYS: u64 = 0x7820_0000;
/// First physical address handed out for shared buffers.
pub const SIM_SHARED_BASE: u64 = 0x2_4000_0000;
/// Default simulated DSP clock target.
pub const SIM_CLOCK_HZ: u32 = 600_000_000;

/// Complete in-memory platform for one DSP
#[derive(Debug)]
pub struct SimPlatform {
    log: EventLog,
    regs: Arc<SimRegisters>,
    reset: Arc<SimReset>,
    config_clock: Arc<SimClock>,
    dsp_clock: Arc<SimClock>,
    mailbox: Arc<SimMailbox>,
    firmware: Vec<MemResource>,
    clock_frequency: Option<u32>,
    missing: Mutex<HashSet<String>>,
    next_shared: AtomicU64,
    fail_allocation: AtomicBool,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    /// Platform with firmware code at `0x10_0000..=0x4F_FFFF`, data at
    /// `0x50_0000..=0xFF_FFFF`, and a 600 MHz DSP clock target.
    pub fn new() -> Self {
        let log = EventLog::default();
        Self {
            regs: Arc::new(SimRegisters::new(CONFIG_WINDOW_SIZE)),
            reset: Arc::new(SimReset::new(log.clone())),
            config_clock: Arc::new(SimClock::new(CONFIG_CLOCK_NAME, log.clone())),
            dsp_clock: Arc::new(SimClock::new(DSP_CLOCK_NAME, log.clone())),
            mailbox: Arc::new(SimMailbox::new(log.clone())),
            firmware: vec![
                MemResource::new(0x0010_0000, 0x004F_FFFF),
                MemResource::new(0x0050_0000, 0x00FF_FFFF),
            ],
            clock_frequency: Some(SIM_CLOCK_HZ),
            missing: Mutex::new(HashSet::new()),
            next_shared: AtomicU64::new(SIM_SHARED_BASE),
            fail_allocation: AtomicBool::new(false),
            log,
        }
    }

    /// Replace the "dsp-fw" entries.
    #[must_use]
    pub fn with_firmware_regions(mut self, regions: Vec<MemResource>) -> Self {
        self.firmware = regions;
        self
    }

    /// Set or clear the "clock-frequency" property.
    #[must_use]
    pub fn with_clock_frequency(mut self, hz: Option<u32>) -> Self {
        self.clock_frequency = hz;
        self
    }

    /// Pretend the named resource ("dsp-reset", "dsp-clock", "mailbox",
    /// "config", ...) is not described.
    pub fn remove(&self, name: &str) {
        lock(&self.missing).insert(name.to_string());
    }

    /// Make shared-buffer allocation fail.
    pub fn fail_allocation(&self, fail: bool) {
        self.fail_allocation.store(fail, Ordering::Release);
    }

    fn check(&self, name: &str) -> Result<(), PlatformError> {
        if lock(&self.missing).contains(name) {
            return Err(PlatformError::not_found(name));
        }
        Ok(())
    }

    /// Event log shared by every component.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Config block.
    pub fn registers(&self) -> &Arc<SimRegisters> {
        &self.regs
    }

    /// Reset line.
    pub fn reset(&self) -> &Arc<SimReset> {
        &self.reset
    }

    /// Config clock.
    pub fn config_clock(&self) -> &Arc<SimClock> {
        &self.config_clock
    }

    /// DSP clock.
    pub fn dsp_clock(&self) -> &Arc<SimClock> {
        &self.dsp_clock
    }

    /// Mailbox controller.
    pub fn sim_mailbox(&self) -> &Arc<SimMailbox> {
        &self.mailbox
    }
}

impl Platform for SimPlatform {
    fn config_window(&self) -> Result<ConfigWindow, PlatformError> {
        self.check("config")?;
        Ok(ConfigWindow {
            regs: Box::new(Arc::clone(&self.regs)),
            phys_base: SIM_CONFIG_PHYS,
        })
    }

    fn reset_control(&self, name: &str) -> Result<Arc<dyn ResetControl>, PlatformError> {
        self.check(name)?;
        if name != RESET_NAME {
            return Err(PlatformError::not_found(name));
        }
        Ok(self.reset.clone())
    }

    fn clock(&self, name: &str) -> Result<Arc<dyn Clock>, PlatformError> {
        self.check(name)?;
        match name {
            CONFIG_CLOCK_NAME => Ok(self.config_clock.clone()),
            DSP_CLOCK_NAME => Ok(self.dsp_clock.clone()),
            _ => Err(PlatformError::not_found(name)),
        }
    }

    fn mailbox(&self) -> Result<Arc<dyn Mailbox>, PlatformError> {
        self.check("mailbox")?;
        Ok(self.mailbox.clone())
    }

    fn memory_region(&self, name: &str, index: usize) -> Result<MemResource, PlatformError> {
        self.check(name)?;
        if name != FIRMWARE_REGION_NAME {
            return Err(PlatformError::not_found(name));
        }
        self.firmware
            .get(index)
            .copied()
            .ok_or_else(|| PlatformError::not_found(format!("{name}[{index}]")))
    }

    fn property_u32(&self, name: &str) -> Option<u32> {
        match name {
            CLOCK_FREQUENCY_PROPERTY => self.clock_frequency,
            _ => None,
        }
    }

    fn allocate_shared(&self, size: usize) -> Result<SharedBuffer, PlatformError> {
        if self.fail_allocation.load(Ordering::Acquire) {
            return Err(PlatformError::NoMemory { size });
        }
        let span = (size as u64).next_multiple_of(4096);
        let paddr = self.next_shared.fetch_add(span, Ordering::AcqRel);
        debug!("Allocated {size:#x} shared bytes at {paddr:#x}");
        Ok(SharedBuffer::zeroed(size, paddr))
    }
}

// ── DSP side ─────────────────────────────────────────────────────────────────

/// DSP half of the completion-queue protocol
#[derive(Debug, Clone)]
pub struct SimDsp {
    comm: Arc<SharedBuffer>,
    mailbox: Arc<SimMailbox>,
}

impl SimDsp {
    /// Serve queues in `comm`, ringing the host through `mailbox`.
    pub fn new(comm: Arc<SharedBuffer>, mailbox: Arc<SimMailbox>) -> Self {
        Self { comm, mailbox }
    }

    /// Request posted on queue `index` and not yet answered.
    pub fn pending(&self, index: usize) -> Option<Vec<u32>> {
        let base = comm::queue_offset(index);
        let flags = self.comm.word(base + FLAGS_OFFSET).load(Ordering::Acquire);
        if flags & flags::REQUEST_VALID == 0 || flags & flags::RESPONSE_VALID != 0 {
            return None;
        }
        let words = self.comm.read32(base + IN_SIZE_OFFSET) as usize / 4;
        Some(
            (0..words)
                .map(|i| self.comm.read32(base + PAYLOAD_OFFSET + 4 * i))
                .collect(),
        )
    }

    /// Write `response` into queue `index`, flag it and ring the host.
    /// Returns whether the host had a channel open.
    #[allow(clippy::cast_possible_truncation)]
    pub fn respond(&self, index: usize, response: &[u32]) -> bool {
        let base = comm::queue_offset(index);
        for (i, word) in response.iter().enumerate() {
            self.comm.write32(base + PAYLOAD_OFFSET + 4 * i, *word);
        }
        self.comm
            .write32(base + OUT_SIZE_OFFSET, std::mem::size_of_val(response) as u32);
        self.comm
            .word(base + FLAGS_OFFSET)
            .fetch_or(flags::RESPONSE_VALID, Ordering::Release);
        self.mailbox.ring_host()
    }

    /// Answer a pending request on `index` with `handler(request)`.
    /// Returns `false` if nothing was pending.
    pub fn serve(&self, index: usize, handler: impl FnOnce(&[u32]) -> Vec<u32>) -> bool {
        match self.pending(index) {
            Some(request) => {
                let response = handler(&request);
                self.respond(index, &response);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_counts_redundant_disables() {
        let clock = SimClock::new("c", EventLog::default());
        clock.disable_unprepare();
        assert_eq!(clock.redundant_disables(), 1);
        clock.prepare_enable().unwrap();
        clock.disable_unprepare();
        assert_eq!(clock.redundant_disables(), 1);
    }

    #[test]
    fn allocations_do_not_overlap() {
        let platform = SimPlatform::new();
        let a = platform.allocate_shared(100).unwrap();
        let b = platform.allocate_shared(100).unwrap();
        assert_eq!(a.paddr(), SIM_SHARED_BASE);
        assert_eq!(b.paddr(), SIM_SHARED_BASE + 4096);
    }

    #[test]
    fn removed_resources_are_not_found() {
        let platform = SimPlatform::new();
        platform.remove(DSP_CLOCK_NAME);
        assert!(platform.clock(DSP_CLOCK_NAME).is_err());
        assert!(platform.clock(CONFIG_CLOCK_NAME).is_ok());
    }

    #[test]
    fn second_channel_request_is_busy() {
        let mailbox = SimMailbox::new(EventLog::default());
        let rx: RxCallback = Arc::new(|| {});
        let _first = mailbox.request_channel(0, rx.clone()).unwrap();
        assert!(mailbox.request_channel(0, rx).is_err());
    }
}
