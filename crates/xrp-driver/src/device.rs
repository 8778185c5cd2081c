//! DSP device context
//!
//! One [`DeviceContext`] per physical DSP. It owns every resource the
//! hardware layer touches and is the only way to reach them. Lifecycle
//! transitions ([`enable`](DeviceContext::enable),
//! [`disable`](DeviceContext::disable)) take `&mut self`; register, queue and
//! doorbell operations take `&self`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use xrp_chip::memmap::{DdrRegion, CYCLIC_LOG_SIZE};
use xrp_chip::regs::ConfigReg;

use crate::config::DeviceConfig;
use crate::doorbell::Doorbell;
use crate::error::{Result, XrpError};
use crate::gate::RegisterGate;
use crate::hw_ops::{HardwareOps, Variant};
use crate::platform::{
    Clock, Mailbox, Platform, ResetControl, CLOCK_FREQUENCY_PROPERTY, CONFIG_CLOCK_NAME,
    DSP_CLOCK_NAME, FIRMWARE_REGION_NAME, RESET_NAME,
};
use crate::queue::QueueSet;
use crate::ranges::MemoryRanges;
use crate::shared::DspBuffer;

/// Power / run state of the DSP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspState {
    /// In reset, clocks off
    Off,
    /// Config clock on, bring-up in progress
    ConfigPowered,
    /// Fully powered, doorbell open
    Running,
    /// An unrecoverable step failed; recreate the context to recover
    Fatal,
}

/// Coarse health of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No unrecoverable failure seen
    Normal,
    /// Latched after an unrecoverable failure
    Fatal,
}

impl DspState {
    /// Coarse lifecycle view.
    pub const fn lifecycle(self) -> LifecycleState {
        match self {
            Self::Fatal => LifecycleState::Fatal,
            _ => LifecycleState::Normal,
        }
    }
}

impl std::fmt::Display for DspState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::ConfigPowered => write!(f, "config-powered"),
            Self::Running => write!(f, "running"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Everything needed to drive one DSP
#[derive(Debug)]
pub struct DeviceContext {
    pub(crate) gate: RegisterGate,
    pub(crate) config_phys: u64,
    pub(crate) dsp_clock: Arc<dyn Clock>,
    pub(crate) reset: Arc<dyn ResetControl>,
    pub(crate) mailbox: Arc<dyn Mailbox>,
    pub(crate) doorbell: Option<Doorbell>,
    pub(crate) queues: Arc<QueueSet>,
    pub(crate) ranges: MemoryRanges,
    pub(crate) cyclic_log: DspBuffer,
    pub(crate) comm: DspBuffer,
    pub(crate) state: DspState,
    pub(crate) clock_frequency: Option<u32>,
    pub(crate) reset_vector: u32,
    pub(crate) mailbox_index: usize,
    pub(crate) clock_settle: Duration,
    pub(crate) ops: &'static dyn HardwareOps,
}

impl DeviceContext {
    /// Acquire every resource for one DSP instance.
    ///
    /// Nothing is powered. On error the partially acquired resources are
    /// dropped and the probe can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::Resource`] if a register window, clock, reset,
    /// mailbox, firmware region or buffer is unavailable, and
    /// [`XrpError::InvalidMemoryRange`] / [`XrpError::CommBufferTooSmall`]
    /// for inconsistent descriptions, and [`XrpError::QueueCountTooLarge`]
    /// if the queue count cannot be laid out at all.
    pub fn probe(platform: &dyn Platform, variant: Variant, config: &DeviceConfig) -> Result<Self> {
        debug!("Probing {variant} DSP");
        let ops = variant.ops();

        let window = platform
            .config_window()
            .map_err(|e| XrpError::resource("dsp config window", e))?;

        debug!("Requesting reset object");
        let reset = platform
            .reset_control(RESET_NAME)
            .map_err(|e| XrpError::resource(RESET_NAME, e))?;

        debug!("Requesting config clock object");
        let config_clock = platform
            .clock(CONFIG_CLOCK_NAME)
            .map_err(|e| XrpError::resource(CONFIG_CLOCK_NAME, e))?;

        debug!("Requesting dsp clock object");
        let dsp_clock = platform
            .clock(DSP_CLOCK_NAME)
            .map_err(|e| XrpError::resource(DSP_CLOCK_NAME, e))?;

        let mailbox = platform
            .mailbox()
            .map_err(|e| XrpError::resource("mailbox", e))?;

        let comm_size = config
            .effective_comm_size()
            .ok_or(XrpError::QueueCountTooLarge {
                queues: config.queue_count,
            })?;

        let mut ranges = MemoryRanges::new();
        ops.init_memory_ranges(&mut ranges);
        for region in DdrRegion::ALL {
            let index = region as usize;
            let res = platform
                .memory_region(FIRMWARE_REGION_NAME, index)
                .map_err(|e| XrpError::resource(format!("{FIRMWARE_REGION_NAME} region {index}"), e))?;
            ranges.set_ddr(region, res)?;
        }

        let log_mem = platform
            .allocate_shared(CYCLIC_LOG_SIZE)
            .map_err(|e| XrpError::resource("cyclic log buffer", e))?;
        let cyclic_log = DspBuffer::new(log_mem, config.log_dsp_address);

        let comm_mem = platform
            .allocate_shared(comm_size)
            .map_err(|e| XrpError::resource("comm buffer", e))?;
        let comm = DspBuffer::new(comm_mem, config.comm_dsp_address);
        let queues = Arc::new(QueueSet::new(Arc::clone(comm.memory()), config.queue_count)?);

        let clock_frequency = config
            .clock_frequency
            .or_else(|| platform.property_u32(CLOCK_FREQUENCY_PROPERTY));
        if clock_frequency.is_none() {
            warn!("No {CLOCK_FREQUENCY_PROPERTY} configured; enable will fail");
        }

        info!(
            "Probed {variant} DSP: config at {:#x}, {} queues, comm {:#x} -> dsp {:#x}",
            window.phys_base,
            queues.len(),
            comm.paddr(),
            comm.dsp_addr()
        );

        Ok(Self {
            gate: RegisterGate::new(window.regs, config_clock),
            config_phys: window.phys_base,
            dsp_clock,
            reset,
            mailbox,
            doorbell: None,
            queues,
            ranges,
            cyclic_log,
            comm,
            state: DspState::Off,
            clock_frequency,
            reset_vector: config.reset_vector,
            mailbox_index: config.mailbox_index,
            clock_settle: config.clock_settle,
            ops,
        })
    }

    /// Current power state.
    pub const fn state(&self) -> DspState {
        self.state
    }

    /// Coarse lifecycle state.
    pub const fn lifecycle(&self) -> LifecycleState {
        self.state.lifecycle()
    }

    /// SoC variant.
    pub fn variant(&self) -> Variant {
        self.ops.variant()
    }

    /// Physical base of the config block.
    pub const fn config_phys(&self) -> u64 {
        self.config_phys
    }

    /// Firmware-addressable memory table.
    pub const fn memory_ranges(&self) -> &MemoryRanges {
        &self.ranges
    }

    /// Cyclic log buffer.
    pub const fn cyclic_log(&self) -> &DspBuffer {
        &self.cyclic_log
    }

    /// Comm buffer.
    pub const fn comm(&self) -> &DspBuffer {
        &self.comm
    }

    /// Completion queues.
    pub const fn queues(&self) -> &Arc<QueueSet> {
        &self.queues
    }

    /// Whether the doorbell channel is open.
    pub const fn doorbell_open(&self) -> bool {
        self.doorbell.is_some()
    }

    // ── Register access ──────────────────────────────────────────────────────

    /// Read a named config register; all-ones if the config clock is off.
    pub fn read_config(&self, reg: ConfigReg) -> u32 {
        self.gate.read(self.ops.config_reg_offset(reg))
    }

    /// Read a named config register, failing if the config clock is off.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::ClockGated`] if the config clock is off.
    pub fn try_read_config(&self, reg: ConfigReg) -> Result<u32> {
        self.gate.try_read(self.ops.config_reg_offset(reg))
    }

    /// Write a named config register; dropped if the config clock is off.
    pub fn write_config(&self, reg: ConfigReg, value: u32) {
        self.gate.write(self.ops.config_reg_offset(reg), value);
    }

    /// Gated access by raw offset.
    pub const fn registers(&self) -> &RegisterGate {
        &self.gate
    }

    // ── Run control ──────────────────────────────────────────────────────────

    /// Stall DSP execution.
    pub fn halt(&self) {
        debug!("halt");
        self.ops.halt(&self.gate);
    }

    /// Resume DSP execution.
    pub fn release(&self) {
        debug!("release");
        self.ops.release(&self.gate);
    }

    // ── Doorbell and queues ──────────────────────────────────────────────────

    /// Ring the DSP doorbell. Logged no-op if the doorbell is closed.
    pub fn notify(&self) {
        match &self.doorbell {
            Some(doorbell) => doorbell.notify(),
            None => warn!("notify with doorbell closed (state {})", self.state),
        }
    }

    /// Post `request` on `queue`, ring the DSP and wait for its response.
    ///
    /// On timeout the slot is left as is; whether it still belongs to the
    /// stale request is the caller's call.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::InvalidQueue`], [`XrpError::PayloadTooLarge`] or
    /// [`XrpError::Timeout`].
    pub fn post_and_wait(
        &self,
        queue: usize,
        request: &[u32],
        timeout: Option<Duration>,
    ) -> Result<Vec<u32>> {
        self.queues.post(queue, request)?;
        self.notify();
        self.queues.wait(queue, timeout)?;
        self.queues.take_response(queue)
    }

    // ── Validation ───────────────────────────────────────────────────────────

    /// Whether `addr` lies in memory the firmware may reference.
    pub fn is_valid_address(&self, addr: u64) -> bool {
        self.ranges.is_valid(addr)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        if let Some(doorbell) = self.doorbell.take() {
            doorbell.close();
        }
        debug!("Released {} DSP context (state {})", self.ops.variant(), self.state);
    }
}
