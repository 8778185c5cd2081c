//! Power and reset sequencing
//!
//! ```text
//!            enable                      disable
//!   Off ──────────────────▶ Running ──────────────▶ Off
//!    │  deassert reset                close doorbell
//!    │  config clock on  (ConfigPowered)   dsp clock off (if on)
//!    │  halt                          config clock off
//!    │  open doorbell                 assert reset ──fail──▶ Fatal
//!    │  program LUT
//!    │  watchdog off, irq masks open, reset vector
//!    │  dsp clock on (rate change with config clock parked)
//!    └──any failure──▶ Fatal
//! ```
//!
//! The config clock has to be up before the DSP clock: watchdog, masks and
//! reset vector are config registers. The DSP clock provider requires the
//! dependent config clock to be off while it re-rates, hence the park and
//! re-enable around `set_rate`. Nothing is rolled back on failure.

use tracing::{debug, error, info};

use crate::device::{DeviceContext, DspState};
use crate::doorbell::Doorbell;
use crate::error::{Result, XrpError};
use crate::platform::{CONFIG_CLOCK_NAME, DSP_CLOCK_NAME};

impl DeviceContext {
    /// Bring the DSP from reset to powered and stalled, ready for firmware.
    ///
    /// The DSP is left halted; call [`release`](Self::release) once firmware
    /// is in place.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::Fatal`] if the device already latched fatal,
    /// [`XrpError::InvalidState`] unless it is off, and otherwise the error of
    /// the failing step, after latching [`DspState::Fatal`].
    pub fn enable(&mut self) -> Result<()> {
        match self.state {
            DspState::Off => {}
            DspState::Fatal => return Err(XrpError::Fatal),
            state => return Err(XrpError::invalid_state(format!("enable while {state}"))),
        }

        match self.enable_sequence() {
            Ok(()) => {
                self.state = DspState::Running;
                info!("DSP enabled");
                Ok(())
            }
            Err(e) => {
                error!("DSP enable failed: {e}");
                self.state = DspState::Fatal;
                Err(e)
            }
        }
    }

    fn enable_sequence(&mut self) -> Result<()> {
        self.reset.deassert_reset().map_err(|source| {
            error!("failed to deassert reset ({source})");
            XrpError::Reset { source }
        })?;

        self.dsp_config_poweron()?;
        self.state = DspState::ConfigPowered;

        self.halt();
        self.open_doorbell()?;

        self.configure_axi_master_lut();

        debug!("Disable WWDT");
        self.ops.disable_watchdog(&self.gate);

        debug!("Open DSP interrupts");
        self.ops.open_interrupt_masks(&self.gate);

        debug!("Configure reset vector {:#x}", self.reset_vector);
        self.ops.configure_reset_vector(&self.gate, self.reset_vector);

        self.dsp_poweron()
    }

    /// Power the DSP down and hold it in reset.
    ///
    /// Callable from any state. A device that is already fatal stays fatal.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::Reset`] after latching [`DspState::Fatal`] if the
    /// reset line cannot be asserted.
    pub fn disable(&mut self) -> Result<()> {
        if let Some(doorbell) = self.doorbell.take() {
            doorbell.close();
        }
        self.dsp_poweroff()?;
        if self.state != DspState::Fatal {
            self.state = DspState::Off;
        }
        info!("DSP disabled");
        Ok(())
    }

    fn open_doorbell(&mut self) -> Result<()> {
        let doorbell = Doorbell::open(
            self.mailbox.as_ref(),
            self.mailbox_index,
            std::sync::Arc::clone(&self.queues),
        )?;
        self.doorbell = Some(doorbell);
        Ok(())
    }

    fn dsp_config_poweron(&self) -> Result<()> {
        debug!("DSP Config Poweron");
        self.gate.clock().prepare_enable().map_err(|source| {
            error!("Error in config clock prepare/enable ({source})");
            XrpError::clock(CONFIG_CLOCK_NAME, source)
        })
    }

    fn dsp_config_poweroff(&self) {
        debug!("DSP Config Poweroff");
        self.gate.clock().disable_unprepare();
    }

    fn dsp_poweron(&self) -> Result<()> {
        debug!("DSP Poweron");

        let rate = self.clock_frequency.ok_or_else(|| {
            error!("Error in getting pll rate");
            XrpError::MissingClockFrequency
        })?;

        self.dsp_clock.prepare_enable().map_err(|source| {
            error!("Error in dsp clock enable/prepare ({source})");
            XrpError::clock(DSP_CLOCK_NAME, source)
        })?;

        self.dsp_config_poweroff();

        self.dsp_clock.set_rate(u64::from(rate)).map_err(|source| {
            error!("Error in dsp clock set rate {rate} ({source})");
            XrpError::clock(DSP_CLOCK_NAME, source)
        })?;

        if !self.clock_settle.is_zero() {
            std::thread::sleep(self.clock_settle);
        }

        self.dsp_config_poweron()
    }

    fn dsp_poweroff(&mut self) -> Result<()> {
        debug!("DSP Poweroff");

        // The clock framework warns on disabling an already disabled clock.
        if self.dsp_clock.is_enabled() {
            self.dsp_clock.disable_unprepare();
        }

        self.dsp_config_poweroff();

        self.reset.assert_reset().map_err(|source| {
            self.state = DspState::Fatal;
            error!("Failed to assert reset ({source})");
            XrpError::Reset { source }
        })
    }
}
