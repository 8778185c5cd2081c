//! Clock-gated access to the `dsp_config` register block.
//!
//! The block only decodes while the config clock runs; touching it with the
//! clock off hangs or faults the bus on some parts. Every access checks the
//! clock first. Reads with the clock off return [`CLOCK_GATED_SENTINEL`],
//! which cannot be told apart from a register that really reads all-ones;
//! use [`RegisterGate::try_read`] where that matters.

use std::sync::Arc;

use tracing::error;

use crate::error::{Result, XrpError};
use crate::mmio::Mmio;
use crate::platform::Clock;

/// Value returned by [`RegisterGate::read`] when the config clock is off.
pub const CLOCK_GATED_SENTINEL: u32 = 0xFFFF_FFFF;

/// Config register window guarded by the config clock
#[derive(Debug)]
pub struct RegisterGate {
    regs: Box<dyn Mmio>,
    clock: Arc<dyn Clock>,
}

impl RegisterGate {
    /// Guard `regs` with `clock`.
    pub fn new(regs: Box<dyn Mmio>, clock: Arc<dyn Clock>) -> Self {
        Self { regs, clock }
    }

    /// Write a config register. Dropped with an error log if the clock is off.
    pub fn write(&self, offset: usize, value: u32) {
        if !self.clock.is_enabled() {
            error!("Trying to write dsp config {offset:#x} with disabled clock. Aborting");
            return;
        }
        self.regs.write32(offset, value);
    }

    /// Read a config register, or [`CLOCK_GATED_SENTINEL`] if the clock is off.
    pub fn read(&self, offset: usize) -> u32 {
        if !self.clock.is_enabled() {
            error!("Trying to read dsp config {offset:#x} with disabled clock. Aborting");
            return CLOCK_GATED_SENTINEL;
        }
        self.regs.read32(offset)
    }

    /// Read a config register, reporting a gated clock as an error.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::ClockGated`] if the config clock is off.
    pub fn try_read(&self, offset: usize) -> Result<u32> {
        if !self.clock.is_enabled() {
            return Err(XrpError::ClockGated { offset });
        }
        Ok(self.regs.read32(offset))
    }

    /// Whether the config clock currently allows access.
    pub fn is_open(&self) -> bool {
        self.clock.is_enabled()
    }

    /// The config clock guarding this window.
    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{EventLog, SimClock, SimRegisters};

    fn gate() -> (RegisterGate, Arc<SimClock>, Arc<SimRegisters>) {
        let clock = Arc::new(SimClock::new("dsp-config-clock", EventLog::default()));
        let regs = Arc::new(SimRegisters::new(0x2000));
        let gate = RegisterGate::new(Box::new(Arc::clone(&regs)), clock.clone());
        (gate, clock, regs)
    }

    #[test]
    fn write_dropped_while_gated() {
        let (gate, _clock, regs) = gate();
        gate.write(0x40, 1);
        assert_eq!(regs.peek(0x40), 0);
    }

    #[test]
    fn read_returns_sentinel_while_gated() {
        let (gate, _clock, regs) = gate();
        regs.poke(0x4, 0x1234);
        assert_eq!(gate.read(0x4), CLOCK_GATED_SENTINEL);
        assert!(matches!(gate.try_read(0x4), Err(XrpError::ClockGated { offset: 0x4 })));
    }

    #[test]
    fn access_passes_through_with_clock() {
        let (gate, clock, regs) = gate();
        clock.prepare_enable().unwrap();
        gate.write(0x40, 1);
        assert_eq!(regs.peek(0x40), 1);
        assert_eq!(gate.read(0x40), 1);
        assert_eq!(gate.try_read(0x40).unwrap(), 1);
        assert!(gate.is_open());
    }
}
