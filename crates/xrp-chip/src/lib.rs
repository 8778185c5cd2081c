//! Silicon model for the Xtensa DSP found on Hailo-15L.
//!
//! This crate has **no dependencies** and **no hardware access**: it is a
//! pure model of the DSP subsystem as seen from the host. Register offsets in
//! the `dsp_config` block, the AXI master lookup-table arithmetic, the fixed
//! DSP-side windows and on-chip memories, and the layout of a completion
//! queue slot in the shared comm buffer.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | `dsp_config` register map, named [`regs::ConfigReg`] identifiers, bit definitions |
//! | [`lut`] | AXI LUT slot / page arithmetic (128 MiB granularity) |
//! | [`memmap`] | DSP-side fixed windows, on-chip IRAM/DRAM, firmware region indices |
//! | [`comm`] | Completion-queue slot layout and flag bits |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod comm;
pub mod lut;
pub mod memmap;
pub mod regs;
