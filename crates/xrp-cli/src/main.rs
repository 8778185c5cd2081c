//! `xrp`: command-line interface for the Hailo XRP DSP hardware layer.
//!
//! ```text
//! USAGE:
//!   xrp regs                         Config register map
//!   xrp lut <dsp-addr> <phys-addr>   Where a translation lands in the LUT
//!   xrp check <addr> --code S E      Firmware address validation
//!   xrp simulate                     Bring up a simulated DSP and round-trip a request
//!   xrp dump --phys <addr>           Read a live config block (root)
//! ```

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xrp_chip::lut;
use xrp_chip::memmap::DdrRegion;
use xrp_chip::regs::{self, ConfigReg, CONFIG_WINDOW_SIZE};
use xrp_driver::sim::{SimDsp, SimPlatform};
use xrp_driver::{
    parse_number, DeviceConfig, DeviceContext, MappedRegion, MemResource, MemoryRanges, Mmio,
    Variant,
};

#[derive(Parser)]
#[command(name = "xrp", about = "Hailo XRP DSP hardware CLI", version)]
struct Cli {
    /// SoC variant.
    #[arg(long, global = true, default_value = "hailo15l")]
    variant: Variant,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the config register map.
    Regs,
    /// Show the LUT slot and page a DSP-to-physical mapping uses.
    Lut {
        /// DSP-side address (e.g. 0x90000000).
        #[arg(value_parser = parse_u32)]
        dsp: u32,
        /// Host physical address (e.g. 0x240000000).
        #[arg(value_parser = parse_u64)]
        phys: u64,
    },
    /// Check whether firmware may reference an address.
    Check {
        /// Physical address to check.
        #[arg(value_parser = parse_u64)]
        addr: u64,
        /// Firmware code region, first and last byte.
        #[arg(long, required = true, num_args = 2, value_names = ["START", "END"], value_parser = parse_u64)]
        code: Vec<u64>,
        /// Firmware data region, first and last byte.
        #[arg(long, num_args = 2, value_names = ["START", "END"], value_parser = parse_u64)]
        data: Option<Vec<u64>>,
    },
    /// Bring up a simulated DSP, show its windows and round-trip one request.
    Simulate {
        /// Number of completion queues.
        #[arg(long, default_value_t = 1)]
        queues: usize,
        /// Words to send.
        #[arg(default_values_t = [1u32, 2, 3], value_parser = parse_u32)]
        words: Vec<u32>,
    },
    /// Map a live config block and print its registers (requires root).
    Dump {
        /// Memory device to map from.
        #[arg(long, default_value = "/dev/mem")]
        device: String,
        /// Physical base of the config block.
        #[arg(long, value_parser = parse_u64)]
        phys: u64,
    },
}

fn parse_u64(raw: &str) -> std::result::Result<u64, String> {
    parse_number(raw).ok_or_else(|| format!("'{raw}' is not a number"))
}

fn parse_u32(raw: &str) -> std::result::Result<u32, String> {
    let value = parse_u64(raw)?;
    u32::try_from(value).map_err(|_| format!("{value:#x} does not fit 32 bits"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Regs => cmd_regs(),
        Cmd::Lut { dsp, phys } => cmd_lut(cli.variant, dsp, phys),
        Cmd::Check { addr, code, data } => cmd_check(cli.variant, addr, &code, data.as_deref())?,
        Cmd::Simulate { queues, words } => cmd_simulate(cli.variant, queues, &words)?,
        Cmd::Dump { device, phys } => cmd_dump(&device, phys)?,
    }

    Ok(())
}

fn all_registers() -> impl Iterator<Item = ConfigReg> {
    [ConfigReg::DspCfg, ConfigReg::AltResetVec, ConfigReg::RunStall]
        .into_iter()
        .chain(ConfigReg::INTERRUPT_MASKS)
}

fn cmd_regs() {
    println!("Config block ({CONFIG_WINDOW_SIZE:#x} bytes)");
    for reg in all_registers() {
        println!("  {:#06x}  {reg}", reg.offset());
    }
    println!();
    println!("AXI master LUT");
    for slot in 0..lut::SLOT_COUNT {
        let lo = u64::try_from(slot).unwrap_or_default() << lut::WINDOW_SHIFT;
        println!(
            "  {:#06x}  slot {slot:2}  dsp {lo:#010x}..{:#010x}",
            regs::dsp_axi_master(slot),
            lo + lut::WINDOW_SIZE
        );
    }
}

fn cmd_lut(variant: Variant, dsp: u32, phys: u64) {
    let slot = lut::dsp_slot(dsp);
    let page = lut::physical_page(phys);
    #[allow(clippy::cast_possible_truncation)]
    let offset = variant.ops().config_reg_offset(ConfigReg::AxiMaster(slot as u8));

    println!("DSP address  : {dsp:#010x}");
    println!("Slot         : {slot} (register {offset:#06x})");
    println!("Page         : {page:#x}");
    println!("Resolves to  : {:#x}", lut::translate(dsp, page));
    if lut::translate(dsp, page) != phys {
        println!("Note         : low bits differ from {phys:#x}; only the 128 MiB page is translated");
    }
}

fn cmd_check(variant: Variant, addr: u64, code: &[u64], data: Option<&[u64]>) -> Result<()> {
    let mut ranges = MemoryRanges::new();
    variant.ops().init_memory_ranges(&mut ranges);

    if let [start, end] = code {
        ranges.set_ddr(DdrRegion::Code, MemResource::new(*start, *end))?;
    } else {
        bail!("--code takes START END");
    }
    if let Some(&[start, end]) = data {
        ranges.set_ddr(DdrRegion::Data, MemResource::new(start, end))?;
    }

    for (i, range) in ranges.all().enumerate().filter(|(_, r)| r.is_populated()) {
        println!("  [{i}] {:#012x}..{:#012x}", range.start, range.end);
    }
    let verdict = if ranges.is_valid(addr) { "valid" } else { "INVALID" };
    println!("{addr:#x}: {verdict}");
    Ok(())
}

fn cmd_simulate(variant: Variant, queues: usize, words: &[u32]) -> Result<()> {
    let platform = SimPlatform::new();
    let config = DeviceConfig::from_env().with_queue_count(queues);
    let mut dsp = DeviceContext::probe(&platform, variant, &config)?;

    dsp.enable().context("enable simulated DSP")?;
    println!("State        : {}", dsp.state());
    println!("Config block : {:#x}", dsp.config_phys());
    println!();
    println!("Translation windows");
    for window in dsp.translation_windows() {
        println!(
            "  slot {:2}  dsp {:#010x} -> phys {:#012x}  page {:#05x} (readback {:#05x})  {}",
            window.slot(),
            window.dsp_address,
            window.physical_address,
            window.page(),
            dsp.read_translation(window.slot())?,
            window.name
        );
    }

    dsp.release();
    let firmware = SimDsp::new(dsp.comm().memory().clone(), platform.sim_mailbox().clone());
    let response = std::thread::scope(|s| {
        s.spawn(|| {
            let deadline = std::time::Instant::now() + Duration::from_secs(1);
            while std::time::Instant::now() < deadline {
                if firmware.serve(0, |req| req.iter().map(|w| w.wrapping_add(1)).collect()) {
                    return;
                }
                std::thread::yield_now();
            }
        });
        dsp.post_and_wait(0, words, Some(Duration::from_secs(2)))
    })?;
    println!();
    println!("Request      : {words:?}");
    println!("Response     : {response:?}");

    dsp.disable()?;
    println!("State        : {}", dsp.state());
    Ok(())
}

fn cmd_dump(device: &str, phys: u64) -> Result<()> {
    let region = MappedRegion::open(device, phys, CONFIG_WINDOW_SIZE)
        .with_context(|| format!("map {CONFIG_WINDOW_SIZE:#x} bytes at {phys:#x} from {device}"))?;

    for reg in all_registers() {
        println!("  {:#06x}  {:#010x}  {reg}", reg.offset(), region.read32(reg.offset()));
    }
    for slot in 0..lut::SLOT_COUNT {
        let page = region.read32(regs::dsp_axi_master(slot));
        #[allow(clippy::cast_possible_truncation)]
        let dsp = (slot as u32) << lut::WINDOW_SHIFT;
        println!(
            "  {:#06x}  {page:#010x}  slot {slot:2} -> {:#x}",
            regs::dsp_axi_master(slot),
            lut::translate(dsp, page)
        );
    }
    Ok(())
}
