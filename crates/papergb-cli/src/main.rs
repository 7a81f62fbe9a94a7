mod config;
mod error;
mod presenter;
mod screenshot;

use clap::Parser;
use error::RunnerError;
use log::{debug, error, info};
use papergb_core::{cartridge::Cartridge, gameboy::GameBoy};
use presenter::Presenter;
use std::{path::PathBuf, process::ExitCode, time::Duration};

const PRESENT_POLL: Duration = Duration::from_millis(8);
/// Frames between CPU state dumps under `--debug`.
const DEBUG_DUMP_INTERVAL: u64 = 60;

#[derive(Parser)]
#[command(name = "papergb", about = "Headless DMG emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// TOML runner configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run this boot ROM before the cartridge
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Number of frames to run before exiting
    #[arg(long)]
    frames: Option<u64>,

    /// Run as fast as possible
    #[arg(long)]
    unpaced: bool,

    /// Write the last frame to this PNG file on exit
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Accept VRAM writes while the PPU is drawing
    #[arg(long)]
    relaxed_vram: bool,

    /// Enable debug logging and periodic CPU state dumps
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }
}

fn dump_due(debug: bool, frames: u64) -> bool {
    debug && frames % DEBUG_DUMP_INTERVAL == 0
}

fn run(args: Args) -> Result<(), RunnerError> {
    let mut cfg = args
        .config
        .as_deref()
        .map(config::load_from_file)
        .unwrap_or_default();
    if args.relaxed_vram {
        cfg.vram_lock = config::VramLockMode::Relaxed;
    }
    if args.unpaced {
        cfg.paced = false;
    }
    if args.boot_rom.is_some() {
        cfg.boot_rom = args.boot_rom.clone();
    }

    let cart = Cartridge::from_file(&args.rom)?;
    let mut gb = match &cfg.boot_rom {
        Some(path) => {
            let boot = std::fs::read(path).map_err(|source| RunnerError::BootRom {
                path: path.clone(),
                source,
            })?;
            info!("Using boot ROM {}", path.display());
            GameBoy::with_boot_rom(cart, boot, cfg.core_config())
        }
        None => GameBoy::new(cart, cfg.core_config()),
    };

    let presenter = Presenter::spawn(gb.framebuffer(), PRESENT_POLL);

    let debug = args.debug;
    let on_frame = |gb: &GameBoy| {
        if dump_due(debug, gb.frames()) {
            debug!("frame {}: {}", gb.frames(), gb.cpu.debug_state());
        }
    };
    if cfg.paced {
        gb.run_paced_with(args.frames, on_frame);
    } else {
        while args.frames.is_none_or(|n| gb.frames() < n) {
            gb.run_frame();
            on_frame(&gb);
        }
    }
    info!("Stopped after {} frames: {}", gb.frames(), gb.cpu.debug_state());

    let presented = presenter.finish();
    debug!("Presenter consumed {} frames", presented.frames);

    if let Some(path) = &args.screenshot {
        let frame = presented
            .last
            .unwrap_or_else(|| gb.framebuffer().snapshot());
        screenshot::write_png(path, &frame)?;
        info!("Saved screenshot to {}", path.display());
    }

    // Battery RAM is flushed when `gb` drops.
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
