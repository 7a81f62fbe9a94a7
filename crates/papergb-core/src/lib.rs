//! Cycle-accurate DMG emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/bus/PPU/timer
//! and cartridge mappers). Frontends live in separate crates and drive the
//! core via the [`gameboy`] facade, reading frames out of the
//! [`framebuffer::SharedFramebuffer`].

/// Sound register file. Registers are stored but nothing is synthesized.
pub mod apu;

/// Cartridge mappers (MBC) and ROM/RAM handling.
pub mod cartridge;

/// Runtime options shared by every frontend.
pub mod config;

/// SM83 CPU core.
pub mod cpu;

/// RGBA frame handoff between the PPU and a presenter thread.
pub mod framebuffer;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Joypad input register.
pub mod input;

/// Interrupt enable/request masks.
pub mod interrupt;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Wall-clock frame scheduling.
pub mod pacer;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// CPU register file.
pub mod registers;

/// Divider/timer unit.
pub mod timer;
