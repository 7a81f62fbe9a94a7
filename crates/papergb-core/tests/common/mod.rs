#![allow(dead_code)]

use papergb_core::{
    cartridge::{Cartridge, header_checksum},
    config::VramLock,
    cpu::Cpu,
    framebuffer::SharedFramebuffer,
    mmu::Mmu,
};
use std::sync::Arc;

pub const PROGRAM_BASE: u16 = 0xC000;
pub const STACK_TOP: u16 = 0xDFF0;
pub const SCRATCH: u16 = 0xC100;

/// ROM image with a valid header. Each bank's first byte holds its number
/// so bank switching is observable.
pub fn rom(cart_type: u8, ram_code: u8, banks: usize) -> Vec<u8> {
    let mut data = vec![0u8; banks.max(2) * 0x4000];
    for bank in 0..banks.max(2) {
        data[bank * 0x4000] = bank as u8;
        data[bank * 0x4000 + 1] = (bank >> 8) as u8;
    }
    data[0x0134..0x013C].copy_from_slice(b"PAPERGB!");
    data[0x0147] = cart_type;
    data[0x0149] = ram_code;
    data[0x014D] = header_checksum(&data);
    data
}

pub fn cart(cart_type: u8, ram_code: u8, banks: usize) -> Cartridge {
    Cartridge::from_bytes(rom(cart_type, ram_code, banks)).unwrap()
}

/// Post-boot bus with interrupts masked and the request flags cleared.
pub fn quiet_bus() -> Mmu {
    let mut mmu = Mmu::new(Arc::new(SharedFramebuffer::new()), VramLock::Strict);
    mmu.interrupts.flag = 0;
    mmu.interrupts.enable = 0;
    mmu
}

/// CPU and bus with `program` copied to WRAM and PC pointing at it.
pub fn machine(program: &[u8]) -> (Cpu, Mmu) {
    let mut mmu = quiet_bus();
    for (i, byte) in program.iter().enumerate() {
        mmu.poke_byte(PROGRAM_BASE + i as u16, *byte);
    }
    let mut cpu = Cpu::new();
    cpu.regs.pc = PROGRAM_BASE;
    cpu.regs.sp = STACK_TOP;
    cpu.regs.set_hl(SCRATCH);
    (cpu, mmu)
}

/// M-cycles taken by one `step`.
pub fn step_cycles(cpu: &mut Cpu, mmu: &mut Mmu) -> u64 {
    let before = mmu.cycles;
    cpu.step(mmu);
    mmu.cycles - before
}
