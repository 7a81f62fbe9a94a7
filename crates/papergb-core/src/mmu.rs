use crate::{
    apu::Apu,
    cartridge::Cartridge,
    config::VramLock,
    framebuffer::SharedFramebuffer,
    input::Input,
    interrupt::Interrupts,
    ppu::{OAM_SIZE, Ppu},
    timer::Timer,
};
use log::{debug, error};
use std::sync::Arc;

const WRAM_BANK_SIZE: usize = 0x1000;

/// Dots the PPU advances per M-cycle.
pub const DOTS_PER_M_CYCLE: u32 = 4;

pub struct Mmu {
    pub wram: [[u8; WRAM_BANK_SIZE]; 2],
    pub hram: [u8; 0x7F],
    pub cart: Option<Cartridge>,
    pub boot_rom: Option<Vec<u8>>,
    pub boot_mapped: bool,
    pub interrupts: Interrupts,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub input: Input,
    /// M-cycles elapsed since power on.
    pub cycles: u64,
}

impl Mmu {
    /// Bus in the state the DMG boot ROM leaves behind.
    pub fn new(framebuffer: Arc<SharedFramebuffer>, vram_lock: VramLock) -> Self {
        let mut mmu = Self::new_power_on(framebuffer, vram_lock);
        mmu.ppu.apply_boot_state();
        mmu.interrupts.flag = 0x01;
        mmu
    }

    /// Bus with the LCD off and registers cleared, for running a boot ROM.
    pub fn new_power_on(framebuffer: Arc<SharedFramebuffer>, vram_lock: VramLock) -> Self {
        Self {
            wram: [[0; WRAM_BANK_SIZE]; 2],
            hram: [0; 0x7F],
            cart: None,
            boot_rom: None,
            boot_mapped: false,
            interrupts: Interrupts::new(),
            ppu: Ppu::new(framebuffer, vram_lock),
            apu: Apu::new(),
            timer: Timer::new(),
            input: Input::new(),
            cycles: 0,
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn save_cart_ram(&mut self) {
        if let Some(cart) = &mut self.cart
            && let Err(e) = cart.save()
        {
            error!("Failed to save RAM: {e}");
        }
    }

    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.boot_rom = Some(data);
        self.boot_mapped = true;
    }

    /// One M-cycle of every clocked component. PPU first, then the timer.
    pub fn tick(&mut self) {
        for _ in 0..DOTS_PER_M_CYCLE {
            self.ppu.tick(&mut self.interrupts);
        }
        self.timer.tick(&mut self.interrupts);
        self.cycles += 1;
    }

    /// Timed read: clocks the system for one M-cycle, then decodes.
    pub fn read_byte(&mut self, addr: u16) -> u8 {
        self.tick();
        self.peek_byte(addr)
    }

    /// Timed write: clocks the system for one M-cycle, then decodes.
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        self.tick();
        self.poke_byte(addr, val);
    }

    /// Read without advancing time. PPU locks still apply.
    pub fn peek_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x00FF if self.boot_mapped => self
                .boot_rom
                .as_ref()
                .and_then(|b| b.get(addr as usize))
                .copied()
                .unwrap_or(0xFF),
            0x0000..=0x7FFF => self.cart.as_ref().map(|c| c.read_rom(addr)).unwrap_or(0xFF),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self.cart.as_ref().map(|c| c.read_ram(addr)).unwrap_or(0xFF),
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize],
            0xD000..=0xDFFF => self.wram[1][(addr - 0xD000) as usize],
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFF00 => self.input.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.interrupts.read_flag(),
            0xFF10..=0xFF26 | 0xFF30..=0xFF3F => self.apu.read_reg(addr),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.interrupts.enable,
            _ => {
                debug!("Read from unmapped address {addr:04X}");
                0xFF
            }
        }
    }

    /// Write without advancing time.
    pub fn poke_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_rom(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_ram(addr, val);
                }
            }
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize] = val,
            0xD000..=0xDFFF => self.wram[1][(addr - 0xD000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFF00 => self.input.write(val),
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            0xFF0F => self.interrupts.write_flag(val),
            0xFF10..=0xFF26 | 0xFF30..=0xFF3F => self.apu.write_reg(addr, val),
            0xFF46 => self.oam_dma(val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF50 => {
                if val != 0 && self.boot_mapped {
                    debug!("Boot ROM unmapped");
                    self.boot_mapped = false;
                }
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.interrupts.enable = val,
            _ => debug!("Write {val:02X} to unmapped address {addr:04X}"),
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM as one block.
    fn oam_dma(&mut self, page: u8) {
        self.ppu.write_reg(0xFF46, page);
        let src = (page as u16) << 8;
        for i in 0..OAM_SIZE {
            let byte = self.peek_byte(src.wrapping_add(i as u16));
            self.ppu.dma_write_oam(i, byte);
        }
    }

    pub fn set_vram_lock(&mut self, lock: VramLock) {
        self.ppu.set_vram_lock(lock);
    }
}
