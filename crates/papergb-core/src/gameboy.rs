use crate::{
    cartridge::Cartridge,
    config::Config,
    cpu::Cpu,
    framebuffer::SharedFramebuffer,
    input::JoypadState,
    interrupt::Interrupt,
    mmu::Mmu,
    pacer::FramePacer,
};
use std::sync::Arc;

/// M-cycles in one full frame (154 lines of 456 dots).
pub const CYCLES_PER_FRAME: u64 = 154 * 456 / 4;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    config: Config,
    framebuffer: Arc<SharedFramebuffer>,
    pacer: FramePacer,
    frames: u64,
}

impl GameBoy {
    /// Start at the cartridge entry point with the registers the boot ROM
    /// would have left.
    pub fn new(cart: Cartridge, config: Config) -> Self {
        let framebuffer = Arc::new(SharedFramebuffer::new());
        let mut mmu = Mmu::new(Arc::clone(&framebuffer), config.vram_lock);
        mmu.load_cart(cart);
        Self {
            cpu: Cpu::new(),
            mmu,
            config,
            framebuffer,
            pacer: FramePacer::new(config.frame_rate),
            frames: 0,
        }
    }

    /// Start from power-on with `boot` mapped over 0x0000-0x00FF until it
    /// writes FF50.
    pub fn with_boot_rom(cart: Cartridge, boot: Vec<u8>, config: Config) -> Self {
        let framebuffer = Arc::new(SharedFramebuffer::new());
        let mut mmu = Mmu::new_power_on(Arc::clone(&framebuffer), config.vram_lock);
        mmu.load_cart(cart);
        mmu.load_boot_rom(boot);
        Self {
            cpu: Cpu::new_power_on(),
            mmu,
            config,
            framebuffer,
            pacer: FramePacer::new(config.frame_rate),
            frames: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Frames completed by [`GameBoy::run_frame`].
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn step(&mut self) {
        self.cpu.step(&mut self.mmu);
    }

    /// Run until the PPU enters VBlank. With the LCD off no frame is ever
    /// produced, so the loop gives up after one frame's worth of cycles.
    pub fn run_frame(&mut self) {
        let start = self.mmu.cycles;
        while !self.mmu.ppu.frame_ready() {
            if !self.mmu.ppu.lcd_enabled() && self.mmu.cycles - start >= CYCLES_PER_FRAME {
                break;
            }
            self.step();
        }
        self.mmu.ppu.clear_frame_flag();
        self.frames += 1;

        let interval = self.config.save_interval_frames;
        if interval != 0
            && self.frames % interval == 0
            && self.mmu.cart.as_ref().is_some_and(|c| c.is_ram_dirty())
        {
            self.mmu.save_cart_ram();
        }
    }

    /// Run at the configured frame rate, forever or for `frames` frames.
    pub fn run_paced(&mut self, frames: Option<u64>) {
        self.run_paced_with(frames, |_| {});
    }

    /// Like [`GameBoy::run_paced`], calling `on_frame` after each frame
    /// completes and before the pacer waits.
    pub fn run_paced_with<F>(&mut self, frames: Option<u64>, mut on_frame: F)
    where
        F: FnMut(&GameBoy),
    {
        let mut done = 0u64;
        while frames.is_none_or(|n| done < n) {
            self.run_frame();
            on_frame(&*self);
            self.pacer.wait();
            done += 1;
        }
    }

    pub fn request_interrupt(&mut self, source: Interrupt) {
        self.mmu.interrupts.request(source);
    }

    pub fn request_vblank(&mut self) {
        self.mmu.interrupts.request_vblank();
    }

    pub fn request_stat(&mut self) {
        self.mmu.interrupts.request_stat();
    }

    pub fn request_timer(&mut self) {
        self.mmu.interrupts.request_timer();
    }

    pub fn request_serial(&mut self) {
        self.mmu.interrupts.request_serial();
    }

    pub fn request_joypad(&mut self) {
        self.mmu.interrupts.request_joypad();
    }

    /// Handle for a presenter thread.
    pub fn framebuffer(&self) -> Arc<SharedFramebuffer> {
        Arc::clone(&self.framebuffer)
    }

    pub fn set_buttons(&mut self, state: JoypadState) {
        self.mmu.input.update_state(state, &mut self.mmu.interrupts);
    }

    pub fn save(&mut self) {
        self.mmu.save_cart_ram();
    }

    /// Reset to the post-boot state while preserving the loaded cartridge.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        self.cpu = Cpu::new();
        self.mmu = Mmu::new(Arc::clone(&self.framebuffer), self.config.vram_lock);
        if let Some(c) = cart {
            self.mmu.load_cart(c);
        }
        self.frames = 0;
    }
}
