//! Interrupt enable (IE, `0xFFFF`) and request (IF, `0xFF0F`) masks.
//!
//! | Bit | Source | Vector |
//! |-----|--------|--------|
//! | 0   | VBlank | `0x40` |
//! | 1   | STAT   | `0x48` |
//! | 2   | Timer  | `0x50` |
//! | 3   | Serial | `0x58` |
//! | 4   | Joypad | `0x60` |
//!
//! Lower bits have higher priority. The master enable flag (IME) lives in
//! the CPU since only instructions change it.

/// Mask of the five implemented interrupt lines.
pub const INTERRUPT_MASK: u8 = 0x1F;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    Stat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// All sources in priority order.
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::Stat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::Stat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::Stat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interrupts {
    /// IF register
    pub flag: u8,
    /// IE register
    pub enable: u8,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request bit for `source`. Requesting an already pending
    /// interrupt is a no-op.
    #[inline]
    pub fn request(&mut self, source: Interrupt) {
        self.flag |= source.bit();
    }

    pub fn request_vblank(&mut self) {
        self.request(Interrupt::VBlank);
    }

    pub fn request_stat(&mut self) {
        self.request(Interrupt::Stat);
    }

    pub fn request_timer(&mut self) {
        self.request(Interrupt::Timer);
    }

    pub fn request_serial(&mut self) {
        self.request(Interrupt::Serial);
    }

    pub fn request_joypad(&mut self) {
        self.request(Interrupt::Joypad);
    }

    pub fn is_requested(&self, source: Interrupt) -> bool {
        self.flag & source.bit() != 0
    }

    /// Requested and enabled lines.
    #[inline]
    pub fn pending(&self) -> u8 {
        self.flag & self.enable & INTERRUPT_MASK
    }

    /// The highest priority source that is both requested and enabled.
    pub fn highest_priority(&self) -> Option<Interrupt> {
        let pending = self.pending();
        Interrupt::ALL
            .into_iter()
            .find(|source| pending & source.bit() != 0)
    }

    /// Clear the request bit of a serviced interrupt.
    #[inline]
    pub fn acknowledge(&mut self, source: Interrupt) {
        self.flag &= !source.bit();
    }

    /// IF as seen from the bus: the upper three bits read back set.
    pub fn read_flag(&self) -> u8 {
        self.flag | 0xE0
    }

    pub fn write_flag(&mut self, val: u8) {
        self.flag = val & INTERRUPT_MASK;
    }
}
