use crate::interrupt::Interrupts;

/// M-cycles per DIV increment (16384 Hz).
pub const DIV_PERIOD: u16 = 64;

/// M-cycles per TIMA increment for each TAC clock select value.
const TIMA_PERIODS: [u16; 4] = [256, 4, 16, 64];

pub struct Timer {
    /// Divider register (FF04)
    pub div: u8,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    /// M-cycles since the last DIV increment.
    div_counter: u16,
    /// M-cycles since the last TIMA increment while enabled.
    tima_counter: u16,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            div_counter: 0,
            tima_counter: 0,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            // Any write clears the divider instead of storing the value.
            0xFF04 => self.reset_div(),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                if (self.tac ^ val) & 0x03 != 0 {
                    self.tima_counter = 0;
                }
                self.tac = val & 0x07;
            }
            _ => {}
        }
    }

    pub fn reset_div(&mut self) {
        self.div = 0;
        self.div_counter = 0;
    }

    fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    fn tima_period(&self) -> u16 {
        TIMA_PERIODS[(self.tac & 0x03) as usize]
    }

    /// Advance the timer by one M-cycle, requesting the timer interrupt when
    /// TIMA overflows.
    pub fn tick(&mut self, ints: &mut Interrupts) {
        self.div_counter += 1;
        if self.div_counter >= DIV_PERIOD {
            self.div_counter = 0;
            self.div = self.div.wrapping_add(1);
        }

        if !self.enabled() {
            return;
        }

        self.tima_counter += 1;
        if self.tima_counter >= self.tima_period() {
            self.tima_counter = 0;
            let (next, overflow) = self.tima.overflowing_add(1);
            if overflow {
                self.tima = self.tma;
                ints.request_timer();
            } else {
                self.tima = next;
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
