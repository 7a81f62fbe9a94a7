//! Sound registers without synthesis.
//!
//! Games poll and program NR10-NR52 and wave RAM, so the registers need to
//! hold their values and read back with the hardware's unused bits set. No
//! channel is ever clocked and NR52 never reports a channel as active.

pub struct Apu {
    /// FF10-FF26
    regs: [u8; 0x17],
    /// FF30-FF3F
    wave_ram: [u8; 0x10],
}

impl Apu {
    pub fn new() -> Self {
        let mut apu = Self {
            regs: [0; 0x17],
            wave_ram: [0; 0x10],
        };
        // Post-boot NR50/NR51/NR52.
        apu.regs[0x14] = 0x77;
        apu.regs[0x15] = 0xF3;
        apu.regs[0x16] = 0x80;
        apu
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 | 0xFF16 => 0x3F,
            0xFF13 | 0xFF18 | 0xFF1B | 0xFF1D | 0xFF20 => 0xFF,
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1C => 0x9F,
            0xFF26 => 0x70,
            0xFF15 | 0xFF1F => 0xFF,
            _ => 0x00,
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF10..=0xFF26 => {
                let val = self.regs[(addr - 0xFF10) as usize];
                // Channel status bits are read-only and always clear here.
                let val = if addr == 0xFF26 { val & 0x80 } else { val };
                val | Self::read_mask(addr)
            }
            0xFF30..=0xFF3F => self.wave_ram[(addr - 0xFF30) as usize],
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF26 => {
                self.regs[0x16] = val & 0x80;
                if val & 0x80 == 0 {
                    // Powering off clears every register except NR52.
                    self.regs[..0x16].fill(0);
                }
            }
            0xFF10..=0xFF25 => {
                if self.regs[0x16] & 0x80 != 0 {
                    self.regs[(addr - 0xFF10) as usize] = val;
                }
            }
            0xFF30..=0xFF3F => self.wave_ram[(addr - 0xFF30) as usize] = val,
            _ => {}
        }
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
