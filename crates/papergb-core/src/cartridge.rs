use log::{debug, error, info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const MBC2_RAM_SIZE: usize = 0x200;
const HEADER_END: usize = 0x0150;

#[derive(Error, Debug)]
pub enum CartridgeError {
    #[error("failed to read ROM {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ROM image is {0} bytes, too small to hold a cartridge header")]
    TooSmall(usize),

    #[error("header checksum mismatch: header has {expected:#04X}, computed {computed:#04X}")]
    HeaderChecksum { expected: u8, computed: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    battery: bool,
    save_path: Option<PathBuf>,
    ram_dirty: bool,
    mbc_state: MbcState,
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        rom_bank: u8,
        /// Two-bit secondary register (0x4000-0x5FFF).
        secondary: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        /// 0x00-0x03 select a RAM bank, 0x08-0x0C an RTC register.
        ram_bank: u8,
        ram_enable: bool,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
    },
}

/// Rolling header checksum over 0x0134-0x014C, as verified by the boot ROM.
pub fn header_checksum(data: &[u8]) -> u8 {
    data.get(0x0134..=0x014C)
        .unwrap_or(&[])
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

impl Cartridge {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cart = Self::from_bytes(data)?;

        if cart.battery {
            let save = path.with_extension("sav");
            match fs::read(&save) {
                Ok(bytes) => {
                    for (d, s) in cart.ram.iter_mut().zip(bytes.iter()) {
                        *d = *s;
                    }
                    info!("Loaded save RAM from {}", save.display());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Ignoring unreadable save {}: {e}", save.display()),
            }
            cart.save_path = Some(save);
        }

        Ok(cart)
    }

    /// Parse and validate an in-memory ROM image. No save file is attached.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_END {
            return Err(CartridgeError::TooSmall(data.len()));
        }
        let header = Header::parse(&data);
        let expected = header.checksum();
        let computed = header_checksum(&data);
        if expected != computed {
            return Err(CartridgeError::HeaderChecksum { expected, computed });
        }

        let mbc = header.mbc_type();
        let ram_size = match mbc {
            MbcType::Mbc2 => MBC2_RAM_SIZE,
            _ => header.ram_size(),
        };
        let battery = header.has_battery();
        let title = header.title();

        let mbc_state = match mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                secondary: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcType::Mbc2 => MbcState::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
            MbcType::Mbc5 => MbcState::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
        };

        info!(
            "Loaded ROM: {} (MBC: {:?}, RAM: {} bytes, battery: {})",
            title,
            mbc,
            ram_size,
            if battery { "yes" } else { "no" }
        );

        Ok(Self {
            rom: data,
            ram: vec![0; ram_size],
            mbc,
            title,
            battery,
            save_path: None,
            ram_dirty: false,
            mbc_state,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn has_battery(&self) -> bool {
        self.battery
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// RAM has been written since the last successful save.
    pub fn is_ram_dirty(&self) -> bool {
        self.ram_dirty
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn rom_byte(&self, bank: usize, addr: u16) -> u8 {
        let offset = bank * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1));
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let banks = self.rom_bank_count();
        let bank = match (&self.mbc_state, addr) {
            (_, 0x8000..=0xFFFF) => return 0xFF,
            (MbcState::NoMbc, _) => return self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            (
                MbcState::Mbc1 {
                    secondary, mode, ..
                },
                0x0000..=0x3FFF,
            ) => {
                if *mode == 0 {
                    0
                } else {
                    ((*secondary as usize) << 5) % banks
                }
            }
            (
                MbcState::Mbc1 {
                    rom_bank,
                    secondary,
                    ..
                },
                _,
            ) => (((*secondary as usize) << 5) | *rom_bank as usize) % banks,
            (_, 0x0000..=0x3FFF) => 0,
            (MbcState::Mbc2 { rom_bank, .. }, _) | (MbcState::Mbc3 { rom_bank, .. }, _) => {
                *rom_bank as usize % banks
            }
            (MbcState::Mbc5 { rom_bank, .. }, _) => *rom_bank as usize % banks,
        };
        self.rom_byte(bank, addr)
    }

    /// Writes to the ROM range never modify ROM: they program the mapper.
    pub fn write_rom(&mut self, addr: u16, val: u8) {
        let mut disabled_ram = false;
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, _) => {
                debug!("Ignoring ROM write {val:02X} to {addr:04X} on cartridge without MBC");
            }
            (
                MbcState::Mbc1 { ram_enable, .. }
                | MbcState::Mbc3 { ram_enable, .. }
                | MbcState::Mbc5 { ram_enable, .. },
                0x0000..=0x1FFF,
            ) => {
                let enable = val & 0x0F == 0x0A;
                disabled_ram = *ram_enable && !enable;
                *ram_enable = enable;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc1 { secondary, .. }, 0x4000..=0x5FFF) => {
                *secondary = val & 0x03;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (
                MbcState::Mbc2 {
                    rom_bank,
                    ram_enable,
                },
                0x0000..=0x3FFF,
            ) => {
                // Address bit 8 selects between RAMG (clear) and ROMB (set)
                // across the whole 0x0000-0x3FFF range.
                if addr & 0x0100 == 0 {
                    let enable = val & 0x0F == 0x0A;
                    disabled_ram = *ram_enable && !enable;
                    *ram_enable = enable;
                } else {
                    *rom_bank = val & 0x0F;
                    if *rom_bank == 0 {
                        *rom_bank = 1;
                    }
                }
            }
            (MbcState::Mbc2 { .. }, _) => {}
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = match val {
                    0x00..=0x03 | 0x08..=0x0C => val,
                    _ => {
                        warn!("MBC3 RAM bank {val:02X} out of range, clamping to 3");
                        0x03
                    }
                };
            }
            // RTC latch: accepted, the clock itself is not emulated.
            (MbcState::Mbc3 { .. }, _) => {}
            (MbcState::Mbc5 { rom_bank, .. }, 0x2000..=0x2FFF) => {
                *rom_bank = (*rom_bank & 0x100) | val as u16;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x3000..=0x3FFF) => {
                *rom_bank = (*rom_bank & 0xFF) | (((val & 0x01) as u16) << 8);
            }
            (MbcState::Mbc5 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }
            _ => {}
        }

        if disabled_ram {
            self.flush();
        }
    }

    /// Offset into `ram` for a 0xA000-0xBFFF access, or `None` when the
    /// access is not backed by RAM in the current mapper state.
    fn ram_offset(&self, addr: u16) -> Option<usize> {
        if self.ram.is_empty() {
            return None;
        }
        let local = addr as usize - 0xA000;
        let bank = match &self.mbc_state {
            MbcState::NoMbc => 0,
            MbcState::Mbc1 {
                secondary,
                mode,
                ram_enable,
                ..
            } => {
                if !*ram_enable {
                    return None;
                }
                if *mode == 1 { *secondary as usize } else { 0 }
            }
            MbcState::Mbc2 { ram_enable, .. } => {
                if !*ram_enable {
                    return None;
                }
                return Some(local & (MBC2_RAM_SIZE - 1));
            }
            MbcState::Mbc3 {
                ram_bank,
                ram_enable,
                ..
            } => {
                if !*ram_enable || *ram_bank > 0x03 {
                    return None;
                }
                *ram_bank as usize
            }
            MbcState::Mbc5 {
                ram_bank,
                ram_enable,
                ..
            } => {
                if !*ram_enable {
                    return None;
                }
                *ram_bank as usize
            }
        };
        Some((bank * RAM_BANK_SIZE + local) % self.ram.len())
    }

    fn rtc_selected(&self) -> bool {
        matches!(
            self.mbc_state,
            MbcState::Mbc3 {
                ram_bank: 0x08..=0x0C,
                ram_enable: true,
                ..
            }
        )
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        if !(0xA000..=0xBFFF).contains(&addr) {
            return 0xFF;
        }
        if self.rtc_selected() {
            // RTC registers are not emulated.
            return 0x00;
        }
        match self.ram_offset(addr) {
            Some(idx) if self.mbc == MbcType::Mbc2 => 0xF0 | (self.ram[idx] & 0x0F),
            Some(idx) => self.ram[idx],
            None => {
                debug!("Cartridge RAM read at {addr:04X} while unavailable");
                0xFF
            }
        }
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if !(0xA000..=0xBFFF).contains(&addr) || self.rtc_selected() {
            return;
        }
        match self.ram_offset(addr) {
            Some(idx) => {
                self.ram[idx] = if self.mbc == MbcType::Mbc2 {
                    val & 0x0F
                } else {
                    val
                };
                self.ram_dirty = true;
            }
            None => debug!("Dropping cartridge RAM write {val:02X} at {addr:04X}"),
        }
    }

    /// Write the full RAM image to the save file. A no-op for cartridges
    /// without a battery, save path or RAM.
    pub fn save(&mut self) -> io::Result<()> {
        if let (true, Some(path)) = (self.battery, &self.save_path)
            && !self.ram.is_empty()
        {
            fs::write(path, &self.ram)?;
            self.ram_dirty = false;
        }
        Ok(())
    }

    /// `save` with errors logged instead of returned.
    pub fn flush(&mut self) {
        if let Err(e) = self.save() {
            error!("Failed to write save RAM: {e}");
        }
    }
}

impl Drop for Cartridge {
    fn drop(&mut self) {
        if self.ram_dirty {
            self.flush();
        }
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn title(&self) -> String {
        let end = 0x0144.min(self.data.len());
        let mut slice = &self.data[0x0134.min(end)..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cart_type(&self) -> u8 {
        self.data.get(0x0147).copied().unwrap_or(0)
    }

    fn checksum(&self) -> u8 {
        self.data.get(0x014D).copied().unwrap_or(0)
    }

    fn mbc_type(&self) -> MbcType {
        match self.cart_type() {
            0x00 | 0x08 | 0x09 => MbcType::NoMbc,
            0x01..=0x03 => MbcType::Mbc1,
            0x05 | 0x06 => MbcType::Mbc2,
            0x0F..=0x13 => MbcType::Mbc3,
            0x19..=0x1E => MbcType::Mbc5,
            other => {
                warn!("Unsupported cartridge type {other:02X}, treating as ROM only");
                MbcType::NoMbc
            }
        }
    }

    fn has_battery(&self) -> bool {
        matches!(
            self.cart_type(),
            0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
        )
    }

    fn ram_size(&self) -> usize {
        match self.data.get(0x0149).copied().unwrap_or(0) {
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        }
    }
}
