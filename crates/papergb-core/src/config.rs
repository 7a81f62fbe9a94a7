/// Nominal DMG refresh rate.
pub const GB_FPS: f64 = 59.7275;

/// Frames between periodic battery saves (about one minute).
pub const DEFAULT_SAVE_INTERVAL_FRAMES: u64 = 3600;

/// How VRAM behaves while the PPU is drawing a line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VramLock {
    /// Reads return 0xFF and writes are dropped, as on hardware.
    #[default]
    Strict,
    /// Reads are still blocked but writes land. Some homebrew that races
    /// the LCD renders with fewer broken tiles this way.
    Relaxed,
}

impl VramLock {
    #[inline]
    pub fn blocks_writes(self) -> bool {
        matches!(self, VramLock::Strict)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    pub vram_lock: VramLock,
    /// Zero disables periodic saves; RAM is still flushed on disable and
    /// on drop.
    pub save_interval_frames: u64,
    pub frame_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vram_lock: VramLock::Strict,
            save_interval_frames: DEFAULT_SAVE_INTERVAL_FRAMES,
            frame_rate: GB_FPS,
        }
    }
}
