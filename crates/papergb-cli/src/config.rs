use log::warn;
use papergb_core::config::{Config, DEFAULT_SAVE_INTERVAL_FRAMES, VramLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VramLockMode {
    #[default]
    Strict,
    Relaxed,
}

impl From<VramLockMode> for VramLock {
    fn from(mode: VramLockMode) -> Self {
        match mode {
            VramLockMode::Strict => VramLock::Strict,
            VramLockMode::Relaxed => VramLock::Relaxed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub save_interval_frames: u64,
    pub vram_lock: VramLockMode,
    pub paced: bool,
    pub boot_rom: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            save_interval_frames: DEFAULT_SAVE_INTERVAL_FRAMES,
            vram_lock: VramLockMode::Strict,
            paced: true,
            boot_rom: None,
        }
    }
}

impl RunnerConfig {
    pub fn core_config(&self) -> Config {
        Config {
            vram_lock: self.vram_lock.into(),
            save_interval_frames: self.save_interval_frames,
            ..Config::default()
        }
    }
}

pub fn load_from_file(path: &Path) -> RunnerConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return RunnerConfig::default(),
    };

    match toml::from_str::<RunnerConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            RunnerConfig::default()
        }
    }
}
