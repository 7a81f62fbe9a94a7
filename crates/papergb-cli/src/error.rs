use papergb_core::cartridge::CartridgeError;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),

    #[error("failed to read boot ROM {}: {source}", .path.display())]
    BootRom {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write screenshot {}: {source}", .path.display())]
    Screenshot {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
}
