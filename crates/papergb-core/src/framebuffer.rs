use std::sync::{Mutex, MutexGuard, PoisonError};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const BYTES_PER_PIXEL: usize = 4;
pub const ROW_BYTES: usize = SCREEN_WIDTH * BYTES_PER_PIXEL;
pub const FRAME_BYTES: usize = ROW_BYTES * SCREEN_HEIGHT;

struct Inner {
    pixels: Vec<u8>,
    /// A complete frame has been written since the last `take_frame`.
    dirty: bool,
}

/// RGBA frame shared between the emulation thread and a presenter.
///
/// The PPU is the only writer: it copies one finished scanline at a time
/// with [`write_row`](Self::write_row) and flags the frame at VBlank. A
/// presenter polls [`take_frame`](Self::take_frame), which copies the pixels
/// out and clears the flag under the same lock.
pub struct SharedFramebuffer {
    inner: Mutex<Inner>,
}

impl SharedFramebuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pixels: vec![0xFF; FRAME_BYTES],
                dirty: false,
            }),
        }
    }

    // Pixel data stays valid even if a holder panicked mid-copy.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy one rendered scanline into row `ly`. Rows outside the screen
    /// are ignored.
    pub fn write_row(&self, ly: usize, row: &[u8; ROW_BYTES]) {
        if ly >= SCREEN_HEIGHT {
            return;
        }
        let start = ly * ROW_BYTES;
        let mut inner = self.lock();
        inner.pixels[start..start + ROW_BYTES].copy_from_slice(row);
    }

    pub fn mark_dirty(&self) {
        self.lock().dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Take the pending frame, if any, clearing the dirty flag.
    pub fn take_frame(&self) -> Option<Vec<u8>> {
        let mut inner = self.lock();
        if !inner.dirty {
            return None;
        }
        inner.dirty = false;
        Some(inner.pixels.clone())
    }

    /// Copy of the current contents regardless of the dirty flag.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().pixels.clone()
    }

    pub fn row(&self, ly: usize) -> Option<Vec<u8>> {
        if ly >= SCREEN_HEIGHT {
            return None;
        }
        let start = ly * ROW_BYTES;
        Some(self.lock().pixels[start..start + ROW_BYTES].to_vec())
    }
}

impl Default for SharedFramebuffer {
    fn default() -> Self {
        Self::new()
    }
}
