use crate::config::GB_FPS;
use log::debug;
use std::time::{Duration, Instant};

/// How far behind the schedule may fall before it is reset to now.
const RESYNC_FRAMES: u32 = 5;
/// Sleep until this close to the deadline, then spin.
const SPIN_MARGIN: Duration = Duration::from_millis(2);

/// Holds emulation to a fixed frame rate against the wall clock.
pub struct FramePacer {
    frame_time: Duration,
    next: Option<Instant>,
}

impl FramePacer {
    pub fn new(frame_rate: f64) -> Self {
        let rate = if frame_rate.is_finite() && frame_rate > 0.0 {
            frame_rate
        } else {
            GB_FPS
        };
        Self {
            frame_time: Duration::from_nanos((1e9 / rate) as u64),
            next: None,
        }
    }

    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }

    /// Block until the current frame's deadline.
    pub fn wait(&mut self) {
        let deadline = self.schedule(Instant::now());
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            if remaining > SPIN_MARGIN {
                std::thread::sleep(remaining - SPIN_MARGIN);
            } else {
                std::hint::spin_loop();
            }
        }
    }

    /// Deadline to wait for given the current time. Advances the schedule by
    /// one frame, or restarts it from `now` when too far behind.
    fn schedule(&mut self, now: Instant) -> Instant {
        let deadline = *self.next.get_or_insert(now + self.frame_time);
        if now > deadline + self.frame_time * RESYNC_FRAMES {
            debug!(
                "Frame pacer {:?} behind, resyncing",
                now.saturating_duration_since(deadline)
            );
            self.next = Some(now + self.frame_time);
            return now;
        }
        self.next = Some(deadline + self.frame_time);
        deadline
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(GB_FPS)
    }
}
