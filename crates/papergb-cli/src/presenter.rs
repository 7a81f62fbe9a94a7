use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error};
use papergb_core::framebuffer::SharedFramebuffer;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// What the presenter consumed before it was stopped.
#[derive(Debug, Default)]
pub struct Presented {
    pub frames: u64,
    pub last: Option<Vec<u8>>,
}

/// Headless consumer of the shared framebuffer. Polls for finished frames
/// until told to stop.
pub struct Presenter {
    stop: Sender<()>,
    handle: JoinHandle<Presented>,
}

impl Presenter {
    pub fn spawn(framebuffer: Arc<SharedFramebuffer>, poll: Duration) -> Self {
        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let handle = thread::spawn(move || present_loop(&framebuffer, &stop_rx, poll));
        Self { stop, handle }
    }

    pub fn finish(self) -> Presented {
        // Fails only if the loop already exited.
        self.stop.send(()).ok();
        self.handle.join().unwrap_or_else(|_| {
            error!("Presenter thread panicked");
            Presented::default()
        })
    }
}

fn present_loop(fb: &SharedFramebuffer, stop: &Receiver<()>, poll: Duration) -> Presented {
    let mut out = Presented::default();
    loop {
        match stop.recv_timeout(poll) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Some(frame) = fb.take_frame() {
            out.frames += 1;
            out.last = Some(frame);
        }
    }
    // Pick up a frame finished after the last poll.
    if let Some(frame) = fb.take_frame() {
        out.frames += 1;
        out.last = Some(frame);
    }
    debug!("Presenter stopped after {} frames", out.frames);
    out
}
