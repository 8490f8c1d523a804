use std::collections::VecDeque;

use tokio::time::Instant;

/// Outbound frames waiting for their 20ms slot.
#[derive(Debug, Default)]
pub(crate) struct PlaybackQueue {
    frames: VecDeque<Vec<u8>>,
    not_before: Option<Instant>,
}

impl PlaybackQueue {
    pub(crate) fn enqueue(&mut self, frames: Vec<Vec<u8>>) {
        self.frames.extend(frames);
    }

    /// Holds playback back until `at`.
    pub(crate) fn delay_until(&mut self, at: Instant) {
        self.not_before = Some(at);
    }

    /// Next frame due at `now`, if any.
    pub(crate) fn next_frame(&mut self, now: Instant) -> Option<Vec<u8>> {
        if let Some(at) = self.not_before {
            if now < at {
                return None;
            }
            self.not_before = None;
        }
        self.frames.pop_front()
    }

    pub(crate) fn cancel(&mut self) -> usize {
        let pending = self.frames.len();
        self.frames.clear();
        self.not_before = None;
        pending
    }
}
