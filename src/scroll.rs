/*
 *  scroll.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
use std::time::Duration;
use tokio::time::{sleep_until, Instant as TokioInstant};

/// Explicit scroll state, owned by the engine and threaded through the
/// frame function. Offset is the left edge of the card row.
#[derive(Debug, Clone, Copy)]
pub struct ScrollState {
    pub offset_px: i32,
}

impl ScrollState {
    /// A fresh cycle: content parked just past the right edge.
    pub fn new(visible_width: u32) -> Self {
        Self {
            offset_px: visible_width as i32,
        }
    }

    pub fn reset(&mut self, visible_width: u32) {
        self.offset_px = visible_width as i32;
    }

    /// Advance one frame. Wraps once the trailing edge of the whole
    /// composed row has left the visible area, restarting just past
    /// the right edge so re-entry is seamless. Returns whether a wrap
    /// happened.
    pub fn advance(&mut self, speed: u32, content_width: u32, visible_width: u32) -> bool {
        self.offset_px -= speed as i32;
        if self.offset_px + (content_width as i32) < 0 {
            self.offset_px = visible_width as i32;
            true
        } else {
            false
        }
    }
}

/// Fixed-rate frame pacer. Misses are skipped, not burst: a stalled
/// frame shifts the schedule instead of queueing catch-up frames.
pub struct FramePacer {
    next_deadline: TokioInstant,
    frame: Duration,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        let frame = Duration::from_micros(1_000_000u64 / u64::from(target_fps.max(1)));
        Self {
            next_deadline: TokioInstant::now(),
            frame,
        }
    }

    /// Wait for the next frame deadline.
    pub async fn tick(&mut self) {
        let now = TokioInstant::now();
        if self.next_deadline <= now {
            self.next_deadline = now + self.frame;
            return;
        }
        sleep_until(self.next_deadline).await;
        self.next_deadline += self.frame;
    }
}
