// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame-time watchdog.
//!
//! Measures the wall-clock delta between successive visual-update ticks. Slow
//! ticks increment a dropped-tick counter, fast ones decay it by one, so short
//! pauses heal on their own while a sustained stall raises a frame-drop burst.

use crate::metrics::RingBuffer;
use ballast_core::config::WatchdogConfig;

/// Number of recent tick deltas kept for smoothing.
pub const DELTA_HISTORY: usize = 20;

/// Tracks tick cadence and detects sustained frame drops.
#[derive(Debug, Clone)]
pub struct FrameWatchdog {
    config: WatchdogConfig,
    dropped: u32,
    last_tick_ms: Option<u64>,
    suspended: bool,
    burst_raised: bool,
    deltas: RingBuffer<f32, DELTA_HISTORY>,
}

impl FrameWatchdog {
    /// Creates an active watchdog with an empty counter.
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            dropped: 0,
            last_tick_ms: None,
            suspended: false,
            burst_raised: false,
            deltas: RingBuffer::new(),
        }
    }

    /// Records a visual-update tick.
    ///
    /// Returns `true` exactly once per burst, on the tick that brings the
    /// dropped-tick counter up to the burst threshold. The counter must decay
    /// back to zero before another burst can be raised.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.suspended {
            return false;
        }

        let Some(last) = self.last_tick_ms.replace(now_ms) else {
            return false;
        };
        let delta = now_ms.saturating_sub(last);
        self.deltas.push(delta as f32);

        if delta > self.config.drop_threshold_ms {
            self.dropped = self.dropped.saturating_add(1);
        } else {
            self.dropped = self.dropped.saturating_sub(1);
            if self.dropped == 0 {
                self.burst_raised = false;
            }
        }

        if !self.burst_raised && self.dropped >= self.config.burst_threshold {
            self.burst_raised = true;
            log::warn!(
                "FrameWatchdog: {} dropped ticks (last delta {} ms), raising frame-drop burst.",
                self.dropped,
                delta
            );
            return true;
        }

        log::trace!("FrameWatchdog: delta {} ms, dropped {}.", delta, self.dropped);
        false
    }

    /// Stops counting while the process is backgrounded.
    pub fn suspend(&mut self) {
        if !self.suspended {
            log::debug!("FrameWatchdog: suspended.");
        }
        self.suspended = true;
    }

    /// Resumes counting with a fresh counter.
    pub fn resume(&mut self) {
        self.reset();
        if self.suspended {
            log::debug!("FrameWatchdog: resumed.");
        }
        self.suspended = false;
    }

    /// Clears the counter, the last tick, and the delta history.
    pub fn reset(&mut self) {
        self.dropped = 0;
        self.last_tick_ms = None;
        self.burst_raised = false;
        self.deltas.clear();
    }

    /// Current dropped-tick counter.
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }

    /// Mean of the recent tick deltas, in milliseconds.
    pub fn smoothed_delta_ms(&self) -> f32 {
        self.deltas.average()
    }

    /// Returns `true` while suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The active configuration.
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Whether frame timing alone indicates stress.
    ///
    /// True when the counter has reached half the burst threshold or the
    /// smoothed delta exceeds the drop threshold.
    pub fn is_straining(&self) -> bool {
        self.dropped.saturating_mul(2) >= self.config.burst_threshold
            || self.smoothed_delta_ms() > self.config.drop_threshold_ms as f32
    }
}
