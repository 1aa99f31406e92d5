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

//! The Pressure Monitor.
//!
//! A recurring sampler that turns memory readings into [`PressureSample`]s.
//! When the host offers no memory signal it falls back to the frame-time
//! heuristic of the [`FrameWatchdog`], which never reports Critical.

use crate::metrics::RingBuffer;
use crate::watchdog::FrameWatchdog;
use ballast_core::config::PressureConfig;
use ballast_core::pressure::{MemoryProbe, PressureLevel, PressureSample, SampleSource};
use ballast_core::profile::DeviceProfile;

/// Number of recent usage ratios kept for trend smoothing.
pub const RATIO_HISTORY: usize = 20;

/// Trend above which rising pressure is logged.
const RISING_TREND: f32 = 0.05;

/// The result of one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureUpdate {
    /// The new sample.
    pub sample: PressureSample,
    /// Level of the previous sample (Normal before the first one).
    pub previous: PressureLevel,
    /// `true` when the level differs from the previous sample's.
    pub level_changed: bool,
}

/// Recurring memory-pressure sampler.
pub struct PressureMonitor {
    config: PressureConfig,
    probe: Box<dyn MemoryProbe>,
    budget_bytes: u64,
    interval_ms: u64,
    next_due_ms: Option<u64>,
    latest: Option<PressureSample>,
    consecutive_misses: u32,
    ratios: RingBuffer<f32, RATIO_HISTORY>,
}

impl PressureMonitor {
    /// Creates a monitor whose interval and default budget follow `profile`.
    pub fn new(config: PressureConfig, profile: &DeviceProfile, probe: Box<dyn MemoryProbe>) -> Self {
        let interval_ms = config.interval_for(profile.platform_class);
        log::info!(
            "PressureMonitor: sampling every {} ms against a {} MiB budget.",
            interval_ms,
            profile.memory_budget_bytes / (1024 * 1024)
        );
        Self {
            config,
            probe,
            budget_bytes: profile.memory_budget_bytes,
            interval_ms,
            next_due_ms: None,
            latest: None,
            consecutive_misses: 0,
            ratios: RingBuffer::new(),
        }
    }

    /// Samples if the interval has elapsed. The first poll always samples.
    pub fn poll(&mut self, now_ms: u64, watchdog: &FrameWatchdog) -> Option<PressureUpdate> {
        if self.next_due_ms.is_some_and(|due| now_ms < due) {
            return None;
        }
        self.next_due_ms = Some(now_ms.saturating_add(self.interval_ms));
        self.sample_now(now_ms, watchdog)
    }

    /// Takes one sample immediately, regardless of the schedule.
    ///
    /// Returns `None` for a missed sample that did not yet force a defensive
    /// Warning.
    pub fn sample_now(&mut self, now_ms: u64, watchdog: &FrameWatchdog) -> Option<PressureUpdate> {
        // Samples are delivered in non-decreasing timestamp order.
        let timestamp_ms = self
            .latest
            .map_or(now_ms, |latest| now_ms.max(latest.timestamp_ms));

        let sample = match self.probe.sample() {
            Ok(Some(usage)) => {
                self.consecutive_misses = 0;
                let budget_bytes = usage
                    .limit_bytes
                    .filter(|limit| *limit > 0)
                    .unwrap_or(self.budget_bytes);
                let mut sample = PressureSample {
                    timestamp_ms,
                    used_bytes: usage.used_bytes,
                    budget_bytes,
                    level: PressureLevel::Normal,
                    source: SampleSource::Memory,
                };
                let ratio = sample.ratio();
                sample.level = PressureLevel::from_ratio(
                    ratio,
                    self.config.warning_ratio,
                    self.config.critical_ratio,
                );
                self.record_ratio(ratio as f32);
                sample
            }
            Ok(None) => {
                self.consecutive_misses = 0;
                let level = if watchdog.is_straining() {
                    PressureLevel::Warning
                } else {
                    PressureLevel::Normal
                };
                PressureSample {
                    timestamp_ms,
                    used_bytes: 0,
                    budget_bytes: self.budget_bytes,
                    level,
                    source: SampleSource::FrameTime,
                }
            }
            Err(e) => {
                self.consecutive_misses = self.consecutive_misses.saturating_add(1);
                log::debug!(
                    "PressureMonitor: missed sample ({} in a row): {}",
                    self.consecutive_misses,
                    e
                );
                if self.consecutive_misses < self.config.missed_samples_to_warn {
                    return None;
                }
                log::warn!(
                    "PressureMonitor: {} consecutive missed samples, assuming Warning.",
                    self.consecutive_misses
                );
                PressureSample {
                    timestamp_ms,
                    used_bytes: self.latest.map_or(0, |latest| latest.used_bytes),
                    budget_bytes: self.budget_bytes,
                    level: PressureLevel::Warning,
                    source: SampleSource::Defensive,
                }
            }
        };

        let previous = self
            .latest
            .map_or(PressureLevel::Normal, |latest| latest.level);
        let level_changed = sample.level != previous;
        if level_changed {
            log::info!(
                "PressureMonitor: pressure {:?} -> {:?} ({:?}).",
                previous,
                sample.level,
                sample.source
            );
        }
        self.latest = Some(sample);

        Some(PressureUpdate {
            sample,
            previous,
            level_changed,
        })
    }

    fn record_ratio(&mut self, ratio: f32) {
        self.ratios.push(ratio);
        if self.ratios.count() >= 4 {
            let trend = self.ratios.trend();
            if trend > RISING_TREND {
                log::debug!(
                    "PressureMonitor: usage trending up (+{:.2}, mean {:.2}).",
                    trend,
                    self.ratios.average()
                );
            }
        }
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<PressureSample> {
        self.latest
    }

    /// The sampling interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// The default budget used when the probe reports no limit.
    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// The warning threshold.
    pub fn warning_ratio(&self) -> f64 {
        self.config.warning_ratio
    }

    /// Consecutive missed samples so far.
    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Recent usage ratios, oldest first.
    pub fn ratio_history(&self) -> &RingBuffer<f32, RATIO_HISTORY> {
        &self.ratios
    }
}

impl std::fmt::Debug for PressureMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureMonitor")
            .field("interval_ms", &self.interval_ms)
            .field("budget_bytes", &self.budget_bytes)
            .field("latest", &self.latest)
            .field("consecutive_misses", &self.consecutive_misses)
            .finish()
    }
}
