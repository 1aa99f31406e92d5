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

//! Governor configuration.
//!
//! Every section falls back to its defaults for missing fields, so a partial
//! JSON document only needs to name the values it overrides.

use crate::error::ConfigError;
use crate::profile::PlatformClass;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pressure Monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Ratio at which pressure becomes Warning.
    pub warning_ratio: f64,
    /// Ratio at which pressure becomes Critical.
    pub critical_ratio: f64,
    /// Sampling interval on mobile hosts.
    pub mobile_interval_ms: u64,
    /// Sampling interval on tablets.
    pub tablet_interval_ms: u64,
    /// Sampling interval on desktops.
    pub desktop_interval_ms: u64,
    /// Consecutive missed samples that force a defensive Warning.
    pub missed_samples_to_warn: u32,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            warning_ratio: 0.70,
            critical_ratio: 0.85,
            mobile_interval_ms: 3_000,
            tablet_interval_ms: 5_000,
            desktop_interval_ms: 8_000,
            missed_samples_to_warn: 3,
        }
    }
}

impl PressureConfig {
    /// Sampling interval for a platform class.
    pub fn interval_for(&self, platform: PlatformClass) -> u64 {
        match platform {
            PlatformClass::Mobile => self.mobile_interval_ms,
            PlatformClass::Tablet => self.tablet_interval_ms,
            PlatformClass::Desktop => self.desktop_interval_ms,
        }
    }
}

/// Frame-time watchdog settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// A tick delta above this counts as dropped.
    pub drop_threshold_ms: u64,
    /// Dropped-tick count that raises a frame-drop burst.
    pub burst_threshold: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            drop_threshold_ms: 80,
            burst_threshold: 60,
        }
    }
}

/// Load Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrency on mobile hosts.
    pub mobile_max_concurrent: usize,
    /// Concurrency on every other platform class.
    pub default_max_concurrent: usize,
    /// Concurrency while Degraded.
    pub degraded_max_concurrent: usize,
    /// Hard ceiling for Critical requests that bypass the queue.
    pub critical_ceiling: usize,
    /// Pending requests above which the newest lowest-priority request is dropped.
    pub max_pending: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mobile_max_concurrent: 1,
            default_max_concurrent: 2,
            degraded_max_concurrent: 1,
            critical_ceiling: 2,
            max_pending: 200,
        }
    }
}

/// Resource Reclaimer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    /// Cadence of the background sweep.
    pub periodic_interval_ms: u64,
    /// Minimum off-screen time before a release.
    pub release_after_ms: u64,
    /// Off-screen distance beyond which videos are paused.
    pub video_pause_margin_px: f32,
    /// Off-screen distance beyond which canvases are shrunk on Critical.
    pub canvas_shrink_margin_px: f32,
    /// Minimum spacing between two pressure-triggered sweeps.
    pub sweep_cooldown_ms: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            periodic_interval_ms: 600_000,
            release_after_ms: 5_000,
            video_pause_margin_px: 200.0,
            canvas_shrink_margin_px: 300.0,
            sweep_cooldown_ms: 15_000,
        }
    }
}

/// Degradation Controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Consecutive Critical memory samples that trigger Degraded.
    pub critical_samples_to_degrade: u32,
    /// Trailing error window.
    pub error_window_ms: u64,
    /// Errors within the window that trigger Degraded.
    pub error_threshold: usize,
    /// Consecutive unclean restarts that trigger Degraded.
    pub repeated_crash_threshold: u32,
    /// Animation cap published while Degraded.
    pub animation_cap_ms: u32,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            critical_samples_to_degrade: 1,
            error_window_ms: 60_000,
            error_threshold: 10,
            repeated_crash_threshold: 2,
            animation_cap_ms: 150,
        }
    }
}

/// Crash/Session Recovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Snapshot cadence.
    pub snapshot_interval_ms: u64,
    /// Maximum snapshot age that is still applied.
    pub freshness_window_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: 10_000,
            freshness_window_ms: 60_000,
        }
    }
}

/// Service thread settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Timer polls per second.
    pub tick_rate: u32,
    /// Capacity of the command channel.
    pub command_buffer_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            command_buffer_size: 1024,
        }
    }
}

/// Complete governor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Pressure Monitor.
    pub pressure: PressureConfig,
    /// Frame-time watchdog.
    pub watchdog: WatchdogConfig,
    /// Load Scheduler.
    pub scheduler: SchedulerConfig,
    /// Resource Reclaimer.
    pub reclaim: ReclaimConfig,
    /// Degradation Controller.
    pub degradation: DegradationConfig,
    /// Crash/Session Recovery.
    pub recovery: RecoveryConfig,
    /// Service thread.
    pub service: ServiceConfig,
}

impl GovernorConfig {
    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
