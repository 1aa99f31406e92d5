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

//! Degradation mode types.

use serde::{Deserialize, Serialize};

/// Operating mode of the application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum DegradationMode {
    /// Full feature set.
    #[default]
    Normal,
    /// Reduced feature set. Only an explicit reset leaves this mode.
    Degraded,
}

/// What caused the transition into Degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerReason {
    /// Sustained Critical memory pressure.
    MemoryPressure,
    /// The frame-time watchdog reported a burst of dropped ticks.
    FrameDropBurst,
    /// Too many uncaught errors within the trailing window.
    ErrorBurst,
    /// Several consecutive sessions ended without a clean shutdown.
    RepeatedCrash,
    /// Entered on request.
    Manual,
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Process-wide flags consumed by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DegradationFlags {
    /// Optional ambient effects should be switched off.
    pub disable_ambient_effects: bool,
    /// Upper bound for animation durations, if any.
    pub animation_duration_cap_ms: Option<u32>,
    /// Forced load concurrency, if any.
    pub max_concurrent_override: Option<usize>,
}

impl DegradationFlags {
    /// Flags for Degraded mode.
    pub fn degraded(animation_duration_cap_ms: u32, max_concurrent: usize) -> Self {
        Self {
            disable_ambient_effects: true,
            animation_duration_cap_ms: Some(animation_duration_cap_ms),
            max_concurrent_override: Some(max_concurrent),
        }
    }
}

/// The singleton degradation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DegradationState {
    /// Current mode.
    pub mode: DegradationMode,
    /// When the current mode was entered.
    pub entered_at_ms: u64,
    /// Why Degraded was entered. `None` while Normal.
    pub trigger_reason: Option<TriggerReason>,
    /// Flags derived from the mode.
    pub flags: DegradationFlags,
}

impl DegradationState {
    /// Returns `true` while Degraded.
    pub fn is_degraded(&self) -> bool {
        self.mode == DegradationMode::Degraded
    }
}
