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

//! Shared state of the governor.

use ballast_agents::{LoadScheduler, ReclaimStats, ResourceReclaimer, SchedulerStats, SessionRecovery};
use ballast_core::config::GovernorConfig;
use ballast_core::degradation::DegradationState;
use ballast_core::pressure::{MemoryProbe, PressureLevel, PressureSample};
use ballast_core::profile::DeviceProfile;
use ballast_core::session::{Lifecycle, SnapshotStore};
use ballast_telemetry::{FrameWatchdog, PressureMonitor};

use crate::degradation::DegradationController;

/// Every mutable piece of the governor, owned by one serializing context.
///
/// Nothing in here is synchronised. A multi-threaded host reaches it only
/// through [`GovernorService`](crate::service::GovernorService).
#[derive(Debug)]
pub struct GovernorState {
    /// Host classification, fixed for the process lifetime.
    pub profile: DeviceProfile,
    /// Foreground or background.
    pub lifecycle: Lifecycle,
    /// Frame-time watchdog.
    pub watchdog: FrameWatchdog,
    /// Pressure sampler.
    pub monitor: PressureMonitor,
    /// Load admission queue.
    pub scheduler: LoadScheduler,
    /// Off-screen resource sweeper.
    pub reclaimer: ResourceReclaimer,
    /// Normal/Degraded state machine.
    pub degradation: DegradationController,
    /// Snapshot writer and one-shot restorer.
    pub recovery: SessionRecovery,
}

impl GovernorState {
    /// Builds every component from `config` around an already computed profile.
    pub fn new(
        config: &GovernorConfig,
        profile: DeviceProfile,
        probe: Box<dyn MemoryProbe>,
        store: Box<dyn SnapshotStore>,
        now_ms: u64,
    ) -> Self {
        let scheduler = LoadScheduler::new(config.scheduler.clone(), &profile);
        let degradation = DegradationController::new(config.degradation.clone(), now_ms)
            .with_degraded_concurrency(config.scheduler.degraded_max_concurrent);
        Self {
            lifecycle: Lifecycle::Foreground,
            watchdog: FrameWatchdog::new(config.watchdog.clone()),
            monitor: PressureMonitor::new(config.pressure.clone(), &profile, probe),
            reclaimer: ResourceReclaimer::new(config.reclaim.clone(), &profile, now_ms),
            recovery: SessionRecovery::open(config.recovery.clone(), store),
            scheduler,
            degradation,
            profile,
        }
    }

    /// Takes a read-only copy for observers.
    pub fn status(&self) -> GovernorStatus {
        let latest_sample = self.monitor.latest();
        GovernorStatus {
            profile: self.profile.clone(),
            pressure_level: latest_sample.map(|s| s.level).unwrap_or_default(),
            latest_sample,
            degradation: self.degradation.state(),
            lifecycle: self.lifecycle,
            admitted: self.scheduler.admitted_count(),
            critical_in_flight: self.scheduler.critical_in_flight(),
            queued: self.scheduler.queued_count(),
            max_concurrent: self.scheduler.max_concurrent(),
            resources: self.reclaimer.len(),
            scheduler_stats: self.scheduler.stats(),
            reclaim_stats: self.reclaimer.stats(),
            unclean_restarts: self.recovery.unclean_restarts(),
        }
    }
}

/// Read model of the governor, published after every step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GovernorStatus {
    /// Host classification.
    pub profile: DeviceProfile,
    /// Level of the latest sample, Normal before the first one.
    pub pressure_level: PressureLevel,
    /// Latest pressure sample.
    pub latest_sample: Option<PressureSample>,
    /// Degradation mode, trigger, and flags.
    pub degradation: DegradationState,
    /// Foreground or background.
    pub lifecycle: Lifecycle,
    /// Requests admitted in the normal lane.
    pub admitted: usize,
    /// Requests admitted in the critical lane.
    pub critical_in_flight: usize,
    /// Requests waiting for admission.
    pub queued: usize,
    /// Current concurrency budget of the normal lane.
    pub max_concurrent: usize,
    /// Registered heavy resources.
    pub resources: usize,
    /// Scheduler lifetime counters.
    pub scheduler_stats: SchedulerStats,
    /// Reclaimer lifetime counters.
    pub reclaim_stats: ReclaimStats,
    /// Consecutive unclean restarts detected at startup.
    pub unclean_restarts: u32,
}

impl GovernorStatus {
    /// Returns `true` when the governor is in Degraded mode.
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_degraded()
    }
}
