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

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use ballast_control::{EnvironmentProfiler, Governor, GovernorService};
use ballast_core::clock::{Clock, SystemClock};
use ballast_core::config::GovernorConfig;
use ballast_core::pressure::{MemoryProbe, NoMemorySignal};
use ballast_core::profile::{DeviceProfile, HostHints};
use ballast_core::session::{MemorySnapshotStore, SnapshotStore};
use ballast_infra::{FileSnapshotStore, SysinfoHostProbe, SysinfoMemoryProbe};

/// Assembles a [`Governor`] from its host seams.
///
/// Every seam has a safe default: conservative host hints, no memory signal
/// (frame-time fallback), an in-process snapshot store, and the system clock.
pub struct GovernorBuilder {
    config: GovernorConfig,
    hints: HostHints,
    profile: Option<DeviceProfile>,
    probe: Box<dyn MemoryProbe>,
    store: Box<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl GovernorBuilder {
    /// Starts from defaults.
    pub fn new() -> Self {
        Self {
            config: GovernorConfig::default(),
            hints: HostHints::new(),
            profile: None,
            probe: Box::new(NoMemorySignal),
            store: Box::new(MemorySnapshotStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Starts from this machine: `sysinfo` hints and memory probe, and a
    /// snapshot file inside `snapshot_dir`.
    pub fn native(snapshot_dir: impl AsRef<Path>) -> Result<Self> {
        let hints = SysinfoHostProbe::new().hints();
        let probe = SysinfoMemoryProbe::new()?;
        let store = FileSnapshotStore::in_dir(snapshot_dir)?;
        log::debug!("GovernorBuilder: native probes ready, snapshots in {:?}.", store.path());
        Ok(Self::new()
            .with_hints(hints)
            .with_probe(probe)
            .with_store(store))
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: GovernorConfig) -> Self {
        self.config = config;
        self
    }

    /// Host hints the profile is derived from.
    pub fn with_hints(mut self, hints: HostHints) -> Self {
        self.hints = hints;
        self
    }

    /// Uses a precomputed profile and skips profiling.
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// The memory probe sampled by the Pressure Monitor.
    pub fn with_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Where the session snapshot lives.
    pub fn with_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// The time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds a governor driven by the caller.
    ///
    /// The caller owns the loop: call [`Governor::poll`] regularly.
    pub fn build(self) -> Governor {
        let profile = self
            .profile
            .unwrap_or_else(|| EnvironmentProfiler::profile(&self.hints));
        Governor::new(self.config, profile, self.probe, self.store, self.clock)
    }

    /// Builds a governor and starts it on its own control-loop thread.
    pub fn spawn(self) -> GovernorService {
        let service_config = self.config.service.clone();
        let mut service = GovernorService::new(self.build(), service_config);
        service.start();
        service
    }
}

impl Default for GovernorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_core::clock::ManualClock;
    use ballast_core::profile::{PlatformClass, Tier};

    #[test]
    fn test_defaults_are_conservative() {
        let governor = GovernorBuilder::new().build();
        assert_eq!(governor.profile().tier, Tier::CONSERVATIVE);
        assert!(!governor.degradation().is_degraded());
    }

    #[test]
    fn test_hints_drive_profile() {
        let governor = GovernorBuilder::new()
            .with_hints(
                HostHints::new()
                    .with_memory_gb(16.0)
                    .with_platform(PlatformClass::Desktop),
            )
            .with_clock(Arc::new(ManualClock::new(0)))
            .build();
        assert_eq!(governor.profile().tier, Tier::MAX);
        assert_eq!(governor.status().max_concurrent, 2);
    }

    #[test]
    fn test_spawn_runs_service() {
        let mut service = GovernorBuilder::new().spawn();
        assert!(service.is_running());
        service.stop();
    }

    #[test]
    fn test_native_builder() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let governor = GovernorBuilder::native(dir.path())?.build();
        assert!(governor.profile().tier >= Tier::MIN);
        Ok(())
    }
}
