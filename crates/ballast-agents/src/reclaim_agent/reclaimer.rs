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

//! Sweeps off-screen heavy resources.

use std::collections::BTreeMap;

use ballast_core::config::ReclaimConfig;
use ballast_core::error::GovernorError;
use ballast_core::event::GovernorEvent;
use ballast_core::profile::DeviceProfile;
use ballast_core::resource::{
    ReclaimAction, ReclaimCallback, ResidencyState, ResourceHandle, ResourceId, ResourceKind,
    SweepReason,
};

struct Entry {
    handle: ResourceHandle,
    callback: ReclaimCallback,
    distance_px: f32,
    residency: ResidencyState,
}

impl Entry {
    fn act(&mut self, id: ResourceId, action: ReclaimAction) {
        (self.callback)(id, action);
    }

    /// Undoes any reclaim. Only a release was broadcast, so only its undo is.
    fn restore(&mut self, id: ResourceId, events: &mut Vec<GovernorEvent>) {
        self.act(id, ReclaimAction::Restore);
        log::debug!("ResourceReclaimer: restoring {} from {:?}.", id, self.residency);
        if self.residency == ResidencyState::Released {
            events.push(GovernorEvent::ResourceRestored(id));
        }
        self.residency = ResidencyState::Resident;
    }
}

/// Usage figures a pressure-triggered sweep tries to bring under the warning line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepTarget {
    /// Bytes in use when the sweep started.
    pub used_bytes: u64,
    /// Budget the usage is measured against.
    pub budget_bytes: u64,
    /// Ratio below which the sweep may stop early.
    pub warning_ratio: f64,
}

impl SweepTarget {
    fn is_met(&self, freed_bytes: u64) -> bool {
        if self.budget_bytes == 0 {
            return false;
        }
        let remaining = self.used_bytes.saturating_sub(freed_bytes) as f64;
        remaining / (self.budget_bytes as f64) < self.warning_ratio
    }
}

/// What a single sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Handles released.
    pub released: usize,
    /// Videos paused.
    pub paused: usize,
    /// Canvases shrunk.
    pub shrunk: usize,
    /// Estimated bytes freed.
    pub freed_bytes: u64,
}

impl SweepReport {
    fn actions(&self) -> usize {
        self.released + self.paused + self.shrunk
    }
}

/// Lifetime counters of the reclaimer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimStats {
    /// Handles released.
    pub released: u64,
    /// Videos paused.
    pub paused: u64,
    /// Canvases shrunk.
    pub shrunk: u64,
    /// Handles restored after coming back into view.
    pub restored: u64,
    /// Sweeps run.
    pub sweeps: u64,
}

/// The Resource Reclaimer.
///
/// Holds no capability over the resources themselves: every release, pause,
/// shrink, or restore is requested through the callback supplied at
/// registration. Handles flagged keep-alive are never targeted.
pub struct ResourceReclaimer {
    config: ReclaimConfig,
    margin_px: f32,
    entries: BTreeMap<ResourceId, Entry>,
    next_id: u64,
    last_periodic_ms: u64,
    last_pressure_sweep_ms: Option<u64>,
    stats: ReclaimStats,
}

impl ResourceReclaimer {
    /// Creates a reclaimer using the off-screen margin of `profile`'s tier.
    pub fn new(config: ReclaimConfig, profile: &DeviceProfile, now_ms: u64) -> Self {
        Self {
            config,
            margin_px: profile.viewport_margin_px(),
            entries: BTreeMap::new(),
            next_id: 1,
            last_periodic_ms: now_ms,
            last_pressure_sweep_ms: None,
            stats: ReclaimStats::default(),
        }
    }

    /// Registers a heavy resource together with the callback that acts on it.
    pub fn register(&mut self, handle: ResourceHandle, callback: ReclaimCallback) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        log::debug!(
            "ResourceReclaimer: registered {} ({:?}, ~{} bytes).",
            id,
            handle.kind,
            handle.size_bytes_estimate
        );
        self.entries.insert(
            id,
            Entry {
                handle,
                callback,
                distance_px: 0.0,
                residency: ResidencyState::Resident,
            },
        );
        id
    }

    /// Forgets a handle once its owner disposed of the resource.
    pub fn deregister(&mut self, id: ResourceId) -> Result<ResourceHandle, GovernorError> {
        self.entries
            .remove(&id)
            .map(|entry| entry.handle)
            .ok_or(GovernorError::UnknownResource(id))
    }

    /// Protects or unprotects a handle.
    pub fn set_keep_alive(&mut self, id: ResourceId, keep_alive: bool) -> Result<(), GovernorError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(GovernorError::UnknownResource(id))?;
        entry.handle.keep_alive = keep_alive;
        Ok(())
    }

    /// Records how far the owning element is from the viewport.
    ///
    /// A distance of zero or less means on screen. A reclaimed handle that comes
    /// back within the margin is restored.
    pub fn update_visibility(
        &mut self,
        id: ResourceId,
        distance_px: f32,
        now_ms: u64,
        events: &mut Vec<GovernorEvent>,
    ) -> Result<(), GovernorError> {
        let margin_px = self.margin_px;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(GovernorError::UnknownResource(id))?;

        entry.distance_px = distance_px;
        if distance_px <= 0.0 {
            entry.handle.last_visible_at_ms = now_ms;
        }

        if entry.residency != ResidencyState::Resident && distance_px <= margin_px {
            entry.restore(id, events);
            self.stats.restored += 1;
        }
        Ok(())
    }

    /// Restores every reclaimed handle whose last known position is within
    /// the margin. Used when the host returns to the foreground.
    pub fn restore_visible(&mut self, events: &mut Vec<GovernorEvent>) -> usize {
        let margin_px = self.margin_px;
        let mut restored = 0;
        for (id, entry) in self.entries.iter_mut() {
            if entry.residency != ResidencyState::Resident && entry.distance_px <= margin_px {
                entry.restore(*id, events);
                restored += 1;
            }
        }
        self.stats.restored += restored as u64;
        restored
    }

    /// Runs the periodic sweep when its cadence has elapsed.
    pub fn poll(&mut self, now_ms: u64, events: &mut Vec<GovernorEvent>) -> Option<SweepReport> {
        if now_ms.saturating_sub(self.last_periodic_ms) < self.config.periodic_interval_ms {
            return None;
        }
        Some(self.sweep(SweepReason::Periodic, now_ms, None, events))
    }

    /// Applies the sweep policy, in order:
    /// 1. release handles off-screen beyond the margin for long enough,
    /// 2. pause off-screen videos,
    /// 3. on Critical only, shrink off-screen canvases.
    ///
    /// With a `target`, the sweep stops as soon as the estimated usage drops
    /// below the warning ratio; otherwise every candidate is processed.
    ///
    /// Pressure sweeps closer together than `sweep_cooldown_ms` are skipped
    /// and report nothing. A background sweep pauses videos at any distance.
    pub fn sweep(
        &mut self,
        reason: SweepReason,
        now_ms: u64,
        target: Option<SweepTarget>,
        events: &mut Vec<GovernorEvent>,
    ) -> SweepReport {
        if reason.is_pressure() {
            if let Some(last) = self.last_pressure_sweep_ms {
                if now_ms.saturating_sub(last) < self.config.sweep_cooldown_ms {
                    log::debug!(
                        "ResourceReclaimer: {:?} sweep skipped, last one {} ms ago.",
                        reason,
                        now_ms.saturating_sub(last)
                    );
                    return SweepReport::default();
                }
            }
            self.last_pressure_sweep_ms = Some(now_ms);
        }

        self.stats.sweeps += 1;
        if reason == SweepReason::Periodic {
            self.last_periodic_ms = now_ms;
        }

        // Longest unseen first.
        let mut order: Vec<(u64, ResourceId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.handle.keep_alive)
            .map(|(id, entry)| (entry.handle.last_visible_at_ms, *id))
            .collect();
        order.sort_unstable();

        let mut report = SweepReport::default();
        let done = |report: &SweepReport| target.is_some_and(|t| t.is_met(report.freed_bytes));

        for &(_, id) in &order {
            if done(&report) {
                break;
            }
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            let unseen_for = now_ms.saturating_sub(entry.handle.last_visible_at_ms);
            if entry.residency != ResidencyState::Released
                && entry.distance_px > self.margin_px
                && unseen_for >= self.config.release_after_ms
            {
                entry.act(id, ReclaimAction::Release);
                entry.residency = ResidencyState::Released;
                report.released += 1;
                report.freed_bytes += entry.handle.size_bytes_estimate;
                events.push(GovernorEvent::ResourceReleased(id));
            }
        }

        for &(_, id) in &order {
            if done(&report) {
                break;
            }
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            if entry.handle.kind == ResourceKind::Video
                && entry.residency == ResidencyState::Resident
                && (reason == SweepReason::Background
                    || entry.distance_px > self.config.video_pause_margin_px)
            {
                entry.act(id, ReclaimAction::Pause);
                entry.residency = ResidencyState::Paused;
                report.paused += 1;
                report.freed_bytes += entry.handle.size_bytes_estimate / 2;
            }
        }

        if reason.is_critical() {
            for &(_, id) in &order {
                if done(&report) {
                    break;
                }
                let Some(entry) = self.entries.get_mut(&id) else {
                    continue;
                };
                if entry.handle.kind == ResourceKind::Canvas
                    && entry.residency == ResidencyState::Resident
                    && entry.distance_px > self.config.canvas_shrink_margin_px
                {
                    entry.act(id, ReclaimAction::Shrink);
                    entry.residency = ResidencyState::Shrunk;
                    report.shrunk += 1;
                    report.freed_bytes += entry.handle.size_bytes_estimate;
                }
            }
        }

        self.stats.released += report.released as u64;
        self.stats.paused += report.paused as u64;
        self.stats.shrunk += report.shrunk as u64;

        if report.actions() > 0 {
            log::info!(
                "ResourceReclaimer: {:?} sweep released {}, paused {}, shrunk {} (~{} KiB).",
                reason,
                report.released,
                report.paused,
                report.shrunk,
                report.freed_bytes / 1024
            );
        } else {
            log::debug!("ResourceReclaimer: {:?} sweep found nothing to reclaim.", reason);
        }
        report
    }

    /// Residency of a registered handle.
    pub fn residency(&self, id: ResourceId) -> Option<ResidencyState> {
        self.entries.get(&id).map(|entry| entry.residency)
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The off-screen margin in pixels.
    pub fn margin_px(&self) -> f32 {
        self.margin_px
    }

    /// Lifetime counters.
    pub fn stats(&self) -> ReclaimStats {
        self.stats
    }
}

impl std::fmt::Debug for ResourceReclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceReclaimer")
            .field("margin_px", &self.margin_px)
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}
