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

use ballast_core::config::RecoveryConfig;
use ballast_core::event::GovernorEvent;
use ballast_core::session::{SessionSnapshot, SnapshotStore};

/// Result of the single restore attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// The snapshot matched and was fresh; the caller should apply it.
    Applied(SessionSnapshot),
    /// The snapshot was older than the freshness window.
    Stale,
    /// The snapshot belonged to another route.
    RouteMismatch,
    /// There was no usable snapshot, or it was already consumed.
    Missing,
}

/// Crash/Session Recovery.
///
/// The previous session's record is read exactly once, when the component is
/// opened, and deleted right away whatever its contents. From then on the
/// component writes the current session's position on a fixed cadence, on
/// backgrounding, and one last time (marked clean) at shutdown.
pub struct SessionRecovery {
    config: RecoveryConfig,
    store: Box<dyn SnapshotStore>,
    pending: Option<SessionSnapshot>,
    unclean_restarts: u32,
    position: Option<(String, f64)>,
    last_write_ms: Option<u64>,
}

impl SessionRecovery {
    /// Opens the store, consuming whatever record the previous session left.
    ///
    /// Read and parse failures are treated as "no snapshot".
    pub fn open(config: RecoveryConfig, mut store: Box<dyn SnapshotStore>) -> Self {
        let pending = match store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("SessionRecovery: ignoring unreadable snapshot: {}", e);
                None
            }
        };
        if let Err(e) = store.remove() {
            log::warn!("SessionRecovery: failed to delete snapshot: {}", e);
        }

        let unclean_restarts = match &pending {
            Some(previous) if !previous.clean_shutdown => previous.unclean_restarts.saturating_add(1),
            _ => 0,
        };
        if unclean_restarts > 0 {
            log::warn!(
                "SessionRecovery: previous session ended uncleanly ({} in a row).",
                unclean_restarts
            );
        }

        Self {
            config,
            store,
            pending,
            unclean_restarts,
            position: None,
            last_write_ms: None,
        }
    }

    /// Consecutive sessions, up to and including the previous one, that ended
    /// without a clean shutdown.
    pub fn unclean_restarts(&self) -> u32 {
        self.unclean_restarts
    }

    /// Attempts the single restore for `current_route`.
    ///
    /// Only the first call can return [`RestoreOutcome::Applied`], and only then
    /// is `snapshot-restored` broadcast.
    pub fn restore(
        &mut self,
        current_route: &str,
        now_ms: u64,
        events: &mut Vec<GovernorEvent>,
    ) -> RestoreOutcome {
        let Some(snapshot) = self.pending.take() else {
            return RestoreOutcome::Missing;
        };

        if snapshot.route_key != current_route {
            log::debug!(
                "SessionRecovery: snapshot for '{}' does not match '{}'.",
                snapshot.route_key,
                current_route
            );
            return RestoreOutcome::RouteMismatch;
        }

        let age_ms = now_ms.saturating_sub(snapshot.saved_at);
        if age_ms >= self.config.freshness_window_ms {
            log::debug!("SessionRecovery: snapshot is {} ms old, skipping.", age_ms);
            return RestoreOutcome::Stale;
        }

        log::info!(
            "SessionRecovery: restoring '{}' at offset {}.",
            snapshot.route_key,
            snapshot.scroll_offset
        );
        events.push(GovernorEvent::SnapshotRestored(snapshot.clone()));
        RestoreOutcome::Applied(snapshot)
    }

    /// Records the current position. Nothing is written until one is known.
    pub fn update_position(&mut self, route_key: impl Into<String>, scroll_offset: f64) {
        self.position = Some((route_key.into(), scroll_offset));
    }

    /// Writes a snapshot when the cadence has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_write_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.config.snapshot_interval_ms);
        due && self.write(now_ms, false)
    }

    /// Writes a snapshot immediately, e.g. on backgrounding.
    pub fn flush(&mut self, now_ms: u64) -> bool {
        self.write(now_ms, false)
    }

    /// Writes the final snapshot of an orderly shutdown.
    pub fn shutdown(&mut self, now_ms: u64) -> bool {
        self.write(now_ms, true)
    }

    fn write(&mut self, now_ms: u64, clean_shutdown: bool) -> bool {
        let Some((route_key, scroll_offset)) = &self.position else {
            return false;
        };
        let snapshot = SessionSnapshot {
            scroll_offset: *scroll_offset,
            route_key: route_key.clone(),
            saved_at: now_ms,
            unclean_restarts: self.unclean_restarts,
            clean_shutdown,
        };
        // A failed write is retried on the next cadence.
        self.last_write_ms = Some(now_ms);
        match self.store.save(&snapshot) {
            Ok(()) => {
                log::trace!("SessionRecovery: snapshot written at {}.", now_ms);
                true
            }
            Err(e) => {
                log::warn!("SessionRecovery: failed to write snapshot: {}", e);
                false
            }
        }
    }
}

impl std::fmt::Debug for SessionRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecovery")
            .field("pending", &self.pending)
            .field("unclean_restarts", &self.unclean_restarts)
            .field("position", &self.position)
            .field("last_write_ms", &self.last_write_ms)
            .finish()
    }
}
