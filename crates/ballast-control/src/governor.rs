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

//! The governor engine.
//!
//! [`Governor`] is the single serializing context of the subsystem. Every
//! public method is one step: it reads the clock once, lets the components
//! react, and only then dispatches the events they produced, in order, to all
//! subscribers. Subscribers therefore never observe a half-applied transition.

use std::sync::Arc;

use ballast_agents::{RestoreOutcome, SweepReport, SweepTarget};
use ballast_core::clock::Clock;
use ballast_core::config::GovernorConfig;
use ballast_core::degradation::{DegradationState, TriggerReason};
use ballast_core::error::GovernorError;
use ballast_core::event::{EventHub, GovernorEvent, SubscriptionId};
use ballast_core::load::{LoadId, LoadRequest, LoadState, LoadTicket};
use ballast_core::pressure::{MemoryProbe, PressureLevel, PressureSample, SampleSource};
use ballast_core::profile::DeviceProfile;
use ballast_core::resource::{ReclaimAction, ResourceHandle, ResourceId, SweepReason};
use ballast_core::session::{Lifecycle, SnapshotStore};
use ballast_telemetry::PressureUpdate;

use crate::context::{GovernorState, GovernorStatus};

/// The adaptive resource governor.
pub struct Governor {
    state: GovernorState,
    hub: EventHub<GovernorEvent>,
    pending: Vec<GovernorEvent>,
    clock: Arc<dyn Clock>,
}

impl Governor {
    /// Assembles the governor around an already computed profile.
    ///
    /// The previous session's snapshot is consumed here. If it reveals a streak
    /// of unclean restarts the governor starts Degraded; that event is
    /// delivered on the first step so late subscribers still see it.
    pub fn new(
        config: GovernorConfig,
        profile: DeviceProfile,
        probe: Box<dyn MemoryProbe>,
        store: Box<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now_ms = clock.now_ms();
        let state = GovernorState::new(&config, profile, probe, store, now_ms);
        let mut governor = Self {
            state,
            hub: EventHub::new(),
            pending: Vec::new(),
            clock,
        };

        let unclean_restarts = governor.state.recovery.unclean_restarts();
        if governor
            .state
            .degradation
            .observe_unclean_restarts(unclean_restarts, now_ms, &mut governor.pending)
        {
            governor.on_degraded();
        }

        log::info!("Governor: started at {} with {}.", now_ms, governor.state.profile.tier);
        governor
    }

    /// The device profile computed at startup.
    pub fn profile(&self) -> &DeviceProfile {
        &self.state.profile
    }

    // --- Subscriptions ---

    /// Registers a callback invoked for every event, in registration order.
    ///
    /// Callbacks run inside the step that produced the event and must not
    /// re-enter the governor.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&GovernorEvent) + Send + 'static,
    {
        self.hub.subscribe(callback)
    }

    /// Registers a channel subscriber.
    pub fn subscribe_channel(&mut self) -> (SubscriptionId, flume::Receiver<GovernorEvent>) {
        self.hub.subscribe_channel()
    }

    /// Removes a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    // --- Load Scheduler ---

    /// Submits a load request. Admission is delivered through the returned ticket.
    pub fn enqueue(&mut self, request: LoadRequest) -> Result<LoadTicket, GovernorError> {
        let now_ms = self.clock.now_ms();
        let result = self.state.scheduler.enqueue(request, now_ms, &mut self.pending);
        self.dispatch();
        result
    }

    /// Cancels a queued or admitted request.
    pub fn cancel(&mut self, id: LoadId) -> Result<(), GovernorError> {
        let result = self.state.scheduler.cancel(id, &mut self.pending);
        self.dispatch();
        result
    }

    /// Marks an admitted request as completed, freeing its slot.
    pub fn complete(&mut self, id: LoadId) -> Result<(), GovernorError> {
        let result = self.state.scheduler.complete(id, &mut self.pending);
        self.dispatch();
        result
    }

    /// Marks an admitted request as failed, freeing its slot.
    pub fn fail(&mut self, id: LoadId) -> Result<(), GovernorError> {
        let result = self.state.scheduler.fail(id, &mut self.pending);
        self.dispatch();
        result
    }

    /// Current state of a live request.
    pub fn load_state(&self, id: LoadId) -> Option<LoadState> {
        self.state.scheduler.state(id)
    }

    // --- Resource Reclaimer ---

    /// Registers a heavy resource and the callback that releases or restores it.
    pub fn register_resource<F>(&mut self, handle: ResourceHandle, callback: F) -> ResourceId
    where
        F: FnMut(ResourceId, ReclaimAction) + Send + 'static,
    {
        self.state.reclaimer.register(handle, Box::new(callback))
    }

    /// Forgets a resource whose owner disposed of it.
    pub fn deregister(&mut self, id: ResourceId) -> Result<ResourceHandle, GovernorError> {
        self.state.reclaimer.deregister(id)
    }

    /// Protects or unprotects a resource from reclamation.
    pub fn set_keep_alive(&mut self, id: ResourceId, keep_alive: bool) -> Result<(), GovernorError> {
        self.state.reclaimer.set_keep_alive(id, keep_alive)
    }

    /// Reports how far a resource's element is from the viewport.
    pub fn update_visibility(&mut self, id: ResourceId, distance_px: f32) -> Result<(), GovernorError> {
        let now_ms = self.clock.now_ms();
        let result = self
            .state
            .reclaimer
            .update_visibility(id, distance_px, now_ms, &mut self.pending);
        self.dispatch();
        result
    }

    /// Runs a full sweep immediately.
    pub fn sweep(&mut self) -> SweepReport {
        let now_ms = self.clock.now_ms();
        let report = self
            .state
            .reclaimer
            .sweep(SweepReason::Manual, now_ms, None, &mut self.pending);
        self.dispatch();
        report
    }

    // --- Degradation ---

    /// Records one uncaught error reported by a collaborator.
    pub fn report_error(&mut self) {
        let now_ms = self.clock.now_ms();
        if self.state.degradation.report_error(now_ms, &mut self.pending) {
            self.on_degraded();
        }
        self.dispatch();
    }

    /// Feeds one visual-update tick to the frame watchdog.
    pub fn report_frame_tick(&mut self) {
        let now_ms = self.clock.now_ms();
        if self.state.watchdog.tick(now_ms)
            && self.state.degradation.on_frame_drop_burst(now_ms, &mut self.pending)
        {
            self.on_degraded();
        }
        self.dispatch();
    }

    /// Enters Degraded mode on request. Returns `false` if already Degraded.
    pub fn force_degraded(&mut self, reason: TriggerReason) -> bool {
        let now_ms = self.clock.now_ms();
        let entered = self.state.degradation.force(reason, now_ms, &mut self.pending);
        if entered {
            self.on_degraded();
        }
        self.dispatch();
        entered
    }

    /// Leaves Degraded mode. Returns `false` if the governor was Normal.
    pub fn reset_degradation(&mut self) -> bool {
        let now_ms = self.clock.now_ms();
        let reset = self.state.degradation.reset(now_ms, &mut self.pending);
        if reset {
            self.state.watchdog.reset();
            self.state.scheduler.set_degraded(false, &mut self.pending);
        }
        self.dispatch();
        reset
    }

    /// The current degradation state.
    pub fn degradation(&self) -> DegradationState {
        self.state.degradation.state()
    }

    // --- Session ---

    /// Records the current reading position.
    pub fn update_position(&mut self, route_key: impl Into<String>, scroll_offset: f64) {
        self.state.recovery.update_position(route_key, scroll_offset);
    }

    /// Attempts the one-shot restore of the previous session's position.
    pub fn restore_session(&mut self, current_route: &str) -> RestoreOutcome {
        let now_ms = self.clock.now_ms();
        let outcome = self
            .state
            .recovery
            .restore(current_route, now_ms, &mut self.pending);
        self.dispatch();
        outcome
    }

    /// Applies a host visibility change.
    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        if self.state.lifecycle == lifecycle {
            return;
        }
        let now_ms = self.clock.now_ms();
        log::debug!("Governor: lifecycle {:?} -> {:?}.", self.state.lifecycle, lifecycle);
        self.state.lifecycle = lifecycle;
        match lifecycle {
            Lifecycle::Background => {
                // Background ticks are throttled by the host and would read as drops.
                self.state.watchdog.suspend();
                self.state.recovery.flush(now_ms);
                let report = self.state.reclaimer.sweep(
                    SweepReason::Background,
                    now_ms,
                    None,
                    &mut self.pending,
                );
                log::debug!("Governor: background sweep freed ~{} bytes.", report.freed_bytes);
            }
            Lifecycle::Foreground => {
                self.state.watchdog.resume();
                let restored = self.state.reclaimer.restore_visible(&mut self.pending);
                if restored > 0 {
                    log::debug!("Governor: restored {} resources on foreground.", restored);
                }
            }
        }
        self.dispatch();
    }

    // --- Timers ---

    /// Runs every timer that is due: pressure sampling, the periodic sweep,
    /// and the snapshot cadence.
    pub fn poll(&mut self) {
        let now_ms = self.clock.now_ms();
        if let Some(update) = self.state.monitor.poll(now_ms, &self.state.watchdog) {
            self.on_pressure(update, now_ms);
        }
        if let Some(report) = self.state.reclaimer.poll(now_ms, &mut self.pending) {
            log::trace!("Governor: periodic sweep {:?}.", report);
        }
        self.state.recovery.poll(now_ms);
        self.dispatch();
    }

    /// Takes a pressure sample immediately, outside the sampling schedule.
    pub fn sample_pressure(&mut self) -> Option<PressureSample> {
        let now_ms = self.clock.now_ms();
        let update = self.state.monitor.sample_now(now_ms, &self.state.watchdog);
        if let Some(update) = update {
            self.on_pressure(update, now_ms);
        }
        self.dispatch();
        update.map(|u| u.sample)
    }

    /// The most recent pressure sample.
    pub fn latest_sample(&self) -> Option<PressureSample> {
        self.state.monitor.latest()
    }

    /// Writes the final, clean snapshot. Call once on orderly exit.
    pub fn shutdown(&mut self) {
        let now_ms = self.clock.now_ms();
        self.state.recovery.shutdown(now_ms);
        self.dispatch();
        log::info!("Governor: shut down at {}.", now_ms);
    }

    /// A read-only copy of the governor state.
    pub fn status(&self) -> GovernorStatus {
        self.state.status()
    }

    fn on_pressure(&mut self, update: PressureUpdate, now_ms: u64) {
        let sample = update.sample;
        if update.level_changed {
            self.pending.push(GovernorEvent::PressureChanged {
                level: sample.level,
                sample,
            });
        }

        if self
            .state
            .degradation
            .observe_pressure(&sample, now_ms, &mut self.pending)
        {
            self.on_degraded();
        }

        if update.level_changed && sample.level >= PressureLevel::Warning {
            // Without a memory reading there is nothing to measure progress against.
            let target = (sample.source == SampleSource::Memory).then(|| SweepTarget {
                used_bytes: sample.used_bytes,
                budget_bytes: sample.budget_bytes,
                warning_ratio: self.state.monitor.warning_ratio(),
            });
            let report = self.state.reclaimer.sweep(
                SweepReason::Pressure(sample.level),
                now_ms,
                target,
                &mut self.pending,
            );
            log::debug!("Governor: pressure sweep freed ~{} bytes.", report.freed_bytes);
        }
    }

    fn on_degraded(&mut self) {
        self.state.scheduler.set_degraded(true, &mut self.pending);
    }

    fn dispatch(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        for event in &self.pending {
            log::trace!("Governor: dispatching {}.", event.name());
        }
        self.hub.publish_all(std::mem::take(&mut self.pending));
    }
}

impl std::fmt::Debug for Governor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governor")
            .field("state", &self.state)
            .field("hub", &self.hub)
            .field("pending", &self.pending.len())
            .finish()
    }
}
