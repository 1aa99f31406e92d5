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

//! The Degradation Controller.
//!
//! A two-state machine. Any trigger moves `Normal -> Degraded`; only an
//! explicit [`DegradationController::reset`] moves back. There is no automatic
//! exit, so borderline load cannot make the mode flap.

use std::collections::VecDeque;

use ballast_core::config::DegradationConfig;
use ballast_core::degradation::{DegradationFlags, DegradationMode, DegradationState, TriggerReason};
use ballast_core::event::GovernorEvent;
use ballast_core::pressure::{PressureLevel, PressureSample};

/// Drives the singleton [`DegradationState`].
#[derive(Debug, Clone)]
pub struct DegradationController {
    config: DegradationConfig,
    state: DegradationState,
    degraded_max_concurrent: usize,
    critical_streak: u32,
    errors: VecDeque<u64>,
}

impl DegradationController {
    /// Creates a controller in Normal mode.
    pub fn new(config: DegradationConfig, now_ms: u64) -> Self {
        Self {
            config,
            state: DegradationState {
                entered_at_ms: now_ms,
                ..DegradationState::default()
            },
            degraded_max_concurrent: 1,
            critical_streak: 0,
            errors: VecDeque::new(),
        }
    }

    /// Sets the load concurrency published in the Degraded flags.
    pub fn with_degraded_concurrency(mut self, max_concurrent: usize) -> Self {
        self.degraded_max_concurrent = max_concurrent.max(1);
        self
    }

    /// Feeds a pressure sample. Returns `true` if it caused the transition.
    pub fn observe_pressure(
        &mut self,
        sample: &PressureSample,
        now_ms: u64,
        events: &mut Vec<GovernorEvent>,
    ) -> bool {
        if sample.level == PressureLevel::Critical {
            self.critical_streak = self.critical_streak.saturating_add(1);
        } else {
            self.critical_streak = 0;
        }
        self.critical_streak >= self.config.critical_samples_to_degrade.max(1)
            && self.enter(TriggerReason::MemoryPressure, now_ms, events)
    }

    /// Feeds a frame-drop burst from the watchdog.
    pub fn on_frame_drop_burst(&mut self, now_ms: u64, events: &mut Vec<GovernorEvent>) -> bool {
        self.enter(TriggerReason::FrameDropBurst, now_ms, events)
    }

    /// Records one uncaught error in the trailing window.
    pub fn report_error(&mut self, now_ms: u64, events: &mut Vec<GovernorEvent>) -> bool {
        self.errors.push_back(now_ms);
        self.prune_errors(now_ms);
        log::debug!(
            "DegradationController: {} errors in the last {} ms.",
            self.errors.len(),
            self.config.error_window_ms
        );
        self.errors.len() >= self.config.error_threshold
            && self.enter(TriggerReason::ErrorBurst, now_ms, events)
    }

    /// Feeds the number of consecutive unclean restarts.
    pub fn observe_unclean_restarts(
        &mut self,
        unclean_restarts: u32,
        now_ms: u64,
        events: &mut Vec<GovernorEvent>,
    ) -> bool {
        unclean_restarts >= self.config.repeated_crash_threshold
            && self.enter(TriggerReason::RepeatedCrash, now_ms, events)
    }

    /// Enters Degraded on request.
    pub fn force(&mut self, reason: TriggerReason, now_ms: u64, events: &mut Vec<GovernorEvent>) -> bool {
        self.enter(reason, now_ms, events)
    }

    /// Leaves Degraded and clears the error window. A reset while Normal does nothing.
    pub fn reset(&mut self, now_ms: u64, events: &mut Vec<GovernorEvent>) -> bool {
        if !self.state.is_degraded() {
            return false;
        }
        self.state = DegradationState {
            mode: DegradationMode::Normal,
            entered_at_ms: now_ms,
            trigger_reason: None,
            flags: DegradationFlags::default(),
        };
        self.errors.clear();
        self.critical_streak = 0;
        log::info!("DegradationController: reset to Normal.");
        events.push(GovernorEvent::DegradedModeReset);
        true
    }

    fn enter(&mut self, reason: TriggerReason, now_ms: u64, events: &mut Vec<GovernorEvent>) -> bool {
        if self.state.is_degraded() {
            return false;
        }
        self.state = DegradationState {
            mode: DegradationMode::Degraded,
            entered_at_ms: now_ms,
            trigger_reason: Some(reason),
            flags: DegradationFlags::degraded(self.config.animation_cap_ms, self.degraded_max_concurrent),
        };
        log::info!("DegradationController: entering Degraded ({}).", reason);
        events.push(GovernorEvent::DegradedModeEntered { reason });
        true
    }

    fn prune_errors(&mut self, now_ms: u64) {
        let window = self.config.error_window_ms;
        while self
            .errors
            .front()
            .is_some_and(|at| now_ms.saturating_sub(*at) >= window)
        {
            self.errors.pop_front();
        }
    }

    /// The current state.
    pub fn state(&self) -> DegradationState {
        self.state
    }

    /// Errors currently inside the trailing window.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_core::pressure::SampleSource;

    fn sample(level: PressureLevel) -> PressureSample {
        PressureSample {
            timestamp_ms: 0,
            used_bytes: 0,
            budget_bytes: 1,
            level,
            source: SampleSource::Memory,
        }
    }

    fn controller() -> DegradationController {
        DegradationController::new(DegradationConfig::default(), 0)
    }

    #[test]
    fn test_single_critical_sample_degrades() {
        let mut c = controller();
        let mut events = Vec::new();
        assert!(!c.observe_pressure(&sample(PressureLevel::Warning), 1, &mut events));
        assert!(c.observe_pressure(&sample(PressureLevel::Critical), 2, &mut events));

        let state = c.state();
        assert_eq!(state.mode, DegradationMode::Degraded);
        assert_eq!(state.trigger_reason, Some(TriggerReason::MemoryPressure));
        assert_eq!(state.entered_at_ms, 2);
        assert!(state.flags.disable_ambient_effects);
        assert_eq!(state.flags.animation_duration_cap_ms, Some(150));
        assert_eq!(state.flags.max_concurrent_override, Some(1));
        assert_eq!(
            events,
            vec![GovernorEvent::DegradedModeEntered {
                reason: TriggerReason::MemoryPressure
            }]
        );
    }

    #[test]
    fn test_sustained_critical_requirement() {
        let mut c = DegradationController::new(
            DegradationConfig {
                critical_samples_to_degrade: 2,
                ..DegradationConfig::default()
            },
            0,
        );
        let mut events = Vec::new();
        assert!(!c.observe_pressure(&sample(PressureLevel::Critical), 1, &mut events));
        assert!(!c.observe_pressure(&sample(PressureLevel::Normal), 2, &mut events));
        assert!(!c.observe_pressure(&sample(PressureLevel::Critical), 3, &mut events));
        assert!(c.observe_pressure(&sample(PressureLevel::Critical), 4, &mut events));
    }

    #[test]
    fn test_no_flap_until_reset() {
        let mut c = controller();
        let mut events = Vec::new();
        assert!(c.on_frame_drop_burst(0, &mut events));
        for t in 1..100 {
            c.observe_pressure(&sample(PressureLevel::Normal), t, &mut events);
            assert!(c.state().is_degraded());
        }
        // Further triggers do not re-enter or re-broadcast.
        assert!(!c.force(TriggerReason::Manual, 100, &mut events));
        assert_eq!(events.len(), 1);
        assert_eq!(c.state().trigger_reason, Some(TriggerReason::FrameDropBurst));

        assert!(c.reset(200, &mut events));
        assert_eq!(c.state().mode, DegradationMode::Normal);
        assert_eq!(c.state().flags, DegradationFlags::default());
        assert_eq!(events.last(), Some(&GovernorEvent::DegradedModeReset));
    }

    #[test]
    fn test_reset_while_normal_is_noop() {
        let mut c = controller();
        let mut events = Vec::new();
        assert!(!c.reset(5, &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_error_burst_within_window() {
        let mut c = controller();
        let mut events = Vec::new();
        for i in 0..9 {
            assert!(!c.report_error(i * 1_000, &mut events));
        }
        assert!(c.report_error(59_000, &mut events));
        assert_eq!(c.state().trigger_reason, Some(TriggerReason::ErrorBurst));
    }

    #[test]
    fn test_errors_age_out_of_window() {
        let mut c = controller();
        let mut events = Vec::new();
        for i in 0..9 {
            c.report_error(i * 1_000, &mut events);
        }
        // The first error (t=0) is 60 s old by now and no longer counts.
        assert!(!c.report_error(60_000, &mut events));
        assert_eq!(c.error_count(), 9);
        assert!(!c.state().is_degraded());
    }

    #[test]
    fn test_reset_clears_error_window() {
        let mut c = controller();
        let mut events = Vec::new();
        for i in 0..10 {
            c.report_error(i, &mut events);
        }
        assert!(c.state().is_degraded());
        c.reset(20, &mut events);
        assert_eq!(c.error_count(), 0);
        assert!(!c.report_error(21, &mut events));
    }

    #[test]
    fn test_repeated_crash_threshold() {
        let mut c = controller();
        let mut events = Vec::new();
        assert!(!c.observe_unclean_restarts(1, 0, &mut events));
        assert!(c.observe_unclean_restarts(2, 0, &mut events));
        assert_eq!(c.state().trigger_reason, Some(TriggerReason::RepeatedCrash));
    }
}
