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

//! Concurrency-limited admission queue for heavy asset loads.

use std::collections::{HashMap, VecDeque};

use ballast_core::config::SchedulerConfig;
use ballast_core::error::GovernorError;
use ballast_core::event::GovernorEvent;
use ballast_core::load::{LoadId, LoadNotifier, LoadRequest, LoadState, LoadTicket, Priority};
use ballast_core::profile::{DeviceProfile, PlatformClass};

const BAND_COUNT: usize = Priority::DESCENDING.len();

/// Which admission lane an in-flight request occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    /// Bounded by `max_concurrent`.
    Normal,
    /// Critical bypass, bounded by the critical ceiling.
    Critical,
}

#[derive(Debug)]
struct Tracked {
    request: LoadRequest,
    notifier: LoadNotifier,
    lane: Option<Lane>,
}

/// Lifetime counters of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Requests admitted.
    pub admitted: u64,
    /// Requests completed.
    pub completed: u64,
    /// Requests failed by their caller.
    pub failed: u64,
    /// Requests cancelled, queued or admitted.
    pub cancelled: u64,
    /// Requests dropped on overflow.
    pub dropped: u64,
}

/// The Load Scheduler.
///
/// Keeps one FIFO queue per priority band and admits requests, most urgent
/// band first, while the live-admission count stays within `max_concurrent`.
/// Critical requests are admitted immediately into a separate lane bounded by
/// `critical_ceiling`; once that lane is full they wait at the head of the
/// queue like everybody else.
#[derive(Debug)]
pub struct LoadScheduler {
    config: SchedulerConfig,
    base_max_concurrent: usize,
    degraded: bool,
    bands: [VecDeque<LoadId>; BAND_COUNT],
    live: HashMap<LoadId, Tracked>,
    admitted: usize,
    critical_admitted: usize,
    stats: SchedulerStats,
}

impl LoadScheduler {
    /// Creates a scheduler whose concurrency budget follows `profile`.
    pub fn new(config: SchedulerConfig, profile: &DeviceProfile) -> Self {
        let base_max_concurrent = match profile.platform_class {
            PlatformClass::Mobile => config.mobile_max_concurrent,
            _ => config.default_max_concurrent,
        }
        .max(1);
        log::info!(
            "LoadScheduler: max {} concurrent loads on {:?}.",
            base_max_concurrent,
            profile.platform_class
        );
        Self {
            config,
            base_max_concurrent,
            degraded: false,
            bands: Default::default(),
            live: HashMap::new(),
            admitted: 0,
            critical_admitted: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// The current concurrency budget of the normal lane.
    pub fn max_concurrent(&self) -> usize {
        if self.degraded {
            self.config
                .degraded_max_concurrent
                .clamp(1, self.base_max_concurrent)
        } else {
            self.base_max_concurrent
        }
    }

    /// Submits a request and returns the ticket through which its state is delivered.
    ///
    /// The request may already be Admitted when this returns, but callers must
    /// not rely on it.
    pub fn enqueue(
        &mut self,
        mut request: LoadRequest,
        now_ms: u64,
        events: &mut Vec<GovernorEvent>,
    ) -> Result<LoadTicket, GovernorError> {
        let id = request.id;
        if self.live.contains_key(&id) {
            return Err(GovernorError::DuplicateRequest(id));
        }

        request.enqueued_at_ms = now_ms;
        request.state = LoadState::Queued;
        let priority = request.priority;
        let (notifier, ticket) = LoadTicket::channel(id);

        if priority == Priority::Critical && self.critical_admitted < self.config.critical_ceiling {
            self.live.insert(
                id,
                Tracked {
                    request,
                    notifier,
                    lane: None,
                },
            );
            self.admit(id, Lane::Critical, events);
            return Ok(ticket);
        }

        if self.queued_count() >= self.config.max_pending {
            self.shed_for(id, priority, &notifier, events)?;
        }

        self.bands[priority.band()].push_back(id);
        self.live.insert(
            id,
            Tracked {
                request,
                notifier,
                lane: None,
            },
        );
        log::trace!("LoadScheduler: {} queued at {:?}.", id, priority);

        self.pump(events);
        Ok(ticket)
    }

    /// Makes room for an incoming request by tail-dropping the newest request
    /// of the lowest non-empty band. The incoming request counts as the newest
    /// of its band, so it is the victim whenever no lower band is occupied.
    fn shed_for(
        &mut self,
        incoming: LoadId,
        priority: Priority,
        notifier: &LoadNotifier,
        events: &mut Vec<GovernorEvent>,
    ) -> Result<(), GovernorError> {
        let lowest_occupied = Priority::DESCENDING
            .iter()
            .rev()
            .map(|p| p.band())
            .take_while(|band| *band != Priority::Critical.band())
            .find(|band| !self.bands[*band].is_empty());

        let victim_band = match lowest_occupied {
            Some(band) if band > priority.band() => band,
            _ if priority != Priority::Critical => {
                log::warn!(
                    "LoadScheduler: queue full ({} pending), dropping incoming {}.",
                    self.queued_count(),
                    incoming
                );
                notifier.notify(LoadState::Failed);
                self.stats.dropped += 1;
                events.push(GovernorEvent::LoadFailed(incoming));
                return Err(GovernorError::QueueOverflow(incoming));
            }
            // Critical requests are never shed; the bound is exceeded instead.
            _ => {
                log::warn!(
                    "LoadScheduler: queue full of critical work, admitting {} past the bound.",
                    incoming
                );
                return Ok(());
            }
        };

        if let Some(victim) = self.bands[victim_band].pop_back() {
            if let Some(tracked) = self.live.remove(&victim) {
                log::warn!(
                    "LoadScheduler: queue full, dropping {} ({:?}).",
                    victim,
                    tracked.request.priority
                );
                tracked.notifier.notify(LoadState::Failed);
            }
            self.stats.dropped += 1;
            events.push(GovernorEvent::LoadFailed(victim));
        }
        Ok(())
    }

    /// Marks an admitted request as completed and advances the queue.
    pub fn complete(&mut self, id: LoadId, events: &mut Vec<GovernorEvent>) -> Result<(), GovernorError> {
        self.finish_admitted(id, LoadState::Completed, events)
    }

    /// Marks an admitted request as failed and advances the queue.
    pub fn fail(&mut self, id: LoadId, events: &mut Vec<GovernorEvent>) -> Result<(), GovernorError> {
        self.finish_admitted(id, LoadState::Failed, events)
    }

    /// Withdraws a request.
    ///
    /// A queued request is removed without side effects. For an admitted one the
    /// in-flight work must be aborted by its owner; the scheduler only frees the
    /// slot and advances the queue.
    pub fn cancel(&mut self, id: LoadId, events: &mut Vec<GovernorEvent>) -> Result<(), GovernorError> {
        let tracked = self
            .live
            .get(&id)
            .ok_or(GovernorError::UnknownRequest(id))?;

        if tracked.lane.is_none() {
            let band = tracked.request.priority.band();
            self.bands[band].retain(|queued| *queued != id);
            if let Some(tracked) = self.live.remove(&id) {
                tracked.notifier.notify(LoadState::Cancelled);
            }
            self.stats.cancelled += 1;
            log::trace!("LoadScheduler: queued {} cancelled.", id);
            return Ok(());
        }

        self.finish_admitted(id, LoadState::Cancelled, events)
    }

    fn finish_admitted(
        &mut self,
        id: LoadId,
        target: LoadState,
        events: &mut Vec<GovernorEvent>,
    ) -> Result<(), GovernorError> {
        let tracked = self
            .live
            .get(&id)
            .ok_or(GovernorError::UnknownRequest(id))?;
        let from = tracked.request.state;
        let lane = match tracked.lane {
            Some(lane) if from.can_transition_to(target) => lane,
            _ => return Err(GovernorError::InvalidTransition { id, from, to: target }),
        };

        if let Some(tracked) = self.live.remove(&id) {
            tracked.notifier.notify(target);
        }
        match lane {
            Lane::Normal => self.admitted = self.admitted.saturating_sub(1),
            Lane::Critical => self.critical_admitted = self.critical_admitted.saturating_sub(1),
        }

        match target {
            LoadState::Completed => {
                self.stats.completed += 1;
                events.push(GovernorEvent::LoadCompleted(id));
            }
            LoadState::Failed => {
                self.stats.failed += 1;
                events.push(GovernorEvent::LoadFailed(id));
            }
            _ => {
                self.stats.cancelled += 1;
                events.push(GovernorEvent::LoadCancelled(id));
            }
        }
        log::trace!("LoadScheduler: {} -> {:?}.", id, target);

        self.pump(events);
        Ok(())
    }

    /// Switches between the normal and the degraded concurrency budget.
    ///
    /// Lowering the budget never revokes in-flight work; it only gates future
    /// admissions.
    pub fn set_degraded(&mut self, degraded: bool, events: &mut Vec<GovernorEvent>) {
        if self.degraded == degraded {
            return;
        }
        self.degraded = degraded;
        log::info!(
            "LoadScheduler: concurrency budget is now {}.",
            self.max_concurrent()
        );
        self.pump(events);
    }

    /// Admits queued requests while capacity allows: the critical lane first,
    /// then the normal lane in strict band order, FIFO within a band.
    fn pump(&mut self, events: &mut Vec<GovernorEvent>) {
        let critical = Priority::Critical.band();
        while self.critical_admitted < self.config.critical_ceiling {
            let Some(id) = self.bands[critical].pop_front() else {
                break;
            };
            self.admit(id, Lane::Critical, events);
        }

        while self.admitted < self.max_concurrent() {
            let Some(id) = self.bands.iter_mut().find_map(VecDeque::pop_front) else {
                break;
            };
            self.admit(id, Lane::Normal, events);
        }
    }

    fn admit(&mut self, id: LoadId, lane: Lane, events: &mut Vec<GovernorEvent>) {
        let Some(tracked) = self.live.get_mut(&id) else {
            return;
        };
        if !tracked.request.state.can_transition_to(LoadState::Admitted) {
            log::warn!("LoadScheduler: {} is {:?}, not admitting.", id, tracked.request.state);
            return;
        }
        tracked.lane = Some(lane);
        tracked.request.state = LoadState::Admitted;
        tracked.notifier.notify(LoadState::Admitted);
        match lane {
            Lane::Normal => self.admitted += 1,
            Lane::Critical => self.critical_admitted += 1,
        }
        self.stats.admitted += 1;
        log::debug!(
            "LoadScheduler: {} admitted ({:?} lane, {}/{} in flight).",
            id,
            lane,
            self.admitted,
            self.max_concurrent()
        );
        events.push(GovernorEvent::LoadAdmitted(id));
    }

    /// In-flight requests in the normal lane. Never exceeds [`Self::max_concurrent`].
    pub fn admitted_count(&self) -> usize {
        self.admitted
    }

    /// In-flight requests in the critical lane.
    pub fn critical_in_flight(&self) -> usize {
        self.critical_admitted
    }

    /// Requests waiting for capacity.
    pub fn queued_count(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    /// Queued request ids in the order they would be admitted.
    pub fn queued_ids(&self) -> Vec<LoadId> {
        self.bands.iter().flatten().copied().collect()
    }

    /// Current state of a live request. `None` once it reached a terminal state.
    pub fn state(&self, id: LoadId) -> Option<LoadState> {
        self.live.get(&id).map(|tracked| tracked.request.state)
    }

    /// Lifetime counters.
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_core::profile::Tier;

    fn profile(platform: PlatformClass) -> DeviceProfile {
        DeviceProfile {
            tier: Tier::new(3),
            memory_budget_bytes: Tier::new(3).memory_budget_bytes(),
            logical_core_count: 4,
            is_constrained_host_context: false,
            platform_class: platform,
        }
    }

    fn scheduler(platform: PlatformClass) -> LoadScheduler {
        LoadScheduler::new(SchedulerConfig::default(), &profile(platform))
    }

    fn enqueue(s: &mut LoadScheduler, id: u64, priority: Priority) -> LoadTicket {
        let mut events = Vec::new();
        s.enqueue(LoadRequest::new(id, priority), id, &mut events)
            .unwrap()
    }

    #[test]
    fn test_budget_follows_platform_and_mode() {
        let mut events = Vec::new();
        let mut desktop = scheduler(PlatformClass::Desktop);
        assert_eq!(desktop.max_concurrent(), 2);
        desktop.set_degraded(true, &mut events);
        assert_eq!(desktop.max_concurrent(), 1);
        assert_eq!(scheduler(PlatformClass::Mobile).max_concurrent(), 1);
        assert_eq!(scheduler(PlatformClass::Tablet).max_concurrent(), 2);
    }

    #[test]
    fn test_admits_up_to_budget() {
        let mut s = scheduler(PlatformClass::Desktop);
        let a = enqueue(&mut s, 1, Priority::Normal);
        let b = enqueue(&mut s, 2, Priority::Normal);
        let c = enqueue(&mut s, 3, Priority::Normal);

        assert_eq!(a.state(), LoadState::Admitted);
        assert_eq!(b.state(), LoadState::Admitted);
        assert_eq!(c.state(), LoadState::Queued);
        assert_eq!(s.admitted_count(), 2);
        assert_eq!(s.queued_ids(), vec![LoadId(3)]);
    }

    #[test]
    fn test_high_admitted_before_low() {
        let mut s = scheduler(PlatformClass::Mobile);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        let low = enqueue(&mut s, 2, Priority::Low);
        let high = enqueue(&mut s, 3, Priority::High);

        s.complete(LoadId(1), &mut events).unwrap();
        assert_eq!(high.state(), LoadState::Admitted);
        assert_eq!(low.state(), LoadState::Queued);
        assert_eq!(
            events,
            vec![
                GovernorEvent::LoadCompleted(LoadId(1)),
                GovernorEvent::LoadAdmitted(LoadId(3)),
            ]
        );
    }

    #[test]
    fn test_fifo_within_band() {
        let mut s = scheduler(PlatformClass::Mobile);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        for id in 2..=5 {
            enqueue(&mut s, id, Priority::Normal);
        }
        assert_eq!(
            s.queued_ids(),
            vec![LoadId(2), LoadId(3), LoadId(4), LoadId(5)]
        );
        s.fail(LoadId(1), &mut events).unwrap();
        assert_eq!(s.state(LoadId(2)), Some(LoadState::Admitted));
        assert_eq!(s.state(LoadId(1)), None);
    }

    #[test]
    fn test_critical_bypasses_queue_up_to_ceiling() {
        let mut s = scheduler(PlatformClass::Mobile);
        enqueue(&mut s, 1, Priority::Normal);
        enqueue(&mut s, 2, Priority::High);

        let c1 = enqueue(&mut s, 3, Priority::Critical);
        let c2 = enqueue(&mut s, 4, Priority::Critical);
        let c3 = enqueue(&mut s, 5, Priority::Critical);

        assert_eq!(c1.state(), LoadState::Admitted);
        assert_eq!(c2.state(), LoadState::Admitted);
        assert_eq!(c3.state(), LoadState::Queued);
        assert_eq!(s.critical_in_flight(), 2);
        assert_eq!(s.admitted_count(), 1);
        // The waiting critical request is next in line, ahead of High.
        assert_eq!(s.queued_ids(), vec![LoadId(5), LoadId(2)]);
    }

    #[test]
    fn test_cancel_queued_has_no_side_effects() {
        let mut s = scheduler(PlatformClass::Mobile);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        let queued = enqueue(&mut s, 2, Priority::Normal);

        s.cancel(LoadId(2), &mut events).unwrap();
        assert!(events.is_empty());
        assert_eq!(queued.state(), LoadState::Cancelled);
        assert_eq!(s.queued_count(), 0);
        assert_eq!(s.admitted_count(), 1);
    }

    #[test]
    fn test_cancel_admitted_advances_queue() {
        let mut s = scheduler(PlatformClass::Mobile);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        let next = enqueue(&mut s, 2, Priority::Normal);

        s.cancel(LoadId(1), &mut events).unwrap();
        assert_eq!(next.state(), LoadState::Admitted);
        assert_eq!(
            events,
            vec![
                GovernorEvent::LoadCancelled(LoadId(1)),
                GovernorEvent::LoadAdmitted(LoadId(2)),
            ]
        );
    }

    #[test]
    fn test_rejects_misuse() {
        let mut s = scheduler(PlatformClass::Mobile);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        enqueue(&mut s, 2, Priority::Normal);

        assert_eq!(
            s.enqueue(LoadRequest::new(1u64, Priority::Low), 0, &mut events)
                .unwrap_err(),
            GovernorError::DuplicateRequest(LoadId(1))
        );
        assert_eq!(
            s.complete(LoadId(2), &mut events).unwrap_err(),
            GovernorError::InvalidTransition {
                id: LoadId(2),
                from: LoadState::Queued,
                to: LoadState::Completed,
            }
        );
        assert_eq!(
            s.cancel(LoadId(9), &mut events).unwrap_err(),
            GovernorError::UnknownRequest(LoadId(9))
        );

        s.complete(LoadId(1), &mut events).unwrap();
        assert_eq!(
            s.complete(LoadId(1), &mut events).unwrap_err(),
            GovernorError::UnknownRequest(LoadId(1))
        );
        // Request 2 took the freed slot and is now allowed to finish.
        assert_eq!(s.state(LoadId(2)), Some(LoadState::Admitted));
        assert!(s.fail(LoadId(2), &mut events).is_ok());
    }

    #[test]
    fn test_overflow_drops_newest_low_first() {
        let config = SchedulerConfig {
            max_pending: 3,
            ..SchedulerConfig::default()
        };
        let mut s = LoadScheduler::new(config, &profile(PlatformClass::Mobile));
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal); // admitted
        enqueue(&mut s, 2, Priority::Low);
        let newest_low = enqueue(&mut s, 3, Priority::Low);
        enqueue(&mut s, 4, Priority::Normal);

        // A High arrival evicts the newest Low.
        s.enqueue(LoadRequest::new(5u64, Priority::High), 5, &mut events)
            .unwrap();
        assert_eq!(newest_low.state(), LoadState::Failed);
        assert_eq!(events, vec![GovernorEvent::LoadFailed(LoadId(3))]);
        assert_eq!(s.queued_ids(), vec![LoadId(5), LoadId(4), LoadId(2)]);

        // A Low arrival is itself the newest Low.
        events.clear();
        let err = s
            .enqueue(LoadRequest::new(6u64, Priority::Low), 6, &mut events)
            .unwrap_err();
        assert_eq!(err, GovernorError::QueueOverflow(LoadId(6)));
        assert_eq!(events, vec![GovernorEvent::LoadFailed(LoadId(6))]);
        assert_eq!(s.queued_count(), 3);
        assert_eq!(s.stats().dropped, 2);
    }

    #[test]
    fn test_degrading_keeps_in_flight_work() {
        let mut s = scheduler(PlatformClass::Desktop);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        enqueue(&mut s, 2, Priority::Normal);
        enqueue(&mut s, 3, Priority::Normal);

        s.set_degraded(true, &mut events);
        assert_eq!(s.admitted_count(), 2);

        s.complete(LoadId(1), &mut events).unwrap();
        assert_eq!(s.state(LoadId(3)), Some(LoadState::Queued));
        s.complete(LoadId(2), &mut events).unwrap();
        assert_eq!(s.state(LoadId(3)), Some(LoadState::Admitted));
    }

    #[tokio::test]
    async fn test_ticket_resolves_on_admission() {
        let mut s = scheduler(PlatformClass::Mobile);
        let mut events = Vec::new();
        enqueue(&mut s, 1, Priority::Normal);
        let mut waiting = enqueue(&mut s, 2, Priority::Normal);

        let waiter = tokio::spawn(async move { waiting.wait_admitted().await });
        s.complete(LoadId(1), &mut events).unwrap();
        assert_eq!(waiter.await.unwrap(), LoadState::Admitted);
    }
}
