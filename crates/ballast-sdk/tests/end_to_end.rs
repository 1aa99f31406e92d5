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

use std::sync::Arc;

use ballast_sdk::prelude::*;

fn tier_one_mobile() -> HostHints {
    HostHints::new()
        .with_memory_gb(1.0)
        .with_platform(PlatformClass::Mobile)
        .with_constrained_host(false)
}

#[test]
fn test_scenario_low_end_mobile_admits_one_load() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new(0);
    let mut governor = GovernorBuilder::new()
        .with_hints(tier_one_mobile())
        .with_clock(Arc::new(clock.clone()))
        .build();
    assert_eq!(governor.profile().tier, Tier::MIN);
    let (_, events) = governor.subscribe_channel();

    // --- 2. ACT ---
    let tickets: Vec<LoadTicket> = (1..=3)
        .map(|id| governor.enqueue(LoadRequest::new(id, Priority::Normal)).unwrap())
        .collect();

    // --- 3. ASSERT ---
    let states: Vec<LoadState> = tickets.iter().map(LoadTicket::state).collect();
    assert_eq!(states, vec![LoadState::Admitted, LoadState::Queued, LoadState::Queued]);
    let status = governor.status();
    assert_eq!((status.admitted, status.queued, status.max_concurrent), (1, 2, 1));
    assert_eq!(events.try_iter().collect::<Vec<_>>(), vec![GovernorEvent::LoadAdmitted(LoadId(1))]);

    // The two queued requests are admitted in arrival order.
    governor.complete(LoadId(1)).unwrap();
    assert_eq!(tickets[1].state(), LoadState::Admitted);
    assert_eq!(tickets[2].state(), LoadState::Queued);
}

#[test]
fn test_scenario_frame_drop_burst_degrades() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new(0);
    let mut governor = GovernorBuilder::new()
        .with_clock(Arc::new(clock.clone()))
        .build();
    let (_, events) = governor.subscribe_channel();

    // --- 2. ACT ---
    // 61 ticks give 60 consecutive deltas of 81 ms.
    for _ in 0..61 {
        clock.advance(81);
        governor.report_frame_tick();
    }

    // --- 3. ASSERT ---
    let state = governor.degradation();
    assert_eq!(state.mode, DegradationMode::Degraded);
    assert_eq!(state.trigger_reason, Some(TriggerReason::FrameDropBurst));
    assert_eq!(
        events.try_iter().collect::<Vec<_>>(),
        vec![GovernorEvent::DegradedModeEntered {
            reason: TriggerReason::FrameDropBurst
        }]
    );
}

#[test]
fn test_scenario_stale_snapshot_is_skipped_and_removed() {
    // --- 1. ARRANGE ---
    let mut store = MemorySnapshotStore::new();
    store
        .save(&SessionSnapshot {
            scroll_offset: 900.0,
            route_key: "/games".into(),
            saved_at: 0,
            unclean_restarts: 0,
            clean_shutdown: true,
        })
        .unwrap();
    let clock = ManualClock::new(70_000);
    let mut governor = GovernorBuilder::new()
        .with_store(store.clone())
        .with_clock(Arc::new(clock))
        .build();
    let (_, events) = governor.subscribe_channel();

    // --- 2. ACT ---
    let outcome = governor.restore_session("/games");

    // --- 3. ASSERT ---
    assert_eq!(outcome, RestoreOutcome::Stale);
    assert!(!store.is_occupied(), "The snapshot is deleted after the single read");
    assert_eq!(events.try_iter().count(), 0);
}
