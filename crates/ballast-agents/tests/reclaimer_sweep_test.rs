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

use std::sync::{Arc, Mutex};

use ballast_agents::{ResourceReclaimer, SweepTarget};
use ballast_core::config::ReclaimConfig;
use ballast_core::event::GovernorEvent;
use ballast_core::pressure::PressureLevel;
use ballast_core::profile::{DeviceProfile, Tier};
use ballast_core::resource::{
    BoundsRef, ReclaimAction, ResidencyState, ResourceHandle, ResourceId, ResourceKind, SweepReason,
};

const MIB: u64 = 1024 * 1024;

type ActionLog = Arc<Mutex<Vec<(ResourceId, ReclaimAction)>>>;

fn register(
    reclaimer: &mut ResourceReclaimer,
    log: &ActionLog,
    kind: ResourceKind,
    size: u64,
) -> ResourceId {
    let log = Arc::clone(log);
    reclaimer.register(
        ResourceHandle::new(kind, BoundsRef(0), size, 0),
        Box::new(move |id, action| log.lock().unwrap().push((id, action))),
    )
}

#[test]
fn test_critical_sweep_then_restore_on_return() {
    // --- 1. ARRANGE ---
    // A tier-3 profile keeps a 500 px margin around the viewport.
    let profile = DeviceProfile {
        tier: Tier::new(3),
        memory_budget_bytes: Tier::new(3).memory_budget_bytes(),
        ..DeviceProfile::default()
    };
    let mut reclaimer = ResourceReclaimer::new(ReclaimConfig::default(), &profile, 0);
    let log: ActionLog = Arc::default();
    let mut events = Vec::new();

    let image = register(&mut reclaimer, &log, ResourceKind::Image, 8 * MIB);
    let video = register(&mut reclaimer, &log, ResourceKind::Video, 16 * MIB);
    let canvas = register(&mut reclaimer, &log, ResourceKind::Canvas, 4 * MIB);
    let pinned = register(&mut reclaimer, &log, ResourceKind::Image, 32 * MIB);
    reclaimer.set_keep_alive(pinned, true).unwrap();

    // Everything scrolls just past the video/canvas lines but inside the release margin.
    for id in [image, video, canvas, pinned] {
        reclaimer.update_visibility(id, 400.0, 0, &mut events).unwrap();
    }

    // --- 2. ACT ---
    let report = reclaimer.sweep(
        SweepReason::Pressure(PressureLevel::Critical),
        10_000,
        None,
        &mut events,
    );

    // --- 3. ASSERT ---
    assert_eq!((report.released, report.paused, report.shrunk), (0, 1, 1));
    assert_eq!(reclaimer.residency(image), Some(ResidencyState::Resident));
    assert_eq!(reclaimer.residency(video), Some(ResidencyState::Paused));
    assert_eq!(reclaimer.residency(canvas), Some(ResidencyState::Shrunk));
    assert_eq!(reclaimer.residency(pinned), Some(ResidencyState::Resident));
    assert!(events.is_empty(), "Pausing and shrinking are not releases");

    // Scrolling back restores both, silently since neither was released.
    reclaimer.update_visibility(video, 0.0, 11_000, &mut events).unwrap();
    reclaimer.update_visibility(canvas, 100.0, 11_000, &mut events).unwrap();
    assert!(events.is_empty());
    assert_eq!(reclaimer.residency(video), Some(ResidencyState::Resident));
    assert_eq!(reclaimer.residency(canvas), Some(ResidencyState::Resident));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (video, ReclaimAction::Pause),
            (canvas, ReclaimAction::Shrink),
            (video, ReclaimAction::Restore),
            (canvas, ReclaimAction::Restore),
        ]
    );
    assert_eq!(reclaimer.stats().restored, 2);
}

#[test]
fn test_pressure_sweep_stops_below_warning() {
    // --- 1. ARRANGE ---
    let mut reclaimer = ResourceReclaimer::new(ReclaimConfig::default(), &DeviceProfile::default(), 0);
    let log: ActionLog = Arc::default();
    let mut events = Vec::new();

    // Registered at t=0..3 so the oldest is released first.
    let mut ids = Vec::new();
    for t in 0..4u64 {
        let log = Arc::clone(&log);
        let id = reclaimer.register(
            ResourceHandle::new(ResourceKind::Image, BoundsRef(t), 10 * MIB, t),
            Box::new(move |id, action| log.lock().unwrap().push((id, action))),
        );
        reclaimer.update_visibility(id, 5_000.0, t, &mut events).unwrap();
        ids.push(id);
    }

    // --- 2. ACT ---
    // 80 of 100 MiB used; two releases bring it to 60 %.
    let report = reclaimer.sweep(
        SweepReason::Pressure(PressureLevel::Warning),
        60_000,
        Some(SweepTarget {
            used_bytes: 80 * MIB,
            budget_bytes: 100 * MIB,
            warning_ratio: 0.70,
        }),
        &mut events,
    );

    // --- 3. ASSERT ---
    assert_eq!(report.released, 2);
    assert_eq!(report.freed_bytes, 20 * MIB);
    assert_eq!(
        events,
        vec![
            GovernorEvent::ResourceReleased(ids[0]),
            GovernorEvent::ResourceReleased(ids[1])
        ]
    );
    assert_eq!(reclaimer.residency(ids[3]), Some(ResidencyState::Resident));
}
