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
use std::thread;
use std::time::Duration;

use ballast_control::{Governor, GovernorService};
use ballast_core::clock::SystemClock;
use ballast_core::config::{GovernorConfig, ServiceConfig};
use ballast_core::error::{GovernorError, ProbeError};
use ballast_core::event::GovernorEvent;
use ballast_core::load::{LoadId, LoadRequest, LoadState, Priority};
use ballast_core::pressure::{MemoryProbe, MemoryUsage, NoMemorySignal};
use ballast_core::profile::DeviceProfile;
use ballast_core::resource::{BoundsRef, ReclaimAction, ResourceHandle, ResourceKind};
use ballast_core::session::{MemorySnapshotStore, SnapshotStore};

fn spawn_service(store: MemorySnapshotStore) -> GovernorService {
    let governor = Governor::new(
        GovernorConfig::default(),
        DeviceProfile::default(),
        Box::new(NoMemorySignal),
        Box::new(store),
        Arc::new(SystemClock),
    );
    let mut service = GovernorService::new(
        governor,
        ServiceConfig {
            tick_rate: 100,
            ..ServiceConfig::default()
        },
    );
    service.start();
    service
}

#[test]
fn test_concurrent_enqueues_never_exceed_budget() {
    // --- 1. ARRANGE ---
    let service = spawn_service(MemorySnapshotStore::new());
    let handle = service.handle();
    let (_, events) = handle.subscribe().unwrap();

    // --- 2. ACT ---
    // Eight producer threads race 1000 requests into the control loop.
    let producers: Vec<_> = (0..8u64)
        .map(|worker| {
            let handle = handle.clone();
            thread::spawn(move || {
                (0..125u64)
                    .map(|i| handle.enqueue(LoadRequest::new(worker * 1_000 + i, Priority::Normal)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let results: Vec<_> = producers
        .into_iter()
        .flat_map(|p| p.join().unwrap())
        .collect();
    thread::sleep(Duration::from_millis(50));

    // --- 3. ASSERT ---
    let status = handle.status();
    assert_eq!(status.max_concurrent, 2);
    assert_eq!(status.admitted, 2);
    assert_eq!(status.queued, 200);

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 202);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, GovernorError::QueueOverflow(_))));

    let admitted = events
        .try_iter()
        .filter(|e| matches!(e, GovernorEvent::LoadAdmitted(_)))
        .count();
    assert_eq!(admitted, 2, "Only two loads may ever be admitted at once");
}

#[test]
fn test_ticket_follows_admission_across_threads() {
    // --- 1. ARRANGE ---
    let service = spawn_service(MemorySnapshotStore::new());
    let handle = service.handle();
    let first = handle.enqueue(LoadRequest::new(1, Priority::Normal)).unwrap();
    let second = handle.enqueue(LoadRequest::new(2, Priority::Normal)).unwrap();
    let mut third = handle.enqueue(LoadRequest::new(3, Priority::Low)).unwrap();
    assert_eq!(first.state(), LoadState::Admitted);
    assert_eq!(second.state(), LoadState::Admitted);
    assert_eq!(third.state(), LoadState::Queued);

    // --- 2. ACT ---
    let completer = handle.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        completer.complete(LoadId(1)).unwrap();
    });

    // --- 3. ASSERT ---
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let state = runtime.block_on(third.wait_admitted());
    assert_eq!(state, LoadState::Admitted);
}

#[test]
fn test_stop_writes_clean_snapshot() {
    // --- 1. ARRANGE ---
    let store = MemorySnapshotStore::new();
    let mut service = spawn_service(store.clone());
    let handle = service.handle();
    handle.update_position("/shop", 320.0).unwrap();

    // --- 2. ACT ---
    thread::sleep(Duration::from_millis(50));
    service.stop();

    // --- 3. ASSERT ---
    let mut reader = store.clone();
    let snapshot = reader.load().unwrap().expect("a final snapshot is written on stop");
    assert_eq!(snapshot.route_key, "/shop");
    assert!(snapshot.clean_shutdown);
    assert_eq!(handle.status().unclean_restarts, 0);
    assert!(matches!(handle.report_error(), Err(GovernorError::ServiceStopped)));
}

/// Memory readings that stall the control loop.
struct StallingProbe(Duration);

impl MemoryProbe for StallingProbe {
    fn sample(&mut self) -> Result<Option<MemoryUsage>, ProbeError> {
        thread::sleep(self.0);
        Ok(None)
    }
}

#[test]
fn test_request_in_flight_at_stop_is_released() {
    // --- 1. ARRANGE ---
    let governor = Governor::new(
        GovernorConfig::default(),
        DeviceProfile::default(),
        Box::new(StallingProbe(Duration::from_millis(500))),
        Box::new(MemorySnapshotStore::new()),
        Arc::new(SystemClock),
    );
    let mut service = GovernorService::new(
        governor,
        ServiceConfig {
            tick_rate: 100,
            ..ServiceConfig::default()
        },
    );
    service.start();
    let handle = service.handle();

    // --- 2. ACT ---
    // The request lands while the loop is stuck in its first sample.
    let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);
    let caller = handle.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let _ = outcome_tx.send(caller.enqueue(LoadRequest::new(1, Priority::Normal)));
    });
    thread::sleep(Duration::from_millis(200));
    service.stop();

    // --- 3. ASSERT ---
    let outcome = outcome_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("the waiting caller must be released once the service stops");
    assert!(matches!(outcome, Err(GovernorError::ServiceStopped)));
    assert!(matches!(
        handle.enqueue(LoadRequest::new(2, Priority::Normal)),
        Err(GovernorError::ServiceStopped)
    ));
}

#[test]
fn test_reclaim_callback_hands_off_to_owner_thread() {
    // --- 1. ARRANGE ---
    let service = spawn_service(MemorySnapshotStore::new());
    let handle = service.handle();
    // The callback runs on the control loop, so it only forwards the request.
    let (action_tx, action_rx) = crossbeam_channel::unbounded();
    let id = handle
        .register_resource(
            ResourceHandle::new(ResourceKind::Image, BoundsRef(7), 4 * 1024 * 1024, 0),
            move |id, action| {
                let _ = action_tx.send((id, action));
            },
        )
        .unwrap();
    handle.update_visibility(id, 10_000.0).unwrap();

    // --- 2. ACT ---
    let report = handle.sweep().unwrap();
    let (released, action) = action_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("the reclaim request reaches the owner");
    // The owner reacts on its own thread, where calling back is safe.
    let forgotten = handle.deregister(released);

    // --- 3. ASSERT ---
    assert_eq!(report.released, 1);
    assert_eq!((released, action), (id, ReclaimAction::Release));
    assert!(forgotten.is_ok());
    assert!(matches!(
        handle.deregister(id),
        Err(GovernorError::UnknownResource(_))
    ));
}
