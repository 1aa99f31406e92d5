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

//! Simulated host: a scrolling feed of heavy images driven against a
//! governor running on its own thread.
//!
//! Usage: `sandbox [config.json]`

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use ballast_sdk::prelude::*;

const ROUTE: &str = "/feed";
const IMAGE_COUNT: u64 = 12;
const ROW_HEIGHT_PX: f32 = 400.0;

fn load_config() -> Result<GovernorConfig> {
    match std::env::args().nth(1) {
        Some(path) => GovernorConfig::from_file(&path)
            .with_context(|| format!("Failed to read governor config from {}", path)),
        None => Ok(GovernorConfig::default()),
    }
}

fn builder(config: GovernorConfig) -> GovernorBuilder {
    let snapshot_dir = std::env::temp_dir().join("ballast-sandbox");
    match GovernorBuilder::native(&snapshot_dir) {
        Ok(builder) => builder.with_config(config),
        Err(e) => {
            log::warn!("Native host probes unavailable ({:#}), using defaults.", e);
            GovernorBuilder::new().with_config(config)
        }
    }
}

/// Waits until every ticket is terminal, completing loads as they are admitted.
fn drain_loads(handle: &GovernorHandle, tickets: &[LoadTicket]) -> Result<()> {
    loop {
        let mut pending = false;
        for ticket in tickets {
            match ticket.state() {
                LoadState::Admitted => {
                    // Pretend to fetch the asset.
                    thread::sleep(Duration::from_millis(5));
                    handle.complete(ticket.id())?;
                }
                LoadState::Queued => pending = true,
                _ => {}
            }
        }
        if !pending {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(2));
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut service = builder(load_config()?).spawn();
    let handle = service.handle();
    log::info!("Sandbox: running on {:?}.", handle.status().profile);

    // Log every broadcast from a listener thread.
    let (_, events) = handle.subscribe()?;
    let listener = thread::spawn(move || {
        for event in events.iter() {
            log::info!("Sandbox: <- {} {:?}", event.name(), event);
        }
    });

    match handle.restore_session(ROUTE)? {
        RestoreOutcome::Applied(snapshot) => {
            log::info!("Sandbox: resuming {} at {}px.", snapshot.route_key, snapshot.scroll_offset)
        }
        other => log::info!("Sandbox: fresh start ({:?}).", other),
    }

    // 1. Register the feed's images and queue their loads.
    let mut resources = Vec::new();
    for row in 0..IMAGE_COUNT {
        let handle_size = 4 * 1024 * 1024;
        let id = handle.register_resource(
            ResourceHandle::new(ResourceKind::Image, BoundsRef(row), handle_size, 0),
            move |id, action| log::debug!("Sandbox: image row {} ({}) -> {:?}", row, id, action),
        )?;
        resources.push(id);
    }

    let tickets = (0..IMAGE_COUNT)
        .map(|row| {
            let priority = if row < 2 { Priority::High } else { Priority::Normal };
            handle.enqueue(LoadRequest::new(row, priority))
        })
        .collect::<Result<Vec<_>, _>>()?;
    drain_loads(&handle, &tickets)?;

    // 2. Scroll down the feed at 60 fps.
    for frame in 0..120u32 {
        let scroll_offset = frame as f32 * 30.0;
        for (row, id) in resources.iter().enumerate() {
            let distance = (row as f32 * ROW_HEIGHT_PX - scroll_offset).abs() - ROW_HEIGHT_PX;
            handle.update_visibility(*id, distance)?;
        }
        handle.update_position(ROUTE, scroll_offset as f64)?;
        handle.report_frame_tick()?;
        thread::sleep(Duration::from_millis(16));
    }

    let report = handle.sweep()?;
    log::info!("Sandbox: manual sweep {:?}.", report);

    // 3. A burst of collaborator errors degrades the governor.
    for _ in 0..10 {
        handle.report_error()?;
    }
    thread::sleep(Duration::from_millis(100));
    log::info!("Sandbox: degraded = {}.", handle.status().is_degraded());
    handle.reset_degradation()?;

    // 4. Background and back.
    handle.set_lifecycle(Lifecycle::Background)?;
    thread::sleep(Duration::from_millis(50));
    handle.set_lifecycle(Lifecycle::Foreground)?;

    service.stop();
    let status = service.status();
    log::info!(
        "Sandbox: done. loads {:?}, reclaim {:?}.",
        status.scheduler_stats,
        status.reclaim_stats
    );

    // Dropping the service closes the event stream.
    drop(service);
    drop(handle);
    let _ = listener.join();
    Ok(())
}
