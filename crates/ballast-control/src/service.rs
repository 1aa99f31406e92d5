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

//! Threaded host for the governor.
//!
//! [`GovernorService`] moves a [`Governor`] onto a dedicated control-loop
//! thread. Every mutation arrives as a [`GovernorCommand`] over one bounded
//! channel, so commands from any number of threads are applied one at a time
//! in arrival order. Timers are polled at `tick_rate`, and a fresh
//! [`GovernorStatus`] is published after every iteration.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use ballast_agents::{RestoreOutcome, SweepReport};
use ballast_core::config::ServiceConfig;
use ballast_core::degradation::TriggerReason;
use ballast_core::error::GovernorError;
use ballast_core::event::{GovernorEvent, SubscriptionId};
use ballast_core::load::{LoadId, LoadRequest, LoadTicket};
use ballast_core::resource::{ReclaimAction, ReclaimCallback, ResourceHandle, ResourceId};
use ballast_core::session::Lifecycle;

use crate::context::GovernorStatus;
use crate::governor::Governor;

type Reply<T> = Sender<T>;

/// A request executed on the control-loop thread.
pub enum GovernorCommand {
    /// Submit a load request.
    Enqueue(LoadRequest, Reply<Result<LoadTicket, GovernorError>>),
    /// Cancel a load request.
    Cancel(LoadId, Reply<Result<(), GovernorError>>),
    /// Complete an admitted load request.
    Complete(LoadId, Reply<Result<(), GovernorError>>),
    /// Fail an admitted load request.
    Fail(LoadId, Reply<Result<(), GovernorError>>),
    /// Register a heavy resource.
    RegisterResource(ResourceHandle, ReclaimCallback, Reply<ResourceId>),
    /// Forget a heavy resource.
    Deregister(ResourceId, Reply<Result<ResourceHandle, GovernorError>>),
    /// Toggle keep-alive on a resource.
    SetKeepAlive(ResourceId, bool, Reply<Result<(), GovernorError>>),
    /// Report a resource's distance from the viewport.
    UpdateVisibility(ResourceId, f32),
    /// Run a manual sweep.
    Sweep(Reply<SweepReport>),
    /// Record one uncaught error.
    ReportError,
    /// Feed one tick to the frame watchdog.
    ReportFrameTick,
    /// Enter Degraded on request.
    ForceDegraded(TriggerReason, Reply<bool>),
    /// Leave Degraded.
    ResetDegradation(Reply<bool>),
    /// Apply a host visibility change.
    SetLifecycle(Lifecycle),
    /// Record the reading position.
    UpdatePosition(String, f64),
    /// Attempt the one-shot session restore.
    RestoreSession(String, Reply<RestoreOutcome>),
    /// Add a channel subscriber.
    Subscribe(Reply<(SubscriptionId, flume::Receiver<GovernorEvent>)>),
    /// Remove a subscriber.
    Unsubscribe(SubscriptionId),
}

impl GovernorCommand {
    fn apply(self, governor: &mut Governor) {
        // A dropped reply receiver only means the caller stopped waiting.
        match self {
            GovernorCommand::Enqueue(request, reply) => {
                let _ = reply.send(governor.enqueue(request));
            }
            GovernorCommand::Cancel(id, reply) => {
                let _ = reply.send(governor.cancel(id));
            }
            GovernorCommand::Complete(id, reply) => {
                let _ = reply.send(governor.complete(id));
            }
            GovernorCommand::Fail(id, reply) => {
                let _ = reply.send(governor.fail(id));
            }
            GovernorCommand::RegisterResource(handle, callback, reply) => {
                let _ = reply.send(governor.register_resource(handle, callback));
            }
            GovernorCommand::Deregister(id, reply) => {
                let _ = reply.send(governor.deregister(id));
            }
            GovernorCommand::SetKeepAlive(id, keep_alive, reply) => {
                let _ = reply.send(governor.set_keep_alive(id, keep_alive));
            }
            GovernorCommand::UpdateVisibility(id, distance_px) => {
                if let Err(e) = governor.update_visibility(id, distance_px) {
                    log::debug!("GovernorService: visibility update dropped: {}", e);
                }
            }
            GovernorCommand::Sweep(reply) => {
                let _ = reply.send(governor.sweep());
            }
            GovernorCommand::ReportError => governor.report_error(),
            GovernorCommand::ReportFrameTick => governor.report_frame_tick(),
            GovernorCommand::ForceDegraded(reason, reply) => {
                let _ = reply.send(governor.force_degraded(reason));
            }
            GovernorCommand::ResetDegradation(reply) => {
                let _ = reply.send(governor.reset_degradation());
            }
            GovernorCommand::SetLifecycle(lifecycle) => governor.set_lifecycle(lifecycle),
            GovernorCommand::UpdatePosition(route_key, scroll_offset) => {
                governor.update_position(route_key, scroll_offset)
            }
            GovernorCommand::RestoreSession(route, reply) => {
                let _ = reply.send(governor.restore_session(&route));
            }
            GovernorCommand::Subscribe(reply) => {
                let _ = reply.send(governor.subscribe_channel());
            }
            GovernorCommand::Unsubscribe(id) => {
                governor.unsubscribe(id);
            }
        }
    }
}

impl std::fmt::Debug for GovernorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GovernorCommand::Enqueue(..) => "Enqueue",
            GovernorCommand::Cancel(..) => "Cancel",
            GovernorCommand::Complete(..) => "Complete",
            GovernorCommand::Fail(..) => "Fail",
            GovernorCommand::RegisterResource(..) => "RegisterResource",
            GovernorCommand::Deregister(..) => "Deregister",
            GovernorCommand::SetKeepAlive(..) => "SetKeepAlive",
            GovernorCommand::UpdateVisibility(..) => "UpdateVisibility",
            GovernorCommand::Sweep(..) => "Sweep",
            GovernorCommand::ReportError => "ReportError",
            GovernorCommand::ReportFrameTick => "ReportFrameTick",
            GovernorCommand::ForceDegraded(..) => "ForceDegraded",
            GovernorCommand::ResetDegradation(..) => "ResetDegradation",
            GovernorCommand::SetLifecycle(..) => "SetLifecycle",
            GovernorCommand::UpdatePosition(..) => "UpdatePosition",
            GovernorCommand::RestoreSession(..) => "RestoreSession",
            GovernorCommand::Subscribe(..) => "Subscribe",
            GovernorCommand::Unsubscribe(..) => "Unsubscribe",
        };
        f.write_str(name)
    }
}

/// The governor control-loop service.
pub struct GovernorService {
    config: ServiceConfig,
    governor: Option<Governor>,
    status: Arc<RwLock<GovernorStatus>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    command_tx: Sender<GovernorCommand>,
    command_rx: Receiver<GovernorCommand>,
    // Held by the loop thread; its drop wakes every waiting handle.
    alive_tx: Option<Sender<()>>,
    alive_rx: Receiver<()>,
}

impl GovernorService {
    /// Wraps a governor. Nothing runs until [`start`](Self::start).
    pub fn new(governor: Governor, config: ServiceConfig) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_buffer_size.max(1));
        let (alive_tx, alive_rx) = crossbeam_channel::bounded(0);
        Self {
            config,
            status: Arc::new(RwLock::new(governor.status())),
            governor: Some(governor),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            command_tx,
            command_rx,
            alive_tx: Some(alive_tx),
            alive_rx,
        }
    }

    /// Starts the control-loop thread. The governor moves onto it, so a
    /// stopped service cannot be restarted.
    pub fn start(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(mut governor) = self.governor.take() else {
            log::warn!("GovernorService: already ran once, not restarting.");
            return;
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let status = Arc::clone(&self.status);
        let command_rx = self.command_rx.clone();
        let alive_tx = self.alive_tx.take();
        let tick_duration = Duration::from_secs_f32(1.0 / self.config.tick_rate.max(1) as f32);

        let handle = thread::spawn(move || {
            log::info!("GovernorService thread started.");

            while running.load(Ordering::Relaxed) {
                let deadline = Instant::now() + tick_duration;

                // 1. Apply commands as they arrive until the tick is over.
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match command_rx.recv_timeout(remaining) {
                        Ok(command) => {
                            log::trace!("GovernorService: applying {:?}.", command);
                            command.apply(&mut governor);
                            publish(&status, &governor);
                        }
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => {
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }

                // 2. Timers
                governor.poll();
                publish(&status, &governor);
            }

            governor.shutdown();
            publish(&status, &governor);

            // Commands that raced the stop are dropped unapplied, closing their replies.
            let stranded = command_rx.try_iter().count();
            if stranded > 0 {
                log::debug!("GovernorService: dropped {} pending commands on stop.", stranded);
            }
            drop(alive_tx);
            log::info!("GovernorService thread stopped.");
        });

        self.handle = Some(handle);
    }

    /// Stops the control-loop thread after it writes the final snapshot.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("GovernorService: control-loop thread panicked.");
            }
        }
        // A service that never started still has to release its waiters.
        self.alive_tx = None;
        for command in self.command_rx.try_iter() {
            log::debug!("GovernorService: dropping {:?} sent after stop.", command);
        }
    }

    /// Returns `true` while the control loop runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A cloneable handle for issuing commands from any thread.
    pub fn handle(&self) -> GovernorHandle {
        GovernorHandle {
            command_tx: self.command_tx.clone(),
            status: Arc::clone(&self.status),
            running: Arc::clone(&self.running),
            alive_rx: self.alive_rx.clone(),
        }
    }

    /// The status published at the end of the last loop iteration.
    pub fn status(&self) -> GovernorStatus {
        read_status(&self.status)
    }
}

impl Drop for GovernorService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for GovernorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernorService")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

fn publish(status: &RwLock<GovernorStatus>, governor: &Governor) {
    match status.write() {
        Ok(mut guard) => *guard = governor.status(),
        Err(poisoned) => *poisoned.into_inner() = governor.status(),
    }
}

fn read_status(status: &RwLock<GovernorStatus>) -> GovernorStatus {
    match status.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Sender-side API of a running [`GovernorService`].
///
/// Methods that return a value block until the control loop has applied the
/// command. All of them fail with [`GovernorError::ServiceStopped`] once the
/// service is no longer running, including calls already waiting when it stops.
///
/// Reclaim callbacks and callback subscribers run on the control-loop thread.
/// They must not call back into a handle: the loop would wait on itself.
#[derive(Debug, Clone)]
pub struct GovernorHandle {
    command_tx: Sender<GovernorCommand>,
    status: Arc<RwLock<GovernorStatus>>,
    running: Arc<AtomicBool>,
    alive_rx: Receiver<()>,
}

impl GovernorHandle {
    fn send(&self, command: GovernorCommand) -> Result<(), GovernorError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(GovernorError::ServiceStopped);
        }
        // `alive_rx` never carries a message; it only becomes ready on disconnect.
        crossbeam_channel::select! {
            send(self.command_tx, command) -> sent => sent.map_err(|_| GovernorError::ServiceStopped),
            recv(self.alive_rx) -> _ => Err(GovernorError::ServiceStopped),
        }
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> GovernorCommand) -> Result<T, GovernorError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send(build(reply_tx))?;
        crossbeam_channel::select! {
            recv(reply_rx) -> reply => reply.map_err(|_| GovernorError::ServiceStopped),
            // The loop may have answered just before exiting.
            recv(self.alive_rx) -> _ => reply_rx.try_recv().map_err(|_| GovernorError::ServiceStopped),
        }
    }

    /// Submits a load request.
    pub fn enqueue(&self, request: LoadRequest) -> Result<LoadTicket, GovernorError> {
        self.request(|reply| GovernorCommand::Enqueue(request, reply))?
    }

    /// Cancels a load request.
    pub fn cancel(&self, id: LoadId) -> Result<(), GovernorError> {
        self.request(|reply| GovernorCommand::Cancel(id, reply))?
    }

    /// Completes an admitted load request.
    pub fn complete(&self, id: LoadId) -> Result<(), GovernorError> {
        self.request(|reply| GovernorCommand::Complete(id, reply))?
    }

    /// Fails an admitted load request.
    pub fn fail(&self, id: LoadId) -> Result<(), GovernorError> {
        self.request(|reply| GovernorCommand::Fail(id, reply))?
    }

    /// Registers a heavy resource and its reclaim callback.
    ///
    /// The callback runs on the control-loop thread and must not call this
    /// handle, or any clone of it, before returning.
    pub fn register_resource<F>(&self, handle: ResourceHandle, callback: F) -> Result<ResourceId, GovernorError>
    where
        F: FnMut(ResourceId, ReclaimAction) + Send + 'static,
    {
        let callback: ReclaimCallback = Box::new(callback);
        self.request(|reply| GovernorCommand::RegisterResource(handle, callback, reply))
    }

    /// Forgets a heavy resource.
    pub fn deregister(&self, id: ResourceId) -> Result<ResourceHandle, GovernorError> {
        self.request(|reply| GovernorCommand::Deregister(id, reply))?
    }

    /// Toggles keep-alive on a resource.
    pub fn set_keep_alive(&self, id: ResourceId, keep_alive: bool) -> Result<(), GovernorError> {
        self.request(|reply| GovernorCommand::SetKeepAlive(id, keep_alive, reply))?
    }

    /// Reports a resource's distance from the viewport.
    pub fn update_visibility(&self, id: ResourceId, distance_px: f32) -> Result<(), GovernorError> {
        self.send(GovernorCommand::UpdateVisibility(id, distance_px))
    }

    /// Runs a manual sweep.
    pub fn sweep(&self) -> Result<SweepReport, GovernorError> {
        self.request(GovernorCommand::Sweep)
    }

    /// Records one uncaught error.
    pub fn report_error(&self) -> Result<(), GovernorError> {
        self.send(GovernorCommand::ReportError)
    }

    /// Feeds one tick to the frame watchdog.
    pub fn report_frame_tick(&self) -> Result<(), GovernorError> {
        self.send(GovernorCommand::ReportFrameTick)
    }

    /// Enters Degraded on request.
    pub fn force_degraded(&self, reason: TriggerReason) -> Result<bool, GovernorError> {
        self.request(|reply| GovernorCommand::ForceDegraded(reason, reply))
    }

    /// Leaves Degraded.
    pub fn reset_degradation(&self) -> Result<bool, GovernorError> {
        self.request(GovernorCommand::ResetDegradation)
    }

    /// Applies a host visibility change.
    pub fn set_lifecycle(&self, lifecycle: Lifecycle) -> Result<(), GovernorError> {
        self.send(GovernorCommand::SetLifecycle(lifecycle))
    }

    /// Records the reading position.
    pub fn update_position(&self, route_key: impl Into<String>, scroll_offset: f64) -> Result<(), GovernorError> {
        self.send(GovernorCommand::UpdatePosition(route_key.into(), scroll_offset))
    }

    /// Attempts the one-shot session restore.
    pub fn restore_session(&self, current_route: impl Into<String>) -> Result<RestoreOutcome, GovernorError> {
        let route = current_route.into();
        self.request(|reply| GovernorCommand::RestoreSession(route, reply))
    }

    /// Adds a channel subscriber.
    pub fn subscribe(&self) -> Result<(SubscriptionId, flume::Receiver<GovernorEvent>), GovernorError> {
        self.request(GovernorCommand::Subscribe)
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), GovernorError> {
        self.send(GovernorCommand::Unsubscribe(id))
    }

    /// The status published at the end of the last loop iteration.
    pub fn status(&self) -> GovernorStatus {
        read_status(&self.status)
    }
}
