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

//! Heavy-asset load requests and their admission tickets.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Caller-supplied unique identifier for a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoadId(pub u64);

impl From<u64> for LoadId {
    fn from(value: u64) -> Self {
        LoadId(value)
    }
}

impl std::fmt::Display for LoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// Request priority band.
///
/// The derived ordering runs from least to most urgent, so `Critical` is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Background prefetch.
    Low,
    /// Default priority.
    Normal,
    /// Visible soon.
    High,
    /// Bypasses the queue up to a hard ceiling.
    Critical,
}

impl Priority {
    /// All bands, most urgent first.
    pub const DESCENDING: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Index of this band in [`Priority::DESCENDING`].
    pub fn band(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// Lifecycle of a load request. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    /// Waiting for capacity.
    Queued,
    /// Allowed to proceed; the caller performs the actual fetch.
    Admitted,
    /// Finished successfully.
    Completed,
    /// Finished with an error, or dropped on overflow.
    Failed,
    /// Withdrawn by the caller.
    Cancelled,
}

impl LoadState {
    /// Returns `true` for Completed, Failed, and Cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadState::Completed | LoadState::Failed | LoadState::Cancelled
        )
    }

    /// Checks whether a transition to `next` moves forward.
    ///
    /// A queued request can be admitted, cancelled, or dropped as failed, but
    /// only an admitted one can complete.
    pub fn can_transition_to(self, next: LoadState) -> bool {
        match self {
            LoadState::Queued => matches!(
                next,
                LoadState::Admitted | LoadState::Cancelled | LoadState::Failed
            ),
            LoadState::Admitted => next.is_terminal(),
            _ => false,
        }
    }
}

/// A request to fetch one heavy visual asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Unique identifier.
    pub id: LoadId,
    /// Priority band.
    pub priority: Priority,
    /// Time of enqueue, stamped by the scheduler.
    pub enqueued_at_ms: u64,
    /// Current state.
    pub state: LoadState,
}

impl LoadRequest {
    /// Creates a queued request.
    pub fn new(id: impl Into<LoadId>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            priority,
            enqueued_at_ms: 0,
            state: LoadState::Queued,
        }
    }
}

/// Scheduler-side half of a ticket.
#[derive(Debug)]
pub struct LoadNotifier {
    sender: watch::Sender<LoadState>,
}

impl LoadNotifier {
    /// Publishes a new state to the ticket holder. Never fails, even when the
    /// ticket has been dropped.
    pub fn notify(&self, state: LoadState) {
        self.sender.send_replace(state);
    }
}

/// Caller-side handle through which admission is delivered asynchronously.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    id: LoadId,
    receiver: watch::Receiver<LoadState>,
}

impl LoadTicket {
    /// Creates a linked notifier/ticket pair in the Queued state.
    pub fn channel(id: LoadId) -> (LoadNotifier, LoadTicket) {
        let (sender, receiver) = watch::channel(LoadState::Queued);
        (LoadNotifier { sender }, LoadTicket { id, receiver })
    }

    /// The request this ticket tracks.
    pub fn id(&self) -> LoadId {
        self.id
    }

    /// The most recently published state.
    pub fn state(&self) -> LoadState {
        *self.receiver.borrow()
    }

    /// Waits until the request leaves the Queued state.
    pub async fn wait_admitted(&mut self) -> LoadState {
        self.wait_until(|s| s != LoadState::Queued).await
    }

    /// Waits until the request reaches a terminal state.
    pub async fn wait_terminal(&mut self) -> LoadState {
        self.wait_until(LoadState::is_terminal).await
    }

    async fn wait_until(&mut self, done: impl Fn(LoadState) -> bool) -> LoadState {
        loop {
            let current = *self.receiver.borrow_and_update();
            if done(current) {
                return current;
            }
            if self.receiver.changed().await.is_err() {
                // Scheduler gone; report whatever was published last.
                return *self.receiver.borrow();
            }
        }
    }
}
