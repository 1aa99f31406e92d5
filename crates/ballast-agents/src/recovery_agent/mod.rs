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

//! Acts as the agent for crash and session recovery.
//!
//! Two independent duties share one component: periodically snapshotting the
//! session position, and restoring it once at startup. It also tracks how many
//! sessions in a row ended without a clean shutdown, which the control layer
//! turns into a repeated-crash degradation trigger.

mod recovery;

pub use self::recovery::{RestoreOutcome, SessionRecovery};
