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

//! Acts as the agent for heavy asset loads.
//!
//! Collaborators submit a [`LoadRequest`](ballast_core::load::LoadRequest) and
//! receive a ticket; the actual fetch is theirs to perform once admitted. The
//! scheduler only decides *when* each load may start, keeping the number of
//! concurrent loads inside the device's budget.

mod scheduler;

pub use self::scheduler::{LoadScheduler, SchedulerStats};
