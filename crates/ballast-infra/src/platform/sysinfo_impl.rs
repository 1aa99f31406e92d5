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

//! sysinfo-based host hints and memory probe.

use anyhow::{anyhow, Result};
use ballast_core::error::ProbeError;
use ballast_core::pressure::{MemoryProbe, MemoryUsage};
use ballast_core::profile::{HostHints, PlatformClass};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, ProcessesToUpdate, RefreshKind, System};

const BYTES_PER_GB: f32 = 1024.0 * 1024.0 * 1024.0;

/// Reads the machine's memory and core count once, for the profiler.
pub struct SysinfoHostProbe {
    system: System,
}

impl SysinfoHostProbe {
    /// Creates a probe with memory and CPU figures refreshed.
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::nothing()),
        );
        Self { system }
    }

    /// Builds host hints from the machine.
    ///
    /// A container memory limit, when present and lower, wins over physical RAM.
    pub fn hints(&self) -> HostHints {
        let physical = self.system.total_memory();
        let limited = self
            .system
            .cgroup_limits()
            .map(|limits| limits.total_memory)
            .filter(|limit| *limit > 0 && *limit < physical);
        let total_bytes = limited.unwrap_or(physical);

        let mut hints = HostHints::new()
            .with_platform(platform_class(std::env::consts::OS))
            .with_constrained_host(false);
        if total_bytes > 0 {
            hints = hints.with_memory_gb(total_bytes as f32 / BYTES_PER_GB);
        }
        let cores = self.system.cpus().len();
        if cores > 0 {
            hints = hints.with_cores(cores as u32);
        }

        log::debug!(
            "SysinfoHostProbe: {} bytes ({}), {} cores.",
            total_bytes,
            if limited.is_some() { "cgroup" } else { "physical" },
            cores
        );
        hints
    }
}

impl Default for SysinfoHostProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples the resident memory of one process.
pub struct SysinfoMemoryProbe {
    system: System,
    pid: Pid,
}

impl SysinfoMemoryProbe {
    /// Creates a probe for the current process.
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("Cannot resolve current process: {}", e))?;
        Ok(Self::for_pid(pid))
    }

    /// Creates a probe for another process.
    pub fn for_pid(pid: Pid) -> Self {
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn sample(&mut self) -> std::result::Result<Option<MemoryUsage>, ProbeError> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system.refresh_memory();

        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| ProbeError(format!("process {} is not visible", self.pid)))?;
        let limit_bytes = self
            .system
            .cgroup_limits()
            .map(|limits| limits.total_memory)
            .filter(|limit| *limit > 0);

        Ok(Some(MemoryUsage {
            used_bytes: process.memory(),
            limit_bytes,
        }))
    }
}

fn platform_class(os: &str) -> PlatformClass {
    match os {
        "android" | "ios" => PlatformClass::Mobile,
        _ => PlatformClass::Desktop,
    }
}
