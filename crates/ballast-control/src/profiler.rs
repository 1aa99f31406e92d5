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

//! Environment profiling.
//!
//! The `EnvironmentProfiler` turns raw host hints into a [`DeviceProfile`]:
//! 1. **Baseline**: reported memory mapped to a tier by fixed breakpoints.
//! 2. **Constrained host**: one tier down inside restrictive embeddings.
//! 3. **Low-end mobile**: one more tier down for phones under 3 GB.
//!
//! Absent or implausible memory short-circuits to the conservative tier.

use ballast_core::profile::{DeviceProfile, HostHints, PlatformClass, Tier};

/// Memory breakpoints (GB, inclusive upper bound) for tiers 1 to 4.
const MEMORY_BREAKPOINTS_GB: [f32; 4] = [1.0, 2.0, 4.0, 8.0];
/// Mobile hosts below this amount of memory lose one more tier.
const LOW_END_MOBILE_GB: f32 = 3.0;
/// Reported memory above this is treated as bogus.
const MAX_PLAUSIBLE_GB: f32 = 1024.0;
/// Core count assumed when the host does not report one.
const DEFAULT_CORES: u32 = 2;

/// User-agent markers of in-app browsers and web views.
const IN_APP_MARKERS: [&str; 9] = [
    "fban", "fbav", "instagram", "line/", "twitter", "tiktok", "musical_ly", "snapchat", "; wv)",
];

/// One-shot host capability classifier.
pub struct EnvironmentProfiler;

impl EnvironmentProfiler {
    /// Classifies the host. Deterministic for a given set of hints.
    pub fn profile(hints: &HostHints) -> DeviceProfile {
        let user_agent = hints.user_agent.as_deref().unwrap_or_default();
        let platform_class = hints
            .platform
            .unwrap_or_else(|| Self::classify_platform(user_agent, hints.max_touch_points));
        let is_constrained_host_context = hints
            .constrained_host
            .unwrap_or_else(|| Self::is_in_app_browser(user_agent));
        let logical_core_count = hints
            .logical_cores
            .filter(|cores| *cores > 0)
            .unwrap_or(DEFAULT_CORES);

        let tier = match hints.device_memory_gb.filter(|gb| Self::is_plausible(*gb)) {
            None => {
                log::debug!("EnvironmentProfiler: no usable memory hint, assuming {}.", Tier::CONSERVATIVE);
                Tier::CONSERVATIVE
            }
            Some(memory_gb) => {
                let mut tier = Self::baseline_tier(memory_gb);
                if is_constrained_host_context {
                    tier = tier.downgrade();
                }
                if platform_class == PlatformClass::Mobile && memory_gb < LOW_END_MOBILE_GB {
                    tier = tier.downgrade();
                }
                tier
            }
        };

        log::info!(
            "EnvironmentProfiler: {} ({:?}, {} cores, constrained={}).",
            tier,
            platform_class,
            logical_core_count,
            is_constrained_host_context
        );

        DeviceProfile {
            tier,
            memory_budget_bytes: tier.memory_budget_bytes(),
            logical_core_count,
            is_constrained_host_context,
            platform_class,
        }
    }

    /// Maps reported memory to a tier before any downgrade.
    pub fn baseline_tier(memory_gb: f32) -> Tier {
        let index = MEMORY_BREAKPOINTS_GB
            .iter()
            .position(|limit| memory_gb <= *limit)
            .unwrap_or(MEMORY_BREAKPOINTS_GB.len());
        Tier::new(index as i32 + 1)
    }

    /// Derives the platform class from a user-agent string.
    pub fn classify_platform(user_agent: &str, max_touch_points: Option<u32>) -> PlatformClass {
        let ua = user_agent.to_ascii_lowercase();
        // iPadOS reports a desktop Macintosh agent; touch support gives it away.
        let touch_mac = ua.contains("macintosh") && max_touch_points.unwrap_or(0) > 1;
        if ua.contains("ipad") || ua.contains("tablet") || touch_mac {
            PlatformClass::Tablet
        } else if ["mobi", "android", "iphone", "ipod"]
            .iter()
            .any(|marker| ua.contains(marker))
        {
            PlatformClass::Mobile
        } else {
            PlatformClass::Desktop
        }
    }

    /// Detects in-app browsers and Android web views.
    pub fn is_in_app_browser(user_agent: &str) -> bool {
        let ua = user_agent.to_ascii_lowercase();
        IN_APP_MARKERS.iter().any(|marker| ua.contains(marker))
    }

    fn is_plausible(memory_gb: f32) -> bool {
        memory_gb.is_finite() && memory_gb > 0.0 && memory_gb <= MAX_PLAUSIBLE_GB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15";
    const INSTAGRAM: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) Mobile Safari/537.36 Instagram 300.0";
    const WEBVIEW: &str = "Mozilla/5.0 (Linux; Android 12; SM-A515F; wv) AppleWebKit/537.36";

    #[test]
    fn test_baseline_breakpoints() {
        let cases = [(0.5, 1), (1.0, 1), (2.0, 2), (3.0, 3), (4.0, 3), (6.0, 4), (8.0, 4), (16.0, 5)];
        for (gb, expected) in cases {
            assert_eq!(EnvironmentProfiler::baseline_tier(gb).get(), expected, "{} GB", gb);
        }
    }

    #[test]
    fn test_desktop_profile() {
        let profile = EnvironmentProfiler::profile(
            &HostHints::new().with_memory_gb(8.0).with_cores(8).with_user_agent(MAC),
        );
        assert_eq!(profile.tier.get(), 4);
        assert_eq!(profile.platform_class, PlatformClass::Desktop);
        assert_eq!(profile.logical_core_count, 8);
        assert_eq!(profile.memory_budget_bytes, 512 * 1024 * 1024);
        assert!(!profile.is_constrained_host_context);
    }

    #[test]
    fn test_constrained_low_end_mobile_downgrades_twice() {
        let profile =
            EnvironmentProfiler::profile(&HostHints::new().with_memory_gb(2.0).with_user_agent(INSTAGRAM));
        assert_eq!(profile.platform_class, PlatformClass::Mobile);
        assert!(profile.is_constrained_host_context);
        // 2 -> constrained 1 -> low-end mobile clamps at 1.
        assert_eq!(profile.tier, Tier::MIN);
    }

    #[test]
    fn test_low_end_mobile_only() {
        let profile =
            EnvironmentProfiler::profile(&HostHints::new().with_memory_gb(2.5).with_user_agent(IPHONE));
        assert_eq!(profile.tier.get(), 2);

        let roomy =
            EnvironmentProfiler::profile(&HostHints::new().with_memory_gb(4.0).with_user_agent(IPHONE));
        assert_eq!(roomy.tier.get(), 3);
    }

    #[test]
    fn test_implausible_memory_is_conservative() {
        for gb in [f32::NAN, f32::INFINITY, 0.0, -4.0, 4096.0] {
            let profile = EnvironmentProfiler::profile(
                &HostHints::new().with_memory_gb(gb).with_user_agent(INSTAGRAM),
            );
            assert_eq!(profile.tier, Tier::CONSERVATIVE);
        }
        assert_eq!(EnvironmentProfiler::profile(&HostHints::new()).tier, Tier::CONSERVATIVE);
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(EnvironmentProfiler::classify_platform(IPHONE, None), PlatformClass::Mobile);
        assert_eq!(EnvironmentProfiler::classify_platform(IPAD, None), PlatformClass::Tablet);
        assert_eq!(EnvironmentProfiler::classify_platform(MAC, Some(5)), PlatformClass::Tablet);
        assert_eq!(EnvironmentProfiler::classify_platform(MAC, Some(0)), PlatformClass::Desktop);
        assert_eq!(EnvironmentProfiler::classify_platform("", None), PlatformClass::Desktop);
    }

    #[test]
    fn test_in_app_detection() {
        assert!(EnvironmentProfiler::is_in_app_browser(INSTAGRAM));
        assert!(EnvironmentProfiler::is_in_app_browser(WEBVIEW));
        assert!(!EnvironmentProfiler::is_in_app_browser(IPHONE));
    }

    #[test]
    fn test_explicit_hints_override_user_agent() {
        let profile = EnvironmentProfiler::profile(
            &HostHints::new()
                .with_memory_gb(16.0)
                .with_user_agent(INSTAGRAM)
                .with_platform(PlatformClass::Desktop)
                .with_constrained_host(false),
        );
        assert_eq!(profile.tier, Tier::MAX);
    }

    #[test]
    fn test_tier_always_in_range() {
        for gb in [0.25_f32, 0.75, 1.5, 2.9, 3.1, 5.0, 12.0, 64.0, 1024.0] {
            for platform in [PlatformClass::Desktop, PlatformClass::Mobile, PlatformClass::Tablet] {
                for constrained in [false, true] {
                    let hints = HostHints::new()
                        .with_memory_gb(gb)
                        .with_platform(platform)
                        .with_constrained_host(constrained);
                    let first = EnvironmentProfiler::profile(&hints);
                    assert!(first.tier >= Tier::MIN && first.tier <= Tier::MAX);
                    assert_eq!(first, EnvironmentProfiler::profile(&hints));
                }
            }
        }
    }
}
