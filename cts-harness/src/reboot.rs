// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device reboot policy.
//!
//! Long runs accumulate device state (leaked popups, stuck animations, input
//! injection failures), so the orchestrator reboots the device between
//! packages under the triggers implemented here. Each trigger is independent;
//! any one of them is sufficient.

use crate::device::is_emulator;
use smol_str::SmolStr;
use std::time::{Duration, Instant};

/// Configuration for the reboot policy.
///
/// The before/after package-name lists encode suite-specific knowledge about
/// packages that leave device state behind (or are sensitive to it); the
/// defaults match the suite's known-problematic packages but can be replaced
/// wholesale.
#[derive(Clone, Debug)]
pub struct RebootPolicyConfig {
    /// Disables rebooting entirely.
    pub disabled: bool,

    /// Reboot once this much wall-clock time has passed since the last reboot.
    pub interval: Duration,

    /// Additional settle time after the device reports boot complete.
    ///
    /// Some devices report "online" before userspace services are actually
    /// ready to run tests.
    pub wait_time: Duration,

    /// Logical package names to reboot after.
    pub reboot_after: Vec<SmolStr>,

    /// Logical package names to reboot before.
    pub reboot_before: Vec<SmolStr>,

    /// Minimum number of distinct logical package names in a run before an
    /// unconditional pre-run reboot is issued.
    pub min_pre_reboot_package_count: usize,
}

impl Default for RebootPolicyConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            interval: Duration::from_secs(30 * 60),
            wait_time: Duration::from_secs(2 * 60),
            reboot_after: vec![
                "CtsMediaTestCases".into(),
                "CtsAccessibilityTestCases".into(),
            ],
            reboot_before: vec![
                "CtsAnimationTestCases".into(),
                "CtsGraphicsTestCases".into(),
                "CtsViewTestCases".into(),
                "CtsWidgetTestCases".into(),
            ],
            min_pre_reboot_package_count: 2,
        }
    }
}

/// Decides when the device should be rebooted.
///
/// Owned by a single orchestrator instance; never shared across shards.
#[derive(Clone, Debug)]
pub struct RebootPolicy {
    config: RebootPolicyConfig,
    last_reboot: Option<Instant>,
}

impl RebootPolicy {
    /// Creates a new policy from its configuration.
    pub fn new(config: RebootPolicyConfig) -> Self {
        Self {
            config,
            last_reboot: None,
        }
    }

    /// Returns the configured post-boot settle time.
    pub fn settle_time(&self) -> Duration {
        self.config.wait_time
    }

    /// Returns true if a run over `distinct_package_count` distinct logical
    /// packages warrants an unconditional reboot before the first package.
    pub fn pre_run_reboot_needed(&self, distinct_package_count: usize) -> bool {
        !self.config.disabled && distinct_package_count >= self.config.min_pre_reboot_package_count
    }

    /// Returns true if the device should be rebooted between the package that
    /// just finished and the package about to run.
    pub fn should_reboot(
        &self,
        serial: &str,
        finished_package: &str,
        next_package: &str,
        now: Instant,
    ) -> bool {
        if self.config.disabled || is_emulator(serial) {
            return false;
        }
        let interval_elapsed = self
            .last_reboot
            .is_none_or(|at| now.duration_since(at) > self.config.interval);
        interval_elapsed
            || self.config.reboot_after.iter().any(|p| p == finished_package)
            || self.config.reboot_before.iter().any(|p| p == next_package)
    }

    /// Records that a reboot completed at `now`.
    pub fn mark_rebooted(&mut self, now: Instant) {
        self.last_reboot = Some(now);
    }
}
