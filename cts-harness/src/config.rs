// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration.
//!
//! The entry point builds a [`HarnessConfig`] (typically from CLI options) and
//! hands it to the orchestrator by value. Validation happens exactly once,
//! before any device interaction, via [`HarnessConfig::selector`].

use crate::{errors::ConfigCheckError, reboot::RebootPolicyConfig};

/// Default maximum number of logcat bytes captured per failure.
pub const DEFAULT_LOGCAT_ON_FAILURE_SIZE: usize = 500 * 1024;

/// The full run configuration for one orchestrator instance.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// The test plan to run.
    pub plan: Option<String>,

    /// The test package(s) to run.
    pub packages: Vec<String>,

    /// The test package(s) to exclude from the run.
    pub exclude_packages: Vec<String>,

    /// Run a specific test class.
    pub class_name: Option<String>,

    /// Run a specific test method, from `class_name`.
    pub method_name: Option<String>,

    /// Run a specific test, as `class#method`.
    pub test_name: Option<String>,

    /// Continue a previous session, running only its not-executed tests.
    pub continue_session: Option<u32>,

    /// Skip the device info collection step. Speeds up short runs at the cost
    /// of omitting device data from the report.
    pub skip_device_info: bool,

    /// Allow an aborted run to be resumed on a connected device.
    pub resume: bool,

    /// Number of separately runnable chunks to split the run into, for
    /// concurrent execution across multiple devices.
    pub shards: usize,

    /// Take a screenshot when the run finishes.
    pub screenshot: bool,

    /// Take a bugreport after each failed test. Can use a lot of disk space.
    pub bugreport_on_failure: bool,

    /// Take a screenshot on every test failure.
    pub screenshot_on_failure: bool,

    /// Take a logcat snapshot on every test failure. Unlike bugreports this
    /// still works after the device connection degrades, and is much cheaper.
    pub logcat_on_failure: bool,

    /// Maximum number of logcat bytes to capture per failure.
    pub logcat_on_failure_size: usize,

    /// Restrict the run to a single ABI.
    pub force_abi: Option<String>,

    /// Include tests marked as known failures.
    pub run_known_failures: bool,

    /// Reboot policy settings.
    pub reboot: RebootPolicyConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            plan: None,
            packages: Vec::new(),
            exclude_packages: Vec::new(),
            class_name: None,
            method_name: None,
            test_name: None,
            continue_session: None,
            skip_device_info: false,
            resume: false,
            shards: 1,
            screenshot: false,
            bugreport_on_failure: false,
            screenshot_on_failure: false,
            logcat_on_failure: false,
            logcat_on_failure_size: DEFAULT_LOGCAT_ON_FAILURE_SIZE,
            force_abi: None,
            run_known_failures: false,
            reboot: RebootPolicyConfig::default(),
        }
    }
}

/// The single active selector of a validated configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector<'a> {
    /// Run a named plan.
    Plan(&'a str),

    /// Run the named packages.
    Packages(&'a [String]),

    /// Run one class, optionally narrowed to one method.
    Class {
        /// The class name.
        class: &'a str,
        /// The method name, if any.
        method: Option<&'a str>,
    },

    /// Run a single test, as `class#method`.
    Test(&'a str),

    /// Continue a previous session.
    ContinueSession(u32),
}

impl HarnessConfig {
    /// Validates the configuration and returns the single active selector.
    ///
    /// Exactly one of plan/package/class/test/continue-session must be set;
    /// anything else is a fatal configuration error raised here, before any
    /// device interaction.
    pub fn selector(&self) -> Result<Selector<'_>, ConfigCheckError> {
        if self.method_name.is_some() && self.class_name.is_none() {
            return Err(ConfigCheckError::MethodRequiresClass);
        }
        if self.shards < 1 {
            return Err(ConfigCheckError::InvalidShardCount { count: self.shards });
        }

        let mut selectors = Vec::new();
        if let Some(plan) = &self.plan {
            selectors.push(Selector::Plan(plan));
        }
        if !self.packages.is_empty() {
            selectors.push(Selector::Packages(&self.packages));
        }
        if let Some(class) = &self.class_name {
            selectors.push(Selector::Class {
                class,
                method: self.method_name.as_deref(),
            });
        }
        if let Some(test) = &self.test_name {
            selectors.push(Selector::Test(test));
        }
        if let Some(id) = self.continue_session {
            selectors.push(Selector::ContinueSession(id));
        }

        match selectors.len() {
            1 => Ok(selectors.remove(0)),
            _ => Err(ConfigCheckError::SelectorConflict),
        }
    }

    /// Validates the configuration without extracting the selector.
    pub fn validate(&self) -> Result<(), ConfigCheckError> {
        self.selector().map(|_| ())
    }
}
