// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result reporting pipeline.
//!
//! The orchestrator emits run events to a [`RunListener`]. Between the raw
//! listener and the orchestrator sit a per-package [`ResultFilter`], which
//! reconciles reported results against the package's known-test manifest, and
//! optional [`FailureCapture`] decorators that attach device captures to
//! failures.

mod failure;
mod filter;

pub use failure::FailureCapture;
pub use filter::{FilteredListener, ResultFilter};

use crate::repo::TestPackageDef;
use bytes::Bytes;
use cts_metadata::TestIdentifier;
use std::{collections::BTreeMap, time::Duration};

/// Run metric key carrying the logical package name.
pub const PACKAGE_NAME_METRIC: &str = "packageName";

/// Run metric key carrying the package ABI.
pub const PACKAGE_ABI_METRIC: &str = "packageAbi";

/// Run metric key carrying the package content digest.
pub const PACKAGE_DIGEST_METRIC: &str = "packageDigest";

/// The run name used for the device info metrics forwarded at the start of a
/// run.
pub const DEVICE_INFO_RUN_NAME: &str = "device-info";

/// Key/value metrics attached to run and test events.
pub type RunMetrics = BTreeMap<String, String>;

/// The content type of a logged byte stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    /// Plain text (logcat, bugreport).
    Text,

    /// A PNG image (screenshot).
    Png,
}

/// Downstream consumer of run events.
///
/// Report rendering is outside the harness; implementations range from XML
/// result writers to the in-memory recorders used in tests.
pub trait RunListener {
    /// A test run (one package execution) started.
    fn test_run_started(&mut self, run_name: &str, test_count: usize);

    /// A test case started.
    fn test_started(&mut self, test: &TestIdentifier);

    /// A test case failed. Always preceded by `test_started` and followed by
    /// `test_ended` for the same test.
    fn test_failed(&mut self, test: &TestIdentifier, trace: &str);

    /// A test case was never executed; synthesized by the result filter so
    /// known-test totals reconcile.
    fn test_ignored(&mut self, test: &TestIdentifier);

    /// A test case finished.
    fn test_ended(&mut self, test: &TestIdentifier, metrics: &RunMetrics);

    /// The test run finished.
    fn test_run_ended(&mut self, elapsed: Duration, metrics: &RunMetrics);

    /// A byte stream (screenshot, bugreport, logcat) was captured.
    fn test_log(&mut self, name: &str, log_type: LogType, data: Bytes);
}

impl<L: RunListener + ?Sized> RunListener for &mut L {
    fn test_run_started(&mut self, run_name: &str, test_count: usize) {
        (**self).test_run_started(run_name, test_count);
    }

    fn test_started(&mut self, test: &TestIdentifier) {
        (**self).test_started(test);
    }

    fn test_failed(&mut self, test: &TestIdentifier, trace: &str) {
        (**self).test_failed(test, trace);
    }

    fn test_ignored(&mut self, test: &TestIdentifier) {
        (**self).test_ignored(test);
    }

    fn test_ended(&mut self, test: &TestIdentifier, metrics: &RunMetrics) {
        (**self).test_ended(test, metrics);
    }

    fn test_run_ended(&mut self, elapsed: Duration, metrics: &RunMetrics) {
        (**self).test_run_ended(elapsed, metrics);
    }

    fn test_log(&mut self, name: &str, log_type: LogType, data: Bytes) {
        (**self).test_log(name, log_type, data);
    }
}

impl<L: RunListener + ?Sized> RunListener for Box<L> {
    fn test_run_started(&mut self, run_name: &str, test_count: usize) {
        (**self).test_run_started(run_name, test_count);
    }

    fn test_started(&mut self, test: &TestIdentifier) {
        (**self).test_started(test);
    }

    fn test_failed(&mut self, test: &TestIdentifier, trace: &str) {
        (**self).test_failed(test, trace);
    }

    fn test_ignored(&mut self, test: &TestIdentifier) {
        (**self).test_ignored(test);
    }

    fn test_ended(&mut self, test: &TestIdentifier, metrics: &RunMetrics) {
        (**self).test_ended(test, metrics);
    }

    fn test_run_ended(&mut self, elapsed: Duration, metrics: &RunMetrics) {
        (**self).test_run_ended(elapsed, metrics);
    }

    fn test_log(&mut self, name: &str, log_type: LogType, data: Bytes) {
        (**self).test_log(name, log_type, data);
    }
}

/// Forwards a package's identity and digest to the listener as a zero-count
/// run, so reports can associate results with the exact package content that
/// produced them.
pub fn forward_package_details(def: &TestPackageDef, listener: &mut dyn RunListener) {
    let mut metrics = RunMetrics::new();
    metrics.insert(PACKAGE_NAME_METRIC.to_owned(), def.name().to_owned());
    metrics.insert(PACKAGE_ABI_METRIC.to_owned(), def.abi().to_owned());
    metrics.insert(PACKAGE_DIGEST_METRIC.to_owned(), def.digest().to_owned());
    listener.test_run_started(&def.id().to_string(), 0);
    listener.test_run_ended(Duration::ZERO, &metrics);
}
