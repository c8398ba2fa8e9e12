// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    device::DeviceRef,
    reporter::{LogType, RunListener, RunMetrics},
};
use bytes::Bytes;
use cts_metadata::TestIdentifier;
use std::{thread, time::Duration};
use tracing::warn;

/// Wait before a logcat capture so the failure stack trace makes it into the
/// buffer.
const LOGCAT_SETTLE: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
enum CaptureKind {
    Bugreport,
    Screenshot,
    Logcat { max_bytes: usize },
}

impl CaptureKind {
    fn log_name(&self, test: &TestIdentifier) -> String {
        let prefix = match self {
            Self::Bugreport => "bug",
            Self::Screenshot => "screenshot",
            Self::Logcat { .. } => "logcat",
        };
        format!("{prefix}-{}_{}", test.class_name, test.method_name)
    }
}

/// A listener decorator that captures device state on every test failure.
///
/// Captures are best-effort side channels: a device that becomes unavailable
/// during capture is logged, never escalated, and the original failure event
/// is always forwarded unchanged.
pub struct FailureCapture<L> {
    inner: L,
    device: DeviceRef,
    kind: CaptureKind,
}

impl<L: RunListener> FailureCapture<L> {
    /// Captures a bugreport on each failure.
    pub fn bugreport(inner: L, device: DeviceRef) -> Self {
        Self {
            inner,
            device,
            kind: CaptureKind::Bugreport,
        }
    }

    /// Captures a screenshot on each failure.
    pub fn screenshot(inner: L, device: DeviceRef) -> Self {
        Self {
            inner,
            device,
            kind: CaptureKind::Screenshot,
        }
    }

    /// Captures up to `max_bytes` of logcat on each failure.
    pub fn logcat(inner: L, device: DeviceRef, max_bytes: usize) -> Self {
        Self {
            inner,
            device,
            kind: CaptureKind::Logcat { max_bytes },
        }
    }

    fn capture(&mut self, test: &TestIdentifier) {
        let (log_type, result) = match self.kind {
            CaptureKind::Bugreport => (LogType::Text, self.device.bugreport()),
            CaptureKind::Screenshot => (LogType::Png, self.device.screenshot()),
            CaptureKind::Logcat { max_bytes } => {
                thread::sleep(LOGCAT_SETTLE);
                (LogType::Text, self.device.logcat(max_bytes))
            }
        };
        match result {
            Ok(data) => self.inner.test_log(&self.kind.log_name(test), log_type, data),
            Err(error) => warn!(
                serial = %self.device.serial_number(),
                %test,
                %error,
                "failure capture failed"
            ),
        }
    }
}

impl<L: RunListener> RunListener for FailureCapture<L> {
    fn test_run_started(&mut self, run_name: &str, test_count: usize) {
        self.inner.test_run_started(run_name, test_count);
    }

    fn test_started(&mut self, test: &TestIdentifier) {
        self.inner.test_started(test);
    }

    fn test_failed(&mut self, test: &TestIdentifier, trace: &str) {
        self.inner.test_failed(test, trace);
        self.capture(test);
    }

    fn test_ignored(&mut self, test: &TestIdentifier) {
        self.inner.test_ignored(test);
    }

    fn test_ended(&mut self, test: &TestIdentifier, metrics: &RunMetrics) {
        self.inner.test_ended(test, metrics);
    }

    fn test_run_ended(&mut self, elapsed: Duration, metrics: &RunMetrics) {
        self.inner.test_run_ended(elapsed, metrics);
    }

    fn test_log(&mut self, name: &str, log_type: LogType, data: Bytes) {
        self.inner.test_log(name, log_type, data);
    }
}
