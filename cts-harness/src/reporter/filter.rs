// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::reporter::{LogType, RunListener, RunMetrics};
use bytes::Bytes;
use cts_metadata::TestIdentifier;
use std::{collections::BTreeSet, time::Duration};
use tracing::debug;

/// Per-package known-test accounting.
///
/// The orchestrator attaches a filter to the listener for the duration of one
/// package's execution, then — whether the run completed or aborted — calls
/// [`report_unexecuted`](Self::report_unexecuted) so that every known test
/// appears in the result stream exactly once. No test silently disappears
/// because the device crashed mid-package.
#[derive(Clone, Debug)]
pub struct ResultFilter {
    run_name: String,
    known_tests: BTreeSet<TestIdentifier>,
    started: BTreeSet<TestIdentifier>,
}

impl ResultFilter {
    /// Creates a filter for one package's known-test manifest.
    pub fn new(run_name: impl Into<String>, known_tests: BTreeSet<TestIdentifier>) -> Self {
        Self {
            run_name: run_name.into(),
            known_tests,
            started: BTreeSet::new(),
        }
    }

    /// Returns the number of known tests.
    pub fn known_test_count(&self) -> usize {
        self.known_tests.len()
    }

    /// Synthesizes a not-executed result for every known test that was never
    /// reported as started.
    ///
    /// Synthesized tests are marked as seen, so calling this twice does not
    /// duplicate entries.
    pub fn report_unexecuted(&mut self, downstream: &mut dyn RunListener) {
        let unexecuted: Vec<TestIdentifier> = self
            .known_tests
            .difference(&self.started)
            .cloned()
            .collect();
        if unexecuted.is_empty() {
            return;
        }
        debug!(
            run_name = %self.run_name,
            count = unexecuted.len(),
            "synthesizing not-executed results"
        );
        let empty = RunMetrics::new();
        for test in unexecuted {
            downstream.test_started(&test);
            downstream.test_ignored(&test);
            downstream.test_ended(&test, &empty);
            self.started.insert(test);
        }
    }
}

/// A listener that forwards all events to a downstream listener while feeding
/// started-test accounting into a [`ResultFilter`].
pub struct FilteredListener<'a> {
    filter: &'a mut ResultFilter,
    downstream: &'a mut dyn RunListener,
}

impl<'a> FilteredListener<'a> {
    /// Attaches `filter` in front of `downstream`.
    pub fn new(filter: &'a mut ResultFilter, downstream: &'a mut dyn RunListener) -> Self {
        Self { filter, downstream }
    }
}

impl RunListener for FilteredListener<'_> {
    fn test_run_started(&mut self, run_name: &str, test_count: usize) {
        self.downstream.test_run_started(run_name, test_count);
    }

    fn test_started(&mut self, test: &TestIdentifier) {
        self.filter.started.insert(test.clone());
        self.downstream.test_started(test);
    }

    fn test_failed(&mut self, test: &TestIdentifier, trace: &str) {
        self.downstream.test_failed(test, trace);
    }

    fn test_ignored(&mut self, test: &TestIdentifier) {
        self.downstream.test_ignored(test);
    }

    fn test_ended(&mut self, test: &TestIdentifier, metrics: &RunMetrics) {
        self.downstream.test_ended(test, metrics);
    }

    fn test_run_ended(&mut self, elapsed: Duration, metrics: &RunMetrics) {
        self.downstream.test_run_ended(elapsed, metrics);
    }

    fn test_log(&mut self, name: &str, log_type: LogType, data: Bytes) {
        self.downstream.test_log(name, log_type, data);
    }
}
