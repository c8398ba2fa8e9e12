// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fakes and fixtures for harness tests.

use crate::{
    device::{DeviceHandle, DeviceOptions, DeviceRef},
    errors::{DeviceNotAvailable, PlanError, SessionError},
    plan::{Plan, PlanSource, SessionStore},
    repo::TestPackageDef,
    reporter::{LogType, RunListener, RunMetrics},
    runner::{BuildReceiver, DeviceReceiver, RemoteTest, TestFactory},
};
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use cts_metadata::{PackageId, PackageManifest, SessionSummary, TestIdentifier};
use maplit::btreemap;
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    time::{Duration, Instant},
};

/// Parses a `class#method` identifier, panicking on malformed input.
pub(crate) fn test_id(s: &str) -> TestIdentifier {
    s.parse().expect("test identifier parses")
}

/// The full suite-supported ABI set, as owned strings.
pub(crate) fn suite_abi_set() -> BTreeSet<String> {
    cts_metadata::SUITE_ABIS
        .iter()
        .map(|abi| (*abi).to_owned())
        .collect()
}

/// Builds a minimal package manifest with the given tests.
pub(crate) fn manifest(name: &str, abis: &[&str], tests: &[&str]) -> PackageManifest {
    PackageManifest {
        name: name.into(),
        abis: abis.iter().map(|abi| (*abi).into()).collect(),
        target_package: None,
        target_apk: None,
        tests: tests.iter().map(|t| test_id(t)).collect(),
        known_failures: BTreeSet::new(),
    }
}

/// One observed listener event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Event {
    RunStarted { name: String, count: usize },
    Started(TestIdentifier),
    Failed(TestIdentifier, String),
    Ignored(TestIdentifier),
    Ended(TestIdentifier),
    RunEnded { metrics: RunMetrics },
    Log { name: String, log_type: LogType },
}

/// A listener that records every event it receives, in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    pub(crate) events: Vec<Event>,
}

impl RecordingListener {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl RunListener for RecordingListener {
    fn test_run_started(&mut self, run_name: &str, test_count: usize) {
        self.events.push(Event::RunStarted {
            name: run_name.to_owned(),
            count: test_count,
        });
    }

    fn test_started(&mut self, test: &TestIdentifier) {
        self.events.push(Event::Started(test.clone()));
    }

    fn test_failed(&mut self, test: &TestIdentifier, trace: &str) {
        self.events.push(Event::Failed(test.clone(), trace.to_owned()));
    }

    fn test_ignored(&mut self, test: &TestIdentifier) {
        self.events.push(Event::Ignored(test.clone()));
    }

    fn test_ended(&mut self, test: &TestIdentifier, _metrics: &RunMetrics) {
        self.events.push(Event::Ended(test.clone()));
    }

    fn test_run_ended(&mut self, _elapsed: Duration, metrics: &RunMetrics) {
        self.events.push(Event::RunEnded {
            metrics: metrics.clone(),
        });
    }

    fn test_log(&mut self, name: &str, log_type: LogType, _data: Bytes) {
        self.events.push(Event::Log {
            name: name.to_owned(),
            log_type,
        });
    }
}

/// An in-memory device that records every interaction.
///
/// Interior mutability lets tests hold an `Arc` clone and inspect state after
/// the harness has run.
pub(crate) struct FakeDevice {
    serial: String,
    abis: Vec<String>,
    options: Cell<DeviceOptions>,
    pub(crate) shell_commands: RefCell<Vec<String>>,
    pub(crate) installs: RefCell<Vec<(Utf8PathBuf, Vec<String>)>>,
    pub(crate) uninstalls: RefCell<Vec<String>>,
    pub(crate) reboot_count: Cell<usize>,
    pub(crate) logcat_requests: Cell<usize>,
    /// When set, screenshot/bugreport/logcat captures fail.
    pub(crate) fail_captures: Cell<bool>,
    /// ABIs whose installs report a failure code.
    pub(crate) fail_installs: RefCell<BTreeSet<String>>,
    /// When set, reboot attempts fail.
    pub(crate) fail_reboots: Cell<bool>,
    /// The transport options in effect at each reboot attempt.
    pub(crate) options_at_reboot: RefCell<Vec<DeviceOptions>>,
}

impl FakeDevice {
    pub(crate) fn new(serial: &str, abis: &[&str]) -> Self {
        Self {
            serial: serial.to_owned(),
            abis: abis.iter().map(|abi| (*abi).to_owned()).collect(),
            options: Cell::new(DeviceOptions::default()),
            shell_commands: RefCell::new(Vec::new()),
            installs: RefCell::new(Vec::new()),
            uninstalls: RefCell::new(Vec::new()),
            reboot_count: Cell::new(0),
            logcat_requests: Cell::new(0),
            fail_captures: Cell::new(false),
            fail_installs: RefCell::new(BTreeSet::new()),
            fail_reboots: Cell::new(false),
            options_at_reboot: RefCell::new(Vec::new()),
        }
    }

    fn capture(&self, data: &'static [u8]) -> Result<Bytes, DeviceNotAvailable> {
        if self.fail_captures.get() {
            return Err(DeviceNotAvailable::new(&self.serial));
        }
        Ok(Bytes::from_static(data))
    }
}

impl DeviceHandle for FakeDevice {
    fn serial_number(&self) -> String {
        self.serial.clone()
    }

    fn supported_abis(&self) -> Result<Vec<String>, DeviceNotAvailable> {
        Ok(self.abis.clone())
    }

    fn install_package(
        &self,
        apk: &Utf8Path,
        _reinstall: bool,
        args: &[String],
    ) -> Result<Option<String>, DeviceNotAvailable> {
        self.installs
            .borrow_mut()
            .push((apk.to_owned(), args.to_vec()));
        let failed = args.iter().any(|arg| {
            arg.strip_prefix("--abi ")
                .is_some_and(|abi| self.fail_installs.borrow().contains(abi))
        });
        if failed {
            return Ok(Some("INSTALL_FAILED_NO_MATCHING_ABIS".to_owned()));
        }
        Ok(None)
    }

    fn uninstall_package(&self, package_name: &str) -> Result<(), DeviceNotAvailable> {
        self.uninstalls.borrow_mut().push(package_name.to_owned());
        Ok(())
    }

    fn execute_shell_command(&self, command: &str) -> Result<String, DeviceNotAvailable> {
        self.shell_commands.borrow_mut().push(command.to_owned());
        Ok(String::new())
    }

    fn reboot(&self) -> Result<(), DeviceNotAvailable> {
        self.reboot_count.set(self.reboot_count.get() + 1);
        self.options_at_reboot.borrow_mut().push(self.options.get());
        if self.fail_reboots.get() {
            return Err(DeviceNotAvailable::new(&self.serial));
        }
        Ok(())
    }

    fn screenshot(&self) -> Result<Bytes, DeviceNotAvailable> {
        self.capture(b"png")
    }

    fn bugreport(&self) -> Result<Bytes, DeviceNotAvailable> {
        self.capture(b"bugreport")
    }

    fn logcat(&self, _max_bytes: usize) -> Result<Bytes, DeviceNotAvailable> {
        self.logcat_requests.set(self.logcat_requests.get() + 1);
        self.capture(b"logcat")
    }

    fn properties(&self) -> Result<BTreeMap<String, String>, DeviceNotAvailable> {
        Ok(btreemap! {
            "build_id".to_owned() => "TEST123".to_owned(),
            "build_product".to_owned() => "fake_device".to_owned(),
        })
    }

    fn options(&self) -> DeviceOptions {
        self.options.get()
    }

    fn set_options(&self, options: DeviceOptions) {
        self.options.set(options);
    }
}

/// A plan source serving a single fixed plan, regardless of requested name.
pub(crate) struct StaticPlanSource {
    plan: Option<Plan>,
}

impl StaticPlanSource {
    pub(crate) fn new(plan: Option<Plan>) -> Self {
        Self { plan }
    }
}

impl PlanSource for StaticPlanSource {
    fn load(&self, name: &str) -> Result<Plan, PlanError> {
        match &self.plan {
            Some(plan) => Ok(plan.clone()),
            None => Err(PlanError::NotFound {
                name: name.to_owned(),
                path: Utf8PathBuf::from(format!("{name}.json")),
            }),
        }
    }
}

/// A session store holding at most one summary.
pub(crate) struct FakeSessionStore {
    summary: Option<SessionSummary>,
}

impl FakeSessionStore {
    pub(crate) fn empty() -> Self {
        Self { summary: None }
    }

    pub(crate) fn with_summary(summary: SessionSummary) -> Self {
        Self {
            summary: Some(summary),
        }
    }
}

impl SessionStore for FakeSessionStore {
    fn load(&self, id: u32) -> Result<SessionSummary, SessionError> {
        match &self.summary {
            Some(summary) if summary.id == id => Ok(summary.clone()),
            _ => Err(SessionError::NotFound {
                id,
                path: Utf8PathBuf::from(format!("{id}.json")),
            }),
        }
    }
}

/// A scripted test unit: reports its results in order, optionally losing the
/// device after a fixed number of them.
pub(crate) struct FakeTest {
    run_name: String,
    results: Vec<(TestIdentifier, Option<String>)>,
    abort_after: Option<usize>,
    device: Option<DeviceRef>,
    build: Option<Utf8PathBuf>,
}

impl RemoteTest for FakeTest {
    fn run(&mut self, listener: &mut dyn RunListener) -> Result<(), DeviceNotAvailable> {
        let device = self.device.as_ref().expect("device injected before run");
        assert!(self.build.is_some(), "build dir injected before run");

        let start = Instant::now();
        listener.test_run_started(&self.run_name, self.results.len());
        for (index, (test, trace)) in self.results.iter().enumerate() {
            if self.abort_after == Some(index) {
                return Err(DeviceNotAvailable::new(device.serial_number()));
            }
            listener.test_started(test);
            if let Some(trace) = trace {
                listener.test_failed(test, trace);
            }
            listener.test_ended(test, &RunMetrics::new());
        }
        listener.test_run_ended(start.elapsed(), &RunMetrics::new());
        Ok(())
    }

    fn device_receiver(&mut self) -> Option<&mut dyn DeviceReceiver> {
        Some(self)
    }

    fn build_receiver(&mut self) -> Option<&mut dyn BuildReceiver> {
        Some(self)
    }
}

impl DeviceReceiver for FakeTest {
    fn set_device(&mut self, device: DeviceRef) {
        self.device = Some(device);
    }
}

impl BuildReceiver for FakeTest {
    fn set_build(&mut self, build_dir: &Utf8Path) {
        self.build = Some(build_dir.to_owned());
    }
}

/// A factory producing [`FakeTest`] units from package definitions.
///
/// Per-test failures and per-package aborts are scripted up front; the
/// create-call count lets tests assert that resolution happened exactly once.
pub(crate) struct FakeFactory {
    pub(crate) abort_after: RefCell<BTreeMap<PackageId, usize>>,
    pub(crate) failures: RefCell<BTreeMap<TestIdentifier, String>>,
    pub(crate) create_count: Cell<usize>,
}

impl FakeFactory {
    pub(crate) fn new() -> Self {
        Self {
            abort_after: RefCell::new(BTreeMap::new()),
            failures: RefCell::new(BTreeMap::new()),
            create_count: Cell::new(0),
        }
    }
}

impl TestFactory for FakeFactory {
    fn create_test(&self, def: &TestPackageDef) -> Option<Box<dyn RemoteTest>> {
        self.create_count.set(self.create_count.get() + 1);
        let failures = self.failures.borrow();
        let results = def
            .known_tests()
            .into_iter()
            .map(|test| {
                let trace = failures.get(&test).cloned();
                (test, trace)
            })
            .collect();
        Some(Box::new(FakeTest {
            run_name: def.id().to_string(),
            results,
            abort_after: self.abort_after.borrow().get(def.id()).copied(),
            device: None,
            build: None,
        }))
    }
}
