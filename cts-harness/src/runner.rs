// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run orchestrator.
//!
//! A [`SuiteRunner`] owns one device's worth of work: it resolves the run
//! specification once, caches the resulting package list, and executes the
//! packages strictly in order. Device loss aborts the remainder of the run
//! but never the reporting cleanup; with `resume` enabled, invoking
//! [`run`](SuiteRunner::run) again picks up at the package after the last one
//! started, without re-resolving the selection.

use crate::{
    config::HarnessConfig,
    device::{DeviceHandle, DeviceRef, reboot_device},
    errors::{ConfigCheckError, RunError},
    partition::ShardAssignment,
    plan::{PlanSource, SessionStore},
    reboot::RebootPolicy,
    repo::{PackageRepo, TestPackageDef},
    reporter::{
        DEVICE_INFO_RUN_NAME, FailureCapture, FilteredListener, ResultFilter, RunListener,
        forward_package_details,
    },
    selection::resolve_packages,
};
use camino::{Utf8Path, Utf8PathBuf};
use cts_metadata::{TestIdentifier, is_suite_abi};
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// Shell command that returns the device to the home screen between packages.
/// Clears transient UI state like the status bar; cannot dismiss dialogs.
const HOME_COMMAND: &str = "input keyevent 3";

/// An executable unit of test-package work.
///
/// Implementations drive the actual on-device instrumentation; the harness
/// treats them as opaque. Failures other than device loss are reported
/// through the listener, not the return value.
pub trait RemoteTest {
    /// Runs the unit, reporting results to `listener`.
    fn run(
        &mut self,
        listener: &mut dyn RunListener,
    ) -> Result<(), crate::errors::DeviceNotAvailable>;

    /// Returns the device-receiving capability, if the unit wants a device
    /// handle before running.
    fn device_receiver(&mut self) -> Option<&mut dyn DeviceReceiver> {
        None
    }

    /// Returns the build-receiving capability, if the unit wants the build
    /// artifact directory before running.
    fn build_receiver(&mut self) -> Option<&mut dyn BuildReceiver> {
        None
    }
}

/// Capability of a [`RemoteTest`] that accepts a device handle.
pub trait DeviceReceiver {
    /// Hands the unit the device it will run against.
    fn set_device(&mut self, device: DeviceRef);
}

/// Capability of a [`RemoteTest`] that accepts the build artifact directory.
pub trait BuildReceiver {
    /// Hands the unit the build artifact directory.
    fn set_build(&mut self, build_dir: &Utf8Path);
}

/// Creates executable units for resolved package definitions.
pub trait TestFactory {
    /// Creates the unit for one package definition, or `None` if the package
    /// has no runnable form.
    fn create_test(&self, def: &TestPackageDef) -> Option<Box<dyn RemoteTest>>;
}

/// One pending package: its definition, its executable unit, and the
/// known-test manifest results are reconciled against.
struct TestPackage {
    def: TestPackageDef,
    test: Box<dyn RemoteTest>,
    known_tests: BTreeSet<TestIdentifier>,
}

/// Observable lifecycle of a [`SuiteRunner`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunnerState {
    /// No run invoked yet.
    Idle,

    /// Resolving the run specification into a package list.
    Resolving,

    /// Executing packages.
    Running,

    /// All resolved packages were iterated.
    Completed,

    /// The run stopped early; resumable if configured.
    Aborted,
}

/// The run orchestrator for one shard.
pub struct SuiteRunner {
    config: HarnessConfig,
    shard: ShardAssignment,
    repo: Arc<dyn PackageRepo>,
    plan_source: Arc<dyn PlanSource>,
    session_store: Arc<dyn SessionStore>,
    factory: Arc<dyn TestFactory>,
    device: Option<DeviceRef>,
    build_dir: Option<Utf8PathBuf>,
    // The pending package list, populated once per instance. The index of the
    // last started package is the resume checkpoint.
    pending: Vec<TestPackage>,
    last_package_index: usize,
    resolved: bool,
    abi_set: BTreeSet<String>,
    reboot_policy: RebootPolicy,
    state: RunnerState,
}

impl SuiteRunner {
    /// Creates an unsharded runner. The configuration is validated here, once,
    /// before any device interaction.
    pub fn new(
        config: HarnessConfig,
        repo: Arc<dyn PackageRepo>,
        plan_source: Arc<dyn PlanSource>,
        session_store: Arc<dyn SessionStore>,
        factory: Arc<dyn TestFactory>,
    ) -> Result<Self, ConfigCheckError> {
        config.validate()?;
        let reboot_policy = RebootPolicy::new(config.reboot.clone());
        Ok(Self {
            config,
            shard: ShardAssignment::single(),
            repo,
            plan_source,
            session_store,
            factory,
            device: None,
            build_dir: None,
            pending: Vec::new(),
            last_package_index: 0,
            resolved: false,
            abi_set: BTreeSet::new(),
            reboot_policy,
            state: RunnerState::Idle,
        })
    }

    /// Assigns the device this runner executes against.
    pub fn set_device(&mut self, device: DeviceRef) {
        self.device = Some(device);
    }

    /// Assigns the suite build artifact directory.
    pub fn set_build(&mut self, build_dir: impl Into<Utf8PathBuf>) {
        self.build_dir = Some(build_dir.into());
    }

    /// Returns the runner's observable state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Returns true if an aborted run may be re-invoked to continue from its
    /// checkpoint.
    pub fn is_resumable(&self) -> bool {
        self.config.resume
    }

    /// Returns this runner's shard assignment.
    pub fn shard_assignment(&self) -> ShardAssignment {
        self.shard
    }

    /// Splits this runner into per-shard instances, or `None` if the
    /// configured shard count is 1.
    ///
    /// Each shard is an independent runner with the same configuration and
    /// collaborators but its own assignment; the caller pairs each with its
    /// own device. Shard contents are determined lazily at resolution time by
    /// the deterministic sort-then-interleave assignment.
    pub fn split(&self) -> Option<Vec<SuiteRunner>> {
        let total = self.config.shards;
        if total <= 1 {
            return None;
        }
        Some(
            (0..total)
                .map(|index| {
                    let assignment = ShardAssignment::new(index, total)
                        .expect("index < total by construction");
                    self.make_shard(assignment)
                })
                .collect(),
        )
    }

    /// Pure shard factory: a fresh runner with the given assignment and a
    /// shard count of 1 (so shards never split recursively).
    fn make_shard(&self, assignment: ShardAssignment) -> SuiteRunner {
        let mut config = self.config.clone();
        config.shards = 1;
        let reboot_policy = RebootPolicy::new(config.reboot.clone());
        SuiteRunner {
            config,
            shard: assignment,
            repo: Arc::clone(&self.repo),
            plan_source: Arc::clone(&self.plan_source),
            session_store: Arc::clone(&self.session_store),
            factory: Arc::clone(&self.factory),
            device: None,
            build_dir: self.build_dir.clone(),
            pending: Vec::new(),
            last_package_index: 0,
            resolved: false,
            abi_set: BTreeSet::new(),
            reboot_policy,
            state: RunnerState::Idle,
        }
    }

    /// Runs every pending package in order, reporting to `listener`.
    ///
    /// Device loss propagates as an error after reporting cleanup has run;
    /// everything executed so far, plus synthesized not-executed entries for
    /// the current package's remainder, reaches the listener either way.
    pub fn run(&mut self, listener: &mut dyn RunListener) -> Result<(), RunError> {
        let device = self.device.clone().ok_or(RunError::MissingDevice)?;
        let build_dir = self.build_dir.clone().ok_or(RunError::MissingBuild)?;

        if !self.resolved {
            self.state = RunnerState::Resolving;
        }
        if let Err(error) = self.setup_package_list(&device) {
            self.state = RunnerState::Aborted;
            return Err(error);
        }

        let mut listener: Box<dyn RunListener + '_> = Box::new(listener);
        if self.config.bugreport_on_failure {
            listener = Box::new(FailureCapture::bugreport(listener, device.clone()));
        }
        if self.config.screenshot_on_failure {
            listener = Box::new(FailureCapture::screenshot(listener, device.clone()));
        }
        if self.config.logcat_on_failure {
            listener = Box::new(FailureCapture::logcat(
                listener,
                device.clone(),
                self.config.logcat_on_failure_size,
            ));
        }

        // Filters are only built for packages this invocation can reach, so a
        // resumed run does not re-synthesize results for packages a previous
        // invocation already reconciled.
        let start_index = self.last_package_index;
        let mut filters: BTreeMap<usize, ResultFilter> = self
            .pending
            .iter()
            .enumerate()
            .skip(start_index)
            .filter(|(_, package)| !package.known_tests.is_empty())
            .map(|(index, package)| {
                (
                    index,
                    ResultFilter::new(package.def.id().to_string(), package.known_tests.clone()),
                )
            })
            .collect();

        self.state = RunnerState::Running;
        let result = self.run_loop(&device, &build_dir, &mut *listener, &mut filters);

        // Guaranteed cleanup, regardless of how the loop exited.
        if self.config.screenshot {
            match device.screenshot() {
                Ok(data) => listener.test_log("screenshot", crate::reporter::LogType::Png, data),
                Err(error) => warn!(%error, "failed to capture final screenshot"),
            }
        }
        for index in start_index..self.last_package_index {
            if let Some(filter) = filters.get_mut(&index) {
                filter.report_unexecuted(&mut *listener);
            }
        }

        self.state = match &result {
            Ok(()) => RunnerState::Completed,
            Err(_) => RunnerState::Aborted,
        };
        result
    }

    /// Resolves the run specification into the pending package list, exactly
    /// once per instance.
    fn setup_package_list(&mut self, device: &DeviceRef) -> Result<(), RunError> {
        if self.resolved {
            info!("resuming tests using existing package list");
            return Ok(());
        }

        let mut abis: BTreeSet<String> = device
            .supported_abis()?
            .into_iter()
            .filter(|abi| is_suite_abi(abi))
            .collect();
        if let Some(force_abi) = &self.config.force_abi {
            abis.retain(|abi| abi == force_abi);
        }
        if abis.is_empty() {
            return Err(RunError::NoCommonAbis {
                serial: device.serial_number(),
            });
        }
        info!("ABIs: {abis:?}");

        let mut defs = resolve_packages(
            &self.config,
            self.repo.as_ref(),
            self.plan_source.as_ref(),
            self.session_store.as_ref(),
            &abis,
        )?;
        // The stable sort is what makes shard assignment deterministic across
        // processes; run order relies on it too.
        defs.sort_by(|a, b| a.id().cmp(b.id()));

        for index in self.shard.indices(defs.len()) {
            let def = defs[index].clone();
            if let Some(test) = self.factory.create_test(&def) {
                let known_tests = def.known_tests();
                self.pending.push(TestPackage {
                    def,
                    test,
                    known_tests,
                });
            }
        }
        self.abi_set = abis;
        self.resolved = true;
        Ok(())
    }

    fn run_loop(
        &mut self,
        device: &DeviceRef,
        build_dir: &Utf8Path,
        listener: &mut dyn RunListener,
        filters: &mut BTreeMap<usize, ResultFilter>,
    ) -> Result<(), RunError> {
        let apks = prerequisite_apks(&self.pending);
        let uninstall_packages = prerequisite_package_names(&self.pending);
        self.install_prerequisites(device, build_dir, &apks)?;

        // Device info is collected even for resumed runs: a resume may be on
        // a different device.
        if !self.config.skip_device_info {
            collect_device_info(&**device, &mut *listener)?;
        }

        let distinct_names = self.pending.iter().map(|p| p.def.name()).unique().count();
        if self.reboot_policy.pre_run_reboot_needed(distinct_names) {
            info!("pre-run reboot ({distinct_names} packages); disable-reboot skips this");
            reboot_device(&**device, self.reboot_policy.settle_time())?;
        }
        self.reboot_policy.mark_rebooted(Instant::now());

        let total_tests: usize = filters.values().map(ResultFilter::known_test_count).sum();
        info!(
            "starting test run of {} packages, containing {} tests",
            self.pending.len() - self.last_package_index,
            total_tests
        );

        let len = self.pending.len();
        let mut index = self.last_package_index;
        while index < len {
            if self.pending[index].known_tests.is_empty() {
                // Empty packages (e.g. fully-filtered derived-plan artifacts)
                // are skipped without touching the device.
                index += 1;
                self.last_package_index = index;
                continue;
            }

            {
                let package = &mut self.pending[index];
                if let Some(receiver) = package.test.device_receiver() {
                    receiver.set_device(device.clone());
                }
                if let Some(receiver) = package.test.build_receiver() {
                    receiver.set_build(build_dir);
                }
            }
            forward_package_details(&self.pending[index].def, &mut *listener);

            let run_result = match filters.get_mut(&index) {
                Some(filter) => {
                    let mut filtered = FilteredListener::new(filter, &mut *listener);
                    self.pending[index].test.run(&mut filtered)
                }
                None => self.pending[index].test.run(&mut *listener),
            };
            // The checkpoint advances past a started package whether or not
            // it completed: an aborted package's remainder is synthesized as
            // not-executed, and a resumed run picks up at the next package.
            self.last_package_index = index + 1;
            run_result?;

            if index + 1 < len {
                let current = self.pending[index].def.name().to_owned();
                let next = self.pending[index + 1].def.name().to_owned();
                if self.reboot_policy.should_reboot(
                    &device.serial_number(),
                    &current,
                    &next,
                    Instant::now(),
                ) {
                    info!("rebooting after package {current}, before package {next}");
                    reboot_device(&**device, self.reboot_policy.settle_time())?;
                    self.reboot_policy.mark_rebooted(Instant::now());
                }
                self.go_home(&**device);
            }
            index += 1;
        }

        self.uninstall_prerequisites(device, &uninstall_packages)?;
        Ok(())
    }

    /// Installs the unique prerequisite apks across every usable ABI, up
    /// front, so packages sharing a prerequisite pay for it once.
    fn install_prerequisites(
        &self,
        device: &DeviceRef,
        build_dir: &Utf8Path,
        apks: &BTreeSet<String>,
    ) -> Result<(), RunError> {
        if apks.is_empty() {
            return Ok(());
        }
        info!("installing prerequisites");
        for apk in apks {
            let apk_path = build_dir.join(apk);
            if !apk_path.exists() {
                error!("could not find prerequisite apk {apk}");
                continue;
            }
            let mut failures = 0;
            for abi in &self.abi_set {
                let args = vec![format!("--abi {abi}")];
                if let Some(code) = device.install_package(&apk_path, true, &args)? {
                    failures += 1;
                    warn!("failed to install {apk} for {abi}: {code}");
                }
            }
            // Partial ABI failure is tolerated; only a clean sweep of
            // failures is an error.
            if failures >= self.abi_set.len() {
                error!("failed to install {apk} on any ABI");
            }
        }
        Ok(())
    }

    fn uninstall_prerequisites(
        &self,
        device: &DeviceRef,
        package_names: &BTreeSet<String>,
    ) -> Result<(), RunError> {
        for name in package_names {
            device.uninstall_package(name)?;
        }
        Ok(())
    }

    fn go_home(&self, device: &dyn DeviceHandle) {
        if let Err(error) = device.execute_shell_command(HOME_COMMAND) {
            warn!(%error, "failed to reset to home screen");
        }
    }
}

/// Forwards device build and hardware properties to the listener as a
/// zero-count run.
fn collect_device_info(
    device: &dyn DeviceHandle,
    listener: &mut dyn RunListener,
) -> Result<(), crate::errors::DeviceNotAvailable> {
    let metrics = device.properties()?;
    listener.test_run_started(DEVICE_INFO_RUN_NAME, 0);
    listener.test_run_ended(Duration::ZERO, &metrics);
    Ok(())
}

fn prerequisite_apks(pending: &[TestPackage]) -> BTreeSet<String> {
    pending
        .iter()
        .filter_map(|p| p.def.target_apk().map(str::to_owned))
        .collect()
}

fn prerequisite_package_names(pending: &[TestPackage]) -> BTreeSet<String> {
    pending
        .iter()
        .filter_map(|p| p.def.target_package().map(str::to_owned))
        .collect()
}
