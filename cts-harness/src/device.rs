// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The device collaborator surface.
//!
//! The harness does not implement device communication; it drives any
//! transport that exposes this handle. Every fallible operation reports
//! failure as [`DeviceNotAvailable`], the one condition that aborts a run.

use crate::errors::DeviceNotAvailable;
use bytes::Bytes;
use camino::Utf8Path;
use std::{collections::BTreeMap, sync::Arc, thread, time::Duration};
use tracing::debug;

/// Serial number prefix identifying emulator-class devices.
pub const EMULATOR_SERIAL_PREFIX: &str = "emulator-";

/// Timeout applied to reboot and online waits while a policy reboot is in
/// flight.
const REBOOT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Returns true if the serial identifies an emulator-class device.
pub fn is_emulator(serial: &str) -> bool {
    serial.starts_with(EMULATOR_SERIAL_PREFIX)
}

/// Transport-level timeouts for a device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceOptions {
    /// How long to wait for a reboot to complete.
    pub reboot_timeout: Duration,

    /// How long to wait for the device to come online.
    pub online_timeout: Duration,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            reboot_timeout: Duration::from_secs(2 * 60),
            online_timeout: Duration::from_secs(60),
        }
    }
}

/// A shared handle to a device under test.
pub type DeviceRef = Arc<dyn DeviceHandle>;

/// A connected device under test.
///
/// Implementations are expected to be internally synchronized: the harness
/// only ever drives a device from one thread, but test units and failure
/// capture decorators hold clones of the same [`DeviceRef`].
pub trait DeviceHandle {
    /// Returns the device serial number.
    fn serial_number(&self) -> String;

    /// Returns the ABIs the device supports.
    fn supported_abis(&self) -> Result<Vec<String>, DeviceNotAvailable>;

    /// Installs an apk. Returns `Some(error_code)` if the install command ran
    /// but failed, `None` on success.
    fn install_package(
        &self,
        apk: &Utf8Path,
        reinstall: bool,
        args: &[String],
    ) -> Result<Option<String>, DeviceNotAvailable>;

    /// Uninstalls an Android package by name.
    fn uninstall_package(&self, package_name: &str) -> Result<(), DeviceNotAvailable>;

    /// Executes a shell command and returns its output.
    fn execute_shell_command(&self, command: &str) -> Result<String, DeviceNotAvailable>;

    /// Reboots the device and blocks until it is back online, subject to the
    /// current [`DeviceOptions`] timeouts.
    fn reboot(&self) -> Result<(), DeviceNotAvailable>;

    /// Captures a screenshot.
    fn screenshot(&self) -> Result<Bytes, DeviceNotAvailable>;

    /// Captures a bugreport.
    fn bugreport(&self) -> Result<Bytes, DeviceNotAvailable>;

    /// Captures up to `max_bytes` of logcat output.
    fn logcat(&self, max_bytes: usize) -> Result<Bytes, DeviceNotAvailable>;

    /// Returns device build and hardware properties, forwarded to the report
    /// as run metrics.
    fn properties(&self) -> Result<BTreeMap<String, String>, DeviceNotAvailable>;

    /// Returns the current transport timeouts.
    fn options(&self) -> DeviceOptions;

    /// Replaces the transport timeouts.
    fn set_options(&self, options: DeviceOptions);
}

/// Reboots the device with widened transport timeouts, then sleeps `settle`
/// to let userspace services finish coming up.
///
/// The original timeouts are restored whether or not the reboot succeeds.
pub fn reboot_device(
    device: &dyn DeviceHandle,
    settle: Duration,
) -> Result<(), DeviceNotAvailable> {
    let saved = device.options();
    device.set_options(DeviceOptions {
        reboot_timeout: REBOOT_TIMEOUT,
        online_timeout: REBOOT_TIMEOUT,
    });
    let result = device.reboot();
    device.set_options(saved);
    result?;
    debug!(serial = %device.serial_number(), "reboot complete");
    if !settle.is_zero() {
        thread::sleep(settle);
    }
    Ok(())
}
