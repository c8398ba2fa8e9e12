// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the harness.

use camino::Utf8PathBuf;
use thiserror::Error;

/// A fatal configuration error, detected before any device interaction.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigCheckError {
    /// Zero selectors, or more than one selector, were specified.
    #[error(
        "ambiguous or missing arguments: exactly one of --plan, --package, --class, --test or \
         --continue-session must be specified"
    )]
    SelectorConflict,

    /// A method name was supplied without a class name.
    #[error("--class must be specified when --method is used")]
    MethodRequiresClass,

    /// The shard count is zero.
    #[error("shard count must be at least 1, found {count}")]
    InvalidShardCount {
        /// The offending shard count.
        count: usize,
    },
}

/// An error that occurred while loading the test package repository from a
/// build artifact directory.
#[derive(Debug, Error)]
pub enum RepoLoadError {
    /// The manifest directory could not be enumerated.
    #[error("failed to read test package directory `{dir}`")]
    ReadDir {
        /// The directory being enumerated.
        dir: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A manifest file could not be read.
    #[error("failed to read test package manifest `{path}`")]
    ReadManifest {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A manifest file could not be parsed.
    #[error("failed to parse test package manifest `{path}`")]
    ParseManifest {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurred while loading a test plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No plan with the requested name exists.
    #[error("test plan `{name}` not found at `{path}`")]
    NotFound {
        /// The requested plan name.
        name: String,
        /// The path that was probed.
        path: Utf8PathBuf,
    },

    /// The plan file could not be read.
    #[error("failed to read test plan `{path}`")]
    Read {
        /// The plan path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The plan file could not be parsed.
    #[error("failed to parse test plan `{path}`")]
    Parse {
        /// The plan path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurred while loading a prior session summary.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with the requested id exists.
    #[error("session {id} not found at `{path}`")]
    NotFound {
        /// The requested session id.
        id: u32,
        /// The path that was probed.
        path: Utf8PathBuf,
    },

    /// The session file could not be read.
    #[error("failed to read session summary `{path}`")]
    Read {
        /// The session path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The session file could not be parsed.
    #[error("failed to parse session summary `{path}`")]
    Parse {
        /// The session path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurred while resolving a run specification into a package
/// list.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The run specification itself is invalid.
    #[error(transparent)]
    Config(#[from] ConfigCheckError),

    /// An explicitly requested package name has no match in the repository.
    #[error("could not find test package `{name}`; use `list packages` to see available packages")]
    PackageNotFound {
        /// The requested package name.
        name: String,
    },

    /// The named plan could not be loaded.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The prior session could not be loaded.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// The device under test became unavailable.
///
/// This is the only condition that aborts an in-progress run; it always
/// propagates to the caller, after reporting cleanup has run.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("device `{serial}` not available")]
pub struct DeviceNotAvailable {
    serial: String,
}

impl DeviceNotAvailable {
    /// Creates a new error for the given device serial.
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
        }
    }

    /// Returns the serial of the lost device.
    pub fn serial(&self) -> &str {
        &self.serial
    }
}

/// An error returned from [`SuiteRunner::run`](crate::runner::SuiteRunner::run).
#[derive(Debug, Error)]
pub enum RunError {
    /// No device handle has been assigned to this runner.
    #[error("missing device")]
    MissingDevice,

    /// No build artifact directory has been assigned to this runner.
    #[error("missing suite build")]
    MissingBuild,

    /// The device and suite ABI sets have an empty intersection.
    #[error("could not determine a usable ABI set for device `{serial}`")]
    NoCommonAbis {
        /// The device serial.
        serial: String,
    },

    /// Selection resolution failed.
    #[error("failed to resolve test packages")]
    Selection(#[from] SelectionError),

    /// The device became unavailable mid-run.
    #[error(transparent)]
    Device(#[from] DeviceNotAvailable),
}

/// An error constructing a [`ShardAssignment`](crate::partition::ShardAssignment).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ShardError {
    /// The total shard count is zero.
    #[error("total shard count must be at least 1")]
    InvalidTotal,

    /// The shard index is not below the total.
    #[error("shard index {index} out of range for {total} total shards")]
    IndexOutOfRange {
        /// The shard index.
        index: usize,
        /// The total shard count.
        total: usize,
    },
}
