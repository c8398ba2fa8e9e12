// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Shared, serializable data model for the compatibility suite harness.
//!
//! These types form the machine-readable surface between the harness and
//! surrounding tooling: on-disk package manifests, plan documents, and
//! prior-session summaries, along with the identifier types the harness uses
//! for per-test accounting.

mod errors;

pub use errors::*;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::BTreeSet, fmt, str::FromStr};

/// The set of ABIs the suite ships test packages for.
///
/// A package only runs when its ABI is in the intersection of this set and
/// the ABIs reported by the device under test.
pub const SUITE_ABIS: &[&str] = &["arm64-v8a", "armeabi-v7a", "x86", "x86_64"];

/// Returns true if `abi` is an ABI the suite ships packages for.
pub fn is_suite_abi(abi: &str) -> bool {
    SUITE_ABIS.contains(&abi)
}

/// Identifies a single test case: a class name plus a method name.
///
/// The canonical text form is `class#method`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestIdentifier {
    /// The fully-qualified class name.
    pub class_name: SmolStr,

    /// The method name within the class.
    pub method_name: SmolStr,
}

impl TestIdentifier {
    /// Creates a new identifier from a class and method name.
    pub fn new(class_name: impl Into<SmolStr>, method_name: impl Into<SmolStr>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl FromStr for TestIdentifier {
    type Err = TestIdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('#') {
            Some((class_name, method_name))
                if !class_name.is_empty() && !method_name.is_empty() =>
            {
                Ok(Self::new(class_name, method_name))
            }
            _ => Err(TestIdentifierParseError::new(s)),
        }
    }
}

impl fmt::Display for TestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

impl TryFrom<String> for TestIdentifier {
    type Error = TestIdentifierParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TestIdentifier> for String {
    fn from(id: TestIdentifier) -> Self {
        id.to_string()
    }
}

/// The result status of a single test case.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test ran and passed.
    Pass,

    /// The test ran and failed.
    Fail,

    /// The test is known to exist but was never reported as started.
    NotExecuted,
}

impl TestStatus {
    /// Returns the canonical string form of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NotExecuted => "not-executed",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a test package variant: a logical package name plus the ABI the
/// variant is built for.
///
/// The canonical text form is `abi:name`, which sorts by ABI first. The
/// harness relies on this ordering being total and stable for deterministic
/// shard assignment.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    /// The ABI the package variant targets.
    pub abi: SmolStr,

    /// The logical package name.
    pub name: SmolStr,
}

impl PackageId {
    /// Creates a new package id from an ABI and a logical name.
    pub fn new(abi: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            abi: abi.into(),
            name: name.into(),
        }
    }
}

impl FromStr for PackageId {
    type Err = PackageIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((abi, name)) if !abi.is_empty() && !name.is_empty() => Ok(Self::new(abi, name)),
            _ => Err(PackageIdParseError::new(s)),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.abi, self.name)
    }
}

impl TryFrom<String> for PackageId {
    type Error = PackageIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.to_string()
    }
}

/// The on-disk manifest describing one logical test package.
///
/// One manifest expands into one package definition per supported ABI.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageManifest {
    /// The logical package name.
    pub name: SmolStr,

    /// The ABIs this package is built for.
    pub abis: Vec<SmolStr>,

    /// The Android package name of the on-device target, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_package: Option<SmolStr>,

    /// The apk file name to install before running, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_apk: Option<SmolStr>,

    /// Every test case the package is known to contain.
    pub tests: Vec<TestIdentifier>,

    /// Tests known to fail on conformant devices. Excluded from the known-test
    /// set unless the run opts into them.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub known_failures: BTreeSet<TestIdentifier>,
}

/// One entry in a plan document: a package reference plus its filters.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlanEntry {
    /// The logical package name this entry refers to.
    pub name: SmolStr,

    /// Tests to include; empty means the full known-test set.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub include: BTreeSet<TestIdentifier>,

    /// Tests to exclude.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclude: BTreeSet<TestIdentifier>,
}

/// A plan document: a named, ordered list of package references with
/// per-package filters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlanDocument {
    /// The entries in execution order.
    pub entries: Vec<PlanEntry>,
}

/// One recorded result from a prior session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionResult {
    /// The package variant the test belongs to.
    pub package_id: PackageId,

    /// The test case.
    pub test: TestIdentifier,

    /// The recorded status.
    pub status: TestStatus,
}

/// A summary of a prior session's results, used to derive continuation plans.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionSummary {
    /// The session id.
    pub id: u32,

    /// Every recorded result.
    pub results: Vec<SessionResult>,
}
