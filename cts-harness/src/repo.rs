// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test package repository.
//!
//! A build artifact tree contains one JSON manifest per logical test package;
//! the repository expands each manifest into one [`TestPackageDef`] per
//! supported ABI and indexes the result by id, by logical name, and by
//! contained class name.

use crate::errors::RepoLoadError;
use camino::Utf8Path;
use cts_metadata::{PackageId, PackageManifest, TestIdentifier, is_suite_abi};
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;
use xxhash_rust::xxh64::xxh64;

/// The filter attached to a package definition during selection resolution.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterSpec {
    /// Restrict to tests in this class.
    pub class_name: Option<SmolStr>,

    /// Restrict to this method; only meaningful with `class_name`.
    pub method_name: Option<SmolStr>,

    /// Restrict to these tests. Empty means the full known-test set.
    pub include: BTreeSet<TestIdentifier>,

    /// Exclude these tests.
    pub exclude: BTreeSet<TestIdentifier>,
}

impl FilterSpec {
    fn matches(&self, test: &TestIdentifier) -> bool {
        if let Some(class) = &self.class_name {
            if test.class_name != *class {
                return false;
            }
            if let Some(method) = &self.method_name
                && test.method_name != *method
            {
                return false;
            }
        }
        if !self.include.is_empty() && !self.include.contains(test) {
            return false;
        }
        !self.exclude.contains(test)
    }
}

/// One installable test package variant: a logical package built for a single
/// ABI, with its known-test manifest.
///
/// Immutable once created, except for the selection filter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestPackageDef {
    id: PackageId,
    target_package: Option<SmolStr>,
    target_apk: Option<SmolStr>,
    digest: String,
    tests: BTreeSet<TestIdentifier>,
    filter: FilterSpec,
}

impl TestPackageDef {
    /// Creates a new definition.
    pub fn new(
        id: PackageId,
        target_package: Option<SmolStr>,
        target_apk: Option<SmolStr>,
        digest: String,
        tests: BTreeSet<TestIdentifier>,
    ) -> Self {
        Self {
            id,
            target_package,
            target_apk,
            digest,
            tests,
            filter: FilterSpec::default(),
        }
    }

    /// Returns the package id (logical name plus ABI).
    pub fn id(&self) -> &PackageId {
        &self.id
    }

    /// Returns the logical package name.
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Returns the ABI this variant is built for.
    pub fn abi(&self) -> &str {
        &self.id.abi
    }

    /// Returns the Android package name of the on-device target, if any.
    pub fn target_package(&self) -> Option<&str> {
        self.target_package.as_deref()
    }

    /// Returns the apk file name to install before running, if any.
    pub fn target_apk(&self) -> Option<&str> {
        self.target_apk.as_deref()
    }

    /// Returns the content digest of the package manifest, for change
    /// detection across reports.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Restricts the known-test set to one class, optionally one method.
    pub fn set_class_filter(&mut self, class: &str, method: Option<&str>) {
        self.filter.class_name = Some(class.into());
        self.filter.method_name = method.map(Into::into);
    }

    /// Attaches a plan's per-package inclusion and exclusion filters.
    pub fn set_plan_filter(
        &mut self,
        include: BTreeSet<TestIdentifier>,
        exclude: BTreeSet<TestIdentifier>,
    ) {
        self.filter.include = include;
        self.filter.exclude = exclude;
    }

    /// Returns true if any declared test belongs to `class`.
    pub fn contains_class(&self, class: &str) -> bool {
        self.tests.iter().any(|t| t.class_name == class)
    }

    /// Returns the known-test set after applying the selection filter.
    ///
    /// This is the manifest the result pipeline reconciles against: every
    /// test in it is either reported by the run or synthesized as
    /// not-executed.
    pub fn known_tests(&self) -> BTreeSet<TestIdentifier> {
        self.tests
            .iter()
            .filter(|t| self.filter.matches(t))
            .cloned()
            .collect()
    }
}

/// Lookup surface for installable test packages.
pub trait PackageRepo {
    /// Returns every package id in the repository, sorted.
    fn ids(&self) -> Vec<PackageId>;

    /// Returns the package with the exact given id.
    fn get(&self, id: &PackageId) -> Option<TestPackageDef>;

    /// Returns all per-ABI variants of a logical package name.
    fn by_name(&self, name: &str) -> Vec<TestPackageDef>;

    /// Returns the ids of every package containing the given class.
    ///
    /// The same class may exist in multiple packages; the full candidate set
    /// is returned.
    fn ids_for_class(&self, class_name: &str) -> Vec<PackageId>;
}

/// A [`PackageRepo`] backed by JSON manifests in a build artifact directory.
#[derive(Clone, Debug, Default)]
pub struct TestPackageRepo {
    packages: BTreeMap<PackageId, TestPackageDef>,
}

impl TestPackageRepo {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` manifest under `dir`.
    ///
    /// Manifest ABIs outside the suite-supported set are skipped with a
    /// warning. Tests marked as known failures are dropped from the known-test
    /// set unless `include_known_failures` is set.
    pub fn from_dir(dir: &Utf8Path, include_known_failures: bool) -> Result<Self, RepoLoadError> {
        let mut paths = Vec::new();
        let entries = dir.read_dir_utf8().map_err(|error| RepoLoadError::ReadDir {
            dir: dir.to_owned(),
            error,
        })?;
        for entry in entries {
            let entry = entry.map_err(|error| RepoLoadError::ReadDir {
                dir: dir.to_owned(),
                error,
            })?;
            let path = entry.into_path();
            if path.extension() == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut repo = Self::new();
        for path in paths {
            let bytes = std::fs::read(&path).map_err(|error| RepoLoadError::ReadManifest {
                path: path.clone(),
                error,
            })?;
            let manifest: PackageManifest =
                serde_json::from_slice(&bytes).map_err(|error| RepoLoadError::ParseManifest {
                    path: path.clone(),
                    error,
                })?;
            let digest = format!("{:016x}", xxh64(&bytes, 0));
            repo.insert_manifest(&manifest, digest, include_known_failures);
        }
        Ok(repo)
    }

    /// Expands a manifest into per-ABI definitions and indexes them.
    pub fn insert_manifest(
        &mut self,
        manifest: &PackageManifest,
        digest: String,
        include_known_failures: bool,
    ) {
        let mut tests: BTreeSet<TestIdentifier> = manifest.tests.iter().cloned().collect();
        if !include_known_failures {
            for known_failure in &manifest.known_failures {
                tests.remove(known_failure);
            }
        }
        for abi in &manifest.abis {
            if !is_suite_abi(abi) {
                warn!(
                    package = %manifest.name,
                    %abi,
                    "manifest declares an ABI the suite does not support, skipping"
                );
                continue;
            }
            let id = PackageId::new(abi.clone(), manifest.name.clone());
            let def = TestPackageDef::new(
                id.clone(),
                manifest.target_package.clone(),
                manifest.target_apk.clone(),
                digest.clone(),
                tests.clone(),
            );
            if self.packages.insert(id.clone(), def).is_some() {
                warn!(%id, "duplicate package id, later manifest wins");
            }
        }
    }
}

impl PackageRepo for TestPackageRepo {
    fn ids(&self) -> Vec<PackageId> {
        self.packages.keys().cloned().collect()
    }

    fn get(&self, id: &PackageId) -> Option<TestPackageDef> {
        self.packages.get(id).cloned()
    }

    fn by_name(&self, name: &str) -> Vec<TestPackageDef> {
        self.packages
            .values()
            .filter(|def| def.name() == name)
            .cloned()
            .collect()
    }

    fn ids_for_class(&self, class_name: &str) -> Vec<PackageId> {
        self.packages
            .values()
            .filter(|def| def.contains_class(class_name))
            .map(|def| def.id().clone())
            .collect()
    }
}
