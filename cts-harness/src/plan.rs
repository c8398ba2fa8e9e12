// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test plans and session continuation.
//!
//! A plan is a named, ordered list of package references plus per-package
//! filters. Plans normally come from the build's plan directory; continuing a
//! prior session synthesizes an ephemeral derived plan from that session's
//! not-executed tests.

use crate::errors::{PlanError, SessionError};
use camino::Utf8PathBuf;
use chrono::Utc;
use cts_metadata::{PlanDocument, PlanEntry, SessionSummary, TestStatus};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// A resolved plan: ordered package references with per-package filters.
#[derive(Clone, Debug)]
pub struct Plan {
    name: String,
    doc: PlanDocument,
}

impl Plan {
    /// Creates a plan from a parsed document.
    pub fn new(name: impl Into<String>, doc: PlanDocument) -> Self {
        Self {
            name: name.into(),
            doc,
        }
    }

    /// Returns the plan name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the referenced package names in plan order.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.doc.entries.iter().map(|e| e.name.as_str())
    }

    /// Returns the entry for a package name, if the plan references it.
    pub fn entry(&self, name: &str) -> Option<&PlanEntry> {
        self.doc.entries.iter().find(|e| e.name == name)
    }
}

/// A source of named plans.
pub trait PlanSource {
    /// Loads the plan with the given name.
    fn load(&self, name: &str) -> Result<Plan, PlanError>;
}

/// A [`PlanSource`] reading `<name>.json` documents from a directory.
#[derive(Clone, Debug)]
pub struct JsonPlanSource {
    dir: Utf8PathBuf,
}

impl JsonPlanSource {
    /// Creates a plan source rooted at `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PlanSource for JsonPlanSource {
    fn load(&self, name: &str) -> Result<Plan, PlanError> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(PlanError::NotFound {
                name: name.to_owned(),
                path,
            });
        }
        let bytes = std::fs::read(&path).map_err(|error| PlanError::Read {
            path: path.clone(),
            error,
        })?;
        let doc: PlanDocument =
            serde_json::from_slice(&bytes).map_err(|error| PlanError::Parse { path, error })?;
        Ok(Plan::new(name, doc))
    }
}

/// A store of prior session summaries.
pub trait SessionStore {
    /// Loads the summary for the given session id.
    fn load(&self, id: u32) -> Result<SessionSummary, SessionError>;
}

/// A [`SessionStore`] reading `<id>.json` summaries from a directory.
#[derive(Clone, Debug)]
pub struct JsonSessionStore {
    dir: Utf8PathBuf,
}

impl JsonSessionStore {
    /// Creates a session store rooted at `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SessionStore for JsonSessionStore {
    fn load(&self, id: u32) -> Result<SessionSummary, SessionError> {
        let path = self.dir.join(format!("{id}.json"));
        if !path.exists() {
            return Err(SessionError::NotFound { id, path });
        }
        let bytes = std::fs::read(&path).map_err(|error| SessionError::Read {
            path: path.clone(),
            error,
        })?;
        serde_json::from_slice(&bytes).map_err(|error| SessionError::Parse { path, error })
    }
}

/// Derives an ephemeral plan from a prior session, carrying exactly the tests
/// whose recorded status matches `status`.
///
/// Packages with no matching tests are omitted entirely rather than being
/// given an empty (match-all) include filter. The plan name embeds a
/// timestamp so derived plans are unique across invocations.
pub fn derived_plan(summary: &SessionSummary, status: TestStatus) -> Plan {
    let mut entries: IndexMap<SmolStr, PlanEntry> = IndexMap::new();
    for result in &summary.results {
        if result.status != status {
            continue;
        }
        let entry = entries
            .entry(result.package_id.name.clone())
            .or_insert_with(|| PlanEntry {
                name: result.package_id.name.clone(),
                ..PlanEntry::default()
            });
        entry.include.insert(result.test.clone());
    }
    let name = format!(
        "session-{}-{}",
        summary.id,
        Utc::now().timestamp_millis()
    );
    Plan::new(
        name,
        PlanDocument {
            entries: entries.into_values().collect(),
        },
    )
}
