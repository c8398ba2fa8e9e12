// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selection resolution: turning a run specification into an ordered,
//! de-duplicated list of test package definitions.
//!
//! The selector modes have deliberately different failure semantics. An
//! unresolvable explicit package name is fatal; a class or test filter that
//! matches nothing is a soft miss that resolves to an empty run, because a
//! mistyped filter over a large suite should not be catastrophic.

use crate::{
    config::{HarnessConfig, Selector},
    errors::SelectionError,
    plan::{Plan, PlanSource, SessionStore, derived_plan},
    repo::{PackageRepo, TestPackageDef},
};
use cts_metadata::{PackageId, TestIdentifier, TestStatus};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// Resolves the configuration's selector into package definitions, in
/// selection order, with per-package filters attached.
///
/// Definitions whose ABI is not in `abis` (the intersection of the
/// device-supported and suite-supported sets) are silently dropped: the
/// device simply cannot run them.
pub fn resolve_packages(
    config: &HarnessConfig,
    repo: &dyn PackageRepo,
    plan_source: &dyn PlanSource,
    session_store: &dyn SessionStore,
    abis: &BTreeSet<String>,
) -> Result<Vec<TestPackageDef>, SelectionError> {
    let selector = config.selector()?;
    let mut resolved: IndexMap<PackageId, TestPackageDef> = IndexMap::new();

    match selector {
        Selector::Plan(name) => {
            info!("executing test plan {name}");
            let plan = plan_source.load(name)?;
            resolve_plan(&plan, &config.exclude_packages, repo, &mut resolved);
        }
        Selector::Packages(names) => {
            info!("executing test packages {names:?}");
            for name in names {
                let defs = repo.by_name(name);
                if defs.is_empty() {
                    return Err(SelectionError::PackageNotFound { name: name.clone() });
                }
                for def in defs {
                    resolved.entry(def.id().clone()).or_insert(def);
                }
            }
        }
        Selector::Class { class, method } => {
            info!("executing test class {class}");
            resolve_class(repo, class, method, &mut resolved);
        }
        Selector::Test(test_name) => {
            info!("executing test {test_name}");
            match test_name.parse::<TestIdentifier>() {
                Ok(test) => {
                    resolve_class(repo, &test.class_name, Some(&test.method_name), &mut resolved);
                }
                Err(_) => {
                    warn!("could not parse class and method from test {test_name}");
                }
            }
        }
        Selector::ContinueSession(session_id) => {
            info!("continuing session {session_id}");
            let summary = session_store.load(session_id)?;
            let plan = derived_plan(&summary, TestStatus::NotExecuted);
            resolve_plan(&plan, &config.exclude_packages, repo, &mut resolved);
        }
    }

    Ok(resolved
        .into_values()
        .filter(|def| abis.contains(def.abi()))
        .collect())
}

fn resolve_plan(
    plan: &Plan,
    excluded: &[String],
    repo: &dyn PackageRepo,
    resolved: &mut IndexMap<PackageId, TestPackageDef>,
) {
    for name in plan.package_names() {
        if excluded.iter().any(|e| e == name) {
            continue;
        }
        let defs = repo.by_name(name);
        if defs.is_empty() {
            error!(
                "could not find test package {name} referenced in plan {}",
                plan.name()
            );
        }
        for mut def in defs {
            if let Some(entry) = plan.entry(name) {
                def.set_plan_filter(entry.include.clone(), entry.exclude.clone());
            }
            resolved.entry(def.id().clone()).or_insert(def);
        }
    }
}

fn resolve_class(
    repo: &dyn PackageRepo,
    class: &str,
    method: Option<&str>,
    resolved: &mut IndexMap<PackageId, TestPackageDef>,
) {
    let ids = repo.ids_for_class(class);
    if ids.is_empty() {
        warn!("could not find package for test class {class}");
    }
    for id in ids {
        if let Some(mut def) = repo.get(&id) {
            def.set_class_filter(class, method);
            resolved.entry(id).or_insert(def);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        plan::JsonPlanSource,
        test_helpers::{FakeSessionStore, StaticPlanSource, manifest, suite_abi_set, test_id},
    };
    use crate::repo::TestPackageRepo;
    use cts_metadata::{
        PlanDocument, PlanEntry, SessionResult, SessionSummary,
    };
    use pretty_assertions::assert_eq;

    fn repo() -> TestPackageRepo {
        let mut repo = TestPackageRepo::new();
        repo.insert_manifest(
            &manifest("PkgA", &["arm64-v8a", "armeabi-v7a"], &["com.example.FooTest#testFoo"]),
            "da".to_owned(),
            false,
        );
        repo.insert_manifest(
            &manifest("PkgB", &["arm64-v8a"], &["com.example.BarTest#testBar"]),
            "db".to_owned(),
            false,
        );
        repo.insert_manifest(
            &manifest("PkgC", &["arm64-v8a"], &["com.example.BazTest#testBaz"]),
            "dc".to_owned(),
            false,
        );
        repo
    }

    fn plan_of(names: &[&str]) -> Plan {
        Plan::new(
            "test-plan",
            PlanDocument {
                entries: names
                    .iter()
                    .map(|name| PlanEntry {
                        name: (*name).into(),
                        ..PlanEntry::default()
                    })
                    .collect(),
            },
        )
    }

    fn resolve(
        config: &HarnessConfig,
        repo: &TestPackageRepo,
        plan: Option<Plan>,
    ) -> Result<Vec<TestPackageDef>, SelectionError> {
        resolve_packages(
            config,
            repo,
            &StaticPlanSource::new(plan),
            &FakeSessionStore::empty(),
            &suite_abi_set(),
        )
    }

    #[test]
    fn plan_mode_respects_exclusions_and_order() {
        let config = HarnessConfig {
            plan: Some("test-plan".to_owned()),
            exclude_packages: vec!["PkgB".to_owned()],
            ..HarnessConfig::default()
        };
        let defs =
            resolve(&config, &repo(), Some(plan_of(&["PkgA", "PkgB", "PkgC"]))).expect("resolves");
        let names: Vec<&str> = defs.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["PkgA", "PkgA", "PkgC"], "PkgB excluded, order kept");
    }

    #[test]
    fn package_mode_unknown_name_is_fatal() {
        let config = HarnessConfig {
            packages: vec!["PkgA".to_owned(), "NoSuchPkg".to_owned()],
            ..HarnessConfig::default()
        };
        match resolve(&config, &repo(), None) {
            Err(SelectionError::PackageNotFound { name }) => assert_eq!(name, "NoSuchPkg"),
            other => panic!("expected PackageNotFound, got {other:?}"),
        }
    }

    #[test]
    fn class_mode_soft_miss_is_empty() {
        let config = HarnessConfig {
            class_name: Some("com.example.NoSuchTest".to_owned()),
            ..HarnessConfig::default()
        };
        let defs = resolve(&config, &repo(), None).expect("soft miss resolves");
        assert!(defs.is_empty());
    }

    #[test]
    fn malformed_test_name_is_empty() {
        let config = HarnessConfig {
            test_name: Some("missing-separator".to_owned()),
            ..HarnessConfig::default()
        };
        let defs = resolve(&config, &repo(), None).expect("malformed test resolves");
        assert!(defs.is_empty());
    }

    #[test]
    fn class_mode_attaches_filter_to_every_candidate() {
        let mut repo = repo();
        repo.insert_manifest(
            &manifest("PkgD", &["arm64-v8a"], &["com.example.FooTest#testFoo"]),
            "dd".to_owned(),
            false,
        );
        let config = HarnessConfig {
            class_name: Some("com.example.FooTest".to_owned()),
            method_name: Some("testFoo".to_owned()),
            ..HarnessConfig::default()
        };
        let defs = resolve(&config, &repo, None).expect("resolves");
        let names: BTreeSet<&str> = defs.iter().map(|d| d.name()).collect();
        assert_eq!(names, ["PkgA", "PkgD"].into_iter().collect());
        for def in &defs {
            assert_eq!(
                def.known_tests().into_iter().collect::<Vec<_>>(),
                vec![test_id("com.example.FooTest#testFoo")],
            );
        }
    }

    #[test]
    fn abi_filtering_drops_unsupported_variants() {
        // PkgA exists for arm64-v8a and armeabi-v7a; the device only supports
        // arm64-v8a.
        let config = HarnessConfig {
            class_name: Some("com.example.FooTest".to_owned()),
            ..HarnessConfig::default()
        };
        let abis: BTreeSet<String> = ["arm64-v8a".to_owned()].into_iter().collect();
        let defs = resolve_packages(
            &config,
            &repo(),
            &StaticPlanSource::new(None),
            &FakeSessionStore::empty(),
            &abis,
        )
        .expect("resolves");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].abi(), "arm64-v8a");
    }

    #[test]
    fn resolution_is_idempotent() {
        let config = HarnessConfig {
            plan: Some("test-plan".to_owned()),
            ..HarnessConfig::default()
        };
        let first = resolve(&config, &repo(), Some(plan_of(&["PkgC", "PkgA"]))).expect("resolves");
        let second = resolve(&config, &repo(), Some(plan_of(&["PkgC", "PkgA"]))).expect("resolves");
        assert_eq!(first, second);
    }

    #[test]
    fn continue_session_runs_not_executed_tests() {
        let mut repo = TestPackageRepo::new();
        repo.insert_manifest(
            &manifest(
                "PkgA",
                &["arm64-v8a"],
                &["com.example.FooTest#testFoo", "com.example.FooTest#testBar"],
            ),
            "da".to_owned(),
            false,
        );
        let summary = SessionSummary {
            id: 3,
            results: vec![
                SessionResult {
                    package_id: PackageId::new("arm64-v8a", "PkgA"),
                    test: test_id("com.example.FooTest#testFoo"),
                    status: TestStatus::Pass,
                },
                SessionResult {
                    package_id: PackageId::new("arm64-v8a", "PkgA"),
                    test: test_id("com.example.FooTest#testBar"),
                    status: TestStatus::NotExecuted,
                },
            ],
        };
        let config = HarnessConfig {
            continue_session: Some(3),
            ..HarnessConfig::default()
        };
        let defs = resolve_packages(
            &config,
            &repo,
            &StaticPlanSource::new(None),
            &FakeSessionStore::with_summary(summary),
            &suite_abi_set(),
        )
        .expect("resolves");
        assert_eq!(defs.len(), 1);
        assert_eq!(
            defs[0].known_tests().into_iter().collect::<Vec<_>>(),
            vec![test_id("com.example.FooTest#testBar")],
        );
    }

    #[test]
    fn missing_plan_is_fatal() {
        let config = HarnessConfig {
            plan: Some("no-such-plan".to_owned()),
            ..HarnessConfig::default()
        };
        let result = resolve_packages(
            &config,
            &repo(),
            &JsonPlanSource::new("/nonexistent/plans"),
            &FakeSessionStore::empty(),
            &suite_abi_set(),
        );
        assert!(matches!(result, Err(SelectionError::Plan(_))));
    }
}
