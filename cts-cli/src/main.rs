// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `cts` binary: repository listing and selection resolution.
//!
//! Run execution against a live device transport is wired up by lab tooling
//! that links `cts-harness` directly; the binary covers the inspection
//! surface.

use camino::Utf8PathBuf;
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
use cts_harness::{
    config::HarnessConfig,
    partition::partition,
    plan::{JsonPlanSource, JsonSessionStore},
    repo::{PackageRepo, TestPackageDef, TestPackageRepo},
    selection::resolve_packages,
};
use cts_metadata::SUITE_ABIS;
use std::collections::BTreeSet;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "cts", version, about = "Compatibility test suite harness")]
struct CtsApp {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl CtsApp {
    fn exec(self) -> Result<()> {
        match self.command {
            Command::List { command } => match command {
                ListCommand::Packages { build } => list_packages(&build),
            },
            Command::Resolve {
                build,
                selection,
                abi,
                shards,
                shard_index,
            } => resolve(&build, &selection, &abi, shards, shard_index),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List repository contents
    List {
        #[command(subcommand)]
        command: ListCommand,
    },

    /// Resolve a run specification into a package execution order
    ///
    /// Prints the packages the harness would run, in order, after selection,
    /// ABI filtering and (optionally) shard assignment.
    Resolve {
        #[command(flatten)]
        build: BuildOpts,

        #[command(flatten)]
        selection: SelectionOpts,

        /// Device ABI to resolve against; repeatable [default: all suite ABIs]
        #[arg(long, value_name = "ABI")]
        abi: Vec<String>,

        /// Number of shards to split the run into
        #[arg(long, value_name = "N", default_value_t = 1)]
        shards: usize,

        /// Print only this shard
        #[arg(long, value_name = "I", requires = "shards")]
        shard_index: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
enum ListCommand {
    /// List every test package in the repository
    Packages {
        #[command(flatten)]
        build: BuildOpts,
    },
}

#[derive(Debug, Args)]
struct BuildOpts {
    /// Suite build output directory
    #[arg(long, value_name = "DIR")]
    build_dir: Utf8PathBuf,
}

impl BuildOpts {
    fn testcases_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("testcases")
    }

    fn plans_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("plans")
    }

    fn sessions_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("sessions")
    }
}

#[derive(Debug, Args)]
struct SelectionOpts {
    /// Test plan to run
    #[arg(long, value_name = "PLAN")]
    plan: Option<String>,

    /// Test package to run; repeatable
    #[arg(long = "package", value_name = "NAME")]
    packages: Vec<String>,

    /// Test package to exclude from the run; repeatable
    #[arg(long = "exclude-package", value_name = "NAME")]
    exclude_packages: Vec<String>,

    /// Test class to run
    #[arg(long = "class", value_name = "CLASS")]
    class_name: Option<String>,

    /// Test method to run; requires --class
    #[arg(long = "method", value_name = "METHOD")]
    method_name: Option<String>,

    /// Single test to run, as class#method
    #[arg(long = "test", value_name = "CLASS#METHOD")]
    test_name: Option<String>,

    /// Continue a previous session, running only its not-executed tests
    #[arg(long = "continue-session", value_name = "ID")]
    continue_session: Option<u32>,

    /// Include tests marked as known failures
    #[arg(long)]
    run_known_failures: bool,

    /// Restrict the run to a single ABI
    #[arg(long, value_name = "ABI")]
    force_abi: Option<String>,
}

impl SelectionOpts {
    fn to_config(&self, shards: usize) -> HarnessConfig {
        HarnessConfig {
            plan: self.plan.clone(),
            packages: self.packages.clone(),
            exclude_packages: self.exclude_packages.clone(),
            class_name: self.class_name.clone(),
            method_name: self.method_name.clone(),
            test_name: self.test_name.clone(),
            continue_session: self.continue_session,
            run_known_failures: self.run_known_failures,
            force_abi: self.force_abi.clone(),
            shards,
            ..HarnessConfig::default()
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let app = CtsApp::parse();
    init_logging(app.verbose);
    app.exec()
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list_packages(build: &BuildOpts) -> Result<()> {
    // Listing shows the full repository content, known failures included.
    let repo = TestPackageRepo::from_dir(&build.testcases_dir(), true)?;
    for id in repo.ids() {
        if let Some(def) = repo.get(&id) {
            println!("{id} ({} tests)", def.known_tests().len());
        }
    }
    Ok(())
}

fn resolve(
    build: &BuildOpts,
    selection: &SelectionOpts,
    abis: &[String],
    shards: usize,
    shard_index: Option<usize>,
) -> Result<()> {
    let config = selection.to_config(shards);
    let defs = resolve_defs(build, &config, abis)?;

    match partition(&defs, config.shards) {
        Some(sharded) => {
            // The effective shard count is clamped to the package count, so
            // a raw index within --shards can still be out of range.
            if let Some(chosen) = shard_index
                && chosen >= sharded.len()
            {
                bail!(
                    "shard index {chosen} out of range: this resolution produces {} shards",
                    sharded.len()
                );
            }
            for (index, shard) in sharded.iter().enumerate() {
                if shard_index.is_some_and(|chosen| chosen != index) {
                    continue;
                }
                println!("shard {index}:");
                for def in shard {
                    print_def("  ", def);
                }
            }
        }
        None => {
            if shard_index.is_some() {
                bail!("--shard-index requires --shards greater than 1");
            }
            for def in &defs {
                print_def("", def);
            }
        }
    }
    Ok(())
}

/// Resolves and sorts the package list the way the orchestrator would before
/// shard assignment.
fn resolve_defs(
    build: &BuildOpts,
    config: &HarnessConfig,
    abis: &[String],
) -> Result<Vec<TestPackageDef>> {
    let repo = TestPackageRepo::from_dir(&build.testcases_dir(), config.run_known_failures)?;
    let plan_source = JsonPlanSource::new(build.plans_dir());
    let session_store = JsonSessionStore::new(build.sessions_dir());

    let mut abi_set: BTreeSet<String> = if abis.is_empty() {
        SUITE_ABIS.iter().map(|abi| (*abi).to_owned()).collect()
    } else {
        abis.iter().cloned().collect()
    };
    if let Some(force_abi) = &config.force_abi {
        abi_set.retain(|abi| abi == force_abi);
    }

    let mut defs = resolve_packages(config, &repo, &plan_source, &session_store, &abi_set)?;
    defs.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(defs)
}

fn print_def(indent: &str, def: &TestPackageDef) {
    println!("{indent}{} ({} tests)", def.id(), def.known_tests().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;
    use cts_metadata::PackageManifest;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_is_well_formed() {
        CtsApp::command().debug_assert();
    }

    #[test]
    fn selection_flags_map_to_config() {
        let app = CtsApp::parse_from([
            "cts",
            "resolve",
            "--build-dir",
            "/out",
            "--plan",
            "cts",
            "--exclude-package",
            "CtsViewTestCases",
            "--shards",
            "3",
        ]);
        match app.command {
            Command::Resolve {
                selection, shards, ..
            } => {
                let config = selection.to_config(shards);
                assert_eq!(config.plan.as_deref(), Some("cts"));
                assert_eq!(config.exclude_packages, vec!["CtsViewTestCases".to_owned()]);
                assert_eq!(config.shards, 3);
                config.validate().expect("config is valid");
            }
            other => panic!("expected resolve, got {other:?}"),
        }
    }

    /// A build dir holding one two-ABI package manifest.
    fn sample_build_dir() -> Utf8TempDir {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let testcases = dir.path().join("testcases");
        std::fs::create_dir(&testcases).expect("testcases dir created");
        let manifest = PackageManifest {
            name: "CtsViewTestCases".into(),
            abis: vec!["arm64-v8a".into(), "x86".into()],
            target_package: None,
            target_apk: None,
            tests: vec![
                "android.view.cts.ViewTest#testLayout"
                    .parse()
                    .expect("id parses"),
            ],
            known_failures: BTreeSet::new(),
        };
        std::fs::write(
            testcases.join("CtsViewTestCases.json"),
            serde_json::to_vec(&manifest).expect("manifest serializes"),
        )
        .expect("manifest written");
        dir
    }

    fn view_selection() -> SelectionOpts {
        SelectionOpts {
            plan: None,
            packages: vec!["CtsViewTestCases".to_owned()],
            exclude_packages: Vec::new(),
            class_name: None,
            method_name: None,
            test_name: None,
            continue_session: None,
            run_known_failures: false,
            force_abi: None,
        }
    }

    #[test]
    fn resolve_defs_from_disk() {
        let dir = sample_build_dir();
        let build = BuildOpts {
            build_dir: dir.path().to_owned(),
        };
        let config = HarnessConfig {
            packages: vec!["CtsViewTestCases".to_owned()],
            ..HarnessConfig::default()
        };

        let defs = resolve_defs(&build, &config, &[]).expect("resolves");
        assert_eq!(
            defs.iter().map(|d| d.id().to_string()).collect::<Vec<_>>(),
            vec!["arm64-v8a:CtsViewTestCases", "x86:CtsViewTestCases"],
        );

        let one_abi = resolve_defs(&build, &config, &["x86".to_owned()]).expect("resolves");
        assert_eq!(one_abi.len(), 1);
        assert_eq!(one_abi[0].abi(), "x86");
    }

    #[test]
    fn shard_index_out_of_range_is_rejected() {
        let dir = sample_build_dir();
        let build = BuildOpts {
            build_dir: dir.path().to_owned(),
        };
        let selection = view_selection();

        // Two per-ABI variants resolve, so asking for 5 shards yields an
        // effective count of 2.
        let error = resolve(&build, &selection, &[], 5, Some(4))
            .expect_err("index beyond the effective shard count");
        assert!(error.to_string().contains("out of range"), "{error}");

        let error = resolve(&build, &selection, &[], 1, Some(0)).expect_err("unsharded run");
        assert!(error.to_string().contains("--shards"), "{error}");
    }
}
