// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Host-side orchestration core for the compatibility test suite.
//!
//! The entry point is [`runner::SuiteRunner`], which resolves a run
//! specification ([`config::HarnessConfig`]) against a package repository
//! ([`repo`]), optionally splits the resolved list into shards
//! ([`partition`]), and drives each package against a device handle
//! ([`device`]) while reconciling results through the reporting pipeline
//! ([`reporter`]).

pub mod config;
pub mod device;
pub mod errors;
pub mod partition;
pub mod plan;
pub mod reboot;
pub mod repo;
pub mod reporter;
pub mod runner;
pub mod selection;

#[cfg(test)]
mod test_helpers;
