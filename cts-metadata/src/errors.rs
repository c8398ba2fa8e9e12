// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing a [`TestIdentifier`](crate::TestIdentifier)
/// from its `class#method` text form.
#[derive(Clone, Debug)]
pub struct TestIdentifierParseError {
    input: String,
}

impl TestIdentifierParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for TestIdentifierParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "test identifier '{}' must be in the format class#method",
            self.input
        )
    }
}

impl error::Error for TestIdentifierParseError {}

/// An error that occurs while parsing a [`PackageId`](crate::PackageId) from
/// its `abi:name` text form.
#[derive(Clone, Debug)]
pub struct PackageIdParseError {
    input: String,
}

impl PackageIdParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for PackageIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "package id '{}' must be in the format abi:name", self.input)
    }
}

impl error::Error for PackageIdParseError {}
