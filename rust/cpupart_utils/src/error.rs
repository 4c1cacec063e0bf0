// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while resolving, loading and partitioning a node's CPU
/// inventory.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The request or the loaded topology violates a constraint.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Zero or multiple path matches while resolving a required resource.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Malformed YAML, cpulist or snapshot content.
    #[error("parse error: {0}")]
    Parse(String),

    /// Inconsistent in-memory state, e.g. an empty processor list.
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem access failure.
    #[error("failed to access {}: {}", .path.display(), .source)]
    Input { path: PathBuf, source: io::Error },
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn lookup(msg: impl Into<String>) -> Self {
        Error::Lookup(msg.into())
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub(crate) fn input(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Input {
            path: path.into(),
            source,
        }
    }
}
