// Firewalld State - Errors
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Error kinds surfaced by the reconciliation engine.
//!
//! Every variant is fatal: nothing is retried, and the invocation stops at
//! the first failing primitive.

use thiserror::Error;

/// Message used whenever a zone-level operation reaches the runtime layer.
pub const ZONE_NOT_PERMANENT: &str = "Zone operations must be permanent. \
     Make sure you didn't set the 'permanent' flag to 'false' or the 'immediate' flag to 'true'.";

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The declared options are malformed or contradict each other.
    #[error("{0}")]
    Configuration(String),

    /// The primitive only exists in the permanent layer.
    #[error("{0}")]
    UnsupportedOperation(&'static str),

    /// A runtime operation was requested but firewalld is not running.
    #[error("firewall is not currently running, unable to perform immediate actions without a running firewall daemon")]
    UnreachableDaemon,

    /// The same interface is declared by several permanent zones.
    #[error("interface {interface} is in {count} zone XML files, can only be in one")]
    MultiZoneInterface { interface: String, count: usize },

    /// The daemon or the on-disk store rejected a call.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl ReconcileError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
