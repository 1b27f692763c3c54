// Firewalld State - Reconciliation
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Reconciles declared primitive state against firewalld's two layers.

mod engine;
mod kinds;
mod settings;

pub use engine::{Outcome, Transaction};
pub use kinds::{RuleKind, RuleOps};
pub use settings::ZoneSettingsCache;
