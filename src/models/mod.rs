// Firewalld State - Models
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Data models for zone primitives and declared state.

mod port;
mod rich_rule;
mod state;
mod zone;

pub use port::{ForwardPort, PortSpec};
pub use rich_rule::{
    ActionKind, AddressKind, AddressMatch, RateLimit, RichRule, RichRuleError, RuleAction,
    RuleElement, RuleLog,
};
pub use state::{DesiredState, Layer, Layers, ZoneTarget};
pub use zone::{ZoneItem, ZoneSettings};
