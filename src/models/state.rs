// Firewalld State - Desired State Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Declared state and layer selection.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

/// The state an invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DesiredState {
    Enabled,
    Disabled,
    Present,
    Absent,
}

impl DesiredState {
    /// Whether the primitive should exist once reconciled.
    pub fn wants_enabled(self) -> bool {
        matches!(self, DesiredState::Enabled | DesiredState::Present)
    }

    /// `present` and `absent` only make sense for zone level operations.
    pub fn is_zone_level(self) -> bool {
        matches!(self, DesiredState::Present | DesiredState::Absent)
    }

    /// Collapse a boolean toggle (forward, masquerade, icmp-block-inversion)
    /// onto the enabled/disabled axis.
    ///
    /// `enabled` + `false` and `disabled` + `true` both mean "turn it off".
    pub fn normalize_toggle(self, flag: bool) -> DesiredState {
        if (self == DesiredState::Enabled) == flag {
            DesiredState::Enabled
        } else {
            DesiredState::Disabled
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DesiredState::Enabled => "enabled",
            DesiredState::Disabled => "disabled",
            DesiredState::Present => "present",
            DesiredState::Absent => "absent",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration layers touched by one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layers {
    pub permanent: bool,
    pub immediate: bool,
}

impl Layers {
    /// Apply the defaulting rules for the `permanent`, `immediate` and
    /// `offline` flags.
    ///
    /// `offline` forces `immediate` off when the daemon is down. A bare
    /// invocation always touches the runtime layer.
    pub fn resolve(permanent: bool, immediate: bool, offline: bool, daemon_offline: bool) -> Self {
        let mut immediate = immediate;
        if offline && daemon_offline {
            immediate = false;
        }
        if !permanent && !immediate {
            immediate = true;
        }
        Self { permanent, immediate }
    }

    pub fn describe(&self) -> &'static str {
        match (self.permanent, self.immediate) {
            (true, true) => "Permanent and Non-Permanent(immediate) operation",
            (true, false) => "Permanent operation",
            (false, true) => "Non-permanent operation",
            (false, false) => "No operation",
        }
    }
}

/// One of the two configuration layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Permanent,
    Runtime,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Permanent => f.write_str("permanent"),
            Layer::Runtime => f.write_str("runtime"),
        }
    }
}

/// Default disposition of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneTarget {
    #[default]
    Default,
    Accept,
    Drop,
    Reject,
}

impl ZoneTarget {
    pub const NAMES: [&'static str; 4] = ["default", "ACCEPT", "DROP", "%%REJECT%%"];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneTarget::Default => "default",
            ZoneTarget::Accept => "ACCEPT",
            ZoneTarget::Drop => "DROP",
            ZoneTarget::Reject => "%%REJECT%%",
        }
    }
}

impl FromStr for ZoneTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ZoneTarget::Default),
            "ACCEPT" => Ok(ZoneTarget::Accept),
            "DROP" => Ok(ZoneTarget::Drop),
            // firewalld writes both spellings for reject
            "%%REJECT%%" | "REJECT" => Ok(ZoneTarget::Reject),
            other => Err(format!("invalid zone target '{}'", other)),
        }
    }
}

impl fmt::Display for ZoneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_normalization() {
        use DesiredState::*;
        assert_eq!(Enabled.normalize_toggle(true), Enabled);
        assert_eq!(Enabled.normalize_toggle(false), Disabled);
        assert_eq!(Disabled.normalize_toggle(true), Disabled);
        assert_eq!(Disabled.normalize_toggle(false), Enabled);
    }

    #[test]
    fn test_layer_defaults() {
        // Nothing requested: runtime only.
        assert_eq!(
            Layers::resolve(false, false, false, false),
            Layers { permanent: false, immediate: true }
        );
        // Permanent alone stays permanent-only.
        assert_eq!(
            Layers::resolve(true, false, false, false),
            Layers { permanent: true, immediate: false }
        );
        // offline drops immediate only when the daemon is really down.
        assert_eq!(
            Layers::resolve(true, true, true, true),
            Layers { permanent: true, immediate: false }
        );
        assert_eq!(
            Layers::resolve(true, true, true, false),
            Layers { permanent: true, immediate: true }
        );
    }

    #[test]
    fn test_target_names() {
        for name in ZoneTarget::NAMES {
            let target: ZoneTarget = name.parse().unwrap();
            assert_eq!(target.as_str(), name);
        }
        assert!("reject".parse::<ZoneTarget>().is_err());
    }
}
