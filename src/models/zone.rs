// Firewalld State - Zone Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Zone settings snapshot and the primitives that can be toggled in a zone.

use std::fmt;

use super::{ForwardPort, PortSpec, RichRule};

/// A primitive whose membership in a zone can be switched on or off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneItem {
    Service(String),
    Protocol(String),
    Port(PortSpec),
    SourcePort(PortSpec),
    IcmpBlock(String),
    IcmpBlockInversion,
    Masquerade,
    Forward,
    ForwardPort(ForwardPort),
    /// Stored in canonical form.
    RichRule(String),
    Interface(String),
    Source(String),
}

impl ZoneItem {
    /// Build a rich rule item, canonicalizing the rule text.
    pub fn rich_rule(rule: &str) -> Self {
        ZoneItem::RichRule(RichRule::canonicalize(rule))
    }

    /// Short kind label used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ZoneItem::Service(_) => "service",
            ZoneItem::Protocol(_) => "protocol",
            ZoneItem::Port(_) => "port",
            ZoneItem::SourcePort(_) => "source_port",
            ZoneItem::IcmpBlock(_) => "icmp-block",
            ZoneItem::IcmpBlockInversion => "icmp-block-inversion",
            ZoneItem::Masquerade => "masquerade",
            ZoneItem::Forward => "forward",
            ZoneItem::ForwardPort(_) => "port_forward",
            ZoneItem::RichRule(_) => "rich_rule",
            ZoneItem::Interface(_) => "interface",
            ZoneItem::Source(_) => "source",
        }
    }

    /// Whether the runtime layer accepts a lease duration for this item.
    pub fn supports_timeout(&self) -> bool {
        matches!(
            self,
            ZoneItem::Service(_)
                | ZoneItem::Protocol(_)
                | ZoneItem::Port(_)
                | ZoneItem::SourcePort(_)
                | ZoneItem::IcmpBlock(_)
                | ZoneItem::ForwardPort(_)
                | ZoneItem::RichRule(_)
        )
    }
}

impl fmt::Display for ZoneItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneItem::Service(v)
            | ZoneItem::Protocol(v)
            | ZoneItem::IcmpBlock(v)
            | ZoneItem::RichRule(v)
            | ZoneItem::Interface(v)
            | ZoneItem::Source(v) => write!(f, "{} {}", self.kind(), v),
            ZoneItem::Port(spec) | ZoneItem::SourcePort(spec) => write!(f, "{} {}", self.kind(), spec),
            ZoneItem::ForwardPort(fwd) => write!(f, "{} {}", self.kind(), fwd),
            ZoneItem::IcmpBlockInversion | ZoneItem::Masquerade | ZoneItem::Forward => {
                f.write_str(self.kind())
            }
        }
    }
}

/// Mutable copy of a zone's permanent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSettings {
    pub version: String,
    pub short: String,
    pub description: String,
    pub target: String,
    pub services: Vec<String>,
    pub ports: Vec<PortSpec>,
    pub icmp_blocks: Vec<String>,
    pub masquerade: bool,
    pub forward_ports: Vec<ForwardPort>,
    pub interfaces: Vec<String>,
    pub sources: Vec<String>,
    pub rich_rules: Vec<String>,
    pub protocols: Vec<String>,
    pub source_ports: Vec<PortSpec>,
    pub icmp_block_inversion: bool,
    pub forward: bool,
    /// `None` when the daemon did not report priorities.
    pub ingress_priority: Option<i32>,
    pub egress_priority: Option<i32>,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            version: String::new(),
            short: String::new(),
            description: String::new(),
            target: "default".to_string(),
            services: Vec::new(),
            ports: Vec::new(),
            icmp_blocks: Vec::new(),
            masquerade: false,
            forward_ports: Vec::new(),
            interfaces: Vec::new(),
            sources: Vec::new(),
            rich_rules: Vec::new(),
            protocols: Vec::new(),
            source_ports: Vec::new(),
            icmp_block_inversion: false,
            forward: false,
            ingress_priority: None,
            egress_priority: None,
        }
    }
}

fn insert_unique<T: PartialEq + Clone>(list: &mut Vec<T>, value: &T) {
    if !list.contains(value) {
        list.push(value.clone());
    }
}

impl ZoneSettings {
    /// Whether `item` is declared in this snapshot.
    pub fn contains(&self, item: &ZoneItem) -> bool {
        match item {
            ZoneItem::Service(s) => self.services.contains(s),
            ZoneItem::Protocol(p) => self.protocols.contains(p),
            ZoneItem::Port(spec) => self.ports.contains(spec),
            ZoneItem::SourcePort(spec) => self.source_ports.contains(spec),
            ZoneItem::IcmpBlock(b) => self.icmp_blocks.contains(b),
            ZoneItem::IcmpBlockInversion => self.icmp_block_inversion,
            ZoneItem::Masquerade => self.masquerade,
            ZoneItem::Forward => self.forward,
            ZoneItem::ForwardPort(fwd) => self.forward_ports.contains(fwd),
            ZoneItem::RichRule(rule) => self
                .rich_rules
                .iter()
                .any(|existing| RichRule::canonicalize(existing) == *rule),
            ZoneItem::Interface(i) => self.interfaces.contains(i),
            ZoneItem::Source(s) => self.sources.contains(s),
        }
    }

    /// Declare `item`. Adding something already present is a no-op.
    pub fn insert(&mut self, item: &ZoneItem) {
        match item {
            ZoneItem::Service(s) => insert_unique(&mut self.services, s),
            ZoneItem::Protocol(p) => insert_unique(&mut self.protocols, p),
            ZoneItem::Port(spec) => insert_unique(&mut self.ports, spec),
            ZoneItem::SourcePort(spec) => insert_unique(&mut self.source_ports, spec),
            ZoneItem::IcmpBlock(b) => insert_unique(&mut self.icmp_blocks, b),
            ZoneItem::IcmpBlockInversion => self.icmp_block_inversion = true,
            ZoneItem::Masquerade => self.masquerade = true,
            ZoneItem::Forward => self.forward = true,
            ZoneItem::ForwardPort(fwd) => insert_unique(&mut self.forward_ports, fwd),
            ZoneItem::RichRule(rule) => {
                if !self.contains(item) {
                    self.rich_rules.push(rule.clone());
                }
            }
            ZoneItem::Interface(i) => insert_unique(&mut self.interfaces, i),
            ZoneItem::Source(s) => insert_unique(&mut self.sources, s),
        }
    }

    /// Drop `item`. Removing something absent is a no-op.
    pub fn remove(&mut self, item: &ZoneItem) {
        match item {
            ZoneItem::Service(s) => self.services.retain(|v| v != s),
            ZoneItem::Protocol(p) => self.protocols.retain(|v| v != p),
            ZoneItem::Port(spec) => self.ports.retain(|v| v != spec),
            ZoneItem::SourcePort(spec) => self.source_ports.retain(|v| v != spec),
            ZoneItem::IcmpBlock(b) => self.icmp_blocks.retain(|v| v != b),
            ZoneItem::IcmpBlockInversion => self.icmp_block_inversion = false,
            ZoneItem::Masquerade => self.masquerade = false,
            ZoneItem::Forward => self.forward = false,
            ZoneItem::ForwardPort(fwd) => self.forward_ports.retain(|v| v != fwd),
            ZoneItem::RichRule(rule) => self
                .rich_rules
                .retain(|existing| RichRule::canonicalize(existing) != *rule),
            ZoneItem::Interface(i) => self.interfaces.retain(|v| v != i),
            ZoneItem::Source(s) => self.sources.retain(|v| v != s),
        }
    }
}
