// Firewalld State - Zone XML
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Reading and writing firewalld zone files.
//!
//! Rich rules are kept as structured `<rule>` elements on disk and as
//! canonical rule strings in [`ZoneSettings`].

use std::collections::HashMap;
use std::io::Write;

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::warn;

use crate::models::{
    ActionKind, AddressKind, AddressMatch, ForwardPort, PortSpec, RateLimit, RichRule, RuleAction,
    RuleElement, RuleLog, ZoneSettings,
};

const IPSET_PREFIX: &str = "ipset:";

/// Attributes of one element.
struct Attrs {
    tag: String,
    values: HashMap<String, String>,
}

impl Attrs {
    fn read(e: &BytesStart) -> Result<Self> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut values = HashMap::new();
        for attr in e.attributes() {
            let attr = attr.with_context(|| format!("Malformed attribute on <{}>", tag))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .with_context(|| format!("Malformed value for '{}' on <{}>", key, tag))?;
            values.insert(key, value.into_owned());
        }
        Ok(Self { tag, values })
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn require(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(value) => Ok(value),
            None => bail!("<{}> is missing attribute '{}'", self.tag, key),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.values
            .get(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "yes" | "1"))
            .unwrap_or(false)
    }

    fn priority(&self, key: &str) -> Result<Option<i32>> {
        match self.values.get(key) {
            Some(v) => Ok(Some(
                v.parse()
                    .with_context(|| format!("Invalid {} '{}' on <{}>", key, v, self.tag))?,
            )),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy)]
enum TextField {
    Short,
    Description,
}

/// Which rule clause a nested `<limit>` belongs to.
#[derive(Clone, Copy)]
enum LimitOwner {
    Log,
    Audit,
    Action,
}

#[derive(Default)]
struct ZoneParser {
    settings: ZoneSettings,
    seen_zone: bool,
    text: Option<TextField>,
    rule: Option<RichRule>,
    limit_owner: Option<LimitOwner>,
}

impl ZoneParser {
    fn element(&mut self, e: &BytesStart, has_children: bool) -> Result<()> {
        let attrs = Attrs::read(e)?;

        if self.rule.is_some() {
            return self.rule_child(&attrs);
        }

        let s = &mut self.settings;
        match attrs.tag.as_str() {
            "zone" => {
                self.seen_zone = true;
                s.target = attrs.get("target").unwrap_or_else(|| "default".to_string());
                s.version = attrs.get("version").unwrap_or_default();
                s.ingress_priority = attrs.priority("ingress-priority")?;
                s.egress_priority = attrs.priority("egress-priority")?;
            }
            "short" if has_children => self.text = Some(TextField::Short),
            "description" if has_children => self.text = Some(TextField::Description),
            "service" => s.services.push(attrs.require("name")?),
            "port" => s
                .ports
                .push(PortSpec::new(&attrs.require("port")?, &attrs.require("protocol")?)),
            "source-port" => s
                .source_ports
                .push(PortSpec::new(&attrs.require("port")?, &attrs.require("protocol")?)),
            "protocol" => s.protocols.push(attrs.require("value")?),
            "icmp-block" => s.icmp_blocks.push(attrs.require("name")?),
            "icmp-block-inversion" => s.icmp_block_inversion = true,
            "forward" => s.forward = true,
            "masquerade" => s.masquerade = true,
            "forward-port" => s.forward_ports.push(ForwardPort::new(
                &attrs.require("port")?,
                &attrs.require("protocol")?,
                &attrs.get("to-port").unwrap_or_default(),
                &attrs.get("to-addr").unwrap_or_default(),
            )),
            "interface" => s.interfaces.push(attrs.require("name")?),
            "source" => {
                let value = if let Some(ipset) = attrs.get("ipset") {
                    format!("{}{}", IPSET_PREFIX, ipset)
                } else if let Some(mac) = attrs.get("mac") {
                    mac
                } else {
                    attrs.require("address")?
                };
                s.sources.push(value);
            }
            "rule" => {
                let mut rule = RichRule {
                    family: attrs.get("family"),
                    ..Default::default()
                };
                if let Some(priority) = attrs.priority("priority")? {
                    rule.priority = priority;
                }
                self.rule = Some(rule);
                if !has_children {
                    self.finish_rule()?;
                }
            }
            other => warn!("Ignoring unknown <{}> in zone file, it will not be written back", other),
        }
        Ok(())
    }

    fn rule_child(&mut self, attrs: &Attrs) -> Result<()> {
        let Some(rule) = self.rule.as_mut() else {
            return Ok(());
        };

        let element = match attrs.tag.as_str() {
            "source" | "destination" => {
                let (kind, value) = [AddressKind::Address, AddressKind::Mac, AddressKind::Ipset]
                    .into_iter()
                    .find_map(|kind| attrs.get(kind.attribute()).map(|v| (kind, v)))
                    .with_context(|| format!("<{}> in rule has no address", attrs.tag))?;
                let matched = AddressMatch {
                    invert: attrs.flag("invert"),
                    kind,
                    value,
                };
                if attrs.tag == "source" {
                    rule.source = Some(matched);
                } else {
                    rule.destination = Some(matched);
                }
                None
            }
            "service" => Some(RuleElement::Service(attrs.require("name")?)),
            "port" => Some(RuleElement::Port {
                port: attrs.require("port")?,
                protocol: attrs.require("protocol")?,
            }),
            "source-port" => Some(RuleElement::SourcePort {
                port: attrs.require("port")?,
                protocol: attrs.require("protocol")?,
            }),
            "protocol" => Some(RuleElement::Protocol(attrs.require("value")?)),
            "masquerade" => Some(RuleElement::Masquerade),
            "icmp-block" => Some(RuleElement::IcmpBlock(attrs.require("name")?)),
            "icmp-type" => Some(RuleElement::IcmpType(attrs.require("name")?)),
            "forward-port" => Some(RuleElement::ForwardPort {
                port: attrs.require("port")?,
                protocol: attrs.require("protocol")?,
                to_port: attrs.get("to-port"),
                to_addr: attrs.get("to-addr"),
            }),
            "log" => {
                rule.log = Some(RuleLog::Log {
                    prefix: attrs.get("prefix"),
                    level: attrs.get("level"),
                    limit: None,
                });
                self.limit_owner = Some(LimitOwner::Log);
                None
            }
            "nflog" => {
                rule.log = Some(RuleLog::NfLog {
                    group: attrs.get("group"),
                    prefix: attrs.get("prefix"),
                    queue_size: attrs.get("queue-size"),
                    limit: None,
                });
                self.limit_owner = Some(LimitOwner::Log);
                None
            }
            "audit" => {
                rule.audit = Some(None);
                self.limit_owner = Some(LimitOwner::Audit);
                None
            }
            "accept" | "drop" | "reject" | "mark" => {
                let kind = match attrs.tag.as_str() {
                    "accept" => ActionKind::Accept,
                    "drop" => ActionKind::Drop,
                    "reject" => ActionKind::Reject {
                        reject_type: attrs.get("type"),
                    },
                    _ => ActionKind::Mark {
                        set: attrs.require("set")?,
                    },
                };
                rule.action = Some(RuleAction { kind, limit: None });
                self.limit_owner = Some(LimitOwner::Action);
                None
            }
            "limit" => {
                let limit = Some(RateLimit {
                    value: attrs.require("value")?,
                    burst: attrs.get("burst"),
                });
                match self.limit_owner {
                    Some(LimitOwner::Log) => match rule.log.as_mut() {
                        Some(RuleLog::Log { limit: slot, .. })
                        | Some(RuleLog::NfLog { limit: slot, .. }) => *slot = limit,
                        None => {}
                    },
                    Some(LimitOwner::Audit) => rule.audit = Some(limit),
                    Some(LimitOwner::Action) => {
                        if let Some(action) = rule.action.as_mut() {
                            action.limit = limit;
                        }
                    }
                    None => bail!("<limit> outside of log, audit or action"),
                }
                None
            }
            other => bail!("Unsupported <{}> in rule", other),
        };

        if let Some(element) = element {
            if rule.element.is_some() {
                bail!("Rule has more than one element");
            }
            rule.element = Some(element);
        }
        Ok(())
    }

    fn finish_rule(&mut self) -> Result<()> {
        if let Some(rule) = self.rule.take() {
            rule.check()?;
            self.settings.rich_rules.push(rule.to_string());
        }
        self.limit_owner = None;
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"short" | b"description" => self.text = None,
            b"rule" => self.finish_rule()?,
            b"log" | b"nflog" | b"audit" | b"accept" | b"drop" | b"reject" | b"mark" => {
                self.limit_owner = None
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parse the contents of a zone file.
pub fn parse_zone(xml: &str) -> Result<ZoneSettings> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = ZoneParser::default();
    loop {
        match reader.read_event().context("Malformed zone XML")? {
            Event::Start(e) => parser.element(&e, true)?,
            Event::Empty(e) => parser.element(&e, false)?,
            Event::End(e) => parser.end(e.name().as_ref())?,
            Event::Text(t) => {
                if let Some(field) = parser.text {
                    let text = t.unescape().context("Malformed text in zone XML")?.into_owned();
                    match field {
                        TextField::Short => parser.settings.short = text,
                        TextField::Description => parser.settings.description = text,
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !parser.seen_zone {
        bail!("Not a zone file: no <zone> element");
    }
    Ok(parser.settings)
}

fn start_tag<'a>(tag: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(tag);
    for &(key, value) in attrs {
        start.push_attribute((key, value));
    }
    start
}

fn empty<W: Write>(writer: &mut Writer<W>, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    writer.write_event(Event::Empty(start_tag(tag, attrs)))?;
    Ok(())
}

fn text<W: Write>(writer: &mut Writer<W>, tag: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Element with an optional nested `<limit>`.
fn with_limit<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    attrs: &[(&str, &str)],
    limit: &Option<RateLimit>,
) -> Result<()> {
    let Some(limit) = limit else {
        return empty(writer, tag, attrs);
    };

    writer.write_event(Event::Start(start_tag(tag, attrs)))?;
    let mut limit_attrs = vec![("value", limit.value.as_str())];
    if let Some(burst) = &limit.burst {
        limit_attrs.push(("burst", burst.as_str()));
    }
    empty(writer, "limit", &limit_attrs)?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn push_opt<'a>(attrs: &mut Vec<(&'a str, &'a str)>, key: &'a str, value: &'a Option<String>) {
    if let Some(value) = value {
        attrs.push((key, value.as_str()));
    }
}

fn is_mac(value: &str) -> bool {
    let parts: Vec<&str> = value.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

fn write_rule<W: Write>(writer: &mut Writer<W>, rule: &RichRule) -> Result<()> {
    let priority = rule.priority.to_string();
    let mut attrs = Vec::new();
    push_opt(&mut attrs, "family", &rule.family);
    if rule.priority != 0 {
        attrs.push(("priority", priority.as_str()));
    }
    writer.write_event(Event::Start(start_tag("rule", &attrs)))?;

    for (tag, addr) in [("source", &rule.source), ("destination", &rule.destination)] {
        if let Some(addr) = addr {
            let mut attrs = vec![(addr.kind.attribute(), addr.value.as_str())];
            if addr.invert {
                attrs.push(("invert", "True"));
            }
            empty(writer, tag, &attrs)?;
        }
    }

    match &rule.element {
        Some(RuleElement::Service(name)) => empty(writer, "service", &[("name", name.as_str())])?,
        Some(RuleElement::Port { port, protocol }) => {
            empty(writer, "port", &[("port", port.as_str()), ("protocol", protocol.as_str())])?
        }
        Some(RuleElement::SourcePort { port, protocol }) => {
            empty(writer, "source-port", &[("port", port.as_str()), ("protocol", protocol.as_str())])?
        }
        Some(RuleElement::Protocol(value)) => empty(writer, "protocol", &[("value", value.as_str())])?,
        Some(RuleElement::Masquerade) => empty(writer, "masquerade", &[])?,
        Some(RuleElement::IcmpBlock(name)) => empty(writer, "icmp-block", &[("name", name.as_str())])?,
        Some(RuleElement::IcmpType(name)) => empty(writer, "icmp-type", &[("name", name.as_str())])?,
        Some(RuleElement::ForwardPort { port, protocol, to_port, to_addr }) => {
            let mut attrs = vec![("port", port.as_str()), ("protocol", protocol.as_str())];
            push_opt(&mut attrs, "to-port", to_port);
            push_opt(&mut attrs, "to-addr", to_addr);
            empty(writer, "forward-port", &attrs)?
        }
        None => {}
    }

    match &rule.log {
        Some(RuleLog::Log { prefix, level, limit }) => {
            let mut attrs = Vec::new();
            push_opt(&mut attrs, "prefix", prefix);
            push_opt(&mut attrs, "level", level);
            with_limit(writer, "log", &attrs, limit)?;
        }
        Some(RuleLog::NfLog { group, prefix, queue_size, limit }) => {
            let mut attrs = Vec::new();
            push_opt(&mut attrs, "group", group);
            push_opt(&mut attrs, "prefix", prefix);
            push_opt(&mut attrs, "queue-size", queue_size);
            with_limit(writer, "nflog", &attrs, limit)?;
        }
        None => {}
    }

    if let Some(limit) = &rule.audit {
        with_limit(writer, "audit", &[], limit)?;
    }

    if let Some(action) = &rule.action {
        match &action.kind {
            ActionKind::Accept => with_limit(writer, "accept", &[], &action.limit)?,
            ActionKind::Drop => with_limit(writer, "drop", &[], &action.limit)?,
            ActionKind::Reject { reject_type } => {
                let mut attrs = Vec::new();
                push_opt(&mut attrs, "type", reject_type);
                with_limit(writer, "reject", &attrs, &action.limit)?
            }
            ActionKind::Mark { set } => with_limit(writer, "mark", &[("set", set.as_str())], &action.limit)?,
        }
    }

    writer.write_event(Event::End(BytesEnd::new("rule")))?;
    Ok(())
}

/// Render `settings` as a zone file.
pub fn write_zone(settings: &ZoneSettings) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let ingress = settings.ingress_priority.map(|p| p.to_string());
    let egress = settings.egress_priority.map(|p| p.to_string());
    let mut attrs = Vec::new();
    if settings.target != "default" {
        attrs.push(("target", settings.target.as_str()));
    }
    if !settings.version.is_empty() {
        attrs.push(("version", settings.version.as_str()));
    }
    push_opt(&mut attrs, "ingress-priority", &ingress);
    push_opt(&mut attrs, "egress-priority", &egress);
    writer.write_event(Event::Start(start_tag("zone", &attrs)))?;

    if !settings.short.is_empty() {
        text(&mut writer, "short", &settings.short)?;
    }
    if !settings.description.is_empty() {
        text(&mut writer, "description", &settings.description)?;
    }
    for interface in &settings.interfaces {
        empty(&mut writer, "interface", &[("name", interface.as_str())])?;
    }
    for source in &settings.sources {
        let attr = if let Some(ipset) = source.strip_prefix(IPSET_PREFIX) {
            ("ipset", ipset)
        } else if is_mac(source) {
            ("mac", source.as_str())
        } else {
            ("address", source.as_str())
        };
        empty(&mut writer, "source", &[attr])?;
    }
    for service in &settings.services {
        empty(&mut writer, "service", &[("name", service.as_str())])?;
    }
    for port in &settings.ports {
        empty(&mut writer, "port", &[("port", port.port.as_str()), ("protocol", port.protocol.as_str())])?;
    }
    for protocol in &settings.protocols {
        empty(&mut writer, "protocol", &[("value", protocol.as_str())])?;
    }
    for block in &settings.icmp_blocks {
        empty(&mut writer, "icmp-block", &[("name", block.as_str())])?;
    }
    if settings.icmp_block_inversion {
        empty(&mut writer, "icmp-block-inversion", &[])?;
    }
    if settings.forward {
        empty(&mut writer, "forward", &[])?;
    }
    if settings.masquerade {
        empty(&mut writer, "masquerade", &[])?;
    }
    for fwd in &settings.forward_ports {
        let mut attrs = vec![("port", fwd.port.as_str()), ("protocol", fwd.protocol.as_str())];
        if !fwd.to_port.is_empty() {
            attrs.push(("to-port", fwd.to_port.as_str()));
        }
        if !fwd.to_addr.is_empty() {
            attrs.push(("to-addr", fwd.to_addr.as_str()));
        }
        empty(&mut writer, "forward-port", &attrs)?;
    }
    for port in &settings.source_ports {
        empty(&mut writer, "source-port", &[("port", port.port.as_str()), ("protocol", port.protocol.as_str())])?;
    }
    for rule in &settings.rich_rules {
        let parsed: RichRule = rule
            .parse()
            .with_context(|| format!("Cannot store rich rule '{}'", rule))?;
        write_rule(&mut writer, &parsed)?;
    }

    writer.write_event(Event::End(BytesEnd::new("zone")))?;
    let mut xml = String::from_utf8(writer.into_inner()).context("Zone XML is not UTF-8")?;
    xml.push('\n');
    Ok(xml)
}
