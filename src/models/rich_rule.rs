// Firewalld State - Rich Rule Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Parser and canonical printer for firewalld rich rules.
//!
//! firewalld stores and reports rich rules in a canonical form (fixed clause
//! order, every value quoted). A rule the user writes as
//! `rule family=ipv4 forward-port port=443 protocol=tcp to-port=8443`
//! is reported back as
//! `rule family="ipv4" forward-port port="443" protocol="tcp" to-port="8443"`,
//! so membership checks must compare canonical strings.

use std::fmt;
use std::str::FromStr;

/// Kind of match used by `source` and `destination` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Address,
    Mac,
    Ipset,
}

impl AddressKind {
    pub fn attribute(self) -> &'static str {
        match self {
            AddressKind::Address => "address",
            AddressKind::Mac => "mac",
            AddressKind::Ipset => "ipset",
        }
    }

    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "address" => Some(AddressKind::Address),
            "mac" => Some(AddressKind::Mac),
            "ipset" => Some(AddressKind::Ipset),
            _ => None,
        }
    }
}

/// `source` or `destination` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressMatch {
    pub invert: bool,
    pub kind: AddressKind,
    pub value: String,
}

/// `limit value="1/m" [burst="N"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    pub value: String,
    pub burst: Option<String>,
}

/// The single matched element of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleElement {
    Service(String),
    Port { port: String, protocol: String },
    Protocol(String),
    Masquerade,
    IcmpBlock(String),
    IcmpType(String),
    ForwardPort {
        port: String,
        protocol: String,
        to_port: Option<String>,
        to_addr: Option<String>,
    },
    SourcePort { port: String, protocol: String },
}

/// `log` or `nflog` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLog {
    Log {
        prefix: Option<String>,
        level: Option<String>,
        limit: Option<RateLimit>,
    },
    NfLog {
        group: Option<String>,
        prefix: Option<String>,
        queue_size: Option<String>,
        limit: Option<RateLimit>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Accept,
    Reject { reject_type: Option<String> },
    Drop,
    Mark { set: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAction {
    pub kind: ActionKind,
    pub limit: Option<RateLimit>,
}

/// A parsed rich rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichRule {
    pub priority: i32,
    pub family: Option<String>,
    pub source: Option<AddressMatch>,
    pub destination: Option<AddressMatch>,
    pub element: Option<RuleElement>,
    pub log: Option<RuleLog>,
    /// `Some(limit)` when an `audit` clause is present.
    pub audit: Option<Option<RateLimit>>,
    pub action: Option<RuleAction>,
}

/// Error produced while parsing or validating a rich rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichRuleError(pub String);

impl fmt::Display for RichRuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid rich rule: {}", self.0)
    }
}

impl std::error::Error for RichRuleError {}

fn invalid(message: impl Into<String>) -> RichRuleError {
    RichRuleError(message.into())
}

impl RichRule {
    /// Canonical string form of `rule`, or the trimmed input when it does not
    /// parse (the daemon may know syntax this parser does not).
    pub fn canonicalize(rule: &str) -> String {
        match rule.parse::<RichRule>() {
            Ok(parsed) => parsed.to_string(),
            Err(_) => rule.trim().to_string(),
        }
    }

    /// Semantic checks applied after parsing.
    pub fn check(&self) -> Result<(), RichRuleError> {
        if let Some(family) = &self.family {
            if family != "ipv4" && family != "ipv6" {
                return Err(invalid(format!("unknown family '{}'", family)));
            }
        }

        for (clause, addr) in [("source", &self.source), ("destination", &self.destination)] {
            if let Some(addr) = addr {
                if addr.kind == AddressKind::Address && self.family.is_none() {
                    return Err(invalid(format!("{} address requires a family", clause)));
                }
            }
        }

        match &self.element {
            None => {
                if self.action.is_none() {
                    return Err(invalid("no element, no action"));
                }
            }
            Some(RuleElement::Masquerade)
            | Some(RuleElement::IcmpBlock(_))
            | Some(RuleElement::ForwardPort { .. }) => {
                if self.action.is_some() {
                    return Err(invalid("masquerade, icmp-block and forward-port rules take no action"));
                }
                if let Some(RuleElement::ForwardPort { to_port, to_addr, .. }) = &self.element {
                    if to_port.is_none() && to_addr.is_none() {
                        return Err(invalid("forward-port needs to-port or to-addr"));
                    }
                }
            }
            Some(_) => {
                if self.log.is_none() && self.audit.is_none() && self.action.is_none() {
                    return Err(invalid("no action, no log, no audit"));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Attr(String, String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, RichRuleError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                break;
            }
            name.push(c);
            chars.next();
        }

        if chars.peek() != Some(&'=') {
            tokens.push(Token::Word(name));
            continue;
        }
        chars.next();

        let mut value = String::new();
        match chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(invalid(format!("unterminated quote in '{}'", name)));
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }

        if name.is_empty() {
            return Err(invalid("attribute without a name"));
        }
        tokens.push(Token::Attr(name, value));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Attributes collected for a single clause, in declaration order.
struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn take(&mut self, key: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    fn require(&mut self, clause: &str, key: &str) -> Result<String, RichRuleError> {
        self.take(key)
            .ok_or_else(|| invalid(format!("'{}' requires attribute '{}'", clause, key)))
    }
}

impl Parser {
    fn peek_word(&self) -> Option<&str> {
        match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn next_word(&mut self) -> Option<String> {
        let word = self.peek_word()?.to_string();
        self.pos += 1;
        Some(word)
    }

    /// Consume consecutive attributes, rejecting keys outside `allowed`.
    fn attrs(&mut self, clause: &str, allowed: &[&str]) -> Result<Attrs, RichRuleError> {
        let mut attrs = Vec::new();
        while let Some(Token::Attr(key, value)) = self.tokens.get(self.pos) {
            if !allowed.contains(&key.as_str()) {
                return Err(invalid(format!("'{}' does not take attribute '{}'", clause, key)));
            }
            if attrs.iter().any(|(k, _): &(String, String)| k == key) {
                return Err(invalid(format!("duplicate attribute '{}' in '{}'", key, clause)));
            }
            attrs.push((key.clone(), value.clone()));
            self.pos += 1;
        }
        Ok(Attrs(attrs))
    }

    fn limit(&mut self) -> Result<Option<RateLimit>, RichRuleError> {
        if self.peek_word() != Some("limit") {
            return Ok(None);
        }
        self.pos += 1;
        let mut attrs = self.attrs("limit", &["value", "burst"])?;
        Ok(Some(RateLimit {
            value: attrs.require("limit", "value")?,
            burst: attrs.take("burst"),
        }))
    }

    fn address(&mut self, clause: &str, kinds: &[&str]) -> Result<AddressMatch, RichRuleError> {
        let invert = if self.peek_word() == Some("NOT") {
            self.pos += 1;
            true
        } else {
            false
        };
        let attrs = self.attrs(clause, kinds)?;
        match attrs.0.as_slice() {
            [(key, value)] => Ok(AddressMatch {
                invert,
                kind: AddressKind::from_attribute(key)
                    .ok_or_else(|| invalid(format!("bad {} attribute '{}'", clause, key)))?,
                value: value.clone(),
            }),
            [] => Err(invalid(format!("'{}' needs one of {}", clause, kinds.join(", ")))),
            _ => Err(invalid(format!("'{}' takes exactly one of {}", clause, kinds.join(", ")))),
        }
    }

    fn element(&mut self, word: &str) -> Result<RuleElement, RichRuleError> {
        let element = match word {
            "service" => RuleElement::Service(self.attrs(word, &["name"])?.require(word, "name")?),
            "port" | "source-port" => {
                let mut attrs = self.attrs(word, &["port", "protocol"])?;
                let port = attrs.require(word, "port")?;
                let protocol = attrs.require(word, "protocol")?;
                if word == "port" {
                    RuleElement::Port { port, protocol }
                } else {
                    RuleElement::SourcePort { port, protocol }
                }
            }
            "protocol" => RuleElement::Protocol(self.attrs(word, &["value"])?.require(word, "value")?),
            "masquerade" => RuleElement::Masquerade,
            "icmp-block" => RuleElement::IcmpBlock(self.attrs(word, &["name"])?.require(word, "name")?),
            "icmp-type" => RuleElement::IcmpType(self.attrs(word, &["name"])?.require(word, "name")?),
            "forward-port" => {
                let mut attrs = self.attrs(word, &["port", "protocol", "to-port", "to-addr"])?;
                RuleElement::ForwardPort {
                    port: attrs.require(word, "port")?,
                    protocol: attrs.require(word, "protocol")?,
                    to_port: attrs.take("to-port"),
                    to_addr: attrs.take("to-addr"),
                }
            }
            other => return Err(invalid(format!("unknown element '{}'", other))),
        };
        Ok(element)
    }

    fn action(&mut self, word: &str) -> Result<RuleAction, RichRuleError> {
        let kind = match word {
            "accept" => ActionKind::Accept,
            "drop" => ActionKind::Drop,
            "reject" => ActionKind::Reject {
                reject_type: self.attrs(word, &["type"])?.take("type"),
            },
            "mark" => ActionKind::Mark {
                set: self.attrs(word, &["set"])?.require(word, "set")?,
            },
            other => return Err(invalid(format!("unknown action '{}'", other))),
        };
        Ok(RuleAction {
            kind,
            limit: self.limit()?,
        })
    }

    fn rule(&mut self) -> Result<RichRule, RichRuleError> {
        if self.next_word().as_deref() != Some("rule") {
            return Err(invalid("rule must start with 'rule'"));
        }

        let mut rule = RichRule::default();
        let mut attrs = self.attrs("rule", &["family", "priority"])?;
        rule.family = attrs.take("family");
        if let Some(priority) = attrs.take("priority") {
            rule.priority = priority
                .parse::<i16>()
                .map(i32::from)
                .map_err(|_| invalid(format!("invalid priority '{}'", priority)))?;
        }

        while self.pos < self.tokens.len() {
            let word = match self.next_word() {
                Some(word) => word,
                None => {
                    if let Some(Token::Attr(key, _)) = self.tokens.get(self.pos) {
                        return Err(invalid(format!("unexpected attribute '{}'", key)));
                    }
                    break;
                }
            };

            match word.as_str() {
                "source" => {
                    if rule.source.is_some() {
                        return Err(invalid("more than one source"));
                    }
                    rule.source = Some(self.address("source", &["address", "mac", "ipset"])?);
                }
                "destination" => {
                    if rule.destination.is_some() {
                        return Err(invalid("more than one destination"));
                    }
                    rule.destination = Some(self.address("destination", &["address", "ipset"])?);
                }
                "service" | "port" | "protocol" | "masquerade" | "icmp-block" | "icmp-type"
                | "forward-port" | "source-port" => {
                    if rule.element.is_some() {
                        return Err(invalid("more than one element"));
                    }
                    rule.element = Some(self.element(&word)?);
                }
                "log" | "nflog" => {
                    if rule.log.is_some() {
                        return Err(invalid("more than one log"));
                    }
                    rule.log = Some(if word == "log" {
                        let mut attrs = self.attrs("log", &["prefix", "level"])?;
                        RuleLog::Log {
                            prefix: attrs.take("prefix"),
                            level: attrs.take("level"),
                            limit: self.limit()?,
                        }
                    } else {
                        let mut attrs = self.attrs("nflog", &["group", "prefix", "queue-size"])?;
                        RuleLog::NfLog {
                            group: attrs.take("group"),
                            prefix: attrs.take("prefix"),
                            queue_size: attrs.take("queue-size"),
                            limit: self.limit()?,
                        }
                    });
                }
                "audit" => {
                    if rule.audit.is_some() {
                        return Err(invalid("more than one audit"));
                    }
                    rule.audit = Some(self.limit()?);
                }
                "accept" | "reject" | "drop" | "mark" => {
                    if rule.action.is_some() {
                        return Err(invalid("more than one action"));
                    }
                    rule.action = Some(self.action(&word)?);
                }
                other => return Err(invalid(format!("unexpected '{}'", other))),
            }
        }

        rule.check()?;
        Ok(rule)
    }
}

impl FromStr for RichRule {
    type Err = RichRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        if tokens.is_empty() {
            return Err(invalid("empty rule"));
        }
        Parser { tokens, pos: 0 }.rule()
    }
}

fn write_opt(f: &mut fmt::Formatter<'_>, key: &str, value: &Option<String>) -> fmt::Result {
    match value {
        Some(v) => write!(f, " {}=\"{}\"", key, v),
        None => Ok(()),
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "limit value=\"{}\"", self.value)?;
        write_opt(f, "burst", &self.burst)
    }
}

fn write_limit(f: &mut fmt::Formatter<'_>, limit: &Option<RateLimit>) -> fmt::Result {
    match limit {
        Some(limit) => write!(f, " {}", limit),
        None => Ok(()),
    }
}

impl AddressMatch {
    fn write(&self, f: &mut fmt::Formatter<'_>, clause: &str) -> fmt::Result {
        write!(f, "{}", clause)?;
        if self.invert {
            write!(f, " NOT")?;
        }
        write!(f, " {}=\"{}\"", self.kind.attribute(), self.value)
    }
}

impl fmt::Display for RuleElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleElement::Service(name) => write!(f, "service name=\"{}\"", name),
            RuleElement::Port { port, protocol } => {
                write!(f, "port port=\"{}\" protocol=\"{}\"", port, protocol)
            }
            RuleElement::Protocol(value) => write!(f, "protocol value=\"{}\"", value),
            RuleElement::Masquerade => write!(f, "masquerade"),
            RuleElement::IcmpBlock(name) => write!(f, "icmp-block name=\"{}\"", name),
            RuleElement::IcmpType(name) => write!(f, "icmp-type name=\"{}\"", name),
            RuleElement::ForwardPort { port, protocol, to_port, to_addr } => {
                write!(f, "forward-port port=\"{}\" protocol=\"{}\"", port, protocol)?;
                write_opt(f, "to-port", to_port)?;
                write_opt(f, "to-addr", to_addr)
            }
            RuleElement::SourcePort { port, protocol } => {
                write!(f, "source-port port=\"{}\" protocol=\"{}\"", port, protocol)
            }
        }
    }
}

impl fmt::Display for RuleLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleLog::Log { prefix, level, limit } => {
                write!(f, "log")?;
                write_opt(f, "prefix", prefix)?;
                write_opt(f, "level", level)?;
                write_limit(f, limit)
            }
            RuleLog::NfLog { group, prefix, queue_size, limit } => {
                write!(f, "nflog")?;
                write_opt(f, "group", group)?;
                write_opt(f, "prefix", prefix)?;
                write_opt(f, "queue-size", queue_size)?;
                write_limit(f, limit)
            }
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Accept => write!(f, "accept")?,
            ActionKind::Drop => write!(f, "drop")?,
            ActionKind::Reject { reject_type } => {
                write!(f, "reject")?;
                write_opt(f, "type", reject_type)?;
            }
            // firewalld prints the mark unquoted
            ActionKind::Mark { set } => write!(f, "mark set={}", set)?,
        }
        write_limit(f, &self.limit)
    }
}

impl fmt::Display for RichRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule")?;
        if self.priority != 0 {
            write!(f, " priority=\"{}\"", self.priority)?;
        }
        write_opt(f, "family", &self.family)?;
        if let Some(source) = &self.source {
            write!(f, " ")?;
            source.write(f, "source")?;
        }
        if let Some(destination) = &self.destination {
            write!(f, " ")?;
            destination.write(f, "destination")?;
        }
        if let Some(element) = &self.element {
            write!(f, " {}", element)?;
        }
        if let Some(log) = &self.log {
            write!(f, " {}", log)?;
        }
        if let Some(limit) = &self.audit {
            write!(f, " audit")?;
            write_limit(f, limit)?;
        }
        if let Some(action) = &self.action {
            write!(f, " {}", action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_unquoted_values() {
        assert_eq!(
            RichRule::canonicalize("rule family=ipv4 forward-port port=443 protocol=tcp to-port=8443"),
            r#"rule family="ipv4" forward-port port="443" protocol="tcp" to-port="8443""#
        );
    }

    #[test]
    fn test_canonical_clause_order() {
        // priority goes before family no matter how it was written
        let rule: RichRule =
            r#"rule priority=-5 family="ipv4" source NOT address="192.0.2.0/24" service name=ssh log prefix="ssh " level=info limit value=1/m accept"#
                .parse()
                .unwrap();
        assert_eq!(rule.priority, -5);
        assert_eq!(
            rule.to_string(),
            r#"rule priority="-5" family="ipv4" source NOT address="192.0.2.0/24" service name="ssh" log prefix="ssh " level="info" limit value="1/m" accept"#
        );
    }

    #[test]
    fn test_audit_and_limit_on_action() {
        let rule: RichRule = r#"rule service name="ftp" audit limit value="1/m" accept"#.parse().unwrap();
        assert_eq!(rule.audit, Some(Some(RateLimit { value: "1/m".into(), burst: None })));
        assert_eq!(rule.to_string(), r#"rule service name="ftp" audit limit value="1/m" accept"#);

        let rule: RichRule = r#"rule family=ipv6 source address=2001:db8::/32 reject type=icmp6-adm-prohibited limit value=5/s"#
            .parse()
            .unwrap();
        assert_eq!(
            rule.to_string(),
            r#"rule family="ipv6" source address="2001:db8::/32" reject type="icmp6-adm-prohibited" limit value="5/s""#
        );
    }

    #[test]
    fn test_mark_and_nflog() {
        let rule: RichRule = r#"rule port port=80 protocol=tcp nflog group=3 queue-size=8 mark set=0x1/0xff"#
            .parse()
            .unwrap();
        assert_eq!(
            rule.to_string(),
            r#"rule port port="80" protocol="tcp" nflog group="3" queue-size="8" mark set=0x1/0xff"#
        );
    }

    #[test]
    fn test_semantic_errors() {
        assert!("rule family=ipv4".parse::<RichRule>().is_err());
        assert!("rule service name=ssh".parse::<RichRule>().is_err());
        assert!("rule masquerade accept".parse::<RichRule>().is_err());
        assert!("rule source address=10.0.0.1 accept".parse::<RichRule>().is_err());
        assert!("rule family=ipx accept".parse::<RichRule>().is_err());
        assert!("rule forward-port port=1 protocol=tcp".parse::<RichRule>().is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert!("".parse::<RichRule>().is_err());
        assert!("accept".parse::<RichRule>().is_err());
        assert!(r#"rule service name="ssh accept"#.parse::<RichRule>().is_err());
        assert!("rule service name=ssh service name=http accept".parse::<RichRule>().is_err());
        assert!("rule service nme=ssh accept".parse::<RichRule>().is_err());
        assert!("rule service name=ssh bogus".parse::<RichRule>().is_err());
        assert!("rule priority=abc accept".parse::<RichRule>().is_err());
    }

    #[test]
    fn test_canonicalize_keeps_unparseable_input() {
        assert_eq!(RichRule::canonicalize("  rule tcp-mss-clamp value=pmtu "), "rule tcp-mss-clamp value=pmtu");
    }
}
