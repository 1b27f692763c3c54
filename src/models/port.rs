// Firewalld State - Port Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Port, source port and forwarded port specifications.

use std::fmt;
use std::net::IpAddr;

/// Transport protocols firewalld accepts for ports.
pub const PORT_PROTOCOLS: [&str; 4] = ["tcp", "udp", "sctp", "dccp"];

/// A port or port range bound to a protocol, e.g. `8080/tcp` or `161-162/udp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub port: String,
    pub protocol: String,
}

impl PortSpec {
    pub fn new(port: &str, protocol: &str) -> Self {
        Self {
            port: port.to_string(),
            protocol: protocol.to_string(),
        }
    }

    /// Parse a `PORT[-PORT]/PROTOCOL` string.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (port, protocol) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| "improper port format (missing protocol?)".to_string())?;

        if protocol.is_empty() {
            return Err("improper port format (missing protocol?)".to_string());
        }
        if protocol.contains('/') {
            return Err(format!("improper port format '{}'", s));
        }
        validate_port_range(port)?;
        validate_protocol(protocol)?;

        Ok(Self::new(port, protocol))
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// A port forwarding rule. An empty `to_addr` forwards to the local host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForwardPort {
    pub port: String,
    pub protocol: String,
    pub to_port: String,
    pub to_addr: String,
}

impl ForwardPort {
    pub fn new(port: &str, protocol: &str, to_port: &str, to_addr: &str) -> Self {
        Self {
            port: port.to_string(),
            protocol: protocol.to_string(),
            to_port: to_port.to_string(),
            to_addr: to_addr.to_string(),
        }
    }

    /// Parse a `port=443,proto=tcp,toport=8443[,toaddr=192.0.2.10]` declaration.
    pub fn parse_declaration(s: &str) -> Result<Self, String> {
        let mut port = None;
        let mut proto = None;
        let mut toport = None;
        let mut toaddr = None;

        for field in s.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| format!("invalid port forward field '{}'", field))?;
            let value = value.trim().to_string();
            match key.trim() {
                "port" => port = Some(value),
                "proto" => proto = Some(value),
                "toport" => toport = Some(value),
                "toaddr" => toaddr = Some(value),
                other => return Err(format!("unknown port forward field '{}'", other)),
            }
        }

        let port = port.ok_or("port must be specified for port forward")?;
        let proto = proto.ok_or("proto udp/tcp must be specified for port forward")?;
        let toport = toport.ok_or("toport must be specified for port forward")?;
        let toaddr = toaddr.unwrap_or_default();

        if proto != "tcp" && proto != "udp" {
            return Err(format!("port forward proto must be tcp or udp, not '{}'", proto));
        }
        validate_port_range(&port)?;
        validate_port_range(&toport)?;
        if !toaddr.is_empty() && toaddr.parse::<IpAddr>().is_err() {
            return Err(format!("invalid port forward toaddr '{}'", toaddr));
        }

        Ok(Self {
            port,
            protocol: proto,
            to_port: toport,
            to_addr: toaddr,
        })
    }
}

impl fmt::Display for ForwardPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port={}:proto={}:toport={}:toaddr={}",
            self.port, self.protocol, self.to_port, self.to_addr
        )
    }
}

/// Accept `N` or `N-M` with both ends in 1..=65535 and `N <= M`.
fn validate_port_range(s: &str) -> Result<(), String> {
    let parse = |p: &str| -> Result<u16, String> {
        match p.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(format!("invalid port '{}'", s)),
            Ok(n) => Ok(n),
        }
    };

    match s.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(format!("invalid port range '{}'", s));
            }
            Ok(())
        }
        None => parse(s).map(|_| ()),
    }
}

fn validate_protocol(protocol: &str) -> Result<(), String> {
    if PORT_PROTOCOLS.contains(&protocol) {
        Ok(())
    } else {
        Err(format!(
            "invalid protocol '{}', expected one of {}",
            protocol,
            PORT_PROTOCOLS.join(", ")
        ))
    }
}
