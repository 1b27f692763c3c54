// Firewalld State - Command Line
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::builder::{BoolishValueParser, PossibleValuesParser};
use clap::{ArgAction, Args, Parser};

use crate::models::{DesiredState, ZoneTarget};

#[derive(Debug, Parser)]
#[clap(name = "firewalld-state", version, about = "Declare the state of firewalld zone primitives")]
pub struct Options {
    /// Zone to operate on; defaults to the daemon's default zone
    #[clap(long, env = "FIREWALLD_ZONE")]
    pub zone: Option<String>,

    /// Desired state of the primitive (present/absent for zones and targets)
    #[clap(long, value_enum)]
    pub state: DesiredState,

    /// Change the permanent (on-disk) configuration
    #[clap(long)]
    pub permanent: bool,

    /// Change the running configuration
    #[clap(long)]
    pub immediate: bool,

    /// Edit the on-disk configuration when firewalld is not running
    #[clap(long)]
    pub offline: bool,

    /// Runtime lease, in seconds; 0 means no expiry
    #[clap(long, default_value = "0")]
    pub timeout: u32,

    #[clap(flatten)]
    pub primitive: PrimitiveOptions,

    /// Only report what would change
    #[clap(long)]
    pub check: bool,

    /// Print the result as JSON
    #[clap(long)]
    pub json: bool,

    /// Path to the settings file
    #[clap(long, env = "FIREWALLD_STATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// The primitive to reconcile. At most one may be given.
#[derive(Debug, Default, Args)]
pub struct PrimitiveOptions {
    /// Service name, e.g. ssh
    #[clap(long)]
    pub service: Option<String>,

    /// IP protocol name or number
    #[clap(long)]
    pub protocol: Option<String>,

    /// Port or port range with protocol, e.g. 8080/tcp or 161-162/udp
    #[clap(long)]
    pub port: Option<String>,

    /// Source port or range with protocol
    #[clap(long)]
    pub source_port: Option<String>,

    /// port=P,proto=tcp|udp,toport=T[,toaddr=A]
    #[clap(long)]
    pub port_forward: Vec<String>,

    /// Rich rule in firewalld syntax
    #[clap(long)]
    pub rich_rule: Option<String>,

    /// Source address, network, MAC or ipset:NAME
    #[clap(long)]
    pub source: Option<String>,

    /// Network interface; requires --zone
    #[clap(long)]
    pub interface: Option<String>,

    /// ICMP type to block
    #[clap(long)]
    pub icmp_block: Option<String>,

    #[clap(long, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub icmp_block_inversion: Option<bool>,

    #[clap(long, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub forward: Option<bool>,

    #[clap(long, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub masquerade: Option<bool>,

    /// Zone target; requires --zone
    #[clap(long, value_parser = PossibleValuesParser::new(ZoneTarget::NAMES))]
    pub target: Option<String>,
}

impl Options {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
