// Firewalld State - Orchestrator
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Turns command line options into one validated request and runs it.

use tracing::{debug, info};

use crate::cli::Options;
use crate::error::{ReconcileError, Result};
use crate::firewall::FirewallBackend;
use crate::models::{DesiredState, ForwardPort, Layers, PortSpec, RichRule, ZoneItem, ZoneTarget};
use crate::reconcile::{Outcome, RuleKind, Transaction};

/// Appended to the messages whenever only the on-disk layer was reachable.
pub const OFFLINE_NOTE: &str = "(offline operation: only on-disk configs were altered)";

/// What the invocation will reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No primitive and an enabled/disabled state.
    Nothing,
    /// Membership of an item. `summary` names it in the closing message.
    Item { item: ZoneItem, summary: Option<String> },
    Target(ZoneTarget),
    /// Existence of the zone.
    Zone,
}

/// A validated invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub zone: Option<String>,
    pub action: Action,
    /// State as asked for.
    pub requested: DesiredState,
    /// State after boolean toggles are folded in.
    pub desired: DesiredState,
    pub permanent: bool,
    pub immediate: bool,
    pub offline: bool,
    pub timeout: u32,
    pub check: bool,
}

impl Request {
    pub fn from_options(options: &Options) -> Result<Self> {
        let p = &options.primitive;

        let given: Vec<&str> = [
            ("service", p.service.is_some()),
            ("protocol", p.protocol.is_some()),
            ("port", p.port.is_some()),
            ("source-port", p.source_port.is_some()),
            ("port-forward", !p.port_forward.is_empty()),
            ("rich-rule", p.rich_rule.is_some()),
            ("source", p.source.is_some()),
            ("interface", p.interface.is_some()),
            ("icmp-block", p.icmp_block.is_some()),
            ("icmp-block-inversion", p.icmp_block_inversion.is_some()),
            ("forward", p.forward.is_some()),
            ("masquerade", p.masquerade.is_some()),
            ("target", p.target.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();

        if given.len() > 1 {
            return Err(ReconcileError::configuration(format!(
                "only one primitive may be changed at a time, got {}",
                given.join(", ")
            )));
        }

        if options.offline && !options.permanent {
            return Err(ReconcileError::configuration(
                "offline cannot be enabled unless permanent changes are allowed",
            ));
        }

        for (name, set) in [("interface", p.interface.is_some()), ("target", p.target.is_some())] {
            if set && options.zone.is_none() {
                return Err(ReconcileError::configuration(format!("{} requires zone", name)));
            }
        }

        let requested = options.state;
        let modification = !given.is_empty();
        if modification && requested.is_zone_level() && p.target.is_none() {
            return Err(ReconcileError::configuration(
                "absent and present state can only be used in zone level operations",
            ));
        }

        let mut desired = requested;
        let item = |item: ZoneItem, summary: Option<String>| Action::Item { item, summary };

        let action = if let Some(service) = &p.service {
            item(ZoneItem::Service(service.clone()), Some(format!("service {}", service)))
        } else if let Some(protocol) = &p.protocol {
            item(ZoneItem::Protocol(protocol.clone()), Some(format!("protocol {}", protocol)))
        } else if let Some(port) = &p.port {
            let spec = PortSpec::parse(port).map_err(ReconcileError::Configuration)?;
            let summary = format!("port {}", spec);
            item(ZoneItem::Port(spec), Some(summary))
        } else if let Some(port) = &p.source_port {
            let spec = PortSpec::parse(port)
                .map_err(|e| ReconcileError::configuration(format!("source_port: {}", e)))?;
            let summary = format!("source_port {}", spec);
            item(ZoneItem::SourcePort(spec), Some(summary))
        } else if !p.port_forward.is_empty() {
            if p.port_forward.len() > 1 {
                return Err(ReconcileError::configuration(
                    "Only one port forward supported at a time",
                ));
            }
            let forward = ForwardPort::parse_declaration(&p.port_forward[0])
                .map_err(ReconcileError::Configuration)?;
            let summary = format!("port_forward {}", forward);
            item(ZoneItem::ForwardPort(forward), Some(summary))
        } else if let Some(rule) = &p.rich_rule {
            let parsed = rule
                .parse::<RichRule>()
                .map_err(|e| ReconcileError::configuration(e.to_string()))?;
            item(ZoneItem::RichRule(parsed.to_string()), Some(format!("rich_rule {}", rule)))
        } else if let Some(source) = &p.source {
            item(ZoneItem::Source(source.clone()), None)
        } else if let Some(interface) = &p.interface {
            item(ZoneItem::Interface(interface.clone()), None)
        } else if let Some(block) = &p.icmp_block {
            item(ZoneItem::IcmpBlock(block.clone()), Some(format!("icmp-block {}", block)))
        } else if let Some(flag) = p.icmp_block_inversion {
            desired = requested.normalize_toggle(flag);
            item(ZoneItem::IcmpBlockInversion, Some(format!("icmp-block-inversion {}", flag)))
        } else if let Some(flag) = p.forward {
            desired = requested.normalize_toggle(flag);
            item(ZoneItem::Forward, None)
        } else if let Some(flag) = p.masquerade {
            desired = requested.normalize_toggle(flag);
            item(ZoneItem::Masquerade, None)
        } else if let Some(target) = &p.target {
            let target: ZoneTarget = target.parse().map_err(ReconcileError::Configuration)?;
            // Dropping the default target leaves the zone on the default target.
            if target == ZoneTarget::Default {
                desired = DesiredState::Present;
            }
            Action::Target(target)
        } else if requested.is_zone_level() {
            if options.zone.is_none() {
                return Err(ReconcileError::configuration(
                    "zone must be given for present/absent zone operations",
                ));
            }
            Action::Zone
        } else {
            Action::Nothing
        };

        Ok(Self {
            zone: options.zone.clone(),
            action,
            requested,
            desired,
            permanent: options.permanent,
            immediate: options.immediate,
            offline: options.offline,
            timeout: options.timeout,
            check: options.check,
        })
    }

    /// Layers to touch given whether the daemon is reachable.
    pub fn layers(&self, daemon_offline: bool) -> Layers {
        Layers::resolve(self.permanent, self.immediate, self.offline, daemon_offline)
    }

    fn zone(&self, fw: &dyn FirewallBackend) -> Result<String> {
        match &self.zone {
            Some(zone) => Ok(zone.clone()),
            None => {
                let zone = fw.default_zone()?;
                debug!("No zone given, using default zone {}", zone);
                Ok(zone)
            }
        }
    }

    fn transaction(&self, fw: &dyn FirewallBackend, kind: RuleKind, layers: Layers) -> Result<(String, Outcome)> {
        let zone = self.zone(fw)?;
        let outcome = Transaction::new(fw, kind, zone.as_str(), self.desired, layers)
            .check_mode(self.check)
            .run()?;
        Ok((zone, outcome))
    }

    pub fn execute(&self, fw: &dyn FirewallBackend) -> Result<Outcome> {
        let layers = self.layers(fw.is_offline());
        if layers.immediate && fw.is_offline() {
            return Err(ReconcileError::UnreachableDaemon);
        }
        info!("{}", layers.describe());

        let mut outcome = match &self.action {
            Action::Nothing => {
                info!("No primitive given, nothing to do");
                Outcome::default()
            }
            Action::Item { item, summary } => {
                let kind = RuleKind::item(item.clone()).with_timeout(self.timeout);
                let (_, mut outcome) = self.transaction(fw, kind, layers)?;
                if let (true, Some(summary)) = (outcome.changed, summary) {
                    outcome
                        .messages
                        .push(format!("Changed {} to {}", summary, self.requested));
                }
                outcome
            }
            Action::Target(target) => self.transaction(fw, RuleKind::Target(*target), layers)?.1,
            Action::Zone => {
                let (zone, mut outcome) = self.transaction(fw, RuleKind::Zone, layers)?;
                if outcome.changed {
                    outcome
                        .messages
                        .push(format!("Changed zone {} to {}", zone, self.requested));
                }
                outcome
            }
        };

        if fw.is_offline() {
            outcome.messages.push(OFFLINE_NOTE.to_string());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clap::Parser;

    use crate::firewall::memory::MemoryBackend;

    fn request(args: &[&str]) -> Result<Request> {
        let options = Options::try_parse_from(std::iter::once("firewalld-state").chain(args.iter().copied()))
            .expect("arguments should parse");
        Request::from_options(&options)
    }

    fn config_error(args: &[&str]) -> String {
        match request(args) {
            Err(ReconcileError::Configuration(message)) => message,
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_port_without_protocol_is_rejected() {
        let message = config_error(&["--port", "8081", "--state", "enabled", "--permanent"]);
        assert_eq!(message, "improper port format (missing protocol?)");
    }

    #[test]
    fn test_one_primitive_at_a_time() {
        let message = config_error(&["--service", "ssh", "--port", "80/tcp", "--state", "enabled"]);
        assert!(message.contains("service, port"));
    }

    #[test]
    fn test_option_dependencies() {
        assert!(config_error(&["--offline", "--service", "ssh", "--state", "enabled"]).contains("offline"));
        assert_eq!(
            config_error(&["--interface", "eth0", "--state", "enabled"]),
            "interface requires zone"
        );
        assert_eq!(
            config_error(&["--target", "DROP", "--state", "present"]),
            "target requires zone"
        );
        assert!(config_error(&["--state", "absent"]).contains("zone must be given"));
    }

    #[test]
    fn test_present_only_for_zone_operations() {
        let message = config_error(&["--service", "ssh", "--state", "present"]);
        assert_eq!(message, "absent and present state can only be used in zone level operations");

        let target = request(&["--zone", "dmz", "--target", "DROP", "--state", "present"]).unwrap();
        assert_eq!(target.action, Action::Target(ZoneTarget::Drop));
    }

    #[test]
    fn test_absent_default_target_settles() {
        let fw = MemoryBackend::new(&["dmz"]);
        let drop = request(&["--zone", "dmz", "--target", "DROP", "--state", "present", "--permanent"]).unwrap();
        drop.execute(&fw).unwrap();

        let reset = request(&["--zone", "dmz", "--target", "default", "--state", "absent", "--permanent"]).unwrap();
        assert_eq!(reset.desired, DesiredState::Present);
        assert_eq!(reset.requested, DesiredState::Absent);

        let first = reset.execute(&fw).unwrap();
        assert!(first.changed);
        assert_eq!(fw.permanent("dmz").target, "default");
        let commits = fw.commits();

        let second = reset.execute(&fw).unwrap();
        assert!(!second.changed);
        assert!(second.messages.is_empty());
        assert_eq!(fw.commits(), commits);
    }

    #[test]
    fn test_port_forward_validation() {
        assert_eq!(
            config_error(&[
                "--port-forward", "port=1,proto=tcp,toport=2",
                "--port-forward", "port=3,proto=tcp,toport=4",
                "--state", "enabled",
            ]),
            "Only one port forward supported at a time"
        );
        assert_eq!(
            config_error(&["--port-forward", "port=443,proto=tcp", "--state", "enabled"]),
            "toport must be specified for port forward"
        );
    }

    #[test]
    fn test_invalid_rich_rule() {
        assert!(config_error(&["--rich-rule", "rule service name=ssh", "--state", "enabled"])
            .starts_with("invalid rich rule"));
    }

    #[test]
    fn test_toggles_are_normalized() {
        let r = request(&["--masquerade", "false", "--state", "enabled"]).unwrap();
        assert_eq!(r.desired, DesiredState::Disabled);
        assert_eq!(r.requested, DesiredState::Enabled);

        let r = request(&["--forward", "true", "--state", "disabled"]).unwrap();
        assert_eq!(r.desired, DesiredState::Disabled);
    }

    #[test]
    fn test_nothing_to_do() {
        let fw = MemoryBackend::new(&["public"]);
        let r = request(&["--state", "enabled"]).unwrap();
        assert_eq!(r.action, Action::Nothing);
        assert_eq!(r.execute(&fw).unwrap(), Outcome::default());
    }

    #[test]
    fn test_default_zone_and_summary() {
        let fw = MemoryBackend::new(&["public"]);
        let r = request(&["--port", "8080/tcp", "--state", "enabled", "--permanent"]).unwrap();

        let outcome = r.execute(&fw).unwrap();
        assert!(outcome.changed);
        assert_eq!(
            outcome.messages,
            vec![
                "Added port 8080/tcp to zone public (permanent layer)",
                "Changed port 8080/tcp to enabled",
            ]
        );

        let again = r.execute(&fw).unwrap();
        assert!(!again.changed);
        assert!(again.messages.is_empty());
    }

    #[test]
    fn test_zone_present_and_absent() {
        let fw = MemoryBackend::new(&["public"]);

        let create = request(&["--zone", "custom", "--state", "present", "--permanent"]).unwrap();
        let outcome = create.execute(&fw).unwrap();
        assert_eq!(
            outcome.messages,
            vec!["Added zone custom (permanent layer)", "Changed zone custom to present"]
        );

        let both = request(&["--zone", "custom", "--state", "absent", "--permanent", "--immediate"]).unwrap();
        assert_matches!(both.execute(&fw), Err(ReconcileError::UnsupportedOperation(_)));
        assert!(fw.has_permanent_zone("custom"));
    }

    #[test]
    fn test_offline_daemon() {
        let fw = MemoryBackend::offline(&["public"]);

        let immediate = request(&["--service", "ssh", "--state", "enabled", "--permanent", "--immediate"]).unwrap();
        assert_matches!(immediate.execute(&fw), Err(ReconcileError::UnreachableDaemon));

        let offline = request(&[
            "--service", "ssh", "--state", "enabled", "--permanent", "--immediate", "--offline",
        ])
        .unwrap();
        let outcome = offline.execute(&fw).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.messages.last().map(String::as_str), Some(OFFLINE_NOTE));
        assert!(fw.permanent("public").services.contains(&"ssh".to_string()));
    }

    #[test]
    fn test_check_mode() {
        let fw = MemoryBackend::new(&["public"]);
        let r = request(&["--zone", "public", "--masquerade", "true", "--state", "enabled", "--check"]).unwrap();

        let outcome = r.execute(&fw).unwrap();
        assert!(outcome.changed);
        assert!(!fw.runtime("public").masquerade);
    }

    #[test]
    fn test_timeout_reaches_runtime() {
        let fw = MemoryBackend::new(&["public"]);
        let r = request(&["--service", "http", "--state", "enabled", "--timeout", "300"]).unwrap();
        r.execute(&fw).unwrap();
        assert_eq!(fw.lease(&ZoneItem::Service("http".into())), Some(300));
    }
}
