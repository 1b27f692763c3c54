// Firewalld State - D-Bus Zone Settings
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! The `a{sv}` zone settings dictionary used by `getSettings2` / `update2`.

use zbus::zvariant::{DeserializeDict, SerializeDict, Type};

use crate::models::{ForwardPort, PortSpec, ZoneSettings};

/// Zone settings as firewalld (>= 0.9) exchanges them over D-Bus.
///
/// firewalld leaves out keys that hold their default value, so every field
/// is optional.
#[derive(Debug, Default, DeserializeDict, SerializeDict, Type)]
#[zvariant(signature = "dict")]
pub struct ZoneSettingsDict {
    pub version: Option<String>,
    pub short: Option<String>,
    pub description: Option<String>,
    pub target: Option<String>,
    pub services: Option<Vec<String>>,
    pub ports: Option<Vec<(String, String)>>,
    pub icmp_blocks: Option<Vec<String>>,
    pub masquerade: Option<bool>,
    pub forward_ports: Option<Vec<(String, String, String, String)>>,
    pub interfaces: Option<Vec<String>>,
    pub sources: Option<Vec<String>>,
    pub rules_str: Option<Vec<String>>,
    pub protocols: Option<Vec<String>>,
    pub source_ports: Option<Vec<(String, String)>>,
    pub icmp_block_inversion: Option<bool>,
    pub forward: Option<bool>,
    pub ingress_priority: Option<i32>,
    pub egress_priority: Option<i32>,
}

fn to_specs(pairs: Option<Vec<(String, String)>>) -> Vec<PortSpec> {
    pairs
        .unwrap_or_default()
        .into_iter()
        .map(|(port, protocol)| PortSpec { port, protocol })
        .collect()
}

fn from_specs(specs: &[PortSpec]) -> Vec<(String, String)> {
    specs
        .iter()
        .map(|s| (s.port.clone(), s.protocol.clone()))
        .collect()
}

impl From<ZoneSettingsDict> for ZoneSettings {
    fn from(dict: ZoneSettingsDict) -> Self {
        Self {
            version: dict.version.unwrap_or_default(),
            short: dict.short.unwrap_or_default(),
            description: dict.description.unwrap_or_default(),
            target: dict.target.unwrap_or_else(|| "default".to_string()),
            services: dict.services.unwrap_or_default(),
            ports: to_specs(dict.ports),
            icmp_blocks: dict.icmp_blocks.unwrap_or_default(),
            masquerade: dict.masquerade.unwrap_or(false),
            forward_ports: dict
                .forward_ports
                .unwrap_or_default()
                .into_iter()
                .map(|(port, protocol, to_port, to_addr)| ForwardPort {
                    port,
                    protocol,
                    to_port,
                    to_addr,
                })
                .collect(),
            interfaces: dict.interfaces.unwrap_or_default(),
            sources: dict.sources.unwrap_or_default(),
            rich_rules: dict.rules_str.unwrap_or_default(),
            protocols: dict.protocols.unwrap_or_default(),
            source_ports: to_specs(dict.source_ports),
            icmp_block_inversion: dict.icmp_block_inversion.unwrap_or(false),
            forward: dict.forward.unwrap_or(false),
            ingress_priority: dict.ingress_priority,
            egress_priority: dict.egress_priority,
        }
    }
}

impl From<&ZoneSettings> for ZoneSettingsDict {
    /// Every key is sent so `update2` replaces the whole zone. Priorities are
    /// only sent back when the daemon reported them, older daemons reject them.
    fn from(settings: &ZoneSettings) -> Self {
        Self {
            version: Some(settings.version.clone()),
            short: Some(settings.short.clone()),
            description: Some(settings.description.clone()),
            target: Some(settings.target.clone()),
            services: Some(settings.services.clone()),
            ports: Some(from_specs(&settings.ports)),
            icmp_blocks: Some(settings.icmp_blocks.clone()),
            masquerade: Some(settings.masquerade),
            forward_ports: Some(
                settings
                    .forward_ports
                    .iter()
                    .map(|f| {
                        (
                            f.port.clone(),
                            f.protocol.clone(),
                            f.to_port.clone(),
                            f.to_addr.clone(),
                        )
                    })
                    .collect(),
            ),
            interfaces: Some(settings.interfaces.clone()),
            sources: Some(settings.sources.clone()),
            rules_str: Some(settings.rich_rules.clone()),
            protocols: Some(settings.protocols.clone()),
            source_ports: Some(from_specs(&settings.source_ports)),
            icmp_block_inversion: Some(settings.icmp_block_inversion),
            forward: Some(settings.forward),
            ingress_priority: settings.ingress_priority,
            egress_priority: settings.egress_priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings = ZoneSettings::from(ZoneSettingsDict {
            services: Some(vec!["ssh".into()]),
            ports: Some(vec![("8080".into(), "tcp".into())]),
            ..Default::default()
        });

        assert_eq!(settings.target, "default");
        assert_eq!(settings.services, vec!["ssh"]);
        assert_eq!(settings.ports, vec![PortSpec::new("8080", "tcp")]);
        assert!(!settings.forward);
        assert_eq!(settings.ingress_priority, None);
    }

    #[test]
    fn test_priorities_only_sent_when_known() {
        let mut settings = ZoneSettings::default();
        let dict = ZoneSettingsDict::from(&settings);
        assert!(dict.ingress_priority.is_none());
        assert_eq!(dict.forward, Some(false));

        settings.ingress_priority = Some(-10);
        settings.egress_priority = Some(0);
        let dict = ZoneSettingsDict::from(&settings);
        assert_eq!(dict.ingress_priority, Some(-10));
        assert_eq!(dict.egress_priority, Some(0));
    }

    #[test]
    fn test_forward_ports_convert_both_ways() {
        let mut settings = ZoneSettings::default();
        settings.forward_ports.push(ForwardPort::new("443", "tcp", "8443", ""));
        let back = ZoneSettings::from(ZoneSettingsDict::from(&settings));
        assert_eq!(back, settings);
    }
}
