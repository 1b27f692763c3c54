// Firewalld State - Rule Kinds
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! The primitives the engine can reconcile, and how each one is read and
//! written in both layers.

use tracing::info;

use super::ZoneSettingsCache;
use crate::error::{ReconcileError, Result, ZONE_NOT_PERMANENT};
use crate::firewall::FirewallBackend;
use crate::models::{ZoneItem, ZoneSettings, ZoneTarget};

/// Read and write access to one primitive in both layers.
pub trait RuleOps {
    fn get_enabled_immediate(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<bool>;
    fn get_enabled_permanent(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<bool>;
    fn set_enabled_immediate(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()>;
    fn set_enabled_permanent(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()>;
    fn set_disabled_immediate(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()>;
    fn set_disabled_permanent(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()>;

    /// Message for a layer that was switched on.
    fn enabled_message(&self, zone: &str) -> String;
    /// Message for a layer that was switched off.
    fn disabled_message(&self, zone: &str) -> String;
}

/// A primitive being reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Membership of `item` in the zone. `timeout` is the runtime lease in
    /// seconds (0 = no expiry) and is ignored for items without leases.
    Item { item: ZoneItem, timeout: u32 },
    /// The zone's default disposition.
    Target(ZoneTarget),
    /// Existence of the zone itself.
    Zone,
}

impl RuleKind {
    pub fn item(item: ZoneItem) -> Self {
        RuleKind::Item { item, timeout: 0 }
    }

    /// Set the runtime lease of an item. Other kinds have none.
    pub fn with_timeout(mut self, seconds: u32) -> Self {
        if let RuleKind::Item { timeout, .. } = &mut self {
            *timeout = seconds;
        }
        self
    }

    /// Permanent zones that declare `interface`, refusing broken setups.
    fn interface_owners(fw: &dyn FirewallBackend, interface: &str) -> Result<Vec<String>> {
        let owners = fw.permanent_zones_of_interface(interface)?;
        if owners.len() > 1 {
            return Err(ReconcileError::MultiZoneInterface {
                interface: interface.to_string(),
                count: owners.len(),
            });
        }
        Ok(owners)
    }

    /// Move `interface` into `zone`, taking it out of whichever zone held it.
    fn assign_interface(fw: &dyn FirewallBackend, zone: &str, item: &ZoneItem, interface: &str) -> Result<()> {
        let cache = ZoneSettingsCache::new(fw);

        for owner in Self::interface_owners(fw, interface)? {
            if owner != zone {
                info!("Moving interface {} out of zone {}", interface, owner);
                cache.modify(&owner, |s| s.remove(item))?;
            }
        }
        cache.modify(zone, |s| s.insert(item))
    }

    fn snapshot(fw: &dyn FirewallBackend, zone: &str) -> Result<ZoneSettings> {
        let (_, settings) = ZoneSettingsCache::new(fw).get(zone)?;
        Ok(settings)
    }
}

impl RuleOps for RuleKind {
    fn get_enabled_immediate(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<bool> {
        match self {
            RuleKind::Item { item, .. } => Ok(fw.query_runtime(zone, item)?),
            RuleKind::Target(_) | RuleKind::Zone => {
                Err(ReconcileError::UnsupportedOperation(ZONE_NOT_PERMANENT))
            }
        }
    }

    fn get_enabled_permanent(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<bool> {
        match self {
            RuleKind::Item { item, .. } => {
                if let ZoneItem::Interface(interface) = item {
                    Self::interface_owners(fw, interface)?;
                }
                Ok(Self::snapshot(fw, zone)?.contains(item))
            }
            RuleKind::Target(target) => {
                let current = Self::snapshot(fw, zone)?.target;
                Ok(current.parse::<ZoneTarget>().ok() == Some(*target))
            }
            RuleKind::Zone => Ok(fw.list_zones()?.iter().any(|z| z == zone)),
        }
    }

    fn set_enabled_immediate(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()> {
        match self {
            RuleKind::Item { item, timeout } => {
                let timeout = if item.supports_timeout() { *timeout } else { 0 };
                Ok(fw.add_runtime(zone, item, timeout)?)
            }
            RuleKind::Target(_) | RuleKind::Zone => {
                Err(ReconcileError::UnsupportedOperation(ZONE_NOT_PERMANENT))
            }
        }
    }

    fn set_enabled_permanent(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()> {
        match self {
            RuleKind::Item { item: item @ ZoneItem::Interface(interface), .. } => {
                Self::assign_interface(fw, zone, item, interface)
            }
            RuleKind::Item { item, .. } => ZoneSettingsCache::new(fw).modify(zone, |s| s.insert(item)),
            RuleKind::Target(target) => ZoneSettingsCache::new(fw)
                .modify(zone, |s| s.target = target.as_str().to_string()),
            RuleKind::Zone => Ok(fw.add_zone(zone, &ZoneSettings::default())?),
        }
    }

    fn set_disabled_immediate(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()> {
        match self {
            RuleKind::Item { item, .. } => Ok(fw.remove_runtime(zone, item)?),
            RuleKind::Target(_) | RuleKind::Zone => {
                Err(ReconcileError::UnsupportedOperation(ZONE_NOT_PERMANENT))
            }
        }
    }

    fn set_disabled_permanent(&self, fw: &dyn FirewallBackend, zone: &str) -> Result<()> {
        match self {
            RuleKind::Item { item, .. } => ZoneSettingsCache::new(fw).modify(zone, |s| s.remove(item)),
            RuleKind::Target(_) => ZoneSettingsCache::new(fw)
                .modify(zone, |s| s.target = ZoneTarget::Default.as_str().to_string()),
            RuleKind::Zone => Ok(fw.remove_zone(zone)?),
        }
    }

    fn enabled_message(&self, zone: &str) -> String {
        match self {
            RuleKind::Item { item: item @ ZoneItem::Interface(_), .. } => {
                format!("Changed {} to zone {}", item, zone)
            }
            RuleKind::Item { item, .. } => format!("Added {} to zone {}", item, zone),
            RuleKind::Target(target) => format!("Set zone {} target to {}", zone, target),
            RuleKind::Zone => format!("Added zone {}", zone),
        }
    }

    fn disabled_message(&self, zone: &str) -> String {
        match self {
            RuleKind::Item { item, .. } => format!("Removed {} from zone {}", item, zone),
            RuleKind::Target(_) => format!("Reset zone {} target to default", zone),
            RuleKind::Zone => format!("Removed zone {}", zone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::firewall::memory::MemoryBackend;
    use crate::models::PortSpec;

    #[test]
    fn test_item_touches_only_its_layer() {
        let fw = MemoryBackend::new(&["public"]);
        let kind = RuleKind::item(ZoneItem::Service("ssh".into()));

        kind.set_enabled_permanent(&fw, "public").unwrap();
        assert!(kind.get_enabled_permanent(&fw, "public").unwrap());
        assert!(!kind.get_enabled_immediate(&fw, "public").unwrap());

        kind.set_enabled_immediate(&fw, "public").unwrap();
        kind.set_disabled_permanent(&fw, "public").unwrap();
        assert!(!kind.get_enabled_permanent(&fw, "public").unwrap());
        assert!(kind.get_enabled_immediate(&fw, "public").unwrap());
    }

    #[test]
    fn test_timeout_only_for_leased_items() {
        let fw = MemoryBackend::new(&["public"]);

        let port = ZoneItem::Port(PortSpec::new("8080", "tcp"));
        RuleKind::item(port.clone())
            .with_timeout(60)
            .set_enabled_immediate(&fw, "public")
            .unwrap();
        assert_eq!(fw.lease(&port), Some(60));

        RuleKind::item(ZoneItem::Masquerade)
            .with_timeout(60)
            .set_enabled_immediate(&fw, "public")
            .unwrap();
        assert_eq!(fw.lease(&ZoneItem::Masquerade), Some(0));
    }

    #[test]
    fn test_interface_moves_between_zones() {
        let fw = MemoryBackend::new(&["public", "internal"]);
        let eth0 = ZoneItem::Interface("eth0".into());
        fw.seed_permanent("public", &eth0);

        let kind = RuleKind::item(eth0.clone());
        assert!(!kind.get_enabled_permanent(&fw, "internal").unwrap());
        kind.set_enabled_permanent(&fw, "internal").unwrap();

        assert!(!fw.permanent("public").contains(&eth0));
        assert!(fw.permanent("internal").contains(&eth0));
        assert_eq!(fw.commits(), 2);
    }

    #[test]
    fn test_interface_in_several_zones_is_refused() {
        let fw = MemoryBackend::new(&["public", "internal", "dmz"]);
        let eth0 = ZoneItem::Interface("eth0".into());
        fw.seed_permanent("public", &eth0);
        fw.seed_permanent("internal", &eth0);

        let kind = RuleKind::item(eth0);
        assert_matches!(
            kind.get_enabled_permanent(&fw, "dmz"),
            Err(ReconcileError::MultiZoneInterface { count: 2, .. })
        );
        assert_matches!(
            kind.set_enabled_permanent(&fw, "dmz"),
            Err(ReconcileError::MultiZoneInterface { count: 2, .. })
        );
        assert_eq!(fw.commits(), 0);
    }

    #[test]
    fn test_target() {
        let fw = MemoryBackend::new(&["public"]);
        let kind = RuleKind::Target(ZoneTarget::Drop);

        assert!(!kind.get_enabled_permanent(&fw, "public").unwrap());
        kind.set_enabled_permanent(&fw, "public").unwrap();
        assert_eq!(fw.permanent("public").target, "DROP");
        assert!(kind.get_enabled_permanent(&fw, "public").unwrap());

        kind.set_disabled_permanent(&fw, "public").unwrap();
        assert_eq!(fw.permanent("public").target, "default");

        assert_matches!(
            kind.get_enabled_immediate(&fw, "public"),
            Err(ReconcileError::UnsupportedOperation(_))
        );
        assert_matches!(
            kind.set_enabled_immediate(&fw, "public"),
            Err(ReconcileError::UnsupportedOperation(_))
        );
    }

    #[test]
    fn test_zone_existence() {
        let fw = MemoryBackend::new(&["public"]);

        assert!(!RuleKind::Zone.get_enabled_permanent(&fw, "custom").unwrap());
        RuleKind::Zone.set_enabled_permanent(&fw, "custom").unwrap();
        assert!(fw.has_permanent_zone("custom"));
        assert!(RuleKind::Zone.get_enabled_permanent(&fw, "custom").unwrap());

        RuleKind::Zone.set_disabled_permanent(&fw, "custom").unwrap();
        assert!(!fw.has_permanent_zone("custom"));
        assert_matches!(
            RuleKind::Zone.set_disabled_immediate(&fw, "custom"),
            Err(ReconcileError::UnsupportedOperation(_))
        );
    }

    #[test]
    fn test_messages() {
        let port = RuleKind::item(ZoneItem::Port(PortSpec::new("8080", "tcp")));
        assert_eq!(port.enabled_message("public"), "Added port 8080/tcp to zone public");
        assert_eq!(port.disabled_message("public"), "Removed port 8080/tcp from zone public");

        let iface = RuleKind::item(ZoneItem::Interface("eth0".into()));
        assert_eq!(iface.enabled_message("dmz"), "Changed interface eth0 to zone dmz");

        assert_eq!(RuleKind::item(ZoneItem::Forward).enabled_message("dmz"), "Added forward to zone dmz");
        assert_eq!(
            RuleKind::Target(ZoneTarget::Reject).enabled_message("dmz"),
            "Set zone dmz target to %%REJECT%%"
        );
        assert_eq!(RuleKind::Zone.disabled_message("lab"), "Removed zone lab");
    }
}
