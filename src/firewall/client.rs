// Firewalld State - D-Bus Client
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewalld D-Bus client implementation.

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use zbus::blocking::Connection;
use zbus::zvariant::{DynamicType, OwnedObjectPath, OwnedValue, Type};

use super::wire::ZoneSettingsDict;
use super::{interfaces, paths, FirewallBackend, ZoneHandle, BUS_NAME};
use crate::models::{RichRule, ZoneItem, ZoneSettings};

/// Oldest firewalld with the dict based settings API and zone forwarding.
const MIN_DAEMON_VERSION: semver::Version = semver::Version::new(0, 9, 0);

/// Client for the running firewalld daemon.
pub struct FirewallClient {
    connection: Connection,
}

impl FirewallClient {
    /// Connect to firewalld and make sure it is new enough.
    pub fn connect() -> Result<Self> {
        info!("Connecting to firewalld...");

        let connection = Connection::system().context("Failed to connect to system D-Bus")?;

        // Test connection by getting the default zone
        let _: String = connection
            .call_method(
                Some(BUS_NAME),
                paths::ROOT,
                Some(interfaces::MAIN),
                "getDefaultZone",
                &(),
            )
            .context("firewalld is not running")?
            .body()
            .deserialize()?;

        let value: OwnedValue = connection
            .call_method(
                Some(BUS_NAME),
                paths::ROOT,
                Some(interfaces::PROPERTIES),
                "Get",
                &(interfaces::MAIN, "version"),
            )?
            .body()
            .deserialize()?;
        let raw = String::try_from(value).context("firewalld reported a non-string version")?;

        let version = parse_daemon_version(&raw)
            .ok_or_else(|| anyhow!("Unrecognised firewalld version '{}'", raw))?;
        if version < MIN_DAEMON_VERSION {
            bail!(
                "firewalld {} is too old, at least {} is required",
                version,
                MIN_DAEMON_VERSION
            );
        }

        info!("Connected to firewalld {}", version);
        Ok(Self { connection })
    }

    fn call<B, R>(&self, path: &str, interface: &str, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + DynamicType,
        R: DeserializeOwned + Type,
    {
        debug!("D-Bus call {}.{} on {}", interface, method, path);
        let reply = self
            .connection
            .call_method(Some(BUS_NAME), path, Some(interface), method, body)
            .with_context(|| format!("firewalld call {} failed", method))?;
        let value = reply
            .body()
            .deserialize()
            .with_context(|| format!("Unexpected reply to {}", method))?;
        Ok(value)
    }

    /// Call a runtime zone method whose reply is ignored.
    ///
    /// firewalld answers `ALREADY_ENABLED` / `NOT_ENABLED` when the state
    /// already matches, which is not a failure for us.
    fn zone_call<B>(&self, method: &str, body: &B) -> Result<()>
    where
        B: Serialize + DynamicType,
    {
        let result = self.connection.call_method(
            Some(BUS_NAME),
            paths::ROOT,
            Some(interfaces::ZONE),
            method,
            body,
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("ALREADY_ENABLED") => {
                info!("{}: already enabled", method);
                Ok(())
            }
            Err(e) if e.to_string().contains("NOT_ENABLED") => {
                info!("{}: not enabled", method);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("firewalld call {} failed", method)),
        }
    }

    fn zone_query<B>(&self, method: &str, body: &B) -> Result<bool>
    where
        B: Serialize + DynamicType,
    {
        self.call(paths::ROOT, interfaces::ZONE, method, body)
    }

    fn zone_list(&self, method: &str, zone: &str) -> Result<Vec<String>> {
        self.call(paths::ROOT, interfaces::ZONE, method, &(zone,))
    }

    /// Get the D-Bus path for a zone's permanent config.
    fn zone_config_path(&self, zone: &str) -> Result<String> {
        let path: OwnedObjectPath = self
            .call(paths::CONFIG, interfaces::CONFIG, "getZoneByName", &(zone,))
            .with_context(|| format!("Zone '{}' does not exist", zone))?;
        Ok(path.to_string())
    }
}

impl FirewallBackend for FirewallClient {
    fn is_offline(&self) -> bool {
        false
    }

    fn default_zone(&self) -> Result<String> {
        self.call(paths::ROOT, interfaces::MAIN, "getDefaultZone", &())
    }

    fn query_runtime(&self, zone: &str, item: &ZoneItem) -> Result<bool> {
        match item {
            ZoneItem::Service(s) => self.zone_query("queryService", &(zone, s)),
            ZoneItem::Protocol(p) => self.zone_query("queryProtocol", &(zone, p)),
            ZoneItem::Port(spec) => self.zone_query("queryPort", &(zone, &spec.port, &spec.protocol)),
            ZoneItem::SourcePort(spec) => {
                self.zone_query("querySourcePort", &(zone, &spec.port, &spec.protocol))
            }
            ZoneItem::IcmpBlock(b) => self.zone_query("queryIcmpBlock", &(zone, b)),
            ZoneItem::IcmpBlockInversion => self.zone_query("queryIcmpBlockInversion", &(zone,)),
            ZoneItem::Masquerade => self.zone_query("queryMasquerade", &(zone,)),
            ZoneItem::Forward => self.zone_query("queryForward", &(zone,)),
            ZoneItem::ForwardPort(f) => self.zone_query(
                "queryForwardPort",
                &(zone, &f.port, &f.protocol, &f.to_port, &f.to_addr),
            ),
            ZoneItem::RichRule(rule) => Ok(self
                .zone_list("getRichRules", zone)?
                .iter()
                .any(|existing| RichRule::canonicalize(existing) == *rule)),
            ZoneItem::Interface(i) => Ok(self.zone_list("getInterfaces", zone)?.contains(i)),
            ZoneItem::Source(s) => Ok(self.zone_list("getSources", zone)?.contains(s)),
        }
    }

    fn add_runtime(&self, zone: &str, item: &ZoneItem, timeout: u32) -> Result<()> {
        let timeout = i32::try_from(timeout).context("Timeout is out of range")?;
        info!("Adding {} to zone {} (runtime, timeout {}s)", item, zone, timeout);

        match item {
            ZoneItem::Service(s) => self.zone_call("addService", &(zone, s, timeout)),
            ZoneItem::Protocol(p) => self.zone_call("addProtocol", &(zone, p, timeout)),
            ZoneItem::Port(spec) => {
                self.zone_call("addPort", &(zone, &spec.port, &spec.protocol, timeout))
            }
            ZoneItem::SourcePort(spec) => {
                self.zone_call("addSourcePort", &(zone, &spec.port, &spec.protocol, timeout))
            }
            ZoneItem::IcmpBlock(b) => self.zone_call("addIcmpBlock", &(zone, b, timeout)),
            ZoneItem::IcmpBlockInversion => self.zone_call("addIcmpBlockInversion", &(zone,)),
            ZoneItem::Masquerade => self.zone_call("addMasquerade", &(zone, 0i32)),
            ZoneItem::Forward => self.zone_call("addForward", &(zone,)),
            ZoneItem::ForwardPort(f) => self.zone_call(
                "addForwardPort",
                &(zone, &f.port, &f.protocol, &f.to_port, &f.to_addr, timeout),
            ),
            ZoneItem::RichRule(rule) => self.zone_call("addRichRule", &(zone, rule, timeout)),
            ZoneItem::Interface(i) => self.zone_call("changeZoneOfInterface", &(zone, i)),
            ZoneItem::Source(s) => self.zone_call("addSource", &(zone, s)),
        }
    }

    fn remove_runtime(&self, zone: &str, item: &ZoneItem) -> Result<()> {
        info!("Removing {} from zone {} (runtime)", item, zone);

        match item {
            ZoneItem::Service(s) => self.zone_call("removeService", &(zone, s)),
            ZoneItem::Protocol(p) => self.zone_call("removeProtocol", &(zone, p)),
            ZoneItem::Port(spec) => self.zone_call("removePort", &(zone, &spec.port, &spec.protocol)),
            ZoneItem::SourcePort(spec) => {
                self.zone_call("removeSourcePort", &(zone, &spec.port, &spec.protocol))
            }
            ZoneItem::IcmpBlock(b) => self.zone_call("removeIcmpBlock", &(zone, b)),
            ZoneItem::IcmpBlockInversion => self.zone_call("removeIcmpBlockInversion", &(zone,)),
            ZoneItem::Masquerade => self.zone_call("removeMasquerade", &(zone,)),
            ZoneItem::Forward => self.zone_call("removeForward", &(zone,)),
            ZoneItem::ForwardPort(f) => self.zone_call(
                "removeForwardPort",
                &(zone, &f.port, &f.protocol, &f.to_port, &f.to_addr),
            ),
            ZoneItem::RichRule(rule) => self.zone_call("removeRichRule", &(zone, rule)),
            ZoneItem::Interface(i) => self.zone_call("removeInterface", &(zone, i)),
            ZoneItem::Source(s) => self.zone_call("removeSource", &(zone, s)),
        }
    }

    fn zone_settings(&self, zone: &str) -> Result<(ZoneHandle, ZoneSettings)> {
        let path = self.zone_config_path(zone)?;
        let dict: ZoneSettingsDict = self.call(&path, interfaces::CONFIG_ZONE, "getSettings2", &())?;

        let handle = ZoneHandle {
            name: zone.to_string(),
            locator: path,
        };
        Ok((handle, dict.into()))
    }

    fn update_zone_settings(&self, handle: &ZoneHandle, settings: &ZoneSettings) -> Result<()> {
        let dict = ZoneSettingsDict::from(settings);

        self.connection
            .call_method(
                Some(BUS_NAME),
                handle.locator.as_str(),
                Some(interfaces::CONFIG_ZONE),
                "update2",
                &(dict,),
            )
            .with_context(|| format!("Failed to update permanent settings of zone {}", handle.name))?;

        info!("Updated permanent settings of zone {}", handle.name);
        Ok(())
    }

    fn list_zones(&self) -> Result<Vec<String>> {
        self.call(paths::CONFIG, interfaces::CONFIG, "getZoneNames", &())
    }

    fn add_zone(&self, name: &str, settings: &ZoneSettings) -> Result<()> {
        let dict = ZoneSettingsDict::from(settings);
        let _: OwnedObjectPath = self
            .call(paths::CONFIG, interfaces::CONFIG, "addZone2", &(name, dict))
            .with_context(|| format!("Failed to add zone {}", name))?;

        info!("Added permanent zone {}", name);
        Ok(())
    }

    fn remove_zone(&self, name: &str) -> Result<()> {
        let path = self.zone_config_path(name)?;
        let _: () = self.call(&path, interfaces::CONFIG_ZONE, "remove", &())?;

        info!("Removed permanent zone {}", name);
        Ok(())
    }

    fn permanent_zones_of_interface(&self, interface: &str) -> Result<Vec<String>> {
        let zone: String =
            self.call(paths::CONFIG, interfaces::CONFIG, "getZoneOfInterface", &(interface,))?;
        Ok(zones_of_interface(&zone))
    }
}

/// Split a `getZoneOfInterface` reply into zone names.
///
/// An interface listed in several zone files comes back as
/// `"a b  (ERROR: interface 'eth0' is in 2 zone XML files, can be only in one)"`.
fn zones_of_interface(reply: &str) -> Vec<String> {
    let names = match reply.find("(ERROR:") {
        Some(pos) => &reply[..pos],
        None => reply,
    };
    names.split_whitespace().map(str::to_string).collect()
}

/// Parse a firewalld version such as `1.3.4` or `0.9` into a semver version.
fn parse_daemon_version(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim();
    if let Ok(version) = semver::Version::parse(trimmed) {
        return Some(version);
    }

    let mut parts = trimmed
        .split(|c: char| !c.is_ascii_digit())
        .take_while(|p| !p.is_empty())
        .map(|p| p.parse::<u64>());
    let major = parts.next()?.ok()?;
    let minor = parts.next().unwrap_or(Ok(0)).ok()?;
    let patch = parts.next().unwrap_or(Ok(0)).ok()?;
    Some(semver::Version::new(major, minor, patch))
}
