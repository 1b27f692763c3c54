// Firewalld State - Firewall Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Access to firewalld: the live D-Bus client and the offline zone store.
//!
//! Both implement [`FirewallBackend`]. The reconciliation engine only ever
//! talks to the trait, so it never needs to know which one it was given
//! beyond [`FirewallBackend::is_offline`].

mod client;
#[cfg(test)]
pub mod memory;
mod offline;
mod wire;
mod zone_xml;

pub use client::FirewallClient;
pub use offline::{OfflinePaths, OfflineStore};

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::ReconcileError;
use crate::models::{ZoneItem, ZoneSettings};

/// D-Bus bus name for firewalld.
pub const BUS_NAME: &str = "org.fedoraproject.FirewallD1";

/// D-Bus object paths.
pub mod paths {
    pub const ROOT: &str = "/org/fedoraproject/FirewallD1";
    pub const CONFIG: &str = "/org/fedoraproject/FirewallD1/config";
}

/// D-Bus interface names.
pub mod interfaces {
    /// Main firewalld interface (getDefaultZone, version property, ...)
    pub const MAIN: &str = "org.fedoraproject.FirewallD1";
    /// Runtime zone interface
    pub const ZONE: &str = "org.fedoraproject.FirewallD1.zone";
    pub const CONFIG: &str = "org.fedoraproject.FirewallD1.config";
    /// Permanent zone object interface
    pub const CONFIG_ZONE: &str = "org.fedoraproject.FirewallD1.config.zone";
    pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
}

/// Locates the permanent configuration of one zone.
///
/// For the live daemon this is the zone's config object path, for the
/// offline store it is the file the zone is written back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneHandle {
    pub name: String,
    pub locator: String,
}

/// Operations the reconciliation engine needs from firewalld.
///
/// Runtime calls operate on the running daemon; permanent calls go through
/// zone settings snapshots.
pub trait FirewallBackend {
    /// `true` when only the on-disk configuration is reachable.
    fn is_offline(&self) -> bool;

    /// Zone used when the caller does not name one.
    fn default_zone(&self) -> Result<String>;

    /// Whether `item` is active in the runtime layer of `zone`.
    fn query_runtime(&self, zone: &str, item: &ZoneItem) -> Result<bool>;

    /// Activate `item` at runtime. `timeout` is a lease in seconds, 0 means forever.
    fn add_runtime(&self, zone: &str, item: &ZoneItem, timeout: u32) -> Result<()>;

    /// Deactivate `item` at runtime.
    fn remove_runtime(&self, zone: &str, item: &ZoneItem) -> Result<()>;

    /// Fetch a fresh copy of the permanent settings of `zone`.
    fn zone_settings(&self, zone: &str) -> Result<(ZoneHandle, ZoneSettings)>;

    /// Replace the permanent settings behind `handle` with `settings`.
    fn update_zone_settings(&self, handle: &ZoneHandle, settings: &ZoneSettings) -> Result<()>;

    /// Names of all permanent zones.
    fn list_zones(&self) -> Result<Vec<String>>;

    fn add_zone(&self, name: &str, settings: &ZoneSettings) -> Result<()>;

    fn remove_zone(&self, name: &str) -> Result<()>;

    /// Permanent zones that declare `interface`. More than one entry means the
    /// configuration is broken.
    fn permanent_zones_of_interface(&self, interface: &str) -> Result<Vec<String>>;
}

/// Open the live daemon, falling back to the on-disk store when firewalld is
/// not running and the permanent layer is wanted.
pub fn open(settings: &Settings, permanent: bool) -> Result<Box<dyn FirewallBackend>, ReconcileError> {
    let live_error = match FirewallClient::connect() {
        Ok(client) => return Ok(Box::new(client)),
        Err(e) => e,
    };

    if !permanent {
        info!("firewalld is not reachable: {:#}", live_error);
        return Err(ReconcileError::UnreachableDaemon);
    }

    warn!(
        "firewalld is not reachable ({:#}), editing on-disk configuration instead",
        live_error
    );
    let store = OfflineStore::open(settings.offline_paths())?;
    Ok(Box::new(store))
}
