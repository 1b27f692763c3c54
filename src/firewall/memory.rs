// Firewalld State - In-Memory Backend
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! A fake firewalld with separate runtime and permanent zone maps.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use anyhow::{bail, Result};

use super::{FirewallBackend, ZoneHandle};
use crate::models::{ZoneItem, ZoneSettings};

pub struct MemoryBackend {
    offline: bool,
    default_zone: String,
    runtime: RefCell<HashMap<String, ZoneSettings>>,
    permanent: RefCell<HashMap<String, ZoneSettings>>,
    /// Last runtime lease per item, as passed to `add_runtime`.
    leases: RefCell<HashMap<String, u32>>,
    runtime_writes: Cell<usize>,
    commits: Cell<usize>,
}

impl MemoryBackend {
    /// A running daemon with the given zones, all empty in both layers.
    pub fn new(zones: &[&str]) -> Self {
        let zones: HashMap<String, ZoneSettings> = zones
            .iter()
            .map(|z| (z.to_string(), ZoneSettings::default()))
            .collect();
        Self {
            offline: false,
            default_zone: "public".to_string(),
            runtime: RefCell::new(zones.clone()),
            permanent: RefCell::new(zones),
            leases: RefCell::new(HashMap::new()),
            runtime_writes: Cell::new(0),
            commits: Cell::new(0),
        }
    }

    /// Same zones, but only the permanent layer is reachable.
    pub fn offline(zones: &[&str]) -> Self {
        Self {
            offline: true,
            ..Self::new(zones)
        }
    }

    pub fn runtime(&self, zone: &str) -> ZoneSettings {
        self.runtime.borrow().get(zone).cloned().unwrap_or_default()
    }

    pub fn permanent(&self, zone: &str) -> ZoneSettings {
        self.permanent.borrow().get(zone).cloned().unwrap_or_default()
    }

    pub fn has_permanent_zone(&self, zone: &str) -> bool {
        self.permanent.borrow().contains_key(zone)
    }

    /// Put `item` straight into the runtime layer.
    pub fn seed_runtime(&self, zone: &str, item: &ZoneItem) {
        self.runtime.borrow_mut().entry(zone.to_string()).or_default().insert(item);
    }

    /// Put `item` straight into the permanent layer.
    pub fn seed_permanent(&self, zone: &str, item: &ZoneItem) {
        self.permanent.borrow_mut().entry(zone.to_string()).or_default().insert(item);
    }

    pub fn lease(&self, item: &ZoneItem) -> Option<u32> {
        self.leases.borrow().get(&item.to_string()).copied()
    }

    pub fn runtime_writes(&self) -> usize {
        self.runtime_writes.get()
    }

    pub fn commits(&self) -> usize {
        self.commits.get()
    }

    fn runtime_zone<'a>(
        zones: &'a mut HashMap<String, ZoneSettings>,
        zone: &str,
    ) -> Result<&'a mut ZoneSettings> {
        match zones.get_mut(zone) {
            Some(settings) => Ok(settings),
            None => bail!("INVALID_ZONE: {}", zone),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.offline {
            bail!("firewalld is not running");
        }
        Ok(())
    }
}

impl FirewallBackend for MemoryBackend {
    fn is_offline(&self) -> bool {
        self.offline
    }

    fn default_zone(&self) -> Result<String> {
        Ok(self.default_zone.clone())
    }

    fn query_runtime(&self, zone: &str, item: &ZoneItem) -> Result<bool> {
        self.ensure_running()?;
        let mut zones = self.runtime.borrow_mut();
        Ok(Self::runtime_zone(&mut zones, zone)?.contains(item))
    }

    fn add_runtime(&self, zone: &str, item: &ZoneItem, timeout: u32) -> Result<()> {
        self.ensure_running()?;
        let mut zones = self.runtime.borrow_mut();
        Self::runtime_zone(&mut zones, zone)?;

        // firewalld moves an interface out of whatever zone held it
        if let ZoneItem::Interface(_) = item {
            for (name, settings) in zones.iter_mut() {
                if name != zone {
                    settings.remove(item);
                }
            }
        }
        Self::runtime_zone(&mut zones, zone)?.insert(item);

        self.leases.borrow_mut().insert(item.to_string(), timeout);
        self.runtime_writes.set(self.runtime_writes.get() + 1);
        Ok(())
    }

    fn remove_runtime(&self, zone: &str, item: &ZoneItem) -> Result<()> {
        self.ensure_running()?;
        let mut zones = self.runtime.borrow_mut();
        Self::runtime_zone(&mut zones, zone)?.remove(item);
        self.runtime_writes.set(self.runtime_writes.get() + 1);
        Ok(())
    }

    fn zone_settings(&self, zone: &str) -> Result<(ZoneHandle, ZoneSettings)> {
        let Some(settings) = self.permanent.borrow().get(zone).cloned() else {
            bail!("INVALID_ZONE: {}", zone);
        };
        let handle = ZoneHandle {
            name: zone.to_string(),
            locator: format!("memory:{}", zone),
        };
        Ok((handle, settings))
    }

    fn update_zone_settings(&self, handle: &ZoneHandle, settings: &ZoneSettings) -> Result<()> {
        let mut zones = self.permanent.borrow_mut();
        let Some(slot) = zones.get_mut(&handle.name) else {
            bail!("INVALID_ZONE: {}", handle.name);
        };
        *slot = settings.clone();
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn list_zones(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.permanent.borrow().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn add_zone(&self, name: &str, settings: &ZoneSettings) -> Result<()> {
        let mut zones = self.permanent.borrow_mut();
        if zones.contains_key(name) {
            bail!("NAME_CONFLICT: {}", name);
        }
        zones.insert(name.to_string(), settings.clone());
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn remove_zone(&self, name: &str) -> Result<()> {
        if self.permanent.borrow_mut().remove(name).is_none() {
            bail!("INVALID_ZONE: {}", name);
        }
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn permanent_zones_of_interface(&self, interface: &str) -> Result<Vec<String>> {
        let item = ZoneItem::Interface(interface.to_string());
        let mut owners: Vec<String> = self
            .permanent
            .borrow()
            .iter()
            .filter(|(_, settings)| settings.contains(&item))
            .map(|(name, _)| name.clone())
            .collect();
        owners.sort();
        Ok(owners)
    }
}
