// Firewalld State - Zone Settings Cache
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Explicit fetch/commit of permanent zone snapshots.

use tracing::debug;

use crate::error::Result;
use crate::firewall::{FirewallBackend, ZoneHandle};
use crate::models::ZoneSettings;

/// Fetches fresh permanent snapshots and writes them back as one unit.
///
/// Nothing is held between calls. Dropping a snapshot without committing
/// it discards the change.
pub struct ZoneSettingsCache<'a> {
    backend: &'a dyn FirewallBackend,
}

impl<'a> ZoneSettingsCache<'a> {
    pub fn new(backend: &'a dyn FirewallBackend) -> Self {
        Self { backend }
    }

    pub fn get(&self, zone: &str) -> Result<(ZoneHandle, ZoneSettings)> {
        debug!("Fetching permanent settings of zone {}", zone);
        Ok(self.backend.zone_settings(zone)?)
    }

    pub fn commit(&self, handle: &ZoneHandle, settings: &ZoneSettings) -> Result<()> {
        debug!("Committing permanent settings of zone {}", handle.name);
        Ok(self.backend.update_zone_settings(handle, settings)?)
    }

    /// Fetch, apply `change`, commit.
    pub fn modify(&self, zone: &str, change: impl FnOnce(&mut ZoneSettings)) -> Result<()> {
        let (handle, mut settings) = self.get(zone)?;
        change(&mut settings);
        self.commit(&handle, &settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::memory::MemoryBackend;
    use crate::models::ZoneItem;

    #[test]
    fn test_uncommitted_snapshot_is_discarded() {
        let fw = MemoryBackend::new(&["public"]);
        let cache = ZoneSettingsCache::new(&fw);

        let (_handle, mut settings) = cache.get("public").unwrap();
        settings.insert(&ZoneItem::Masquerade);
        drop(settings);

        assert!(!fw.permanent("public").masquerade);
        assert_eq!(fw.commits(), 0);
    }

    #[test]
    fn test_modify_commits_once() {
        let fw = MemoryBackend::new(&["public"]);
        let cache = ZoneSettingsCache::new(&fw);

        cache
            .modify("public", |s| s.insert(&ZoneItem::Service("ssh".into())))
            .unwrap();

        assert_eq!(fw.permanent("public").services, vec!["ssh"]);
        assert_eq!(fw.commits(), 1);
    }

    #[test]
    fn test_unknown_zone_propagates() {
        let fw = MemoryBackend::new(&["public"]);
        let cache = ZoneSettingsCache::new(&fw);
        assert!(cache.get("nope").is_err());
        assert!(cache.modify("nope", |_| {}).is_err());
    }
}
