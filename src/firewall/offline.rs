// Firewalld State - Offline Store
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Direct access to firewalld's on-disk zone files, used when the daemon
//! is not running.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::zone_xml::{parse_zone, write_zone};
use super::{FirewallBackend, ZoneHandle};
use crate::models::{ZoneItem, ZoneSettings};

/// Zone used when `firewalld.conf` names none.
const FALLBACK_DEFAULT_ZONE: &str = "public";

const MAX_ZONE_NAME_LEN: usize = 17;

/// Where firewalld keeps its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflinePaths {
    /// Zones shipped with firewalld.
    pub system_zones_dir: PathBuf,
    /// Admin zones and overrides of shipped zones.
    pub user_zones_dir: PathBuf,
    pub firewalld_conf: PathBuf,
}

impl Default for OfflinePaths {
    fn default() -> Self {
        Self {
            system_zones_dir: PathBuf::from("/usr/lib/firewalld/zones"),
            user_zones_dir: PathBuf::from("/etc/firewalld/zones"),
            firewalld_conf: PathBuf::from("/etc/firewalld/firewalld.conf"),
        }
    }
}

/// Zone store backed by the zone XML files.
pub struct OfflineStore {
    paths: OfflinePaths,
}

/// Path of a zone's XML file. The name never leaves `dir`.
fn zone_file(dir: &Path, name: &str) -> Result<PathBuf> {
    validate_zone_name(name)?;
    Ok(dir.join(format!("{}.xml", name)))
}

fn read_zone(path: &Path) -> Result<ZoneSettings> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("Failed to read zone file {}", path.display()))?;
    parse_zone(&xml).with_context(|| format!("Failed to parse zone file {}", path.display()))
}

/// Names firewalld accepts for zone files.
fn validate_zone_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_ZONE_NAME_LEN {
        bail!(
            "Invalid zone name '{}': must be 1 to {} characters",
            name,
            MAX_ZONE_NAME_LEN
        );
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        bail!(
            "Invalid zone name '{}': only letters, digits, '-' and '_' are allowed",
            name
        );
    }
    Ok(())
}

impl OfflineStore {
    pub fn open(paths: OfflinePaths) -> Result<Self> {
        if !paths.system_zones_dir.is_dir() && !paths.user_zones_dir.is_dir() {
            bail!(
                "No firewalld configuration found in {} or {}",
                paths.system_zones_dir.display(),
                paths.user_zones_dir.display()
            );
        }

        info!(
            "Using on-disk firewalld configuration ({})",
            paths.user_zones_dir.display()
        );
        Ok(Self { paths })
    }

    /// The file a zone is currently loaded from. User copies shadow shipped ones.
    fn locate(&self, name: &str) -> Result<Option<PathBuf>> {
        for dir in [&self.paths.user_zones_dir, &self.paths.system_zones_dir] {
            let path = zone_file(dir, name)?;
            if path.is_file() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn is_builtin(&self, name: &str) -> Result<bool> {
        Ok(zone_file(&self.paths.system_zones_dir, name)?.is_file())
    }

    /// Atomically replace the user copy of a zone.
    fn store(&self, name: &str, settings: &ZoneSettings) -> Result<PathBuf> {
        let dir = &self.paths.user_zones_dir;
        let target = zone_file(dir, name)?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let xml = write_zone(settings)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
        tmp.write_all(xml.as_bytes())?;
        tmp.as_file().sync_all()?;

        tmp.persist(&target)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        debug!("Wrote {}", target.display());
        Ok(target)
    }

    fn zone_names_in(dir: &Path, names: &mut BTreeSet<String>) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        let entries =
            fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match validate_zone_name(stem) {
                Ok(()) => {
                    names.insert(stem.to_string());
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl FirewallBackend for OfflineStore {
    fn is_offline(&self) -> bool {
        true
    }

    fn default_zone(&self) -> Result<String> {
        let conf = match fs::read_to_string(&self.paths.firewalld_conf) {
            Ok(conf) => conf,
            Err(e) => {
                debug!(
                    "Cannot read {} ({}), assuming default zone {}",
                    self.paths.firewalld_conf.display(),
                    e,
                    FALLBACK_DEFAULT_ZONE
                );
                return Ok(FALLBACK_DEFAULT_ZONE.to_string());
            }
        };

        let zone = conf
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with('#'))
            .find_map(|line| line.strip_prefix("DefaultZone="))
            .map(str::trim)
            .filter(|zone| !zone.is_empty())
            .unwrap_or(FALLBACK_DEFAULT_ZONE);
        Ok(zone.to_string())
    }

    fn query_runtime(&self, _zone: &str, _item: &ZoneItem) -> Result<bool> {
        bail!("firewalld is not running, the runtime layer cannot be queried")
    }

    fn add_runtime(&self, _zone: &str, _item: &ZoneItem, _timeout: u32) -> Result<()> {
        bail!("firewalld is not running, the runtime layer cannot be changed")
    }

    fn remove_runtime(&self, _zone: &str, _item: &ZoneItem) -> Result<()> {
        bail!("firewalld is not running, the runtime layer cannot be changed")
    }

    fn zone_settings(&self, zone: &str) -> Result<(ZoneHandle, ZoneSettings)> {
        let Some(path) = self.locate(zone)? else {
            bail!("Zone '{}' does not exist", zone);
        };
        let settings = read_zone(&path)?;

        let handle = ZoneHandle {
            name: zone.to_string(),
            locator: zone_file(&self.paths.user_zones_dir, zone)?
                .display()
                .to_string(),
        };
        Ok((handle, settings))
    }

    fn update_zone_settings(&self, handle: &ZoneHandle, settings: &ZoneSettings) -> Result<()> {
        self.store(&handle.name, settings)?;
        info!("Updated on-disk settings of zone {}", handle.name);
        Ok(())
    }

    fn list_zones(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        Self::zone_names_in(&self.paths.system_zones_dir, &mut names)?;
        Self::zone_names_in(&self.paths.user_zones_dir, &mut names)?;
        Ok(names.into_iter().collect())
    }

    fn add_zone(&self, name: &str, settings: &ZoneSettings) -> Result<()> {
        if self.locate(name)?.is_some() {
            bail!("Zone '{}' already exists", name);
        }

        self.store(name, settings)?;
        info!("Added on-disk zone {}", name);
        Ok(())
    }

    fn remove_zone(&self, name: &str) -> Result<()> {
        if self.is_builtin(name)? {
            bail!("Zone '{}' is a builtin zone and cannot be removed", name);
        }

        let path = zone_file(&self.paths.user_zones_dir, name)?;
        if !path.is_file() {
            bail!("Zone '{}' does not exist", name);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;

        info!("Removed on-disk zone {}", name);
        Ok(())
    }

    fn permanent_zones_of_interface(&self, interface: &str) -> Result<Vec<String>> {
        let mut owners = Vec::new();
        for zone in self.list_zones()? {
            let Some(path) = self.locate(&zone)? else {
                continue;
            };
            if read_zone(&path)?.interfaces.iter().any(|i| i == interface) {
                owners.push(zone);
            }
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PUBLIC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<zone>
  <short>Public</short>
  <service name="ssh"/>
</zone>
"#;

    fn store_with(system: &[(&str, &str)], conf: Option<&str>) -> (TempDir, OfflineStore) {
        let root = tempfile::tempdir().unwrap();
        let paths = OfflinePaths {
            system_zones_dir: root.path().join("lib/zones"),
            user_zones_dir: root.path().join("etc/zones"),
            firewalld_conf: root.path().join("etc/firewalld.conf"),
        };
        fs::create_dir_all(&paths.system_zones_dir).unwrap();
        for (name, xml) in system {
            fs::write(zone_file(&paths.system_zones_dir, name).unwrap(), xml).unwrap();
        }
        if let Some(conf) = conf {
            fs::create_dir_all(root.path().join("etc")).unwrap();
            fs::write(&paths.firewalld_conf, conf).unwrap();
        }
        let store = OfflineStore::open(paths).unwrap();
        (root, store)
    }

    #[test]
    fn test_default_zone_from_conf() {
        let (_root, store) = store_with(&[], Some("# comment\nDefaultZone=home\nLogDenied=off\n"));
        assert_eq!(store.default_zone().unwrap(), "home");

        let (_root, store) = store_with(&[], Some("DefaultZone=\n"));
        assert_eq!(store.default_zone().unwrap(), "public");

        let (_root, store) = store_with(&[], None);
        assert_eq!(store.default_zone().unwrap(), "public");
    }

    #[test]
    fn test_update_writes_user_copy() {
        let (root, store) = store_with(&[("public", PUBLIC)], None);

        let (handle, mut settings) = store.zone_settings("public").unwrap();
        assert_eq!(settings.services, vec!["ssh"]);
        settings.services.push("http".into());
        store.update_zone_settings(&handle, &settings).unwrap();

        // shipped file untouched, user copy now wins
        let shipped = fs::read_to_string(root.path().join("lib/zones/public.xml")).unwrap();
        assert_eq!(shipped, PUBLIC);
        assert!(root.path().join("etc/zones/public.xml").is_file());
        assert_eq!(store.zone_settings("public").unwrap().1.services, vec!["ssh", "http"]);
        assert_eq!(store.list_zones().unwrap(), vec!["public"]);
    }

    #[test]
    fn test_add_and_remove_zone() {
        let (_root, store) = store_with(&[("public", PUBLIC)], None);

        store.add_zone("lab", &ZoneSettings::default()).unwrap();
        assert_eq!(store.list_zones().unwrap(), vec!["lab", "public"]);
        assert!(store.add_zone("lab", &ZoneSettings::default()).is_err());

        store.remove_zone("lab").unwrap();
        assert_eq!(store.list_zones().unwrap(), vec!["public"]);
        assert!(store.remove_zone("lab").is_err());
        assert!(store.remove_zone("public").is_err());
    }

    #[test]
    fn test_zone_name_rules() {
        assert!(validate_zone_name("dmz_2").is_ok());
        assert!(validate_zone_name("a-very-long-zone-name").is_err());
        assert!(validate_zone_name("bad/name").is_err());
        assert!(validate_zone_name("").is_err());
    }

    #[test]
    fn test_zone_names_stay_inside_zone_dirs() {
        let (root, store) = store_with(&[("public", PUBLIC)], None);
        let outside = root.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("victim.xml"), "<zone/>").unwrap();

        let escape = "../../outside/victim";
        assert!(store.zone_settings(escape).is_err());
        assert!(store.add_zone(escape, &ZoneSettings::default()).is_err());
        assert!(store.remove_zone(escape).is_err());
        let handle = ZoneHandle { name: escape.into(), locator: String::new() };
        assert!(store.update_zone_settings(&handle, &ZoneSettings::default()).is_err());

        assert_eq!(fs::read_to_string(outside.join("victim.xml")).unwrap(), "<zone/>");
        assert!(outside.join("victim.xml").is_file());
    }

    #[test]
    fn test_stray_files_are_not_zones() {
        let (root, store) = store_with(&[("public", PUBLIC)], None);
        fs::write(root.path().join("lib/zones/not a zone.xml"), PUBLIC).unwrap();
        assert_eq!(store.list_zones().unwrap(), vec!["public"]);
    }

    #[test]
    fn test_interface_owners_scan_all_zones() {
        let with_eth0 = r#"<zone><interface name="eth0"/></zone>"#;
        let (_root, store) = store_with(&[("a", with_eth0), ("b", with_eth0), ("c", PUBLIC)], None);

        assert_eq!(store.permanent_zones_of_interface("eth0").unwrap(), vec!["a", "b"]);
        assert!(store.permanent_zones_of_interface("eth1").unwrap().is_empty());
    }

    #[test]
    fn test_runtime_layer_unavailable() {
        let (_root, store) = store_with(&[("public", PUBLIC)], None);
        assert!(store.is_offline());
        assert!(store.query_runtime("public", &ZoneItem::Masquerade).is_err());
        assert!(store.add_runtime("public", &ZoneItem::Masquerade, 0).is_err());
    }

    #[test]
    fn test_open_requires_config_dirs() {
        let root = tempfile::tempdir().unwrap();
        let paths = OfflinePaths {
            system_zones_dir: root.path().join("missing-a"),
            user_zones_dir: root.path().join("missing-b"),
            firewalld_conf: root.path().join("firewalld.conf"),
        };
        assert!(OfflineStore::open(paths).is_err());
    }
}
