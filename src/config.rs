// Firewalld State - Configuration
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Tool settings loaded from a local JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::firewall::OfflinePaths;

/// Settings file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Zones shipped with firewalld.
    #[serde(default = "default_system_zones_dir")]
    pub system_zones_dir: PathBuf,
    /// Admin zone directory, written to in offline mode.
    #[serde(default = "default_user_zones_dir")]
    pub user_zones_dir: PathBuf,
    /// Daemon configuration holding `DefaultZone=`.
    #[serde(default = "default_firewalld_conf")]
    pub firewalld_conf: PathBuf,
}

fn default_log_filter() -> String { "warn".to_string() }
fn default_system_zones_dir() -> PathBuf { OfflinePaths::default().system_zones_dir }
fn default_user_zones_dir() -> PathBuf { OfflinePaths::default().user_zones_dir }
fn default_firewalld_conf() -> PathBuf { OfflinePaths::default().firewalld_conf }

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            system_zones_dir: default_system_zones_dir(),
            user_zones_dir: default_user_zones_dir(),
            firewalld_conf: default_firewalld_conf(),
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firewalld-state")
            .join("settings.json")
    }

    /// Load settings from `path`, or from the default location.
    ///
    /// A missing file gives the defaults. An unreadable or invalid file is
    /// reported and also gives the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !path.exists() {
            debug!("No settings file at {}", path.display());
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Failed to parse settings {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Locations used by the offline zone store.
    pub fn offline_paths(&self) -> OfflinePaths {
        OfflinePaths {
            system_zones_dir: self.system_zones_dir.clone(),
            user_zones_dir: self.user_zones_dir.clone(),
            firewalld_conf: self.firewalld_conf.clone(),
        }
    }
}
