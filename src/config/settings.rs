//! Persisted settings for changeslog
//!
//! Controls which fields are redacted, how long stored values may grow,
//! which routed actions skip capture, and how values are compared.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::paths::ChangeslogPaths;
use crate::error::AuditError;

/// How two scalar attribute values are compared when diffing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EqualityPolicy {
    /// Type-coercing comparison compatible with existing logs
    /// (`0 == ""`, `"1" == 1`, `null == false`)
    #[default]
    Loose,
    /// Exact JSON value equality
    Strict,
}

/// User settings for changeslog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Longest string (in characters) stored in a payload before it is clipped
    #[serde(default = "default_truncation_limit")]
    pub truncation_limit: usize,

    /// Attribute names never written to the log
    #[serde(default = "default_denylist")]
    pub denylist: BTreeSet<String>,

    /// Whether declared relations are captured alongside attributes
    #[serde(default)]
    pub include_relations: bool,

    /// Routed actions for which no before-snapshot is captured
    #[serde(default = "default_bypassed_actions")]
    pub bypassed_actions: BTreeSet<String>,

    /// Scalar comparison rule used by the diff
    #[serde(default)]
    pub equality: EqualityPolicy,

    /// Address recorded when the request carries none
    #[serde(default = "default_client_ip")]
    pub default_client_ip: Ipv4Addr,
}

fn default_schema_version() -> u32 {
    1
}

fn default_truncation_limit() -> usize {
    4000
}

fn default_denylist() -> BTreeSet<String> {
    ["password", "password_confirmation"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_bypassed_actions() -> BTreeSet<String> {
    std::iter::once("index".to_string()).collect()
}

fn default_client_ip() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            truncation_limit: default_truncation_limit(),
            denylist: default_denylist(),
            include_relations: false,
            bypassed_actions: default_bypassed_actions(),
            equality: EqualityPolicy::default(),
            default_client_ip: default_client_ip(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &ChangeslogPaths) -> Result<Self, AuditError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| AuditError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                AuditError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &ChangeslogPaths) -> Result<(), AuditError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AuditError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| AuditError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
