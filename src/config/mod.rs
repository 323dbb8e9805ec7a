//! Configuration module for changeslog
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Persisted audit settings (denylist, truncation, gating)
//! - The runtime `AuditConfig` handed to each recorder

pub mod audit;
pub mod paths;
pub mod settings;

pub use audit::{AuditConfig, Trigger};
pub use paths::ChangeslogPaths;
pub use settings::{EqualityPolicy, Settings};
