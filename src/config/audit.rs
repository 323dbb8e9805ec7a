//! Runtime configuration handed to each recorder

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use super::settings::{EqualityPolicy, Settings};
use crate::audit::snapshot::BOOKKEEPING_KEYS;
use crate::error::{AuditError, AuditResult};
use crate::models::{AttributeValue, Attributes};

/// Caller-supplied gate evaluated when a save or delete completes;
/// returning false vetoes logging
pub type Trigger = Arc<dyn Fn() -> bool + Send + Sync>;

/// Recorder configuration
#[derive(Clone)]
pub struct AuditConfig {
    pub trigger: Option<Trigger>,
    pub include_relations: bool,
    /// Virtual attributes merged into every after-snapshot
    pub custom_attributes: Attributes,
    pub denylist: BTreeSet<String>,
    pub truncation_limit: usize,
    pub equality: EqualityPolicy,
    pub default_client_ip: Ipv4Addr,
}

impl AuditConfig {
    /// Build from persisted settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            trigger: None,
            include_relations: settings.include_relations,
            custom_attributes: Attributes::new(),
            denylist: settings.denylist.clone(),
            truncation_limit: settings.truncation_limit,
            equality: settings.equality,
            default_client_ip: settings.default_client_ip,
        }
    }

    pub fn with_trigger<F>(mut self, trigger: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.trigger = Some(Arc::new(trigger));
        self
    }

    pub fn with_relations(mut self, include: bool) -> Self {
        self.include_relations = include;
        self
    }

    /// Register a virtual attribute
    ///
    /// # Errors
    ///
    /// Fails if the name is blank or reserved.
    pub fn with_custom_attribute(
        mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> AuditResult<Self> {
        validate_attribute_name(name)?;
        self.custom_attributes.insert(name, value);
        Ok(self)
    }

    pub fn with_denylist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_truncation_limit(mut self, limit: usize) -> Self {
        self.truncation_limit = limit;
        self
    }

    pub fn with_equality(mut self, equality: EqualityPolicy) -> Self {
        self.equality = equality;
        self
    }

    /// Whether the trigger (if any) allows logging
    pub fn trigger_allows(&self) -> bool {
        self.trigger.as_ref().map_or(true, |trigger| trigger())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("trigger", &self.trigger.as_ref().map(|_| "<fn>"))
            .field("include_relations", &self.include_relations)
            .field("custom_attributes", &self.custom_attributes)
            .field("denylist", &self.denylist)
            .field("truncation_limit", &self.truncation_limit)
            .field("equality", &self.equality)
            .field("default_client_ip", &self.default_client_ip)
            .finish()
    }
}

/// Reject names that cannot key a snapshot entry
pub(crate) fn validate_attribute_name(name: &str) -> AuditResult<()> {
    if name.trim().is_empty() {
        return Err(AuditError::Validation(
            "Custom attribute name must be a non-empty string".into(),
        ));
    }
    if BOOKKEEPING_KEYS.contains(&name) {
        return Err(AuditError::Validation(format!(
            "Custom attribute name '{}' is reserved",
            name
        )));
    }
    Ok(())
}
