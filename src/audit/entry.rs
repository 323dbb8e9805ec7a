//! Log entry data structures
//!
//! A `LogEntry` is written once, when a qualifying change is found, and never
//! updated afterwards. It points at the audited record by type and primary
//! key and stores the old/new payloads as JSON text.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::diff::format_value;
use super::logger::LogSink;
use crate::models::{Auditable, LogEntryId, PrimaryKey};

/// What happened to the record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Title {
    Create,
    Update,
    Delete,
    /// Caller-supplied label
    Custom(String),
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Title::Create => write!(f, "Create"),
            Title::Update => write!(f, "Update"),
            Title::Delete => write!(f, "Delete"),
            Title::Custom(label) => write!(f, "{}", label),
        }
    }
}

impl From<String> for Title {
    fn from(label: String) -> Self {
        match label.trim() {
            "Create" => Title::Create,
            "Update" => Title::Update,
            "Delete" => Title::Delete,
            _ => Title::Custom(label),
        }
    }
}

impl From<&str> for Title {
    fn from(label: &str) -> Self {
        Title::from(label.to_string())
    }
}

impl From<Title> for String {
    fn from(title: Title) -> Self {
        title.to_string()
    }
}

/// Encode an address for the integer `ip` column
///
/// IPv4-mapped IPv6 addresses are unwrapped; other IPv6 addresses have no
/// integer form.
pub fn encode_ip(addr: IpAddr) -> Option<u32> {
    match addr {
        IpAddr::V4(v4) => Some(u32::from(v4)),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(u32::from),
    }
}

/// Integer form of the client address, falling back to `default`
///
/// An address with no integer form is stored as null.
pub fn resolve_ip(client_ip: Option<IpAddr>, default: Ipv4Addr) -> Option<u32> {
    client_ip.map_or(Some(u32::from(default)), encode_ip)
}

/// A stored payload read back from the log
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    /// No payload was stored
    Empty,
    /// Key/value payload
    Structured(Map<String, Value>),
    /// Text that could not be decoded either way
    Raw(String),
}

impl DecodedPayload {
    /// Decode stored text: JSON object first, then the legacy
    /// `key: value` line format
    pub fn decode(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return DecodedPayload::Empty;
        };

        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
            return DecodedPayload::Structured(map);
        }

        warn!(
            payload_len = text.len(),
            "Log payload is not a JSON object, using legacy decoding"
        );

        match decode_legacy(text) {
            Some(map) => DecodedPayload::Structured(map),
            None => DecodedPayload::Raw(text.to_string()),
        }
    }

    /// Value stored for `key`, if the payload is structured
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            DecodedPayload::Structured(map) => map.get(key),
            _ => None,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            DecodedPayload::Structured(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// `key: value` per line; values that parse as JSON keep their type
fn decode_legacy(text: &str) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let (key, value) = line.split_once(':')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Old and new value of one logged field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// A single change log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Generated identifier
    pub id: LogEntryId,

    /// Action kind or caller-supplied label
    pub title: Title,

    /// JSON payload of the old values
    pub old_message: Option<String>,

    /// JSON payload of the new values
    pub new_message: Option<String>,

    /// Integer-encoded IPv4 address of the originating client
    pub ip: Option<u32>,

    /// Primary key of the audited record
    pub entity_id: PrimaryKey,

    /// Type of the audited record
    pub entity_key: String,

    /// When the entry was written (UTC)
    pub date: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        title: Title,
        entity_key: impl Into<String>,
        entity_id: PrimaryKey,
        old_message: Option<String>,
        new_message: Option<String>,
        ip: Option<u32>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            title,
            old_message,
            new_message,
            ip,
            entity_id,
            entity_key: entity_key.into(),
            date: Utc::now(),
        }
    }

    /// Build an entry from a precomputed message, bypassing the diff
    ///
    /// For any title other than `Create` the old payload mirrors every key
    /// of the message with a null value.
    pub fn from_message<R: Auditable>(message: &Map<String, Value>, entity: &R, title: Title) -> Self {
        let old_message = if title == Title::Create {
            None
        } else {
            let nulls: Map<String, Value> = message.keys().map(|k| (k.clone(), Value::Null)).collect();
            Some(Value::Object(nulls).to_string())
        };

        Self::new(
            title,
            entity.entity_key(),
            entity.primary_key(),
            old_message,
            Some(Value::Object(message.clone()).to_string()),
            None,
        )
    }

    /// Builder-style setter for the client address
    pub fn with_ip(mut self, ip: Option<u32>) -> Self {
        self.ip = ip;
        self
    }

    /// Decoded client address
    pub fn client_ip(&self) -> Option<Ipv4Addr> {
        self.ip.map(Ipv4Addr::from)
    }

    pub fn old_payload(&self) -> DecodedPayload {
        DecodedPayload::decode(self.old_message.as_deref())
    }

    pub fn new_payload(&self) -> DecodedPayload {
        DecodedPayload::decode(self.new_message.as_deref())
    }

    /// Per-field old/new pairs, new-payload keys first
    pub fn changes(&self) -> Vec<FieldChange> {
        let old = self.old_payload();
        let new = self.new_payload();

        let mut keys = new.keys();
        for key in old.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        keys.into_iter()
            .map(|key| FieldChange {
                old: old.get(&key).cloned(),
                new: new.get(&key).cloned(),
                key,
            })
            .collect()
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.date.format("%Y-%m-%d %H:%M:%S UTC"),
            self.title,
            self.entity_key,
            self.entity_id
        );

        if let Some(ip) = self.client_ip() {
            output.push_str(&format!(" from {}", ip));
        }

        for change in self.changes() {
            let old = change.old.as_ref().map(format_value).unwrap_or_else(|| "(none)".into());
            let new = change.new.as_ref().map(format_value).unwrap_or_else(|| "(none)".into());
            output.push_str(&format!("\n  {}: {} -> {}", change.key, old, new));
        }

        output
    }
}

/// Write a precomputed message for `entity` straight to `sink`
///
/// The entry carries `client_ip`, or `default_client_ip` when the caller has
/// no address. Returns whether the entry was saved; failures are logged, not
/// raised.
pub fn add_to_log<R: Auditable>(
    sink: &dyn LogSink,
    message: &Map<String, Value>,
    entity: &R,
    title: Title,
    client_ip: Option<IpAddr>,
    default_client_ip: Ipv4Addr,
) -> bool {
    let entry = LogEntry::from_message(message, entity, title)
        .with_ip(resolve_ip(client_ip, default_client_ip));
    match sink.save_log_entry(&entry) {
        Ok(()) => true,
        Err(e) => {
            warn!(entity_key = %entry.entity_key, entity_id = %entry.entity_id, error = %e, "Failed to save log entry");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::logger::MemoryLogStore;
    use crate::error::{AuditError, AuditResult};
    use crate::models::DynamicRecord;
    use serde_json::json;

    fn message(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("message fixtures must be objects"),
        }
    }

    struct FailingSink;

    impl LogSink for FailingSink {
        fn save_log_entry(&self, _entry: &LogEntry) -> AuditResult<()> {
            Err(AuditError::Persistence("read-only".into()))
        }
    }

    #[test]
    fn test_title_display_and_parse() {
        assert_eq!(Title::Create.to_string(), "Create");
        assert_eq!(Title::from("Delete"), Title::Delete);
        assert_eq!(Title::from("Create "), Title::Create);
        assert_eq!(Title::from("Approve"), Title::Custom("Approve".into()));
    }

    #[test]
    fn test_title_serializes_as_string() {
        assert_eq!(serde_json::to_string(&Title::Update).unwrap(), "\"Update\"");
        let parsed: Title = serde_json::from_str("\"Archive\"").unwrap();
        assert_eq!(parsed, Title::Custom("Archive".into()));
    }

    #[test]
    fn test_encode_ip() {
        assert_eq!(encode_ip("127.0.0.1".parse().unwrap()), Some(2130706433));
        assert_eq!(encode_ip("::ffff:10.0.0.1".parse().unwrap()), Some(167772161));
        assert_eq!(encode_ip("2001:db8::1".parse().unwrap()), None);
    }

    #[test]
    fn test_client_ip_round_trip() {
        let entry = LogEntry::new(Title::Update, "User", PrimaryKey::Int(1), None, None, None)
            .with_ip(encode_ip("192.168.1.20".parse().unwrap()));
        assert_eq!(entry.client_ip(), Some(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn test_from_message_create() {
        let user = DynamicRecord::new("User", 5);
        let entry = LogEntry::from_message(&message(json!({"name": "Alice"})), &user, Title::Create);

        assert_eq!(entry.entity_key, "User");
        assert_eq!(entry.entity_id, PrimaryKey::Int(5));
        assert!(entry.old_message.is_none());
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"name":"Alice"}"#));
    }

    #[test]
    fn test_from_message_non_create_mirrors_nulls() {
        let user = DynamicRecord::new("User", 5);
        let entry = LogEntry::from_message(
            &message(json!({"name": "Alice", "age": 3})),
            &user,
            Title::Update,
        );

        assert_eq!(
            entry.old_message.as_deref(),
            Some(r#"{"name":null,"age":null}"#)
        );
    }

    #[test]
    fn test_add_to_log() {
        let store = MemoryLogStore::new();
        let user = DynamicRecord::new("User", 1);

        assert!(add_to_log(
            &store,
            &message(json!({"a": 1})),
            &user,
            Title::Create,
            None,
            Ipv4Addr::LOCALHOST
        ));
        assert_eq!(store.entries().len(), 1);

        assert!(!add_to_log(
            &FailingSink,
            &message(json!({"a": 1})),
            &user,
            Title::Create,
            None,
            Ipv4Addr::LOCALHOST
        ));
    }

    #[test]
    fn test_add_to_log_client_ip() {
        let store = MemoryLogStore::new();
        let user = DynamicRecord::new("User", 1);
        let msg = message(json!({"a": 1}));

        add_to_log(&store, &msg, &user, Title::Update, None, Ipv4Addr::LOCALHOST);
        add_to_log(
            &store,
            &msg,
            &user,
            Title::Update,
            Some("10.0.0.7".parse().unwrap()),
            Ipv4Addr::LOCALHOST,
        );
        add_to_log(
            &store,
            &msg,
            &user,
            Title::Update,
            Some("2001:db8::1".parse().unwrap()),
            Ipv4Addr::LOCALHOST,
        );

        let entries = store.entries();
        assert_eq!(entries[0].ip, Some(u32::from(Ipv4Addr::LOCALHOST)));
        assert_eq!(entries[1].client_ip(), Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(entries[2].ip, None);
    }

    #[test]
    fn test_decode_json_payload() {
        let decoded = DecodedPayload::decode(Some(r#"{"age":30}"#));
        assert_eq!(decoded.get("age"), Some(&json!(30)));
        assert_eq!(DecodedPayload::decode(None), DecodedPayload::Empty);
    }

    #[test]
    fn test_decode_legacy_payload() {
        let decoded = DecodedPayload::decode(Some("name: Alice\nage: 30\n"));
        assert_eq!(decoded.get("name"), Some(&json!("Alice")));
        assert_eq!(decoded.get("age"), Some(&json!(30)));
    }

    #[test]
    fn test_decode_undecodable_payload_kept_raw() {
        let decoded = DecodedPayload::decode(Some("not a payload"));
        assert_eq!(decoded, DecodedPayload::Raw("not a payload".into()));
    }

    #[test]
    fn test_changes_pairs_old_and_new() {
        let entry = LogEntry::new(
            Title::Update,
            "User",
            PrimaryKey::Int(1),
            Some(r#"{"age":30,"nick":"al"}"#.into()),
            Some(r#"{"age":31}"#.into()),
            None,
        );

        let changes = entry.changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].key, "age");
        assert_eq!(changes[0].old, Some(json!(30)));
        assert_eq!(changes[0].new, Some(json!(31)));
        assert_eq!(changes[1].key, "nick");
        assert_eq!(changes[1].new, None);
    }

    #[test]
    fn test_serialization() {
        let entry = LogEntry::new(
            Title::Delete,
            "User",
            PrimaryKey::Int(9),
            Some("{}".into()),
            None,
            Some(1),
        );

        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, entry);
    }

    #[test]
    fn test_human_readable_format() {
        let entry = LogEntry::new(
            Title::Update,
            "User",
            PrimaryKey::Int(12),
            Some(r#"{"age":30}"#.into()),
            Some(r#"{"age":31}"#.into()),
            encode_ip("10.1.2.3".parse().unwrap()),
        );

        let formatted = entry.format_human_readable();
        assert!(formatted.contains("Update User 12"));
        assert!(formatted.contains("from 10.1.2.3"));
        assert!(formatted.contains("age: 30 -> 31"));
    }
}
