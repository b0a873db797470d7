//! Core data model.
//!
//! A field record is one observation: a named quantity, its value, and where
//! it was taken. Chat messages and activity log entries are the audit side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Newtype for field record IDs. Generated by the store at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 chars of the UUID, for listings.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of an authenticated user. Owns records and log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Field Record
// ---------------------------------------------------------------------------

/// One field observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: RecordId,
    /// Name of the measured quantity (e.g. "Soil Temperature").
    pub field: String,
    /// The measurement or observation itself.
    pub value: String,
    /// Free-form place description or a "lat, lon" string.
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub owner: UserId,
}

/// Builder for a record that has not been stored yet.
///
/// The owner comes from the session at insertion, never from the caller.
#[derive(Debug, Clone)]
pub struct NewFieldRecord {
    pub(crate) field: String,
    pub(crate) value: String,
    pub(crate) location: String,
    pub(crate) timestamp: Option<DateTime<Utc>>,
}

impl NewFieldRecord {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            location: location.into(),
            timestamp: None,
        }
    }

    /// Pin the observation time. Defaults to insertion time when unset.
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Trim the text attributes and reject any that end up empty.
    pub fn validate(self) -> Result<Self> {
        let field = required("field", &self.field)?;
        let value = required("value", &self.value)?;
        let location = required("location", &self.location)?;
        Ok(Self {
            field,
            value,
            location,
            timestamp: self.timestamp,
        })
    }

    /// Materialize into a stored record. Callers must have validated first.
    pub(crate) fn into_record(self, owner: UserId, now: DateTime<Utc>) -> FieldRecord {
        FieldRecord {
            id: RecordId::new(),
            field: self.field,
            value: self.value,
            location: self.location,
            timestamp: self.timestamp.unwrap_or(now),
            owner,
        }
    }
}

fn required(name: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{name} must not be empty")));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// One turn of the assistant conversation, kept in session memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub is_from_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn from_user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    pub fn from_assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    fn new(content: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            is_from_user,
            timestamp: Utc::now(),
        }
    }
}

/// A persisted question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Activity Log
// ---------------------------------------------------------------------------

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub action: ActivityAction,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    DataEntry,
    DataDelete,
    DataExport,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::DataEntry => "DATA_ENTRY",
            ActivityAction::DataDelete => "DATA_DELETE",
            ActivityAction::DataExport => "DATA_EXPORT",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "DATA_ENTRY" => Ok(ActivityAction::DataEntry),
            "DATA_DELETE" => Ok(ActivityAction::DataDelete),
            "DATA_EXPORT" => Ok(ActivityAction::DataExport),
            other => Err(format!("unknown activity action: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_text_attributes() {
        let new = NewFieldRecord::new("  Soil pH ", "6.5\n", "\tNorth plot")
            .validate()
            .unwrap();
        assert_eq!(new.field, "Soil pH");
        assert_eq!(new.value, "6.5");
        assert_eq!(new.location, "North plot");
    }

    #[test]
    fn validate_rejects_blank_location() {
        let err = NewFieldRecord::new("Temp", "21", "   ")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("location")));
    }

    #[test]
    fn timestamp_defaults_to_insertion_time() {
        let now = Utc::now();
        let owner = UserId::new();
        let record = NewFieldRecord::new("Temp", "21", "Plot A")
            .validate()
            .unwrap()
            .into_record(owner, now);
        assert_eq!(record.timestamp, now);
        assert_eq!(record.owner, owner);
    }

    #[test]
    fn activity_action_uses_tag_names() {
        assert_eq!(
            serde_json::to_string(&ActivityAction::DataDelete).unwrap(),
            "\"DATA_DELETE\""
        );
        assert_eq!(
            "DATA_ENTRY".parse::<ActivityAction>().unwrap(),
            ActivityAction::DataEntry
        );
    }
}
