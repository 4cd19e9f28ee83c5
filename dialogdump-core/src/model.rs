use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DumpError, Result};

/// A conversation-like container of messages, as supplied by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Provider-specific kind (user, chat, channel, ...)
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl Dialog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: None,
            raw: Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Human readable label, falling back to the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn from_export(value: Value) -> Result<Self> {
        // Accept string or numeric ids
        let id = match value.get("id").or_else(|| value.get("peer_id")) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(DumpError::provider("dialog missing 'id'")),
        };
        let name = value
            .get("name")
            .or_else(|| value.get("title"))
            .or_else(|| value.get("print_name"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let kind = value
            .get("kind")
            .or_else(|| value.get("type"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        Ok(Self {
            id,
            name,
            kind,
            raw: value,
        })
    }
}

/// One exportable message. `id` is the ordering key; it grows with every new
/// message in the same dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl Message {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            date: None,
            from: None,
            text: None,
            raw: Value::Null,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn from_export(value: Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| DumpError::provider("message missing integer 'id'"))?;

        let date = match value.get("date") {
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            Some(Value::String(s)) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|err| {
                        DumpError::provider(format!("message {id} has invalid date '{s}': {err}"))
                    })?,
            ),
            _ => None,
        };

        let from = value
            .get("from")
            .and_then(|v| v.as_str().or_else(|| v.get("print_name").and_then(|n| n.as_str())))
            .map(str::to_owned);
        let text = value
            .get("text")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        Ok(Self {
            id,
            date,
            from,
            text,
            raw: value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialog_accepts_numeric_and_string_ids() {
        let d = Dialog::from_export(json!({"id": 42, "title": "Team"})).unwrap();
        assert_eq!(d.id, "42");
        assert_eq!(d.label(), "Team");

        let d = Dialog::from_export(json!({"id": "user#7", "type": "user"})).unwrap();
        assert_eq!(d.id, "user#7");
        assert_eq!(d.kind.as_deref(), Some("user"));
        assert_eq!(d.label(), "user#7");
    }

    #[test]
    fn dialog_without_id_is_provider_error() {
        let err = Dialog::from_export(json!({"name": "nobody"})).unwrap_err();
        assert!(matches!(err, DumpError::Provider { .. }));
    }

    #[test]
    fn message_parses_unix_and_rfc3339_dates() {
        let m = Message::from_export(json!({"id": 5, "date": 1_700_000_000, "text": "hi"})).unwrap();
        assert_eq!(m.id, 5);
        assert_eq!(m.date.map(|d| d.timestamp()), Some(1_700_000_000));
        assert_eq!(m.text.as_deref(), Some("hi"));

        let m = Message::from_export(json!({
            "id": 6,
            "date": "2024-01-15T10:00:00Z",
            "from": {"print_name": "Alice"}
        }))
        .unwrap();
        assert_eq!(m.from.as_deref(), Some("Alice"));
        assert!(m.date.is_some());
    }

    #[test]
    fn message_rejects_bad_input() {
        assert!(Message::from_export(json!({"text": "no id"})).is_err());
        assert!(Message::from_export(json!({"id": 1, "date": "yesterday"})).is_err());
    }
}
