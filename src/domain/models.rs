//! Domain models for Claude conversation data.
//!
//! These mirror the JSON documents served by the conversation API. Fields the
//! exporter does not interpret are kept in `extra` so a record survives a
//! parse/serialize cycle intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Message typed by the user.
    Human,
    /// Message produced by the model.
    Assistant,
    /// Any sender value this tool does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "Human"),
            Self::Assistant => write!(f, "Assistant"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One block of structured message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentBlock {
    /// Block type (`text`, `tool_use`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Text carried by the block, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single message node in the conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique within its conversation.
    pub uuid: String,
    /// Parent message; absent or unresolvable marks the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_uuid: Option<String>,
    pub sender: Sender,
    /// Structured content blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentBlock>>,
    /// Legacy flat text, used when `content` is absent.
    #[serde(default)]
    pub text: String,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Text body of the message.
    ///
    /// Concatenates the text of every content block in order, skipping blocks
    /// without text. Falls back to the flat `text` field when there are no
    /// content blocks at all.
    #[must_use]
    pub fn body(&self) -> String {
        match &self.content {
            Some(blocks) => blocks
                .iter()
                .filter_map(|b| b.text.as_deref())
                .collect::<String>(),
            None => self.text.clone(),
        }
    }
}

/// Conversation metadata as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Declared model; `None` for conversations predating the field.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationSummary {
    /// Name to show to users, falling back to the identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.uuid
        } else {
            &self.name
        }
    }

    /// Model identifier if one is set and non-empty.
    #[must_use]
    pub fn declared_model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Short identifier prefix for tables.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.uuid.get(..8).unwrap_or(&self.uuid)
    }
}

/// A full conversation: metadata plus its message tree.
///
/// Deserializing keeps the received document in `raw`, so the JSON export can
/// reproduce it byte-for-byte in meaning even for fields the typed view
/// normalizes (timestamps, nulls, unknown senders).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRecord {
    #[serde(flatten)]
    pub conversation: ConversationSummary,
    /// Every message in the tree, including abandoned branches.
    pub chat_messages: Vec<Message>,
    /// Terminal message of the active branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_leaf_message_uuid: Option<String>,
    /// Document as received; `Null` for records built in code.
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Deserialize)]
struct RecordFields {
    #[serde(flatten)]
    conversation: ConversationSummary,
    #[serde(default)]
    chat_messages: Vec<Message>,
    #[serde(default)]
    current_leaf_message_uuid: Option<String>,
}

impl<'de> Deserialize<'de> for ConversationRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let fields = RecordFields::deserialize(&raw).map_err(serde::de::Error::custom)?;
        Ok(Self {
            conversation: fields.conversation,
            chat_messages: fields.chat_messages,
            current_leaf_message_uuid: fields.current_leaf_message_uuid,
            raw,
        })
    }
}

impl ConversationRecord {
    /// JSON form of the record: the received document with only `model`
    /// replaced by the current (possibly inferred) value.
    ///
    /// # Errors
    /// Returns error if a record without a received document fails to serialize.
    pub fn to_json_value(&self) -> serde_json::Result<Value> {
        match &self.raw {
            Value::Object(map) => {
                let mut map = map.clone();
                if let Some(model) = &self.conversation.model {
                    map.insert("model".to_string(), Value::String(model.clone()));
                }
                Ok(Value::Object(map))
            }
            _ => serde_json::to_value(self),
        }
    }
}

impl std::ops::Deref for ConversationRecord {
    type Target = ConversationSummary;

    fn deref(&self) -> &Self::Target {
        &self.conversation
    }
}

/// Linear root-to-leaf path through a conversation tree.
pub type Branch<'a> = Vec<&'a Message>;

/// Output encodings supported by the exporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raw record, pretty-printed.
    Json,
    /// Human-readable Markdown.
    #[default]
    Markdown,
    /// Plain text transcript.
    Text,
}

impl ExportFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Text => "txt",
        }
    }

    /// MIME type of rendered documents.
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Markdown => "text/markdown",
            Self::Text => "text/plain",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Markdown => write!(f, "markdown"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("Unknown format: {s}. Use: json, markdown, text")),
        }
    }
}

/// Lenient timestamp parsing: RFC 3339 strings or epoch milliseconds.
/// Missing, null or unparseable values become `None`.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(|value| match value {
            Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(e) => {
                    tracing::debug!(value = %s, error = %e, "Ignoring unparseable timestamp");
                    None
                }
            },
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        }))
    }
}
