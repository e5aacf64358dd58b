//! Persisted checkpoint state.
//!
//! The checkpoint file holds the Instagram session blob and the last
//! committed cursor of every platform:
//!
//! ```json
//! {
//!   "insta_api": { "sessionid": { "__class__": "bytes", "__value__": "c2Vzc2lvbg==" } },
//!   "insta_cursors": { "next_max_id": "QVFE..." },
//!   "twitter_cursors": { "next_cursor": "7140dibdnow9c7btw", "prev_cursor": null },
//!   "tiktok_cursors": { "max_time": 1651234567 }
//! }
//! ```

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Cursor, Platform};

const BYTES_CLASS: &str = "bytes";

/// Binary value stored as `{"__class__": "bytes", "__value__": <base64>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedBytes(pub Vec<u8>);

impl Serialize for TaggedBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("__class__", BYTES_CLASS)?;
        map.serialize_entry("__value__", &STANDARD.encode(&self.0))?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaggedBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Tagged {
            #[serde(rename = "__class__")]
            class: String,
            #[serde(rename = "__value__")]
            value: String,
        }

        let tagged = Tagged::deserialize(deserializer)?;
        if tagged.class != BYTES_CLASS {
            return Err(de::Error::custom(format!(
                "unsupported tagged class '{}'",
                tagged.class
            )));
        }
        // Encoders that wrap lines at 76 columns leave newlines in the payload.
        let compact: String = tagged
            .value
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(compact)
            .map(TaggedBytes)
            .map_err(de::Error::custom)
    }
}

/// A single session setting: tagged bytes or any plain JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bytes(TaggedBytes),
    Plain(Value),
}

/// Platform session settings blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSettings(BTreeMap<String, SettingValue>);

impl SessionSettings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    /// Binary setting, if present and stored as bytes.
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        match self.0.get(key)? {
            SettingValue::Bytes(bytes) => Some(&bytes.0),
            SettingValue::Plain(_) => None,
        }
    }

    /// String setting, if present and stored as a plain string.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            SettingValue::Plain(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn set_bytes(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.0
            .insert(key.into(), SettingValue::Bytes(TaggedBytes(bytes.into())));
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0
            .insert(key.into(), SettingValue::Plain(Value::String(value.into())));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstagramCursors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_max_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterCursors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub prev_cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiktokCursors {
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_time: Option<i64>,
}

/// Accept timestamps written either as numbers or as numeric strings.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", n))),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!("invalid timestamp: {}", other))),
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub insta_api: SessionSettings,

    #[serde(default)]
    pub insta_cursors: InstagramCursors,

    #[serde(default)]
    pub twitter_cursors: TwitterCursors,

    #[serde(default)]
    pub tiktok_cursors: TiktokCursors,

    /// Time of the last successful save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CheckpointState {
    /// Last committed cursor for a platform.
    pub fn cursor(&self, platform: Platform) -> Option<Cursor> {
        match platform {
            Platform::Instagram => self.insta_cursors.next_max_id.clone().map(Cursor::MaxId),
            Platform::Twitter => self
                .twitter_cursors
                .next_cursor
                .clone()
                .map(|next| Cursor::Token {
                    next,
                    previous: self.twitter_cursors.prev_cursor.clone(),
                }),
            Platform::Tiktok => self.tiktok_cursors.max_time.map(Cursor::Timestamp),
        }
    }

    /// Record a cursor for a platform.
    ///
    /// Fails if the cursor shape does not belong to the platform.
    pub fn set_cursor(&mut self, platform: Platform, cursor: &Cursor) -> Result<()> {
        match (platform, cursor) {
            (Platform::Instagram, Cursor::MaxId(id)) => {
                self.insta_cursors = InstagramCursors {
                    next_max_id: Some(id.clone()),
                };
            }
            (Platform::Twitter, Cursor::Token { next, previous }) => {
                self.twitter_cursors = TwitterCursors {
                    next_cursor: Some(next.clone()),
                    prev_cursor: previous.clone(),
                };
            }
            (Platform::Tiktok, Cursor::Timestamp(ts)) => {
                self.tiktok_cursors = TiktokCursors { max_time: Some(*ts) };
            }
            _ => {
                return Err(AppError::validation(format!(
                    "cursor '{}' does not belong to {}",
                    cursor, platform
                )));
            }
        }
        Ok(())
    }
}
