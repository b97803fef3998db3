//! SMS Record Model
//!
//! Types shared by the conversation list and the thread feed.
//!
//! ## Message Records
//!
//! A [`MessageRecord`] is one row of the device message log. Records are
//! produced by a [`RecordSource`](crate::source::RecordSource) and never
//! mutated here. Field names serialize in camelCase; the Android telephony
//! column names are accepted as aliases:
//!
//! | Field | Android column |
//! |-------|----------------|
//! | `id` | `_id` |
//! | `threadId` | `thread_id` |
//! | `address` | `address` |
//! | `body` | `body` |
//! | `timestampMillis` | `date` |
//! | `direction` | `type` (1 = received, 2 = sent) |
//!
//! ## Conversation Summaries
//!
//! A [`ConversationSummary`] is derived, one per thread, and rebuilt from
//! scratch on every aggregation pass.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Placeholder shown when a record carries no address
pub const UNKNOWN_ADDRESS: &str = "Unknown";

/// Default number of snippet characters shown in a conversation row
pub const DEFAULT_PREVIEW_CHARS: usize = 50;

/// Android `Telephony.Sms.MESSAGE_TYPE_INBOX`
pub const MESSAGE_TYPE_INBOX: i32 = 1;

/// Android `Telephony.Sms.MESSAGE_TYPE_SENT`
pub const MESSAGE_TYPE_SENT: i32 = 2;

/// Whether a message was received or sent by this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Map an Android telephony `type` column value
    ///
    /// Sent, outbox, failed and queued (2, 4, 5, 6) are outgoing; every other
    /// value, including drafts and unknown codes, is treated as incoming.
    pub fn from_message_type(message_type: i32) -> Self {
        match message_type {
            2 | 4 | 5 | 6 => Self::Outgoing,
            _ => Self::Incoming,
        }
    }

    /// Android telephony `type` value for this direction
    pub fn to_message_type(self) -> i32 {
        match self {
            Self::Incoming => MESSAGE_TYPE_INBOX,
            Self::Outgoing => MESSAGE_TYPE_SENT,
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i32),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Ok(Direction::from_message_type(code)),
            Repr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "incoming" | "received" | "inbox" => Ok(Direction::Incoming),
                "outgoing" | "sent" => Ok(Direction::Outgoing),
                other => Err(serde::de::Error::unknown_variant(
                    other,
                    &["incoming", "outgoing"],
                )),
            },
        }
    }
}

/// Accept ids exported either as strings or as integers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(text) => text,
        Repr::Number(number) => number.to_string(),
    })
}

/// A single message from the device log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Message ID, unique within the log
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,

    /// Conversation grouping key; empty when the source row had none
    #[serde(default, alias = "thread_id", deserialize_with = "string_or_number")]
    pub thread_id: String,

    /// Phone number or address of the other party
    #[serde(default)]
    pub address: String,

    /// Message body
    #[serde(default)]
    pub body: String,

    /// Timestamp (milliseconds since epoch)
    #[serde(alias = "date")]
    pub timestamp_millis: i64,

    /// Received or sent
    #[serde(alias = "type")]
    pub direction: Direction,
}

impl MessageRecord {
    /// Synthesize an outgoing record for a message this device just sent
    ///
    /// The id is a fresh UUID so it can never collide with a source id.
    pub fn outgoing(
        thread_id: impl Into<String>,
        address: impl Into<String>,
        body: impl Into<String>,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            address: address.into(),
            body: body.into(),
            timestamp_millis,
            direction: Direction::Outgoing,
        }
    }

    /// Whether this message was sent by us
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.direction == Direction::Outgoing
    }

    /// Address to display, falling back to [`UNKNOWN_ADDRESS`]
    pub fn display_address(&self) -> &str {
        if self.address.trim().is_empty() {
            UNKNOWN_ADDRESS
        } else {
            &self.address
        }
    }
}

/// Summary of an SMS conversation thread for the conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Thread ID
    pub thread_id: String,
    /// Address of the representative record
    pub address: String,
    /// Body of the representative record
    pub snippet: String,
    /// Latest timestamp among the thread's records (ms since epoch)
    pub last_timestamp_millis: i64,
    /// Number of records in the thread
    pub message_count: usize,
}

impl ConversationSummary {
    /// Snippet cut to `max_chars` characters, with `...` appended when cut
    ///
    /// ```rust
    /// use cosmic_sms_core::ConversationSummary;
    ///
    /// let summary = ConversationSummary {
    ///     thread_id: "1".into(),
    ///     address: "555".into(),
    ///     snippet: "see you at the station".into(),
    ///     last_timestamp_millis: 0,
    ///     message_count: 1,
    /// };
    /// assert_eq!(summary.preview(7), "see you...");
    /// assert_eq!(summary.preview(50), "see you at the station");
    /// ```
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.snippet.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}
