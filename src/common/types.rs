use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest sender name accepted, same limit the login screen enforces.
pub const MAX_SENDER_LEN: usize = 16;

/// Validation errors raised when constructing a [`ChatMessage`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("sender cannot be empty")]
    EmptySender,
    #[error("sender too long (max {MAX_SENDER_LEN} chars)")]
    SenderTooLong,
}

/// Domain model đại diện một tin nhắn chat (tự hết hạn sau một khoảng hiển thị).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub body: String,
    /// Epoch millis, gán một lần lúc gửi và không bao giờ thay đổi.
    pub created_at: i64,
}

impl ChatMessage {
    /// Build a message stamped with the current wall-clock time.
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Result<Self, MessageError> {
        Self::with_created_at(sender, body, Utc::now().timestamp_millis())
    }

    /// Build a message carrying an already-known submission timestamp.
    ///
    /// The id is a fresh random token, never derived from content, so two
    /// messages with identical sender, body and timestamp stay distinct.
    pub fn with_created_at(
        sender: impl Into<String>,
        body: impl Into<String>,
        created_at: i64,
    ) -> Result<Self, MessageError> {
        let sender = sender.into();
        if sender.is_empty() {
            return Err(MessageError::EmptySender);
        }
        if sender.chars().count() > MAX_SENDER_LEN {
            return Err(MessageError::SenderTooLong);
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            sender,
            body: body.into(),
            created_at,
        })
    }

    /// Render `created_at` in the observer's local zone as `h:mm:ss AM/PM`.
    pub fn formatted_timestamp(&self) -> String {
        format_timestamp(self.created_at, &Local)
    }
}

/// Format an epoch-millis instant in the given zone, pattern `h:mm:ss AM/PM`.
pub fn format_timestamp<Tz: TimeZone>(millis: i64, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    zone.timestamp_millis_opt(millis)
        .earliest()
        .map(|instant| instant.format("%-I:%M:%S %p").to_string())
        .unwrap_or_default()
}
