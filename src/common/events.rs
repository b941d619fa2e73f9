use crate::common::types::ChatMessage;

/// Sự kiện từ tầng vận chuyển gửi lên phiên chat.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    MessageReceived(ChatMessage),
}

/// Sự kiện từ buffer gửi lên renderer, kèm lý do thay đổi.
#[derive(Debug, Clone)]
pub enum BufferEvent {
    /// A message entered the live sequence.
    Inserted(ChatMessage),
    /// A message's visibility window elapsed and it was evicted.
    Expired(String),
    /// A message was removed explicitly before its window elapsed.
    Removed(String),
    /// The whole buffer was emptied at session teardown.
    Cleared,
}
