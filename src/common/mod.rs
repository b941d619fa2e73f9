pub mod commands;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use events::{BufferEvent, NetworkEvent};
pub use types::{ChatMessage, MessageError, format_timestamp};
