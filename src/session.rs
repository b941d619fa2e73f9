use std::time::Duration;

use tokio::sync::mpsc;

use crate::buffer::ExpiringBuffer;
use crate::common::NetworkEvent;
use crate::common::types::MAX_SENDER_LEN;

/// Login validation errors, mirrored on the message constructor's limits.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("Username cannot be empty.")]
    EmptyUsername,
    #[error("Username too long.")]
    UsernameTooLong,
}

/// One signed-in chat session owning the live message buffer.
///
/// Cloning shares the same buffer, so a clone can pump inbound events while
/// the original drives teardown.
#[derive(Debug, Clone)]
pub struct ChatSession {
    username: String,
    buffer: ExpiringBuffer,
}

impl ChatSession {
    /// Validate the username and open a session with the given window.
    pub fn sign_in(username: &str, visibility_window: Duration) -> Result<Self, LoginError> {
        if username.is_empty() {
            return Err(LoginError::EmptyUsername);
        }
        if username.chars().count() > MAX_SENDER_LEN {
            return Err(LoginError::UsernameTooLong);
        }

        log::info!("{username} signed in");
        Ok(Self {
            username: username.to_string(),
            buffer: ExpiringBuffer::new(visibility_window),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn buffer(&self) -> &ExpiringBuffer {
        &self.buffer
    }

    /// Feed inbound transport events into the buffer until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<NetworkEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                NetworkEvent::MessageReceived(message) => {
                    if let Err(err) = self.buffer.insert(message) {
                        log::warn!("Dropping inbound message: {err}");
                    }
                }
            }
        }
    }

    /// Tear the session down, cancelling every pending removal timer.
    pub fn sign_out(&self) {
        self.buffer.clear();
        log::info!("{} signed out", self.username);
    }
}
