use std::error::Error;

use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatMessage, NetworkEvent};

/// Stand-in for a real chat transport.
///
/// Outgoing messages are stamped at submission, round-tripped through their
/// JSON wire form and delivered straight back as inbound events, so the rest
/// of the app sees the same boundary a networked build would.
pub struct LoopbackClient {
    username: String,
    event_sender: mpsc::Sender<NetworkEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
}

impl LoopbackClient {
    pub fn new(
        username: String,
        event_sender: mpsc::Sender<NetworkEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        Self {
            username,
            event_sender,
            command_receiver,
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::info!("Loopback transport started for {}", self.username);

        while let Some(command) = self.command_receiver.recv().await {
            self.handle_command(command).await;
        }

        log::info!("Loopback transport stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SendMessage(body) => {
                let message = match ChatMessage::new(&self.username, &body) {
                    Ok(message) => message,
                    Err(err) => {
                        log::warn!("Refusing to send message: {err}");
                        return;
                    }
                };

                match Self::wire_roundtrip(&message) {
                    Ok(delivered) => {
                        if let Err(err) = self
                            .event_sender
                            .send(NetworkEvent::MessageReceived(delivered))
                            .await
                        {
                            log::warn!("Failed to deliver message to session: {err}");
                        }
                    }
                    Err(err) => {
                        log::warn!("Wire encoding error: {err:?}");
                    }
                }
            }
        }
    }

    /// Serialize and parse back, the same path a real transport would take.
    fn wire_roundtrip(message: &ChatMessage) -> serde_json::Result<ChatMessage> {
        let json_bytes = serde_json::to_vec(message)?;
        serde_json::from_slice(&json_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_command_comes_back_as_inbound_event() {
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        tokio::spawn(LoopbackClient::new("alice".to_string(), event_tx, cmd_rx).run());

        cmd_tx
            .send(ChatCommand::SendMessage("hello".to_string()))
            .await
            .unwrap();
        drop(cmd_tx);

        let NetworkEvent::MessageReceived(message) = event_rx.recv().await.unwrap();
        assert_eq!(message.sender, "alice");
        assert_eq!(message.body, "hello");
        assert!(!message.id.is_empty());
    }
}
