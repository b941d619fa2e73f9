use std::error::Error;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use rust_fading_chat::buffer::ExpiringBuffer;
use rust_fading_chat::common::{BufferEvent, ChatCommand};
use rust_fading_chat::config;
use rust_fading_chat::network::LoopbackClient;
use rust_fading_chat::session::ChatSession;

#[derive(Parser)]
#[command(
    name = "rust_fading_chat",
    version,
    about = "Chat stream with self-expiring messages"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Username to sign in with (falls back to the config file)
    #[arg(long)]
    username: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config);

    let username = cli.username.or(app_config.username).unwrap_or_default();
    let window = Duration::from_millis(app_config.visibility_window_ms);
    let session = ChatSession::sign_in(&username, window)?;

    // 1. Tạo các kênh giao tiếp (Channels)
    // Input -> Transport
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Transport -> Session
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy transport loopback (Chạy ngầm)
    let sender_name = session.username().to_string();
    tokio::spawn(async move {
        let client = LoopbackClient::new(sender_name, event_tx, cmd_rx);
        if let Err(err) = client.run().await {
            log::error!("Transport terminated: {err}");
        }
    });

    // 3. Bơm sự kiện inbound vào buffer
    tokio::spawn(session.clone().run(event_rx));

    // 4. Renderer: vẽ lại snapshot mỗi khi buffer thay đổi
    let rendered = session.buffer().clone();
    let mut changes = rendered.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(event) => render(&rendered, &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Renderer lagged, skipped {skipped} notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!(
        "Signed in as {}. Messages disappear after {:?}. Type to chat, /quit to sign out.",
        session.username(),
        window
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Err(err) = cmd_tx.send(ChatCommand::SendMessage(line)).await {
            log::error!("Transport channel closed: {err}");
            break;
        }
    }

    session.sign_out();
    Ok(())
}

/// Reprint the live messages after every buffer change.
fn render(buffer: &ExpiringBuffer, event: &BufferEvent) {
    if matches!(event, BufferEvent::Cleared) {
        return;
    }
    let snapshot = buffer.snapshot();
    println!("--- {} message(s) on screen ---", snapshot.len());
    for message in &snapshot {
        println!(
            "[{}] {}: {}",
            message.formatted_timestamp(),
            message.sender,
            message.body
        );
    }
}
