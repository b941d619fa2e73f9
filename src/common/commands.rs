/// Lệnh UI gửi xuống tầng vận chuyển.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    SendMessage(String),
}
