use chrono::Utc;
use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub timestamp: i64,
}

impl Message {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self::new(id, text, Sender::User)
    }

    pub fn bot(id: u64, text: impl Into<String>) -> Self {
        Self::new(id, text, Sender::Bot)
    }

    fn new(id: u64, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
            timestamp: Utc::now().timestamp(),
        }
    }
}
