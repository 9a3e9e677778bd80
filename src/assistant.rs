use crate::chat::{ resolve, Conversation, ReplyDelay, SharedKnowledge };
use crate::cli::Args;
use crate::config::knowledge::{ self, KnowledgeBase, KnowledgeError };

use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Owns the live knowledge base and hands out conversations that share it.
#[derive(Clone)]
pub struct Assistant {
    knowledge: SharedKnowledge,
    knowledge_path: PathBuf,
    reply_delay: ReplyDelay,
}

impl Assistant {
    pub fn new(args: &Args) -> Result<Self, KnowledgeError> {
        let kb = knowledge::load_knowledge_or_builtin(&args.knowledge_path)?;
        let reply_delay = ReplyDelay::new(
            Duration::from_millis(args.reply_delay_ms),
            Duration::from_millis(args.reply_jitter_ms)
        );
        info!(
            "Assistant ready: {} topics, reply delay {:?} (+ up to {:?})",
            kb.topics().len(),
            reply_delay.base,
            reply_delay.jitter
        );
        Ok(Self::with_knowledge(kb, &args.knowledge_path, reply_delay))
    }

    pub fn with_knowledge(
        kb: Arc<KnowledgeBase>,
        knowledge_path: impl Into<PathBuf>,
        reply_delay: ReplyDelay
    ) -> Self {
        Self {
            knowledge: Arc::new(RwLock::new(kb)),
            knowledge_path: knowledge_path.into(),
            reply_delay,
        }
    }

    pub async fn knowledge(&self) -> Arc<KnowledgeBase> {
        Arc::clone(&*self.knowledge.read().await)
    }

    pub async fn start_conversation(&self) -> Conversation {
        let conversation = Conversation::new(Arc::clone(&self.knowledge), self.reply_delay).await;
        info!("Started conversation {}", conversation.id());
        conversation
    }

    /// One-shot answer with no transcript and no delay.
    pub async fn ask(&self, message: &str) -> String {
        let kb = self.knowledge().await;
        resolve(message, &kb)
    }

    pub async fn suggestions(&self) -> Vec<String> {
        self.knowledge().await.suggestions().to_vec()
    }

    /// Reloads the knowledge file if it changed since the last load. The swap
    /// affects replies computed after it, including those of open conversations.
    pub async fn reload_knowledge_if_changed(&self) -> Result<bool, KnowledgeError> {
        let current = self.knowledge().await;
        match knowledge::reload_knowledge_if_changed(&self.knowledge_path, &current)? {
            Some(fresh) => {
                *self.knowledge.write().await = fresh;
                info!("Knowledge reloaded from {}", self.knowledge_path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_knowledge;
    use std::fs;
    use std::io::Write;

    const SMALL_KB: &str =
        r#"{"greetings":["hi!"],"topics":[{"keywords":["tree"],"response":"trees"}],"fallback":["?"]}"#;

    #[tokio::test]
    async fn ask_answers_without_a_conversation() {
        let assistant = Assistant::with_knowledge(
            builtin_knowledge().unwrap(),
            "missing.json",
            ReplyDelay::none()
        );
        assert!(assistant.ask("is it free?").await.contains("FREE"));
        assert_eq!(assistant.suggestions().await.len(), 4);
    }

    #[tokio::test]
    async fn reload_picks_up_edited_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL_KB.as_bytes()).unwrap();

        let kb = knowledge::load_knowledge(file.path()).unwrap();
        let assistant = Assistant::with_knowledge(kb, file.path(), ReplyDelay::none());
        assert!(!assistant.reload_knowledge_if_changed().await.unwrap());

        // coarse filesystem clocks need the edit to land well after the load
        std::thread::sleep(Duration::from_millis(1100));
        fs::write(file.path(), SMALL_KB.replace("trees", "forests")).unwrap();

        assert!(assistant.reload_knowledge_if_changed().await.unwrap());
        assert_eq!(assistant.ask("a tree fell").await, "forests");
    }

    #[tokio::test]
    async fn broken_reload_keeps_previous_knowledge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL_KB.as_bytes()).unwrap();
        let kb = knowledge::load_knowledge(file.path()).unwrap();
        let assistant = Assistant::with_knowledge(kb, file.path(), ReplyDelay::none());

        std::thread::sleep(Duration::from_millis(1100));
        fs::write(file.path(), r#"{"greetings":[],"topics":[],"fallback":[]}"#).unwrap();

        assert!(assistant.reload_knowledge_if_changed().await.is_err());
        assert_eq!(assistant.ask("tree").await, "trees");
    }
}
