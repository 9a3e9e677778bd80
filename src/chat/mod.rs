pub mod conversation;
pub mod matcher;

use crate::config::KnowledgeBase;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Knowledge shared by every live conversation; a reload swaps the inner `Arc`.
pub type SharedKnowledge = Arc<RwLock<Arc<KnowledgeBase>>>;

pub use conversation::{ Conversation, ConversationEvent, ReplyDelay };
pub use matcher::{ classify, resolve, resolve_with, Intent };
