pub mod knowledge;

pub use knowledge::{
    builtin_knowledge,
    load_knowledge,
    load_knowledge_or_builtin,
    reload_knowledge_if_changed,
    KnowledgeBase,
    KnowledgeError,
    Topic,
};
