use serde::{ Deserialize, Serialize };
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::{ info, warn };
use thiserror::Error;

/// Built-in knowledge, used when no knowledge file is present on disk.
const BUILTIN_KNOWLEDGE: &str = include_str!("../../json/knowledge.json");

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("knowledge base has no {0}")]
    Empty(&'static str),
    #[error("topic #{index} ({name}) has no keywords")]
    TopicWithoutKeywords { index: usize, name: String },
    #[error("topic #{index} ({name}) has an empty keyword")]
    BlankKeyword { index: usize, name: String },
    #[error("topic #{index} ({name}) has an empty response")]
    BlankResponse { index: usize, name: String },
    #[error("knowledge file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("knowledge JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A keyword-triggered canned response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Topic {
    #[serde(default)]
    pub name: Option<String>,
    pub keywords: Vec<String>,
    pub response: String,
}

impl Topic {
    pub fn new<K, S>(keywords: K, response: impl Into<String>) -> Self
        where K: IntoIterator<Item = S>, S: Into<String>
    {
        Self {
            name: None,
            keywords: keywords.into_iter().map(Into::into).collect(),
            response: response.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// True when any keyword occurs anywhere inside `lowered`.
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|kw| lowered.contains(kw.as_str()))
    }
}

#[derive(Deserialize)]
struct RawKnowledgeBase {
    welcome: Option<String>,
    #[serde(default = "default_greeting_openers")]
    greeting_openers: Vec<String>,
    greetings: Vec<String>,
    topics: Vec<Topic>,
    fallback: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

fn default_greeting_openers() -> Vec<String> {
    ["hi", "hello", "hey", "assalam", "salam", "good morning", "good evening"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Everything the chat assistant knows.
///
/// Topics are kept in declaration order and that order is the only priority:
/// when a message contains keywords of several topics, the topic declared
/// first answers. Keyword lists may overlap freely.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(try_from = "RawKnowledgeBase")]
pub struct KnowledgeBase {
    welcome: String,
    greeting_openers: Vec<String>,
    greetings: Vec<String>,
    topics: Vec<Topic>,
    fallback: Vec<String>,
    suggestions: Vec<String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
    #[serde(skip)]
    builtin: bool,
}

impl TryFrom<RawKnowledgeBase> for KnowledgeBase {
    type Error = KnowledgeError;

    fn try_from(raw: RawKnowledgeBase) -> Result<Self, Self::Error> {
        let mut kb = KnowledgeBase::new(raw.greetings, raw.topics, raw.fallback)?
            .with_greeting_openers(raw.greeting_openers)?
            .with_suggestions(raw.suggestions);
        if let Some(welcome) = raw.welcome.filter(|w| !w.trim().is_empty()) {
            kb.welcome = welcome;
        }
        Ok(kb)
    }
}

impl KnowledgeBase {
    pub fn new(
        greetings: Vec<String>,
        topics: Vec<Topic>,
        fallback: Vec<String>
    ) -> Result<Self, KnowledgeError> {
        if greetings.iter().all(|g| g.trim().is_empty()) {
            return Err(KnowledgeError::Empty("greetings"));
        }
        if topics.is_empty() {
            return Err(KnowledgeError::Empty("topics"));
        }
        if fallback.iter().all(|f| f.trim().is_empty()) {
            return Err(KnowledgeError::Empty("fallback responses"));
        }

        let mut normalized = Vec::with_capacity(topics.len());
        for (index, topic) in topics.into_iter().enumerate() {
            let name = topic.label().to_string();
            if topic.keywords.is_empty() {
                return Err(KnowledgeError::TopicWithoutKeywords { index, name });
            }
            if topic.keywords.iter().any(|kw| kw.trim().is_empty()) {
                return Err(KnowledgeError::BlankKeyword { index, name });
            }
            if topic.response.trim().is_empty() {
                return Err(KnowledgeError::BlankResponse { index, name });
            }
            normalized.push(Topic {
                keywords: topic.keywords
                    .iter()
                    .map(|kw| kw.to_lowercase())
                    .collect(),
                ..topic
            });
        }

        let greetings: Vec<String> = greetings
            .into_iter()
            .filter(|g| !g.trim().is_empty())
            .collect();
        let fallback: Vec<String> = fallback
            .into_iter()
            .filter(|f| !f.trim().is_empty())
            .collect();

        Ok(Self {
            welcome: greetings[0].clone(),
            greeting_openers: default_greeting_openers(),
            greetings,
            topics: normalized,
            fallback,
            suggestions: Vec::new(),
            last_loaded: None,
            builtin: false,
        })
    }

    pub fn with_greeting_openers(mut self, openers: Vec<String>) -> Result<Self, KnowledgeError> {
        let openers: Vec<String> = openers
            .into_iter()
            .map(|o| o.trim().to_lowercase())
            .filter(|o| !o.is_empty())
            .collect();
        if openers.is_empty() {
            return Err(KnowledgeError::Empty("greeting openers"));
        }
        self.greeting_openers = openers;
        Ok(self)
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    pub fn greetings(&self) -> &[String] {
        &self.greetings
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn is_greeting(&self, lowered: &str) -> bool {
        self.greeting_openers.iter().any(|opener| lowered.starts_with(opener.as_str()))
    }

    /// True for the copy embedded in the binary.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

pub fn builtin_knowledge() -> Result<Arc<KnowledgeBase>, KnowledgeError> {
    let mut kb: KnowledgeBase = serde_json::from_str(BUILTIN_KNOWLEDGE)?;
    kb.last_loaded = Some(SystemTime::now());
    kb.builtin = true;
    Ok(Arc::new(kb))
}

pub fn load_knowledge_from_str(json: &str) -> Result<Arc<KnowledgeBase>, KnowledgeError> {
    let mut kb: KnowledgeBase = serde_json::from_str(json)?;
    kb.last_loaded = Some(SystemTime::now());
    Ok(Arc::new(kb))
}

pub fn load_knowledge<P: AsRef<Path>>(path: P) -> Result<Arc<KnowledgeBase>, KnowledgeError> {
    let json = fs::read_to_string(&path)?;
    let kb = load_knowledge_from_str(&json)?;
    info!(
        "Loaded {} topics, {} greetings and {} fallbacks from {}",
        kb.topics().len(),
        kb.greetings().len(),
        kb.fallback().len(),
        path.as_ref().display()
    );
    Ok(kb)
}

/// Loads `path`, or the built-in knowledge when the file does not exist.
/// A file that exists but fails to parse or validate is an error.
pub fn load_knowledge_or_builtin<P: AsRef<Path>>(
    path: P
) -> Result<Arc<KnowledgeBase>, KnowledgeError> {
    if path.as_ref().exists() {
        load_knowledge(path)
    } else {
        warn!(
            "Knowledge file {} not found, using built-in knowledge",
            path.as_ref().display()
        );
        builtin_knowledge()
    }
}

/// Reloads `path` when its mtime is newer than `current`. While the built-in
/// knowledge is in use a missing file means nothing changed.
pub fn reload_knowledge_if_changed<P: AsRef<Path>>(
    path: P,
    current: &Arc<KnowledgeBase>
) -> Result<Option<Arc<KnowledgeBase>>, KnowledgeError> {
    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound && current.is_builtin() => {
            return Ok(None);
        }
        Err(e) => {
            return Err(e.into());
        }
    };

    if let Ok(modified) = metadata.modified() {
        match current.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Knowledge file changed, reloading...");
                return load_knowledge(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading knowledge...");
                return load_knowledge(path).map(Some);
            }
        }
    }
    Ok(None)
}
