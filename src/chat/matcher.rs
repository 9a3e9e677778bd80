use crate::config::KnowledgeBase;
use rand::seq::SliceRandom;
use rand::Rng;

/// Which rule produced a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Topic(usize),
    Fallback,
}

/// Classifies `input` against the knowledge base without picking a reply.
///
/// Greeting openers are matched as prefixes of the trimmed, lowercased input.
/// Topic keywords are matched as plain substrings, so "report" also fires on
/// "reporting" or "reported". The first topic in declaration order wins.
pub fn classify(input: &str, kb: &KnowledgeBase) -> Intent {
    let lowered = input.trim().to_lowercase();

    if kb.is_greeting(&lowered) {
        return Intent::Greeting;
    }

    match kb.topics().iter().position(|topic| topic.matches(&lowered)) {
        Some(index) => Intent::Topic(index),
        None => Intent::Fallback,
    }
}

pub fn resolve(input: &str, kb: &KnowledgeBase) -> String {
    resolve_with(input, kb, &mut rand::thread_rng())
}

pub fn resolve_with<R: Rng + ?Sized>(input: &str, kb: &KnowledgeBase, rng: &mut R) -> String {
    match classify(input, kb) {
        Intent::Greeting => pick(kb.greetings(), rng),
        Intent::Topic(index) => kb.topics()[index].response.clone(),
        Intent::Fallback => pick(kb.fallback(), rng),
    }
}

// KnowledgeBase guarantees both lists are non-empty.
fn pick<R: Rng + ?Sized>(options: &[String], rng: &mut R) -> String {
    options.choose(rng).cloned().unwrap_or_default()
}
