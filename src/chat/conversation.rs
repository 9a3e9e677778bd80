use crate::chat::matcher::resolve;
use crate::chat::SharedKnowledge;
use crate::config::KnowledgeBase;
use crate::models::chat::Message;

use log::{ debug, warn };
use rand::Rng;
use std::sync::{ Arc, Mutex, MutexGuard };
use std::time::Duration;
use tokio::sync::{ broadcast, mpsc, watch, RwLock };
use tokio::time::{ sleep_until, Instant };
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

/// Cosmetic "thinking" pause before a bot reply: `base` plus a uniformly
/// random share of `jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl ReplyDelay {
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub const fn fixed(base: Duration) -> Self {
        Self { base, jitter: Duration::ZERO }
    }

    pub const fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.base;
        }
        self.base.saturating_add(Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms)))
    }
}

impl Default for ReplyDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(800), Duration::from_millis(600))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    UserMessage(Message),
    Typing,
    Reply(Message),
}

struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

struct State {
    transcript: Mutex<Transcript>,
    in_flight: watch::Sender<usize>,
    events: broadcast::Sender<ConversationEvent>,
}

impl State {
    fn lock(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Ids are handed out under the transcript lock so they grow in append order.
    fn append(&self, make: impl FnOnce(u64) -> Message) -> Message {
        let mut transcript = self.lock();
        let message = make(transcript.next_id);
        transcript.next_id += 1;
        transcript.messages.push(message.clone());
        message
    }

    fn finish_one(&self) {
        self.in_flight.send_modify(|n| {
            *n = n.saturating_sub(1);
        });
    }
}

struct PendingReply {
    text: String,
    due: Instant,
}

/// One chat session: an append-only transcript seeded with the welcome
/// message, plus a worker that answers submissions in the order they arrived.
pub struct Conversation {
    id: String,
    state: Arc<State>,
    queue: mpsc::UnboundedSender<PendingReply>,
    delay: ReplyDelay,
}

impl Conversation {
    /// Starts a conversation against shared, reloadable knowledge.
    /// Must be called from within a Tokio runtime.
    pub async fn new(knowledge: SharedKnowledge, delay: ReplyDelay) -> Self {
        let welcome = knowledge.read().await.welcome().to_string();
        Self::start(knowledge, welcome, delay)
    }

    /// Starts a conversation against a fixed knowledge base.
    /// Must be called from within a Tokio runtime.
    pub fn with_knowledge(kb: Arc<KnowledgeBase>, delay: ReplyDelay) -> Self {
        let welcome = kb.welcome().to_string();
        Self::start(Arc::new(RwLock::new(kb)), welcome, delay)
    }

    fn start(knowledge: SharedKnowledge, welcome: String, delay: ReplyDelay) -> Self {
        let (in_flight, _) = watch::channel(0usize);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = Arc::new(State {
            transcript: Mutex::new(Transcript {
                messages: vec![Message::bot(1, welcome)],
                next_id: 2,
            }),
            in_flight,
            events,
        });

        let (queue, replies) = mpsc::unbounded_channel();
        tokio::spawn(run_replies(replies, knowledge, Arc::clone(&state)));

        Self {
            id: Uuid::new_v4().to_string(),
            state,
            queue,
            delay,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Appends the user's message right away and schedules the bot reply.
    ///
    /// Blank input is ignored and returns `None`. Each accepted submission
    /// gets its own reply, computed from the text of that submission.
    pub fn submit(&self, text: &str) -> Option<Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let message = self.state.append(|id| Message::user(id, text));
        self.state.in_flight.send_modify(|n| {
            *n += 1;
        });
        let _ = self.state.events.send(ConversationEvent::UserMessage(message.clone()));
        let _ = self.state.events.send(ConversationEvent::Typing);

        let now = Instant::now();
        let due = now.checked_add(self.delay.sample()).unwrap_or_else(|| {
            warn!("Reply delay {:?} is out of range; replying immediately", self.delay);
            now
        });
        let reply = PendingReply {
            text: text.to_string(),
            due,
        };
        if self.queue.send(reply).is_err() {
            warn!("Reply worker for conversation {} is gone; message {} will not be answered", self.id, message.id);
            self.state.finish_one();
        }

        Some(message)
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_pending(&self) -> bool {
        *self.state.in_flight.borrow() > 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.state.events.subscribe()
    }

    /// Resolves once every submitted message has been answered.
    pub async fn settled(&self) {
        let mut in_flight = self.state.in_flight.subscribe();
        let _ = in_flight.wait_for(|n| *n == 0).await;
    }
}

async fn run_replies(
    mut replies: mpsc::UnboundedReceiver<PendingReply>,
    knowledge: SharedKnowledge,
    state: Arc<State>
) {
    // Delays are measured from submission, so queued replies wait concurrently
    // while still being appended in submission order.
    while let Some(reply) = replies.recv().await {
        sleep_until(reply.due).await;
        let kb = Arc::clone(&*knowledge.read().await);
        let text = resolve(&reply.text, &kb);
        let message = state.append(|id| Message::bot(id, text));
        state.finish_one();
        debug!("Answered {:?} with message {}", reply.text, message.id);
        let _ = state.events.send(ConversationEvent::Reply(message));
    }
}
