//! In-process chat relay.
//!
//! Messages fan out over a lossy `tokio::sync::broadcast` channel and are
//! delivered to each participant's SSE stream. A bounded history per
//! conversation is kept in memory only; it does not survive restarts. Once
//! [`MAX_CONVERSATIONS`] pairs are tracked, starting a new one evicts the
//! conversation that has been quiet the longest.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use tribal_core::{required_text, DomainError, DomainResult, MessageId, UserId};

pub const HISTORY_PER_CONVERSATION: usize = 100;
pub const MAX_BODY_CHARS: usize = 2000;
pub const MAX_CONVERSATIONS: usize = 10_000;
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub from: UserId,
    pub to: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn involves(&self, user: UserId) -> bool {
        self.from == user || self.to == user
    }
}

/// Unordered pair of participants.
fn conversation_key(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Debug)]
pub struct ChatHub {
    tx: broadcast::Sender<ChatMessage>,
    max_conversations: usize,
    history: Mutex<HashMap<(UserId, UserId), VecDeque<ChatMessage>>>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHub {
    pub fn new() -> Self {
        Self::with_max_conversations(MAX_CONVERSATIONS)
    }

    pub fn with_max_conversations(max_conversations: usize) -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            max_conversations: max_conversations.max(1),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Validate, record and broadcast a message. Recipient existence is the caller's check.
    pub fn send(&self, from: UserId, to: UserId, body: &str, now: DateTime<Utc>) -> DomainResult<ChatMessage> {
        if from == to {
            return Err(DomainError::validation("you cannot message yourself"));
        }
        let message = ChatMessage {
            id: MessageId::new(),
            from,
            to,
            body: required_text("body", body, MAX_BODY_CHARS)?,
            sent_at: now,
        };

        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            let key = conversation_key(from, to);
            if !history.contains_key(&key) && history.len() >= self.max_conversations {
                evict_quietest(&mut history);
            }
            let log = history.entry(key).or_default();
            if log.len() == HISTORY_PER_CONVERSATION {
                log.pop_front();
            }
            log.push_back(message.clone());
        }

        // No subscribers is fine: history still has the message.
        let _ = self.tx.send(message.clone());
        Ok(message)
    }

    /// Messages between `a` and `b`, oldest first.
    pub fn conversation(&self, a: UserId, b: UserId) -> Vec<ChatMessage> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .get(&conversation_key(a, b))
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.tx.subscribe()
    }
}

/// Drop the conversation whose latest message is oldest.
fn evict_quietest(history: &mut HashMap<(UserId, UserId), VecDeque<ChatMessage>>) {
    let quietest = history
        .iter()
        .min_by_key(|(_, log)| log.back().map(|m| m.sent_at))
        .map(|(key, _)| *key);
    if let Some(key) = quietest {
        history.remove(&key);
    }
}

/// SSE stream of messages sent to or by `user`. Lagged receivers skip ahead.
pub fn sse_stream(
    rx: broadcast::Receiver<ChatMessage>,
    user: UserId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.involves(user) => {
            let data = serde_json::to_string(&m).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event("message").id(m.id.to_string()).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
