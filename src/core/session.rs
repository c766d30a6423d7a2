//! Conversation state shared by every adapter built for one chat.
//!
//! Adapters are constructed per request, so the history lives here instead.
//! The send gate is a `tokio::sync::Mutex`, which hands out the lock in FIFO
//! order: concurrent sends on one session queue up rather than interleave.
//!
//! With a context limit set, vendors only see the most recent messages; the
//! stored history is never trimmed.

use crate::core::message::{Message, Sender};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::MutexGuard as AsyncMutexGuard;

#[derive(Debug, Default)]
pub struct ChatSession {
    history: Mutex<Vec<Message>>,
    send_gate: AsyncMutex<()>,
    context_limit: Option<usize>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that sends at most `limit` messages of context.
    pub fn with_context_limit(limit: usize) -> Self {
        Self {
            context_limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Message>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, message: Message) {
        self.entries().push(message);
    }

    pub fn history(&self) -> Vec<Message> {
        self.entries().clone()
    }

    /// The messages to send to a vendor: the whole history, or its tail
    /// when a limit is set. The tail always opens with a user turn.
    pub fn context(&self) -> Vec<Message> {
        let entries = self.entries();
        let Some(limit) = self.context_limit else {
            return entries.clone();
        };
        let mut start = entries.len().saturating_sub(limit);
        while start + 1 < entries.len() && entries[start].sender != Sender::User {
            start += 1;
        }
        entries[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Waits for this session's turn to send.
    pub async fn acquire_send(&self) -> AsyncMutexGuard<'_, ()> {
        self.send_gate.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn history_keeps_insertion_order_and_clears() {
        let session = ChatSession::new();
        session.push(Message::user("one"));
        session.push(Message::ai("two"));

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[1].text, "two");

        session.clear();
        assert!(session.history().is_empty());
    }

    #[test]
    fn context_limit_keeps_the_latest_turns() {
        let session = ChatSession::with_context_limit(4);
        for turn in ["one", "two", "three"] {
            session.push(Message::user(turn));
            session.push(Message::ai(format!("re: {turn}")));
        }
        session.push(Message::user("four"));

        let texts: Vec<_> = session.context().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["three", "re: three", "four"]);
        assert_eq!(session.history().len(), 7);

        let unlimited = ChatSession::new();
        unlimited.push(Message::user("one"));
        unlimited.push(Message::ai("two"));
        assert_eq!(unlimited.context().len(), 2);
    }

    #[tokio::test]
    async fn send_gate_serializes_holders() {
        let session = Arc::new(ChatSession::new());
        let guard = session.acquire_send().await;

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let _turn = session.acquire_send().await;
                session.push(Message::user("second"));
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.push(Message::user("first"));
        drop(guard);
        waiter.await.unwrap();

        let texts: Vec<_> = session.history().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
