//! In-memory chat history with a two-phase turn protocol.
//!
//! A question is first recorded as pending with [`ConversationLog::begin`].
//! The returned [`PendingTurn`] token must be passed to either
//! [`resolve`](ConversationLog::resolve), which appends a completed
//! [`ChatTurn`], or [`revert`](ConversationLog::revert), which drops it.
//! Only one turn can be pending at a time, and [`turns`](ConversationLog::turns)
//! never shows a half-finished exchange.

use anyhow::{bail, Result};
use chrono::Local;

use crate::answer::Answer;
use crate::models::ChatTurn;

/// Token for the in-flight question. Not `Clone`: it is consumed exactly once.
#[derive(Debug)]
pub struct PendingTurn {
    id: u64,
}

#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ChatTurn>,
    pending: Option<(u64, String)>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, question: &str) -> Result<PendingTurn> {
        if self.pending.is_some() {
            bail!("a question is already being answered");
        }
        let id = self.next_id;
        self.next_id += 1;
        self.pending = Some((id, question.to_string()));
        Ok(PendingTurn { id })
    }

    pub fn resolve(&mut self, pending: PendingTurn, answer: Answer) -> Result<&ChatTurn> {
        let question = self.take_pending(pending)?;
        self.turns.push(ChatTurn {
            question,
            answer: answer.text,
            sources: answer.sources,
            time: Local::now(),
        });
        Ok(&self.turns[self.turns.len() - 1])
    }

    pub fn revert(&mut self, pending: PendingTurn) -> Result<()> {
        self.take_pending(pending).map(|_| ())
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.pending = None;
    }

    /// Completed turns, oldest first.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// The question currently awaiting an answer, if any.
    pub fn pending_question(&self) -> Option<&str> {
        self.pending.as_ref().map(|(_, q)| q.as_str())
    }

    fn take_pending(&mut self, pending: PendingTurn) -> Result<String> {
        match self.pending.take() {
            Some((id, question)) if id == pending.id => Ok(question),
            other => {
                self.pending = other;
                bail!("turn is no longer pending")
            }
        }
    }
}
