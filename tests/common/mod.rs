//! Shared test utilities

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use satchel_gateway::db::{self, DbPool, User, UserRepo};
use satchel_gateway::llm::{ChatBackend, ChatMessage};
use satchel_gateway::{Error, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create a test user in the database
pub fn create_test_user(db: &DbPool, username: &str) -> User {
    UserRepo::new(db.clone())
        .create(username)
        .expect("failed to create test user")
}

/// A reply the scripted backend will produce
pub enum ScriptReply {
    Text(String),
    RateLimited,
}

impl ScriptReply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// Chat backend that replays queued replies and records every call
pub struct ScriptedChat {
    replies: Mutex<VecDeque<ScriptReply>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<ScriptReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue another reply
    pub fn push(&self, reply: ScriptReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Number of completions requested so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The final user message of call `i` (the prompt the pipeline built)
    pub fn prompt(&self, i: usize) -> String {
        self.calls.lock().unwrap()[i]
            .iter()
            .rev()
            .find(|m| matches!(m.role, satchel_gateway::llm::ChatRole::User))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// All messages of call `i`
    pub fn messages(&self, i: usize) -> Vec<ChatMessage> {
        self.calls.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());

        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptReply::Text(reply)) => Ok(reply),
            Some(ScriptReply::RateLimited) => Err(Error::UpstreamRateLimited(
                "scripted rate limit".to_string(),
            )),
            None => Err(Error::Chat("script exhausted".to_string())),
        }
    }
}
