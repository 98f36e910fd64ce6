use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::{ApiError, ChatRequest, CopilotApi};
use crate::session::SessionContext;

pub const MAX_MESSAGE_CHARS: usize = 1_000;
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1_500);
pub const DEFAULT_MODEL_PROVIDER: &str = "groq";

pub const WELCOME_TEXT: &str = "Welcome to Database Copilot! I'm here to help you with your \
database queries. Ask me anything about your database structure, data, or operations.";
pub const CANNED_REPLY_TEXT: &str = "I understand your query. Let me analyze your database and \
provide you with the information you need. This is a placeholder response while the assistant \
runs in offline mode.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Creation time in milliseconds since the epoch, bumped when two
    /// messages land in the same millisecond.
    pub id: u64,
    pub text: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("sign in to chat with the assistant")]
    NotAuthenticated,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One user message waiting for its assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExchange {
    pub connection_id: String,
    pub text: String,
}

#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn reply(&self, exchange: &PendingExchange) -> Result<String, ChatError>;
}

/// Offline responder: waits a fixed delay and answers with placeholder text.
#[derive(Debug, Clone)]
pub struct CannedResponder {
    delay: Duration,
    text: String,
}

impl Default for CannedResponder {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_DELAY)
    }
}

impl CannedResponder {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            text: CANNED_REPLY_TEXT.to_string(),
        }
    }
}

#[async_trait]
impl ChatResponder for CannedResponder {
    async fn reply(&self, _exchange: &PendingExchange) -> Result<String, ChatError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.clone())
    }
}

/// Answers through `POST /api/chat` with the current session's bearer token.
pub struct BackendResponder {
    api: Arc<dyn CopilotApi>,
    session: Arc<SessionContext>,
    model_provider: String,
}

impl std::fmt::Debug for BackendResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResponder")
            .field("model_provider", &self.model_provider)
            .finish_non_exhaustive()
    }
}

impl BackendResponder {
    #[must_use]
    pub fn new(
        api: Arc<dyn CopilotApi>,
        session: Arc<SessionContext>,
        model_provider: impl Into<String>,
    ) -> Self {
        Self {
            api,
            session,
            model_provider: model_provider.into(),
        }
    }
}

#[async_trait]
impl ChatResponder for BackendResponder {
    async fn reply(&self, exchange: &PendingExchange) -> Result<String, ChatError> {
        let access_token = self
            .session
            .access_token()
            .ok_or(ChatError::NotAuthenticated)?;
        let request = ChatRequest {
            message: exchange.text.clone(),
            connection_id: exchange.connection_id.clone(),
            model_provider: self.model_provider.clone(),
        };
        let response = self.api.chat(&access_token, &request).await?;
        tracing::debug!(
            connection_id = %exchange.connection_id,
            tool_calls = response.tool_calls.len(),
            "assistant replied"
        );
        Ok(response.response)
    }
}

/// Append-only conversation for one connection with at most one exchange in
/// flight.
#[derive(Debug, Clone)]
pub struct ChatSurface {
    connection_id: String,
    messages: Vec<ChatMessage>,
    input: String,
    pending: bool,
    last_error: Option<ChatError>,
    last_id: u64,
}

impl ChatSurface {
    #[must_use]
    pub fn new(connection_id: impl Into<String>) -> Self {
        let mut surface = Self {
            connection_id: connection_id.into(),
            messages: Vec::new(),
            input: String::new(),
            pending: false,
            last_error: None,
            last_id: 0,
        };
        surface.append(Author::Assistant, WELCOME_TEXT.to_string());
        surface
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// First eight characters of the connection id, as shown in headers.
    #[must_use]
    pub fn short_connection_id(&self) -> &str {
        self.connection_id
            .char_indices()
            .nth(8)
            .map_or(self.connection_id.as_str(), |(index, _)| {
                &self.connection_id[..index]
            })
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&ChatError> {
        self.last_error.as_ref()
    }

    /// Whether the send control is active.
    #[must_use]
    pub fn can_send(&self) -> bool {
        !self.pending && !self.input.trim().is_empty()
    }

    pub fn push_input(&mut self, ch: char) -> bool {
        if self.input_len() >= MAX_MESSAGE_CHARS {
            return false;
        }
        self.input.push(ch);
        true
    }

    pub fn pop_input(&mut self) -> Option<char> {
        self.input.pop()
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.chars().take(MAX_MESSAGE_CHARS).collect();
    }

    /// Starts an exchange from the current input. No-op while a reply is
    /// pending or when the input is blank.
    pub fn begin_send(&mut self) -> Option<PendingExchange> {
        if !self.can_send() {
            return None;
        }

        let text = std::mem::take(&mut self.input);
        self.append(Author::User, text.clone());
        self.pending = true;
        self.last_error = None;
        Some(PendingExchange {
            connection_id: self.connection_id.clone(),
            text,
        })
    }

    /// Finishes the in-flight exchange. Ignored when nothing is pending.
    pub fn complete(&mut self, reply: Result<String, ChatError>) {
        if !self.pending {
            tracing::debug!(connection_id = %self.connection_id, "dropping unexpected reply");
            return;
        }

        self.pending = false;
        match reply {
            Ok(text) => self.append(Author::Assistant, text),
            Err(error) => {
                tracing::warn!(connection_id = %self.connection_id, %error, "chat reply failed");
                self.last_error = Some(error);
            }
        }
    }

    /// Convenience for callers that can await inline: begin, ask, complete.
    pub async fn send(&mut self, responder: &dyn ChatResponder) -> bool {
        let Some(exchange) = self.begin_send() else {
            return false;
        };
        let reply = responder.reply(&exchange).await;
        self.complete(reply);
        true
    }

    fn append(&mut self, author: Author, text: String) {
        let created_at = Utc::now();
        let millis = u64::try_from(created_at.timestamp_millis()).unwrap_or(0);
        let id = millis.max(self.last_id.saturating_add(1));
        self.last_id = id;
        self.messages.push(ChatMessage {
            id,
            text,
            author,
            created_at,
        });
    }
}
