//! Conversation log and per-conversation processing state.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Append-only sequence of turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns
            .push(ConversationTurn::new(Role::Assistant, content));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent question asked by the user, if any.
    pub fn latest_user_question(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}

/// Processing state of a conversation.
///
/// `AwaitingInput -> Processing -> AwaitingInput` on success,
/// `AwaitingInput -> Processing -> ErrorDisplayed -> AwaitingInput` on failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    AwaitingInput,
    Processing,
    ErrorDisplayed,
}

impl TurnState {
    /// A new question may start from here. Starting from `ErrorDisplayed`
    /// implies the error was acknowledged.
    pub fn can_begin(self) -> bool {
        !matches!(self, TurnState::Processing)
    }

    /// State after a pipeline run finishes.
    pub fn finish(self, success: bool) -> TurnState {
        match (self, success) {
            (TurnState::Processing, true) => TurnState::AwaitingInput,
            (TurnState::Processing, false) => TurnState::ErrorDisplayed,
            (other, _) => other,
        }
    }

    /// State after a run was abandoned before it finished.
    pub fn abandon(self) -> TurnState {
        match self {
            TurnState::Processing => TurnState::AwaitingInput,
            other => other,
        }
    }

    /// State after the front end has shown an error.
    pub fn acknowledge(self) -> TurnState {
        match self {
            TurnState::ErrorDisplayed => TurnState::AwaitingInput,
            other => other,
        }
    }
}
