//! Common types for provider interactions

use super::ProviderError;
use crate::evidence::EvidenceDraft;
use crate::state_machine::{Phase, Role};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Message in the conversation handed to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// One speaking turn's request
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub speaker: Role,
    pub phase: Phase,
    pub model: String,
    pub system: String,
    pub messages: Vec<HistoryMessage>,
    /// Whether the evidence registration tool is offered
    pub tools_enabled: bool,
}

/// Unit produced by a streaming turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// Text increment
    Text(String),
    ToolStarted { tool: String, query: String },
    ToolCompleted {
        tool: String,
        evidence: Vec<EvidenceDraft>,
    },
}

pub type TurnStream = Pin<Box<dyn Stream<Item = Result<StreamItem, ProviderError>> + Send>>;

/// Uploaded document or image, base64-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub media_type: String,
    pub data: String,
}

/// A dimension along which the two sides pull in different directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensionAxis {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Structured analysis of the dilemma produced before discovery
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseBrief {
    pub summary: String,
    #[serde(default)]
    pub tension_axes: Vec<TensionAxis>,
}

/// Model used for each kind of call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleModels {
    pub researcher: String,
    pub defense: String,
    pub prosecution: String,
    pub cross_exam: String,
    pub judge: String,
}

impl Default for RoleModels {
    fn default() -> Self {
        Self {
            researcher: "gpt-4.1-mini".to_string(),
            defense: "gpt-5-mini".to_string(),
            prosecution: "gpt-5-mini".to_string(),
            cross_exam: "gpt-4.1-mini".to_string(),
            judge: "gpt-5.2".to_string(),
        }
    }
}

impl RoleModels {
    /// Model for a role speaking in `phase`. Cross-examination uses its own
    /// model for both sides.
    pub fn for_turn(&self, role: Role, phase: Phase) -> &str {
        if matches!(phase, Phase::CrossExam { .. }) {
            return &self.cross_exam;
        }
        match role {
            Role::Researcher => &self.researcher,
            Role::Defense => &self.defense,
            Role::Prosecution => &self.prosecution,
            Role::Judge => &self.judge,
        }
    }
}
