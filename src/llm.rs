//! Generation provider abstraction
//!
//! The debate engine treats the provider as an opaque streaming token source
//! that may also report tool activity (evidence registration).

mod error;
mod openai;
mod sse;
mod types;

pub use error::ProviderError;
pub use openai::OpenAiProvider;
pub use types::*;

use crate::evidence::EvidenceDraft;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Common interface for generation providers
#[async_trait]
pub trait DebateProvider: Send + Sync {
    /// Start a streamed speaking turn. Cancelling `cancel` asks the provider to
    /// stop producing; the returned stream then ends.
    async fn stream_turn(
        &self,
        request: &TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnStream, ProviderError>;

    /// Non-streamed structured analysis of the dilemma
    async fn case_brief(
        &self,
        dilemma: &str,
        attachments: &[Attachment],
    ) -> Result<CaseBrief, ProviderError>;

    /// Short research request scoped to `query`
    async fn research(&self, query: &str) -> Result<Vec<EvidenceDraft>, ProviderError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: DebateProvider + ?Sized> DebateProvider for Arc<T> {
    async fn stream_turn(
        &self,
        request: &TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnStream, ProviderError> {
        (**self).stream_turn(request, cancel).await
    }

    async fn case_brief(
        &self,
        dilemma: &str,
        attachments: &[Attachment],
    ) -> Result<CaseBrief, ProviderError> {
        (**self).case_brief(dilemma, attachments).await
    }

    async fn research(&self, query: &str) -> Result<Vec<EvidenceDraft>, ProviderError> {
        (**self).research(query).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for providers
pub struct LoggingProvider<P> {
    inner: P,
}

impl<P: DebateProvider> LoggingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    fn log_outcome<T>(&self, call: &str, started: std::time::Instant, result: &Result<T, ProviderError>) {
        let duration = started.elapsed();
        match result {
            Ok(_) => {
                tracing::info!(
                    provider = %self.inner.name(),
                    call,
                    duration_ms = %duration.as_millis(),
                    "Provider request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.inner.name(),
                    call,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Provider request failed"
                );
            }
        }
    }
}

#[async_trait]
impl<P: DebateProvider> DebateProvider for LoggingProvider<P> {
    async fn stream_turn(
        &self,
        request: &TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnStream, ProviderError> {
        let started = std::time::Instant::now();
        let result = self.inner.stream_turn(request, cancel).await;
        tracing::debug!(
            speaker = %request.speaker,
            model = %request.model,
            messages = request.messages.len(),
            "Turn stream requested"
        );
        self.log_outcome("stream_turn", started, &result);
        result
    }

    async fn case_brief(
        &self,
        dilemma: &str,
        attachments: &[Attachment],
    ) -> Result<CaseBrief, ProviderError> {
        let started = std::time::Instant::now();
        let result = self.inner.case_brief(dilemma, attachments).await;
        self.log_outcome("case_brief", started, &result);
        result
    }

    async fn research(&self, query: &str) -> Result<Vec<EvidenceDraft>, ProviderError> {
        let started = std::time::Instant::now();
        let result = self.inner.research(query).await;
        if let Ok(found) = &result {
            tracing::debug!(found = found.len(), "Research returned evidence");
        }
        self.log_outcome("research", started, &result);
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
