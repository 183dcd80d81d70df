//! `OpenAI`-compatible provider implementation
//!
//! Turns are streamed from the chat completions endpoint. During discovery
//! the model is offered a `format_evidence` function; each call is surfaced
//! as tool events and answered with the evidence id so the model can cite
//! it, after which the completion continues in a follow-up request.

use super::sse::{SseDecoder, SseFrame};
use super::types::{Attachment, CaseBrief, HistoryMessage, RoleModels, StreamItem, TurnRequest, TurnStream};
use super::{DebateProvider, ProviderError};
use crate::evidence::{new_evidence_id, EvidenceDraft};
use crate::prompts;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const EVIDENCE_TOOL: &str = "format_evidence";
/// Upper bound on request rounds caused by tool calls within one turn
const MAX_TOOL_ROUNDS: usize = 8;
const JSON_CALL_TIMEOUT: Duration = Duration::from_secs(120);

type ItemSender = mpsc::Sender<Result<StreamItem, ProviderError>>;

/// OpenAI-compatible chat completions provider
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    models: RoleModels,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        models: RoleModels,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            models,
        })
    }

    fn translate_messages(system: &str, history: &[HistoryMessage]) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::text("system", system))
            .chain(
                history
                    .iter()
                    .map(|m| ChatMessage::text(m.role.as_str(), &m.content)),
            )
            .collect()
    }

    /// Send a request and turn HTTP failures into classified errors
    async fn post(
        &self,
        body: &ChatRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ProviderError::network(format!("Connection failed: {e}"))
            } else {
                ProviderError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("Failed to read response: {e}")))?;
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|r| r.error.message)
            .unwrap_or(body);
        Err(ProviderError::from_status(status.as_u16(), &message))
    }

    /// One non-streamed JSON-mode completion parsed into `T`
    async fn complete_json<T: DeserializeOwned>(
        &self,
        model: &str,
        system: &str,
        user: ChatContent,
    ) -> Result<T, ProviderError> {
        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage::text("system", system),
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(user),
                    tool_calls: None,
                    tool_call_id: None,
                },
            ],
            stream: false,
            tools: None,
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let response = self.post(&body, Some(JSON_CALL_TIMEOUT)).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("Failed to read response: {e}")))?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::unknown(format!("Failed to parse response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::unknown("No content in response"))?;

        serde_json::from_str(&content)
            .map_err(|e| ProviderError::unknown(format!("Malformed JSON from model: {e}")))
    }
}

#[async_trait]
impl DebateProvider for OpenAiProvider {
    async fn stream_turn(
        &self,
        request: &TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnStream, ProviderError> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: Self::translate_messages(&request.system, &request.messages),
            stream: true,
            tools: request.tools_enabled.then(|| vec![evidence_tool()]),
            response_format: None,
        };

        // The first request is made eagerly so connection and auth failures
        // surface to the caller instead of inside the stream.
        let response = self.post(&body, None).await?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump(self.clone(), body, response, tx, cancel));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn case_brief(
        &self,
        dilemma: &str,
        attachments: &[Attachment],
    ) -> Result<CaseBrief, ProviderError> {
        let mut parts = vec![ContentPart::Text {
            text: format!("DILEMMA: {dilemma}"),
        }];
        for attachment in attachments {
            if attachment.media_type.starts_with("image/") {
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", attachment.media_type, attachment.data),
                    },
                });
            } else {
                tracing::warn!(media_type = %attachment.media_type, "Skipping non-image attachment");
            }
        }

        self.complete_json(&self.models.researcher, prompts::CASE_BRIEF, ChatContent::Parts(parts))
            .await
    }

    async fn research(&self, query: &str) -> Result<Vec<EvidenceDraft>, ProviderError> {
        let found: ResearchResponse = self
            .complete_json(
                &self.models.researcher,
                prompts::DIRECTIVE_RESEARCH,
                ChatContent::Text(query.to_string()),
            )
            .await?;
        Ok(found.evidence)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Drive one turn: read streamed rounds, answer evidence tool calls and
/// continue until the model stops calling tools or `cancel` fires.
async fn pump(
    provider: OpenAiProvider,
    mut body: ChatRequest,
    mut response: reqwest::Response,
    tx: ItemSender,
    cancel: CancellationToken,
) {
    for round in 1..=MAX_TOOL_ROUNDS {
        let calls = tokio::select! {
            () = cancel.cancelled() => return,
            calls = read_round(response, &tx) => calls,
        };
        let calls = match calls {
            Ok(calls) if !calls.is_empty() => calls,
            Ok(_) => return,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        body.messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(calls.clone()),
            tool_call_id: None,
        });
        for call in calls {
            let Some(result) = answer_tool_call(&call, &tx).await else {
                return;
            };
            body.messages.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(ChatContent::Text(result)),
                tool_calls: None,
                tool_call_id: Some(call.id),
            });
        }

        if round == MAX_TOOL_ROUNDS {
            tracing::warn!(rounds = round, "Tool round limit reached; ending turn");
            return;
        }
        response = tokio::select! {
            () = cancel.cancelled() => return,
            next = provider.post(&body, None) => match next {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            },
        };
    }
}

/// Surface one tool call as events. Returns the tool result handed back to
/// the model, or `None` once the receiver is gone.
async fn answer_tool_call(call: &ToolCall, tx: &ItemSender) -> Option<String> {
    let tool = call.function.name.clone();
    if tool != EVIDENCE_TOOL {
        return Some(format!("Error: unknown tool '{tool}'"));
    }
    let mut draft: EvidenceDraft = match serde_json::from_str(&call.function.arguments) {
        Ok(draft) => draft,
        Err(e) => return Some(format!("Error: invalid arguments: {e}")),
    };
    let id = new_evidence_id();
    draft.id = Some(id.clone());

    let started = StreamItem::ToolStarted {
        tool: tool.clone(),
        query: draft.title.clone(),
    };
    let result = serde_json::json!({ "id": id, "title": draft.title }).to_string();
    let completed = StreamItem::ToolCompleted {
        tool,
        evidence: vec![draft],
    };
    if tx.send(Ok(started)).await.is_err() || tx.send(Ok(completed)).await.is_err() {
        return None;
    }
    Some(result)
}

/// Read one streamed response, forwarding text. Returns the tool calls the
/// model finished with, if any.
async fn read_round(
    response: reqwest::Response,
    tx: &ItemSender,
) -> Result<Vec<ToolCall>, ProviderError> {
    let mut decoder = SseDecoder::new();
    let mut pending: Vec<ToolCall> = Vec::new();
    let mut bytes = Box::pin(response.bytes_stream());

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk.map_err(|e| ProviderError::network(format!("Stream read failed: {e}")))?;
        for frame in decoder.push(&chunk) {
            match frame {
                SseFrame::Done => return Ok(finish_calls(pending)),
                SseFrame::Data(payload) => {
                    if !apply_chunk(&payload, &mut pending, tx).await? {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }
    if let Some(SseFrame::Data(payload)) = decoder.finish() {
        apply_chunk(&payload, &mut pending, tx).await?;
    }
    Ok(finish_calls(pending))
}

/// Apply one streamed chunk. Returns `false` once the receiver is gone.
async fn apply_chunk(
    payload: &str,
    pending: &mut Vec<ToolCall>,
    tx: &ItemSender,
) -> Result<bool, ProviderError> {
    let chunk: ChatChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse stream chunk");
            return Ok(true);
        }
    };
    if let Some(error) = chunk.error {
        return Err(ProviderError::server_error(format!("Stream error: {}", error.message)));
    }

    for choice in chunk.choices {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            if tx.send(Ok(StreamItem::Text(text))).await.is_err() {
                return Ok(false);
            }
        }
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            merge_tool_delta(pending, delta);
        }
    }
    Ok(true)
}

/// Tool calls arrive as fragments keyed by index; arguments are concatenated
fn merge_tool_delta(pending: &mut Vec<ToolCall>, delta: ToolCallDelta) {
    while pending.len() <= delta.index {
        pending.push(ToolCall::default());
    }
    let call = &mut pending[delta.index];
    if let Some(id) = delta.id {
        call.id = id;
    }
    if let Some(function) = delta.function {
        if let Some(name) = function.name {
            call.function.name.push_str(&name);
        }
        if let Some(arguments) = function.arguments {
            call.function.arguments.push_str(&arguments);
        }
    }
}

fn finish_calls(pending: Vec<ToolCall>) -> Vec<ToolCall> {
    pending
        .into_iter()
        .filter(|c| !c.function.name.is_empty())
        .collect()
}

fn evidence_tool() -> ChatTool {
    ChatTool {
        r#type: "function".to_string(),
        function: ChatFunction {
            name: EVIDENCE_TOOL.to_string(),
            description: "Register a piece of evidence with the court. Returns the id to cite \
                          as [TOOL:<id>]."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Title of the source" },
                    "snippet": { "type": "string", "description": "Key finding, 1-3 sentences" },
                    "source": { "type": "string", "description": "Publisher, e.g. Nature" },
                    "source_type": { "type": "string", "enum": ["web", "academic", "news"] },
                    "date": { "type": "string", "description": "Publication date, e.g. 2025-03" },
                    "url": { "type": "string" }
                },
                "required": ["title", "snippet", "source"]
            }),
        },
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<ChatContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(ChatContent::Text(content.to_string())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResearchResponse {
    #[serde(default)]
    evidence: Vec<EvidenceDraft>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
