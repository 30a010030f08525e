//! OpenRouter-backed reasoning engine.

use super::{
    ExchangeRequest, ReasoningEngine, ReasoningError, ReasoningFuture, ToolExchange, dispatch_call,
};
use crate::agent::events::{EventHandler, RunEvent};
use crate::api::retry::{RetryConfig, retry_api_call};
use crate::error::OrchestratorError;
use crate::tools::ToolRegistry;
use crate::{ChatCompletion, ChatRequest, DEFAULT_MODEL, Message, OpenRouterClient};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Environment variable holding the OpenRouter API key.
pub const API_KEY_VAR: &str = "OPENROUTER_KEY";

/// API-reported token usage accumulated by one [`ChatReasoner`].
///
/// The run budget works on estimates; this is what the provider billed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApiUsage {
    pub calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl ApiUsage {
    fn add(&mut self, prompt_tokens: u32, completion_tokens: u32) {
        self.calls += 1;
        self.prompt_tokens += u64::from(prompt_tokens);
        self.completion_tokens += u64::from(completion_tokens);
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl fmt::Display for ApiUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} call(s), tokens: {} prompt + {} completion = {} total",
            self.calls,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens()
        )
    }
}

/// Reasoning over an OpenAI-compatible chat completions API.
///
/// Transient failures (429, 5xx, timeouts) are retried with backoff;
/// context-length overflows are not and surface as
/// [`ReasoningError::ContextLength`].
pub struct ChatReasoner {
    client: OpenRouterClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
    usage: Mutex<ApiUsage>,
}

impl ChatReasoner {
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.0,
            retry: RetryConfig::default(),
            usage: Mutex::new(ApiUsage::default()),
        }
    }

    /// Build from `OPENROUTER_KEY`.
    pub fn from_env(model: Option<&str>) -> Result<Self, OrchestratorError> {
        let key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                OrchestratorError::invalid_input(format!("{API_KEY_VAR} environment variable not set"))
            })?;
        let client = OpenRouterClient::new(key).map_err(OrchestratorError::internal)?;
        Ok(Self::new(client, model.unwrap_or(DEFAULT_MODEL)))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// API-reported usage so far.
    pub fn usage(&self) -> ApiUsage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }

    fn request(&self, messages: Vec<Message>, exchange: Option<&ExchangeRequest>, tools: &ToolRegistry) -> ChatRequest {
        let defs = exchange
            .map(|r| tools.definitions_for(&r.tools))
            .filter(|d| !d.is_empty());
        ChatRequest {
            model: Some(self.model.clone()),
            messages,
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            tools: defs,
            ..Default::default()
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<ChatCompletion, ReasoningError> {
        retry_api_call(&self.retry, || self.client.chat(body))
            .await
            .map_err(ReasoningError::from_message)
    }

    /// Add the completion's reported usage, if any, to the running total.
    fn tally(&self, completion: &ChatCompletion) -> Option<(u32, u32)> {
        let usage = completion.usage.as_ref()?;
        let pt = usage.prompt_tokens.unwrap_or(0);
        let ct = usage.completion_tokens.unwrap_or(0);
        if let Ok(mut total) = self.usage.lock() {
            total.add(pt, ct);
        }
        Some((pt, ct))
    }

    fn record_usage(&self, completion: &ChatCompletion, events: &dyn EventHandler) {
        if let Some((prompt_tokens, completion_tokens)) = self.tally(completion) {
            events.on_event(&RunEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            });
        }
    }

    async fn run_exchange(
        &self,
        request: &ExchangeRequest,
        tools: &ToolRegistry,
        events: &dyn EventHandler,
    ) -> Result<ToolExchange, ReasoningError> {
        events.on_event(&RunEvent::ChainStart {
            name: &request.name,
        });

        let mut messages = vec![Message::system(&request.system), Message::user(&request.input)];
        let mut invocations = Vec::new();
        let mut output = None;
        let mut last_text = String::new();

        for round in 0..request.max_rounds {
            events.on_event(&RunEvent::ReasoningStart);
            let body = self.request(messages.clone(), Some(request), tools);
            let completion = self.send(&body).await?;
            self.record_usage(&completion, events);

            let text = completion.content.clone().unwrap_or_default();
            events.on_event(&RunEvent::ReasoningEnd { text: &text });

            if completion.tool_calls.is_empty() {
                output = Some(text);
                break;
            }

            if !text.trim().is_empty() {
                events.on_event(&RunEvent::Thinking(&text));
            }
            debug!(
                "Round {}: {} tool call(s) proposed",
                round + 1,
                completion.tool_calls.len()
            );

            messages.push(Message::assistant_tool_calls(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));
            // Sequential: each result is in the conversation before the next call runs.
            for call in &completion.tool_calls {
                let (record, result) = dispatch_call(
                    request,
                    tools,
                    events,
                    &call.function.name,
                    &call.function.arguments,
                )
                .await;
                invocations.extend(record);
                messages.push(Message::tool_result(&call.id, result));
            }
            last_text = text;
        }

        let output = output.unwrap_or_else(|| {
            warn!(
                "Exchange '{}' hit the {} round limit without a final answer",
                request.name, request.max_rounds
            );
            if last_text.trim().is_empty() {
                format!(
                    "Stopped after {} reasoning rounds without a final answer.",
                    request.max_rounds
                )
            } else {
                last_text
            }
        });

        events.on_event(&RunEvent::Finished { output: &output });
        events.on_event(&RunEvent::ChainEnd { output: &output });
        Ok(ToolExchange {
            output,
            invocations,
        })
    }
}

impl ReasoningEngine for ChatReasoner {
    fn complete<'a>(&'a self, prompt: &'a str) -> ReasoningFuture<'a, String> {
        Box::pin(async move {
            let body = self.request(vec![Message::user(prompt)], None, &ToolRegistry::new());
            let completion = self.send(&body).await?;
            self.tally(&completion);
            Ok(completion.content.unwrap_or_default())
        })
    }

    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
        tools: &'a ToolRegistry,
        events: &'a dyn EventHandler,
    ) -> ReasoningFuture<'a, ToolExchange> {
        Box::pin(self.run_exchange(request, tools, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tracer::{ExecutionTracer, TraceKind};
    use crate::tools::{Tool, ToolFuture, ToolName, ToolOutcome};
    use crate::ToolDef;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn usage_accumulates_across_calls() {
        let mut usage = ApiUsage::default();
        usage.add(1000, 500);
        usage.add(2000, 1000);
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.total_tokens(), 4500);
        assert_eq!(
            usage.to_string(),
            "2 call(s), tokens: 3000 prompt + 1500 completion = 4500 total"
        );
    }

    /// Serve canned HTTP 200 JSON bodies, one per connection, in order.
    async fn serve(bodies: Vec<serde_json::Value>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 64 * 1024];
                let mut read = 0;
                // Read until the end of headers plus the declared body.
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read += n;
                    let head = String::from_utf8_lossy(&buf[..read]).to_string();
                    if let Some(end) = head.find("\r\n\r\n") {
                        let len = head
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                            })
                            .unwrap_or(0);
                        if read >= end + 4 + len {
                            break;
                        }
                    }
                }
                let payload = body.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{addr}/v1/chat/completions")
    }

    struct Buckets;

    impl Tool for Buckets {
        fn name(&self) -> ToolName {
            ToolName::ListS3Buckets
        }
        fn definition(&self) -> ToolDef {
            ToolDef::new("list_s3_buckets", "List buckets", serde_json::json!({"type": "object"}))
        }
        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            Box::pin(async { ToolOutcome::success(r#"[{"Name":"logs"}]"#) })
        }
    }

    fn reasoner(endpoint: String) -> ChatReasoner {
        let client = OpenRouterClient::new("test-key").unwrap().with_endpoint(endpoint);
        ChatReasoner::new(client, DEFAULT_MODEL).with_retry(RetryConfig::with_retries(0))
    }

    #[tokio::test]
    async fn exchange_runs_tools_then_finishes() {
        let endpoint = serve(vec![
            serde_json::json!({
                "choices": [{
                    "message": {
                        "content": "Checking storage first.",
                        "tool_calls": [{
                            "id": "call-1",
                            "type": "function",
                            "function": {"name": "list_s3_buckets", "arguments": "{}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }),
            serde_json::json!({
                "choices": [{
                    "message": {"content": "One bucket, compliant."},
                    "finish_reason": "stop"
                }]
            }),
        ])
        .await;

        let engine = reasoner(endpoint);
        let tools = ToolRegistry::new().with(Buckets);
        let tracer = ExecutionTracer::new();
        let request = ExchangeRequest::new("compliance_cycle", "sys", "Perform compliance check")
            .with_tools(&[ToolName::ListS3Buckets]);

        let exchange = engine.exchange(&request, &tools, &tracer).await.unwrap();
        assert_eq!(exchange.output, "One bucket, compliant.");
        assert_eq!(exchange.invocations.len(), 1);
        assert_eq!(exchange.invocations[0].tool, ToolName::ListS3Buckets);

        let kinds: Vec<TraceKind> = tracer.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds.first(), Some(&TraceKind::ChainStart));
        assert_eq!(kinds.last(), Some(&TraceKind::ChainEnd));
        assert!(kinds.contains(&TraceKind::Thinking));
        assert!(kinds.contains(&TraceKind::ToolStart));
        assert!(kinds.contains(&TraceKind::Finished));
        assert_eq!(engine.usage().calls, 1);
    }

    #[tokio::test]
    async fn api_error_is_classified() {
        let endpoint = serve(vec![serde_json::json!({
            "error": {"message": "This model's maximum context length is 64000 tokens"}
        })])
        .await;
        let engine = reasoner(endpoint);
        let err = engine.complete("hello").await.unwrap_err();
        assert!(err.is_context_length());
    }

    #[test]
    fn request_omits_tools_when_none_offered() {
        let client = OpenRouterClient::new("k").unwrap();
        let engine = ChatReasoner::new(client, "m");
        let body = engine.request(vec![Message::user("x")], None, &ToolRegistry::new().with(Buckets));
        assert!(body.tools.is_none());
        assert_eq!(body.temperature, Some(0.0));
    }
}
