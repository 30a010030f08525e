//! Single-pass analyses: one tool-calling exchange, no reflection.

use crate::agent::config::OrchestratorConfig;
use crate::agent::events::{Chained, EventHandler, NoopHandler};
use crate::agent::orchestrator::RunStatus;
use crate::agent::prompt::{
    DOCUMENT_ANALYSIS_CHAIN, DOCUMENT_ANALYSIS_INPUT, INFRASTRUCTURE_ANALYSIS_CHAIN,
    INFRASTRUCTURE_ANALYSIS_INPUT, document_analysis_prompt, infrastructure_analysis_prompt,
};
use crate::agent::records::ToolInvocationRecord;
use crate::agent::scoring::{ComplianceScore, parse_score};
use crate::agent::tracer::ExecutionTracer;
use crate::context::intake::{Truncation, prepare};
use crate::error::{OrchestratorError, Result};
use crate::reasoning::{ExchangeRequest, ReasoningEngine};
use crate::tools::{ToolName, ToolRegistry};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: RunStatus,
    /// The engine's markdown answer.
    pub analysis: String,
    pub tool_calls: Vec<ToolInvocationRecord>,
    pub score: ComplianceScore,
    pub logs: Vec<String>,
    #[serde(flatten)]
    pub truncation: Truncation,
}

/// Runs the document and infrastructure analyses.
pub struct Analyzer<'a> {
    engine: &'a dyn ReasoningEngine,
    tools: &'a ToolRegistry,
    config: OrchestratorConfig,
    events: &'a dyn EventHandler,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        engine: &'a dyn ReasoningEngine,
        tools: &'a ToolRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            engine,
            tools,
            config,
            events: &NoopHandler,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.events = handler;
        self
    }

    /// Compare the organization policy against a norm. Only ticket creation
    /// is offered.
    ///
    /// Both documents are cut to the safe input size; the result is flagged
    /// if either was.
    pub async fn analyze_documents(&self, norm_text: &str, pssi_text: &str) -> Result<AnalysisResult> {
        if norm_text.trim().is_empty() || pssi_text.trim().is_empty() {
            return Err(OrchestratorError::invalid_input("norm and policy text are required"));
        }
        let norm = prepare(norm_text, self.config.safe_input_tokens);
        let pssi = prepare(pssi_text, self.config.safe_input_tokens);
        let request = ExchangeRequest::new(
            DOCUMENT_ANALYSIS_CHAIN,
            document_analysis_prompt(&norm.text, &pssi.text),
            DOCUMENT_ANALYSIS_INPUT,
        )
        .with_tools(&[ToolName::CreateIssue]);
        self.run(request, norm.truncation().merge(pssi.truncation())).await
    }

    /// Check live inventory against the organization policy.
    pub async fn analyze_infrastructure(&self, pssi_text: &str) -> Result<AnalysisResult> {
        if pssi_text.trim().is_empty() {
            return Err(OrchestratorError::invalid_input("policy text is empty"));
        }
        let pssi = prepare(pssi_text, self.config.safe_input_tokens);
        let request = ExchangeRequest::new(
            INFRASTRUCTURE_ANALYSIS_CHAIN,
            infrastructure_analysis_prompt(&pssi.text),
            INFRASTRUCTURE_ANALYSIS_INPUT,
        )
        .with_tools(&ToolName::INVENTORY);
        self.run(request, pssi.truncation()).await
    }

    async fn run(&self, request: ExchangeRequest, truncation: Truncation) -> Result<AnalysisResult> {
        let request = request.with_max_rounds(self.config.max_tool_rounds);
        let tracer = ExecutionTracer::new();
        let events = Chained {
            first: &tracer,
            second: self.events,
        };

        let exchange = self.engine.exchange(&request, self.tools, &events).await?;
        let score = parse_score(&exchange.output);
        info!(
            "{} done: {} tool call(s), score {:?}",
            request.name,
            exchange.invocations.len(),
            score
        );
        Ok(AnalysisResult {
            status: RunStatus::Completed,
            analysis: exchange.output,
            tool_calls: exchange.invocations,
            score,
            logs: tracer.drain().into_iter().map(|e| e.text).collect(),
            truncation,
        })
    }
}
