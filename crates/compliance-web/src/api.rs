//! Route handlers.
//!
//! Every handler returns `Result<Json<_>, ApiError>`; extractor rejections
//! are turned into `invalid_input` errors so the body is always an
//! `ErrorPayload`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::{Form, Json};
use compliance_core::agent::{
    AnalysisResult, Analyzer, FastReport, FinalReport, NoopHandler, Orchestrator,
    OrchestratorConfig, fast_analyze as run_fast_path,
};
use compliance_core::context::prepare;
use compliance_core::error::OrchestratorError;
use compliance_core::reasoning::ReasoningEngine;
use compliance_core::tools::{ToolName, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::uploads;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn ReasoningEngine>,
    pub tools: Arc<ToolRegistry>,
    pub orchestrator: OrchestratorConfig,
    pub upload_dir: Arc<PathBuf>,
}

fn rejected(e: impl std::fmt::Display) -> ApiError {
    ApiError(OrchestratorError::invalid_input(e.to_string()))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub norm_id: String,
    pub pssi_id: String,
    pub uploaded_at: String,
}

/// POST /upload — multipart `norm` and `pssi` files.
pub async fn upload(
    State(app): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(rejected)?;
    let mut norm_id = None;
    let mut pssi_id = None;

    while let Some(field) = multipart.next_field().await.map_err(rejected)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let slot = match name.as_str() {
            "norm" => &mut norm_id,
            "pssi" => &mut pssi_id,
            _ => continue,
        };
        let bytes = field.bytes().await.map_err(rejected)?;
        *slot = Some(uploads::store(&app.upload_dir, filename.as_deref(), &bytes).await?);
    }

    let (Some(norm_id), Some(pssi_id)) = (norm_id, pssi_id) else {
        return Err(rejected("both 'norm' and 'pssi' files are required"));
    };
    info!("Uploaded norm {norm_id}, pssi {pssi_id}");
    Ok(Json(UploadResponse {
        norm_id,
        pssi_id,
        uploaded_at: chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    pub norm_id: String,
    pub pssi_id: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub document_analysis: AnalysisResult,
    pub infrastructure_analysis: AnalysisResult,
}

/// POST /analyze — document analysis, then infrastructure analysis.
pub async fn analyze(
    State(app): State<AppState>,
    form: Result<Form<AnalyzeForm>, FormRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Form(form) = form.map_err(rejected)?;
    let norm = uploads::load(&app.upload_dir, &form.norm_id).await?;
    let pssi = uploads::load(&app.upload_dir, &form.pssi_id).await?;

    let analyzer = Analyzer::new(app.engine.as_ref(), &app.tools, app.orchestrator.clone());
    let document_analysis = analyzer.analyze_documents(&norm, &pssi).await?;
    let infrastructure_analysis = analyzer.analyze_infrastructure(&pssi).await?;
    Ok(Json(AnalyzeResponse {
        document_analysis,
        infrastructure_analysis,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PolicyForm {
    pub policy: String,
}

/// POST /fast_analyze
pub async fn fast_analyze(
    State(app): State<AppState>,
    form: Result<Form<PolicyForm>, FormRejection>,
) -> Result<Json<FastReport>, ApiError> {
    let Form(form) = form.map_err(rejected)?;
    let input = prepare(&form.policy, app.orchestrator.safe_input_tokens);
    let report = run_fast_path(app.engine.as_ref(), &app.tools, &NoopHandler, input).await?;
    Ok(Json(report))
}

/// POST /reflect_analyze — the full reflect loop.
pub async fn reflect_analyze(
    State(app): State<AppState>,
    form: Result<Form<PolicyForm>, FormRejection>,
) -> Result<Json<FinalReport>, ApiError> {
    let Form(form) = form.map_err(rejected)?;
    let input = prepare(&form.policy, app.orchestrator.safe_input_tokens);
    let report = Orchestrator::new(app.engine.as_ref(), &app.tools, app.orchestrator.clone())
        .orchestrate_prepared(input)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    pub summary: String,
    #[serde(default)]
    pub description: String,
}

/// POST /create-ticket — file one ticket directly.
///
/// A ticketing failure is reported in the body, not as an HTTP error.
pub async fn create_ticket(
    State(app): State<AppState>,
    body: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(ticket) = body.map_err(rejected)?;
    if ticket.summary.trim().is_empty() {
        return Err(rejected("ticket summary is empty"));
    }
    let args = json!({"summary": ticket.summary, "description": ticket.description});
    let outcome = app.tools.execute(ToolName::CreateIssue, &args.to_string()).await;
    Ok(Json(json!({
        "status": if outcome.is_success() { "success" } else { "failure" },
        "result": outcome.text(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_description_is_optional() {
        let req: TicketRequest = serde_json::from_str(r#"{"summary": "S3 bucket public"}"#).unwrap();
        assert_eq!(req.summary, "S3 bucket public");
        assert!(req.description.is_empty());
    }
}
