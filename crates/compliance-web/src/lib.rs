//! HTTP surface for the compliance orchestrator.
//!
//! `compliance-web` exposes the three analysis modes of `compliance-core`
//! over a small axum API, plus document upload and direct ticket creation.
//! It owns no analysis logic: every route prepares its input, calls the
//! core, and serializes the result or an
//! [`ErrorPayload`](compliance_core::error::ErrorPayload).
//!
//! # Quick start
//!
//! ```ignore
//! use compliance_core::reasoning::ChatReasoner;
//! use compliance_core::tools::{ToolsConfig, standard_registry};
//! use compliance_web::{WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(ChatReasoner::from_env(None)?);
//! let tools = Arc::new(standard_registry(ToolsConfig::from_env()));
//! let addr = spawn_web(engine, tools, WebConfig::default()).await?;
//! println!("API: http://{addr}");
//! ```
//!
//! # Routes
//!
//! | Route | Input | Output |
//! |-------|-------|--------|
//! | `GET /health` | | `{"status":"ok"}` |
//! | `POST /upload` | multipart `norm`, `pssi` | `{norm_id, pssi_id, uploaded_at}` |
//! | `POST /analyze` | form `norm_id`, `pssi_id` | document + infrastructure analysis |
//! | `POST /fast_analyze` | form `policy` | fast-path report |
//! | `POST /reflect_analyze` | form `policy` | final report |
//! | `POST /create-ticket` | JSON `{summary, description}` | `{status, result}` |

mod api;
pub mod error;
mod server;
pub mod uploads;

pub use error::ApiError;

use compliance_core::agent::OrchestratorConfig;
use compliance_core::reasoning::ReasoningEngine;
use compliance_core::tools::ToolRegistry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Default request body limit for uploads.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:8000`.
    pub bind_addr: SocketAddr,
    /// Where uploaded documents are stored. Created if missing.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Settings for every run the server starts.
    pub orchestrator: OrchestratorConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(
    engine: Arc<dyn ReasoningEngine>,
    tools: Arc<ToolRegistry>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let state = api::AppState {
        engine,
        tools,
        orchestrator: config.orchestrator,
        upload_dir: Arc::new(config.upload_dir),
    };
    let router = server::build_router(state, config.max_upload_bytes);
    server::start_server(router, config.bind_addr).await
}
