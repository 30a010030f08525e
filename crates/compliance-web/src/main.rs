//! Compliance analysis API server.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run -p compliance-web
//! OPENROUTER_KEY=sk-... cargo run -p compliance-web -- --port 8080 --upload-dir /var/lib/compliance
//! OPENROUTER_KEY=sk-... cargo run -p compliance-web -- --model openai/gpt-4o-mini --max-cycles 3
//! ```
//!
//! Then:
//!
//! ```bash
//! curl -F norm=@iso27001.txt -F pssi=@pssi.txt http://127.0.0.1:8000/upload
//! curl -d "policy=All buckets must be private" http://127.0.0.1:8000/reflect_analyze
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use compliance_core::agent::OrchestratorConfig;
use compliance_core::reasoning::ChatReasoner;
use compliance_core::tools::{ToolsConfig, standard_registry};
use compliance_web::{WebConfig, spawn_web};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compliance analysis API server.
#[derive(Parser)]
#[command(about = "HTTP API for compliance analysis runs")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Directory for uploaded documents.
    #[arg(long, default_value = "uploads")]
    upload_dir: PathBuf,

    /// Model ID; overrides COMPLIANCE_MODEL.
    #[arg(long)]
    model: Option<String>,

    /// Upper bound on reflect cycles; overrides COMPLIANCE_MAX_CYCLES.
    #[arg(long)]
    max_cycles: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("compliance_web=info,compliance_core=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();

    let mut orchestrator = OrchestratorConfig::from_env();
    if let Some(model) = args.model {
        orchestrator = orchestrator.with_model(model);
    }
    if let Some(n) = args.max_cycles {
        orchestrator = orchestrator.with_max_cycles(n);
    }

    let engine = ChatReasoner::from_env(Some(&orchestrator.model))
        .map_err(|e| e.to_string())?
        .with_max_tokens(orchestrator.max_tokens)
        .with_temperature(orchestrator.temperature);
    let tools = standard_registry(ToolsConfig::from_env());
    info!("Model {}, {} tool(s)", orchestrator.model, tools.len());

    let config = WebConfig {
        bind_addr: (args.host, args.port).into(),
        upload_dir: args.upload_dir,
        orchestrator,
        ..Default::default()
    };
    let addr = spawn_web(Arc::new(engine), Arc::new(tools), config)
        .await
        .map_err(|e| format!("failed to start server: {e}"))?;
    println!("API: http://{addr}");

    tokio::signal::ctrl_c().await.map_err(|e| e.to_string())?;
    info!("Shutting down");
    Ok(())
}
