//! Run a compliance analysis from the command line and print the report.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable and tool
//! credentials from `GITHUB_TOKEN` and `JIRA_*`. A `.env` file in the
//! working directory is loaded first.
//!
//! # Examples
//!
//! ```sh
//! # Multi-cycle reflect loop (default)
//! compliance --policy pssi.txt
//!
//! # Tighter budget, one more cycle
//! compliance --policy pssi.txt --max-cycles 3 --token-ceiling 40000
//!
//! # Fast path: parse the policy, run inventory checks once
//! compliance --policy pssi.txt --mode fast
//!
//! # Document analysis against a norm, plus infrastructure analysis
//! compliance --policy pssi.txt --norm iso27001.txt --mode analyze
//! ```

use clap::{Parser, ValueEnum};
use compliance_core::agent::{
    Analyzer, CompositeEventHandler, EventHandler, EventResponse, FnEventHandler, LoggingHandler,
    Orchestrator, OrchestratorConfig, RunEvent, fast_analyze,
};
use compliance_core::context::prepare;
use compliance_core::error::OrchestratorError;
use compliance_core::reasoning::ChatReasoner;
use compliance_core::tools::{ToolsConfig, standard_registry};
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Budgeted plan/act/reflect loop.
    Reflect,
    /// Policy parser plus one pass over the inventory tools.
    Fast,
    /// Single-pass document and infrastructure analysis.
    Analyze,
}

/// Run a compliance analysis and print the report as JSON.
#[derive(Parser)]
#[command(name = "compliance")]
struct Cli {
    /// Organization security policy (PSSI), read as UTF-8 text
    #[arg(long)]
    policy: PathBuf,

    /// Normative standard to compare against (required for --mode analyze)
    #[arg(long)]
    norm: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "reflect")]
    mode: Mode,

    /// Upper bound on reflect cycles
    #[arg(long)]
    max_cycles: Option<usize>,

    /// Estimated-token ceiling for one run
    #[arg(long)]
    token_ceiling: Option<usize>,

    /// Model ID (e.g. deepseek/deepseek-chat)
    #[arg(long)]
    model: Option<String>,

    /// Deny every ticket the engine proposes
    #[arg(long)]
    no_tickets: bool,
}

fn read_document(path: &Path) -> Result<String, OrchestratorError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OrchestratorError::not_found(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, OrchestratorError> {
    let mut config = OrchestratorConfig::from_env();
    if let Some(n) = cli.max_cycles {
        config = config.with_max_cycles(n);
    }
    if let Some(n) = cli.token_ceiling {
        config = config.with_token_ceiling(n);
    }
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }

    let engine = ChatReasoner::from_env(Some(&config.model))?
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature);
    let tools = standard_registry(ToolsConfig::from_env().with_ticket_approval(cli.no_tickets));
    let policy = read_document(&cli.policy)?;
    info!("Mode {:?}, model {}, {} tool(s)", cli.mode, config.model, tools.len());
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with_if(cli.no_tickets, deny_tickets());

    let value = match cli.mode {
        Mode::Reflect => {
            let report = Orchestrator::new(&engine, &tools, config)
                .with_event_handler(&handler)
                .orchestrate(&policy)
                .await?;
            to_json(&report)?
        }
        Mode::Fast => {
            let input = prepare(&policy, config.safe_input_tokens);
            to_json(&fast_analyze(&engine, &tools, &handler, input).await?)?
        }
        Mode::Analyze => {
            let norm_path = cli
                .norm
                .ok_or_else(|| OrchestratorError::invalid_input("--mode analyze requires --norm"))?;
            let norm = read_document(&norm_path)?;
            let analyzer = Analyzer::new(&engine, &tools, config).with_event_handler(&handler);
            let documents = analyzer.analyze_documents(&norm, &policy).await?;
            let infrastructure = analyzer.analyze_infrastructure(&policy).await?;
            serde_json::json!({
                "document_analysis": documents,
                "infrastructure_analysis": infrastructure,
            })
        }
    };

    info!("API usage: {}", engine.usage());
    Ok(value)
}

fn deny_tickets() -> impl EventHandler {
    FnEventHandler::new(|event| match event {
        RunEvent::ApprovalRequired { .. } => {
            Some(EventResponse::Deny("ticket creation disabled (--no-tickets)".into()))
        }
        _ => None,
    })
}

fn to_json(value: &impl serde::Serialize) -> Result<serde_json::Value, OrchestratorError> {
    serde_json::to_value(value).map_err(|e| OrchestratorError::internal(e.to_string()))
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("compliance_core=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            let payload = serde_json::to_string_pretty(&e.payload()).unwrap_or_else(|_| e.to_string());
            eprintln!("{payload}");
            process::exit(1);
        }
    }
}
