//! Strands - Autonomous Incident Response
//!
//! Operator entry point for the incident-analysis pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Start the controller loop
//! strands run
//!
//! # Replay recorded events for validation
//! strands replay events.json --mode validation
//!
//! # Check a configuration without starting anything
//! strands validate-config
//!
//! # Operate on the playbook library
//! strands playbook list
//! strands playbook approve pb-gen-1234 --actor alice
//!
//! # Probe the configured upstreams
//! strands health
//! ```
//!
//! # Environment Variables
//!
//! - `STRANDS_CONFIG`: path to the TOML config file
//! - `METRICS_URL`, `GRAPH_URL`, `VECTOR_URL`, `GENERATOR_URL`: endpoints
//! - `POLICY_NAME`, `MODEL_VERSION`, `WEIGHTS_FILE`: decision tuning
//! - `TICK_INTERVAL_S`, `GLOBAL_DEADLINE_S`: controller timing
//! - `LOG_LEVEL` / `RUST_LOG`: logging filter (default: info)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use strands::adapters::{
    EmbeddedGraphStore, GenerationParams, GraphStore, HttpClusterIntrospection, HttpGraphStore,
    HttpMetricsSource, HttpTextGenerator, HttpVectorStore, TextGenerator, VectorStore,
};
use strands::audit::AuditLog;
use strands::config::{self, SystemConfig};
use strands::controller::IncidentController;
use strands::decision::{automation_from_name, DecisionEngine, ThresholdPolicy};
use strands::ingest::{AlertCollector, AlertProvider, HttpAlertProvider};
use strands::playbooks::{LifecycleAction, PlaybookStore};
use strands::recommend::Recommender;
use strands::replay::{ReplayEngine, ReplayLedger};
use strands::resilience::{guard_from_config, Guard};
use strands::review::ReviewGate;
use strands::swarm::{
    CorrelatorSpecialist, EmbeddingSpecialist, GraphSpecialist, LogSpecialist, MetricsSpecialist,
    Specialist, SwarmOrchestrator,
};
use strands::types::ReplayMode;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "strands")]
#[command(about = "Strands autonomous incident response")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the incident controller loop
    Run,
    /// Replay recorded events against the current configuration
    Replay {
        /// JSON file of recorded events; the local ledger when omitted
        events_file: Option<String>,
        /// validation | training | simulation | audit
        #[arg(long, default_value = "validation")]
        mode: String,
    },
    /// Validate the configuration and exit
    ValidateConfig,
    /// Operate on the playbook library
    Playbook {
        #[command(subcommand)]
        action: PlaybookCommand,
    },
    /// Probe every configured upstream once
    Health,
}

#[derive(Subcommand, Debug)]
enum PlaybookCommand {
    /// List all playbooks
    List,
    /// Show one playbook in full
    Show { id: String },
    /// Approve a pending playbook
    Approve {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// Reject a pending playbook
    Reject {
        id: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Apply an edited playbook JSON; the version bump follows the size
    /// of the change (major edits of active playbooks draft a successor)
    Revise {
        /// Path to the edited playbook JSON
        file: String,
        #[arg(long)]
        actor: String,
    },
}

// Exit codes: 0 success, 1 configuration error, 2 runtime error,
// 3 upstream unavailable.
const EXIT_CONFIG: u8 = 1;
const EXIT_RUNTIME: u8 = 2;
const EXIT_UPSTREAM: u8 = 3;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let system_config = SystemConfig::load();
    if let Err(e) = config::validation::validate(&system_config) {
        error!(error = %e, "Configuration invalid");
        return ExitCode::from(EXIT_CONFIG);
    }
    config::init(system_config);

    let result = match cli.command {
        Command::Run => cmd_run().await,
        Command::Replay { events_file, mode } => cmd_replay(events_file, &mode).await,
        Command::ValidateConfig => {
            info!("Configuration valid");
            Ok(ExitCode::SUCCESS)
        }
        Command::Playbook { action } => cmd_playbook(action).await,
        Command::Health => cmd_health().await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

// ============================================================================
// Component wiring
// ============================================================================

struct Stack {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    generator: Arc<dyn TextGenerator>,
    metrics: Arc<HttpMetricsSource>,
    introspection: Arc<HttpClusterIntrospection>,
    playbooks: Arc<PlaybookStore>,
    guards: Vec<(String, Guard)>,
}

fn build_stack() -> Result<Stack> {
    let cfg = config::get();
    let seed = cfg.decision.seed;
    let mut guards = Vec::new();

    let mut guard = |name: &str, salt: u64| -> Guard {
        let g = guard_from_config(name, &cfg.resilience, seed.wrapping_add(salt));
        guards.push((name.to_string(), g.clone()));
        g
    };

    let metrics = Arc::new(HttpMetricsSource::new(
        &cfg.endpoints.metrics_url,
        guard("metrics", 1),
    ));
    let introspection = Arc::new(HttpClusterIntrospection::new(
        &cfg.endpoints.introspection_url,
        guard("introspection", 2),
    ));
    let graph: Arc<dyn GraphStore> = if cfg.endpoints.graph_url.is_empty() {
        info!(dir = %cfg.storage.data_dir.display(), "GRAPH_URL unset; using embedded graph store");
        Arc::new(EmbeddedGraphStore::open(cfg.storage.data_dir.join("graph"))?)
    } else {
        Arc::new(HttpGraphStore::new(&cfg.endpoints.graph_url, guard("graph", 3)))
    };
    let vectors: Arc<dyn VectorStore> = Arc::new(HttpVectorStore::new(
        &cfg.endpoints.vector_url,
        "incidents",
        guard("vector", 4),
    ));
    let generator: Arc<dyn TextGenerator> = Arc::new(HttpTextGenerator::new(
        &cfg.endpoints.generator_url,
        guard("generator", 5),
    ));
    let playbooks = Arc::new(PlaybookStore::new(Arc::clone(&graph)));

    Ok(Stack {
        graph,
        vectors,
        generator,
        metrics,
        introspection,
        playbooks,
        guards,
    })
}

fn build_specialists(stack: &Stack) -> Vec<Arc<dyn Specialist>> {
    vec![
        Arc::new(MetricsSpecialist::new(
            Arc::clone(&stack.metrics) as Arc<dyn strands::adapters::MetricsSource>
        )),
        Arc::new(LogSpecialist::new(Arc::clone(&stack.introspection)
            as Arc<dyn strands::adapters::ClusterIntrospection>)),
        Arc::new(EmbeddingSpecialist::new(
            Arc::clone(&stack.generator),
            Arc::clone(&stack.vectors),
        )),
        Arc::new(GraphSpecialist::new(Arc::clone(&stack.graph))),
        Arc::new(CorrelatorSpecialist::new(
            Arc::clone(&stack.metrics) as Arc<dyn strands::adapters::MetricsSource>
        )),
    ]
}

fn build_providers(seed: u64) -> Vec<Arc<dyn AlertProvider>> {
    let cfg = config::get();
    cfg.providers_by_priority()
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let guard = guard_from_config(
                &format!("provider:{}", p.name),
                &cfg.resilience,
                seed.wrapping_add(100 + i as u64),
            );
            Arc::new(HttpAlertProvider::from_config(p, guard)) as Arc<dyn AlertProvider>
        })
        .collect()
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_run() -> Result<ExitCode> {
    let cfg = config::get();
    let stack = build_stack()?;

    let providers = build_providers(cfg.decision.seed);
    if providers.is_empty() {
        error!("No enabled alert providers configured");
        return Ok(ExitCode::from(EXIT_CONFIG));
    }

    let collector = AlertCollector::new(providers);
    let swarm = SwarmOrchestrator::new(build_specialists(&stack));
    let engine = DecisionEngine::new(
        cfg.decision.weights.clone(),
        ThresholdPolicy::by_name(&cfg.decision.policy),
        &cfg.identity.model_version,
        automation_from_name(&cfg.decision.default_automation),
    );
    let recommender = Recommender::new(
        Arc::clone(&stack.playbooks),
        Arc::clone(&stack.generator),
        GenerationParams::default(),
    );
    let review = Arc::new(ReviewGate::new(
        Arc::clone(&stack.graph),
        Arc::clone(&stack.playbooks),
        &cfg.identity.system_id,
    ));
    let audit = Arc::new(AuditLog::open(&cfg.storage.audit_log)?);
    let ledger = Arc::new(ReplayLedger::open(cfg.storage.data_dir.join("replay"))?);

    let mut controller = IncidentController::new(
        collector,
        swarm,
        engine,
        recommender,
        Arc::clone(&stack.playbooks),
        review,
        Arc::clone(&stack.graph),
        Arc::clone(&stack.vectors),
        Arc::clone(&stack.generator),
        audit,
        ledger,
        stack.guards,
        Duration::from_secs(cfg.controller.tick_interval_secs),
        Duration::from_secs(cfg.controller.global_deadline_secs),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    controller.run(cancel).await;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_replay(events_file: Option<String>, mode: &str) -> Result<ExitCode> {
    let cfg = config::get();
    let mode = match mode.to_lowercase().as_str() {
        "validation" => ReplayMode::Validation,
        "training" => ReplayMode::Training,
        "simulation" => ReplayMode::Simulation,
        "audit" => ReplayMode::Audit,
        other => {
            error!(mode = other, "Unknown replay mode");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    let events = match events_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading events file {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing events file {path}"))?
        }
        None => {
            let ledger = ReplayLedger::open(cfg.storage.data_dir.join("replay"))?;
            ledger.load_all()?
        }
    };

    let engine = ReplayEngine::new(
        cfg.decision.weights.clone(),
        ThresholdPolicy::by_name(&cfg.decision.policy),
        &cfg.identity.model_version,
        automation_from_name(&cfg.decision.default_automation),
    );
    let report = engine.replay(&events, mode).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed_validation() {
        error!(
            unsafe_bypasses = report.unsafe_bypass_count,
            "Replay validation FAILED"
        );
        return Ok(ExitCode::from(EXIT_RUNTIME));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_playbook(action: PlaybookCommand) -> Result<ExitCode> {
    let stack = build_stack()?;
    let cancel = CancellationToken::new();
    let now = chrono::Utc::now();

    match action {
        PlaybookCommand::List => {
            let playbooks = stack.playbooks.list(&cancel).await?;
            for pb in playbooks {
                println!(
                    "{:<40} {:<16} v{:<8} {:<18} executions={} success_rate={:.2}",
                    pb.id,
                    pb.status.to_string(),
                    pb.version.to_string(),
                    pb.service_pattern,
                    pb.stats.total_executions,
                    pb.stats.success_rate(),
                );
            }
        }
        PlaybookCommand::Show { id } => {
            let playbook = stack.playbooks.get(&cancel, &id).await?;
            println!("{}", serde_json::to_string_pretty(&playbook)?);
        }
        PlaybookCommand::Approve { id, actor } => {
            let playbook = stack
                .playbooks
                .transition(&cancel, &id, LifecycleAction::Approve, &actor, now, None)
                .await?;
            info!(playbook = %playbook.id, status = %playbook.status, "Playbook approved");
        }
        PlaybookCommand::Reject { id, actor, note } => {
            let playbook = stack
                .playbooks
                .transition(
                    &cancel,
                    &id,
                    LifecycleAction::Reject,
                    &actor,
                    now,
                    note.as_deref(),
                )
                .await?;
            info!(playbook = %playbook.id, status = %playbook.status, "Playbook rejected");
        }
        PlaybookCommand::Revise { file, actor } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading playbook file {file}"))?;
            let edited: strands::types::Playbook = serde_json::from_str(&raw)
                .with_context(|| format!("parsing playbook file {file}"))?;
            let revised = stack.playbooks.revise(&cancel, edited, &actor, now).await?;
            info!(
                playbook = %revised.id,
                version = %revised.version,
                status = %revised.status,
                "Playbook revision applied"
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_health() -> Result<ExitCode> {
    use strands::adapters::MetricsSource;

    let cfg = config::get();
    let stack = build_stack()?;
    let cancel = CancellationToken::new();
    let mut healthy = true;

    match stack.metrics.list_active_alerts(&cancel).await {
        Ok(alerts) => info!(active_alerts = alerts.len(), "metrics: ok"),
        Err(e) => {
            warn!(error = %e, "metrics: unavailable");
            healthy = false;
        }
    }
    match stack.graph.get_node(&cancel, "Playbook", "__health__").await {
        Ok(_) => info!("graph: ok"),
        Err(e) => {
            warn!(error = %e, "graph: unavailable");
            healthy = false;
        }
    }
    match stack.generator.embed(&cancel, "health probe").await {
        Ok(v) => info!(dimensions = v.len(), "generator: ok"),
        Err(e) => {
            warn!(error = %e, "generator: unavailable");
            healthy = false;
        }
    }
    match stack.vectors.search(&cancel, &[0.0; 8], 1, 0.99).await {
        Ok(_) => info!("vector store: ok"),
        Err(e) => {
            warn!(error = %e, "vector store: unavailable");
            healthy = false;
        }
    }
    for provider in &cfg.providers {
        info!(
            provider = %provider.name,
            enabled = provider.enabled,
            priority = provider.priority,
            "provider configured"
        );
    }

    if healthy {
        info!("All upstreams healthy");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_UPSTREAM))
    }
}
