//! `hero` command-line entry point.

mod config;

use clap::{Parser, Subcommand};
use config::HeroConfig;
use hero_bridge::Bridge;
use hero_coordinator::{
    spawn_liveness_sweeper, Coordinator, FileSnapshotStore, JsonlTraceSink, NullTraceSink,
    TaskPriority, TraceSink,
};
use hero_gateway::{AuthConfig, BridgeHandle, GatewayServer};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hero", about = "Hero agent coordinator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "hero.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and the message bridge
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the coordination status as JSON
    Status,
    /// Register an agent: name, type and comma-separated capabilities
    Register {
        name: String,
        agent_type: String,
        capabilities: String,
        #[arg(long, default_value = "hero")]
        framework: String,
    },
    /// Submit a task and report whether it was assigned
    Submit {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Comma-separated required capabilities
        #[arg(long, default_value = "")]
        capabilities: String,
        /// low, normal, high, urgent (or 1-4)
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Run a short register/submit/complete round and print the outcome
    Demo,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

async fn build_coordinator(config: &HeroConfig) -> anyhow::Result<Arc<Coordinator>> {
    let store = Arc::new(FileSnapshotStore::new(config.data_dir.clone()).await?);
    let tracer: Arc<dyn TraceSink> = if config.trace.enabled {
        let path = config.trace_file();
        info!(path = %path.display(), "Trace sink enabled");
        Arc::new(JsonlTraceSink::new(path))
    } else {
        Arc::new(NullTraceSink)
    };

    let coordinator = Coordinator::builder()
        .config(config.coordinator.clone())
        .snapshot_store(store)
        .trace_sink(tracer)
        .build()
        .await?;
    Ok(Arc::new(coordinator))
}

async fn serve(config: HeroConfig, host: String, port: u16) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&config).await?;

    let sweeper = config
        .coordinator
        .sweep_interval()
        .map(|interval| spawn_liveness_sweeper(coordinator.clone(), interval));

    let bridge = if config.bridge.enabled {
        let bridge = Arc::new(Bridge::new(coordinator.clone()));
        bridge.bootstrap(&config.bridge.known_agents).await;
        let (sender, _) = bridge.clone().spawn(config.bridge.channel_capacity);
        Some(BridgeHandle { bridge, sender })
    } else {
        None
    };

    let auth = AuthConfig::new(config.security.api_keys.clone());
    if auth.is_enabled() {
        info!(keys = config.security.api_keys.len(), "API key auth enabled");
    }

    let app = GatewayServer::build_with(coordinator.clone(), bridge, auth);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Hero gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    if let Err(e) = coordinator.persist().await {
        warn!(error = %e, "Final snapshot failed");
    }
    Ok(())
}

async fn demo(coordinator: &Coordinator) -> anyhow::Result<()> {
    println!("Running coordination demo...");

    coordinator
        .register_agent(
            "test_monitor",
            "monitor",
            split_csv("system_info,data_collection"),
            "hero",
            None,
        )
        .await;
    coordinator
        .register_agent(
            "test_analyzer",
            "analyzer",
            split_csv("data_analysis,reporting"),
            "chimera",
            None,
        )
        .await;

    let scan = coordinator
        .submit_task(
            "system_scan",
            "Scan system resources",
            split_csv("system_info"),
            TaskPriority::High,
            None,
            None,
        )
        .await?;
    let analysis = coordinator
        .submit_task(
            "performance_analysis",
            "Analyze system performance",
            split_csv("data_analysis"),
            TaskPriority::Normal,
            None,
            None,
        )
        .await?;

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let scan_outputs = serde_json::from_value(json!({"cpu": 45.2, "memory": 67.8}))?;
    let analysis_outputs =
        serde_json::from_value(json!({"recommendation": "Optimize memory usage"}))?;
    coordinator.complete_task(scan, Some(scan_outputs), None).await;
    coordinator
        .complete_task(analysis, Some(analysis_outputs), None)
        .await;

    let status = coordinator.get_system_status().await;
    println!("Demo completed");
    println!("Tasks completed: {}", status.tasks.completed);
    println!("Success rate: {:.2}%", status.performance.success_rate * 100.0);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = HeroConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve(config, host, port).await?;
        }
        Commands::Status => {
            let coordinator = build_coordinator(&config).await?;
            let status = coordinator.get_system_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Register {
            name,
            agent_type,
            capabilities,
            framework,
        } => {
            let coordinator = build_coordinator(&config).await?;
            let id = coordinator
                .register_agent(&name, &agent_type, split_csv(&capabilities), &framework, None)
                .await;
            println!("Registered agent {name} with ID: {id}");
        }
        Commands::Submit {
            name,
            description,
            capabilities,
            priority,
        } => {
            let coordinator = build_coordinator(&config).await?;
            let priority: TaskPriority = priority.parse()?;
            let id = coordinator
                .submit_task(
                    &name,
                    &description,
                    split_csv(&capabilities),
                    priority,
                    None,
                    None,
                )
                .await?;
            match coordinator.get_task(id).await.and_then(|t| t.assigned_agent) {
                Some(agent) => println!("Task {id} assigned to agent {agent}"),
                None => println!("Task {id} queued; no capable idle agent"),
            }
        }
        Commands::Demo => {
            let coordinator = build_coordinator(&config).await?;
            demo(&coordinator).await?;
        }
    }

    Ok(())
}
