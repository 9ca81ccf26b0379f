//! crypto-chat - streaming chat with a crypto price agent
//!
//! A host owns the agent session and streams its output; a terminal surface
//! renders it. Both can share a process or talk over HTTP.

mod agent;
mod api;
mod bridge;
mod config;
mod event;
mod ipc;
mod remote;
#[cfg(test)]
mod scenarios;
mod skills;
mod sse;
mod surface;
mod tui;

use agent::{Agent, LlmAgent, LlmAgentConfig};
use anyhow::Context;
use api::{create_router, AppState};
use bridge::ChatBridge;
use clap::{Parser, Subcommand};
use config::ChatConfig;
use ipc::BroadcastSink;
use skills::{ChecksumSkill, PriceSkill, RepeatSettings, RepeatSkill, SkillRegistry};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tui::ChatApp;

/// Stream events buffered per SSE subscriber
const BROADCAST_CAPACITY: usize = 1024;
const HOST_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "crypto-chat", version, about = "Streaming chat with a crypto price agent")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Host and terminal surface in one process (default)
    Run,
    /// Host only, serving the chat over HTTP and SSE
    Serve {
        /// Port to listen on [env: CRYPTO_CHAT_PORT, default 8000]
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        bind: IpAddr,
    },
    /// Terminal surface for a host started with `serve`
    Connect {
        /// Base URL of the host, e.g. http://127.0.0.1:8000
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ChatConfig::from_env()?;
    let mode = cli.mode.unwrap_or(Mode::Run);

    init_logging(matches!(mode, Mode::Serve { .. }), &config.log_file)?;

    match mode {
        Mode::Run => run_local(&config).await,
        Mode::Serve { port, bind } => {
            serve(&config, SocketAddr::new(bind, port.unwrap_or(config.port))).await
        }
        Mode::Connect { url } => connect_remote(&url).await,
    }
}

/// JSON logs; to stdout when serving, to a file when the terminal is the UI.
fn init_logging(to_stdout: bool, log_file: &Path) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crypto_chat=info,tower_http=info".into());

    if to_stdout {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("opening log file {}", log_file.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    }
    Ok(())
}

fn build_agent(config: &ChatConfig) -> anyhow::Result<Arc<dyn Agent>> {
    let api_key = config.effective_api_key();
    if api_key.is_none() {
        tracing::warn!("No LLM API key configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }

    let skills = SkillRegistry::new()
        .with(PriceSkill::new(config.coingecko_url.as_str()))
        .with(RepeatSkill::new(RepeatSettings {
            intro: "You said".to_string(),
            times: 1,
        }))
        .with(ChecksumSkill);

    let agent_config =
        LlmAgentConfig::crypto_assistant(api_key, config.api_url(), config.model.clone());
    Ok(Arc::new(LlmAgent::new(agent_config, skills)?))
}

/// Host task and terminal surface joined by an in-process channel
async fn run_local(config: &ChatConfig) -> anyhow::Result<()> {
    let agent = build_agent(config)?;
    let title = agent.name().to_string();
    let (host, surface) = ipc::channel();

    let mut bridge = ChatBridge::new(agent);
    bridge.initialize(Arc::new(host.sink));
    let host_task = tokio::spawn(bridge.run(host.inbox));

    let result = ChatApp::new(title, surface).run().await;
    // The surface port is gone; an in-flight turn stops at its next event.
    match tokio::time::timeout(HOST_SHUTDOWN_GRACE, host_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Host task failed"),
        Err(_) => tracing::warn!("Host still streaming at exit, abandoning turn"),
    }
    result
}

async fn serve(config: &ChatConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let agent = build_agent(config)?;
    let events = BroadcastSink::new(BROADCAST_CAPACITY);
    let (requests, inbox) = mpsc::unbounded_channel();

    let mut bridge = ChatBridge::new(Arc::clone(&agent));
    bridge.initialize(Arc::new(events.clone()));
    let host_task = tokio::spawn(bridge.run(inbox));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(AppState::new(requests, events, agent.name()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, agent = %agent.name(), "crypto-chat host listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(host_task))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or once the bridge stops after `close-window`.
async fn shutdown_signal(host_task: tokio::task::JoinHandle<()>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Interrupted");
        }
        _ = host_task => {
            tracing::info!("Window closed");
        }
    }
}

async fn connect_remote(url: &str) -> anyhow::Result<()> {
    let remote = remote::connect(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    ChatApp::new(remote.agent_name, remote.port).run().await
}
