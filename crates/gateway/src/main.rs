use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use cp_domain::config::{Config, ConfigSeverity, CorsConfig};
use cp_providers::OpenAiCompatClient;
use cp_retrieval::{OfflineStore, QdrantStore, SearchEngine, VectorSearch};
use cp_sessions::CallSessionStore;

use cp_gateway::agents::gatekeeper::Gatekeeper;
use cp_gateway::agents::guidance::GuidanceAgent;
use cp_gateway::agents::marketing::MarketingAgent;
use cp_gateway::api;
use cp_gateway::runtime::calls::CallRuntime;
use cp_gateway::runtime::orchestrator::AgentRegistry;
use cp_gateway::services::analysis::CallAnalyzer;
use cp_gateway::services::backoffice::BackofficeClient;
use cp_gateway::services::notifier::NotificationHub;
use cp_gateway::services::rooms::MonitorRooms;
use cp_gateway::state::AppState;

#[derive(Parser)]
#[command(name = "callpilot", about = "Real-time call-assistance gateway")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Print the version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = Config::load(cli.config.as_deref()).context("loading config")?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Version) => {
            println!("callpilot {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cp_gateway=debug")),
        )
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("callpilot starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM clients (main + fast tier) ───────────────────────────────
    let llm: Arc<dyn cp_providers::ChatModel> = Arc::new(
        OpenAiCompatClient::from_config(&config.llm, config.llm.model.clone())
            .context("initializing main LLM client")?,
    );
    let fast_llm: Arc<dyn cp_providers::ChatModel> = Arc::new(
        OpenAiCompatClient::from_config(&config.llm, config.llm.fast_model.clone())
            .context("initializing fast LLM client")?,
    );
    tracing::info!(
        model = %config.llm.model,
        fast_model = %config.llm.fast_model,
        "LLM clients ready"
    );

    // ── Retrieval engine ─────────────────────────────────────────────
    let search = if config.retrieval.url.is_empty() {
        tracing::warn!("no vector store configured — retrieval disabled");
        Arc::new(SearchEngine::with_categories(Arc::new(OfflineStore), Vec::new()))
    } else {
        let store: Arc<dyn VectorSearch> = Arc::new(
            QdrantStore::from_config(&config.retrieval).context("initializing vector store")?,
        );
        Arc::new(
            SearchEngine::connect(store)
                .await
                .context("sampling vector store categories")?,
        )
    };

    // ── Back office ──────────────────────────────────────────────────
    let backoffice = Arc::new(
        BackofficeClient::from_config(&config.backoffice)
            .context("initializing back-office client")?,
    );
    tracing::info!(url = %config.backoffice.base_url, "back-office client ready");

    // ── Session store + monitor rooms + notification hub ─────────────
    let sessions = Arc::new(CallSessionStore::new());
    let rooms = Arc::new(MonitorRooms::new());
    let notifier = Arc::new(NotificationHub::new());

    // ── Agents ───────────────────────────────────────────────────────
    let gatekeeper = Arc::new(
        Gatekeeper::new(Some(fast_llm.clone())).context("initializing gatekeeper")?,
    );
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(GuidanceAgent::new(llm.clone(), search.clone())));
    registry.register(Arc::new(MarketingAgent::new(
        llm.clone(),
        search.clone(),
        gatekeeper,
    )));
    let agents = Arc::new(registry);
    tracing::info!(agents = agents.len(), "agent registry ready");

    // ── Call runtime ─────────────────────────────────────────────────
    let analyzer = Arc::new(CallAnalyzer::new(llm.clone()));
    let runtime = Arc::new(CallRuntime {
        sessions: sessions.clone(),
        rooms: rooms.clone(),
        notifier: notifier.clone(),
        directory: backoffice.clone(),
        archive: backoffice,
        agents,
        analyzer,
    });

    let state = AppState {
        config: config.clone(),
        sessions,
        rooms,
        notifier,
        runtime,
    };

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router()
        .layer(build_cors_layer(&config.server.cors))
        .with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "callpilot listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
/// A literal `"*"` allows all origins (not recommended for production).
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
