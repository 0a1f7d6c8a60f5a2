use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use cortex_adapters::{HttpEmbedder, HttpMessagingPlatform, HttpSearchIndex};
use cortex_core::config::CortexConfig;
use cortex_core::types::FunctionDescriptor;
use cortex_pipeline::{OpenAiCompatibleCompleter, Orchestrator, OrchestratorSettings, PromptManager, RetryingCompleter, RouteOverrides, SkillRegistry};
use cortex_retrieval::RetrievalEngine;

mod app;
mod commands;
mod dedup;
mod events;
mod health;
mod interactive;
mod signature;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cortex_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > CORTEX_CONFIG env > ./cortex.toml
    let config_path = std::env::var("CORTEX_CONFIG").ok();
    let config = CortexConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| panic!("failed to load configuration: {e}"));

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let conn = cortex_memory::open_durable_tier(config.conversation_store.durable_conn.as_deref())?;
    let store = Arc::new(cortex_memory::ConversationStore::with_hot_tier_config(
        conn,
        config.conversation_store.hot_tier_ttl_secs,
        config.conversation_store.hot_tier_max_messages,
    ));

    let index = Arc::new(HttpSearchIndex::new(
        config.index.endpoint.clone(),
        config.index.api_key.clone(),
        config.index.index_name.clone(),
    ));
    let embedder = Arc::new(HttpEmbedder::new(
        config.embedder.endpoint.clone(),
        config.embedder.api_key.clone(),
        config.embedder.deployment.clone(),
    ));
    let retrieval = Arc::new(RetrievalEngine::new(index, embedder));

    let completer = OpenAiCompatibleCompleter::new(
        config.completion.endpoint.clone(),
        config.completion.api_key.clone(),
        config.completion.deployment.clone(),
    );

    let platform = Arc::new(HttpMessagingPlatform::new(
        config.gateway.post_message_url.clone(),
        config.gateway.bot_token.clone(),
    ));

    let registry = Arc::new(build_registry());
    let overrides = build_overrides();

    let settings = OrchestratorSettings {
        deadline: std::time::Duration::from_millis(config.request.deadline_ms),
        external_call_deadline: std::time::Duration::from_millis(config.request.external_call_deadline_ms),
        temperature: config.completion.temperature,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        overrides,
        retrieval,
        PromptManager::with_defaults(),
        RetryingCompleter::new(completer),
        store,
        platform,
        settings,
    ));

    let state = Arc::new(app::AppState::new(config, orchestrator));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("cortex gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Register the built-in skills (§4.2): a retrieval-aware `docs` skill for
/// knowledge-base questions, a retrieval-aware `code` skill for
/// code-explanation requests, and the non-retrieval `chat` default.
fn build_registry() -> SkillRegistry {
    let mut registry = SkillRegistry::new();

    registry.register(
        "docs",
        "answers questions from the indexed documentation corpus",
        ["docs", "documentation", "handbook", "policy", "onboarding"],
        vec![FunctionDescriptor {
            name: "answer_question".to_string(),
            description: "answer a question using retrieved documentation context".to_string(),
        }],
        true,
    );

    registry.register(
        "code",
        "explains and analyzes source code",
        ["code", "explain", "analyze", "function", "bug"],
        vec![FunctionDescriptor {
            name: "answer_question".to_string(),
            description: "answer a code-related question using retrieved source context".to_string(),
        }],
        true,
    );

    registry.register(
        "chat",
        "general conversation with no retrieval augmentation",
        ["chat", "hello", "help"],
        vec![
            FunctionDescriptor {
                name: "chat".to_string(),
                description: "respond conversationally with no retrieval step".to_string(),
            },
            FunctionDescriptor {
                name: "greet".to_string(),
                description: "greet the user by name when the utterance opens with a greeting".to_string(),
            },
            FunctionDescriptor {
                name: "format_as_bullet_list".to_string(),
                description: "reformat the prior reply as a bulleted list".to_string(),
            },
        ],
        false,
    );

    registry.set_default("chat");
    registry
}

fn build_overrides() -> RouteOverrides {
    let mut overrides = RouteOverrides::new();
    overrides.add("docs", "docs");
    overrides.add("documentation", "docs");
    overrides.add("explain", "code");
    overrides.add("code", "code");
    overrides.add("analyze", "code");
    overrides
}
