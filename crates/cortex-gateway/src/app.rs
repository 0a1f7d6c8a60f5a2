//! Central shared state and router wiring, following `skynet-gateway::app`'s
//! `AppState` + `build_router` shape — generalized from the teacher's
//! agent/terminal/session bundle to this system's orchestrator + dedup
//! cache + config bundle.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cortex_core::config::CortexConfig;
use cortex_pipeline::{Orchestrator, OpenAiCompatibleCompleter};

use crate::dedup::DedupCache;

/// The gateway wires exactly one concrete completer implementation per
/// deployment — same one-provider-per-process shape as the teacher's own
/// `AgentRuntime`, which holds a single resolved provider rather than a
/// `dyn` completer.
pub type GatewayOrchestrator = Orchestrator<OpenAiCompatibleCompleter>;

/// Shared state — passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: CortexConfig,
    pub dedup: DedupCache,
    pub orchestrator: Arc<GatewayOrchestrator>,
}

impl AppState {
    pub fn new(config: CortexConfig, orchestrator: Arc<GatewayOrchestrator>) -> Self {
        let dedup = DedupCache::with_capacity(cortex_core::config::DEDUP_CAPACITY);
        Self {
            config,
            dedup,
            orchestrator,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::health::health_handler))
        .route("/events/", post(crate::events::events_handler))
        .route("/commands/", post(crate::commands::commands_handler))
        .route("/interactive/", post(crate::interactive::interactive_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
