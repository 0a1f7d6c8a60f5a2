use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Signature timestamp window (§6): reject requests older than this.
pub const SIGNATURE_WINDOW_SECS: i64 = 300;
/// Dedup LRU capacity (§4.1 / §5).
pub const DEDUP_CAPACITY: usize = 1000;
/// Default hot-tier TTL (§4.3).
pub const HOT_TIER_TTL_SECS: i64 = 24 * 60 * 60;
/// Default hot-tier per-conversation message cap.
pub const HOT_TIER_MAX_MESSAGES: usize = 50;
/// Relevance floor applied by the retrieval engine (§4.4).
pub const RELEVANCE_FLOOR: f32 = 0.3;

/// Top-level configuration (`cortex.toml` + `CORTEX_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub conversation_store: ConversationStoreConfig,
    pub index: IndexConfig,
    pub embedder: EmbedderConfig,
    pub completion: CompletionConfig,
    #[serde(default)]
    pub request: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret used to verify `X-Signature` on inbound events.
    pub signing_secret: String,
    /// Bearer credential used for outbound posts to the messaging platform.
    pub bot_token: String,
    /// This application's registered app id, used for the self-filter (§4.1).
    pub app_id: String,
    /// The messaging platform's send-message endpoint (external collaborator,
    /// §1 Non-goals — this crate only needs its URL, not its API surface).
    pub post_message_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStoreConfig {
    /// Durable tier connection string. A filesystem path for the bundled
    /// SQLite backend. When absent, falls back to an in-process,
    /// process-local store with identical semantics (§4.3, §9).
    pub durable_conn: Option<String>,
    /// Hot tier connection string. Currently unused beyond presence — the
    /// hot tier is always in-process; this field exists so a future
    /// networked cache (e.g. Redis) can be swapped in without an interface
    /// change.
    pub hot_cache_conn: Option<String>,
    #[serde(default = "default_hot_tier_ttl")]
    pub hot_tier_ttl_secs: i64,
    #[serde(default = "default_hot_tier_max_messages")]
    pub hot_tier_max_messages: usize,
}

impl Default for ConversationStoreConfig {
    fn default() -> Self {
        Self {
            durable_conn: None,
            hot_cache_conn: None,
            hot_tier_ttl_secs: default_hot_tier_ttl(),
            hot_tier_max_messages: default_hot_tier_max_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_external_call_deadline_ms")]
    pub external_call_deadline_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            external_call_deadline_ms: default_external_call_deadline_ms(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_hot_tier_ttl() -> i64 {
    HOT_TIER_TTL_SECS
}
fn default_hot_tier_max_messages() -> usize {
    HOT_TIER_MAX_MESSAGES
}
fn default_api_version() -> String {
    "2024-12-01-preview".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_deadline_ms() -> u64 {
    25_000
}
fn default_external_call_deadline_ms() -> u64 {
    10_000
}

impl CortexConfig {
    /// Load config from a TOML file with `CORTEX_*` env var overrides.
    ///
    /// Env vars win over file values; nested keys use `_` as the path
    /// separator (e.g. `CORTEX_GATEWAY_PORT=9000`).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| "cortex.toml".to_string());

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CORTEX_").split("_"))
            .extract()
            .map_err(|e| crate::error::CortexError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn loads_from_toml_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cortex.toml",
                r#"
                [gateway]
                signing_secret = "s3cr3t"
                bot_token = "xoxb-test"
                app_id = "A1"
                post_message_url = "https://platform.example/chat.postMessage"

                [index]
                endpoint = "https://search.example"
                api_key = "idx-key"
                index_name = "docs"

                [embedder]
                endpoint = "https://embed.example"
                api_key = "emb-key"
                deployment = "text-embedding-3"

                [completion]
                endpoint = "https://completion.example"
                api_key = "comp-key"
                deployment = "gpt"
                "#,
            )?;
            jail.set_env("CORTEX_GATEWAY_PORT", "9999");

            let cfg = CortexConfig::load(Some("cortex.toml")).unwrap();
            assert_eq!(cfg.gateway.port, 9999);
            assert_eq!(cfg.request.deadline_ms, default_deadline_ms());
            Ok(())
        });
    }
}
