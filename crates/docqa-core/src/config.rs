//! Configuration loader, typed settings sections and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_EMBEDDING__QPS`).
//! Store paths go through `expand_path` so `~` and `${VAR}` work in config files.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::types::EMBEDDING_DIM;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Build from an explicit figment, bypassing files and environment.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let figment = Figment::new().merge(Serialized::defaults(Settings::default())).merge(figment);
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if settings.embedding.dimension != EMBEDDING_DIM {
            anyhow::bail!(
                "embedding.dimension must be {} (got {})",
                EMBEDDING_DIM,
                settings.embedding.dimension
            );
        }
        if settings.embedding.qps <= 0.0 || settings.chat.qps <= 0.0 {
            anyhow::bail!("qps settings must be positive");
        }
        let k = settings.retrieval.rrf_k;
        if !k.is_finite() || k <= 0.0 {
            anyhow::bail!("retrieval.rrf_k must be a positive number (got {k})");
        }
        if settings.rerank.sweet_spot_min > settings.rerank.sweet_spot_max {
            anyhow::bail!("rerank.sweet_spot_min must not exceed rerank.sweet_spot_max");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub answer: AnswerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub uri: String,
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { uri: "./data/lancedb".to_string(), table: "chunks".to_string() }
    }
}

impl StoreSettings {
    pub fn resolved_uri(&self) -> PathBuf {
        expand_path(&self.uri)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    /// Target embedding calls per second; the minimum spacing is `1 / qps`.
    pub qps: f64,
    pub max_retries: u32,
    pub request_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub interval_ceiling_ms: u64,
    pub transient_backoff_ms: u64,
    pub max_input_chars: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://aistudio.baidu.com/llm/lmapi/v3".to_string(),
            api_key: None,
            model: "embedding-v1".to_string(),
            dimension: EMBEDDING_DIM,
            qps: 2.0,
            max_retries: 3,
            request_timeout_ms: 30_000,
            backoff_base_ms: 500,
            backoff_max_ms: 20_000,
            interval_ceiling_ms: 10_000,
            transient_backoff_ms: 1_000,
            max_input_chars: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub qps: f64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: "https://aistudio.baidu.com/llm/lmapi/v3".to_string(),
            api_key: None,
            model: "ernie-4.5-turbo-128k-preview".to_string(),
            qps: 0.66,
            max_tokens: 2048,
            temperature: 0.7,
            request_timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Each channel fetches `top_k * channel_limit_factor` hits.
    pub channel_limit_factor: usize,
    /// The fused pool is cut to `top_k * pool_factor` before reranking.
    pub pool_factor: usize,
    pub rrf_k: f32,
    pub dense_weight: f32,
    pub lexical_weight: f32,
    pub channel_timeout_ms: u64,
    pub max_keywords_per_script: usize,
    pub min_latin_len: usize,
    pub min_cjk_len: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            channel_limit_factor: 5,
            pool_factor: 2,
            rrf_k: 60.0,
            dense_weight: 1.0,
            lexical_weight: 3.0,
            channel_timeout_ms: 15_000,
            max_keywords_per_script: 5,
            min_latin_len: 2,
            min_cjk_len: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub fuzzy_weight: f32,
    pub keyword_weight: f32,
    pub vector_weight: f32,
    pub length_weight: f32,
    /// Vector similarity assigned to hits without a dense distance.
    pub lexical_neutral_similarity: f32,
    pub distance_scale: f32,
    pub position_bonus_cap: f32,
    pub entity_bonus: f32,
    pub sweet_spot_min: usize,
    pub sweet_spot_max: usize,
    /// Content is cut to this many characters before fuzzy matching.
    pub fuzzy_max_chars: usize,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            fuzzy_weight: 0.25,
            keyword_weight: 0.25,
            vector_weight: 0.35,
            length_weight: 0.15,
            lexical_neutral_similarity: 80.0,
            distance_scale: 0.1,
            position_bonus_cap: 20.0,
            entity_bonus: 30.0,
            sweet_spot_min: 200,
            sweet_spot_max: 600,
            fuzzy_max_chars: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Ask the chat model for a translation and append it to the query.
    pub expand_query: bool,
    /// `top_k` passed to retrieval when answering.
    pub search_top_k: usize,
    /// Reranked chunks handed to the chat model as context.
    pub context_chunks: usize,
    pub snippet_chars: usize,
    pub summary_input_chars: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self { expand_query: true, search_top_k: 60, context_chunks: 22, snippet_chars: 800, summary_input_chars: 5_000 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
