use crate::cache::SchemaCache;
use crate::engine::SmartSearch;
use crate::openai::{OpenAiEmbedder, OpenAiPlanner};
use crate::solr::SolrClient;
use solrsmart_core::{
    CompileOptions, Result, SearchError, DEFAULT_FACET_LIMIT, DEFAULT_FACET_MINCOUNT,
    DEFAULT_VECTOR_K, HYBRID_CANDIDATE_MULTIPLIER,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub solr_url: String,
    pub solr_user: String,
    pub solr_pass: String,
    pub default_collection: String,
    pub schema_cache_ttl: Duration,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub embedding_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub compile: CompileOptions,
    pub bind_addr: String,
    pub http_timeout: Duration,
}

impl Settings {
    /// Reads the process environment after loading an optional `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let num = |key: &str, default: u64| -> Result<u64> { parse_or(&lookup, key, default) };
        Ok(Self {
            solr_url: get("SOLR_URL", "http://localhost:8983")
                .trim_end_matches('/')
                .to_string(),
            solr_user: get("SOLR_BASIC_USER", ""),
            solr_pass: get("SOLR_BASIC_PASS", ""),
            default_collection: get("SOLR_DEFAULT_COLLECTION", "gettingstarted"),
            schema_cache_ttl: Duration::from_secs(num("SCHEMA_CACHE_TTL_SECS", 600)?),
            llm_base_url: get("LLM_BASE_URL", "http://localhost:8000/v1"),
            llm_api_key: get("LLM_API_KEY", ""),
            llm_model: get("LLM_MODEL", "gpt-4o"),
            embedding_url: get("EMBEDDING_BASE_URL", "http://localhost:8000/v1/embeddings"),
            embedding_api_key: get("EMBEDDING_API_KEY", ""),
            embedding_model: get("EMBEDDING_MODEL", "text-embedding-3-small"),
            compile: CompileOptions {
                default_k: num("DEFAULT_VECTOR_K", DEFAULT_VECTOR_K as u64)? as usize,
                facet_limit: parse_or(&lookup, "FACET_LIMIT", DEFAULT_FACET_LIMIT)?,
                facet_mincount: parse_or(&lookup, "FACET_MINCOUNT", DEFAULT_FACET_MINCOUNT)?,
                candidate_multiplier: num(
                    "HYBRID_CANDIDATE_MULTIPLIER",
                    HYBRID_CANDIDATE_MULTIPLIER as u64,
                )? as usize,
            },
            bind_addr: get("BIND_ADDR", "0.0.0.0:9000"),
            http_timeout: Duration::from_secs(num("HTTP_TIMEOUT_SECS", 30)?),
        })
    }

    /// Wires the Solr client, schema cache and the optional planner and
    /// embedder into a search engine.
    pub fn build_engine(&self) -> Result<SmartSearch> {
        let http = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| SearchError::Config(format!("http client: {e}")))?;
        let solr = SolrClient::with_http_client(
            http.clone(),
            &self.solr_url,
            &self.solr_user,
            &self.solr_pass,
        );
        let mut engine = SmartSearch::new(Arc::new(solr), SchemaCache::new(self.schema_cache_ttl))
            .with_compile_options(self.compile.clone())
            .with_default_collection(self.default_collection.clone());

        if self.llm_api_key.is_empty() {
            warn!("LLM_API_KEY not set, smart search is unavailable");
        } else {
            engine = engine.with_planner(Arc::new(OpenAiPlanner::new(
                http.clone(),
                &self.llm_base_url,
                &self.llm_api_key,
                &self.llm_model,
            )?));
        }
        if self.embedding_url.is_empty() || self.embedding_api_key.is_empty() {
            info!("embedding endpoint not configured, vector and hybrid modes are unavailable");
        } else {
            engine = engine.with_embedder(Arc::new(OpenAiEmbedder::new(
                http,
                &self.embedding_url,
                &self.embedding_api_key,
                &self.embedding_model,
            )?));
        }
        Ok(engine)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| SearchError::Config(format!("{key} must be a number, got {v:?}"))),
        _ => Ok(default),
    }
}
