use async_trait::async_trait;
use serde_json::Value as JsonValue;
use solrsmart_core::{AcquiredPlan, FieldDescriptor, FieldMetadata, ParamMap, Result, VectorBody};
use std::collections::BTreeMap;

/// Document-search backend: schema reads, the two query APIs, and the
/// passthrough admin calls.
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    async fn unique_key(&self, collection: &str) -> Result<String>;
    async fn fields(&self, collection: &str) -> Result<Vec<FieldDescriptor>>;
    async fn field_metadata(&self, collection: &str) -> Result<BTreeMap<String, FieldMetadata>>;

    // Relevance query, parameter-encoded
    async fn select(&self, collection: &str, params: &ParamMap) -> Result<JsonValue>;
    // Structured JSON query
    async fn query_json(&self, collection: &str, body: &VectorBody) -> Result<JsonValue>;

    async fn commit(&self, collection: &str) -> Result<JsonValue>;
    async fn cluster_status(&self) -> Result<JsonValue>;
}

#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub user_query: &'a str,
    pub locale: &'a str,
    pub schema_summary: &'a str,
    pub allow_vector: bool,
    pub allow_hybrid: bool,
    pub default_k: usize,
}

/// Turns a natural-language request into a plan.
#[async_trait]
pub trait PlanSource: Send + Sync + 'static {
    async fn acquire_plan(&self, req: &PlanRequest<'_>) -> Result<AcquiredPlan>;
}

#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Never returns an empty vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
