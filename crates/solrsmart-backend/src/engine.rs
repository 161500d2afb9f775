use crate::cache::SchemaCache;
use crate::cancel::guarded;
use crate::catalog::CatalogService;
use crate::hybrid::run_hybrid;
use crate::metrics::SEARCHES_TOTAL;
use crate::traits::{Embedder, PlanRequest, PlanSource, SearchBackend};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use solrsmart_core::{
    summarize_schema, CompileOptions, Compiler, FieldCatalog, GuessedFields, ParamMap, Plan,
    Result, SearchError, SearchMode, UpstreamCall, VectorBody,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

pub const DEFAULT_ROWS: usize = 10;

fn default_rows() -> usize {
    DEFAULT_ROWS
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmartSearchRequest {
    #[serde(default)]
    pub collection: String,
    pub query: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub allow_vector: bool,
    #[serde(default)]
    pub allow_hybrid: bool,
}

/// The backend request(s) a search actually issued.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompiledRequest {
    Keyword {
        params: ParamMap,
    },
    Vector {
        body: VectorBody,
    },
    Hybrid {
        candidate_body: VectorBody,
        params: ParamMap,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    Keyword,
    Vector,
    Hybrid,
    HybridFallback,
}

impl ExecutionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
            Self::HybridFallback => "hybrid_fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartSearchResponse {
    pub collection: String,
    pub path: ExecutionPath,
    pub plan: Plan,
    pub plan_raw: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<JsonValue>,
    pub compiled: CompiledRequest,
    pub response: JsonValue,
    pub guessed: GuessedFields,
    pub execution_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<usize>,
}

/// Entry point for planned search: resolves the catalog, acquires a plan,
/// and dispatches to the keyword, vector or hybrid path.
#[derive(Clone)]
pub struct SmartSearch {
    backend: Arc<dyn SearchBackend>,
    catalogs: CatalogService,
    planner: Option<Arc<dyn PlanSource>>,
    embedder: Option<Arc<dyn Embedder>>,
    compiler: Compiler,
    default_collection: String,
}

impl SmartSearch {
    pub fn new(backend: Arc<dyn SearchBackend>, cache: SchemaCache) -> Self {
        Self {
            catalogs: CatalogService::new(backend.clone(), cache),
            backend,
            planner: None,
            embedder: None,
            compiler: Compiler::new(CompileOptions::default()),
            default_collection: String::new(),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn PlanSource>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_compile_options(mut self, opts: CompileOptions) -> Self {
        self.compiler = Compiler::new(opts);
        self
    }

    pub fn with_default_collection(mut self, collection: impl Into<String>) -> Self {
        self.default_collection = collection.into();
        self
    }

    pub fn cache(&self) -> &SchemaCache {
        self.catalogs.cache()
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn resolve_collection<'a>(&'a self, collection: &'a str) -> Result<&'a str> {
        let c = solrsmart_core::util::choose(collection, &self.default_collection).trim();
        if c.is_empty() {
            return Err(SearchError::Invalid("collection is required".into()));
        }
        Ok(c)
    }

    pub async fn schema(
        &self,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<FieldCatalog>> {
        let collection = self.resolve_collection(collection)?;
        self.catalogs.field_catalog(collection, cancel).await
    }

    pub async fn commit(&self, collection: &str, cancel: &CancellationToken) -> Result<JsonValue> {
        let collection = self.resolve_collection(collection)?;
        info!(collection, "commit");
        guarded(cancel, UpstreamCall::Commit, self.backend.commit(collection)).await
    }

    pub async fn cluster_status(&self, cancel: &CancellationToken) -> Result<JsonValue> {
        guarded(
            cancel,
            UpstreamCall::ClusterStatus,
            self.backend.cluster_status(),
        )
        .await
    }

    pub async fn search(
        &self,
        req: &SmartSearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SmartSearchResponse> {
        let collection = self.resolve_collection(&req.collection)?.to_string();
        let query = req.query.trim();
        if query.is_empty() {
            return Err(SearchError::Invalid("query is required".into()));
        }
        let planner = self
            .planner
            .clone()
            .ok_or_else(|| SearchError::Config("LLM_API_KEY must be set for smart search".into()))?;

        let span = tracing::info_span!(
            "smart_search",
            request_id = %uuid::Uuid::new_v4(),
            collection = %collection
        );
        async move {
            let fc = self.catalogs.field_catalog(&collection, cancel).await?;
            let summary = summarize_schema(&fc);
            let acquired = guarded(
                cancel,
                UpstreamCall::Plan,
                planner.acquire_plan(&PlanRequest {
                    user_query: query,
                    locale: &req.locale,
                    schema_summary: &summary,
                    allow_vector: req.allow_vector,
                    allow_hybrid: req.allow_hybrid,
                    default_k: self.compiler.opts.default_k,
                }),
            )
            .await?;
            let plan = acquired.plan;
            info!(mode = %plan.mode, "plan acquired");

            let (path, compiled, response, note, candidates) = match plan.mode {
                SearchMode::Keyword => {
                    let params = self.compiler.keyword_params(&plan, &fc, req.rows, req.start);
                    let response = guarded(
                        cancel,
                        UpstreamCall::Select,
                        self.backend.select(&collection, &params),
                    )
                    .await?;
                    (
                        ExecutionPath::Keyword,
                        CompiledRequest::Keyword { params },
                        response,
                        "keyword: edismax query".to_string(),
                        None,
                    )
                }
                SearchMode::Vector => {
                    if !req.allow_vector {
                        return Err(SearchError::ModeDisabled("vector"));
                    }
                    plan.validate()?;
                    let embedding = self.embed(plan.embedding_text(query), cancel).await?;
                    let body = self
                        .compiler
                        .vector_body(&plan, &fc, &embedding, req.rows, req.start);
                    let response = guarded(
                        cancel,
                        UpstreamCall::JsonQuery,
                        self.backend.query_json(&collection, &body),
                    )
                    .await?;
                    let note = format!(
                        "vector: knn on {} (k={})",
                        plan.vector.field, body.knn[0].k
                    );
                    (
                        ExecutionPath::Vector,
                        CompiledRequest::Vector { body },
                        response,
                        note,
                        None,
                    )
                }
                SearchMode::Hybrid => {
                    if !(req.allow_vector && req.allow_hybrid) {
                        return Err(SearchError::ModeDisabled("hybrid"));
                    }
                    plan.validate()?;
                    let embedding = self.embed(plan.embedding_text(query), cancel).await?;
                    let run = run_hybrid(
                        self.backend.as_ref(),
                        &self.compiler,
                        &collection,
                        &plan,
                        &fc,
                        &embedding,
                        req.rows,
                        req.start,
                        cancel,
                    )
                    .await?;
                    let path = if run.merge.fell_back {
                        ExecutionPath::HybridFallback
                    } else {
                        ExecutionPath::Hybrid
                    };
                    (
                        path,
                        CompiledRequest::Hybrid {
                            candidate_body: run.candidate_body,
                            params: run.merge.params,
                        },
                        run.response,
                        run.merge.note,
                        Some(run.merge.candidates),
                    )
                }
            };
            SEARCHES_TOTAL.with_label_values(&[path.as_str()]).inc();
            info!(path = path.as_str(), "search complete");

            Ok::<_, SearchError>(SmartSearchResponse {
                collection: collection.clone(),
                path,
                reasoning: plan.reasoning.clone(),
                plan,
                plan_raw: acquired.raw,
                compiled,
                response,
                guessed: fc.guessed.clone(),
                execution_notes: note,
                candidates,
            })
        }
        .instrument(span)
        .await
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            SearchError::Config(
                "EMBEDDING_BASE_URL and EMBEDDING_API_KEY must be set for vector search".into(),
            )
        })?;
        let v = guarded(cancel, UpstreamCall::Embedding, embedder.embed(text)).await?;
        if v.is_empty() {
            return Err(SearchError::upstream(
                UpstreamCall::Embedding,
                "empty embedding vector",
            ));
        }
        Ok(v)
    }
}
