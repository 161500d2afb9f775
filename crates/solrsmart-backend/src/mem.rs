use crate::traits::{Embedder, PlanRequest, PlanSource, SearchBackend};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value as JsonValue};
use solrsmart_core::{
    AcquiredPlan, FieldDescriptor, FieldMetadata, ParamMap, ParamValue, Plan, Result, SearchError,
    UpstreamCall, VectorBody, MATCH_ALL,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

const DEFAULT_ROWS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct MemCollection {
    pub unique_key: String,
    pub fields: Vec<FieldDescriptor>,
    // None answers the metadata call with a not-found error
    pub metadata: Option<BTreeMap<String, FieldMetadata>>,
    pub docs: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Select { collection: String, params: ParamMap },
    Json { collection: String, body: JsonValue },
}

/// Search backend held in memory. Counts every call, records query requests,
/// and fails any call kind on demand. Relevance matching is term containment
/// and nearest-neighbor ranking is cosine similarity over stored vectors.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, MemCollection>,
    calls: HashMap<UpstreamCall, usize>,
    // persistent until cleared
    failures: HashMap<UpstreamCall, String>,
    requests: Vec<RecordedRequest>,
    commits: HashMap<String, u64>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_collection(&self, name: &str, collection: MemCollection) {
        self.inner
            .write()
            .collections
            .insert(name.to_string(), collection);
    }

    pub fn fail(&self, call: UpstreamCall, message: &str) {
        self.inner
            .write()
            .failures
            .insert(call, message.to_string());
    }

    pub fn clear_failure(&self, call: UpstreamCall) {
        self.inner.write().failures.remove(&call);
    }

    pub fn calls(&self, call: UpstreamCall) -> usize {
        self.inner.read().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.read().calls.values().sum()
    }

    pub fn last_select(&self) -> Option<ParamMap> {
        self.inner.read().requests.iter().rev().find_map(|r| match r {
            RecordedRequest::Select { params, .. } => Some(params.clone()),
            _ => None,
        })
    }

    pub fn last_json(&self) -> Option<JsonValue> {
        self.inner.read().requests.iter().rev().find_map(|r| match r {
            RecordedRequest::Json { body, .. } => Some(body.clone()),
            _ => None,
        })
    }

    pub fn commits(&self, collection: &str) -> u64 {
        self.inner
            .read()
            .commits
            .get(collection)
            .copied()
            .unwrap_or(0)
    }

    // Counts the call, then applies any injected failure.
    fn enter(&self, call: UpstreamCall) -> Result<()> {
        let mut inner = self.inner.write();
        *inner.calls.entry(call).or_insert(0) += 1;
        match inner.failures.get(&call) {
            Some(msg) => Err(SearchError::upstream(call, msg.clone())),
            None => Ok(()),
        }
    }

    fn collection(&self, call: UpstreamCall, name: &str) -> Result<MemCollection> {
        self.inner
            .read()
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| {
                SearchError::upstream(call, format!("HTTP status 404: collection {name} not found"))
            })
    }

    fn record(&self, req: RecordedRequest) {
        self.inner.write().requests.push(req);
    }
}

#[async_trait::async_trait]
impl SearchBackend for InMemoryBackend {
    async fn unique_key(&self, collection: &str) -> Result<String> {
        self.enter(UpstreamCall::UniqueKey)?;
        Ok(self.collection(UpstreamCall::UniqueKey, collection)?.unique_key)
    }

    async fn fields(&self, collection: &str) -> Result<Vec<FieldDescriptor>> {
        self.enter(UpstreamCall::Fields)?;
        Ok(self.collection(UpstreamCall::Fields, collection)?.fields)
    }

    async fn field_metadata(&self, collection: &str) -> Result<BTreeMap<String, FieldMetadata>> {
        self.enter(UpstreamCall::FieldMetadata)?;
        self.collection(UpstreamCall::FieldMetadata, collection)?
            .metadata
            .ok_or_else(|| {
                SearchError::upstream(
                    UpstreamCall::FieldMetadata,
                    "HTTP status 404: field_metadata.json not found",
                )
            })
    }

    async fn select(&self, collection: &str, params: &ParamMap) -> Result<JsonValue> {
        self.enter(UpstreamCall::Select)?;
        let coll = self.collection(UpstreamCall::Select, collection)?;
        self.record(RecordedRequest::Select {
            collection: collection.to_string(),
            params: params.clone(),
        });

        let filters = parse_filters(UpstreamCall::Select, params.get("fq"))?;
        let mut docs: Vec<JsonValue> = coll
            .docs
            .into_iter()
            .filter(|d| filters.iter().all(|f| f.matches(d)))
            .collect();

        let q = params.get_str("q").unwrap_or(MATCH_ALL).trim();
        if !q.is_empty() && q != MATCH_ALL {
            let terms = query_terms(q);
            let df = params.get_str("df");
            let mut scored: Vec<(usize, JsonValue)> = docs
                .into_iter()
                .map(|d| (term_score(&d, &terms, df), d))
                .filter(|(s, _)| *s > 0)
                .collect();
            // stable, so ties keep insertion order
            scored.sort_by(|a, b| b.0.cmp(&a.0));
            docs = scored.into_iter().map(|(_, d)| d).collect();
        }

        let num_found = docs.len();
        let start = param_usize(params, "start").unwrap_or(0);
        let rows = param_usize(params, "rows").unwrap_or(DEFAULT_ROWS);
        let fl = params
            .get("fl")
            .map(|v| v.render())
            .filter(|s| !s.trim().is_empty() && s.trim() != "*");
        let page: Vec<JsonValue> = docs
            .into_iter()
            .skip(start)
            .take(rows)
            .map(|d| project(d, fl.as_deref()))
            .collect();
        Ok(json!({
            "responseHeader": {"status": 0, "params": params},
            "response": {"numFound": num_found, "start": start, "docs": page},
        }))
    }

    async fn query_json(&self, collection: &str, body: &VectorBody) -> Result<JsonValue> {
        self.enter(UpstreamCall::JsonQuery)?;
        let coll = self.collection(UpstreamCall::JsonQuery, collection)?;
        let raw = serde_json::to_value(body).map_err(|e| SearchError::Internal(e.to_string()))?;
        self.record(RecordedRequest::Json {
            collection: collection.to_string(),
            body: raw,
        });

        let mut filters = Vec::new();
        for fq in body.filter.iter() {
            filters.push(Filter::parse(UpstreamCall::JsonQuery, fq)?);
        }
        let candidates = coll
            .docs
            .into_iter()
            .filter(|d| filters.iter().all(|f| f.matches(d)));

        let mut ranked: Vec<JsonValue> = match body.knn.first() {
            Some(knn) => {
                let mut scored: Vec<(f32, JsonValue)> = Vec::new();
                for d in candidates {
                    if let Some(v) = stored_vector(&d, &knn.field) {
                        if v.len() == knn.vector.len() {
                            scored.push((cosine_sim(&v, &knn.vector), d));
                        }
                    }
                }
                scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
                scored.truncate(knn.k);
                scored.into_iter().map(|(_, d)| d).collect()
            }
            None => candidates.collect(),
        };

        let num_found = ranked.len();
        let fl = body.fields.as_ref().map(|f| f.join(","));
        ranked = ranked
            .into_iter()
            .skip(body.offset)
            .take(body.limit)
            .map(|d| project(d, fl.as_deref()))
            .collect();
        Ok(json!({
            "responseHeader": {"status": 0},
            "response": {"numFound": num_found, "start": body.offset, "docs": ranked},
        }))
    }

    async fn commit(&self, collection: &str) -> Result<JsonValue> {
        self.enter(UpstreamCall::Commit)?;
        self.collection(UpstreamCall::Commit, collection)?;
        *self
            .inner
            .write()
            .commits
            .entry(collection.to_string())
            .or_insert(0) += 1;
        Ok(json!({"responseHeader": {"status": 0, "QTime": 0}}))
    }

    async fn cluster_status(&self) -> Result<JsonValue> {
        self.enter(UpstreamCall::ClusterStatus)?;
        let inner = self.inner.read();
        let collections: serde_json::Map<String, JsonValue> = inner
            .collections
            .keys()
            .map(|name| (name.clone(), json!({"shards": {}})))
            .collect();
        Ok(json!({
            "responseHeader": {"status": 0},
            "cluster": {"collections": collections, "live_nodes": ["mem"]},
        }))
    }
}

/// Filter dialect understood by the in-memory backend: `*:*`, `f:value`,
/// `f:(a OR b)` and `f:[lo TO hi]` with `{}` for exclusive bounds.
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    All,
    Equals(String, String),
    AnyOf(String, Vec<String>),
    Range {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
}

impl Filter {
    fn parse(call: UpstreamCall, fq: &str) -> Result<Self> {
        let fq = fq.trim();
        if fq == MATCH_ALL {
            return Ok(Self::All);
        }
        let (field, rest) = fq
            .split_once(':')
            .ok_or_else(|| SearchError::upstream(call, format!("unsupported filter: {fq}")))?;
        let field = field.trim().to_string();
        let rest = rest.trim();
        if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            let values = inner.split(" OR ").map(|v| unescape(v.trim())).collect();
            return Ok(Self::AnyOf(field, values));
        }
        let open = rest.chars().next();
        let close = rest.chars().last();
        if matches!(open, Some('[') | Some('{')) && matches!(close, Some(']') | Some('}')) {
            let inner = &rest[1..rest.len() - 1];
            let (lo, hi) = inner
                .split_once(" TO ")
                .ok_or_else(|| SearchError::upstream(call, format!("unsupported range: {fq}")))?;
            let bound = |s: &str| {
                let s = s.trim();
                (s != "*").then(|| s.to_string())
            };
            return Ok(Self::Range {
                field,
                lower: bound(lo),
                upper: bound(hi),
                include_lower: open == Some('['),
                include_upper: close == Some(']'),
            });
        }
        Ok(Self::Equals(field, unescape(rest.trim_matches('"'))))
    }

    fn matches(&self, doc: &JsonValue) -> bool {
        let values = |field: &str| doc_values(doc, field);
        match self {
            Self::All => true,
            Self::Equals(f, v) => values(f).iter().any(|x| x == v),
            Self::AnyOf(f, vs) => values(f).iter().any(|x| vs.contains(x)),
            Self::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => values(field).iter().any(|x| {
                let above = match lower {
                    None => true,
                    Some(lo) => match compare(x, lo) {
                        Ordering::Greater => true,
                        Ordering::Equal => *include_lower,
                        Ordering::Less => false,
                    },
                };
                let below = match upper {
                    None => true,
                    Some(hi) => match compare(x, hi) {
                        Ordering::Less => true,
                        Ordering::Equal => *include_upper,
                        Ordering::Greater => false,
                    },
                };
                above && below
            }),
        }
    }
}

fn parse_filters(call: UpstreamCall, fq: Option<&ParamValue>) -> Result<Vec<Filter>> {
    let raw: Vec<String> = match fq {
        None => Vec::new(),
        Some(ParamValue::List(xs)) => xs.clone(),
        Some(other) => vec![other.render()],
    };
    raw.iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| Filter::parse(call, f))
        .collect()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// Numeric when both sides parse, lexical otherwise (ISO dates sort lexically).
fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn scalar_string(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn doc_values(doc: &JsonValue, field: &str) -> Vec<String> {
    match doc.get(field) {
        Some(JsonValue::Array(xs)) => xs.iter().filter_map(scalar_string).collect(),
        Some(v) => scalar_string(v).into_iter().collect(),
        None => Vec::new(),
    }
}

fn query_terms(q: &str) -> Vec<String> {
    q.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty() && t != "or" && t != "and")
        .collect()
}

// Number of query terms contained in the default field, or in any string
// field when no default is given.
fn term_score(doc: &JsonValue, terms: &[String], df: Option<&str>) -> usize {
    let text = match df.filter(|f| doc.get(*f).is_some()) {
        Some(f) => doc_values(doc, f).join(" "),
        None => doc
            .as_object()
            .map(|m| {
                m.values()
                    .flat_map(|v| match v {
                        JsonValue::String(s) => vec![s.clone()],
                        JsonValue::Array(xs) => xs
                            .iter()
                            .filter_map(|x| x.as_str().map(String::from))
                            .collect(),
                        _ => Vec::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default(),
    };
    let text = text.to_lowercase();
    terms.iter().filter(|t| text.contains(t.as_str())).count()
}

fn param_usize(params: &ParamMap, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.render().trim().parse().ok())
}

fn project(doc: JsonValue, fl: Option<&str>) -> JsonValue {
    let Some(fl) = fl else { return doc };
    let keep: Vec<&str> = fl.split(',').map(str::trim).collect();
    match doc {
        JsonValue::Object(m) => JsonValue::Object(
            m.into_iter()
                .filter(|(k, _)| keep.contains(&k.as_str()))
                .collect(),
        ),
        other => other,
    }
}

fn stored_vector(doc: &JsonValue, field: &str) -> Option<Vec<f32>> {
    let xs = doc.get(field)?.as_array()?;
    Some(
        xs.iter()
            .filter_map(|x| x.as_f64().map(|f| f as f32))
            .collect(),
    )
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Plan source answering every request with the same content.
pub struct StaticPlanSource {
    content: String,
    calls: AtomicUsize,
    last_summary: Mutex<Option<String>>,
}

impl StaticPlanSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            calls: AtomicUsize::new(0),
            last_summary: Mutex::new(None),
        }
    }

    pub fn from_json(plan: &JsonValue) -> Self {
        Self::new(plan.to_string())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Schema summary passed with the most recent request.
    pub fn last_summary(&self) -> Option<String> {
        self.last_summary.lock().clone()
    }
}

#[async_trait::async_trait]
impl PlanSource for StaticPlanSource {
    async fn acquire_plan(&self, req: &PlanRequest<'_>) -> Result<AcquiredPlan> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        *self.last_summary.lock() = Some(req.schema_summary.to_string());
        Plan::parse(&self.content, req.default_k)
    }
}

pub struct StaticEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
    last_text: Mutex<Option<String>>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
            last_text: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    pub fn last_text(&self) -> Option<String> {
        self.last_text.lock().clone()
    }
}

#[async_trait::async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        *self.last_text.lock() = Some(text.to_string());
        if self.vector.is_empty() {
            return Err(SearchError::upstream(
                UpstreamCall::Embedding,
                "empty embedding vector",
            ));
        }
        Ok(self.vector.clone())
    }
}
