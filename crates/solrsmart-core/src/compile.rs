use crate::model::FieldCatalog;
use crate::params::{ParamMap, ParamValue};
use crate::plan::{Plan, DEFAULT_VECTOR_K, MATCH_ALL};
use crate::util::choose;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_FACET_LIMIT: i64 = 20;
pub const DEFAULT_FACET_MINCOUNT: i64 = 1;
/// Candidate-phase neighbor count is `rows * HYBRID_CANDIDATE_MULTIPLIER`.
pub const HYBRID_CANDIDATE_MULTIPLIER: usize = 5;
pub const RELEVANCE_QUERY_TYPE: &str = "edismax";

/// Tunables for both compilers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    pub default_k: usize,
    pub facet_limit: i64,
    pub facet_mincount: i64,
    pub candidate_multiplier: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_VECTOR_K,
            facet_limit: DEFAULT_FACET_LIMIT,
            facet_mincount: DEFAULT_FACET_MINCOUNT,
            candidate_multiplier: HYBRID_CANDIDATE_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnnClause {
    pub field: String,
    pub vector: Vec<f32>,
    pub k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub field: String,
    pub limit: i64,
    pub mincount: i64,
}

/// Structured body for the JSON query API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorBody {
    pub knn: Vec<KnnClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub facet: BTreeMap<String, FacetSpec>,
    #[serde(skip_serializing_if = "ParamMap::is_empty")]
    pub params: ParamMap,
}

impl VectorBody {
    /// Replaces an explicit field list with the identifier field alone.
    /// An absent field list stays absent.
    pub fn restrict_fields_to(&mut self, id_field: &str) {
        if id_field.is_empty() {
            return;
        }
        if let Some(fields) = self.fields.as_mut() {
            *fields = vec![id_field.to_string()];
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    pub opts: CompileOptions,
}

impl Compiler {
    pub fn new(opts: CompileOptions) -> Self {
        Self { opts }
    }

    /// Flat parameter map for the relevance query API.
    pub fn keyword_params(
        &self,
        plan: &Plan,
        fc: &FieldCatalog,
        rows: usize,
        start: usize,
    ) -> ParamMap {
        let e = &plan.edismax;
        let mut params = ParamMap::new();
        params.insert("defType", RELEVANCE_QUERY_TYPE);
        params.insert("q", choose(&e.text_query, MATCH_ALL));
        params.insert("rows", rows);
        params.insert("start", start);
        params.insert("wt", "json");
        params.merge(&e.params);
        if !params.contains_key("df") && !fc.guessed.default_df.is_empty() {
            params.insert("df", fc.guessed.default_df.as_str());
        }
        for fq in plan.filter_queries() {
            params.append_filter(fq);
        }
        if !e.sort.trim().is_empty() {
            params.insert("sort", e.sort.as_str());
        }
        if !e.facet_fields.is_empty() {
            params.insert("facet", "true");
            params.insert("facet.field", e.facet_fields.clone());
            params.insert_default("facet.limit", self.opts.facet_limit);
            params.insert_default("facet.mincount", self.opts.facet_mincount);
        }
        if !e.fields.is_empty() {
            params.insert("fl", e.fields.join(","));
        }
        params
    }

    /// Structured nearest-neighbor body. A relevance sub-query is attached
    /// only for a real (non match-all) text query.
    pub fn vector_body(
        &self,
        plan: &Plan,
        fc: &FieldCatalog,
        embedding: &[f32],
        rows: usize,
        start: usize,
    ) -> VectorBody {
        let e = &plan.edismax;
        let k = if plan.vector.k == 0 {
            self.opts.default_k
        } else {
            plan.vector.k
        };
        let query = plan
            .has_text_query()
            .then(|| relevance_subquery(plan, &fc.guessed.default_df));
        let facet = e
            .facet_fields
            .iter()
            .map(|f| {
                (
                    format!("facet_{f}"),
                    FacetSpec {
                        kind: "terms".to_string(),
                        field: f.clone(),
                        limit: self.opts.facet_limit,
                        mincount: self.opts.facet_mincount,
                    },
                )
            })
            .collect();
        VectorBody {
            knn: vec![KnnClause {
                field: plan.vector.field.clone(),
                vector: embedding.to_vec(),
                k,
            }],
            query,
            filter: plan.filter_queries(),
            limit: rows,
            offset: start,
            fields: (!e.fields.is_empty()).then(|| e.fields.clone()),
            sort: (!e.sort.trim().is_empty()).then(|| e.sort.clone()),
            facet,
            params: e.params.clone(),
        }
    }

    /// Neighbor count for the hybrid candidate phase; never below the default k.
    pub fn candidate_k(&self, rows: usize) -> usize {
        rows.saturating_mul(self.opts.candidate_multiplier)
            .max(self.opts.default_k)
    }

    /// Candidate-phase body: enlarged k, zero offset, identifiers only.
    pub fn candidate_body(
        &self,
        plan: &Plan,
        fc: &FieldCatalog,
        embedding: &[f32],
        rows: usize,
    ) -> VectorBody {
        let k = self.candidate_k(rows);
        let mut wide = plan.clone();
        wide.vector.k = k;
        let mut body = self.vector_body(&wide, fc, embedding, k, 0);
        body.restrict_fields_to(&fc.unique_key);
        body
    }
}

fn relevance_subquery(plan: &Plan, guessed_df: &str) -> String {
    let params = &plan.edismax.params;
    let mut local = vec![format!("!{RELEVANCE_QUERY_TYPE}")];
    if let Some(qf) = params.get("qf") {
        local.push(format!("qf={}", local_param_value(&field_list(qf))));
    }
    let df = params
        .get("df")
        .map(|v| v.render())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| guessed_df.to_string());
    if !df.is_empty() {
        local.push(format!("df={}", local_param_value(&df)));
    }
    format!("{{{}}}{}", local.join(" "), plan.edismax.text_query)
}

// Field lists inside local params are whitespace-separated.
fn field_list(v: &ParamValue) -> String {
    match v {
        ParamValue::List(xs) => xs.join(" "),
        other => other.render(),
    }
}

fn local_param_value(v: &str) -> String {
    if v.chars().any(char::is_whitespace) {
        format!("'{}'", v.replace('\'', "\\'"))
    } else {
        v.to_string()
    }
}
