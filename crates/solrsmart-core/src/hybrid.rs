//! Pure steps of the two-phase hybrid protocol. The backend crate drives the
//! I/O between them.

use crate::compile::Compiler;
use crate::model::FieldCatalog;
use crate::params::ParamMap;
use crate::plan::Plan;
use serde_json::Value as JsonValue;

/// Result of the candidate phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Empty,
    Found(Vec<String>),
}

impl CandidateOutcome {
    pub fn from_response(resp: &JsonValue, id_field: &str) -> Self {
        let ids = extract_ids(resp, id_field);
        if ids.is_empty() {
            Self::Empty
        } else {
            Self::Found(ids)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Found(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifier of every returned document, in response order. Numeric
/// identifiers are rendered as integers when integral; documents without the
/// identifier field are skipped.
pub fn extract_ids(resp: &JsonValue, id_field: &str) -> Vec<String> {
    let docs = match resp.pointer("/response/docs").and_then(JsonValue::as_array) {
        Some(d) => d,
        None => return Vec::new(),
    };
    docs.iter()
        .filter_map(|d| d.get(id_field))
        .filter_map(|v| match v {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(number_id(n)),
            _ => None,
        })
        .collect()
}

fn number_id(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

const QUERY_SPECIAL: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&',
    ';', '/',
];

/// Backslash-escapes query-syntax characters and whitespace.
pub fn escape_query_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if QUERY_SPECIAL.contains(&c) || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `field:(a OR b OR ...)`
pub fn id_filter(id_field: &str, ids: &[String]) -> String {
    let joined = ids
        .iter()
        .map(|id| escape_query_value(id))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("{id_field}:({joined})")
}

/// The keyword request of the merge phase.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStep {
    pub params: ParamMap,
    pub candidates: usize,
    pub fell_back: bool,
    pub note: String,
}

/// Exit branch per candidate outcome: empty recall degrades to keyword-only,
/// otherwise the keyword query is restricted to the candidate identifiers.
pub fn merge_step(
    compiler: &Compiler,
    plan: &Plan,
    fc: &FieldCatalog,
    outcome: &CandidateOutcome,
    rows: usize,
    start: usize,
) -> MergeStep {
    let mut params = compiler.keyword_params(plan, fc, rows, start);
    match outcome {
        CandidateOutcome::Empty => MergeStep {
            params,
            candidates: 0,
            fell_back: true,
            note: "hybrid: vector recall was empty, fell back to keyword-only search".to_string(),
        },
        CandidateOutcome::Found(ids) => {
            params.append_filter(id_filter(&fc.unique_key, ids));
            MergeStep {
                params,
                candidates: ids.len(),
                fell_back: false,
                note: format!(
                    "hybrid: vector recall produced {} candidates, keyword query restricted to them",
                    ids.len()
                ),
            }
        }
    }
}
