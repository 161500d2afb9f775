use crate::traits::{Embedder, PlanRequest, PlanSource};
use chrono::{DateTime, FixedOffset, Local};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use solrsmart_core::{AcquiredPlan, Plan, Result, SearchError, UpstreamCall};
use tracing::{debug, error};

pub const PLAN_TEMPERATURE: f64 = 0.2;
pub const PLAN_MAX_TOKENS: u32 = 800;

const SYSTEM_PROMPT: &str = "You translate natural-language search requests into structured \
search plans for a Solr collection. The people asking do not know the schema or any query \
syntax. Map their words onto the fields listed in the schema, prefer filters for anything \
certain (dates, flags, exact values) and free text for the rest, and record every assumption \
in _reasoning. Reply with a single JSON object and nothing else.";

/// Plan source backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiPlanner {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiPlanner {
    pub fn new(http: Client, base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(SearchError::Config(
                "LLM_API_KEY must be set for smart search".into(),
            ));
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait::async_trait]
impl PlanSource for OpenAiPlanner {
    async fn acquire_plan(&self, req: &PlanRequest<'_>) -> Result<AcquiredPlan> {
        let now = Local::now().fixed_offset();
        let user = user_prompt(req, now);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user},
            ],
            "temperature": PLAN_TEMPERATURE,
            "response_format": {"type": "json_object"},
            "max_tokens": PLAN_MAX_TOKENS,
        });
        let url = self.completions_url();
        debug!(%url, model = %self.model, "requesting search plan");
        let out = post_json(&self.http, UpstreamCall::Plan, &url, &self.api_key, &body).await?;
        let content = first_choice_content(&out)?;
        Plan::parse(&content, req.default_k)
    }
}

/// Embedding client for an OpenAI-compatible embeddings endpoint. The URL is
/// the full endpoint, not a base.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    http: Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(http: Client, url: &str, api_key: &str, model: &str) -> Result<Self> {
        if url.trim().is_empty() || api_key.trim().is_empty() {
            return Err(SearchError::Config(
                "EMBEDDING_BASE_URL and EMBEDDING_API_KEY must be set for vector search".into(),
            ));
        }
        Ok(Self {
            http,
            url: url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({"model": self.model, "input": text});
        let out = post_json(
            &self.http,
            UpstreamCall::Embedding,
            &self.url,
            &self.api_key,
            &body,
        )
        .await?;
        parse_embedding(&out)
    }
}

/// Reads `data[0].embedding`, skipping non-numeric entries. An `error`
/// member is reported as an upstream failure.
pub fn parse_embedding(out: &JsonValue) -> Result<Vec<f32>> {
    reject_error_member(UpstreamCall::Embedding, out)?;
    let first = out
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .ok_or_else(|| {
            SearchError::upstream(UpstreamCall::Embedding, "embedding API returned no data")
        })?;
    let vector: Vec<f32> = first
        .get("embedding")
        .and_then(|e| e.as_array())
        .map(|xs| {
            xs.iter()
                .filter_map(|x| x.as_f64().map(|f| f as f32))
                .collect()
        })
        .unwrap_or_default();
    if vector.is_empty() {
        return Err(SearchError::upstream(
            UpstreamCall::Embedding,
            "empty embedding vector",
        ));
    }
    Ok(vector)
}

/// `choices[0].message.content`. An `error` member is reported as an upstream
/// failure; a missing content comes back empty and fails plan parsing.
pub fn first_choice_content(out: &JsonValue) -> Result<String> {
    reject_error_member(UpstreamCall::Plan, out)?;
    Ok(out
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

// Accepts an object, or an array whose first element is taken.
async fn post_json(
    http: &Client,
    call: UpstreamCall,
    url: &str,
    api_key: &str,
    body: &JsonValue,
) -> Result<JsonValue> {
    let resp = http
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| SearchError::upstream(call, format!("HTTP request error: {e}")))?;
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| SearchError::upstream(call, format!("failed to read response body: {e}")))?;
    let parsed: JsonValue = serde_json::from_str(&text)
        .map_err(|e| SearchError::decode(call, format!("{e}; response: {text}")))?;
    let out = match parsed {
        JsonValue::Array(mut xs) => {
            if xs.is_empty() {
                return Err(SearchError::upstream(call, "API returned an empty array"));
            }
            xs.swap_remove(0)
        }
        other => other,
    };
    if !status.is_success() {
        let detail = out
            .get("error")
            .map(|e| e.to_string())
            .unwrap_or_else(|| text.clone());
        error!(call = call.as_str(), status = status.as_u16(), error = %detail, "API call failed");
        return Err(SearchError::upstream(
            call,
            format!("HTTP status {}: {detail}", status.as_u16()),
        ));
    }
    if !out.is_object() {
        return Err(SearchError::decode(
            call,
            format!("expected a JSON object, got: {text}"),
        ));
    }
    Ok(out)
}

// 2xx bodies may still carry an `error` member.
fn reject_error_member(call: UpstreamCall, out: &JsonValue) -> Result<()> {
    match out.get("error") {
        Some(err) => {
            error!(call = call.as_str(), error = %err, "API returned an error");
            Err(SearchError::upstream(
                call,
                format!("API returned an error: {err}"),
            ))
        }
        None => Ok(()),
    }
}

/// `Z` for UTC, `+HH:MM` / `-HH:MM` otherwise.
pub fn utc_offset_label(offset_secs: i32) -> String {
    if offset_secs == 0 {
        return "Z".to_string();
    }
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let abs = offset_secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

pub fn user_prompt(req: &PlanRequest<'_>, now: DateTime<FixedOffset>) -> String {
    let offset = utc_offset_label(now.offset().local_minus_utc());
    let mut modes = vec!["keyword"];
    if req.allow_vector {
        modes.push("vector");
        if req.allow_hybrid {
            modes.push("hybrid");
        }
    }
    let locale = if req.locale.trim().is_empty() {
        "unspecified"
    } else {
        req.locale
    };
    format!(
        r#"CONTEXT
- current time: {now} (UTC offset {offset})
- locale: {locale}
- permitted modes: {modes}

SCHEMA
{schema}

USER QUERY
"{query}"

Resolve relative dates against the current time and write them as ISO-8601
timestamps carrying the offset {offset}. Use only field names that appear in
the schema. Put certain constraints in filters or ranges and the remaining
words in text_query. Leave text_query empty to match everything. Choose
"vector" for conceptual similarity and "hybrid" when both exact terms and
similarity matter, but only among the permitted modes. vector.field must name
a dense-vector field when the mode is not keyword.

Reply with exactly this JSON shape:
{{
  "mode": "keyword|vector|hybrid",
  "edismax": {{
    "text_query": "...",
    "filters": ["field:value"],
    "ranges": [{{"field": "...", "type": "date|number", "from": "...", "to": "...", "include_lower": true, "include_upper": true}}],
    "sort": "field desc",
    "facet_fields": ["..."],
    "params": {{"qf": "field^2 other", "mm": "75%"}},
    "fields": ["..."]
  }},
  "vector": {{"field": "...", "k": 10, "query_text": "..."}},
  "_reasoning": {{"field_mappings": {{}}, "assumptions": [], "confidence": "high|medium|low"}}
}}"#,
        now = now.to_rfc3339(),
        modes = modes.join(", "),
        schema = req.schema_summary,
        query = req.user_query,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request<'a>(summary: &'a str) -> PlanRequest<'a> {
        PlanRequest {
            user_query: "cheap red cables",
            locale: "en-US",
            schema_summary: summary,
            allow_vector: true,
            allow_hybrid: false,
            default_k: 5,
        }
    }

    #[test]
    fn offset_labels() {
        assert_eq!(utc_offset_label(0), "Z");
        assert_eq!(utc_offset_label(9 * 3600), "+09:00");
        assert_eq!(utc_offset_label(-(5 * 3600 + 30 * 60)), "-05:30");
    }

    #[test]
    fn prompt_carries_context() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2025, 10, 3, 12, 0, 0).unwrap();
        let p = user_prompt(&request("uniqueKey=id"), now);
        assert!(p.contains("2025-10-03T12:00:00+09:00"));
        assert!(p.contains("UTC offset +09:00"));
        assert!(p.contains("locale: en-US"));
        assert!(p.contains("permitted modes: keyword, vector\n"));
        assert!(p.contains("uniqueKey=id"));
        assert!(p.contains("\"cheap red cables\""));
    }

    #[test]
    fn hybrid_needs_vector_permission_in_prompt() {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .unwrap();
        let mut req = request("");
        req.allow_vector = false;
        req.allow_hybrid = true;
        let p = user_prompt(&req, now);
        assert!(p.contains("permitted modes: keyword\n"));
        assert!(p.contains("UTC offset Z"));
    }

    #[test]
    fn choice_content_extraction() {
        let ok = json!({"choices": [{"message": {"content": "{\"mode\":\"keyword\"}"}}]});
        assert_eq!(first_choice_content(&ok).unwrap(), "{\"mode\":\"keyword\"}");
        assert_eq!(first_choice_content(&json!({"choices": []})).unwrap(), "");
        let err = first_choice_content(&json!({"error": {"message": "quota"}})).unwrap_err();
        assert_eq!(err.call(), Some(UpstreamCall::Plan));
    }

    #[test]
    fn embedding_parsing() {
        let v = parse_embedding(&json!({"data": [{"embedding": [0.5, "x", 1]}]})).unwrap();
        assert_eq!(v, vec![0.5, 1.0]);
        assert!(parse_embedding(&json!({"data": []})).is_err());
        assert!(parse_embedding(&json!({"data": [{"embedding": []}]})).is_err());
    }

    #[test]
    fn embedding_error_member_is_reported() {
        let err = parse_embedding(&json!({"error": {"message": "model overloaded"}})).unwrap_err();
        match err {
            SearchError::Upstream { call, message } => {
                assert_eq!(call, UpstreamCall::Embedding);
                assert!(message.contains("model overloaded"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn constructors_require_credentials() {
        let http = Client::new();
        assert!(matches!(
            OpenAiPlanner::new(http.clone(), "http://x/v1", "", "m"),
            Err(SearchError::Config(_))
        ));
        assert!(matches!(
            OpenAiEmbedder::new(http.clone(), "", "key", "m"),
            Err(SearchError::Config(_))
        ));
        let p = OpenAiPlanner::new(http, "http://x/v1/", "key", "m").unwrap();
        assert_eq!(p.completions_url(), "http://x/v1/chat/completions");
    }
}
