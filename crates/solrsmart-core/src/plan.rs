use crate::errors::{Result, SearchError, UpstreamCall};
use crate::params::ParamMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use serde_with::{serde_as, DefaultOnNull};
use std::fmt;

pub const MATCH_ALL: &str = "*:*";
pub const DEFAULT_VECTOR_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Vector,
    Hybrid,
}

impl SearchMode {
    /// Unknown or empty mode names fall back to keyword.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "vector" | "knn" => Self::Vector,
            "hybrid" => Self::Hybrid,
            _ => Self::Keyword,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SearchMode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = Option::<String>::deserialize(d)?;
        Ok(s.map(|s| SearchMode::parse(&s)).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Date,
    #[default]
    Number,
}

impl<'de> Deserialize<'de> for RangeKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = Option::<String>::deserialize(d)?;
        Ok(match s.as_deref().map(str::to_lowercase).as_deref() {
            Some("date") => RangeKind::Date,
            _ => RangeKind::Number,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Range {
    pub field: String,
    #[serde(default, rename = "type")]
    pub kind: RangeKind,
    #[serde(default, deserialize_with = "de_bound", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "de_bound", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_lower: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_upper: Option<bool>,
}

// Bounds arrive as strings or bare numbers.
fn de_bound<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match JsonValue::deserialize(d)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl Range {
    pub fn new(field: impl Into<String>, from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            field: field.into(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            ..Default::default()
        }
    }

    /// Renders `field:[lower TO upper]`; a missing or blank bound is `*`.
    pub fn to_filter_query(&self) -> String {
        let bound = |b: &Option<String>| match b.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => "*".to_string(),
        };
        let open = if self.include_lower.unwrap_or(true) { '[' } else { '{' };
        let close = if self.include_upper.unwrap_or(true) { ']' } else { '}' };
        format!(
            "{}:{}{} TO {}{}",
            self.field,
            open,
            bound(&self.from),
            bound(&self.to),
            close
        )
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EdismaxBlock {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub text_query: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<Range>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sort: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facet_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "ParamMap::is_empty")]
    pub params: ParamMap,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VectorBlock {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub field: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub k: usize,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query_text: String,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Plan {
    #[serde(default)]
    pub mode: SearchMode,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub edismax: EdismaxBlock,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub vector: VectorBlock,
    #[serde(default, rename = "_reasoning", skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<JsonValue>,
}

/// A plan decoded from a plan-acquisition response, with the JSON it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredPlan {
    pub plan: Plan,
    pub raw: JsonValue,
}

impl Plan {
    /// Parses a plan object and applies defaults. Empty or non-object content
    /// is a decode error attributed to the plan call.
    pub fn parse(content: &str, default_k: usize) -> Result<AcquiredPlan> {
        if content.trim().is_empty() {
            return Err(SearchError::decode(UpstreamCall::Plan, "empty plan content"));
        }
        let raw: JsonValue = serde_json::from_str(content).map_err(|e| {
            SearchError::decode(UpstreamCall::Plan, format!("{e}; response was: {content}"))
        })?;
        if !raw.is_object() {
            return Err(SearchError::decode(
                UpstreamCall::Plan,
                format!("expected a JSON object, got: {content}"),
            ));
        }
        let mut plan: Plan = serde_json::from_value(raw.clone())
            .map_err(|e| SearchError::decode(UpstreamCall::Plan, e.to_string()))?;
        plan.apply_defaults(default_k);
        Ok(AcquiredPlan { plan, raw })
    }

    /// Empty text query becomes match-all; zero neighbor count becomes `default_k`.
    pub fn apply_defaults(&mut self, default_k: usize) {
        if self.edismax.text_query.trim().is_empty() {
            self.edismax.text_query = MATCH_ALL.to_string();
        }
        if self.vector.k == 0 {
            self.vector.k = default_k;
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.mode {
            SearchMode::Vector | SearchMode::Hybrid if self.vector.field.trim().is_empty() => {
                Err(SearchError::Invalid(format!(
                    "{} plan does not name a vector field",
                    self.mode
                )))
            }
            _ => Ok(()),
        }
    }

    /// Plan filters followed by rendered ranges.
    pub fn filter_queries(&self) -> Vec<String> {
        self.edismax
            .filters
            .iter()
            .filter(|f| !f.trim().is_empty())
            .cloned()
            .chain(self.edismax.ranges.iter().map(Range::to_filter_query))
            .collect()
    }

    /// True when the text query asks for something other than everything.
    pub fn has_text_query(&self) -> bool {
        let q = self.edismax.text_query.trim();
        !q.is_empty() && q != MATCH_ALL
    }

    pub fn embedding_text<'a>(&'a self, user_query: &'a str) -> &'a str {
        crate::util::choose(&self.vector.query_text, user_query)
    }
}
