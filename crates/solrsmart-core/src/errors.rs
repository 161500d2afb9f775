use std::fmt;
use thiserror::Error;

/// Identifies which outbound call produced an upstream or decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamCall {
    UniqueKey,
    Fields,
    FieldMetadata,
    Select,
    JsonQuery,
    Commit,
    ClusterStatus,
    Plan,
    Embedding,
}

impl UpstreamCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniqueKey => "schema.uniquekey",
            Self::Fields => "schema.fields",
            Self::FieldMetadata => "schema.field_metadata",
            Self::Select => "query.select",
            Self::JsonQuery => "query.json",
            Self::Commit => "update.commit",
            Self::ClusterStatus => "admin.clusterstatus",
            Self::Plan => "llm.plan",
            Self::Embedding => "llm.embedding",
        }
    }
}

impl fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("{0} search is not permitted for this request")]
    ModeDisabled(&'static str),
    #[error("{call} failed: {message}")]
    Upstream { call: UpstreamCall, message: String },
    #[error("{call} returned malformed JSON: {message}")]
    Decode { call: UpstreamCall, message: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn upstream(call: UpstreamCall, message: impl Into<String>) -> Self {
        Self::Upstream {
            call,
            message: message.into(),
        }
    }

    pub fn decode(call: UpstreamCall, message: impl Into<String>) -> Self {
        Self::Decode {
            call,
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The call that failed, for upstream and decode errors.
    pub fn call(&self) -> Option<UpstreamCall> {
        match self {
            Self::Upstream { call, .. } | Self::Decode { call, .. } => Some(*call),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_names_the_call() {
        let err = SearchError::upstream(UpstreamCall::Fields, "HTTP status 500: boom");
        assert_eq!(err.to_string(), "schema.fields failed: HTTP status 500: boom");
        assert_eq!(err.call(), Some(UpstreamCall::Fields));
    }

    #[test]
    fn decode_and_cancel_helpers() {
        let err = SearchError::decode(UpstreamCall::Plan, "expected value at line 1");
        assert!(err.to_string().starts_with("llm.plan returned malformed JSON"));
        assert!(!err.is_cancelled());
        assert!(SearchError::Cancelled.is_cancelled());
        assert_eq!(SearchError::Cancelled.call(), None);
    }
}
