use crate::traits::SearchBackend;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use solrsmart_core::{
    FieldDescriptor, FieldMetadata, ParamMap, Result, SearchError, UpstreamCall, VectorBody,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client for one Solr deployment. Basic auth is sent only when a user
/// name is configured.
#[derive(Clone)]
pub struct SolrClient {
    http: Client,
    base_url: String,
    user: String,
    pass: String,
}

#[derive(Deserialize)]
struct UniqueKeyResponse {
    #[serde(rename = "uniqueKey", default)]
    unique_key: String,
}

#[derive(Deserialize)]
struct FieldsResponse {
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

impl SolrClient {
    pub fn new(base_url: &str, user: &str, pass: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Config(format!("http client: {e}")))?;
        Ok(Self::with_http_client(http, base_url, user, pass))
    }

    pub fn with_http_client(http: Client, base_url: &str, user: &str, pass: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str, path: &str) -> String {
        format!(
            "{}/solr/{}/{}",
            self.base_url,
            urlencoding::encode(collection),
            path
        )
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        if self.user.is_empty() {
            rb
        } else {
            rb.basic_auth(&self.user, Some(&self.pass))
        }
    }

    async fn send(&self, call: UpstreamCall, rb: RequestBuilder) -> Result<String> {
        let resp = self
            .authed(rb)
            .send()
            .await
            .map_err(|e| SearchError::upstream(call, format!("HTTP request error: {e}")))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            SearchError::upstream(call, format!("failed to read response body: {e}"))
        })?;
        if !status.is_success() {
            return Err(SearchError::upstream(
                call,
                format!("HTTP status {}: {text}", status.as_u16()),
            ));
        }
        Ok(text)
    }

    async fn send_decoded<T: DeserializeOwned>(
        &self,
        call: UpstreamCall,
        rb: RequestBuilder,
    ) -> Result<T> {
        let text = self.send(call, rb).await?;
        serde_json::from_str(&text)
            .map_err(|e| SearchError::decode(call, format!("{e}; response: {text}")))
    }
}

#[async_trait::async_trait]
impl SearchBackend for SolrClient {
    async fn unique_key(&self, collection: &str) -> Result<String> {
        let url = self.collection_url(collection, "schema/uniquekey");
        let out: UniqueKeyResponse = self
            .send_decoded(
                UpstreamCall::UniqueKey,
                self.http.get(url).query(&[("wt", "json")]),
            )
            .await?;
        Ok(out.unique_key)
    }

    async fn fields(&self, collection: &str) -> Result<Vec<FieldDescriptor>> {
        let url = self.collection_url(collection, "schema/fields");
        let out: FieldsResponse = self
            .send_decoded(
                UpstreamCall::Fields,
                self.http
                    .get(url)
                    .query(&[("wt", "json"), ("includeDynamic", "true")]),
            )
            .await?;
        Ok(out.fields)
    }

    async fn field_metadata(&self, collection: &str) -> Result<BTreeMap<String, FieldMetadata>> {
        let url = self.collection_url(collection, "admin/file");
        self.send_decoded(
            UpstreamCall::FieldMetadata,
            self.http
                .get(url)
                .query(&[("file", "field_metadata.json"), ("wt", "json")]),
        )
        .await
    }

    async fn select(&self, collection: &str, params: &ParamMap) -> Result<JsonValue> {
        let url = self.collection_url(collection, "select");
        let mut pairs: Vec<(String, String)> = params
            .to_query_pairs()
            .into_iter()
            .filter(|(k, _)| k != "wt")
            .collect();
        pairs.push(("wt".into(), "json".into()));
        debug!(collection, params = pairs.len(), "solr select");
        self.send_decoded(UpstreamCall::Select, self.http.get(url).query(&pairs))
            .await
    }

    async fn query_json(&self, collection: &str, body: &VectorBody) -> Result<JsonValue> {
        let url = self.collection_url(collection, "query");
        debug!(collection, limit = body.limit, "solr json query");
        self.send_decoded(
            UpstreamCall::JsonQuery,
            self.http.post(url).query(&[("wt", "json")]).json(body),
        )
        .await
    }

    async fn commit(&self, collection: &str) -> Result<JsonValue> {
        let url = self.collection_url(collection, "update");
        self.send_decoded(
            UpstreamCall::Commit,
            self.http
                .get(url)
                .query(&[("commit", "true"), ("wt", "json")]),
        )
        .await
    }

    async fn cluster_status(&self) -> Result<JsonValue> {
        let url = format!("{}/solr/admin/collections", self.base_url);
        self.send_decoded(
            UpstreamCall::ClusterStatus,
            self.http
                .get(url)
                .query(&[("action", "CLUSTERSTATUS"), ("wt", "json")]),
        )
        .await
    }
}
