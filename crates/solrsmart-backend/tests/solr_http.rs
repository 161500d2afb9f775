use axum::extract::{Path, RawQuery};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use solrsmart_backend::{SearchBackend, SolrClient};
use solrsmart_core::{ParamMap, ParamValue, SearchError, UpstreamCall, VectorBody};
use std::time::Duration;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn auth(headers: &HeaderMap) -> Value {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

fn mock_solr() -> Router {
    Router::new()
        .route(
            "/solr/:col/schema/uniquekey",
            get(|Path(col): Path<String>, RawQuery(q): RawQuery| async move {
                if col == "broken" {
                    return (StatusCode::OK, "<html>not json</html>".to_string());
                }
                assert_eq!(q.as_deref(), Some("wt=json"));
                (StatusCode::OK, json!({"uniqueKey": "id"}).to_string())
            }),
        )
        .route(
            "/solr/:col/schema/fields",
            get(|RawQuery(q): RawQuery| async move {
                let q = q.unwrap_or_default();
                assert!(q.contains("includeDynamic=true"));
                Json(json!({"fields": [
                    {"name": "id", "type": "string", "indexed": true, "stored": true},
                    {"name": "price", "type": "pfloat", "multiValued": false},
                    {"name": "cat", "type": "string", "multiValued": true}
                ]}))
            }),
        )
        .route(
            "/solr/:col/admin/file",
            get(|| async { (StatusCode::NOT_FOUND, "file not found") }),
        )
        .route(
            "/solr/:col/select",
            get(|headers: HeaderMap, RawQuery(q): RawQuery| async move {
                Json(json!({"echo": q, "auth": auth(&headers), "response": {"docs": []}}))
            }),
        )
        .route(
            "/solr/:col/query",
            post(|RawQuery(q): RawQuery, Json(body): Json<Value>| async move {
                Json(json!({"echo": q, "body": body}))
            }),
        )
        .route(
            "/solr/:col/update",
            get(|RawQuery(q): RawQuery| async move {
                Json(json!({"responseHeader": {"status": 0}, "echo": q}))
            }),
        )
        .route(
            "/solr/admin/collections",
            get(|RawQuery(q): RawQuery| async move {
                Json(json!({"cluster": {"collections": {}}, "echo": q}))
            }),
        )
}

fn client(base: &str) -> SolrClient {
    SolrClient::new(base, "", "", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn schema_calls() {
    let base = spawn(mock_solr()).await;
    let solr = client(&format!("{base}/"));
    assert_eq!(solr.base_url(), base);
    assert_eq!(solr.unique_key("products").await.unwrap(), "id");

    let fields = solr.fields("products").await.unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1].r#type, "pfloat");
    assert!(fields[2].multi_valued);

    let err = solr.field_metadata("products").await.unwrap_err();
    match err {
        SearchError::Upstream { call, message } => {
            assert_eq!(call, UpstreamCall::FieldMetadata);
            assert!(message.contains("404"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let base = spawn(mock_solr()).await;
    let err = client(&base).unique_key("broken").await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::Decode { call: UpstreamCall::UniqueKey, .. }
    ));
}

#[tokio::test]
async fn select_encodes_repeated_params_without_auth() {
    let base = spawn(mock_solr()).await;
    let mut params = ParamMap::new();
    params.insert("q", "red cable");
    params.insert("wt", "json");
    params.insert(
        "fq",
        ParamValue::List(vec!["inStock:true".into(), "price:[1 TO 5]".into()]),
    );
    let out = client(&base).select("products", &params).await.unwrap();
    let echo = out["echo"].as_str().unwrap();
    assert!(echo.contains("fq=inStock%3Atrue"));
    assert!(echo.contains("fq=price%3A%5B1+TO+5%5D"));
    assert!(echo.contains("q=red+cable"));
    assert_eq!(echo.matches("wt=json").count(), 1);
    assert!(out["auth"].is_null());
}

#[tokio::test]
async fn basic_auth_when_user_configured() {
    let base = spawn(mock_solr()).await;
    let solr = SolrClient::new(&base, "solr", "secret", Duration::from_secs(5)).unwrap();
    let out = solr.select("products", &ParamMap::new()).await.unwrap();
    assert_eq!(out["auth"], "Basic c29scjpzZWNyZXQ=");
}

#[tokio::test]
async fn json_query_posts_body() {
    let base = spawn(mock_solr()).await;
    let body = VectorBody {
        knn: vec![],
        query: Some("{!edismax}cable".into()),
        filter: vec!["inStock:true".into()],
        limit: 10,
        offset: 0,
        fields: None,
        sort: None,
        facet: Default::default(),
        params: ParamMap::new(),
    };
    let out = client(&base).query_json("products", &body).await.unwrap();
    assert_eq!(out["echo"], "wt=json");
    assert_eq!(out["body"]["limit"], 10);
    assert_eq!(out["body"]["filter"], json!(["inStock:true"]));
    assert!(out["body"].get("fields").is_none());
}

#[tokio::test]
async fn commit_and_cluster_status() {
    let base = spawn(mock_solr()).await;
    let solr = client(&base);
    let out = solr.commit("products").await.unwrap();
    assert!(out["echo"].as_str().unwrap().contains("commit=true"));
    let out = solr.cluster_status().await.unwrap();
    assert!(out["echo"]
        .as_str()
        .unwrap()
        .contains("action=CLUSTERSTATUS"));
}

#[tokio::test]
async fn unreachable_host_is_upstream_error() {
    let solr = SolrClient::new("http://127.0.0.1:9", "", "", Duration::from_secs(2)).unwrap();
    let err = solr.cluster_status().await.unwrap_err();
    assert_eq!(err.call(), Some(UpstreamCall::ClusterStatus));
}
