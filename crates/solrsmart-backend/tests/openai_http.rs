use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use solrsmart_backend::{Embedder, OpenAiEmbedder, OpenAiPlanner, PlanRequest, PlanSource};
use solrsmart_core::{SearchError, SearchMode, UpstreamCall};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn completion(content: &str) -> Value {
    json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})
}

fn mock_llm() -> Router {
    let plan = json!({
        "mode": "hybrid",
        "edismax": {"text_query": "", "filters": ["inStock:true"]},
        "vector": {"field": "emb", "k": 0},
        "_reasoning": {"confidence": "medium"}
    })
    .to_string();
    let array_plan = plan.clone();
    Router::new()
        .route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let plan = plan.clone();
                async move {
                    assert_eq!(
                        headers.get("authorization").unwrap().to_str().unwrap(),
                        "Bearer sk-test"
                    );
                    assert_eq!(body["temperature"], 0.2);
                    assert_eq!(body["max_tokens"], 800);
                    assert_eq!(body["response_format"]["type"], "json_object");
                    assert_eq!(body["messages"][0]["role"], "system");
                    let user = body["messages"][1]["content"].as_str().unwrap();
                    assert!(user.contains("uniqueKey=id"));
                    Json(completion(&plan))
                }
            }),
        )
        .route(
            "/array/chat/completions",
            post(move || {
                let plan = array_plan.clone();
                async move { Json(json!([completion(&plan)])) }
            }),
        )
        .route(
            "/quota/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"message": "quota exceeded"}})),
                )
            }),
        )
        .route(
            "/prose/chat/completions",
            post(|| async { Json(completion("Sure! Here is your plan.")) }),
        )
        .route(
            "/v1/embeddings",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "text-embedding-3-small");
                assert_eq!(body["input"], "usb cable");
                Json(json!({"data": [{"embedding": [0.25, -0.5, 1.0], "index": 0}]}))
            }),
        )
        .route(
            "/badkey/embeddings",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": {"message": "Incorrect API key provided"}})),
                )
            }),
        )
        .route(
            "/empty/embeddings",
            post(|| async { Json(json!({"data": []})) }),
        )
}

fn request() -> PlanRequest<'static> {
    PlanRequest {
        user_query: "usb cable in stock",
        locale: "en",
        schema_summary: "uniqueKey=id\ntext_fields: name",
        allow_vector: true,
        allow_hybrid: true,
        default_k: 7,
    }
}

fn planner(base: &str, path: &str) -> OpenAiPlanner {
    OpenAiPlanner::new(reqwest::Client::new(), &format!("{base}{path}"), "sk-test", "gpt-4o")
        .unwrap()
}

#[tokio::test]
async fn plan_from_chat_completion() {
    let base = spawn(mock_llm()).await;
    let acquired = planner(&base, "/v1").acquire_plan(&request()).await.unwrap();
    assert_eq!(acquired.plan.mode, SearchMode::Hybrid);
    assert_eq!(acquired.plan.edismax.text_query, "*:*");
    assert_eq!(acquired.plan.vector.k, 7);
    assert_eq!(acquired.raw["_reasoning"]["confidence"], "medium");
}

#[tokio::test]
async fn array_response_uses_first_element() {
    let base = spawn(mock_llm()).await;
    let acquired = planner(&base, "/array").acquire_plan(&request()).await.unwrap();
    assert_eq!(acquired.plan.edismax.filters, vec!["inStock:true".to_string()]);
}

#[tokio::test]
async fn error_member_is_upstream_failure() {
    let base = spawn(mock_llm()).await;
    let err = planner(&base, "/quota").acquire_plan(&request()).await.unwrap_err();
    match err {
        SearchError::Upstream { call, message } => {
            assert_eq!(call, UpstreamCall::Plan);
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn prose_content_is_decode_failure() {
    let base = spawn(mock_llm()).await;
    let err = planner(&base, "/prose").acquire_plan(&request()).await.unwrap_err();
    assert!(matches!(err, SearchError::Decode { call: UpstreamCall::Plan, .. }));
}

#[tokio::test]
async fn embedding_round_trip() {
    let base = spawn(mock_llm()).await;
    let embedder = OpenAiEmbedder::new(
        reqwest::Client::new(),
        &format!("{base}/v1/embeddings"),
        "sk-test",
        "text-embedding-3-small",
    )
    .unwrap();
    assert_eq!(embedder.embed("usb cable").await.unwrap(), vec![0.25, -0.5, 1.0]);

    let empty = OpenAiEmbedder::new(
        reqwest::Client::new(),
        &format!("{base}/empty/embeddings"),
        "sk-test",
        "m",
    )
    .unwrap();
    let err = empty.embed("x").await.unwrap_err();
    assert_eq!(err.call(), Some(UpstreamCall::Embedding));
}

#[tokio::test]
async fn embedding_http_error_keeps_status_and_message() {
    let base = spawn(mock_llm()).await;
    let embedder = OpenAiEmbedder::new(
        reqwest::Client::new(),
        &format!("{base}/badkey/embeddings"),
        "sk-wrong",
        "m",
    )
    .unwrap();
    match embedder.embed("usb cable").await.unwrap_err() {
        SearchError::Upstream { call, message } => {
            assert_eq!(call, UpstreamCall::Embedding);
            assert!(message.contains("HTTP status 401"), "{message}");
            assert!(message.contains("Incorrect API key provided"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
