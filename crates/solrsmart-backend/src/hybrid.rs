use crate::cancel::guarded;
use crate::metrics::HYBRID_FALLBACKS_TOTAL;
use crate::traits::SearchBackend;
use serde_json::Value as JsonValue;
use solrsmart_core::hybrid::{merge_step, CandidateOutcome, MergeStep};
use solrsmart_core::{Compiler, FieldCatalog, Plan, Result, UpstreamCall, VectorBody};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct HybridRun {
    pub candidate_body: VectorBody,
    pub merge: MergeStep,
    pub response: JsonValue,
}

/// Two-phase hybrid search: nearest-neighbor recall of identifiers, then the
/// keyword query restricted to them. Any recall error aborts the run; only
/// an empty recall falls back to keyword-only.
#[allow(clippy::too_many_arguments)]
pub async fn run_hybrid(
    backend: &dyn SearchBackend,
    compiler: &Compiler,
    collection: &str,
    plan: &Plan,
    fc: &FieldCatalog,
    embedding: &[f32],
    rows: usize,
    start: usize,
    cancel: &CancellationToken,
) -> Result<HybridRun> {
    let candidate_body = compiler.candidate_body(plan, fc, embedding, rows);
    let recall = guarded(
        cancel,
        UpstreamCall::JsonQuery,
        backend.query_json(collection, &candidate_body),
    )
    .await?;
    let outcome = CandidateOutcome::from_response(&recall, &fc.unique_key);
    debug!(collection, candidates = outcome.len(), k = candidate_body.limit, "hybrid recall");

    let merge = merge_step(compiler, plan, fc, &outcome, rows, start);
    if merge.fell_back {
        HYBRID_FALLBACKS_TOTAL.inc();
        info!(collection, "hybrid recall empty, running keyword-only");
    }
    let response = guarded(
        cancel,
        UpstreamCall::Select,
        backend.select(collection, &merge.params),
    )
    .await?;
    Ok(HybridRun {
        candidate_body,
        merge,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{InMemoryBackend, MemCollection};
    use serde_json::json;
    use solrsmart_core::{CompileOptions, FieldDescriptor, ParamValue, SearchError};

    fn setup() -> (InMemoryBackend, FieldCatalog) {
        let fields = vec![
            FieldDescriptor::new("id", "string"),
            FieldDescriptor::new("name_txt", "text_general"),
            FieldDescriptor::new("emb", "knn_vector_2"),
        ];
        let mem = InMemoryBackend::new();
        mem.add_collection(
            "products",
            MemCollection {
                unique_key: "id".into(),
                fields: fields.clone(),
                metadata: None,
                docs: vec![
                    json!({"id": "1", "name_txt": "usb cable", "emb": [1.0, 0.0]}),
                    json!({"id": "2", "name_txt": "usb hub", "emb": [0.9, 0.1]}),
                    json!({"id": "3", "name_txt": "usb lamp", "emb": [0.0, 1.0]}),
                ],
            },
        );
        (mem, FieldCatalog::new("id", fields, None))
    }

    fn plan(text: &str) -> Plan {
        let mut p: Plan = serde_json::from_value(json!({
            "mode": "hybrid",
            "edismax": {"text_query": text},
            "vector": {"field": "emb", "k": 2}
        }))
        .unwrap();
        p.apply_defaults(5);
        p
    }

    #[tokio::test]
    async fn restricts_keyword_query_to_candidates() {
        let (mem, fc) = setup();
        // rows * 5 = 5 candidates, all three docs qualify
        let compiler = Compiler::new(CompileOptions::default());
        let run = run_hybrid(
            &mem,
            &compiler,
            "products",
            &plan("usb"),
            &fc,
            &[1.0, 0.0],
            1,
            0,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!run.merge.fell_back);
        assert_eq!(run.merge.candidates, 3);
        assert_eq!(run.candidate_body.knn[0].k, 5);
        assert_eq!(run.candidate_body.offset, 0);
        let fq = mem.last_select().unwrap().get("fq").cloned();
        assert_eq!(
            fq,
            Some(ParamValue::List(vec!["id:(1 OR 2 OR 3)".to_string()]))
        );
        assert_eq!(run.response["response"]["docs"][0]["id"], "1");
    }

    #[tokio::test]
    async fn empty_recall_falls_back_to_keyword() {
        let (mem, fc) = setup();
        let compiler = Compiler::new(CompileOptions::default());
        let mut p = plan("usb");
        p.vector.field = "missing_vec".into();
        let run = run_hybrid(
            &mem,
            &compiler,
            "products",
            &p,
            &fc,
            &[1.0, 0.0],
            10,
            0,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(run.merge.fell_back);
        assert!(mem.last_select().unwrap().get("fq").is_none());
        assert_eq!(run.response["response"]["numFound"], 3);
    }

    #[tokio::test]
    async fn recall_error_aborts_without_fallback() {
        let (mem, fc) = setup();
        mem.fail(UpstreamCall::JsonQuery, "HTTP status 500: knn parser");
        let compiler = Compiler::new(CompileOptions::default());
        let err = run_hybrid(
            &mem,
            &compiler,
            "products",
            &plan("usb"),
            &fc,
            &[1.0, 0.0],
            10,
            0,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            SearchError::Upstream { call: UpstreamCall::JsonQuery, .. }
        ));
        assert_eq!(mem.calls(UpstreamCall::Select), 0);
    }
}
