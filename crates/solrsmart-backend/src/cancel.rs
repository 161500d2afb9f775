use crate::metrics::UPSTREAM_SECONDS;
use solrsmart_core::{Result, SearchError, UpstreamCall};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs one outbound call under the request's cancellation token. A token
/// cancelled beforehand means the call is never issued.
pub async fn guarded<T, F>(cancel: &CancellationToken, call: UpstreamCall, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        debug!(%call, "cancelled before call");
        return Err(SearchError::Cancelled);
    }
    let _timer = UPSTREAM_SECONDS
        .with_label_values(&[call.as_str()])
        .start_timer();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(%call, "cancelled during call");
            Err(SearchError::Cancelled)
        }
        res = fut => res,
    }
}
