//! Single image fetch: skip if present, retry with backoff, atomic write.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::http::HttpClient;
use crate::model::FailureReason;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::storage;

#[derive(Debug)]
pub(crate) enum ImageOutcome {
    Saved,
    /// Already on disk from an earlier run.
    Skipped,
    Failed(FailureReason),
    Cancelled,
}

/// File name of page `index` (0-based) for `url`: `page_001.jpg`.
pub(crate) fn page_file_name(index: usize, url: &str) -> String {
    format!("page_{:03}.{}", index + 1, crate::url_model::image_extension(url))
}

pub(crate) async fn fetch_image(
    client: Arc<dyn HttpClient>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    url: String,
    path: &Path,
) -> ImageOutcome {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return ImageOutcome::Skipped;
    }
    let fetched = run_with_retry(&policy, &cancel, |_| {
        let client = Arc::clone(&client);
        let url = url.clone();
        async move { client.get(&url).await }
    })
    .await;
    let bytes = match fetched {
        Ok(b) if b.is_empty() => {
            return ImageOutcome::Failed(FailureReason::permanent(format!("empty response: {url}")))
        }
        Ok(b) => b,
        Err(FetchError::Cancelled) => return ImageOutcome::Cancelled,
        Err(e) => {
            let reason = format!("{e}: {url}");
            return ImageOutcome::Failed(if e.is_transient() {
                FailureReason::transient(reason)
            } else {
                FailureReason::permanent(reason)
            });
        }
    };
    // The write is not raced against cancellation: once bytes are here the
    // page lands completely or not at all.
    match storage::write_atomic(path, &bytes).await {
        Ok(()) => ImageOutcome::Saved,
        Err(e) => ImageOutcome::Failed(FailureReason::permanent(format!("{e:#}"))),
    }
}
