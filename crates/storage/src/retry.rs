//! Transparent retry for read paths.
//!
//! Pure reads may be retried once when the store reports a transient failure.
//! Mutations must never go through here: a retried write could apply twice.

use std::future::Future;

use tracing::warn;

use super::Result;

/// Run a read, retrying it once if the first attempt fails with a transient
/// storage error.
pub async fn read_with_retry<T, F, Fut>(op: &str, mut read: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match read().await {
        Err(e) if e.is_transient() => {
            warn!(op, error = %e, "transient read failure, retrying once");
            read().await
        }
        other => other,
    }
}
