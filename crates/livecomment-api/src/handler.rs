use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::Error;
use crate::service::Caller;

pub(crate) fn parse_id(raw: &str, name: &str) -> Result<i64, Error> {
    raw.parse()
        .map_err(|_| Error::validation(format!("{} in path must be integer", name)))
}

/// Run blocking store work off the async runtime on behalf of `user_id`.
///
/// If the returned future is dropped (client gone, timeout) the caller's
/// token is cancelled and the work rolls back instead of committing.
pub(crate) async fn run_blocking<F, T>(user_id: i64, f: F) -> Result<T, Error>
where
    F: FnOnce(Caller) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let caller = Caller::with_cancel(user_id, cancel.clone());
    let _guard = cancel.drop_guard();

    tokio::task::spawn_blocking(move || f(caller))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            Error::Store(anyhow!("worker task failed: {}", e))
        })?
}
