//! Bounded store calls: every call made on behalf of a participant gets a
//! timeout and honours the session's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{DatabaseError, OnboardingError};

pub(crate) async fn store_call<T, F>(
    operation: &'static str,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, OnboardingError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(operation, "Store call cancelled");
            Err(OnboardingError::Cancelled { operation })
        }
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => inner.map_err(OnboardingError::from),
            Err(_) => {
                tracing::warn!(operation, ?timeout, "Store call timed out");
                Err(OnboardingError::Timeout { operation, timeout })
            }
        },
    }
}
