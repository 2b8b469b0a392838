//! Async deadline wrappers.
//!
//! Every socket read and write in the protocol runs under a fixed deadline
//! so a stalled peer releases its worker instead of holding it forever.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Run `fut` under `deadline`, mapping expiry to [`ProtocolError::Timeout`].
pub async fn with_deadline<F, T>(fut: F, deadline: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_completed_futures() {
        let result = with_deadline(async { Ok(7u32) }, Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn maps_expiry_to_timeout() {
        let result = with_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }
}
