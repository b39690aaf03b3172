pub mod llm;
pub mod search;

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

use self::llm::TextStream;

/// Deadline and cancellation applied to every outbound provider call.
#[derive(Debug, Clone)]
pub struct CallGuard {
    cancel: CancellationToken,
    timeout: Duration,
}

impl CallGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    /// Drive `call` until it finishes, the deadline passes, or the token fires.
    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            res = tokio::time::timeout(self.timeout, call) => match res {
                Ok(res) => res,
                Err(_) => Err(AppError::Timeout),
            },
        }
    }

    /// Ends `text` with a `Cancelled` error once the token fires. The
    /// deadline is not applied: a healthy stream may run past it.
    pub fn watch_stream(&self, text: TextStream) -> TextStream {
        let cancel = self.cancel.clone();
        Box::pin(stream::unfold(
            Some((text, cancel)),
            |state| async move {
                let (mut text, cancel) = state?;
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    chunk = text.next() => Some(chunk),
                };
                match next {
                    None => Some((Err(AppError::Cancelled), None)),
                    Some(chunk) => chunk.map(|chunk| (chunk, Some((text, cancel)))),
                }
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_completed_calls() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_secs(1));
        let value = guard.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_millis(10));
        let res: Result<()> = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(AppError::Timeout)));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let guard = CallGuard::new(cancel, Duration::from_secs(5));
        let res: Result<()> = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn watched_stream_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        let guard = CallGuard::new(cancel.clone(), Duration::from_millis(10));
        let text: TextStream = Box::pin(
            stream::iter(vec![Ok::<_, AppError>("first".to_string())])
                .chain(stream::pending::<Result<String>>()),
        );
        let mut watched = guard.watch_stream(text);

        assert_eq!(watched.next().await.unwrap().unwrap(), "first");
        cancel.cancel();
        let next = tokio::time::timeout(Duration::from_secs(1), watched.next())
            .await
            .expect("stream ignored the cancelled token");
        assert!(matches!(next, Some(Err(AppError::Cancelled))));
        assert!(watched.next().await.is_none());
    }

    #[tokio::test]
    async fn watched_stream_outlives_the_deadline() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_millis(10));
        let text: TextStream = Box::pin(stream::iter(vec!["a", "b", "c"]).then(|chunk| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, AppError>(chunk.to_string())
        }));
        let chunks: Vec<String> = guard
            .watch_stream(text)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }
}
