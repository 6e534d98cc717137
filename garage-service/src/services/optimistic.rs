//! Local state that shows a change before the store confirms it.

use service_core::error::AppError;
use std::future::Future;
use tracing::warn;

/// Holds caller-side state. `apply` changes it immediately, then awaits the
/// store write and puts the previous value back if the write fails.
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    current: T,
}

impl<T: Clone> Optimistic<T> {
    pub fn new(initial: T) -> Self {
        Self { current: initial }
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn into_inner(self) -> T {
        self.current
    }

    pub async fn apply<C, W, Fut, R>(&mut self, change: C, write: W) -> Result<R, AppError>
    where
        C: FnOnce(&mut T),
        W: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, AppError>>,
    {
        let snapshot = self.current.clone();
        change(&mut self.current);

        match write(self.current.clone()).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, "Write failed, restoring previous local state");
                self.current = snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_write_keeps_the_change() {
        let mut rows = Optimistic::new(vec!["a".to_string()]);
        rows.apply(|r| r.push("b".to_string()), |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(rows.get().len(), 2);
    }

    #[tokio::test]
    async fn failed_write_restores_the_snapshot() {
        let mut rows = Optimistic::new(vec!["a".to_string()]);
        let result: Result<(), AppError> = rows
            .apply(
                |r| r.clear(),
                |_| async { Err(AppError::DatabaseError(anyhow::anyhow!("unavailable"))) },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(rows.into_inner(), vec!["a".to_string()]);
    }
}
