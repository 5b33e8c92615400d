use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::CachedTaskList;

/// Request-scoped memo: one per rendered page.
///
/// The first call for a key runs its computation; later calls with the same
/// key in the same pass get the same `Arc` back without running anything.
/// The lock is held while a computation runs, so a concurrent caller asking
/// for the same key waits for the first result instead of recomputing.
#[derive(Debug, Default)]
pub struct RenderPass {
    memo: Mutex<HashMap<String, Arc<CachedTaskList>>>,
}

impl RenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn memoize<F, Fut, E>(&self, key: &str, compute: F) -> Result<Arc<CachedTaskList>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedTaskList, E>>,
    {
        let mut memo = self.memo.lock().await;
        if let Some(hit) = memo.get(key) {
            return Ok(Arc::clone(hit));
        }
        let computed = Arc::new(compute().await?);
        memo.insert(key.to_string(), Arc::clone(&computed));
        Ok(computed)
    }

    /// Number of distinct computations this pass has run.
    pub async fn executions(&self) -> usize {
        self.memo.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::cache::CacheDiagnostics;

    fn list(key: &str) -> CachedTaskList {
        CachedTaskList {
            tasks: Vec::new(),
            diagnostics: CacheDiagnostics {
                execution_id: Uuid::new_v4(),
                executed_at: Utc::now(),
                cache_key: key.to_string(),
                revalidate_in_seconds: 15,
            },
        }
    }

    #[tokio::test]
    async fn same_key_returns_same_arc() {
        let pass = RenderPass::new();
        let first = pass
            .memoize("k", || async { Ok::<_, ()>(list("k")) })
            .await
            .unwrap();
        let second = pass
            .memoize::<_, _, ()>("k", || async { panic!("should be memoized") })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pass.executions().await, 1);
    }

    #[tokio::test]
    async fn different_keys_compute_separately() {
        let pass = RenderPass::new();
        let a = pass.memoize("a", || async { Ok::<_, ()>(list("a")) }).await.unwrap();
        let b = pass.memoize("b", || async { Ok::<_, ()>(list("b")) }).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.diagnostics.execution_id, b.diagnostics.execution_id);
        assert_eq!(pass.executions().await, 2);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let pass = RenderPass::new();
        let failed = pass.memoize("k", || async { Err::<CachedTaskList, _>("boom") }).await;
        assert!(failed.is_err());
        let ok = pass.memoize("k", || async { Ok::<_, &str>(list("k")) }).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn separate_passes_do_not_share() {
        let first = RenderPass::new();
        let second = RenderPass::new();
        let a = first.memoize("k", || async { Ok::<_, ()>(list("k")) }).await.unwrap();
        let b = second.memoize("k", || async { Ok::<_, ()>(list("k")) }).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
