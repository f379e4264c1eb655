use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{StoreError, StoreResult};

/// Runtime that drives an async object store client from synchronous calls.
///
/// Each remote store owns one of these for its lifetime, next to its client.
/// Calls made from a thread that is already inside a Tokio runtime are moved
/// to a scoped helper thread, since blocking on a runtime from within one is
/// not allowed. Dropping shuts the runtime down in the background, so a store
/// may be dropped from any context.
pub(crate) struct BlockingRuntime {
    // Only `None` once `drop` has taken it.
    runtime: Option<Runtime>,
}

impl BlockingRuntime {
    pub fn new() -> StoreResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Run `future` to completion on the calling thread.
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            unreachable!("runtime is only taken on drop")
        };
        if Handle::try_current().is_err() {
            return runtime.block_on(future);
        }
        std::thread::scope(|s| {
            s.spawn(|| runtime.block_on(future))
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
        })
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for BlockingRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRuntime").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_futures_from_plain_threads() {
        let rt = BlockingRuntime::new().unwrap();
        assert_eq!(rt.block_on(async { 40 + 2 }), 42);
    }

    #[tokio::test]
    async fn runs_futures_from_inside_a_runtime() {
        let rt = BlockingRuntime::new().unwrap();
        assert_eq!(rt.block_on(async { "ok" }), "ok");
    }

    #[tokio::test]
    async fn drops_inside_a_runtime() {
        let rt = BlockingRuntime::new().unwrap();
        rt.block_on(async { tokio::task::yield_now().await });
        drop(rt);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drops_inside_a_multi_thread_runtime() {
        let rt = BlockingRuntime::new().unwrap();
        assert_eq!(rt.block_on(async { 1 }), 1);
        drop(rt);
    }
}
