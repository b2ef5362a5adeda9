//! Where deliveries to a full inbox wait for room.
//!
//! A broker built inside a tokio runtime keeps that runtime's handle, so
//! callers on plain threads still get their deferred deliveries waited on.
//! A broker built outside any runtime starts a one-worker runtime of its own
//! the first time a delivery has to wait.

use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::error;

#[derive(Debug, Default)]
pub struct Waiters {
    ambient: Option<Handle>,
    owned: OnceLock<Option<Runtime>>,
}

impl Waiters {
    /// Captures the current runtime, if any.
    pub fn new() -> Self {
        Self {
            ambient: Handle::try_current().ok(),
            owned: OnceLock::new(),
        }
    }

    /// The runtime to spawn a waiting delivery on. The caller's own runtime
    /// wins, then the captured one, then the owned fallback.
    pub fn handle(&self) -> Option<Handle> {
        Handle::try_current()
            .ok()
            .or_else(|| self.ambient.clone())
            .or_else(|| self.owned().map(|runtime| runtime.handle().clone()))
    }

    fn owned(&self) -> Option<&Runtime> {
        self.owned
            .get_or_init(|| {
                Builder::new_multi_thread()
                    .worker_threads(1)
                    .thread_name("huddle-delivery")
                    .enable_time()
                    .build()
                    .map_err(|e| error!("Failed to start delivery runtime: {e}"))
                    .ok()
            })
            .as_ref()
    }
}

// Dropping a `Runtime` from async code panics; shutting it down in the
// background does not.
impl Drop for Waiters {
    fn drop(&mut self) {
        if let Some(Some(runtime)) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}
