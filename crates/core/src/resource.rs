//! Lazily connected, process-wide external resources.
//!
//! The catalog database pool and the knowledge index are expensive to
//! create and may be unreachable. Each is wrapped in a [`LazyResource`]:
//! the first caller connects, concurrent first callers wait on the same
//! attempt, and the outcome (success or failure) is remembered for the
//! life of the process. `shutdown` releases the handle explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::ResourceError;

/// Knows how to open (and optionally close) one kind of external resource.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The live handle, e.g. a connection pool or an HTTP client.
    type Handle: Send + Sync;

    /// Name used in logs and errors.
    fn resource_name(&self) -> &str;

    /// Open the resource.
    async fn connect(&self) -> Result<Self::Handle, ResourceError>;

    /// Release the resource. Default: drop it.
    async fn close(&self, _handle: &Self::Handle) {}
}

/// Result of [`LazyResource::acquire`].
pub struct Acquired<H> {
    pub handle: Result<Arc<H>, ResourceError>,
    /// This call performed the (single) connection attempt.
    pub attempted: bool,
}

/// A resource that connects on first use, exactly once.
pub struct LazyResource<C: Connector> {
    connector: C,
    cell: OnceCell<Result<Arc<C::Handle>, ResourceError>>,
    closed: AtomicBool,
}

impl<C: Connector> LazyResource<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            cell: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the handle, connecting if this is the first use.
    ///
    /// A failed connection attempt is sticky: later calls return the same
    /// error without reconnecting.
    pub async fn get(&self) -> Result<Arc<C::Handle>, ResourceError> {
        self.acquire().await.handle
    }

    /// Like [`get`](Self::get), but also reports whether this call is the
    /// one that ran the connection attempt. Concurrent first callers wait
    /// on that attempt and see `attempted: false`.
    pub async fn acquire(&self) -> Acquired<C::Handle> {
        if self.closed.load(Ordering::Acquire) {
            return Acquired {
                handle: Err(ResourceError::Closed(self.connector.resource_name().to_string())),
                attempted: false,
            };
        }

        let attempted = AtomicBool::new(false);
        let handle = self
            .cell
            .get_or_init(|| async {
                attempted.store(true, Ordering::Relaxed);
                let name = self.connector.resource_name();
                match self.connector.connect().await {
                    Ok(handle) => {
                        info!(resource = %name, "Resource connected");
                        Ok(Arc::new(handle))
                    }
                    Err(e) => {
                        warn!(resource = %name, error = %e, "Resource initialization failed");
                        Err(e)
                    }
                }
            })
            .await
            .clone();

        Acquired {
            handle,
            attempted: attempted.load(Ordering::Relaxed),
        }
    }

    /// Connect eagerly (e.g. at startup) instead of on first use.
    pub async fn init(&self) -> Result<(), ResourceError> {
        self.get().await.map(|_| ())
    }

    /// Close the resource. Subsequent `get` calls return [`ResourceError::Closed`].
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(Ok(handle)) = self.cell.get() {
            self.connector.close(handle).await;
            info!(resource = %self.connector.resource_name(), "Resource shut down");
        }
    }
}
