//! Lazily constructed connection to the container runtime.
//!
//! The handle is built on first use and memoized once construction
//! succeeds. A failed attempt is not cached: the next caller retries from
//! scratch. Concurrent first callers race on a guarded initializer, so at
//! most one construction is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::error::DockerError;
use crate::execution::docker_client::DockerClient;
use crate::execution::runtime::ContainerRuntime;

/// Builds a runtime connection.
pub type RuntimeFactory = Arc<
    dyn Fn() -> BoxFuture<'static, Result<Arc<dyn ContainerRuntime>, DockerError>> + Send + Sync,
>;

/// Construct-once, use-many handle to a `ContainerRuntime`.
pub struct RuntimeHandle {
    cell: OnceCell<Arc<dyn ContainerRuntime>>,
    factory: RuntimeFactory,
}

impl RuntimeHandle {
    /// A handle that builds its runtime with `factory` on first use.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<dyn ContainerRuntime>, DockerError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Arc::new(factory),
        }
    }

    /// A handle to the local Docker daemon, verified with a ping on first use.
    pub fn docker(api_timeout: Duration) -> Self {
        Self::lazy(move || {
            Box::pin(async move {
                let client = DockerClient::connect(api_timeout).await?;
                Ok(Arc::new(client) as Arc<dyn ContainerRuntime>)
            })
        })
    }

    /// A handle around an already constructed runtime.
    pub fn ready(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(runtime.clone())),
            factory: Arc::new(move || {
                let runtime = runtime.clone();
                Box::pin(async move { Ok(runtime) })
            }),
        }
    }

    /// Returns the runtime, constructing it if needed.
    ///
    /// # Errors
    ///
    /// Returns the construction error; nothing is cached in that case.
    pub async fn get(&self) -> Result<Arc<dyn ContainerRuntime>, DockerError> {
        let runtime = self
            .cell
            .get_or_try_init(|| async {
                match (self.factory)().await {
                    Ok(runtime) => Ok(runtime),
                    Err(e) => {
                        tracing::error!("Failed to connect to container runtime: {}", e);
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(runtime.clone())
    }

    /// Whether a runtime has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
