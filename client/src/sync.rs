//! Blocking façade over the otherwise fully asynchronous core, offering an
//! optional blocking wrapper without forking the core's implementation.

use std::future::Future;
use std::time::Duration;

use replica_client_std::errors::ClientError;
use tokio::runtime::Handle;

/// Wraps a value whose methods return futures, driving them to completion
/// on a caller-supplied [`Handle`] instead of returning a `Future`.
///
/// Does not itself retry or reconnect; it only adapts the calling
/// convention. A timeout elapsing maps to [`ClientError::Cancelled`]; a
/// runtime join failure maps to [`ClientError::TransportFailure`].
pub struct Synchronous<T> {
    inner: T,
    handle: Handle,
    timeout: Option<Duration>,
}

impl<T> Synchronous<T> {
    pub fn new(inner: T, handle: Handle) -> Self {
        Self {
            inner,
            handle,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Blocks the current thread until `fut` resolves, applying the
    /// configured timeout.
    pub fn block_on<F, R>(&self, fut: F) -> Result<R, ClientError>
    where
        F: Future<Output = Result<R, ClientError>> + Send,
        R: Send,
    {
        let timeout = self.timeout;

        self.handle.clone().block_on(async move {
            match timeout {
                Some(duration) => match tokio::time::timeout(duration, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Cancelled),
                },
                None => fut.await,
            }
        })
    }
}
