//! In-memory [`Transport`] double used to exercise the service client
//! without real I/O: records every `command`/`query` invocation and lets a
//! test push response bytes or a disconnect directly at the correlator.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use replica_client_protocol::CorrelationId;
use replica_client_std::errors::{ClientError, DisconnectCause};

use crate::correlator::Correlator;
use crate::transport::Transport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    Command(CorrelationId, Vec<u8>),
    Query(CorrelationId, Vec<u8>),
}

struct Inner {
    calls: Vec<RecordedCall>,
    connected: bool,
}

/// A [`Transport`] that never touches the network. `command`/`query` append
/// to an in-memory log instead of writing frames; responses are injected
/// directly into the shared [`Correlator`] via [`MockTransport::respond`],
/// [`MockTransport::end_stream`], or [`MockTransport::disconnect`].
#[derive(Clone)]
pub struct MockTransport {
    correlator: Arc<Correlator>,
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new(correlator: Arc<Correlator>) -> Self {
        Self {
            correlator,
            inner: Arc::new(Mutex::new(Inner {
                calls: Vec::new(),
                connected: false,
            })),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Delivers a unary or stream-frame response for `id`, as if it had
    /// arrived from the wire.
    pub fn respond(&self, id: CorrelationId, bytes: impl Into<Bytes>) {
        self.correlator.deliver(id, bytes.into());
    }

    /// Terminates a streaming call successfully.
    pub fn end_stream(&self, id: CorrelationId) {
        self.correlator.terminate_stream(id, Ok(()));
    }

    /// Terminates a streaming call with an error.
    pub fn fail_stream(&self, id: CorrelationId, err: ClientError) {
        self.correlator.terminate_stream(id, Err(err));
    }

    /// Simulates a transport disconnect: drains the correlator's pending
    /// table with `TransportFailure` and flips the mock to "not connected".
    pub fn disconnect(&self, reason: impl Into<String>) {
        self.inner.lock().connected = false;
        self.correlator.fail_all(DisconnectCause::new(reason.into()));
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), ClientError> {
        self.inner.lock().connected = true;
        self.correlator.reset();
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.inner.lock().connected = false;
        self.correlator.fail_all(DisconnectCause::new("closed by caller"));
        Ok(())
    }

    async fn command(&self, id: CorrelationId, bytes: Bytes) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ClientError::NotConnected);
        }
        inner.calls.push(RecordedCall::Command(id, bytes.to_vec()));
        Ok(())
    }

    async fn query(&self, id: CorrelationId, bytes: Bytes) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ClientError::NotConnected);
        }
        inner.calls.push(RecordedCall::Query(id, bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_and_replays_responses() {
        let correlator = Arc::new(Correlator::new());
        let mock = MockTransport::new(correlator.clone());
        mock.connect().await.unwrap();

        mock.command(7, Bytes::from_static(b"\x01")).await.unwrap();

        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0], RecordedCall::Command(7, vec![0x01]));
    }

    #[tokio::test]
    async fn writes_fail_before_connect() {
        let correlator = Arc::new(Correlator::new());
        let mock = MockTransport::new(correlator);

        let err = mock.command(1, Bytes::from_static(b"\x01")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert_eq!(mock.call_count(), 0);
    }
}
