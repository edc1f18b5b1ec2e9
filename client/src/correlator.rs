use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use replica_client_std::errors::{ClientError, CorrelationIdInUse, DisconnectCause};

use crate::logging;

/// Unique identifier for one in-flight request, scoped to the lifetime of a
/// single connection (reset by [`Correlator::reset`] on reconnect).
pub type CorrelationId = u64;

/// Anything the correlator can deliver raw response bytes to. The Service
/// Client layer is responsible for wrapping its typed decode logic behind
/// this so the correlator itself never inspects envelope contents.
pub(crate) trait RawSink: Send {
    fn next(&mut self, bytes: Bytes);
    fn complete(&mut self);
    fn error(&mut self, err: ClientError);
}

pub(crate) enum PendingEntry {
    Unary(tokio::sync::oneshot::Sender<Result<Bytes, ClientError>>),
    Stream(Box<dyn RawSink>),
}

enum State {
    Open,
    Disconnected,
}

struct Inner {
    state: State,
    pending: HashMap<CorrelationId, PendingEntry>,
}

/// Maps outbound correlation ids to pending completions or stream sinks.
/// One correlator is owned by exactly one [`crate::transport::Transport`]
/// connection; it does not outlive a reconnect.
pub struct Correlator {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                state: State::Open,
                pending: HashMap::new(),
            }),
        }
    }

    /// Allocates the next correlation id. Monotonic for the lifetime of this
    /// correlator instance.
    pub fn next_id(&self) -> CorrelationId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_unary(
        &self,
        id: CorrelationId,
        tx: tokio::sync::oneshot::Sender<Result<Bytes, ClientError>>,
    ) -> Result<(), ClientError> {
        self.register(id, PendingEntry::Unary(tx))
    }

    pub(crate) fn register_stream(
        &self,
        id: CorrelationId,
        sink: Box<dyn RawSink>,
    ) -> Result<(), ClientError> {
        self.register(id, PendingEntry::Stream(sink))
    }

    fn register(&self, id: CorrelationId, entry: PendingEntry) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();

        if matches!(inner.state, State::Disconnected) {
            return Err(ClientError::NotConnected);
        }

        if inner.pending.contains_key(&id) {
            return Err(ClientError::from(CorrelationIdInUse(id)));
        }

        inner.pending.insert(id, entry);
        logging::correlator::registered(id);

        Ok(())
    }

    /// Delivers a unary response, completing and removing the matching
    /// entry, or forwards a streaming frame via `next` without removing it.
    /// An unknown id is silently dropped: the caller may have already
    /// cancelled, or the server sent a late response.
    pub fn deliver(&self, id: CorrelationId, bytes: Bytes) {
        let mut inner = self.inner.lock();

        match inner.pending.get_mut(&id) {
            Some(PendingEntry::Unary(_)) => {
                if let Some(PendingEntry::Unary(tx)) = inner.pending.remove(&id) {
                    let _ = tx.send(Ok(bytes));
                    logging::correlator::delivered(id);
                }
            }
            Some(PendingEntry::Stream(sink)) => {
                sink.next(bytes);
                logging::correlator::delivered(id);
            }
            None => logging::correlator::delivered_to_unknown(id),
        }
    }

    /// Removes the entry for `id` and calls `complete` or `error` on it
    /// depending on `outcome`. No-op on an unknown id.
    pub fn terminate_stream(&self, id: CorrelationId, outcome: Result<(), ClientError>) {
        let mut inner = self.inner.lock();

        if let Some(PendingEntry::Stream(mut sink)) = inner.pending.remove(&id) {
            drop(inner);
            let ok = outcome.is_ok();
            match outcome {
                Ok(()) => sink.complete(),
                Err(err) => sink.error(err),
            }
            logging::correlator::stream_terminated(id, ok);
        }
    }

    /// Removes `id` from the pending table without notifying it. Used for
    /// caller-initiated cancellation of a unary call: dropping the awaitable
    /// drops the oneshot receiver, so the sender's next `send` simply fails
    /// silently, and this is what actually reclaims the table slot.
    pub fn cancel(&self, id: CorrelationId) {
        self.inner.lock().pending.remove(&id);
    }

    /// Drains every pending entry with `cause` and transitions the
    /// correlator to `DISCONNECTED`, where further `register` calls fail.
    /// Idempotent: calling this on an already-disconnected correlator drains
    /// an empty table.
    pub fn fail_all(&self, cause: DisconnectCause) {
        let mut inner = self.inner.lock();
        inner.state = State::Disconnected;
        let drained: Vec<_> = inner.pending.drain().collect();
        drop(inner);

        logging::correlator::fail_all(&cause.to_string(), drained.len());

        for (_, entry) in drained {
            match entry {
                PendingEntry::Unary(tx) => {
                    let _ = tx.send(Err(cause.clone().into()));
                }
                PendingEntry::Stream(mut sink) => sink.error(cause.clone().into()),
            }
        }
    }

    /// Returns the correlator to `OPEN` after a fresh connect. The pending
    /// table is expected to already be empty (it was drained by the
    /// preceding `fail_all`); this only flips the state flag back.
    pub fn reset(&self) {
        self.inner.lock().state = State::Open;
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

enum GuardKind {
    Unary,
    Stream,
}

/// Reclaims a pending table entry when the caller's future is dropped
/// before the call completes, e.g. by a surrounding `tokio::time::timeout`
/// or the caller simply not polling it again.
///
/// Armed on construction; `disarm` is called once the call reaches a
/// terminal state through its normal path, so the `Drop` impl only fires
/// when the entry is still outstanding.
pub(crate) struct PendingGuard {
    correlator: Arc<Correlator>,
    id: CorrelationId,
    kind: GuardKind,
    armed: bool,
}

impl PendingGuard {
    pub(crate) fn unary(correlator: Arc<Correlator>, id: CorrelationId) -> Self {
        Self {
            correlator,
            id,
            kind: GuardKind::Unary,
            armed: true,
        }
    }

    pub(crate) fn stream(correlator: Arc<Correlator>, id: CorrelationId) -> Self {
        Self {
            correlator,
            id,
            kind: GuardKind::Stream,
            armed: true,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.kind {
            GuardKind::Unary => self.correlator.cancel(self.id),
            GuardKind::Stream => self
                .correlator
                .terminate_stream(self.id, Err(ClientError::Cancelled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        items: Vec<Bytes>,
        completed: bool,
        errored: Option<ClientError>,
    }

    impl RawSink for std::sync::Arc<Mutex<RecordingSink>> {
        fn next(&mut self, bytes: Bytes) {
            self.lock().items.push(bytes);
        }

        fn complete(&mut self) {
            self.lock().completed = true;
        }

        fn error(&mut self, err: ClientError) {
            self.lock().errored = Some(err);
        }
    }

    #[tokio::test]
    async fn delivers_unary_response_to_waiter() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        correlator.register_unary(id, tx).unwrap();

        correlator.deliver(id, Bytes::from_static(b"\x01"));

        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), Bytes::from_static(b"\x01"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn unknown_id_is_silently_dropped() {
        let correlator = Correlator::new();
        correlator.deliver(999, Bytes::from_static(b"\x01"));
    }

    #[test]
    fn stream_receives_frames_in_order_then_completes() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let sink = std::sync::Arc::new(Mutex::new(RecordingSink {
            items: vec![],
            completed: false,
            errored: None,
        }));

        correlator.register_stream(id, Box::new(sink.clone())).unwrap();
        correlator.deliver(id, Bytes::from_static(b"\x10"));
        correlator.deliver(id, Bytes::from_static(b"\x11"));
        correlator.terminate_stream(id, Ok(()));

        let recorded = sink.lock();
        assert_eq!(recorded.items, vec![Bytes::from_static(b"\x10"), Bytes::from_static(b"\x11")]);
        assert!(recorded.completed);
        assert!(recorded.errored.is_none());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn fail_all_drains_and_rejects_further_registration() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        correlator.register_unary(id, tx).unwrap();

        correlator.fail_all(DisconnectCause::new("transport closed"));

        assert!(matches!(rx.await.unwrap(), Err(ClientError::TransportFailure(_))));
        assert_eq!(correlator.pending_count(), 0);

        let (tx2, _rx2) = tokio::sync::oneshot::channel();
        assert!(matches!(
            correlator.register_unary(correlator.next_id(), tx2),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn fail_all_is_idempotent() {
        let correlator = Correlator::new();
        correlator.fail_all(DisconnectCause::new("first"));
        correlator.fail_all(DisconnectCause::new("second"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn register_rejects_a_reused_id() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let (tx, _rx) = tokio::sync::oneshot::channel();
        correlator.register_unary(id, tx).unwrap();

        let (tx2, _rx2) = tokio::sync::oneshot::channel();
        assert!(matches!(
            correlator.register_unary(id, tx2),
            Err(ClientError::CorrelationIdInUse(_))
        ));
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn dropping_the_guard_cancels_a_pending_unary_entry() {
        let correlator = Arc::new(Correlator::new());
        let id = correlator.next_id();
        let (tx, _rx) = tokio::sync::oneshot::channel();
        correlator.register_unary(id, tx).unwrap();

        let guard = PendingGuard::unary(correlator.clone(), id);
        assert_eq!(correlator.pending_count(), 1);
        drop(guard);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn disarming_the_guard_leaves_the_entry_in_place() {
        let correlator = Arc::new(Correlator::new());
        let id = correlator.next_id();
        let (tx, _rx) = tokio::sync::oneshot::channel();
        correlator.register_unary(id, tx).unwrap();

        let mut guard = PendingGuard::unary(correlator.clone(), id);
        guard.disarm();
        drop(guard);
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn dropping_the_guard_terminates_a_pending_stream_as_cancelled() {
        let correlator = Arc::new(Correlator::new());
        let id = correlator.next_id();
        let sink = std::sync::Arc::new(Mutex::new(RecordingSink {
            items: vec![],
            completed: false,
            errored: None,
        }));
        correlator.register_stream(id, Box::new(sink.clone())).unwrap();

        let guard = PendingGuard::stream(correlator.clone(), id);
        drop(guard);

        assert_eq!(correlator.pending_count(), 0);
        assert!(matches!(sink.lock().errored, Some(ClientError::Cancelled)));
    }
}
