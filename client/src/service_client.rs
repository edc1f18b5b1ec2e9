use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use replica_client_protocol::{
    build_command_request, build_create_request, build_delete_request, build_query_request,
    decode_stream_frame, decode_unary_response, encode_service_request, OperationKind,
    RequestContext, ResponseContext, ServiceId, StreamContext, StreamFrameOutcome, UnaryOutcome,
};
use replica_client_std::errors::{ClientError, CodecError, TransportError};
use replica_client_std::traits::codec::{MessageDecoder, MessageEncoder};

use crate::correlator::{Correlator, PendingGuard, RawSink};
use crate::logging;
use crate::operation::{dispatch, OperationId};
use crate::sink::StreamSink;
use crate::transport::Transport;

/// Public API over a [`ServiceId`]: combines the envelope codec, a
/// transport, and the request correlator behind `create`/`delete`/`execute`/
/// `execute_stream`. One instance is cheap to clone — cloning only clones
/// the `Arc`-backed transport and correlator handles, never the connection.
pub struct ServiceClient<T> {
    id: ServiceId,
    transport: T,
    correlator: Arc<Correlator>,
}

impl<T: Transport> ServiceClient<T> {
    pub fn new(id: ServiceId, transport: T, correlator: Arc<Correlator>) -> Self {
        Self {
            id,
            transport,
            correlator,
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn service_type(&self) -> &str {
        &self.id.service_type
    }

    pub async fn create(&self) -> Result<(), ClientError> {
        let request = build_create_request(self.id.clone());
        let bytes = self.submit_unary(OperationKind::Command, &request).await?;
        self.ack(bytes)
    }

    pub async fn delete(&self) -> Result<(), ClientError> {
        let request = build_delete_request(self.id.clone());
        let bytes = self.submit_unary(OperationKind::Command, &request).await?;
        self.ack(bytes)
    }

    fn ack(&self, bytes: Bytes) -> Result<(), ClientError> {
        match decode_unary_response(OperationKind::Command, &bytes)? {
            UnaryOutcome::Output { .. } => Ok(()),
            UnaryOutcome::Application(message) => Err(ClientError::ApplicationError(message)),
        }
    }

    /// Executes a unary command or query. `op.kind` is resolved by
    /// [`dispatch`] before the transport is touched at all, so an
    /// unsupported kind never produces a write.
    pub async fn execute<Req, Resp, Enc, Dec>(
        &self,
        op: OperationId,
        ctx: RequestContext,
        request: Req,
        encoder: &mut Enc,
        decoder: &mut Dec,
    ) -> Result<(ResponseContext, Resp), ClientError>
    where
        Enc: MessageEncoder<Req>,
        Dec: MessageDecoder<Resp>,
    {
        let kind = dispatch(&op)?;

        let payload = encoder
            .encode(request)
            .map_err(|err| ClientError::from(CodecError::EncodeFailure(Box::new(err))))?;

        let envelope = match kind {
            OperationKind::Command => {
                build_command_request(self.id.clone(), op.id.clone(), ctx, payload.to_vec())
            }
            OperationKind::Query => {
                build_query_request(self.id.clone(), op.id.clone(), ctx, payload.to_vec())
            }
        };

        let bytes = self.submit_unary(kind, &envelope).await?;

        match decode_unary_response(kind, &bytes)? {
            UnaryOutcome::Output { context, output } => {
                let mut buf = BytesMut::from(&output[..]);
                let decoded = decoder.decode(&mut buf).map_err(|err| {
                    ClientError::from(CodecError::DecodeFailure(Box::new(err)))
                })?;
                Ok((context, decoded))
            }
            UnaryOutcome::Application(message) => Err(ClientError::ApplicationError(message)),
        }
    }

    /// Executes a server-streaming command or query. Each inbound frame is
    /// decoded as a `StreamResponse` envelope, then through the caller's
    /// decoder, and forwarded to `sink.next` as `(StreamContext, Resp)`. The
    /// returned future resolves once the stream reaches a terminal state;
    /// `sink.error`/`sink.complete` fire before that. Dropping the returned
    /// future before it resolves terminates the sink with
    /// [`ClientError::Cancelled`] and removes its entry from the correlator.
    pub async fn execute_stream<Req, Resp, Enc, Dec, S>(
        &self,
        op: OperationId,
        ctx: RequestContext,
        request: Req,
        encoder: &mut Enc,
        decoder: Dec,
        sink: S,
    ) -> Result<(), ClientError>
    where
        Enc: MessageEncoder<Req>,
        Dec: MessageDecoder<Resp> + Send + 'static,
        Resp: Send + 'static,
        S: StreamSink<(StreamContext, Resp)> + 'static,
    {
        let kind = dispatch(&op)?;

        let payload = encoder
            .encode(request)
            .map_err(|err| ClientError::from(CodecError::EncodeFailure(Box::new(err))))?;

        let envelope = match kind {
            OperationKind::Command => {
                build_command_request(self.id.clone(), op.id.clone(), ctx, payload.to_vec())
            }
            OperationKind::Query => {
                build_query_request(self.id.clone(), op.id.clone(), ctx, payload.to_vec())
            }
        };

        let id = self.correlator.next_id();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let bridging_sink = DecodingSink {
            decoder,
            sink,
            done: Some(done_tx),
            terminated: false,
            _resp: std::marker::PhantomData::<Resp>,
        };
        self.correlator.register_stream(id, Box::new(bridging_sink))?;
        let mut guard = PendingGuard::stream(self.correlator.clone(), id);

        let bytes = encode_service_request(&envelope)?;
        let result = match kind {
            OperationKind::Command => self.transport.command(id, Bytes::from(bytes)).await,
            OperationKind::Query => self.transport.query(id, Bytes::from(bytes)).await,
        };

        if let Err(err) = result {
            let message = err.to_string();
            guard.disarm();
            self.correlator.terminate_stream(
                id,
                Err(ClientError::transport(TransportError::Io(
                    std::io::Error::other(message),
                ))),
            );
            return Err(err);
        }

        // The stream's terminal notification (complete/error) already went
        // to the caller's sink; this only unblocks the awaitable itself once
        // that has happened. If this future is dropped while still awaiting
        // `done_rx`, `guard`'s drop terminates the sink as cancelled and
        // reclaims the correlator's table slot.
        let _ = done_rx.await;
        guard.disarm();
        Ok(())
    }

    async fn submit_unary(
        &self,
        kind: OperationKind,
        envelope: &replica_client_protocol::ServiceRequest,
    ) -> Result<Bytes, ClientError> {
        let id = self.correlator.next_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.correlator.register_unary(id, tx)?;
        let mut guard = PendingGuard::unary(self.correlator.clone(), id);

        let bytes = encode_service_request(envelope)?;
        let submit = match kind {
            OperationKind::Command => self.transport.command(id, Bytes::from(bytes)).await,
            OperationKind::Query => self.transport.query(id, Bytes::from(bytes)).await,
        };

        if let Err(err) = submit {
            // `guard` is still armed here; dropping it at the end of this
            // scope reclaims the table slot.
            return Err(err);
        }

        // If this future is dropped while still awaiting `rx`, `guard`'s
        // drop cancels the pending entry so it doesn't leak.
        let result = rx.await.map_err(|_| ClientError::Cancelled);
        guard.disarm();
        result?
    }
}

impl<T: Clone> Clone for ServiceClient<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            transport: self.transport.clone(),
            correlator: Arc::clone(&self.correlator),
        }
    }
}

/// Bridges the correlator's opaque byte delivery to a caller's typed
/// [`StreamSink`], doing the `StreamResponse` envelope decode and the
/// caller's output decode in one place per stream.
///
/// A decode failure on a single frame is treated as terminal for the
/// stream (the caller's sink receives `error`, matching "no sink is
/// invoked after a terminal notification") rather than being skipped and
/// the stream continuing.
struct DecodingSink<Dec, S, Resp> {
    decoder: Dec,
    sink: S,
    done: Option<tokio::sync::oneshot::Sender<()>>,
    terminated: bool,
    _resp: std::marker::PhantomData<Resp>,
}

impl<Dec, S, Resp> DecodingSink<Dec, S, Resp>
where
    S: StreamSink<(StreamContext, Resp)>,
{
    fn terminate_with_error(&mut self, err: ClientError) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.sink.error(err);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl<Dec, S, Resp> RawSink for DecodingSink<Dec, S, Resp>
where
    Dec: MessageDecoder<Resp> + Send,
    S: StreamSink<(StreamContext, Resp)>,
    Resp: Send,
{
    fn next(&mut self, bytes: Bytes) {
        if self.terminated {
            return;
        }

        match decode_stream_frame(&bytes) {
            Ok(StreamFrameOutcome::Output { context, output }) => {
                let mut buf = BytesMut::from(&output[..]);
                match self.decoder.decode(&mut buf) {
                    Ok(decoded) => self.sink.next((context, decoded)),
                    Err(err) => self.terminate_with_error(ClientError::from(
                        CodecError::DecodeFailure(Box::new(err)),
                    )),
                }
            }
            Ok(StreamFrameOutcome::Application(message)) => {
                self.terminate_with_error(ClientError::ApplicationError(message))
            }
            Err(err) => {
                logging::correlator::decode_failed(0, &err);
                self.terminate_with_error(ClientError::from(err))
            }
        }
    }

    fn complete(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.sink.complete();
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }

    fn error(&mut self, err: ClientError) {
        self.terminate_with_error(err)
    }
}
