use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use replica_client_protocol::{CorrelationId, Frame, WireCodec};
use replica_client_std::errors::{ClientError, DisconnectCause, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::correlator::Correlator;
use crate::logging;
use crate::options::ClientOptions;

const NEW: u8 = 0;
const CONNECTING: u8 = 1;
const CONNECTED: u8 = 2;
const CLOSING: u8 = 3;
const CLOSED: u8 = 4;

/// Contract a service client submits framed bytes through. Decoupled from
/// any particular wire transport so tests can substitute
/// [`crate::mock::MockTransport`] for real I/O.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), ClientError>;
    async fn close(&self) -> Result<(), ClientError>;

    /// Writes a framed command request. Callers register `id` with the
    /// correlator before calling this so a fast server reply can never race
    /// ahead of the bookkeeping.
    async fn command(&self, id: CorrelationId, bytes: Bytes) -> Result<(), ClientError>;
    async fn query(&self, id: CorrelationId, bytes: Bytes) -> Result<(), ClientError>;
}

/// Default realization of [`Transport`] over any `AsyncRead + AsyncWrite`
/// connection, framed with [`WireCodec`]. Writes are serialized through an
/// internal `mpsc` queue drained by a dedicated writer task so concurrent
/// callers never interleave partial frames on the wire; a dedicated reader
/// task hands each decoded frame to the [`Correlator`].
///
/// Generic over the underlying stream type so tests can substitute
/// `tokio::io::DuplexStream` for a real `TcpStream`.
pub struct FramedTransport<S> {
    state: AtomicU8,
    write_tx: Arc<parking_lot::Mutex<Option<mpsc::Sender<Frame>>>>,
    correlator: Arc<Correlator>,
    options: ClientOptions,
    connector: Box<dyn Fn() -> futures::future::BoxFuture<'static, std::io::Result<S>> + Send + Sync>,
    tasks: parking_lot::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl FramedTransport<TcpStream> {
    /// Builds a transport that connects to `addr` via `TcpStream::connect`
    /// on every `connect()` call.
    pub fn tcp(addr: std::net::SocketAddr, correlator: Arc<Correlator>, options: ClientOptions) -> Self {
        Self::new(correlator, options, move || {
            Box::pin(async move { TcpStream::connect(addr).await })
        })
    }
}

impl<S> FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new<F, Fut>(correlator: Arc<Correlator>, options: ClientOptions, connector: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::io::Result<S>> + Send + 'static,
    {
        Self {
            state: AtomicU8::new(NEW),
            write_tx: Arc::new(parking_lot::Mutex::new(None)),
            correlator,
            options,
            connector: Box::new(move || -> futures::future::BoxFuture<'static, std::io::Result<S>> {
                Box::pin(connector())
            }),
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn transition_to_closed(&self, reason: &str) {
        self.state.store(CLOSED, Ordering::SeqCst);
        *self.write_tx.lock() = None;
        logging::transport::disconnected(reason);
        self.correlator.fail_all(DisconnectCause::new(reason.to_string()));
    }

    async fn run_io(self: &Arc<Self>, stream: S) {
        let framed = Framed::new(stream, WireCodec::new(self.options.max_frame_size));
        let (mut sink, mut stream) = framed.split();

        let (tx, mut rx) = mpsc::channel::<Frame>(self.options.channel_capacity);
        *self.write_tx.lock() = Some(tx);

        let writer_self = Arc::clone(self);
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(err) = sink.send(frame).await {
                    logging::transport::write_failed(&TransportError::Io(std::io::Error::other(err.to_string())));
                    writer_self.transition_to_closed("write failure");
                    break;
                }
            }
        });

        let reader_self = Arc::clone(self);
        let reader = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(frame) => reader_self.handle_inbound(frame),
                    Err(err) => {
                        logging::transport::write_failed(&TransportError::Io(std::io::Error::other(err.to_string())));
                        reader_self.transition_to_closed("read failure");
                        break;
                    }
                }
            }
            reader_self.transition_to_closed("connection closed by peer");
        });

        self.tasks.lock().extend([writer, reader]);
    }

    fn handle_inbound(&self, frame: Frame) {
        let id = frame.correlation_id();

        match frame {
            Frame::Response(_, bytes) | Frame::StreamResponse(_, bytes) => {
                self.correlator.deliver(id, bytes);
            }
            Frame::StreamEnd(_) => self.correlator.terminate_stream(id, Ok(())),
            Frame::StreamError(_, bytes) => {
                let message = String::from_utf8_lossy(&bytes).into_owned();
                self.correlator
                    .terminate_stream(id, Err(ClientError::ApplicationError(message)));
            }
            Frame::Request(..) => {
                tracing::warn!(correlation_id = id, "client received a Request frame; ignoring");
            }
        }
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), ClientError> {
        if self.state.load(Ordering::SeqCst) != CONNECTED {
            return Err(ClientError::NotConnected);
        }

        let tx = self.write_tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(frame)
                .await
                .map_err(|_| ClientError::transport(TransportError::WriteQueueClosed)),
            None => Err(ClientError::NotConnected),
        }
    }
}

#[async_trait]
impl<S> Transport for Arc<FramedTransport<S>>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    async fn connect(&self) -> Result<(), ClientError> {
        if self.state.load(Ordering::SeqCst) == CONNECTED {
            return Ok(());
        }

        self.state.store(CONNECTING, Ordering::SeqCst);
        logging::transport::connecting();

        let attempt = tokio::time::timeout(self.options.connect_timeout, (self.connector)()).await;

        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                let err = TransportError::Io(err);
                logging::transport::connect_failed(&err);
                self.state.store(CLOSED, Ordering::SeqCst);
                return Err(ClientError::transport(err));
            }
            Err(_) => {
                let err = TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ));
                logging::transport::connect_failed(&err);
                self.state.store(CLOSED, Ordering::SeqCst);
                return Err(ClientError::transport(err));
            }
        };

        self.correlator.reset();
        self.run_io(stream).await;
        self.state.store(CONNECTED, Ordering::SeqCst);
        logging::transport::connected();

        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        if self.state.swap(CLOSING, Ordering::SeqCst) == CLOSED {
            self.state.store(CLOSED, Ordering::SeqCst);
            return Ok(());
        }

        logging::transport::closing();
        *self.write_tx.lock() = None;

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        self.correlator.fail_all(DisconnectCause::new("closed by caller"));
        self.state.store(CLOSED, Ordering::SeqCst);
        logging::transport::closed();

        Ok(())
    }

    async fn command(&self, id: CorrelationId, bytes: Bytes) -> Result<(), ClientError> {
        self.send_frame(Frame::Request(id, bytes)).await
    }

    async fn query(&self, id: CorrelationId, bytes: Bytes) -> Result<(), ClientError> {
        self.send_frame(Frame::Request(id, bytes)).await
    }
}
