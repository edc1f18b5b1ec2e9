//! Client-side request pipeline for a replicated, consensus-backed service.
//!
//! A [`ServiceClient`] turns typed command/query operations into framed
//! protocol envelopes, routes them through a [`Transport`], and demultiplexes
//! responses via a [`Correlator`] shared by every client attached to the
//! same connection.

pub mod correlator;
pub mod logging;
pub mod operation;
pub mod options;
pub mod service_client;
pub mod sink;
pub mod transport;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use correlator::Correlator;
pub use operation::OperationId;
pub use options::{ClientOptions, ClientOptionsBuilder};
pub use service_client::ServiceClient;
pub use sink::{ChannelSink, StreamSink};
pub use transport::{FramedTransport, Transport};

#[cfg(feature = "sync")]
pub use sync::Synchronous;

pub use replica_client_protocol::{OperationKind, RequestContext, ResponseContext, ServiceId, StreamContext};
pub use replica_client_std::errors::{ClientError, Result};
pub use replica_client_std::traits::codec::{BincodeCodec, MessageDecoder, MessageEncoder};
