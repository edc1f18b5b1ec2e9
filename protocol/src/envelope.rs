//! The nested service/command/query envelope.
//!
//! Three layers are involved in a response: the outer [`ServiceResponse`],
//! the inner `CommandResponse`/`QueryResponse`/`StreamResponse`, and finally
//! the caller-supplied decoder applied to the `output` bytes. Each layer is
//! decoded as a distinct step returning its own `Result`, rather than as one
//! chained transformation, so a failure always carries precise layer
//! context.

use bincode::config::Configuration;
use replica_client_std::errors::EnvelopeError;

use crate::context::{RequestContext, ResponseContext, StreamContext};
use crate::ids::{OperationKind, ServiceId};

const BINCODE_CONFIG: Configuration = bincode::config::standard();

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct CommandRequest {
    pub name: String,
    pub context: RequestContext,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct QueryRequest {
    pub name: String,
    pub context: RequestContext,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub enum ServiceRequestBody {
    Create,
    Delete,
    Command(CommandRequest),
    Query(QueryRequest),
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct ServiceRequest {
    pub id: ServiceId,
    pub body: ServiceRequestBody,
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct CommandResponse {
    pub context: ResponseContext,
    pub output: Vec<u8>,
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct QueryResponse {
    pub context: ResponseContext,
    pub output: Vec<u8>,
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct StreamResponse {
    pub context: StreamContext,
    pub output: Vec<u8>,
}

/// A tagged application-level error returned by the server, distinct from an
/// envelope decode failure: it is surfaced to the caller verbatim as
/// `ClientError::ApplicationError`.
#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct ApplicationErrorPayload {
    pub message: String,
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub enum ServiceResponseBody {
    Command(CommandResponse),
    Query(QueryResponse),
    Stream(StreamResponse),
    Error(ApplicationErrorPayload),
}

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct ServiceResponse {
    pub body: ServiceResponseBody,
}

/// The outcome of decoding a unary (`Command`/`Query`) response envelope,
/// distinguishing a well-formed typed output from a tagged application
/// error. Both are "successful decodes" as far as the envelope layer is
/// concerned; only a shape mismatch is a decode failure.
pub enum UnaryOutcome {
    Output {
        context: ResponseContext,
        output: Vec<u8>,
    },
    Application(String),
}

/// The outcome of decoding a single streaming response frame.
pub enum StreamFrameOutcome {
    Output {
        context: StreamContext,
        output: Vec<u8>,
    },
    Application(String),
}

fn kind_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Command => "Command",
        OperationKind::Query => "Query",
    }
}

/// Build the outer request envelope for a command or query, copying the
/// caller's [`RequestContext`] in verbatim and carrying the encoded request
/// payload opaquely.
pub fn build_command_request(
    id: ServiceId,
    operation_name: String,
    context: RequestContext,
    payload: Vec<u8>,
) -> ServiceRequest {
    ServiceRequest {
        id,
        body: ServiceRequestBody::Command(CommandRequest {
            name: operation_name,
            context,
            payload,
        }),
    }
}

pub fn build_query_request(
    id: ServiceId,
    operation_name: String,
    context: RequestContext,
    payload: Vec<u8>,
) -> ServiceRequest {
    ServiceRequest {
        id,
        body: ServiceRequestBody::Query(QueryRequest {
            name: operation_name,
            context,
            payload,
        }),
    }
}

pub fn build_create_request(id: ServiceId) -> ServiceRequest {
    ServiceRequest {
        id,
        body: ServiceRequestBody::Create,
    }
}

pub fn build_delete_request(id: ServiceId) -> ServiceRequest {
    ServiceRequest {
        id,
        body: ServiceRequestBody::Delete,
    }
}

/// Encoding a well-typed `ServiceRequest` never fails.
pub fn encode_service_request(request: &ServiceRequest) -> Result<Vec<u8>, EnvelopeError> {
    Ok(bincode::encode_to_vec(request, BINCODE_CONFIG)?)
}

pub fn decode_service_request(bytes: &[u8]) -> Result<ServiceRequest, EnvelopeError> {
    let (request, _) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;
    Ok(request)
}

pub fn encode_service_response(response: &ServiceResponse) -> Result<Vec<u8>, EnvelopeError> {
    Ok(bincode::encode_to_vec(response, BINCODE_CONFIG)?)
}

/// Decode a unary response envelope, validating that the oneof discriminator
/// matches the request's operation kind. A mismatch (e.g. a `Query` response
/// to a `Command` request) is `MalformedResponse`; a tagged application
/// error is returned distinctly so the caller sees `ApplicationError`, not a
/// decode failure.
pub fn decode_unary_response(
    expected: OperationKind,
    bytes: &[u8],
) -> Result<UnaryOutcome, EnvelopeError> {
    let (response, _): (ServiceResponse, usize) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;

    match (expected, response.body) {
        (OperationKind::Command, ServiceResponseBody::Command(inner)) => Ok(UnaryOutcome::Output {
            context: inner.context,
            output: inner.output,
        }),
        (OperationKind::Query, ServiceResponseBody::Query(inner)) => Ok(UnaryOutcome::Output {
            context: inner.context,
            output: inner.output,
        }),
        (_, ServiceResponseBody::Error(err)) => Ok(UnaryOutcome::Application(err.message)),
        (_, other) => Err(EnvelopeError::DiscriminatorMismatch {
            expected: kind_name(expected),
            got: format!("{other:?}"),
        }),
    }
}

/// Decode a single inbound streaming response frame.
pub fn decode_stream_frame(bytes: &[u8]) -> Result<StreamFrameOutcome, EnvelopeError> {
    let (response, _): (ServiceResponse, usize) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;

    match response.body {
        ServiceResponseBody::Stream(inner) => Ok(StreamFrameOutcome::Output {
            context: inner.context,
            output: inner.output,
        }),
        ServiceResponseBody::Error(err) => Ok(StreamFrameOutcome::Application(err.message)),
        other => Err(EnvelopeError::DiscriminatorMismatch {
            expected: "Stream",
            got: format!("{other:?}"),
        }),
    }
}
