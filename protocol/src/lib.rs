//! Wire protocol shared between the client and server: the frame envelope,
//! its length-delimited codec, and the nested service/command/query
//! envelope carried inside each frame's body.

pub mod codec;
pub mod context;
pub mod envelope;
pub mod frame;
pub mod ids;

pub use codec::{WireCodec, DEFAULT_MAX_FRAME_SIZE};
pub use context::{RequestContext, ResponseContext, StreamContext};
pub use envelope::{
    build_command_request, build_create_request, build_delete_request, build_query_request,
    decode_service_request, decode_stream_frame, decode_unary_response, encode_service_request,
    encode_service_response, ApplicationErrorPayload, CommandRequest, CommandResponse,
    QueryRequest, QueryResponse, ServiceRequest, ServiceRequestBody, ServiceResponse,
    ServiceResponseBody, StreamFrameOutcome, StreamResponse, UnaryOutcome,
};
pub use frame::{CorrelationId, Frame};
pub use ids::{OperationKind, ServiceId};
