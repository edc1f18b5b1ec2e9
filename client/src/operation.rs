use replica_client_protocol::OperationKind;
use replica_client_std::errors::UnsupportedOperation;

/// Wire-level kind names the dispatcher accepts. The operation kind is a
/// free string at this boundary, not the protocol's closed `OperationKind`
/// enum, so an implementer can exercise the "unsupported kind" path with an
/// arbitrary sentinel before the request ever reaches the transport.
pub const COMMAND_KIND: &str = "COMMAND";
pub const QUERY_KIND: &str = "QUERY";

/// Describes a single operation exposed by a service: its name, and the
/// kind under which the server should process it. `kind` is validated by
/// [`dispatch`], not by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationId {
    pub id: String,
    pub kind: String,
}

impl OperationId {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
        }
    }

    pub fn command(id: impl Into<String>) -> Self {
        Self::new(id, COMMAND_KIND)
    }

    pub fn query(id: impl Into<String>) -> Self {
        Self::new(id, QUERY_KIND)
    }
}

/// Selects the command or query code path for `op`, failing immediately
/// (and without touching the transport) if `op.kind` is neither `COMMAND`
/// nor `QUERY`. The distinction matters because the server enforces
/// different consistency guarantees on the two paths.
pub fn dispatch(op: &OperationId) -> Result<OperationKind, UnsupportedOperation> {
    match op.kind.as_str() {
        COMMAND_KIND => Ok(OperationKind::Command),
        QUERY_KIND => Ok(OperationKind::Query),
        other => Err(UnsupportedOperation {
            operation_id: op.id.clone(),
            kind: other.to_string(),
        }),
    }
}
