/// Server-session metadata threaded verbatim from the caller into the
/// `Command`/`Query` envelope. Opaque to the core beyond that: it never
/// inspects or rewrites these fields.
#[derive(Clone, Debug, Default, PartialEq, bincode::Encode, bincode::Decode)]
pub struct RequestContext {
    pub session_id: u64,
    pub sequence_number: u64,
    pub expected_index: Option<u64>,
}

/// Returned alongside a unary response; carries server-side ordering
/// information used by the caller for causality tracking.
#[derive(Clone, Debug, Default, PartialEq, bincode::Encode, bincode::Decode)]
pub struct ResponseContext {
    pub index: u64,
    pub output_sequence: u64,
}

/// The per-frame analog of [`ResponseContext`] for streaming responses.
#[derive(Clone, Debug, Default, PartialEq, bincode::Encode, bincode::Decode)]
pub struct StreamContext {
    pub index: u64,
    pub output_sequence: u64,
}
