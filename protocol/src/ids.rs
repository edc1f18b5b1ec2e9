use std::fmt;

/// Identifies a named instance of a typed primitive (a map, lock, counter,
/// ...) hosted by a replicated service. Immutable once constructed; created
/// by the primitive owner and handed to the [`ServiceClient`](crate) at
/// construction time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct ServiceId {
    pub name: String,
    pub service_type: String,
}

impl ServiceId {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_type, self.name)
    }
}

/// Whether an operation mutates replicated state (`Command`, routed through
/// consensus on the server) or only reads it (`Query`, may use a relaxed
/// read path).
#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum OperationKind {
    Command,
    Query,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Command => write!(f, "COMMAND"),
            OperationKind::Query => write!(f, "QUERY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_id_displays_type_then_name() {
        let id = ServiceId::new("orders", "map");
        assert_eq!(id.to_string(), "map/orders");
    }
}
