//! Thin `tracing` wrappers grouped by subsystem. Kept free of formatting
//! logic beyond what `tracing`'s field syntax already gives us, so call
//! sites stay one-liners.

pub mod transport {
    use replica_client_std::errors::TransportError;

    pub fn connecting() {
        tracing::debug!("transport connecting");
    }

    pub fn connected() {
        tracing::info!("transport connected");
    }

    pub fn connect_failed(err: &TransportError) {
        tracing::warn!(%err, "transport failed to connect");
    }

    pub fn closing() {
        tracing::debug!("transport closing");
    }

    pub fn closed() {
        tracing::info!("transport closed");
    }

    pub fn write_failed(err: &TransportError) {
        tracing::error!(%err, "transport write failed");
    }

    pub fn disconnected(cause: &str) {
        tracing::warn!(cause, "transport disconnected");
    }
}

pub mod correlator {
    pub fn registered(correlation_id: u64) {
        tracing::trace!(correlation_id, "registered pending request");
    }

    pub fn delivered(correlation_id: u64) {
        tracing::trace!(correlation_id, "delivered response");
    }

    pub fn delivered_to_unknown(correlation_id: u64) {
        tracing::debug!(correlation_id, "dropped response for unknown correlation id");
    }

    pub fn stream_terminated(correlation_id: u64, ok: bool) {
        tracing::debug!(correlation_id, ok, "stream terminated");
    }

    pub fn fail_all(cause: &str, drained: usize) {
        tracing::warn!(cause, drained, "failing all pending requests");
    }

    pub fn decode_failed(correlation_id: u64, err: &dyn std::error::Error) {
        tracing::error!(correlation_id, %err, "failed to decode response envelope");
    }
}
