use std::time::Duration;

use replica_client_protocol::DEFAULT_MAX_FRAME_SIZE;

/// Tunable connection parameters, assembled via [`ClientOptionsBuilder`] or
/// taken as-is from [`ClientOptions::default`].
///
/// The core never reads these from the environment or a config file; an
/// embedding application constructs them in-process.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Upper bound on how long `Transport::connect` is allowed to take
    /// before the caller should consider the attempt failed.
    pub connect_timeout: Duration,
    /// Frames larger than this are rejected by the wire codec on both the
    /// encode and decode paths.
    pub max_frame_size: usize,
    /// Bound on the correlator's internal channels (the write queue and any
    /// per-stream sink buffer).
    pub channel_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            channel_capacity: 256,
        }
    }
}

impl ClientOptions {
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }
}

/// Fluent builder for [`ClientOptions`]. Unset fields fall back to
/// [`ClientOptions::default`].
#[derive(Clone, Debug, Default)]
pub struct ClientOptionsBuilder {
    connect_timeout: Option<Duration>,
    max_frame_size: Option<usize>,
    channel_capacity: Option<usize>,
}

impl ClientOptionsBuilder {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = Some(max_frame_size);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> ClientOptions {
        let defaults = ClientOptions::default();

        ClientOptions {
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            max_frame_size: self.max_frame_size.unwrap_or(defaults.max_frame_size),
            channel_capacity: self.channel_capacity.unwrap_or(defaults.channel_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_falls_back_to_defaults() {
        let opts = ClientOptions::builder()
            .with_max_frame_size(4096)
            .build();

        assert_eq!(opts.max_frame_size, 4096);
        assert_eq!(opts.channel_capacity, ClientOptions::default().channel_capacity);
    }
}
