use replica_client_std::errors::ClientError;

/// Push-style receiver for a streaming operation's inbound frames.
///
/// Every streaming call is parameterized by one of these, implemented once
/// per output type rather than once per call site.
///
/// Exactly one of `complete`/`error` is called, always after zero or more
/// `next` calls, and nothing is called after that terminal notification.
pub trait StreamSink<T>: Send {
    fn next(&mut self, item: T);
    fn complete(&mut self);
    fn error(&mut self, err: ClientError);
}

/// A [`StreamSink`] backed by an unbounded `tokio::sync::mpsc` channel,
/// convenient for callers who'd rather poll a `Receiver` than implement the
/// trait themselves.
pub struct ChannelSink<T> {
    tx: tokio::sync::mpsc::UnboundedSender<Result<T, ClientError>>,
}

impl<T> ChannelSink<T> {
    pub fn new_pair() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Result<T, ClientError>>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<T: Send> StreamSink<T> for ChannelSink<T> {
    fn next(&mut self, item: T) {
        let _ = self.tx.send(Ok(item));
    }

    fn complete(&mut self) {}

    fn error(&mut self, err: ClientError) {
        let _ = self.tx.send(Err(err));
    }
}
