//! Per-instance logging sink.
//!
//! A `LogSink` decides where the `tracing` events of one database (and its
//! tables) go. Nothing is installed globally: a sink built from a subscriber
//! scopes every event emitted by its owner to that subscriber.

use core::fmt;
use tracing::{Dispatch, Subscriber};

/// Destination for the events of a database or table.
#[derive(Clone, Default)]
pub struct LogSink {
    /// `None` forwards to whatever dispatcher is active at the call site.
    dispatch: Option<Dispatch>,
}

impl LogSink {
    /// Forwards events to the dispatcher active at the call site.
    pub fn current() -> Self {
        Self { dispatch: None }
    }

    /// Drops every event.
    pub fn disabled() -> Self {
        Self {
            dispatch: Some(Dispatch::none()),
        }
    }

    /// Sends events to the given dispatcher.
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// Sends events to the given subscriber.
    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: Subscriber + Send + Sync + 'static,
    {
        Self::new(Dispatch::new(subscriber))
    }

    /// Runs `f` with this sink as the default dispatcher.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("scoped", &self.dispatch.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    /// In-memory writer for capturing formatted events.
    #[derive(Clone, Default)]
    pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub fn capturing_sink() -> (super::LogSink, SharedBuf) {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (super::LogSink::from_subscriber(subscriber), buf)
    }
}
