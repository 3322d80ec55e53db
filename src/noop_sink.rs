use crate::event::LoggingEvent;
use crate::sink::{EventSink, SinkError};

/// A sink that simply drops all events.
///
/// Useful for measuring the overhead of the interception layer itself
/// without any file I/O, and for unit tests that don't care about
/// persistence.
#[derive(Clone, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn append(&self, _event: &LoggingEvent) -> Result<(), SinkError> {
        Ok(())
    }
}
