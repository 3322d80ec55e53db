use crate::event::LoggingEvent;

/// Error raised by a sink while appending or rotating.
///
/// Sink errors are always caught inside the logging service and degraded
/// to a fallback console report; they never reach the wrapped call.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid sink configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Destination for finalized [`LoggingEvent`]s.
///
/// Implementations transport events to a concrete target (the dedicated
/// rolling file, a test recorder, etc). `append` is called either in-line
/// on the observing thread or from the background dispatch task, so
/// implementations must be safe to share across threads.
pub trait EventSink: Send + Sync {
    /// Append a single finalized event.
    fn append(&self, event: &LoggingEvent) -> Result<(), SinkError>;

    /// Flush any buffered output. Default implementation is a no-op.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Captures every appended event for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) events: Mutex<Vec<LoggingEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<LoggingEvent> {
            std::mem::take(&mut self.events.lock().unwrap())
        }

        pub(crate) fn len(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    impl EventSink for RecordingSink {
        fn append(&self, event: &LoggingEvent) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Always fails; exercises the degrade-don't-propagate policy.
    #[derive(Default)]
    pub(crate) struct FailingSink;

    impl EventSink for FailingSink {
        fn append(&self, _event: &LoggingEvent) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk on fire",
            )))
        }
    }
}
