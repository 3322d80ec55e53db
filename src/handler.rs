use crate::config::LoggingConfig;
use crate::context::extract_message_context;
use crate::event::{LogLevel, LoggingEvent, MessageContext};
use crate::intercept::CallSite;
use crate::service::LoggingService;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Catches failures that escape message-handler calls (and, as a
/// fallback, any call) and turns them into failure events so no error is
/// silently dropped.
///
/// The generic path skips sites already covered by the message-handler
/// path, so one failure never produces two entries.
pub struct ExceptionRouter {
    service: Arc<LoggingService>,
    config: Arc<LoggingConfig>,
}

impl ExceptionRouter {
    pub fn new(service: Arc<LoggingService>, config: Arc<LoggingConfig>) -> Self {
        ExceptionRouter { service, config }
    }

    /// An error escaping a message-handler call: build a failure event
    /// with best-effort broker context and forward it.
    pub fn on_consumer_error(&self, site: &CallSite, args: &[Value], error: impl fmt::Display) {
        let mut event = self.failure_event(site, args, error);
        event.message_context = Some(extract_message_context(
            &site.param_roles,
            &site.topics,
            args,
            self.config.include_payload,
        ));
        self.service.log_failure_event(event);
    }

    /// An error reported by the broker client for a specific received
    /// record; the context is built straight from the record's metadata.
    pub fn on_record_error(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        key: Option<&str>,
        payload: Option<Value>,
        error: impl fmt::Display,
    ) {
        let mut event = LoggingEvent::new("KafkaConsumer", "onMessage", LogLevel::Error);
        event.message_context = Some(MessageContext {
            topic: Some(topic.to_string()),
            partition: Some(partition),
            offset: Some(offset),
            key: key.map(str::to_string),
            payload: if self.config.include_payload {
                payload
            } else {
                None
            },
            raw_headers: None,
        });
        event.record_exception(error);
        self.service.log_failure_event(event);
    }

    /// Escape hatch for any other call. Skips message-handler sites,
    /// which the consumer path already reported.
    pub fn on_error(&self, site: &CallSite, args: &[Value], error: impl fmt::Display) {
        if site.message_handler {
            return;
        }
        let event = self.failure_event(site, args, error);
        self.service.log_failure_event(event);
    }

    fn failure_event(
        &self,
        site: &CallSite,
        args: &[Value],
        error: impl fmt::Display,
    ) -> LoggingEvent {
        let mut event = LoggingEvent::new(&site.class_name, &site.method_name, LogLevel::Error);
        event.arguments = Some(self.service.mask_captured(args));
        event.record_exception(error);
        event
    }
}
