use crate::config::LoggingConfig;
use crate::dispatch::AsyncDispatcher;
use crate::event::{LogLevel, LoggingEvent, MethodStatus};
use crate::sink::EventSink;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Level;

/// Replacement width when a masked value is not a string.
const MASK_WIDTH: usize = 6;

enum Route {
    /// Append in-line on the observing thread.
    Direct(Arc<dyn EventSink>),
    /// Hand off to the background writer task.
    Queued(AsyncDispatcher),
    /// No file sink configured.
    Disabled,
}

/// Receives finished events, emits them on the general `tracing` stream
/// per their level, and fans them out to the dedicated file sink.
///
/// `dispatch` and every helper below never raise to the caller: sink
/// failures are caught and reported on a fallback console stream so the
/// instrumented call is unaffected.
pub struct LoggingService {
    route: Route,
    config: Arc<LoggingConfig>,
}

impl LoggingService {
    /// Service with synchronous in-line fan-out.
    pub fn new(config: Arc<LoggingConfig>, sink: Option<Arc<dyn EventSink>>) -> Self {
        let route = match sink {
            Some(sink) => Route::Direct(sink),
            None => Route::Disabled,
        };
        LoggingService { route, config }
    }

    /// Service routing events through a bounded queue drained by a
    /// background task. Must be called inside a tokio runtime; the
    /// returned handle completes when the service is dropped and the
    /// queue has been drained.
    pub fn with_async_dispatch(
        config: Arc<LoggingConfig>,
        sink: Arc<dyn EventSink>,
    ) -> (Self, JoinHandle<()>) {
        let (dispatcher, handle) = AsyncDispatcher::spawn(sink, AsyncDispatcher::DEFAULT_QUEUE_DEPTH);
        (
            LoggingService {
                route: Route::Queued(dispatcher),
                config,
            },
            handle,
        )
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Route a finalized event: leveled general output plus file sink.
    pub fn dispatch(&self, event: LoggingEvent) {
        let call = event.call_id();
        let elapsed = event.execution_time_ms().unwrap_or(0);
        let status = event.status();

        match event.log_level {
            LogLevel::Debug => {
                if tracing::enabled!(Level::DEBUG) {
                    tracing::debug!(
                        "Method [{}] executed in {} ms with result: {} - Status: {}",
                        call,
                        elapsed,
                        format_value(event.result.as_ref()),
                        status
                    );
                }
            }
            LogLevel::Info => {
                if tracing::enabled!(Level::INFO) {
                    tracing::info!(
                        "Method [{}] executed in {} ms - Status: {}",
                        call,
                        elapsed,
                        status
                    );
                }
            }
            LogLevel::Warn => {
                tracing::warn!(
                    "Method [{}] executed in {} ms with result: {} - Status: {}",
                    call,
                    elapsed,
                    format_value(event.result.as_ref()),
                    status
                );
            }
            LogLevel::Error => {
                tracing::error!(
                    "Method [{}] executed in {} ms with result: {} - Status: {}",
                    call,
                    elapsed,
                    format_value(event.result.as_ref()),
                    status
                );
            }
        }

        if let Some(err) = &event.exception {
            tracing::error!("Exception in [{}]: {}", call, err);
        }

        self.forward(event, "complete_event");
    }

    /// Route an event produced by the broker-consumer wrapper.
    pub fn log_consumer_event(&self, event: LoggingEvent) {
        if tracing::enabled!(Level::INFO) {
            let context = event
                .message_context
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<no context>".to_string());
            tracing::info!(
                "Kafka message processed: {} in {} ms by [{}] - Status: {}",
                context,
                event.execution_time_ms().unwrap_or(0),
                event.call_id(),
                event.status()
            );
        }
        if tracing::enabled!(Level::DEBUG) {
            if let Some(context) = &event.message_context {
                tracing::debug!(
                    "Kafka message payload: {}",
                    format_value(context.payload.as_ref())
                );
            }
        }

        self.forward(event, "consumer_event");
    }

    pub fn log_method_entry(&self, class: &str, method: &str, args: Option<&[Value]>) {
        if tracing::enabled!(Level::DEBUG) {
            tracing::debug!(
                "Entering method [{}#{}] with arguments: {}",
                class,
                method,
                format_args_list(args)
            );
        }

        let mut event = LoggingEvent::new(class, method, LogLevel::Debug);
        event.arguments = args.map(<[Value]>::to_vec);
        self.forward(event, "method_entry");
    }

    pub fn log_method_exit(
        &self,
        class: &str,
        method: &str,
        result: Option<&Value>,
        elapsed_ms: u64,
        status: MethodStatus,
    ) {
        if tracing::enabled!(Level::DEBUG) {
            tracing::debug!(
                "Exiting method [{}#{}] with result: {} (execution time: {} ms, status: {})",
                class,
                method,
                format_value(result),
                elapsed_ms,
                status
            );
        }

        let mut event = LoggingEvent::new(class, method, LogLevel::Info);
        event.result = result.cloned();
        event.record_execution_time(elapsed_ms);
        match status {
            MethodStatus::Passed => event.pass(),
            MethodStatus::Failed => event.fail(),
            MethodStatus::InProgress => {}
        }
        self.forward(event, "method_exit");
    }

    pub fn log_method_status(
        &self,
        class: &str,
        method: &str,
        status: MethodStatus,
        message: &str,
    ) {
        if tracing::enabled!(Level::INFO) {
            tracing::info!("Method [{}#{}] status: {} - {}", class, method, status, message);
        }

        let mut event = LoggingEvent::new(class, method, LogLevel::Info);
        match status {
            MethodStatus::Passed => event.pass(),
            MethodStatus::Failed => event.fail(),
            MethodStatus::InProgress => {}
        }
        event.add_context("message", message);
        self.forward(event, "status_update");
    }

    /// Route a prebuilt failure event (from the exception router).
    pub fn log_failure_event(&self, event: LoggingEvent) {
        tracing::error!(
            "Exception in [{}]: {}",
            event.call_id(),
            event.exception.as_deref().unwrap_or("<unknown>")
        );
        self.forward(event, "exception");
    }

    pub fn log_exception(&self, class: &str, method: &str, error: &str, args: Option<&[Value]>) {
        tracing::error!(
            "Exception in [{}#{}] with arguments: {}: {}",
            class,
            method,
            format_args_list(args),
            error
        );

        let mut event = LoggingEvent::new(class, method, LogLevel::Error);
        event.arguments = args.map(<[Value]>::to_vec);
        event.record_exception(error);
        self.forward(event, "exception");
    }

    /// Copy captured values, masking configured sensitive fields.
    pub fn mask_captured(&self, values: &[Value]) -> Vec<Value> {
        let mut out = values.to_vec();
        if self.config.mask_sensitive_data && !self.config.sensitive_fields.is_empty() {
            for value in &mut out {
                mask_sensitive(value, &self.config.sensitive_fields, self.config.masking_char);
            }
        }
        out
    }

    fn forward(&self, mut event: LoggingEvent, action: &str) {
        event.add_context("action", action);
        match &self.route {
            Route::Direct(sink) => {
                if let Err(e) = sink.append(&event) {
                    eprintln!("kafka-method-log: file sink append failed: {e}");
                }
            }
            Route::Queued(dispatcher) => dispatcher.enqueue(event),
            Route::Disabled => {}
        }
    }
}

/// Recursively replace the values of sensitive fields inside a captured
/// JSON value. Field-name comparison is case-insensitive; string values
/// keep their length, anything else is replaced by a fixed-width mask.
pub fn mask_sensitive(value: &mut Value, fields: &[String], mask_char: char) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if fields.iter().any(|f| f.eq_ignore_ascii_case(key)) {
                    let width = val
                        .as_str()
                        .map(str::len)
                        .filter(|len| *len > 0)
                        .unwrap_or(MASK_WIDTH);
                    *val = Value::String(mask_char.to_string().repeat(width));
                } else {
                    mask_sensitive(val, fields, mask_char);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                mask_sensitive(item, fields, mask_char);
            }
        }
        _ => {}
    }
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_args_list(args: Option<&[Value]>) -> String {
    match args {
        None => "[]".to_string(),
        Some(values) => {
            let parts: Vec<String> = values.iter().map(|v| format_value(Some(v))).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{FailingSink, RecordingSink};
    use serde_json::json;

    fn service_with(sink: Arc<dyn EventSink>) -> LoggingService {
        LoggingService::new(Arc::new(LoggingConfig::default()), Some(sink))
    }

    #[test]
    fn dispatch_forwards_with_action_tag() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(sink.clone());

        let mut event = LoggingEvent::new("Service", "processOrder", LogLevel::Info);
        event.pass();
        event.record_execution_time(3);
        service.dispatch(event);

        let events = sink.take();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].additional_context.get("action").map(String::as_str),
            Some("complete_event")
        );
    }

    #[test]
    fn dispatch_swallows_sink_failures() {
        let service = service_with(Arc::new(FailingSink));
        let mut event = LoggingEvent::new("Service", "processOrder", LogLevel::Error);
        event.record_exception("boom");
        // Must not panic or propagate.
        service.dispatch(event);
    }

    #[test]
    fn no_sink_means_no_fanout() {
        let service = LoggingService::new(Arc::new(LoggingConfig::default()), None);
        service.dispatch(LoggingEvent::new("Service", "m", LogLevel::Info));
    }

    #[test]
    fn helper_events_carry_their_actions() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(sink.clone());

        service.log_method_entry("Service", "m", Some(&[json!(1)]));
        service.log_method_status("Service", "m", MethodStatus::InProgress, "started");
        service.log_method_exit("Service", "m", Some(&json!("done")), 7, MethodStatus::Passed);
        service.log_exception("Service", "m", "boom", None);

        let actions: Vec<String> = sink
            .take()
            .into_iter()
            .filter_map(|e| e.additional_context.get("action").cloned())
            .collect();
        assert_eq!(actions, vec!["method_entry", "status_update", "method_exit", "exception"]);
    }

    #[test]
    fn exit_event_preserves_status_and_timing() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(sink.clone());

        service.log_method_exit("Service", "m", None, 21, MethodStatus::Failed);
        let events = sink.take();
        assert_eq!(events[0].status(), MethodStatus::Failed);
        assert_eq!(events[0].execution_time_ms(), Some(21));
    }

    #[test]
    fn masking_follows_config() {
        let config = LoggingConfig {
            sensitive_fields: vec!["password".to_string()],
            ..LoggingConfig::default()
        };
        let service = LoggingService::new(Arc::new(config), None);

        let masked = service.mask_captured(&[json!({
            "user": "alice",
            "password": "hunter2",
            "nested": { "PASSWORD": "abc", "list": [{"password": 42}] }
        })]);

        assert_eq!(masked[0]["user"], json!("alice"));
        assert_eq!(masked[0]["password"], json!("*******"));
        assert_eq!(masked[0]["nested"]["PASSWORD"], json!("***"));
        assert_eq!(masked[0]["nested"]["list"][0]["password"], json!("******"));
    }

    #[test]
    fn masking_disabled_passes_through() {
        let config = LoggingConfig {
            mask_sensitive_data: false,
            sensitive_fields: vec!["password".to_string()],
            ..LoggingConfig::default()
        };
        let service = LoggingService::new(Arc::new(config), None);
        let masked = service.mask_captured(&[json!({"password": "hunter2"})]);
        assert_eq!(masked[0]["password"], json!("hunter2"));
    }

    #[test]
    fn consumer_event_forwarded_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(sink.clone());

        let mut event = LoggingEvent::new("Consumer", "processMessage", LogLevel::Info);
        event.pass();
        service.log_consumer_event(event);

        let events = sink.take();
        assert_eq!(
            events[0].additional_context.get("action").map(String::as_str),
            Some("consumer_event")
        );
    }
}
