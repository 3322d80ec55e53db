use crate::config::LoggingConfig;
use crate::context::{extract_message_context, ParamRole};
use crate::event::{LoggingEvent, LogLevel, MethodStatus};
use crate::selector::MethodSelector;
use crate::service::LoggingService;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Identity and declared shape of a wrappable call, supplied by the host
/// at registration time. Replaces runtime signature reflection.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// `package.Class.method`, the identity the selector matches against.
    pub qualified_name: String,
    /// Simple class name used in log lines.
    pub class_name: String,
    pub method_name: String,
    /// Declared roles of the call's parameters, in order.
    pub param_roles: Vec<ParamRole>,
    /// Static topic binding, when the call is declared against topics.
    pub topics: Vec<String>,
    /// True for broker message-handling entry points.
    pub message_handler: bool,
}

impl CallSite {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let (class_path, method) = match qualified_name.rsplit_once('.') {
            Some((class_path, method)) => (class_path, method),
            None => ("", qualified_name.as_str()),
        };
        let class_name = class_path.rsplit('.').next().unwrap_or("").to_string();
        let method_name = method.to_string();
        CallSite {
            qualified_name,
            class_name,
            method_name,
            param_roles: Vec::new(),
            topics: Vec::new(),
            message_handler: false,
        }
    }

    pub fn with_roles(mut self, roles: Vec<ParamRole>) -> Self {
        self.param_roles = roles;
        self
    }

    /// Declare the static topic binding; implies a message-handling
    /// entry point.
    pub fn with_topics<S: AsRef<str>>(mut self, topics: &[S]) -> Self {
        self.topics = topics.iter().map(|t| t.as_ref().to_string()).collect();
        self.message_handler = true;
        self
    }

    pub fn mark_message_handler(mut self) -> Self {
        self.message_handler = true;
        self
    }
}

/// Per-call capture options carried by an explicit marker.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub level: LogLevel,
    pub include_args: bool,
    pub include_result: bool,
    pub time_execution: bool,
    /// Free-text description used in status messages.
    pub description: String,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions {
            level: LogLevel::Info,
            include_args: true,
            include_result: true,
            time_execution: true,
            description: String::new(),
        }
    }
}

/// Startup-built table mapping call identity to capture options for
/// explicitly marked calls. Populated once, before any call is wrapped,
/// then read-only.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: BTreeMap<String, CaptureOptions>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        MarkerRegistry::default()
    }

    pub fn register(&mut self, qualified_name: impl Into<String>, options: CaptureOptions) {
        self.entries.insert(qualified_name.into(), options);
    }

    pub fn options(&self, qualified_name: &str) -> Option<&CaptureOptions> {
        self.entries.get(qualified_name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Behavior of one observed execution, resolved per wrapper variant.
struct ObservedOptions {
    level: LogLevel,
    include_args: bool,
    include_result: bool,
    time_execution: bool,
    description: Option<String>,
    /// Attach broker message context (consumer wrapper only).
    attach_context: bool,
    /// Emit Started/Completed/Failed status updates around the call.
    announce_status: bool,
    wrapper_tag: &'static str,
}

/// The interception layer: three wrapper variants over one execution
/// template.
///
/// All variants guarantee transparency: the wrapped call's return value
/// or error reaches the caller unchanged, with observation confined to
/// the side channel. An ineligible call is invoked with zero overhead
/// and no event is created.
pub struct Interceptor {
    service: Arc<LoggingService>,
    selector: Arc<MethodSelector>,
    markers: Arc<MarkerRegistry>,
    config: Arc<LoggingConfig>,
}

impl Interceptor {
    pub fn new(
        service: Arc<LoggingService>,
        selector: Arc<MethodSelector>,
        markers: Arc<MarkerRegistry>,
        config: Arc<LoggingConfig>,
    ) -> Self {
        Interceptor {
            service,
            selector,
            markers,
            config,
        }
    }

    pub fn service(&self) -> &Arc<LoggingService> {
        &self.service
    }

    /// Wrap a broker message-handling entry point. Always observes
    /// (ignores the method selector) and attaches the extracted message
    /// context.
    pub fn observe_consumer<T, E, F>(&self, site: &CallSite, args: &[Value], call: F) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.config.enabled {
            return call();
        }
        let options = ObservedOptions {
            level: self.config.log_level,
            include_args: true,
            include_result: true,
            time_execution: true,
            description: None,
            attach_context: true,
            announce_status: false,
            wrapper_tag: "consumer",
        };
        self.run_observed(site, args, options, call)
    }

    /// Wrap a call the caller has explicitly marked for observation.
    /// Eligibility comes solely from the marker registry; unmarked calls
    /// execute unchanged.
    pub fn observe_marked<T, E, F>(&self, site: &CallSite, args: &[Value], call: F) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.config.enabled {
            return call();
        }
        let marker = match self.markers.options(&site.qualified_name) {
            Some(marker) => marker.clone(),
            None => return call(),
        };
        let description = if marker.description.is_empty() {
            None
        } else {
            Some(marker.description)
        };
        let options = ObservedOptions {
            level: marker.level,
            include_args: marker.include_args,
            include_result: marker.include_result,
            time_execution: marker.time_execution,
            description,
            attach_context: false,
            announce_status: true,
            wrapper_tag: "marked",
        };
        self.run_observed(site, args, options, call)
    }

    /// Wrap any call in the interception scope, gated by the method
    /// selector. A non-observable call executes with zero overhead.
    pub fn observe<T, E, F>(&self, site: &CallSite, args: &[Value], call: F) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.config.enabled || !self.selector.is_observable(&site.qualified_name) {
            return call();
        }
        let options = ObservedOptions {
            level: self.config.log_level,
            include_args: true,
            include_result: true,
            time_execution: true,
            description: None,
            attach_context: false,
            announce_status: true,
            wrapper_tag: "selected",
        };
        self.run_observed(site, args, options, call)
    }

    /// The shared execution template. Finalization and dispatch happen on
    /// every exit path; a failing call's error is re-raised unchanged.
    fn run_observed<T, E, F>(
        &self,
        site: &CallSite,
        args: &[Value],
        options: ObservedOptions,
        call: F,
    ) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let mut event = LoggingEvent::new(&site.class_name, &site.method_name, options.level);
        event.add_context("wrapper", options.wrapper_tag);

        let captured_args = if options.include_args {
            Some(self.service.mask_captured(args))
        } else {
            None
        };
        event.arguments = captured_args.clone();
        if options.attach_context {
            event.message_context = Some(extract_message_context(
                &site.param_roles,
                &site.topics,
                args,
                self.config.include_payload,
            ));
        }

        self.service
            .log_method_entry(&site.class_name, &site.method_name, captured_args.as_deref());

        let description = options
            .description
            .clone()
            .unwrap_or_else(|| "Executing method".to_string());
        if options.announce_status {
            self.service.log_method_status(
                &site.class_name,
                &site.method_name,
                MethodStatus::InProgress,
                &format!("{description} - Started"),
            );
        }

        let started = Instant::now();
        let outcome = call();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(value) => {
                event.pass();
                if options.include_result {
                    event.result = serde_json::to_value(value).ok();
                }
            }
            Err(error) => {
                event.record_exception(error);
                if options.announce_status {
                    self.service.log_method_status(
                        &site.class_name,
                        &site.method_name,
                        MethodStatus::Failed,
                        &format!("{description} - Failed: {error}"),
                    );
                }
            }
        }

        if options.time_execution {
            event.record_execution_time(elapsed_ms);
        }

        let status = event.status();
        let result_snapshot = event.result.clone();
        if options.attach_context {
            self.service.log_consumer_event(event);
        } else {
            self.service.dispatch(event);
        }

        self.service.log_method_exit(
            &site.class_name,
            &site.method_name,
            result_snapshot.as_ref(),
            elapsed_ms,
            status,
        );
        if options.announce_status && status == MethodStatus::Passed {
            self.service.log_method_status(
                &site.class_name,
                &site.method_name,
                MethodStatus::Passed,
                &format!("{description} - Completed in {elapsed_ms} ms"),
            );
        }

        outcome
    }
}
