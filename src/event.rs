use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Broker header keys scanned when deriving a [`MessageContext`] from a
/// headers bag. These mirror the keys the consumer client attaches to
/// received records.
pub const HEADER_RECEIVED_TOPIC: &str = "kafka_receivedTopic";
pub const HEADER_RECEIVED_PARTITION: &str = "kafka_receivedPartitionId";
pub const HEADER_OFFSET: &str = "kafka_offset";
pub const HEADER_RECEIVED_KEY: &str = "kafka_receivedMessageKey";

/// Execution status of one observed method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodStatus {
    InProgress,
    Passed,
    Failed,
}

impl MethodStatus {
    /// Human-readable message used as the base of the file-sink line.
    pub fn message(&self) -> &'static str {
        match self {
            MethodStatus::InProgress => "Method execution in progress",
            MethodStatus::Passed => "Method executed successfully",
            MethodStatus::Failed => "Method execution failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MethodStatus::InProgress)
    }
}

impl fmt::Display for MethodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MethodStatus::InProgress => "IN_PROGRESS",
            MethodStatus::Passed => "PASSED",
            MethodStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Requested severity for an event, independent of its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Metadata of the broker message being processed by an observed call.
///
/// Constructed either from explicitly tagged parameters or derived from a
/// headers bag; see [`crate::context`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageContext {
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub key: Option<String>,
    pub payload: Option<Value>,
    /// Raw header bag as received, kept opaque.
    pub raw_headers: Option<BTreeMap<String, Value>>,
}

impl MessageContext {
    /// Build a context from a headers bag plus an already-selected payload.
    /// Broker-standard keys are pulled out of the bag; the bag itself is
    /// retained untouched in `raw_headers`.
    pub fn from_headers(headers: &BTreeMap<String, Value>, payload: Option<Value>) -> Self {
        let topic = headers
            .get(HEADER_RECEIVED_TOPIC)
            .and_then(Value::as_str)
            .map(str::to_string);
        let partition = headers
            .get(HEADER_RECEIVED_PARTITION)
            .and_then(Value::as_i64)
            .and_then(|p| i32::try_from(p).ok());
        let offset = headers.get(HEADER_OFFSET).and_then(Value::as_i64);
        let key = headers
            .get(HEADER_RECEIVED_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);

        MessageContext {
            topic,
            partition,
            offset,
            key,
            payload,
            raw_headers: Some(headers.clone()),
        }
    }
}

impl fmt::Display for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MessageContext{{topic='{}', partition={}, offset={}, key='{}'}}",
            self.topic.as_deref().unwrap_or(""),
            self.partition.map_or_else(|| "-".to_string(), |p| p.to_string()),
            self.offset.map_or_else(|| "-".to_string(), |o| o.to_string()),
            self.key.as_deref().unwrap_or(""),
        )
    }
}

/// The structured record of one observed method call.
///
/// Created at call entry by a wrapper, finalized exactly once after the
/// wrapped call returns or fails, then handed to the logging service and
/// discarded. Status never regresses from a terminal state and the
/// execution time is set at most once.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingEvent {
    pub class_name: String,
    pub method_name: String,
    pub arguments: Option<Vec<Value>>,
    pub result: Option<Value>,
    pub exception: Option<String>,
    status: MethodStatus,
    execution_time_ms: Option<u64>,
    pub log_level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message_context: Option<MessageContext>,
    pub additional_context: BTreeMap<String, String>,
}

impl LoggingEvent {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>, level: LogLevel) -> Self {
        LoggingEvent {
            class_name: class_name.into(),
            method_name: method_name.into(),
            arguments: None,
            result: None,
            exception: None,
            status: MethodStatus::InProgress,
            execution_time_ms: None,
            log_level: level,
            timestamp: Utc::now(),
            message_context: None,
            additional_context: BTreeMap::new(),
        }
    }

    pub fn status(&self) -> MethodStatus {
        self.status
    }

    /// Transition to `PASSED`. Ignored once a terminal state has been set.
    pub fn pass(&mut self) {
        if self.status == MethodStatus::InProgress {
            self.status = MethodStatus::Passed;
        }
    }

    /// Transition to `FAILED`. Ignored once a terminal state has been set.
    pub fn fail(&mut self) {
        if self.status == MethodStatus::InProgress {
            self.status = MethodStatus::Failed;
        }
    }

    /// Attach the failure cause and force the status to `FAILED`.
    /// Ignored once the event has already passed, so a terminal `PASSED`
    /// never carries an exception.
    pub fn record_exception(&mut self, error: impl fmt::Display) {
        if self.status == MethodStatus::Passed {
            return;
        }
        self.exception = Some(error.to_string());
        self.fail();
    }

    /// Record the elapsed wall time. Only the first call takes effect.
    pub fn record_execution_time(&mut self, elapsed_ms: u64) {
        if self.execution_time_ms.is_none() {
            self.execution_time_ms = Some(elapsed_ms);
        }
    }

    pub fn execution_time_ms(&self) -> Option<u64> {
        self.execution_time_ms
    }

    pub fn add_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.additional_context.insert(key.into(), value.into());
    }

    /// `Class#method` form used by log lines.
    pub fn call_id(&self) -> String {
        format!("{}#{}", self.class_name, self.method_name)
    }
}
