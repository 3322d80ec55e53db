pub mod event;
pub mod pattern;
pub mod selector;
pub mod config;
pub mod context;
pub mod intercept;
pub mod service;
pub mod sink;
pub mod file_sink;
pub mod dispatch;
pub mod handler;
pub mod init;
pub mod noop_sink;

pub use config::LoggingConfig;
pub use event::{LogLevel, LoggingEvent, MessageContext, MethodStatus};
pub use init::{build, init_console, LoggingFramework};
pub use intercept::{CallSite, CaptureOptions, Interceptor, MarkerRegistry};
