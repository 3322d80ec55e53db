use crate::config::{ConfigError, LoggingConfig};
use crate::event::LogLevel;
use crate::file_sink::FileSink;
use crate::handler::ExceptionRouter;
use crate::intercept::{Interceptor, MarkerRegistry};
use crate::selector::MethodSelector;
use crate::service::LoggingService;
use crate::sink::EventSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Fully wired instrumentation: selector, logging service, interceptor
/// and exception router sharing one immutable configuration snapshot.
///
/// Built once at process start; all parts are safe to share across the
/// host's worker threads.
pub struct LoggingFramework {
    pub config: Arc<LoggingConfig>,
    pub selector: Arc<MethodSelector>,
    pub service: Arc<LoggingService>,
    pub interceptor: Interceptor,
    pub router: ExceptionRouter,
    /// Handle of the background writer task, present when `async_logging`
    /// is set and a file sink is configured. Completes once the framework
    /// is dropped and the queue drained.
    pub writer_task: Option<JoinHandle<()>>,
}

/// Assemble the framework. The dispatch mode follows the configuration:
/// by default events are appended to the file sink in-line on the
/// observing thread; with `async_logging` set they are handed to a
/// background writer task through a bounded channel instead, which
/// requires a running tokio runtime.
///
/// Only configuration problems fail the build; an unreachable log
/// directory is reported on first use without blocking calls.
pub fn build(config: LoggingConfig, markers: MarkerRegistry) -> Result<LoggingFramework, ConfigError> {
    let config = Arc::new(config);
    let (service, writer_task) = match file_sink(&config)? {
        Some(sink) if config.async_logging => {
            let (service, handle) = LoggingService::with_async_dispatch(config.clone(), sink);
            (Arc::new(service), Some(handle))
        }
        sink => (Arc::new(LoggingService::new(config.clone(), sink)), None),
    };
    Ok(assemble(config, service, markers, writer_task))
}

fn assemble(
    config: Arc<LoggingConfig>,
    service: Arc<LoggingService>,
    markers: MarkerRegistry,
    writer_task: Option<JoinHandle<()>>,
) -> LoggingFramework {
    let selector = Arc::new(MethodSelector::from_config(&config));
    let interceptor = Interceptor::new(
        service.clone(),
        selector.clone(),
        Arc::new(markers),
        config.clone(),
    );
    let router = ExceptionRouter::new(service.clone(), config.clone());
    LoggingFramework {
        config,
        selector,
        service,
        interceptor,
        router,
        writer_task,
    }
}

fn file_sink(config: &LoggingConfig) -> Result<Option<Arc<dyn EventSink>>, ConfigError> {
    if !config.enabled || !config.log_file.enabled {
        return Ok(None);
    }
    let sink = FileSink::new(&config.log_file)?;
    Ok(Some(Arc::new(sink)))
}

/// Install a global `tracing` subscriber printing the general log stream
/// to the console, capped at the given level. Typical hosts call this
/// once at startup before building the framework.
pub fn init_console(level: LogLevel) {
    let fmt_layer = tracing_subscriber::fmt::layer();
    let subscriber = Registry::default()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level.as_tracing()))
        .with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFileConfig;

    #[test]
    fn bad_max_size_fails_the_build() {
        let config = LoggingConfig {
            log_file: LogFileConfig {
                max_size: "huge".to_string(),
                ..LogFileConfig::default()
            },
            ..LoggingConfig::default()
        };
        assert!(build(config, MarkerRegistry::new()).is_err());
    }

    #[test]
    fn disabled_framework_builds_without_a_sink() {
        let config = LoggingConfig {
            enabled: false,
            ..LoggingConfig::default()
        };
        let framework = build(config, MarkerRegistry::new()).unwrap();
        assert!(!framework.config.enabled);
        assert!(framework.writer_task.is_none());
    }

    #[test]
    fn default_dispatch_is_inline() {
        let config = LoggingConfig {
            log_file: LogFileConfig {
                enabled: false,
                ..LogFileConfig::default()
            },
            ..LoggingConfig::default()
        };
        let framework = build(config, MarkerRegistry::new()).unwrap();
        assert!(framework.writer_task.is_none());
    }

    #[tokio::test]
    async fn async_flag_without_sink_has_no_task() {
        let config = LoggingConfig {
            async_logging: true,
            log_file: LogFileConfig {
                enabled: false,
                ..LogFileConfig::default()
            },
            ..LoggingConfig::default()
        };
        let framework = build(config, MarkerRegistry::new()).unwrap();
        assert!(framework.writer_task.is_none());
    }

    #[tokio::test]
    async fn async_flag_spawns_writer_task() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LoggingConfig {
            async_logging: true,
            log_file: LogFileConfig {
                path: dir.path().to_path_buf(),
                ..LogFileConfig::default()
            },
            ..LoggingConfig::default()
        };
        let mut framework = build(config, MarkerRegistry::new()).unwrap();
        let handle = framework.writer_task.take().expect("writer task");
        drop(framework);
        handle.await.unwrap();
    }
}
