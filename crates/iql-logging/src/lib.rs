//! Structured logging for IQL routing simulations
//!
//! Every node of a simulation runs on the same thread, so log lines need to
//! say which node produced them. This crate wires a `tracing` subscriber
//! that writes JSON lines (or pretty text during development) and tags spans
//! with the node that is currently acting.
//!
//! # Features
//!
//! - **JSONL Output**: one JSON object per event, ready for `jq` (default)
//! - **Node Context**: [`NodeContextGuard`] marks the acting node and run
//! - **File Output**: single-file or daily/hourly rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use iql_logging::{IqlSubscriberBuilder, LogConfig};
//!
//! // JSONL to stdout
//! let _guard = IqlSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = IqlSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! flushed.

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{NodeContextData, NodeContextGuard};
pub use layers::{NodeContextExtension, NodeContextLayer, jsonl_layer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Subscriber stack every output layer sits on
type BaseSubscriber = Layered<NodeContextLayer, Layered<EnvFilter, Registry>>;

type OutputLayer = Box<dyn Layer<BaseSubscriber> + Send + Sync>;

/// Builder for configuring and initializing the logging subscriber
///
/// By default, console output uses JSONL format. Use
/// [`LogConfig::development()`] for human-readable output.
#[derive(Debug, Clone, Default)]
pub struct IqlSubscriberBuilder {
    config: LogConfig,
}

impl IqlSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration the subscriber will be built from
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally, reporting failures on stderr
    ///
    /// Returns the file writer's guard when file output is configured.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }

    /// Initialize the subscriber globally
    ///
    /// Fails if the log file cannot be created or a global subscriber is
    /// already set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut outputs: Vec<OutputLayer> = Vec::new();
        let console = &self.config.console;

        if console.enabled {
            if console.pretty {
                outputs.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(console.ansi)
                        .with_target(true)
                        .boxed(),
                );
            } else {
                outputs.push(
                    jsonl_layer::<BaseSubscriber, _>(&self.config.jsonl, std::io::stdout).boxed(),
                );
            }
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            outputs.push(jsonl_layer::<BaseSubscriber, _>(&self.config.jsonl, writer).boxed());
            guard = Some(file_guard);
        }

        Registry::default()
            .with(env_filter)
            .with(NodeContextLayer::new())
            .with(outputs)
            .try_init()?;

        Ok(guard)
    }
}

/// Open the writer for file output
///
/// `Never` truncates a single `<prefix>.jsonl`; the rotating strategies
/// append to dated files.
fn create_file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let writer = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            tracing_appender::non_blocking(File::create(path)?)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &config.directory,
            &config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &config.directory,
            &config.prefix,
        )),
    };

    Ok(writer)
}

/// Initialize with default configuration (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    IqlSubscriberBuilder::new().init()
}

/// Initialize for development (pretty console output, debug level)
pub fn init_development() -> Option<WorkerGuard> {
    IqlSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize for testing (warnings only)
pub fn init_testing() -> Option<WorkerGuard> {
    IqlSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init()
}
