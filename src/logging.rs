//! Logging setup for object-wiring
//!
//! The engine emits `tracing` events under the `object_wiring` target:
//! descriptor registration and construction at DEBUG, cache hits, property
//! assignments and null references at TRACE, eager initialization at INFO.
//! This module installs a `tracing-subscriber` to print them.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - JSON subscriber output
//! - `logging-pretty` - multi-line human readable output
//!
//! # Example
//!
//! ```rust,ignore
//! use object_wiring::logging;
//!
//! logging::builder()
//!     .verbose()
//!     .wiring_only()
//!     .compact()
//!     .init();
//! ```

use tracing::Level;

/// Target every engine event is emitted under.
pub const TARGET: &str = "object_wiring";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    /// Single-line output
    Compact,
}

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<String>,
    with_file: bool,
    with_line_number: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum level to print.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// TRACE: includes every cache hit and property assignment.
    pub fn verbose(self) -> Self {
        self.with_level(Level::TRACE)
    }

    /// INFO: only eager initialization summaries.
    pub fn quiet(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Only print events from `target`.
    pub fn with_target_filter(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Only print events from the wiring engine.
    pub fn wiring_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// `EnvFilter` directive for the configured level and target.
    pub fn directive(&self) -> String {
        let level = self.level.to_string().to_ascii_lowercase();
        match &self.target {
            Some(target) => format!("{}={}", target, level),
            None => level,
        }
    }

    /// Install the subscriber globally.
    ///
    /// Returns `false` when another subscriber is already installed.
    /// Without `logging-json` the JSON format falls back to the default
    /// text output.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

        let filter = EnvFilter::new(self.directive());
        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_target(true)
                .boxed(),
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => fmt::layer()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_target(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_target(true)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_target(true)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
            .is_ok()
    }

    /// No subscriber is available without `logging-json` or `logging-pretty`.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

/// Start configuring a subscriber.
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install the default subscriber: JSON with `logging-json`, otherwise
/// pretty output.
pub fn init() -> bool {
    if cfg!(feature = "logging-json") {
        builder().json().init()
    } else {
        builder().pretty().init()
    }
}

/// Install a subscriber that only prints wiring engine events.
pub fn init_wiring_only() -> bool {
    builder().wiring_only().init()
}
