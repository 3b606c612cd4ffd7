use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Global Tracing Subscriber Already Set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub struct TracerOptions {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: LevelFilter,
    /// Include the module path of each event in the output.
    pub with_target: bool,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::INFO,
            with_target: false,
        }
    }
}

/// Should be called at the start of each binary.
/// Installs the subscriber and announces the binary by name.
#[macro_export]
macro_rules! init_tracer {
    ($options:expr) => {{
        let tracer = $crate::TracerEngine::new($options);
        if tracer.is_ok() {
            tracing::info!("{} {} started", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));
        }
        tracer
    }};
}

/// Installs the stderr subscriber for a component.
/// The filter is read from `RUST_LOG`, falling back to `TracerOptions::default_level`.
pub struct TracerEngine;

impl TracerEngine {
    /// Initialises the stderr tracer for the calling binary.
    /// #Arguments
    /// * `options` - The caller-specified instance of TracerOptions.
    /// #Returns
    /// An instance of TracerEngine, or an error if a global subscriber is already installed.
    pub fn new(options: TracerOptions) -> Result<Self, TracerError> {
        let stderr_tracer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(options.with_target);

        let log_filter = EnvFilter::builder()
            .with_default_directive(options.default_level.into())
            .from_env_lossy();

        let subscriber =
            tracing_subscriber::Registry::default().with(stderr_tracer.with_filter(log_filter));

        tracing::subscriber::set_global_default(subscriber)?;

        Ok(Self)
    }
}
