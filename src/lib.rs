mod cli;
mod coerce;
mod config;
mod downloader;
mod error;
mod helpers;
mod http;
mod logging;
mod pipeline;
mod progress;
mod registry;
mod resolver;
mod seeds;
mod tarball_cache;
#[cfg(test)]
mod testdata;
mod visited;

use std::sync::Arc;

pub use cli::CliArgs;
pub use config::{Config, DEFAULT_REGISTRY_URL, HttpConfig};
pub use downloader::{
    DEFAULT_CONCURRENCY, DownloadOptions, DownloadOutcome, DownloadReport, Downloader,
};
pub use error::{Error, Result};
pub use pipeline::{MirrorSummary, Pipeline};
pub use progress::{LogProgress, NullProgress, ProgressSink, Stage};
pub use registry::{DistTags, HttpRegistry, Manifest, PackageRegistry, Packument};
pub use resolver::{ResolveOptions, ResolvedPackage, Resolver};
pub use seeds::{PackageSpec, RootSpec, top_packages};
pub use tarball_cache::TarballCache;
pub use visited::VisitedSet;

/// Re-export of the snafu [`snafu::Report`] type so that callers can refer to this type without
/// taking an explicit snafu dep
pub use snafu::Report as SnafuReport;

/// Instance of the engine that powers the `pkgmirror` tool.
///
/// This is packaged this way so that our `main.rs` is as minimal as possible, and so the
/// mirroring pipeline can be embedded in other tools (e.g. a private registry's sync job)
/// without going through the CLI.
pub struct Mirror {
    pipeline: Pipeline,
}

impl Mirror {
    /// Create a new instance from a loaded configuration.
    ///
    /// The config should be loaded using `Config::load()` with the CLI args.
    pub fn new(config: &Config) -> Result<Self> {
        tracing::debug!("Using config: {:#?}", config);

        let registry: Arc<dyn PackageRegistry> =
            Arc::new(HttpRegistry::new(&config.registry_url, &config.http)?);
        let cache = Arc::new(TarballCache::open(&config.cache_dir));

        let pipeline = Pipeline::new(
            registry,
            cache,
            ResolveOptions {
                include_dev: config.include_dev,
                include_peer: config.include_peer,
                include_optional: config.include_optional,
            },
            config.concurrency,
        );

        Ok(Self { pipeline })
    }

    /// Run the mirroring pipeline for one root specification.
    pub fn run(
        &self,
        root: &RootSpec,
        options: &DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<MirrorSummary> {
        self.pipeline.run(root, options, progress)
    }
}

/// Main entry point for the `pkgmirror` engine.
///
/// Meant to be called from `main.rs` or other frontends.
#[snafu::report]
pub fn mirror_main() -> Result<()> {
    let args = CliArgs::parse_from_cli_args();

    // Initialize tracing early, before any other operations
    logging::init(&args);

    let config = Config::load(&args)?;
    let root = args.root_spec()?;

    let mirror = Mirror::new(&config)?;

    let options = DownloadOptions {
        use_cache: config.use_cache,
        destination: config.destination.clone(),
    };

    tracing::info!("Mirroring from {}", config.registry_url);
    let summary = mirror.run(&root, &options, &LogProgress)?;

    println!("{summary}");
    Ok(())
}
