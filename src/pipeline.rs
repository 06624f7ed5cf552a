//! Stage orchestration: seeds → resolve → download.
//!
//! The orchestrator is the strict boundary of the system. Everything below
//! it degrades per-edge or per-item; here, bad input (a missing manifest
//! file, an empty seed list) is fatal, stage transitions are explicit, and
//! every run ends with a summary.

use crate::{
    Result, error,
    downloader::{DownloadOptions, Downloader},
    progress::{ProgressSink, Stage},
    registry::PackageRegistry,
    resolver::{ResolveOptions, Resolver},
    seeds::RootSpec,
    tarball_cache::TarballCache,
    visited::VisitedSet,
};
use snafu::ResultExt;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Aggregate counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub resolved: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub failed: usize,
}

impl fmt::Display for MirrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.downloaded == 0 && self.cached == 0 {
            return write!(f, "No packages fetched");
        }
        write!(
            f,
            "{} package(s) resolved: {} downloaded, {} already in cache, {} failed",
            self.resolved, self.downloaded, self.cached, self.failed
        )
    }
}

pub struct Pipeline {
    registry: Arc<dyn PackageRegistry>,
    visited: Arc<VisitedSet>,
    cache: Arc<TarballCache>,
    resolver: Resolver,
    downloader: Downloader,
}

impl Pipeline {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        cache: Arc<TarballCache>,
        options: ResolveOptions,
        concurrency: usize,
    ) -> Self {
        let visited = Arc::new(VisitedSet::new());
        let resolver = Resolver::new(
            registry.clone(),
            visited.clone(),
            options,
            concurrency,
        );
        let downloader = Downloader::new(registry.clone(), cache.clone(), concurrency);

        Self {
            registry,
            visited,
            cache,
            resolver,
            downloader,
        }
    }

    /// Run the full mirroring pipeline for one root specification.
    ///
    /// The visited set is cleared at the start and the tarball cache is
    /// flushed at the end, so the pipeline can be invoked repeatedly on one
    /// instance.
    pub fn run(
        &self,
        root: &RootSpec,
        options: &DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<MirrorSummary> {
        if matches!(root, RootSpec::Top(_)) {
            progress.stage_started(Stage::Seeds);
        }
        let root_manifest = root.into_root_manifest(self.registry.as_ref())?;

        progress.stage_started(Stage::Resolve);
        self.visited.reset();
        let resolved = self.resolver.resolve(&root_manifest, progress);
        tracing::info!("Resolved {} package(s)", resolved.len());

        progress.stage_started(Stage::Download);
        std::fs::create_dir_all(&options.destination).context(
            error::CreateDestinationSnafu {
                path: options.destination.clone(),
            },
        )?;

        let resolved_count = resolved.len();
        let report = self.downloader.download_all(resolved, options, progress);

        let summary = MirrorSummary {
            resolved: resolved_count,
            downloaded: report.fulfilled(),
            cached: report.cached,
            failed: report.rejected(),
        };

        if summary.downloaded == 0 {
            remove_dir_if_empty(&options.destination);
        }
        if summary.downloaded == 0 && summary.cached == 0 {
            tracing::info!("No packages fetched");
        }

        self.cache.flush()?;
        Ok(summary)
    }
}

/// Remove `path` iff it is an empty directory; anything else is left alone.
fn remove_dir_if_empty(path: &Path) {
    if let Ok(mut entries) = std::fs::read_dir(path) {
        if entries.next().is_none() {
            let _ = std::fs::remove_dir(path);
        }
    }
}
