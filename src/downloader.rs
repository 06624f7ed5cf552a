//! Bounded-concurrency tarball downloads into the destination directory.

use crate::{
    Error,
    error,
    helpers::parallel_map,
    progress::ProgressSink,
    registry::PackageRegistry,
    resolver::ResolvedPackage,
    tarball_cache::TarballCache,
};
use snafu::ResultExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default bound on concurrent tarball fetches.
pub const DEFAULT_CONCURRENCY: usize = 20;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Skip packages the tarball cache already records, and record new writes.
    pub use_cache: bool,
    /// Directory tarballs are written into. Must exist before the batch runs.
    pub destination: std::path::PathBuf,
}

/// Per-package settlement of a download batch.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Tarball written to the destination directory.
    Fulfilled(ResolvedPackage),
    /// Download or write failed; the batch continued without it.
    Rejected {
        package: ResolvedPackage,
        error: Error,
    },
}

/// Settlements of one download batch, plus the count of packages the cache
/// allowed the batch to skip entirely (those carry no settlement).
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub outcomes: Vec<DownloadOutcome>,
    pub cached: usize,
}

impl DownloadReport {
    pub fn fulfilled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, DownloadOutcome::Fulfilled(_)))
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.fulfilled()
    }
}

pub struct Downloader {
    registry: Arc<dyn PackageRegistry>,
    cache: Arc<TarballCache>,
    concurrency: usize,
}

impl Downloader {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        cache: Arc<TarballCache>,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            cache,
            concurrency,
        }
    }

    /// Download every package's tarball into the destination directory.
    ///
    /// Per-item failures are logged and reported as rejections; the batch
    /// always runs to completion. The cache is updated only after a
    /// successful write, so a failed item will be retried by the next run.
    pub fn download_all(
        &self,
        packages: Vec<ResolvedPackage>,
        options: &DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> DownloadReport {
        let (cached, to_fetch): (Vec<_>, Vec<_>) = if options.use_cache {
            packages
                .into_iter()
                .partition(|p| self.cache.exists(&p.name, &p.version))
        } else {
            (Vec::new(), packages)
        };

        for package in &cached {
            tracing::debug!("{}@{} already in cache, skipping", package.name, package.version);
        }

        let total = to_fetch.len();
        let completed = AtomicUsize::new(0);

        let outcomes = parallel_map(to_fetch, self.concurrency, |package| {
            let outcome = match self.fetch_one(&package, &options.destination) {
                Ok(()) => {
                    if options.use_cache {
                        self.cache.add(&package.name, &package.version);
                    }
                    DownloadOutcome::Fulfilled(package)
                }
                Err(err) => {
                    tracing::warn!(
                        "Failed to download {}@{}: {err}",
                        package.name,
                        package.version
                    );
                    DownloadOutcome::Rejected {
                        package,
                        error: err,
                    }
                }
            };

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            progress.download_progress(done, total);
            outcome
        })
        .into_iter()
        .map(|(_, outcome)| outcome)
        .collect();

        DownloadReport {
            outcomes,
            cached: cached.len(),
        }
    }

    fn fetch_one(&self, package: &ResolvedPackage, destination: &Path) -> crate::Result<()> {
        let bytes = self
            .registry
            .tarball(&package.name, &package.version)
            .context(error::TarballFetchSnafu {
                name: package.name.clone(),
                version: package.version.clone(),
            })?;

        let path = destination.join(package.tarball_filename());
        std::fs::write(&path, &bytes).context(error::TarballWriteSnafu { path: path.clone() })?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}
