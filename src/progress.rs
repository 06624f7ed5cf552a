//! Progress events emitted by the pipeline.
//!
//! The core never renders progress itself; it reports events to an injected
//! sink. The default sink forwards everything to `tracing`, so a frontend
//! that wants a real progress bar can substitute its own implementation
//! without touching the resolver or downloader.

/// Pipeline stages, numbered for the user-visible progress header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Top-packages seed acquisition; present only for top-N runs.
    Seeds,
    Resolve,
    Download,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::Seeds => 1,
            Stage::Resolve => 2,
            Stage::Download => 3,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Seeds => "Fetching top packages",
            Stage::Resolve => "Resolving dependencies",
            Stage::Download => "Downloading tarballs",
        }
    }
}

/// Sink for progress events from the resolver, downloader, and orchestrator.
pub trait ProgressSink: Send + Sync {
    /// A pipeline stage has begun.
    fn stage_started(&self, stage: Stage) {
        let _ = stage;
    }

    /// Fraction of root edges whose subtrees have fully resolved, in
    /// `0.0..=1.0`. Monotone within one resolve pass.
    fn resolve_progress(&self, fraction: f64) {
        let _ = fraction;
    }

    /// A download settled; `completed` of `total` scheduled downloads done.
    fn download_progress(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }
}

/// Default sink that reports through the `tracing` pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn stage_started(&self, stage: Stage) {
        tracing::info!("[{}/3] {}", stage.number(), stage.title());
    }

    fn resolve_progress(&self, fraction: f64) {
        tracing::info!("Resolving dependencies: {:.0}%", fraction * 100.0);
    }

    fn download_progress(&self, completed: usize, total: usize) {
        tracing::info!("Downloaded {completed}/{total} packages");
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}
