//! Transitive dependency resolution over a package registry.
//!
//! The resolver walks the dependency graph rooted at a manifest and flattens
//! it into a de-duplicated list of concrete `(name, version)` pairs. Sibling
//! edges of one manifest are fetched in parallel; manifests recurse
//! sequentially in arrival order, so every package is emitted strictly after
//! the parent that pulled it in. Duplicate and cyclic edges are suppressed
//! through the shared [`VisitedSet`].

use crate::{
    coerce::coerce,
    helpers::parallel_map,
    progress::ProgressSink,
    registry::{LATEST_TAG, Manifest, PackageRegistry},
    visited::VisitedSet,
};
use std::collections::HashMap;
use std::sync::Arc;

/// A fully resolved package: concrete name and version, plus whether that
/// version is the registry's current `latest`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub is_latest: bool,
}

impl ResolvedPackage {
    /// File name the mirrored tarball for this package is written under.
    ///
    /// `/` in scoped names is replaced with `-`, and the registry's current
    /// latest version carries a `-latest` marker: `@scope/foo` at `1.2.3`
    /// (latest) becomes `@scope-foo-1.2.3-latest.tgz`.
    pub fn tarball_filename(&self) -> String {
        let name = self.name.replace('/', "-");
        if self.is_latest {
            format!("{}-{}-latest.tgz", name, self.version)
        } else {
            format!("{}-{}.tgz", name, self.version)
        }
    }
}

/// Which dependency categories of a manifest participate in resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub include_dev: bool,
    pub include_peer: bool,
    pub include_optional: bool,
}

pub struct Resolver {
    registry: Arc<dyn PackageRegistry>,
    visited: Arc<VisitedSet>,
    options: ResolveOptions,
    concurrency: usize,
}

impl Resolver {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        visited: Arc<VisitedSet>,
        options: ResolveOptions,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            visited,
            options,
            concurrency,
        }
    }

    /// Resolve the transitive dependency graph rooted at `root` into a flat
    /// de-duplicated list.
    ///
    /// Parents appear before their descendants; the relative order among
    /// siblings follows fetch arrival and is not meaningful. Individual edge
    /// failures are logged and dropped rather than aborting the pass.
    ///
    /// `progress` advances by `1 / root_edge_count` each time a root edge's
    /// entire subtree has been expanded.
    pub fn resolve(&self, root: &Manifest, progress: &dyn ProgressSink) -> Vec<ResolvedPackage> {
        let edges = self.edges_of(root);
        let root_count = edges.len();
        let mut out = Vec::new();

        let mut completed = 0usize;
        for (_, fetch) in self.fetch_edges(edges) {
            if let Some((package, manifest)) = fetch {
                if self.visited.insert(&package.name, &package.version) {
                    out.push(package);
                    let aggregate = completed as f64 / root_count as f64;
                    self.walk(&manifest, 1, aggregate, &mut out);
                }
            }
            completed += 1;
            progress.resolve_progress(completed as f64 / root_count as f64);
        }

        out
    }

    /// Expand one manifest's dependency edges, recursing into each newly
    /// resolved child in arrival order.
    ///
    /// `aggregate` is the fraction of root edges already completed; inner
    /// completions report it without advancing it.
    fn walk(&self, manifest: &Manifest, depth: usize, aggregate: f64, out: &mut Vec<ResolvedPackage>) {
        let edges = self.edges_of(manifest);
        if edges.is_empty() {
            return;
        }

        for (_, fetch) in self.fetch_edges(edges) {
            let Some((package, child)) = fetch else {
                continue;
            };

            // Post-fetch dedup: the concrete version may differ from the
            // query version that survived the pre-fetch filter.
            if !self.visited.insert(&package.name, &package.version) {
                tracing::debug!("{}@{} already resolved, discarding", package.name, package.version);
                continue;
            }

            let name = package.name.clone();
            let version = package.version.clone();
            out.push(package);
            self.walk(&child, depth + 1, aggregate, out);
            tracing::debug!(
                depth,
                "resolved subtree of {name}@{version} ({:.0}% of roots complete)",
                aggregate * 100.0,
            );
        }
    }

    /// Compose the dependency edges of a manifest.
    ///
    /// Categories merge in a fixed order with later categories overwriting
    /// earlier ones on name collision: runtime, then dev, then peer, then
    /// optional.
    fn edges_of(&self, manifest: &Manifest) -> Vec<(String, String)> {
        let mut merged: HashMap<String, String> = manifest.dependencies.clone();
        if self.options.include_dev {
            merged.extend(manifest.dev_dependencies.clone());
        }
        if self.options.include_peer {
            merged.extend(manifest.peer_dependencies.clone());
        }
        if self.options.include_optional {
            merged.extend(manifest.optional_dependencies.clone());
        }
        merged.into_iter().collect()
    }

    /// Coerce each edge's range to a query version, drop edges already in
    /// the visited set, and fetch the survivors' manifests in parallel.
    ///
    /// The pre-fetch filter keys on the *query* version, so it is only an
    /// optimistic screen; the authoritative dedup happens on the concrete
    /// version after the fetch.
    fn fetch_edges(
        &self,
        edges: Vec<(String, String)>,
    ) -> Vec<(usize, Option<(ResolvedPackage, Manifest)>)> {
        let queries: Vec<(String, String)> = edges
            .into_iter()
            .map(|(name, range)| {
                let query = coerce(&range);
                (name, query)
            })
            .filter(|(name, query)| !self.visited.contains(name, query))
            .collect();

        parallel_map(queries, self.concurrency, |(name, query)| {
            self.fetch_edge(&name, &query)
        })
    }

    /// Fetch one edge's manifest and determine whether the resolved version
    /// is the registry's latest. Failures resolve to nothing.
    fn fetch_edge(&self, name: &str, query: &str) -> Option<(ResolvedPackage, Manifest)> {
        let manifest = match self.registry.manifest(name, query) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::warn!("Failed to resolve {name}@{query}: {err}");
                return None;
            }
        };

        let name = if manifest.name.is_empty() {
            name.to_string()
        } else {
            manifest.name.clone()
        };

        // A literal `latest` query answers the question by itself; anything
        // else needs the packument's dist-tags for comparison.
        let is_latest = if query == LATEST_TAG {
            true
        } else {
            self.version_is_latest(&name, &manifest.version)
        };

        let package = ResolvedPackage {
            name,
            version: manifest.version.clone(),
            is_latest,
        };
        Some((package, manifest))
    }

    fn version_is_latest(&self, name: &str, version: &str) -> bool {
        match self.registry.packument(name) {
            Ok(packument) => packument.dist_tags.latest.as_deref() == Some(version),
            Err(err) => {
                tracing::debug!("Could not fetch packument for {name}: {err}; assuming not latest");
                false
            }
        }
    }
}
