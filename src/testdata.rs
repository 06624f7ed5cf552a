//! In-memory registry double shared by tests across modules.

use crate::registry::{
    DistTags, Error, Manifest, PackageRegistry, Packument, Result, SEARCH_PAGE_LIMIT, SearchObject,
    SearchPackage, SearchPage,
};
use bytes::Bytes;
use semver::Version;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct FakePackage {
    versions: BTreeMap<String, Manifest>,
    latest: Option<String>,
}

/// An in-memory [`PackageRegistry`] with call counters and failure
/// injection, so tests can assert on traffic as well as results.
#[derive(Debug, Default)]
pub(crate) struct FakeRegistry {
    packages: HashMap<String, FakePackage>,
    search_population: usize,
    fail_packuments: HashSet<String>,
    fail_tarballs: HashSet<(String, String)>,
    pub(crate) manifest_calls: AtomicUsize,
    pub(crate) packument_calls: AtomicUsize,
    pub(crate) tarball_calls: AtomicUsize,
    pub(crate) search_sizes: Mutex<Vec<usize>>,
}

impl FakeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A registry whose search index reports `population` packages named
    /// `popular-0`, `popular-1`, ... all at version `1.0.0`.
    pub(crate) fn with_search_population(population: usize) -> Self {
        Self {
            search_population: population,
            ..Self::default()
        }
    }

    /// Register a package version with the given runtime dependency map.
    ///
    /// The `latest` dist-tag tracks the highest version published so far.
    pub(crate) fn publish(&mut self, name: &str, version: &str, dependencies: &[(&str, &str)]) {
        self.publish_manifest(Manifest {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: dependencies
                .iter()
                .map(|(dep, range)| (dep.to_string(), range.to_string()))
                .collect(),
            ..Default::default()
        });
    }

    /// Register a fully specified manifest (for dev/peer/optional cases).
    pub(crate) fn publish_manifest(&mut self, manifest: Manifest) {
        let package = self.packages.entry(manifest.name.clone()).or_default();

        let newer = match &package.latest {
            Some(current) => Version::parse(&manifest.version)
                .ok()
                .zip(Version::parse(current).ok())
                .is_some_and(|(candidate, current)| candidate > current),
            None => true,
        };
        if newer {
            package.latest = Some(manifest.version.clone());
        }

        package.versions.insert(manifest.version.clone(), manifest);
    }

    /// Make every packument fetch for `name` fail with a server error.
    pub(crate) fn fail_packument(&mut self, name: &str) {
        self.fail_packuments.insert(name.to_string());
    }

    /// Make the tarball fetch for `(name, version)` fail with a server error.
    pub(crate) fn fail_tarball(&mut self, name: &str, version: &str) {
        self.fail_tarballs
            .insert((name.to_string(), version.to_string()));
    }

    fn server_error(url: &str) -> Error {
        Error::Status {
            url: url.to_string(),
            status: 500,
        }
    }
}

impl PackageRegistry for FakeRegistry {
    fn fetch_manifest(&self, name: &str, version: &str) -> Result<Manifest> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);

        let package = self.packages.get(name).ok_or_else(|| Error::PackageNotFound {
            name: name.to_string(),
        })?;

        let concrete = if version == "latest" {
            package.latest.clone().ok_or_else(|| Error::PackageNotFound {
                name: name.to_string(),
            })?
        } else {
            version.to_string()
        };

        package
            .versions
            .get(&concrete)
            .cloned()
            .ok_or_else(|| Error::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
                dist_tags: DistTags {
                    latest: package.latest.clone(),
                    other: BTreeMap::new(),
                },
            })
    }

    fn packument(&self, name: &str) -> Result<Packument> {
        self.packument_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_packuments.contains(name) {
            return Err(Self::server_error(&format!("fake:///{name}")));
        }

        let package = self.packages.get(name).ok_or_else(|| Error::PackageNotFound {
            name: name.to_string(),
        })?;

        Ok(Packument {
            name: name.to_string(),
            versions: package
                .versions
                .keys()
                .map(|version| (version.clone(), serde_json::json!({})))
                .collect(),
            dist_tags: DistTags {
                latest: package.latest.clone(),
                other: BTreeMap::new(),
            },
            time: BTreeMap::new(),
        })
    }

    fn tarball(&self, name: &str, version: &str) -> Result<Bytes> {
        self.tarball_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_tarballs
            .contains(&(name.to_string(), version.to_string()))
        {
            return Err(Self::server_error(&format!("fake:///{name}/-/{version}.tgz")));
        }

        let known = self
            .packages
            .get(name)
            .is_some_and(|package| package.versions.contains_key(version));
        if !known {
            return Err(Error::PackageNotFound {
                name: name.to_string(),
            });
        }

        Ok(Bytes::from(format!("tarball of {name}@{version}")))
    }

    fn search_page(&self, size: usize, from: usize) -> Result<SearchPage> {
        let size = size.min(SEARCH_PAGE_LIMIT);
        self.search_sizes.lock().unwrap().push(size);

        let objects = (from..self.search_population.min(from + size))
            .map(|index| SearchObject {
                package: SearchPackage {
                    name: format!("popular-{index}"),
                    version: "1.0.0".to_string(),
                },
            })
            .collect();

        Ok(SearchPage {
            objects,
            total: self.search_population as u64,
        })
    }
}
