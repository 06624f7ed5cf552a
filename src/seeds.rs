//! Seed sources: where the root packages of a mirroring run come from.
//!
//! All three sources reduce to the same thing before resolution starts: a
//! synthetic root manifest whose dependency map names the wanted packages.

use crate::{
    Result, error,
    registry::{LATEST_TAG, Manifest, PackageRegistry, SEARCH_PAGE_LIMIT, SEARCH_TOTAL_LIMIT},
};
use snafu::prelude::*;
use std::path::{Path, PathBuf};

/// One root package requested on the command line: `name`, `name@range`, or
/// `@scope/name@range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub range: String,
}

impl PackageSpec {
    /// Parse a raw spec, splitting on the last `@`.
    ///
    /// The leading `@` of a scoped name never counts as a separator, so
    /// `@scope/name` is a bare name. A missing or empty range means `latest`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (name, range) = match raw.rfind('@') {
            Some(0) | None => (raw, ""),
            Some(idx) => (&raw[..idx], &raw[idx + 1..]),
        };

        ensure!(
            !name.is_empty(),
            error::EmptyPackageNameSnafu {
                spec: raw.to_string(),
            }
        );

        let range = if range.is_empty() { LATEST_TAG } else { range };
        Ok(Self {
            name: name.to_string(),
            range: range.to_string(),
        })
    }
}

/// Where the root set of packages comes from.
#[derive(Debug, Clone)]
pub enum RootSpec {
    /// Explicit package specs from the command line.
    Packages(Vec<PackageSpec>),
    /// A manifest file whose dependency maps seed the walk.
    ManifestFile(PathBuf),
    /// The N most popular packages according to the registry search index.
    Top(usize),
}

impl RootSpec {
    /// Materialize the seed source into a synthetic root manifest.
    ///
    /// Only the top-N variant touches the registry; the other two are local.
    ///
    /// # Errors
    ///
    /// Bad input is fatal here: an empty package list, a missing manifest
    /// file, or a manifest without a `dependencies` object all abort the run
    /// before any resolution starts.
    pub fn into_root_manifest(&self, registry: &dyn PackageRegistry) -> Result<Manifest> {
        match self {
            RootSpec::Packages(specs) => {
                ensure!(!specs.is_empty(), error::EmptyRootSpecSnafu);
                Ok(Manifest {
                    dependencies: specs
                        .iter()
                        .map(|spec| (spec.name.clone(), spec.range.clone()))
                        .collect(),
                    ..Default::default()
                })
            }
            RootSpec::ManifestFile(path) => load_manifest_file(path),
            RootSpec::Top(quantity) => {
                let seeds = top_packages(registry, *quantity)?;
                Ok(Manifest {
                    dependencies: seeds.into_iter().collect(),
                    ..Default::default()
                })
            }
        }
    }
}

/// Load a root manifest from a JSON file.
///
/// The file must carry a `dependencies` object; everything else is optional.
fn load_manifest_file(path: &Path) -> Result<Manifest> {
    ensure!(
        path.exists(),
        error::ManifestFileMissingSnafu {
            path: path.to_path_buf(),
        }
    );

    let text = std::fs::read_to_string(path).context(error::ManifestFileReadSnafu {
        path: path.to_path_buf(),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).context(error::ManifestFileParseSnafu {
            path: path.to_path_buf(),
        })?;

    ensure!(
        value.get("dependencies").is_some_and(|deps| deps.is_object()),
        error::ManifestMissingDependenciesSnafu {
            path: path.to_path_buf(),
        }
    );

    serde_json::from_value(value).context(error::ManifestFileParseSnafu {
        path: path.to_path_buf(),
    })
}

/// Fetch the `quantity` most popular package coordinates from the registry's
/// search index.
///
/// Pages are at most 250 items and the aggregate is hard-capped at 5250;
/// paging stops early when the registry reports fewer total results.
pub fn top_packages(
    registry: &dyn PackageRegistry,
    quantity: usize,
) -> Result<Vec<(String, String)>> {
    let wanted = quantity.min(SEARCH_TOTAL_LIMIT);
    let mut seeds: Vec<(String, String)> = Vec::with_capacity(wanted);

    while seeds.len() < wanted {
        let size = (wanted - seeds.len()).min(SEARCH_PAGE_LIMIT);
        let page = registry
            .search_page(size, seeds.len())
            .context(error::TopPackagesSnafu)?;
        if page.objects.is_empty() {
            break;
        }

        let total = page.total as usize;
        for object in page.objects {
            seeds.push((object.package.name, object.package.version));
            if seeds.len() >= wanted {
                break;
            }
        }
        if seeds.len() >= total {
            break;
        }
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testdata::FakeRegistry;
    use assert_matches::assert_matches;

    mod package_spec {
        use super::*;

        #[test]
        fn bare_name_defaults_to_latest() {
            let spec = PackageSpec::parse("left-pad").unwrap();
            assert_eq!(spec.name, "left-pad");
            assert_eq!(spec.range, "latest");
        }

        #[test]
        fn name_with_range() {
            let spec = PackageSpec::parse("left-pad@^1.3.0").unwrap();
            assert_eq!(spec.name, "left-pad");
            assert_eq!(spec.range, "^1.3.0");
        }

        #[test]
        fn scoped_name_without_range() {
            let spec = PackageSpec::parse("@scope/pkg").unwrap();
            assert_eq!(spec.name, "@scope/pkg");
            assert_eq!(spec.range, "latest");
        }

        #[test]
        fn scoped_name_with_range() {
            let spec = PackageSpec::parse("@scope/pkg@1.2.3").unwrap();
            assert_eq!(spec.name, "@scope/pkg");
            assert_eq!(spec.range, "1.2.3");
        }

        #[test]
        fn trailing_at_means_latest() {
            let spec = PackageSpec::parse("left-pad@").unwrap();
            assert_eq!(spec.range, "latest");
        }

        #[test]
        fn empty_name_is_rejected() {
            assert_matches!(PackageSpec::parse(""), Err(Error::EmptyPackageName { .. }));
            assert_matches!(PackageSpec::parse("   "), Err(Error::EmptyPackageName { .. }));
        }

        #[test]
        fn lone_scope_marker_is_a_name_not_a_separator() {
            // `@1.2.3` has its only `@` at position zero, so the whole thing
            // is a (bogus) package name the registry will later 404 on.
            let spec = PackageSpec::parse("@1.2.3").unwrap();
            assert_eq!(spec.name, "@1.2.3");
            assert_eq!(spec.range, "latest");
        }
    }

    mod manifest_file {
        use super::*;

        #[test]
        fn loads_dependency_maps() {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = temp_dir.path().join("package.json");
            std::fs::write(
                &path,
                r#"{
                    "name": "my-app",
                    "dependencies": {"left-pad": "^1.3.0"},
                    "devDependencies": {"jest": "~29.0.0"}
                }"#,
            )
            .unwrap();

            let manifest = load_manifest_file(&path).unwrap();
            assert_eq!(
                manifest.dependencies.get("left-pad").map(String::as_str),
                Some("^1.3.0")
            );
            assert_eq!(manifest.dev_dependencies.len(), 1);
        }

        #[test]
        fn missing_file_is_fatal() {
            assert_matches!(
                load_manifest_file(Path::new("/definitely/not/here.json")),
                Err(Error::ManifestFileMissing { .. })
            );
        }

        #[test]
        fn missing_dependencies_field_is_fatal() {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = temp_dir.path().join("package.json");
            std::fs::write(&path, r#"{"name": "my-app"}"#).unwrap();

            assert_matches!(
                load_manifest_file(&path),
                Err(Error::ManifestMissingDependencies { .. })
            );
        }

        #[test]
        fn invalid_json_is_fatal() {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = temp_dir.path().join("package.json");
            std::fs::write(&path, "{nope").unwrap();

            assert_matches!(
                load_manifest_file(&path),
                Err(Error::ManifestFileParse { .. })
            );
        }
    }

    mod top {
        use super::*;

        #[test]
        fn quantity_is_clamped_to_the_hard_cap() {
            let registry = FakeRegistry::with_search_population(10_000);
            let seeds = top_packages(&registry, 5300).unwrap();
            assert_eq!(seeds.len(), SEARCH_TOTAL_LIMIT);
        }

        #[test]
        fn pages_are_at_most_250_items() {
            let registry = FakeRegistry::with_search_population(10_000);
            top_packages(&registry, 251).unwrap();

            let sizes = registry.search_sizes.lock().unwrap().clone();
            assert_eq!(sizes, vec![250, 1]);
        }

        #[test]
        fn stops_when_the_registry_runs_out() {
            let registry = FakeRegistry::with_search_population(30);
            let seeds = top_packages(&registry, 100).unwrap();
            assert_eq!(seeds.len(), 30);
        }

        #[test]
        fn versions_are_concrete() {
            let registry = FakeRegistry::with_search_population(5);
            let seeds = top_packages(&registry, 5).unwrap();
            for (_, version) in seeds {
                assert!(semver::Version::parse(&version).is_ok());
            }
        }
    }

    mod root_spec {
        use super::*;

        #[test]
        fn explicit_packages_become_dependency_edges() {
            let registry = FakeRegistry::new();
            let root = RootSpec::Packages(vec![
                PackageSpec::parse("a@1.0.0").unwrap(),
                PackageSpec::parse("b").unwrap(),
            ]);

            let manifest = root.into_root_manifest(&registry).unwrap();
            assert_eq!(manifest.dependencies.get("a").map(String::as_str), Some("1.0.0"));
            assert_eq!(manifest.dependencies.get("b").map(String::as_str), Some("latest"));
        }

        #[test]
        fn empty_package_list_is_fatal() {
            let registry = FakeRegistry::new();
            assert_matches!(
                RootSpec::Packages(vec![]).into_root_manifest(&registry),
                Err(Error::EmptyRootSpec)
            );
        }
    }
}
