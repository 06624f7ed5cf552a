//! Client for an npm-compatible package registry.
//!
//! The registry exposes four document kinds the mirror cares about: the
//! per-version *manifest*, the per-package *packument*, the tarball binary,
//! and the search index used by the top-packages seed source. Missing
//! packages and missing versions are distinct failures (`E404` vs `ETARGET`
//! in the registry's error vocabulary) and drive different fallback paths.

use crate::http::HttpClient;
use bytes::Bytes;
use serde::Deserialize;
use snafu::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// The dist-tag the registry maintains for the current release of a package.
pub(crate) const LATEST_TAG: &str = "latest";

/// Largest page the search endpoint will serve.
pub(crate) const SEARCH_PAGE_LIMIT: usize = 250;

/// Hard cap on the number of results aggregated across search pages.
pub(crate) const SEARCH_TOTAL_LIMIT: usize = 5250;

/// Errors specific to registry operations
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Package '{name}' not found in the registry"))]
    PackageNotFound { name: String },

    #[snafu(display("Version {version} of '{name}' not found in the registry"))]
    VersionNotFound {
        name: String,
        version: String,
        dist_tags: DistTags,
    },

    #[snafu(display("Registry returned status {status} for {url}"))]
    Status { url: String, status: u16 },

    #[snafu(display("Failed to read registry response from {url}"))]
    Read { url: String, source: reqwest::Error },

    #[snafu(display("Failed to decode registry response from {url}: {source}"))]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[snafu(context(false), display("{source}"))]
    Transport { source: crate::http::Error },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Per-version registry metadata for a package.
///
/// Only the fields the resolver consumes are modeled; everything else in the
/// document is ignored. The four dependency maps are open string-keyed
/// objects mapping dependency name to range string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub dependencies: HashMap<String, String>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: HashMap<String, String>,
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: HashMap<String, String>,
    #[serde(rename = "optionalDependencies")]
    pub optional_dependencies: HashMap<String, String>,
}

/// Per-package registry metadata aggregating all versions and dist-tags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Packument {
    pub name: String,
    pub versions: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "dist-tags")]
    pub dist_tags: DistTags,
    /// Publication timestamps, keyed by version, when the registry provides them.
    pub time: BTreeMap<String, String>,
}

/// Named pointers to concrete versions, maintained by the registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DistTags {
    pub latest: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

/// One page of results from the `-/v1/search` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchPage {
    pub objects: Vec<SearchObject>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchObject {
    pub package: SearchPackage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchPackage {
    pub name: String,
    pub version: String,
}

/// Error document the registry returns alongside a 404 status.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    code: Option<String>,
    error: Option<String>,
    #[serde(rename = "distTags")]
    dist_tags: Option<DistTags>,
}

impl ErrorBody {
    /// True when the 404 means "package exists, requested version does not".
    fn is_version_miss(&self) -> bool {
        self.code.as_deref() == Some("ETARGET")
            || self.dist_tags.is_some()
            || self
                .error
                .as_deref()
                .is_some_and(|msg| msg.to_lowercase().contains("version not found"))
    }
}

/// Abstract interface to a package registry.
///
/// The trait abstraction allows for thorough testing and alternative
/// implementations (e.g., in-memory registries for tests).
pub trait PackageRegistry: Send + Sync {
    /// Fetch the manifest for an exact `version` (or dist-tag), without any
    /// fallback behavior.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] (carrying the registry's dist-tags
    /// payload) when the package exists but the version does not, and
    /// [`Error::PackageNotFound`] when the package itself is missing.
    fn fetch_manifest(&self, name: &str, version: &str) -> Result<Manifest>;

    /// Fetch the packument for `name`. No fallback; errors surface.
    fn packument(&self, name: &str) -> Result<Packument>;

    /// Fetch the tarball for an exact `(name, version)` as raw bytes.
    fn tarball(&self, name: &str, version: &str) -> Result<Bytes>;

    /// Fetch one page of the search index. `size` is clamped to the
    /// registry's page limit by implementations.
    fn search_page(&self, size: usize, from: usize) -> Result<SearchPage>;

    /// Fetch a manifest with the registry fallback contract applied.
    ///
    /// A missing version retries transparently with the `latest` version
    /// named in the error's dist-tags payload (or the literal `latest` tag
    /// when the payload carries none). A missing package retries once with
    /// `latest` if the original query was something else. All other errors
    /// surface unchanged.
    fn manifest(&self, name: &str, version: &str) -> Result<Manifest> {
        match self.fetch_manifest(name, version) {
            Ok(manifest) => Ok(manifest),
            Err(Error::VersionNotFound { dist_tags, .. }) => {
                let fallback = dist_tags
                    .latest
                    .unwrap_or_else(|| LATEST_TAG.to_string());
                tracing::debug!("{name}@{version} not in registry, falling back to {fallback}");
                self.fetch_manifest(name, &fallback)
            }
            Err(Error::PackageNotFound { .. }) if version != LATEST_TAG => {
                tracing::debug!("{name}@{version} not found, retrying with {LATEST_TAG}");
                self.fetch_manifest(name, LATEST_TAG)
            }
            Err(err) => Err(err),
        }
    }
}

/// [`PackageRegistry`] implementation backed by a real HTTP registry.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base: String,
    http: HttpClient,
}

impl HttpRegistry {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: &str, http_config: &crate::config::HttpConfig) -> crate::Result<Self> {
        url::Url::parse(base_url).context(crate::error::InvalidRegistryUrlSnafu {
            url: base_url.to_string(),
        })?;
        let http = HttpClient::new(http_config).context(crate::error::HttpSetupSnafu)?;

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Scoped names keep their `@` but URL-encode the scope separator:
    /// `@scope/pkg` becomes `@scope%2Fpkg` on the metadata endpoints.
    fn encode_name(name: &str) -> String {
        if name.starts_with('@') {
            name.replace('/', "%2F")
        } else {
            name.to_string()
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url)?;
        let status = response.status();
        ensure!(
            status.is_success(),
            StatusSnafu {
                url: url.to_string(),
                status: status.as_u16(),
            }
        );

        let text = response.text().context(ReadSnafu {
            url: url.to_string(),
        })?;
        serde_json::from_str(&text).context(DecodeSnafu {
            url: url.to_string(),
        })
    }
}

impl PackageRegistry for HttpRegistry {
    fn fetch_manifest(&self, name: &str, version: &str) -> Result<Manifest> {
        let url = format!("{}/{}/{}", self.base, Self::encode_name(name), version);
        let response = self.http.get(&url)?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            let body: ErrorBody = response
                .text()
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default();
            if body.is_version_miss() {
                return VersionNotFoundSnafu {
                    name: name.to_string(),
                    version: version.to_string(),
                    dist_tags: body.dist_tags.unwrap_or_default(),
                }
                .fail();
            }
            return PackageNotFoundSnafu {
                name: name.to_string(),
            }
            .fail();
        }

        ensure!(
            status.is_success(),
            StatusSnafu {
                url: url.clone(),
                status: status.as_u16(),
            }
        );

        let text = response.text().context(ReadSnafu { url: url.clone() })?;
        serde_json::from_str(&text).context(DecodeSnafu { url })
    }

    fn packument(&self, name: &str) -> Result<Packument> {
        let url = format!("{}/{}", self.base, Self::encode_name(name));
        let response = self.http.get(&url)?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return PackageNotFoundSnafu {
                name: name.to_string(),
            }
            .fail();
        }
        ensure!(
            status.is_success(),
            StatusSnafu {
                url: url.clone(),
                status: status.as_u16(),
            }
        );

        let text = response.text().context(ReadSnafu { url: url.clone() })?;
        serde_json::from_str(&text).context(DecodeSnafu { url })
    }

    fn tarball(&self, name: &str, version: &str) -> Result<Bytes> {
        // The conventional tarball path keeps the scoped name literal and
        // uses the unscoped basename in the file component.
        let basename = name.rsplit('/').next().unwrap_or(name);
        let url = format!("{}/{}/-/{}-{}.tgz", self.base, name, basename, version);

        let response = self.http.get(&url)?;
        let status = response.status();
        ensure!(
            status.is_success(),
            StatusSnafu {
                url: url.clone(),
                status: status.as_u16(),
            }
        );

        response.bytes().context(ReadSnafu { url })
    }

    fn search_page(&self, size: usize, from: usize) -> Result<SearchPage> {
        let size = size.min(SEARCH_PAGE_LIMIT);
        let url = format!("{}/-/v1/search?size={}&from={}", self.base, size, from);
        self.get_json(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_names_are_encoded() {
        assert_eq!(HttpRegistry::encode_name("@scope/foo"), "@scope%2Ffoo");
        assert_eq!(HttpRegistry::encode_name("left-pad"), "left-pad");
    }

    #[test]
    fn error_body_classifies_etarget_by_code() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"code": "ETARGET", "error": "target missing"}"#).unwrap();
        assert!(body.is_version_miss());
    }

    #[test]
    fn error_body_classifies_etarget_by_dist_tags() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"distTags": {"latest": "1.0.0"}}"#).unwrap();
        assert!(body.is_version_miss());
        assert_eq!(body.dist_tags.unwrap().latest.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn error_body_classifies_e404() {
        let body: ErrorBody = serde_json::from_str(r#"{"error": "Not found"}"#).unwrap();
        assert!(!body.is_version_miss());
    }

    #[test]
    fn dist_tags_capture_latest_and_extras() {
        let tags: DistTags =
            serde_json::from_str(r#"{"latest": "2.0.0", "next": "3.0.0-rc.1"}"#).unwrap();
        assert_eq!(tags.latest.as_deref(), Some("2.0.0"));
        assert_eq!(tags.other.get("next").map(String::as_str), Some("3.0.0-rc.1"));
    }

    #[test]
    fn manifest_tolerates_unknown_fields() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "name": "left-pad",
                "version": "1.3.0",
                "description": "pads left",
                "dependencies": {"a": "^1.0.0"},
                "devDependencies": {"b": "~2.0.0"},
                "dist": {"tarball": "https://example.com/x.tgz"}
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "left-pad");
        assert_eq!(manifest.dependencies.get("a").map(String::as_str), Some("^1.0.0"));
        assert_eq!(manifest.dev_dependencies.len(), 1);
        assert!(manifest.peer_dependencies.is_empty());
    }
}
