use snafu::prelude::*;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Manifest file not found: {}", path.display()))]
    ManifestFileMissing { path: PathBuf },

    #[snafu(display("Failed to read manifest file {}: {source}", path.display()))]
    ManifestFileRead { path: PathBuf, source: std::io::Error },

    #[snafu(display("Manifest file {} is not valid JSON: {source}", path.display()))]
    ManifestFileParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Manifest file {} has no `dependencies` object", path.display()))]
    ManifestMissingDependencies { path: PathBuf },

    #[snafu(display("No root packages specified"))]
    EmptyRootSpec,

    #[snafu(display("Invalid package spec '{spec}': package name is empty"))]
    EmptyPackageName { spec: String },

    #[snafu(display("Invalid registry URL '{url}': {source}"))]
    InvalidRegistryUrl { url: String, source: url::ParseError },

    #[snafu(display("Failed to set up the HTTP client"))]
    HttpSetup { source: crate::http::Error },

    #[snafu(display("Failed to fetch the top packages listing"))]
    TopPackages { source: crate::registry::Error },

    #[snafu(display("Failed to create destination directory {}: {source}", path.display()))]
    CreateDestination { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to download tarball for {name}@{version}"))]
    TarballFetch {
        name: String,
        version: String,
        source: crate::registry::Error,
    },

    #[snafu(display("Failed to write tarball {}: {source}", path.display()))]
    TarballWrite { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to encode the tarball cache index"))]
    CacheEncode { source: serde_json::Error },

    #[snafu(display("Failed to write tarball cache index {}: {source}", path.display()))]
    CacheFlush { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to extract configuration: {source}"))]
    ConfigExtract { source: figment::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
