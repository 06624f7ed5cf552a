use crate::{Result, cli::CliArgs, downloader::DEFAULT_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// The public registry used when no other base URL is configured.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Settings for the shared HTTP client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry attempts for transient failures (429, 5xx, connection errors).
    pub retries: usize,

    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,

    /// Proxy URL for all registry traffic (http, https, or socks5).
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
            proxy: None,
        }
    }
}

/// Intermediate structure for deserializing config files from TOML.
///
/// This matches the structure of pkgmirror.toml files and is used during the
/// deserialization process. Fields are then mapped to the final [`Config`]
/// struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "deserialize_optional_expanded_path")]
    pub cache_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "deserialize_optional_expanded_path")]
    pub destination: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_dev: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_peer: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_optional: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,
}

/// Custom deserializer for optional [`PathBuf`] that expands ~ to home directory.
fn deserialize_optional_expanded_path<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt_string: Option<String> = Option::deserialize(deserializer)?;
    match opt_string {
        None => Ok(None),
        Some(s) => {
            let expanded = shellexpand::tilde(&s);
            Ok(Some(PathBuf::from(expanded.as_ref())))
        }
    }
}

/// Configuration settings for pkgmirror.
///
/// Configuration is loaded from multiple sources in order of precedence
/// (later sources override earlier ones):
/// 1. Hard-coded defaults
/// 2. System-wide config file (`/etc/pkgmirror.toml` on Linux/macOS)
/// 3. User config file (`$XDG_CONFIG_HOME/pkgmirror/pkgmirror.toml` or platform equivalent)
/// 4. Directory hierarchy from filesystem root to current directory (each `pkgmirror.toml` found)
/// 5. Command-line arguments (highest priority)
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the registry to mirror from.
    pub registry_url: String,

    /// Directory holding the durable tarball cache index.
    pub cache_dir: PathBuf,

    /// Directory mirrored tarballs are written into.
    pub destination: PathBuf,

    pub include_dev: bool,
    pub include_peer: bool,
    pub include_optional: bool,

    /// Whether the tarball cache is consulted and updated.
    pub use_cache: bool,

    /// Bound on concurrent registry fetches.
    pub concurrency: usize,

    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            cache_dir: PathBuf::new(),
            destination: PathBuf::from("packages"),
            include_dev: false,
            include_peer: false,
            include_optional: false,
            use_cache: true,
            concurrency: DEFAULT_CONCURRENCY,
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Discover all config file locations in order of precedence.
    ///
    /// Returns paths from lowest to highest precedence. Later config files override earlier ones.
    ///
    /// The search order is:
    /// 1. System config: `/etc/pkgmirror.toml` on Unix, Windows equivalent
    /// 2. User config: `$XDG_CONFIG_HOME/pkgmirror/pkgmirror.toml` or platform equivalent
    /// 3. Directory hierarchy: All `pkgmirror.toml` files from filesystem root to current directory
    fn discover_config_files() -> Vec<PathBuf> {
        use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};

        let mut config_files = Vec::new();

        let strategy = choose_app_strategy(AppStrategyArgs {
            top_level_domain: "org".to_string(),
            author: "pkgmirror".to_string(),
            app_name: "pkgmirror".to_string(),
        })
        .unwrap();

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/pkgmirror.toml");
            if system_config.exists() {
                config_files.push(system_config);
            }
        }

        #[cfg(windows)]
        {
            if let Some(program_data) = std::env::var_os("ProgramData") {
                let system_config = PathBuf::from(program_data)
                    .join("pkgmirror")
                    .join("pkgmirror.toml");
                if system_config.exists() {
                    config_files.push(system_config);
                }
            }
        }

        let user_config = strategy.config_dir().join("pkgmirror.toml");
        if user_config.exists() {
            config_files.push(user_config);
        }

        if let Ok(current_dir) = std::env::current_dir() {
            let mut ancestors: Vec<PathBuf> =
                current_dir.ancestors().map(|p| p.to_path_buf()).collect();
            ancestors.reverse();

            for ancestor in ancestors {
                let config_file = ancestor.join("pkgmirror.toml");
                if config_file.exists() {
                    config_files.push(config_file);
                }
            }
        }

        config_files
    }

    /// Load the configuration, honoring config files and command line arguments.
    ///
    /// Configuration is loaded from multiple sources with the following precedence
    /// (later sources override earlier ones):
    /// 1. Hard-coded defaults
    /// 2. System-wide config file
    /// 3. User config file
    /// 4. Directory hierarchy config files (from root to current directory)
    /// 5. Command-line arguments (highest priority)
    ///
    /// When `--config-file` is given, only that file is read.
    pub fn load(args: &CliArgs) -> Result<Self> {
        use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };
        use snafu::ResultExt;

        let strategy = choose_app_strategy(AppStrategyArgs {
            top_level_domain: "org".to_string(),
            author: "pkgmirror".to_string(),
            app_name: "pkgmirror".to_string(),
        })
        .unwrap();

        let default_config = ConfigFile {
            registry_url: Some(DEFAULT_REGISTRY_URL.to_string()),
            use_cache: Some(true),
            concurrency: Some(DEFAULT_CONCURRENCY),
            http: Some(HttpConfig::default()),
            ..Default::default()
        };

        let mut figment = Figment::new().merge(Serialized::defaults(default_config));

        match &args.config_file {
            Some(config_file) => {
                figment = figment.merge(Toml::file(config_file));
            }
            None => {
                for config_file in Self::discover_config_files() {
                    figment = figment.merge(Toml::file(config_file));
                }
            }
        }

        let cli_overrides = ConfigFile {
            registry_url: args.registry.clone(),
            destination: args.dest.clone(),
            include_dev: args.dev.then_some(true),
            include_peer: args.peer.then_some(true),
            include_optional: args.optional.then_some(true),
            use_cache: args.no_cache.then_some(false),
            concurrency: args.concurrency,
            ..Default::default()
        };

        figment = figment.merge(Serialized::defaults(cli_overrides));

        let config_file: ConfigFile = figment.extract().context(crate::error::ConfigExtractSnafu)?;

        Ok(Self {
            registry_url: config_file
                .registry_url
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            cache_dir: config_file.cache_dir.unwrap_or_else(|| strategy.cache_dir()),
            destination: config_file
                .destination
                .unwrap_or_else(|| PathBuf::from("packages")),
            include_dev: config_file.include_dev.unwrap_or(false),
            include_peer: config_file.include_peer.unwrap_or(false),
            include_optional: config_file.include_optional.unwrap_or(false),
            use_cache: config_file.use_cache.unwrap_or(true),
            concurrency: config_file.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            http: config_file.http.unwrap_or_default(),
        })
    }
}
