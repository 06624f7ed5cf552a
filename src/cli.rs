use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(name = "pkgmirror")]
#[command(about = "Mirror packages and their dependencies from an npm-compatible registry")]
#[command(version)]
#[non_exhaustive]
pub struct CliArgs {
    /// Packages to mirror, as NAME, NAME@RANGE, or @SCOPE/NAME@RANGE.
    ///
    /// Each package's transitive dependency graph is resolved against the
    /// registry and every resolved version is downloaded as a tarball.
    #[arg(value_name = "PACKAGE[@RANGE]",
        required_unless_present_any = ["manifest", "top"],
        conflicts_with_all = ["manifest", "top"])]
    pub packages: Vec<String>,

    /// Read root packages from a manifest file (JSON with a `dependencies` object)
    #[arg(long, value_name = "FILE", conflicts_with = "top")]
    pub manifest: Option<PathBuf>,

    /// Mirror the N most popular packages from the registry search index
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Directory tarballs are written into
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, value_name = "URL")]
    pub registry: Option<String>,

    /// Also resolve devDependencies
    #[arg(long)]
    pub dev: bool,

    /// Also resolve peerDependencies
    #[arg(long)]
    pub peer: bool,

    /// Also resolve optionalDependencies
    #[arg(long)]
    pub optional: bool,

    /// Download tarballs even when the cache records them from a prior run
    #[arg(long)]
    pub no_cache: bool,

    /// Bound on concurrent registry fetches
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Read configuration options from the given TOML file.
    ///
    /// By default, pkgmirror will look for a file in the current directory
    /// called `pkgmirror.toml`, if not found it will check the parent, and
    /// the grandparent, up to the root.
    ///
    /// It will also read a `pkgmirror.toml` file in the user's config
    /// directory, and it will read a system-level `pkgmirror.toml` at
    /// `/etc/pkgmirror.toml`, or the equivalent on other OSes.
    ///
    /// All config files' options are merged, with highest priority given to
    /// the file closest to the current directory. Specifying a config file
    /// with this option disables that logic, and reads the config only from
    /// the specified file.
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Use verbose output (-vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI args from the current process's command line into a `CliArgs` struct.
    ///
    /// This simply spares a caller from having to have the [`clap::Parser`] trait in scope.
    ///
    /// Be advised that this uses `clap` which will exit the process if the args are invalid or
    /// after printing `--help` output.
    pub fn parse_from_cli_args() -> Self {
        Self::parse()
    }

    /// Parse the CLI args from an arbitrary iterator of strings, useful for
    /// constructing [`CliArgs`] values for testing.
    #[cfg(test)]
    pub fn parse_from_test_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        // Prepend the name of the executable, as clap will be expecting.
        // No reason to make every test have to remember to do this
        let args = std::iter::once(std::ffi::OsString::from("pkgmirror"))
            .chain(args.into_iter().map(|s| s.into()));
        Self::parse_from(args)
    }

    /// The seed source implied by the arguments.
    pub fn root_spec(&self) -> crate::Result<crate::seeds::RootSpec> {
        use crate::seeds::{PackageSpec, RootSpec};

        if let Some(quantity) = self.top {
            return Ok(RootSpec::Top(quantity));
        }
        if let Some(path) = &self.manifest {
            return Ok(RootSpec::ManifestFile(path.clone()));
        }

        let specs = self
            .packages
            .iter()
            .map(|raw| PackageSpec::parse(raw))
            .collect::<crate::Result<Vec<_>>>()?;
        snafu::ensure!(!specs.is_empty(), crate::error::EmptyRootSpecSnafu);
        Ok(RootSpec::Packages(specs))
    }
}
