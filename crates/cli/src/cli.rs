use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Manifest-driven build and test gating for firmware apps.
///
/// Reads folder-rule manifests, decides per app and target whether it is
/// disabled, skipped or should build, and tracks rule digests between
/// revisions.
#[derive(Parser, Debug)]
#[command(name = "appgate", about = "Decide which firmware apps CI builds and tests")]
pub struct CliArgs {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify apps and print one JSON record per selected app
    Check(CheckArgs),
    /// Print a `folder:digest` line for every rule
    DumpSha(DumpShaArgs),
    /// List rule folders whose digest differs from a stored listing
    DiffSha(DiffShaArgs),
}

/// Manifest source, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Manifest files, applied in order (default: APPGATE_MANIFEST_FILES)
    #[arg(short = 'm', long = "manifest-file")]
    pub manifest_files: Vec<PathBuf>,

    /// Root relative rule folders are resolved against (default: APPGATE_MANIFEST_ROOT)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Fail when a rule names a folder that does not exist
    #[arg(long)]
    pub check_manifest_rules: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Apps as `folder` or `folder:config_name`
    #[arg(required = true)]
    pub apps: Vec<String>,

    /// Targets to check; `all` expands to every known target
    #[arg(short, long = "target", default_value = "all")]
    pub targets: Vec<String>,

    /// YAML capability table: `target: {NAME: value}`
    #[arg(long)]
    pub capabilities: Option<PathBuf>,

    /// Only keep folders detected as a known build system
    #[arg(long)]
    pub detect: bool,

    /// Modified components, `;`-separated. Enables dependency-driven build.
    #[arg(long, value_delimiter = ';')]
    pub modified_components: Option<Vec<String>>,

    /// Modified files, `;`-separated. Enables dependency-driven build.
    #[arg(long, value_delimiter = ';')]
    pub modified_files: Option<Vec<String>>,

    /// Stored `dump-sha` listing; apps under changed rules build
    #[arg(long)]
    pub previous_sha: Option<PathBuf>,

    /// Keep disabled apps in the selected batch
    #[arg(long)]
    pub include_disabled: bool,

    /// Keep skipped apps in the selected batch
    #[arg(long)]
    pub include_skipped: bool,

    /// Print every classified app, not only the selected batch
    #[arg(long)]
    pub all: bool,

    /// Number of parallel CI jobs
    #[arg(long, default_value = "1")]
    pub parallel_count: usize,

    /// 1-based index of this job
    #[arg(long, default_value = "1")]
    pub parallel_index: usize,
}

#[derive(Args, Debug)]
pub struct DumpShaArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Write the listing here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DiffShaArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Listing produced by `dump-sha` on the base revision
    pub previous: PathBuf,
}

/// Split `folder[:config_name]`. An empty config name counts as none.
pub fn parse_app_spec(spec: &str) -> (String, Option<String>) {
    match spec.rsplit_once(':') {
        Some((folder, config)) if !folder.is_empty() => {
            let config = (!config.is_empty()).then(|| config.to_string());
            (folder.to_string(), config)
        }
        _ => (spec.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_spec_with_and_without_config() {
        assert_eq!(parse_app_spec("examples/hello"), ("examples/hello".into(), None));
        assert_eq!(
            parse_app_spec("examples/hello:psram"),
            ("examples/hello".into(), Some("psram".into()))
        );
        assert_eq!(parse_app_spec("examples/hello:"), ("examples/hello".into(), None));
    }

    #[test]
    fn check_args_parse() {
        let args = CliArgs::try_parse_from([
            "appgate",
            "-v",
            "check",
            "-m",
            "a.yml",
            "-m",
            "b.yml",
            "-t",
            "esp32",
            "-t",
            "esp32s2",
            "--modified-components",
            "esp_wifi;bt",
            "examples/wifi",
        ])
        .unwrap();
        assert!(args.verbose);
        let Command::Check(check) = args.command else {
            panic!("expected check");
        };
        assert_eq!(check.manifest.manifest_files.len(), 2);
        assert_eq!(check.targets, vec!["esp32", "esp32s2"]);
        assert_eq!(
            check.modified_components,
            Some(vec!["esp_wifi".to_string(), "bt".to_string()])
        );
        assert!(check.modified_files.is_none());
        assert_eq!(check.parallel_count, 1);
    }
}
