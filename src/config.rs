use clap::Parser;
use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::SyncWait;
use crate::error::ConfigError;

/// Command line, with each flag also readable from its primary env var.
///
/// Fallback env vars, the tags file and the settings file are merged in
/// by [`Config::resolve`].
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "rancher-pipeline-deploy", version)]
#[command(about = "Upgrade Rancher catalog apps that opted into auto-update to a new chart tag")]
pub struct Args {
    /// Name of the Rancher catalog. Falls back to CICD_GIT_REPO.
    #[arg(long, env = "RANCHER_CATALOG_NAME")]
    pub catalog_name: Option<String>,

    /// Chart to update. Falls back to CICD_GIT_BRANCH.
    #[arg(long, env = "CHART_NAME")]
    pub chart_name: Option<String>,

    /// Candidate tags in priority order; the first semver one is used.
    #[arg(long, value_delimiter = ',')]
    pub chart_tags: Vec<String>,

    /// File with comma separated tags, read after --chart-tags.
    #[arg(long, env = "TAGS_FILE", default_value = ".tags")]
    pub tags_file: PathBuf,

    /// Log what would be upgraded without posting upgrades.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    #[arg(long, env = "RANCHER_API_TOKEN", hide_env_values = true)]
    pub rancher_api_token: Option<String>,

    #[arg(long, env = "RANCHER_URL")]
    pub rancher_url: Option<String>,

    /// YAML settings file used for anything not given on the command line.
    #[arg(long, env = "RANCHER_DEPLOY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CATALOG_POLL_INTERVAL")]
    pub poll_interval_secs: Option<u64>,

    /// Give up if the catalog is still syncing after this many seconds.
    #[arg(long, env = "CATALOG_TIMEOUT")]
    pub catalog_timeout_secs: Option<u64>,

    #[arg(long, env = "REQUEST_TIMEOUT")]
    pub request_timeout_secs: Option<u64>,

    /// Log filter, e.g. `debug` or `rancher_pipeline_deploy=trace`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Optional settings file. Keys match the long flag names.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingsFile {
    pub catalog_name: Option<String>,
    pub chart_name: Option<String>,
    #[serde(default)]
    pub chart_tags: Vec<String>,
    pub dry_run: Option<bool>,
    pub rancher_api_token: Option<String>,
    pub rancher_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub catalog_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl SettingsFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Everything a run needs, validated up front.
#[derive(Clone)]
pub struct Config {
    pub rancher_url: String,
    pub rancher_api_token: String,
    pub catalog_name: String,
    pub chart_name: String,
    /// Merged candidates, highest priority first.
    pub chart_tags: Vec<String>,
    pub dry_run: bool,
    pub sync_wait: SyncWait,
    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rancher_url", &self.rancher_url)
            .field("rancher_api_token", &"<redacted>")
            .field("catalog_name", &self.catalog_name)
            .field("chart_name", &self.chart_name)
            .field("chart_tags", &self.chart_tags)
            .field("dry_run", &self.dry_run)
            .field("sync_wait", &self.sync_wait)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    /// Merges `args`, fallback env vars (looked up through `env`), the tags
    /// file and the settings file, in that order of precedence.
    pub fn resolve<F>(args: &Args, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match &args.config {
            Some(path) => SettingsFile::from_file(path)?,
            None => SettingsFile::default(),
        };
        let env = |key: &str| non_blank(env(key));

        let catalog_name = non_blank(args.catalog_name.clone())
            .or_else(|| env("CICD_GIT_REPO"))
            .or_else(|| non_blank(file.catalog_name.clone()))
            .ok_or(ConfigError::Missing("catalog-name"))?;

        let chart_name = non_blank(args.chart_name.clone())
            .or_else(|| env("CICD_GIT_BRANCH"))
            .or_else(|| non_blank(file.chart_name.clone()))
            .ok_or(ConfigError::Missing("chart-name"))?;

        let rancher_api_token = non_blank(args.rancher_api_token.clone())
            .or_else(|| non_blank(file.rancher_api_token.clone()))
            .ok_or(ConfigError::Missing("rancher-api-token"))?;

        let rancher_url = non_blank(args.rancher_url.clone())
            .or_else(|| non_blank(file.rancher_url.clone()))
            .ok_or(ConfigError::Missing("rancher-url"))?;
        let rancher_url = rancher_url.trim_end_matches('/').to_string();
        url::Url::parse(&rancher_url).map_err(|e| ConfigError::Invalid {
            flag: "rancher-url",
            reason: e.to_string(),
        })?;

        let mut chart_tags = Vec::new();
        chart_tags.extend(split_tags(&args.chart_tags.join(",")));
        if let Some(contents) = read_tags_file(&args.tags_file)? {
            chart_tags.extend(split_tags(&contents));
        }
        for key in ["CHART_TAG", "CHART_TAGS"] {
            if let Some(value) = env(key) {
                chart_tags.extend(split_tags(&value));
            }
        }
        chart_tags.extend(split_tags(&file.chart_tags.join(",")));
        if chart_tags.is_empty() {
            return Err(ConfigError::Missing("chart-tags"));
        }

        let interval = args.poll_interval_secs.or(file.poll_interval_secs);
        let sync_wait = SyncWait {
            interval: interval.map(Duration::from_secs).unwrap_or(SyncWait::default().interval),
            timeout: args
                .catalog_timeout_secs
                .or(file.catalog_timeout_secs)
                .map(Duration::from_secs),
        };

        let request_timeout = args
            .request_timeout_secs
            .or(file.request_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            rancher_url,
            rancher_api_token,
            catalog_name,
            chart_name,
            chart_tags,
            dry_run: args.dry_run || file.dry_run.unwrap_or(false),
            sync_wait,
            request_timeout,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn split_tags(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split([',', '\n']).map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

/// A missing tags file just means no tags from it.
fn read_tags_file(path: &Path) -> Result<Option<String>, ConfigError> {
    if path.as_os_str().is_empty() {
        return Ok(None);
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}
