use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::coverage::{Metric, ThresholdMap};
use crate::notifications::{GithubTarget, DEFAULT_API_URL};
use crate::report::{CommentOptions, DEFAULT_MARKER};

pub const DEFAULT_LCOV_PATH: &str = "coverage/lcov.info";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub coverage: CoverageSection,
    #[serde(default)]
    pub thresholds: ThresholdSection,
    #[serde(default)]
    pub comment: CommentSection,
    #[serde(default)]
    pub github: GithubSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverageSection {
    #[serde(default = "default_lcov_path")]
    pub lcov_path: PathBuf,
}

impl Default for CoverageSection {
    fn default() -> Self {
        Self {
            lcov_path: default_lcov_path(),
        }
    }
}

/// Minimum percentages; checked in the order lines, statements, functions, branches
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdSection {
    pub lines: Option<f64>,
    pub statements: Option<f64>,
    pub functions: Option<f64>,
    pub branches: Option<f64>,
}

impl ThresholdSection {
    pub fn to_map(&self) -> ThresholdMap {
        [
            (Metric::Lines, self.lines),
            (Metric::Statements, self.statements),
            (Metric::Functions, self.functions),
            (Metric::Branches, self.branches),
        ]
        .into_iter()
        .filter_map(|(metric, pct)| pct.map(|p| (metric, p)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentSection {
    #[serde(default = "default_true")]
    pub show_file_coverage: bool,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for CommentSection {
    fn default() -> Self {
        Self {
            show_file_coverage: true,
            max_files: default_max_files(),
            marker: default_marker(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubSection {
    /// Falls back to `GITHUB_TOKEN`
    #[serde(default)]
    pub token: Option<String>,
    /// `owner/name`, falls back to `GITHUB_REPOSITORY`
    #[serde(default)]
    pub repository: Option<String>,
    /// Falls back to `GITHUB_API_URL`, then the public API
    #[serde(default)]
    pub api_url: Option<String>,
    /// Falls back to the pull request in the `GITHUB_EVENT_PATH` payload
    #[serde(default)]
    pub pr_number: Option<u64>,
}

fn default_lcov_path() -> PathBuf {
    PathBuf::from(DEFAULT_LCOV_PATH)
}

fn default_true() -> bool {
    true
}

fn default_max_files() -> usize {
    20
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load `path` if it exists; a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (metric, pct) in self.thresholds.to_map().iter() {
            validate_threshold(metric, pct)?;
        }

        if self.comment.marker.trim().is_empty() {
            anyhow::bail!("comment.marker must not be empty");
        }

        Ok(())
    }

    pub fn comment_options(&self, thresholds: &ThresholdMap) -> CommentOptions {
        CommentOptions {
            thresholds: thresholds.clone(),
            show_file_coverage: self.comment.show_file_coverage,
            max_files: self.comment.max_files,
            marker: self.comment.marker.clone(),
        }
    }

    /// Resolve the GitHub target from config, falling back to `env`.
    /// Returns `None` when no token or repository is available.
    pub fn github_target(&self, env: impl Fn(&str) -> Option<String>) -> Option<GithubTarget> {
        let token = self.github.token.clone().or_else(|| env("GITHUB_TOKEN"))?;
        let repository = self
            .github
            .repository
            .clone()
            .or_else(|| env("GITHUB_REPOSITORY"))?;
        let api_url = self
            .github
            .api_url
            .clone()
            .or_else(|| env("GITHUB_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Some(GithubTarget {
            api_url: api_url.trim_end_matches('/').to_string(),
            repository,
            token,
        })
    }

    /// Pull request number from config, or from the event payload at `GITHUB_EVENT_PATH`
    pub fn pr_number(&self, env: impl Fn(&str) -> Option<String>) -> Option<u64> {
        if let Some(number) = self.github.pr_number {
            return Some(number);
        }

        let event_path = env("GITHUB_EVENT_PATH")?;
        match read_event_pr_number(Path::new(&event_path)) {
            Ok(number) => number,
            Err(e) => {
                log::warn!("Could not read pull request number: {:#}", e);
                None
            }
        }
    }
}

/// Threshold percentages must lie in 0..=100
pub fn validate_threshold(metric: Metric, pct: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&pct) {
        anyhow::bail!(
            "Threshold for {} must be between 0 and 100, got {}",
            metric,
            pct
        );
    }
    Ok(())
}

/// Parse a `<metric>=<pct>` command line threshold
pub fn parse_threshold_arg(arg: &str) -> Result<(Metric, f64)> {
    let (metric, pct) = arg
        .split_once('=')
        .with_context(|| format!("Invalid threshold '{}', expected <metric>=<pct>", arg))?;

    let metric: Metric = metric.parse()?;
    let pct: f64 = pct
        .trim()
        .parse()
        .with_context(|| format!("Invalid percentage in threshold '{}'", arg))?;

    validate_threshold(metric, pct)?;
    Ok((metric, pct))
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequest>,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
}

fn read_event_pr_number(path: &Path) -> Result<Option<u64>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload: {}", path.display()))?;
    let payload: EventPayload = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event payload: {}", path.display()))?;

    Ok(payload.pull_request.map(|pr| pr.number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_config() {
        let toml_content = indoc! {r#"
            [coverage]
            lcov_path = "target/lcov.info"

            [thresholds]
            branches = 60
            lines = 80.5

            [comment]
            max_files = 5
            marker = "<!-- my-marker -->"

            [github]
            repository = "octo/repo"
        "#};

        let config: Config = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.coverage.lcov_path, PathBuf::from("target/lcov.info"));
        assert!(config.comment.show_file_coverage);
        assert_eq!(config.comment.max_files, 5);

        let thresholds = config.thresholds.to_map();
        let entries: Vec<_> = thresholds.iter().collect();
        assert_eq!(entries, vec![(Metric::Lines, 80.5), (Metric::Branches, 60.0)]);
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.coverage.lcov_path, PathBuf::from(DEFAULT_LCOV_PATH));
        assert!(config.thresholds.to_map().is_empty());
        assert_eq!(config.comment.max_files, 20);
        assert_eq!(config.comment.marker, DEFAULT_MARKER);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let config: Config = toml::from_str("[thresholds]\nlines = 120\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lines"));
    }

    #[test]
    fn test_rejects_unknown_metric() {
        assert!(toml::from_str::<Config>("[thresholds]\nmethods = 50\n").is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("covreport.toml")).unwrap();
        assert_eq!(config.coverage.lcov_path, PathBuf::from(DEFAULT_LCOV_PATH));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covreport.toml");
        fs::write(&path, "[coverage\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_parse_threshold_arg() {
        assert_eq!(parse_threshold_arg("lines=80").unwrap(), (Metric::Lines, 80.0));
        assert_eq!(
            parse_threshold_arg("Branches = 72.5").unwrap(),
            (Metric::Branches, 72.5)
        );
        assert!(parse_threshold_arg("lines").is_err());
        assert!(parse_threshold_arg("lines=abc").is_err());
        assert!(parse_threshold_arg("lines=-1").is_err());
        assert!(parse_threshold_arg("paths=10").is_err());
    }

    #[test]
    fn test_github_target_from_env() {
        let config = Config::default();

        assert!(config.github_target(env_from(&[])).is_none());
        assert!(config
            .github_target(env_from(&[("GITHUB_TOKEN", "t")]))
            .is_none());

        let target = config
            .github_target(env_from(&[
                ("GITHUB_TOKEN", "t"),
                ("GITHUB_REPOSITORY", "octo/repo"),
            ]))
            .unwrap();
        assert_eq!(target.api_url, DEFAULT_API_URL);
        assert_eq!(target.repository, "octo/repo");
    }

    #[test]
    fn test_github_config_wins_over_env() {
        let config: Config = toml::from_str(indoc! {r#"
            [github]
            token = "from-config"
            api_url = "https://ghe.example.com/api/v3/"
        "#})
        .unwrap();

        let target = config
            .github_target(env_from(&[
                ("GITHUB_TOKEN", "from-env"),
                ("GITHUB_REPOSITORY", "octo/repo"),
            ]))
            .unwrap();
        assert_eq!(target.token, "from-config");
        assert_eq!(target.api_url, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_pr_number_from_event_payload() {
        let dir = tempfile::tempdir().unwrap();
        let event = dir.path().join("event.json");
        fs::write(&event, r#"{"action": "opened", "pull_request": {"number": 42}}"#).unwrap();
        let event_path = event.to_string_lossy().to_string();

        let config = Config::default();
        assert_eq!(
            config.pr_number(env_from(&[("GITHUB_EVENT_PATH", &event_path)])),
            Some(42)
        );

        fs::write(&event, r#"{"ref": "refs/heads/main"}"#).unwrap();
        assert_eq!(
            config.pr_number(env_from(&[("GITHUB_EVENT_PATH", &event_path)])),
            None
        );
        assert_eq!(config.pr_number(env_from(&[])), None);
    }
}
