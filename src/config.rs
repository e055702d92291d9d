use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::CoverageError;

pub const DEFAULT_REPORT_NAME: &str = "Coverage Report";
pub const DEFAULT_CHECK_NAME: &str = "coverage";
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub action: ActionConfig,
}

/// Options consumed by the markdown renderer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub minimum_coverage: u32,
    pub show_line: bool,
    pub show_branch: bool,
    pub show_class_names: bool,
    pub show_missing: bool,
    /// Zero or negative means no limit
    pub show_missing_max_length: i64,
    pub link_missing_lines: bool,
    pub link_missing_lines_source_dir: Option<String>,
    pub report_name: String,
    /// Only files in this set are rendered; all files when `None`
    #[serde(skip)]
    pub filtered_files: Option<HashSet<String>>,
    /// Repository the blob links point into
    pub repository: Option<Repository>,
    pub server_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            minimum_coverage: 100,
            show_line: false,
            show_branch: false,
            show_class_names: false,
            show_missing: false,
            show_missing_max_length: -1,
            link_missing_lines: false,
            link_missing_lines_source_dir: None,
            report_name: DEFAULT_REPORT_NAME.to_string(),
            filtered_files: None,
            repository: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

/// Options consumed by the GitHub action flow, never by the renderer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Restrict the report to files changed in the pull request
    pub only_changed_files: bool,
    pub check_name: String,
    pub fail_below_threshold: bool,
    pub pull_request_comment: bool,
    pub pull_request_number: Option<u64>,
    pub repo_token: Option<String>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            only_changed_files: false,
            check_name: DEFAULT_CHECK_NAME.to_string(),
            fail_below_threshold: false,
            pull_request_comment: true,
            pull_request_number: None,
            repo_token: None,
        }
    }
}

/// `owner/name` repository slug
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl FromStr for Repository {
    type Err = CoverageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(CoverageError::Config(format!(
                "repository '{}' is not of the form owner/name",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Repository {
    type Error = CoverageError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => anyhow::bail!("{} must be true or false, got '{}'", key, other),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("{} must be a number, got '{}'", key, value))
}

impl Config {
    /// Read and parse `path` without validating; overrides may still fill in
    /// required values.
    pub fn parse(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `path` if it exists, otherwise start from defaults, then apply
    /// `INPUT_*` and `GITHUB_*` overrides from the process environment.
    pub fn resolve(path: &Path) -> Result<Self> {
        Self::resolve_with(path, |key| env::var(key).ok())
    }

    /// Same as [`Config::resolve`] with an explicit variable lookup.
    /// Validation runs once, after the overrides.
    pub fn resolve_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            Self::parse(path)?
        } else {
            Self::default()
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply action-style overrides. Each option `foo_bar` is read from
    /// `INPUT_FOO_BAR`; empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = |name: &str| {
            lookup(&format!("INPUT_{}", name.to_uppercase())).filter(|v| !v.trim().is_empty())
        };

        let render = &mut self.render;
        if let Some(v) = input("minimum_coverage") {
            render.minimum_coverage = parse_number("minimum_coverage", &v)?;
        }
        if let Some(v) = input("show_line") {
            render.show_line = parse_bool("show_line", &v)?;
        }
        if let Some(v) = input("show_branch") {
            render.show_branch = parse_bool("show_branch", &v)?;
        }
        if let Some(v) = input("show_class_names") {
            render.show_class_names = parse_bool("show_class_names", &v)?;
        }
        if let Some(v) = input("show_missing") {
            render.show_missing = parse_bool("show_missing", &v)?;
        }
        if let Some(v) = input("show_missing_max_length") {
            render.show_missing_max_length = parse_number("show_missing_max_length", &v)?;
        }
        if let Some(v) = input("link_missing_lines") {
            render.link_missing_lines = parse_bool("link_missing_lines", &v)?;
        }
        if let Some(v) = input("link_missing_lines_source_dir") {
            render.link_missing_lines_source_dir = Some(v);
        }
        if let Some(v) = input("report_name") {
            render.report_name = v;
        }
        if let Some(v) = lookup("GITHUB_REPOSITORY").filter(|v| !v.is_empty()) {
            render.repository = Some(v.parse()?);
        }
        if let Some(v) = lookup("GITHUB_SERVER_URL").filter(|v| !v.is_empty()) {
            render.server_url = v;
        }

        let action = &mut self.action;
        if let Some(v) = input("only_changed_files") {
            action.only_changed_files = parse_bool("only_changed_files", &v)?;
        }
        if let Some(v) = input("check_name") {
            action.check_name = v;
        }
        if let Some(v) = input("fail_below_threshold") {
            action.fail_below_threshold = parse_bool("fail_below_threshold", &v)?;
        }
        if let Some(v) = input("pull_request_comment") {
            action.pull_request_comment = parse_bool("pull_request_comment", &v)?;
        }
        if let Some(v) = input("pull_request_number") {
            action.pull_request_number = Some(parse_number("pull_request_number", &v)?);
        }
        if let Some(v) = input("repo_token") {
            action.repo_token = Some(v);
        } else if action.repo_token.is_none() {
            action.repo_token = lookup("GITHUB_TOKEN").filter(|v| !v.is_empty());
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.render.minimum_coverage > 100 {
            anyhow::bail!(
                "minimum_coverage must be between 0 and 100, got {}",
                self.render.minimum_coverage
            );
        }

        if self.render.link_missing_lines && self.render.repository.is_none() {
            anyhow::bail!("link_missing_lines requires a repository (set GITHUB_REPOSITORY)");
        }

        if self.action.check_name.trim().is_empty() {
            anyhow::bail!("check_name must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.render.minimum_coverage, 100);
        assert_eq!(config.render.show_missing_max_length, -1);
        assert_eq!(config.render.report_name, "Coverage Report");
        assert_eq!(config.action.check_name, "coverage");
        assert!(config.action.pull_request_comment);
        assert!(!config.action.fail_below_threshold);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[render]
minimum_coverage = 80
show_line = true
show_missing = true
show_missing_max_length = 40
repository = "octo/widgets"

[action]
check_name = "cov"
fail_below_threshold = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.render.minimum_coverage, 80);
        assert!(config.render.show_line);
        assert!(!config.render.show_branch);
        assert_eq!(config.render.show_missing_max_length, 40);
        assert_eq!(
            config.render.repository,
            Some(Repository {
                owner: "octo".to_string(),
                name: "widgets".to_string()
            })
        );
        assert_eq!(config.action.check_name, "cov");
        assert!(config.action.fail_below_threshold);
        assert!(config.action.pull_request_comment);
    }

    #[test]
    fn test_resolve_validates() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "[render]\nminimum_coverage = 150").unwrap();
        let err = Config::resolve_with(tmp.path(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("minimum_coverage"));
    }

    #[test]
    fn test_resolve_takes_repository_from_env_before_validating() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "[render]\nshow_missing = true\nlink_missing_lines = true").unwrap();

        let config = Config::resolve_with(
            tmp.path(),
            env_of(&[("GITHUB_REPOSITORY", "octo/widgets")]),
        )
        .unwrap();
        assert!(config.render.link_missing_lines);
        assert_eq!(
            config.render.repository.map(|r| r.to_string()).as_deref(),
            Some("octo/widgets")
        );

        assert!(Config::resolve_with(tmp.path(), env_of(&[])).is_err());
    }

    #[test]
    fn test_resolve_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::resolve_with(&dir.path().join("covmark.toml"), env_of(&[])).unwrap();
        assert_eq!(config.render.minimum_coverage, 100);
    }

    #[test]
    fn test_configured_token_wins_over_ambient_token() {
        let mut config: Config = toml::from_str("[action]\nrepo_token = \"from-file\"").unwrap();
        config
            .apply_env(env_of(&[("GITHUB_TOKEN", "ambient")]))
            .unwrap();
        assert_eq!(config.action.repo_token.as_deref(), Some("from-file"));

        config
            .apply_env(env_of(&[("INPUT_REPO_TOKEN", "explicit"), ("GITHUB_TOKEN", "ambient")]))
            .unwrap();
        assert_eq!(config.action.repo_token.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env_of(&[
                ("INPUT_MINIMUM_COVERAGE", "75"),
                ("INPUT_SHOW_BRANCH", "true"),
                ("INPUT_SHOW_MISSING_MAX_LENGTH", ""),
                ("INPUT_LINK_MISSING_LINES", "True"),
                ("INPUT_REPORT_NAME", "Backend"),
                ("INPUT_PULL_REQUEST_NUMBER", "42"),
                ("GITHUB_REPOSITORY", "octo/widgets"),
                ("GITHUB_TOKEN", "secret"),
            ]))
            .unwrap();

        assert_eq!(config.render.minimum_coverage, 75);
        assert!(config.render.show_branch);
        assert_eq!(config.render.show_missing_max_length, -1);
        assert!(config.render.link_missing_lines);
        assert_eq!(config.render.report_name, "Backend");
        assert_eq!(config.action.pull_request_number, Some(42));
        assert_eq!(config.action.repo_token.as_deref(), Some("secret"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config
            .apply_env(env_of(&[("INPUT_SHOW_LINE", "yes")]))
            .is_err());
        assert!(config
            .apply_env(env_of(&[("INPUT_MINIMUM_COVERAGE", "eighty")]))
            .is_err());
    }

    #[test]
    fn test_links_need_repository() {
        let mut config = Config::default();
        config.render.link_missing_lines = true;
        assert!(config.validate().is_err());
        config.render.repository = Some("octo/widgets".parse().unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_repository_slug() {
        assert!("octo".parse::<Repository>().is_err());
        assert!("octo/".parse::<Repository>().is_err());
        assert!("a/b/c".parse::<Repository>().is_err());
        let repo: Repository = "octo/widgets".parse().unwrap();
        assert_eq!(repo.to_string(), "octo/widgets");
    }
}
