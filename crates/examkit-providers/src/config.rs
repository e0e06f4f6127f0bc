//! Backend configuration and factories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examkit_core::engine::EngineConfig;
use examkit_core::model::{SessionConfig, TestType};
use examkit_core::traits::{ContentProvider, ResultStore};

use crate::file::{FileContentProvider, JsonDirStore};
use crate::http::{HttpContentProvider, HttpResultStore};

/// Environment variable that overrides the token of HTTP backends.
pub const API_TOKEN_ENV: &str = "EXAMKIT_API_TOKEN";

/// Where question content comes from.
///
/// Note: Custom Debug impl masks API tokens to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentConfig {
    File {
        #[serde(default = "default_bank_dir")]
        dir: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_token: Option<String>,
    },
}

/// Where submitted attempts are stored.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResultsConfig {
    Json {
        #[serde(default = "default_results_dir")]
        dir: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_token: Option<String>,
    },
}

fn mask(token: &Option<String>) -> Option<&'static str> {
    token.as_ref().map(|_| "***")
}

impl std::fmt::Debug for ContentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentConfig::File { dir } => f.debug_struct("File").field("dir", dir).finish(),
            ContentConfig::Http {
                base_url,
                api_token,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_token", &mask(api_token))
                .finish(),
        }
    }
}

impl std::fmt::Debug for ResultsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultsConfig::Json { dir } => f.debug_struct("Json").field("dir", dir).finish(),
            ResultsConfig::Http {
                base_url,
                api_token,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_token", &mask(api_token))
                .finish(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig::File {
            dir: default_bank_dir(),
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        ResultsConfig::Json {
            dir: default_results_dir(),
        }
    }
}

fn default_bank_dir() -> PathBuf {
    PathBuf::from("./banks")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./examkit-results")
}

/// Retry policy for result persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    500
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// Question count and duration for one test type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTypeConfig {
    pub question_count: usize,
    pub duration_secs: u32,
}

/// Per-test-type defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTypes {
    #[serde(default = "default_quick")]
    pub quick: TestTypeConfig,
    #[serde(default = "default_subject")]
    pub subject: TestTypeConfig,
    #[serde(default = "default_mock")]
    pub mock: TestTypeConfig,
}

fn default_quick() -> TestTypeConfig {
    TestTypeConfig {
        question_count: 20,
        duration_secs: 900,
    }
}
fn default_subject() -> TestTypeConfig {
    TestTypeConfig {
        question_count: 40,
        duration_secs: 2400,
    }
}
fn default_mock() -> TestTypeConfig {
    TestTypeConfig {
        question_count: 40,
        duration_secs: 3600,
    }
}

impl Default for TestTypes {
    fn default() -> Self {
        Self {
            quick: default_quick(),
            subject: default_subject(),
            mock: default_mock(),
        }
    }
}

impl TestTypes {
    pub fn get(&self, test_type: TestType) -> TestTypeConfig {
        match test_type {
            TestType::Quick => self.quick,
            TestType::Subject => self.subject,
            TestType::Mock => self.mock,
        }
    }
}

/// Top-level examkit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamkitConfig {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub test_types: TestTypes,
}

impl ExamkitConfig {
    /// Session configuration for a test type, from the configured defaults.
    pub fn session_config(&self, test_type: TestType) -> SessionConfig {
        let t = self.test_types.get(test_type);
        SessionConfig {
            question_count: t.question_count,
            duration_secs: t.duration_secs,
            test_type,
        }
    }

    /// Engine settings derived from the persistence policy.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_retries: self.persistence.max_retries,
            retry_delay: Duration::from_millis(self.persistence.retry_delay_ms),
            ..EngineConfig::default()
        }
    }

    /// Reject configurations no session could run with.
    pub fn validate(&self) -> Result<()> {
        for test_type in [TestType::Quick, TestType::Subject, TestType::Mock] {
            self.session_config(test_type)
                .validate()
                .map_err(|e| anyhow::anyhow!("test_types.{test_type}: {e}"))?;
        }
        if let ContentConfig::Http { base_url, .. } = &self.content {
            if base_url.trim().is_empty() {
                anyhow::bail!("content.base_url is empty");
            }
        }
        if let ResultsConfig::Http { base_url, .. } = &self.results {
            if base_url.trim().is_empty() {
                anyhow::bail!("results.base_url is empty");
            }
        }
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_token(token: &Option<String>, env_token: &Option<String>) -> Option<String> {
    env_token
        .clone()
        .or_else(|| token.as_ref().map(|t| resolve_env_vars(t)))
}

fn resolve_content(config: &ContentConfig, env_token: &Option<String>) -> ContentConfig {
    match config {
        ContentConfig::File { dir } => ContentConfig::File {
            dir: PathBuf::from(resolve_env_vars(&dir.to_string_lossy())),
        },
        ContentConfig::Http {
            base_url,
            api_token,
        } => ContentConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_token: resolve_token(api_token, env_token),
        },
    }
}

fn resolve_results(config: &ResultsConfig, env_token: &Option<String>) -> ResultsConfig {
    match config {
        ResultsConfig::Json { dir } => ResultsConfig::Json {
            dir: PathBuf::from(resolve_env_vars(&dir.to_string_lossy())),
        },
        ResultsConfig::Http {
            base_url,
            api_token,
        } => ResultsConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_token: resolve_token(api_token, env_token),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examkit.toml` in the current directory
/// 2. `~/.config/examkit/config.toml`
///
/// `EXAMKIT_API_TOKEN` overrides the token of HTTP backends.
pub fn load_config() -> Result<ExamkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamkitConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examkit.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamkitConfig::default(),
    };

    tracing::debug!(path = ?config_path, content = ?config.content, results = ?config.results, "configuration loaded");
    Ok(config)
}

/// Parse, resolve, and validate a configuration string.
pub fn parse_config(content: &str) -> Result<ExamkitConfig> {
    let mut config: ExamkitConfig = toml::from_str(content)?;

    let env_token = std::env::var(API_TOKEN_ENV).ok().filter(|t| !t.is_empty());
    config.content = resolve_content(&config.content, &env_token);
    config.results = resolve_results(&config.results, &env_token);

    config.validate()?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examkit"))
}

/// Create a content provider from its configuration.
pub fn create_content_provider(config: &ContentConfig) -> Result<Arc<dyn ContentProvider>> {
    match config {
        ContentConfig::File { dir } => Ok(Arc::new(FileContentProvider::new(dir))),
        ContentConfig::Http {
            base_url,
            api_token,
        } => Ok(Arc::new(HttpContentProvider::new(
            base_url,
            api_token.clone(),
        )?)),
    }
}

/// Create a result store from its configuration.
pub fn create_result_store(config: &ResultsConfig) -> Result<Arc<dyn ResultStore>> {
    match config {
        ResultsConfig::Json { dir } => Ok(Arc::new(JsonDirStore::new(dir))),
        ResultsConfig::Http {
            base_url,
            api_token,
        } => Ok(Arc::new(HttpResultStore::new(base_url, api_token.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMKIT_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMKIT_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMKIT_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        std::env::remove_var("_EXAMKIT_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamkitConfig::default();
        assert!(matches!(config.content, ContentConfig::File { .. }));
        assert!(matches!(config.results, ResultsConfig::Json { .. }));
        assert_eq!(config.persistence.max_retries, 3);
        assert_eq!(config.session_config(TestType::Quick).question_count, 20);
        assert_eq!(config.session_config(TestType::Subject).duration_secs, 2400);
        assert_eq!(config.session_config(TestType::Mock).duration_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[content]
type = "http"
base_url = "https://content.example.com"
api_token = "literal-token"

[results]
type = "json"
dir = "./out"

[persistence]
max_retries = 5
retry_delay_ms = 250

[test_types.quick]
question_count = 10
duration_secs = 300
"#;
        let config = parse_config(toml_str).unwrap();
        assert!(matches!(
            config.content,
            ContentConfig::Http { ref base_url, .. } if base_url == "https://content.example.com"
        ));
        assert!(matches!(config.results, ResultsConfig::Json { ref dir } if dir == Path::new("./out")));
        assert_eq!(config.session_config(TestType::Quick).question_count, 10);
        assert_eq!(config.session_config(TestType::Mock).question_count, 40);

        let engine = config.engine_config();
        assert_eq!(engine.max_retries, 5);
        assert_eq!(engine.retry_delay, Duration::from_millis(250));
        assert_eq!(engine.tick_period, Duration::from_secs(1));
    }

    #[test]
    fn debug_masks_tokens() {
        let config = ContentConfig::Http {
            base_url: "https://x".into(),
            api_token: Some("very-secret".into()),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("***"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let toml_str = r#"
[test_types.mock]
question_count = 40
duration_secs = 0
"#;
        let err = parse_config(toml_str).unwrap_err();
        assert!(err.to_string().contains("test_types.mock"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        assert!(load_config_from(Some(Path::new("/nonexistent/examkit.toml"))).is_err());
    }

    #[test]
    fn load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examkit.toml");
        std::fs::write(&path, "[content]\ntype = \"file\"\ndir = \"./my-banks\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert!(matches!(config.content, ContentConfig::File { ref dir } if dir == Path::new("./my-banks")));
    }

    #[test]
    fn factories_build_backends() {
        let content = create_content_provider(&ContentConfig::default()).unwrap();
        assert_eq!(content.name(), "file");
        let store = create_result_store(&ResultsConfig::Http {
            base_url: "http://localhost:9".into(),
            api_token: None,
        })
        .unwrap();
        assert_eq!(store.name(), "http");
    }
}
