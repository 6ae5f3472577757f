use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::types::{Config, SecretString};

/// Env var naming an explicit config file; searched before the default locations.
pub const CONFIG_PATH_VAR: &str = "AWS_AUDIT_CONFIG";

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_REPORT_DIR: &str = "./reports";
const DEFAULT_LOG_FILE: &str = "./logs/aws-audit.log";
const DEFAULT_EMAIL_FROM: &str = "aws-audit@localhost";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_COST_TAG_KEY: &str = "Project";
const DEFAULT_COST_TAG_VALUE: &str = "aws-audit";

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Settings read from a `KEY=value` env file.
///
/// Lines that do not parse are skipped and remembered so the caller can warn
/// about them once logging is up.
#[derive(Debug, Default)]
pub struct FileEnvironment {
    path: Option<PathBuf>,
    vars: HashMap<String, String>,
    skipped: Vec<String>,
}

impl FileEnvironment {
    pub fn from_path(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path)
            .with_context(|| format!("Cannot open config file {}", path.display()))?;
        let mut file = Self::from_items(iter)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_items(dotenvy::from_read_iter(reader)).context("Cannot read config")
    }

    fn from_items<I>(items: I) -> Result<Self>
    where
        I: Iterator<Item = dotenvy::Result<(String, String)>>,
    {
        let mut file = Self::default();
        for item in items {
            match item {
                Ok((k, v)) => {
                    file.vars.insert(k, v);
                }
                Err(dotenvy::Error::LineParse(line, _)) => file.skipped.push(line),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(file)
    }

    /// Raw text of every line that was ignored.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvironmentProvider for FileEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// File values first, then the fallback (normally the process environment).
pub struct LayeredEnvironment<F: EnvironmentProvider = SystemEnvironment> {
    file: Option<FileEnvironment>,
    fallback: F,
}

impl<F: EnvironmentProvider> LayeredEnvironment<F> {
    pub fn new(file: Option<FileEnvironment>, fallback: F) -> Self {
        Self { file, fallback }
    }

    pub fn source(&self) -> Option<&Path> {
        self.file.as_ref().and_then(|f| f.path())
    }

    pub fn skipped_lines(&self) -> &[String] {
        self.file.as_ref().map(|f| f.skipped()).unwrap_or_default()
    }
}

impl LayeredEnvironment<SystemEnvironment> {
    /// Load the first config file found in the search order over the process env.
    pub fn discover() -> Result<Self> {
        let candidates = config_search_paths(&SystemEnvironment);
        let file = match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Some(FileEnvironment::from_path(path)?),
            None => None,
        };
        Ok(Self::new(file, SystemEnvironment))
    }
}

impl<F: EnvironmentProvider> EnvironmentProvider for LayeredEnvironment<F> {
    fn get_var(&self, key: &str) -> Option<String> {
        self.file
            .as_ref()
            .and_then(|f| f.get_var(key))
            .or_else(|| self.fallback.get_var(key))
    }
}

pub fn config_search_paths<E: EnvironmentProvider>(env: &E) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(explicit) = env.get_var(CONFIG_PATH_VAR).filter(|s| !s.trim().is_empty()) {
        paths.push(PathBuf::from(explicit));
    }
    paths.push(PathBuf::from(".env"));
    paths.push(PathBuf::from("config/aws-audit.env"));
    if let Some(home) = env.get_var("HOME") {
        paths.push(Path::new(&home).join(".config/aws-audit/config.env"));
    }
    paths
}

/// Where the settings came from: the file used, if any, and its ignored lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOrigin {
    pub path: Option<PathBuf>,
    pub skipped_lines: Vec<String>,
}

pub fn load_config() -> Result<(Config, ConfigOrigin)> {
    let env = LayeredEnvironment::discover()?;
    let origin = ConfigOrigin {
        path: env.source().map(Path::to_path_buf),
        skipped_lines: env.skipped_lines().to_vec(),
    };
    Ok((load_config_with_env(&env), origin))
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Config {
    let default_region = non_empty(env, "AWS_DEFAULT_REGION")
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let report_dir = non_empty(env, "REPORT_DIR")
        .unwrap_or_else(|| DEFAULT_REPORT_DIR.to_string())
        .into();

    let log_file = non_empty(env, "LOG_FILE")
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
        .into();

    let smtp_port: u16 = env.get_var("SMTP_PORT")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_SMTP_PORT);

    Config {
        default_region,
        report_dir,
        log_file,
        notifications_enabled: flag(env, "NOTIFICATIONS_ENABLED", false),
        slack_enabled: flag(env, "SLACK_ENABLED", true),
        slack_webhook_url: non_empty(env, "SLACK_WEBHOOK_URL"),
        email_enabled: flag(env, "EMAIL_ENABLED", true),
        email_to: non_empty(env, "EMAIL_TO"),
        email_from: non_empty(env, "EMAIL_FROM")
            .unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
        smtp_host: non_empty(env, "SMTP_HOST"),
        smtp_port,
        smtp_user: non_empty(env, "SMTP_USER"),
        smtp_password: non_empty(env, "SMTP_PASSWORD").map(SecretString::from),
        cost_tag_key: non_empty(env, "COST_TAG_KEY")
            .unwrap_or_else(|| DEFAULT_COST_TAG_KEY.to_string()),
        cost_tag_value: non_empty(env, "COST_TAG_VALUE")
            .unwrap_or_else(|| DEFAULT_COST_TAG_VALUE.to_string()),
    }
}

fn non_empty<E: EnvironmentProvider>(env: &E, key: &str) -> Option<String> {
    env.get_var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag<E: EnvironmentProvider>(env: &E, key: &str, default: bool) -> bool {
    env.get_var(key)
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
