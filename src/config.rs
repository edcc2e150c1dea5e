//! Runtime configuration for the diagnostic layer.
//!
//! Loaded from YAML and then overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `AI_DIAG_DETAIL` | `detail` |
//! | `AI_DIAG_LEVEL` | `level` |
//! | `AI_DIAG_PREFIXES` | `allowed_prefixes` (comma separated) |
//! | `AI_DIAG_AUDIT_PATH` | `audit_path` |
//! | `AI_DIAG_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `AI_DIAG_RETRY_DELAY_MS` | `retry.delay_ms` |

use crate::audit::{AuditTrail, DEFAULT_AUDIT_FILE};
use crate::client::RetryPolicy;
use crate::logging::{Diagnostics, Level, LogFormat, Logger, DEFAULT_FORMAT};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub detail: u8,
    /// Minimum severity name (`debug`, `info`, `warning`, `error`, `critical`).
    pub level: String,
    /// Empty means every prefix is allowed.
    pub allowed_prefixes: Vec<String>,
    pub capture_messages: bool,
    pub format: String,
    pub multiline_yaml: bool,
    pub audit_path: PathBuf,
    pub retry: RetryConfig,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            detail: 0,
            level: "warning".to_string(),
            allowed_prefixes: Vec::new(),
            capture_messages: false,
            format: DEFAULT_FORMAT.to_string(),
            multiline_yaml: false,
            audit_path: PathBuf::from(DEFAULT_AUDIT_FILE),
            retry: RetryConfig::default(),
        }
    }
}

fn env_error(var: &str, value: &str) -> Error {
    Error::configuration_with_context(
        format!("invalid value for {}: {:?}", var, value),
        ErrorContext::new()
            .with_field_path(var)
            .with_source("diagnostics_config"),
    )
}

impl DiagnosticsConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml_str(&text)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (environment-style variable names).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("AI_DIAG_DETAIL") {
            self.detail = v.trim().parse().map_err(|_| env_error("AI_DIAG_DETAIL", &v))?;
        }
        if let Some(v) = lookup("AI_DIAG_LEVEL") {
            self.level = v.trim().to_string();
        }
        if let Some(v) = lookup("AI_DIAG_PREFIXES") {
            self.allowed_prefixes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("AI_DIAG_AUDIT_PATH") {
            self.audit_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("AI_DIAG_MAX_ATTEMPTS") {
            self.retry.max_attempts = v
                .trim()
                .parse()
                .map_err(|_| env_error("AI_DIAG_MAX_ATTEMPTS", &v))?;
        }
        if let Some(v) = lookup("AI_DIAG_RETRY_DELAY_MS") {
            self.retry.delay_ms = v
                .trim()
                .parse()
                .map_err(|_| env_error("AI_DIAG_RETRY_DELAY_MS", &v))?;
        }
        Ok(self)
    }

    pub fn level(&self) -> Result<Level> {
        self.level.parse()
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::new(self.format.clone()).with_multiline_yaml(self.multiline_yaml)
    }

    /// A fresh context with this config's allow-list, format and capture setting.
    pub fn build_diagnostics(&self) -> Diagnostics {
        Diagnostics::builder()
            .allowed_prefixes(self.allowed_prefixes.iter().cloned())
            .capture_messages(self.capture_messages)
            .format(self.log_format())
            .build()
    }

    pub fn build_logger(
        &self,
        name: impl Into<String>,
        diagnostics: Arc<Diagnostics>,
    ) -> Result<Logger> {
        Ok(Logger::new(name, diagnostics)
            .with_level(self.level()?)
            .with_detail(self.detail))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    pub fn audit_trail(&self) -> AuditTrail {
        AuditTrail::new(self.audit_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_with_defaults() {
        let cfg = DiagnosticsConfig::from_yaml_str(
            "detail: 3\nallowed_prefixes: [cmd_]\nretry:\n  delay_ms: 10\n",
        )
        .unwrap();
        assert_eq!(cfg.detail, 3);
        assert_eq!(cfg.allowed_prefixes, vec!["cmd_".to_string()]);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.delay_ms, 10);
        assert_eq!(cfg.audit_path, PathBuf::from("openai_requests.yaml"));
        assert_eq!(cfg.level().unwrap(), Level::Warning);
    }

    #[test]
    fn overrides_apply_and_validate() {
        let env: HashMap<&str, &str> = [
            ("AI_DIAG_DETAIL", "2"),
            ("AI_DIAG_PREFIXES", "cmd_, net_ ,"),
            ("AI_DIAG_MAX_ATTEMPTS", "5"),
        ]
        .into_iter()
        .collect();
        let cfg = DiagnosticsConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.detail, 2);
        assert_eq!(cfg.allowed_prefixes, vec!["cmd_", "net_"]);
        assert_eq!(cfg.retry_policy().max_attempts, 5);

        let bad = DiagnosticsConfig::default()
            .with_overrides(|k| (k == "AI_DIAG_DETAIL").then(|| "lots".to_string()));
        assert!(matches!(bad, Err(Error::Configuration { .. })));
    }

    #[test]
    fn builds_logger_and_context() {
        let cfg = DiagnosticsConfig {
            level: "info".into(),
            allowed_prefixes: vec!["cmd_".into()],
            ..Default::default()
        };
        let diag = Arc::new(cfg.build_diagnostics());
        assert!(diag.permits_prefix("cmd_emote"));
        assert!(!diag.permits_prefix("net_io"));
        let logger = cfg.build_logger("svc", diag).unwrap();
        assert_eq!(logger.level(), Level::Info);

        let bad = DiagnosticsConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(bad.build_logger("svc", Arc::new(bad.build_diagnostics())).is_err());
    }
}
