use crate::core::service::{PhoneCheck, TiePolicy};
use crate::core::ConfigProvider;
use crate::utils::error::{QueryError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{validate_database_path, validate_file_extension, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DATABASE_PATH: &str = "students.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    pub seed_csv: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            seed_csv: None,
        }
    }
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub tie_policy: TiePolicy,
    #[serde(default)]
    pub phone_check: PhoneCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    /// `compact` (default) or `json`
    pub format: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(QueryError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| QueryError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${STUDENT_DB})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| QueryError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_database_path("database.path", &self.database.path)?;

        if let Some(seed) = &self.database.seed_csv {
            validate_file_extension("database.seed_csv", seed, &["csv"])?;
        }

        if let Some(format) = self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            format.parse::<LogFormat>()?;
        }

        Ok(())
    }

    pub fn verbose(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    /// Configured log format; falls back to compact when unset or invalid.
    pub fn log_format(&self) -> LogFormat {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .and_then(|f| f.parse().ok())
            .unwrap_or_default()
    }
}

impl ConfigProvider for TomlConfig {
    fn database_path(&self) -> &str {
        &self.database.path
    }

    fn tie_policy(&self) -> TiePolicy {
        self.query.tie_policy
    }

    fn phone_check(&self) -> PhoneCheck {
        self.query.phone_check
    }

    fn seed_csv(&self) -> Option<&str> {
        self.database.seed_csv.as_deref()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
