//! Configuration management for the feedback analysis component
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Hard cap on the number of concurrent analysis workers
pub const MAX_WORKER_COUNT: usize = 32;

/// Output column names an id column must not shadow
const RESERVED_COLUMNS: &[&str] = &[
    "language",
    "sentimentValue",
    "sentimentPolarity",
    "sentimentLabel",
    "usedChars",
    "index",
    "text",
    "type",
    "score",
    "entityUid",
    "name",
    "negated",
    "subject",
    "object",
    "subjectType",
    "objectType",
    "subjectUid",
    "objectUid",
    "segment",
    "binaryData",
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Analysis service configuration
    pub api: ApiConfig,

    /// Source table column groups
    pub columns: ColumnConfig,

    /// Analysis pipeline configuration
    pub analysis: AnalysisConfig,

    /// Input/output locations
    pub io: IoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Analysis endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Beta analysis endpoint
    #[serde(default = "default_beta_url")]
    pub beta_url: String,

    /// Send requests to the beta endpoint
    #[serde(default)]
    pub use_beta: bool,

    /// Service credential (required)
    pub user_key: Option<String>,

    /// Customer identifier echoed into every request (required)
    pub customer_id: Option<String>,

    /// Text correction mode
    #[serde(default = "default_correction")]
    pub correction: String,

    /// Diacritization mode
    #[serde(default = "default_diacritization")]
    pub diacritization: String,

    /// Fixed document language (autodetected when unset)
    pub language: Option<String>,

    /// Analysis domain
    pub domain: Option<String>,

    /// Reference date for relative time expressions (YYYY-MM-DD)
    pub reference_date: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum transport-level retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ColumnConfig {
    /// Columns identifying a row (required, non-empty)
    #[serde(default)]
    pub id: Vec<String>,

    /// Columns holding the main feedback text (required, non-empty)
    #[serde(default)]
    pub text: Vec<String>,

    /// Columns holding the "what did you like" text
    #[serde(default)]
    pub positives: Vec<String>,

    /// Columns holding the "what did you dislike" text
    #[serde(default)]
    pub negatives: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Entity types qualifying for the polarity split (case-insensitive)
    #[serde(default)]
    pub feedback_entities: Vec<String>,

    /// Relation types qualifying for the polarity split (case-insensitive)
    #[serde(default)]
    pub feedback_relations: Vec<String>,

    /// Number of documents sent per API call
    #[serde(default = "default_doc_batch_size")]
    pub doc_batch_size: usize,

    /// Number of concurrent in-flight API calls
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IoConfig {
    /// Component data directory (in/ and out/ subtrees)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Source table file name under <data_dir>/in/tables (required)
    pub source_table: Option<String>,
}

// Default value functions
fn default_base_url() -> String {
    "https://api.geneea.com/keboola/v2/analysis".to_string()
}
fn default_beta_url() -> String {
    "https://beta-api.geneea.com/keboola/v2/analysis".to_string()
}
fn default_correction() -> String {
    "AGGRESSIVE".to_string()
}
fn default_diacritization() -> String {
    "yes".to_string()
}
fn default_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_doc_batch_size() -> usize {
    10
}
fn default_worker_count() -> usize {
    2
}
fn default_data_dir() -> String {
    "/data".to_string()
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__API__CUSTOMER_ID=1234
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate the configuration before any processing starts
    pub fn validate(&self) -> Result<()> {
        if self.api.user_key.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::config(
                "the \"api.user_key\" parameter has to be provided",
            ));
        }
        if self.api.customer_id.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::config(
                "the \"api.customer_id\" parameter has to be provided",
            ));
        }
        if self.io.source_table.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::config(
                "exactly one source table needs to be specified in \"io.source_table\"",
            ));
        }
        if self.columns.id.is_empty() || self.columns.text.is_empty() {
            return Err(AppError::config(
                "the \"columns.id\" and \"columns.text\" are required parameters",
            ));
        }
        if self.analysis.feedback_entities.is_empty() && self.analysis.feedback_relations.is_empty()
        {
            return Err(AppError::config(
                "invalid \"feedback_entities\" or \"feedback_relations\" parameter",
            ));
        }
        for id_col in &self.columns.id {
            if RESERVED_COLUMNS.contains(&id_col.as_str()) {
                return Err(AppError::config(format!(
                    "invalid \"columns.id\" parameter, value \"{id_col}\" is a reserved name"
                )));
            }
        }
        if self.analysis.worker_count > MAX_WORKER_COUNT {
            return Err(AppError::config(format!(
                "the \"worker_count\" parameter can not be greater than {MAX_WORKER_COUNT}"
            )));
        }
        if self.analysis.worker_count == 0 {
            return Err(AppError::config(
                "the \"worker_count\" parameter has to be at least 1",
            ));
        }
        if self.analysis.doc_batch_size == 0 {
            return Err(AppError::config(
                "the \"doc_batch_size\" parameter has to be at least 1",
            ));
        }
        if let Some(date) = &self.api.reference_date {
            chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                AppError::config(format!(
                    "invalid \"reference_date\" parameter, \"{date}\" is not a YYYY-MM-DD date"
                ))
            })?;
        }
        Ok(())
    }

    /// The analysis endpoint for this run
    pub fn endpoint(&self) -> &str {
        if self.api.use_beta {
            &self.api.beta_url
        } else {
            &self.api.base_url
        }
    }

    /// The service credential (validated to be present)
    pub fn user_key(&self) -> Result<&str> {
        self.api
            .user_key
            .as_deref()
            .ok_or_else(|| AppError::config("the \"api.user_key\" parameter has to be provided"))
    }

    /// The customer identifier (validated to be present)
    pub fn customer_id(&self) -> Result<&str> {
        self.api.customer_id.as_deref().ok_or_else(|| {
            AppError::config("the \"api.customer_id\" parameter has to be provided")
        })
    }

    /// Entity types qualifying for the polarity split, normalized
    pub fn feedback_entity_types(&self) -> HashSet<String> {
        self.analysis
            .feedback_entities
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Relation types qualifying for the polarity split, normalized
    pub fn feedback_relation_types(&self) -> HashSet<String> {
        self.analysis
            .feedback_relations
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl IoConfig {
    /// Full path of the source table
    pub fn source_table_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
            .join("in")
            .join("tables")
            .join(self.source_table.as_deref().unwrap_or_default())
    }

    /// Directory holding the output tables
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("out").join("tables")
    }

    /// Full path of an output table
    pub fn output_table_path(&self, filename: &str) -> PathBuf {
        self.output_dir().join(filename)
    }

    /// Full path of the usage snapshot
    pub fn usage_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("out").join("usage.json")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: default_base_url(),
                beta_url: default_beta_url(),
                use_beta: false,
                user_key: None,
                customer_id: None,
                correction: default_correction(),
                diacritization: default_diacritization(),
                language: None,
                domain: None,
                reference_date: None,
                timeout_secs: default_timeout(),
                max_retries: default_max_retries(),
            },
            columns: ColumnConfig::default(),
            analysis: AnalysisConfig {
                feedback_entities: Vec::new(),
                feedback_relations: Vec::new(),
                doc_batch_size: default_doc_batch_size(),
                worker_count: default_worker_count(),
            },
            io: IoConfig {
                data_dir: default_data_dir(),
                source_table: None,
            },
        }
    }
}
