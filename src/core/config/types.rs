use thiserror::Error;

use crate::grading::aggregate::{ScoreWeights, ScoringMode};
use crate::grading::segment::PairingStrategy;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) security: SecuritySettings,
    pub(super) cors: CorsSettings,
    pub(super) database: DatabaseSettings,
    pub(super) redis: RedisSettings,
    pub(super) storage: StorageSettings,
    pub(super) s3: S3Settings,
    pub(super) ocr: OcrSettings,
    pub(super) feedback: FeedbackSettings,
    pub(super) scoring: ScoringSettings,
    pub(super) evaluation: EvaluationSettings,
    pub(super) admin: AdminSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(super) host: ServerHost,
    pub(super) port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) algorithm: String,
    pub(crate) login_rate_limit: u64,
    pub(crate) login_rate_window_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
    pub(crate) max_connections: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) db: u16,
    pub(crate) password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct StorageSettings {
    pub(crate) max_upload_size_mb: u64,
    pub(crate) answer_sheet_extensions: Vec<String>,
    pub(crate) answer_key_extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct S3Settings {
    pub(crate) endpoint: String,
    pub(crate) access_key: String,
    pub(crate) secret_key: String,
    pub(crate) bucket: String,
    pub(crate) region: String,
}

/// Google Cloud Vision and OCR post-processing.
#[derive(Debug, Clone)]
pub(crate) struct OcrSettings {
    pub(crate) vision_api_key: String,
    pub(crate) vision_base_url: String,
    pub(crate) vision_timeout_seconds: u64,
    pub(crate) vision_max_retries: u32,
    pub(crate) text_correction: bool,
}

/// OpenAI-compatible chat endpoint used for answer feedback and OCR text correction.
#[derive(Debug, Clone)]
pub(crate) struct FeedbackSettings {
    pub(crate) enabled: bool,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) timeout_seconds: u64,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f64,
    pub(crate) max_retries: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct ScoringSettings {
    pub(crate) weights: ScoreWeights,
    pub(crate) renormalize_weights: bool,
    pub(crate) mode: ScoringMode,
    pub(crate) pairing: PairingStrategy,
}

/// Background evaluation worker.
#[derive(Debug, Clone)]
pub(crate) struct EvaluationSettings {
    pub(crate) poll_interval_seconds: u64,
    pub(crate) concurrency: usize,
    pub(crate) stale_after_minutes: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct AdminSettings {
    pub(crate) first_admin_username: String,
    pub(crate) first_admin_password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(pub(super) String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(pub(super) u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl RedisSettings {
    pub(crate) fn redis_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

impl StorageSettings {
    pub(crate) fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl ServerHost {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }

        Ok(Self(value))
    }
}

impl ServerPort {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }

        Ok(Self(parsed))
    }
}
