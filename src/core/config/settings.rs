use super::parsing::{
    env_flag, env_optional, env_or_default, is_supported_document_extension, parse_cors_origins,
    parse_environment, parse_f64, parse_pairing, parse_scoring_mode, parse_string_list,
    parse_u16, parse_u32, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, EvaluationSettings,
    FeedbackSettings, OcrSettings, RedisSettings, RuntimeSettings, S3Settings, ScoringSettings,
    SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings, StorageSettings,
    TelemetrySettings,
};
use crate::grading::aggregate::{ScoreWeights, WeightsError};
use crate::grading::signals::{SignalKind, SIGNAL_COUNT};

/// Environment variables for the signal weights, in signal order.
const WEIGHT_VARS: [&str; SIGNAL_COUNT] = [
    "SCORE_WEIGHT_EXACT_MATCH",
    "SCORE_WEIGHT_PARTIAL_MATCH",
    "SCORE_WEIGHT_COSINE_SIMILARITY",
    "SCORE_WEIGHT_SENTIMENT",
    "SCORE_WEIGHT_ENHANCED_SENTENCE_MATCH",
    "SCORE_WEIGHT_LEXICAL_PROBABILITY",
    "SCORE_WEIGHT_SEMANTIC_SIMILARITY",
    "SCORE_WEIGHT_COHERENCE",
    "SCORE_WEIGHT_RELEVANCE",
];

/// Upper bound for the feedback call; a slow model must not hold up a whole answer sheet.
const MAX_FEEDBACK_TIMEOUT_SECONDS: u64 = 300;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("GRADEWISE_HOST", "0.0.0.0");
        let port = env_or_default("GRADEWISE_PORT", "8000");

        let environment = parse_environment(
            env_optional("GRADEWISE_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_flag("GRADEWISE_STRICT_CONFIG", false) || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Gradewise API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "1440"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");
        let login_rate_limit =
            parse_u64("LOGIN_RATE_LIMIT", env_or_default("LOGIN_RATE_LIMIT", "10"))?;
        let login_rate_window_seconds = parse_u64(
            "LOGIN_RATE_WINDOW_SECONDS",
            env_or_default("LOGIN_RATE_WINDOW_SECONDS", "60"),
        )?;

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "gradewise");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "gradewise");
        let database_url = env_optional("DATABASE_URL");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env_or_default("DATABASE_MAX_CONNECTIONS", "20"),
        )?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "20"))?;
        let answer_sheet_extensions = parse_string_list(
            env_optional("ANSWER_SHEET_EXTENSIONS"),
            &["pdf", "jpg", "jpeg", "png", "txt"],
        );
        let answer_key_extensions =
            parse_string_list(env_optional("ANSWER_KEY_EXTENSIONS"), &["docx", "txt", "pdf"]);

        let s3_endpoint = env_or_default("S3_ENDPOINT", "http://localhost:9000");
        let s3_access_key = env_or_default("S3_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("S3_SECRET_KEY", "");
        let s3_bucket = env_or_default("S3_BUCKET", "gradewise");
        let s3_region = env_or_default("S3_REGION", "us-east-1");

        let vision_api_key = env_or_default("VISION_API_KEY", "");
        let vision_base_url =
            env_or_default("VISION_BASE_URL", "https://vision.googleapis.com/v1");
        let vision_timeout_seconds =
            parse_u64("VISION_TIMEOUT_SECONDS", env_or_default("VISION_TIMEOUT_SECONDS", "120"))?;
        let vision_max_retries =
            parse_u32("VISION_MAX_RETRIES", env_or_default("VISION_MAX_RETRIES", "3"))?;
        let text_correction = env_flag("OCR_TEXT_CORRECTION", false);

        let feedback_enabled = env_flag("FEEDBACK_ENABLED", false);
        let feedback_base_url =
            env_or_default("FEEDBACK_BASE_URL", "http://localhost:11434/v1");
        let feedback_api_key = env_or_default("FEEDBACK_API_KEY", "");
        let feedback_model = env_or_default("FEEDBACK_MODEL", "mistral");
        let feedback_timeout_seconds = parse_u64(
            "FEEDBACK_TIMEOUT_SECONDS",
            env_or_default("FEEDBACK_TIMEOUT_SECONDS", "30"),
        )?;
        let feedback_max_tokens =
            parse_u32("FEEDBACK_MAX_TOKENS", env_or_default("FEEDBACK_MAX_TOKENS", "500"))?;
        let feedback_temperature =
            parse_f64("FEEDBACK_TEMPERATURE", env_or_default("FEEDBACK_TEMPERATURE", "0.3"))?;
        let feedback_max_retries =
            parse_u32("FEEDBACK_MAX_RETRIES", env_or_default("FEEDBACK_MAX_RETRIES", "1"))?;

        let weights = load_weights()?;
        let renormalize_weights = env_flag("SCORE_RENORMALIZE_WEIGHTS", true);
        let scoring_mode = parse_scoring_mode(env_optional("SCORING_MODE"))?;
        let pairing = parse_pairing(env_optional("ANSWER_PAIRING"))?;

        let poll_interval_seconds = parse_u64(
            "EVALUATION_POLL_INTERVAL_SECONDS",
            env_or_default("EVALUATION_POLL_INTERVAL_SECONDS", "2"),
        )?;
        let concurrency = parse_u64(
            "EVALUATION_CONCURRENCY",
            env_or_default("EVALUATION_CONCURRENCY", "4"),
        )? as usize;
        let stale_after_minutes = parse_u64(
            "EVALUATION_STALE_AFTER_MINUTES",
            env_or_default("EVALUATION_STALE_AFTER_MINUTES", "30"),
        )?;

        let first_admin_username = env_or_default("FIRST_ADMIN_USERNAME", "admin");
        let first_admin_password = env_or_default("FIRST_ADMIN_PASSWORD", "");

        let log_level = env_or_default("GRADEWISE_LOG_LEVEL", "info");
        let json = env_flag("GRADEWISE_LOG_JSON", false);
        let prometheus_enabled = env_flag("PROMETHEUS_ENABLED", false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                access_token_expire_minutes,
                algorithm,
                login_rate_limit,
                login_rate_window_seconds,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            storage: StorageSettings {
                max_upload_size_mb,
                answer_sheet_extensions,
                answer_key_extensions,
            },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
            },
            ocr: OcrSettings {
                vision_api_key,
                vision_base_url,
                vision_timeout_seconds,
                vision_max_retries,
                text_correction,
            },
            feedback: FeedbackSettings {
                enabled: feedback_enabled,
                base_url: feedback_base_url,
                api_key: feedback_api_key,
                model: feedback_model,
                timeout_seconds: feedback_timeout_seconds,
                max_tokens: feedback_max_tokens,
                temperature: feedback_temperature,
                max_retries: feedback_max_retries,
            },
            scoring: ScoringSettings { weights, renormalize_weights, mode: scoring_mode, pairing },
            evaluation: EvaluationSettings {
                poll_interval_seconds,
                concurrency,
                stale_after_minutes,
            },
            admin: AdminSettings { first_admin_username, first_admin_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn ocr(&self) -> &OcrSettings {
        &self.ocr
    }

    pub(crate) fn feedback(&self) -> &FeedbackSettings {
        &self.feedback
    }

    pub(crate) fn scoring(&self) -> &ScoringSettings {
        &self.scoring
    }

    pub(crate) fn evaluation(&self) -> &EvaluationSettings {
        &self.evaluation
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, extensions) in [
            ("ANSWER_SHEET_EXTENSIONS", &self.storage.answer_sheet_extensions),
            ("ANSWER_KEY_EXTENSIONS", &self.storage.answer_key_extensions),
        ] {
            if extensions.is_empty() {
                return Err(ConfigError::InvalidValue { field, value: String::from("<empty>") });
            }
            if let Some(extension) =
                extensions.iter().find(|extension| !is_supported_document_extension(extension))
            {
                return Err(ConfigError::InvalidValue { field, value: extension.clone() });
            }
        }

        if self.storage.max_upload_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_UPLOAD_SIZE_MB",
                value: "0".to_string(),
            });
        }

        if self.feedback.timeout_seconds == 0
            || self.feedback.timeout_seconds > MAX_FEEDBACK_TIMEOUT_SECONDS
        {
            return Err(ConfigError::InvalidValue {
                field: "FEEDBACK_TIMEOUT_SECONDS",
                value: self.feedback.timeout_seconds.to_string(),
            });
        }

        if self.evaluation.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EVALUATION_POLL_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.evaluation.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EVALUATION_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.s3.access_key.is_empty() || self.s3.secret_key.is_empty() {
            return Err(ConfigError::MissingSecret("S3_ACCESS_KEY/S3_SECRET_KEY"));
        }
        if self.admin.first_admin_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_ADMIN_PASSWORD"));
        }

        Ok(())
    }
}

fn load_weights() -> Result<ScoreWeights, ConfigError> {
    let mut values = ScoreWeights::default().as_array();
    for (value, field) in values.iter_mut().zip(WEIGHT_VARS) {
        if let Some(raw) = env_optional(field) {
            *value = parse_f64(field, raw)?;
        }
    }

    let weights = ScoreWeights::from_array(values);
    weights.validate().map_err(|err| match err {
        WeightsError::Invalid(signal) => {
            let index = SignalKind::ALL.iter().position(|kind| kind.as_str() == signal);
            match index {
                Some(index) => ConfigError::InvalidValue {
                    field: WEIGHT_VARS[index],
                    value: values[index].to_string(),
                },
                None => ConfigError::InvalidValue {
                    field: "SCORE_WEIGHT_*",
                    value: signal.to_string(),
                },
            }
        }
        WeightsError::AllZero => {
            ConfigError::InvalidValue { field: "SCORE_WEIGHT_*", value: "all zero".to_string() }
        }
    })?;
    Ok(weights)
}
