use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_u16, parse_u32, parse_u64, parse_usize,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExecutionSettings,
    QuizSettings, RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("QUIZFORGE_HOST", "0.0.0.0");
        let port = env_or_default("QUIZFORGE_PORT", "8000");

        let environment =
            parse_environment(env_optional("QUIZFORGE_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("QUIZFORGE_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "QuizForge API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "quizforge");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "quizforge_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o-mini");
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "64"))?;
        let ai_temperature =
            parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.0"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "30"))?;

        let piston_base_url =
            env_or_default("PISTON_BASE_URL", "https://emkc.org/api/v2/piston");
        let judge0_base_url = env_or_default("JUDGE0_BASE_URL", "https://ce.judge0.com");
        let execution_connect_timeout_seconds = parse_u64(
            "EXECUTION_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXECUTION_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;
        let execution_network_budget_seconds = parse_u64(
            "EXECUTION_NETWORK_BUDGET_SECONDS",
            env_or_default("EXECUTION_NETWORK_BUDGET_SECONDS", "10"),
        )?;
        let judge0_poll_interval_ms = parse_u64(
            "JUDGE0_POLL_INTERVAL_MS",
            env_or_default("JUDGE0_POLL_INTERVAL_MS", "500"),
        )?;
        let judge0_max_poll_attempts = parse_u32(
            "JUDGE0_MAX_POLL_ATTEMPTS",
            env_or_default("JUDGE0_MAX_POLL_ATTEMPTS", "10"),
        )?;
        let max_concurrent_cases = parse_usize(
            "EXECUTION_MAX_CONCURRENT_CASES",
            env_or_default("EXECUTION_MAX_CONCURRENT_CASES", "4"),
        )?;

        let draft_ttl_seconds =
            parse_u64("QUIZ_DRAFT_TTL_SECONDS", env_or_default("QUIZ_DRAFT_TTL_SECONDS", "86400"))?;

        let log_level = env_or_default("QUIZFORGE_LOG_LEVEL", "info");
        let json = env_optional("QUIZFORGE_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                ai_model,
                ai_max_tokens,
                ai_temperature,
                ai_request_timeout,
            },
            execution: ExecutionSettings {
                piston_base_url,
                judge0_base_url,
                connect_timeout_seconds: execution_connect_timeout_seconds,
                network_budget_seconds: execution_network_budget_seconds,
                judge0_poll_interval_ms,
                judge0_max_poll_attempts,
                max_concurrent_cases,
            },
            quiz: QuizSettings { draft_ttl_seconds },
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

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn execution(&self) -> &ExecutionSettings {
        &self.execution
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.judge0_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "JUDGE0_POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        if self.execution.judge0_max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "JUDGE0_MAX_POLL_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.execution.max_concurrent_cases == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXECUTION_MAX_CONCURRENT_CASES",
                value: "0".to_string(),
            });
        }

        if !(self.ai.ai_temperature >= 0.0 && self.ai.ai_temperature <= 2.0) {
            return Err(ConfigError::InvalidValue {
                field: "AI_TEMPERATURE",
                value: self.ai.ai_temperature.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.ai.openai_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_BASE_URL"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn defaults_load_without_env() {
        std::env::set_var("SECRET_KEY", "test-secret");
        std::env::remove_var("QUIZFORGE_STRICT_CONFIG");
        std::env::remove_var("QUIZFORGE_ENV");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.server_port(), 8000);
        assert_eq!(settings.execution().judge0_max_poll_attempts, 10);
        assert_eq!(settings.execution().judge0_poll_interval_ms, 500);
        assert_eq!(settings.quiz().draft_ttl_seconds, 86_400);
        assert!(settings.api().api_v1_str.starts_with("/api"));
    }
}
