use std::env;

use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8080"];

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("SECRET_KEY must be set")]
    MissingSecretKey,
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    api: ApiSettings,
    security: SecuritySettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    exam: ExamSettings,
    admin: AdminSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
    /// Expose raw error details in responses (non-production only).
    pub(crate) expose_error_detail: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) algorithm: String,
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
pub(crate) struct ExamSettings {
    /// Seconds past the exam window during which a submission is still accepted.
    pub(crate) submit_grace_seconds: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct AdminSettings {
    pub(crate) default_admin_username: String,
    pub(crate) default_admin_email: String,
    pub(crate) default_admin_password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("TRAINHUB_HOST", "0.0.0.0");
        let port = parse_u16("TRAINHUB_PORT", env_or_default("TRAINHUB_PORT", "8000"))?;

        let project_name = env_or_default("PROJECT_NAME", "TrainHub API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_prefix = env_or_default("API_PREFIX", "/api");
        let expose_error_detail =
            env_optional("EXPOSE_ERROR_DETAIL").map(|value| parse_bool(&value)).unwrap_or(false);

        let secret_key = env_optional("SECRET_KEY").ok_or(ConfigError::MissingSecretKey)?;
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "1440"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"));

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "trainhub");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "trainhub_db");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DB_MAX_CONNECTIONS", env_or_default("DB_MAX_CONNECTIONS", "10"))?;

        let submit_grace_seconds =
            parse_i64("SUBMIT_GRACE_SECONDS", env_or_default("SUBMIT_GRACE_SECONDS", "300"))?;

        let default_admin_username = env_or_default("DEFAULT_ADMIN_USERNAME", "admin");
        let default_admin_email = env_or_default("DEFAULT_ADMIN_EMAIL", "admin@trainhub.local");
        let default_admin_password = env_or_default("DEFAULT_ADMIN_PASSWORD", "");

        let log_level = env_or_default("TRAINHUB_LOG_LEVEL", "info");
        let json = env_optional("TRAINHUB_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Self {
            server: ServerSettings { host, port },
            api: ApiSettings { project_name, version, api_prefix, expose_error_detail },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
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
            exam: ExamSettings { submit_grace_seconds },
            admin: AdminSettings {
                default_admin_username,
                default_admin_email,
                default_admin_password,
            },
            telemetry: TelemetrySettings { log_level, json },
        })
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port
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

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            if !url.trim().is_empty() {
                return url.clone();
            }
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

fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn parse_u16(name: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_u32(name: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_u64(name: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_i64(name: &'static str, value: String) -> Result<i64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_cors_origins(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(raw) => raw
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        None => DEFAULT_CORS_ORIGINS.iter().map(|origin| origin.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_prefers_explicit_url() {
        let settings = DatabaseSettings {
            postgres_server: "db".to_string(),
            postgres_port: 5432,
            postgres_user: "user".to_string(),
            postgres_password: "pass".to_string(),
            postgres_db: "trainhub_db".to_string(),
            database_url: Some("postgresql://explicit/url".to_string()),
            max_connections: 10,
        };
        assert_eq!(settings.database_url(), "postgresql://explicit/url");
    }

    #[test]
    fn database_url_builds_from_parts() {
        let settings = DatabaseSettings {
            postgres_server: "db".to_string(),
            postgres_port: 5433,
            postgres_user: "user".to_string(),
            postgres_password: "pass".to_string(),
            postgres_db: "trainhub_db".to_string(),
            database_url: None,
            max_connections: 10,
        };
        assert_eq!(settings.database_url(), "postgresql://user:pass@db:5433/trainhub_db");
    }

    #[test]
    fn cors_origins_are_trimmed() {
        let origins =
            parse_cors_origins(Some("https://a.example/, http://b.example".to_string()));
        assert_eq!(origins, vec!["https://a.example", "http://b.example"]);
    }
}
