use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub pagination: PaginationConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which store implementation the composition root wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(StoreBackend::Postgres),
            "memory" | "mem" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub front_end_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub invite_expiry_hours: u64,
    pub reset_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("FRONT_END_URL") {
            self.server.front_end_url = v.trim_end_matches('/').to_string();
        }

        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = StoreBackend::parse(&v).unwrap_or(self.database.backend);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("INVITE_EXPIRY_HOURS") {
            self.security.invite_expiry_hours = v.parse().unwrap_or(self.security.invite_expiry_hours);
        }
        if let Ok(v) = env::var("RESET_EXPIRY_HOURS") {
            self.security.reset_expiry_hours = v.parse().unwrap_or(self.security.reset_expiry_hours);
        }

        // Pagination overrides
        if let Ok(v) = env::var("PAGINATION_DEFAULT_PAGE_SIZE") {
            self.pagination.default_page_size = v.parse().unwrap_or(self.pagination.default_page_size);
        }
        if let Ok(v) = env::var("PAGINATION_MAX_PAGE_SIZE") {
            self.pagination.max_page_size = v.parse().unwrap_or(self.pagination.max_page_size);
        }

        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                front_end_url: "http://localhost:5173".to_string(),
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: "postgresql://localhost:5432/formmaker".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "formmaker-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                invite_expiry_hours: 24 * 7,
                reset_expiry_hours: 24,
            },
            pagination: PaginationConfig {
                default_page_size: 10,
                max_page_size: 100,
            },
            mail: MailConfig {
                from: "no-reply@localhost".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                front_end_url: "https://staging.formmaker.app".to_string(),
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: "postgresql://localhost:5432/formmaker".to_string(),
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.formmaker.app".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                invite_expiry_hours: 72,
                reset_expiry_hours: 1,
            },
            pagination: PaginationConfig {
                default_page_size: 10,
                max_page_size: 50,
            },
            mail: MailConfig {
                from: "no-reply@staging.formmaker.app".to_string(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                front_end_url: "https://formmaker.app".to_string(),
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: "postgresql://localhost:5432/formmaker".to_string(),
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://formmaker.app".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                invite_expiry_hours: 72,
                reset_expiry_hours: 1,
            },
            pagination: PaginationConfig {
                default_page_size: 10,
                max_page_size: 50,
            },
            mail: MailConfig {
                from: "no-reply@formmaker.app".to_string(),
            },
        }
    }

    /// Config used by tests: in-memory store and a fixed signing secret.
    pub fn for_tests() -> Self {
        let mut config = Self::development();
        config.database.backend = StoreBackend::Memory;
        config.security.jwt_secret = "formmaker-test-secret".to_string();
        config
    }

    pub fn is_development(&self) -> bool {
        matches!(self.environment, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}
