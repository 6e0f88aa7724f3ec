//! Application configuration

use std::env;

/// Which persistence backend the server runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local storage; contents are lost on restart
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND must be 'postgres' or 'memory'")),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_allowed_origins: Vec<String>,

    // Storage
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub admin_emails: Vec<String>,

    // Chat
    pub max_message_length: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage_backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
            cors_allowed_origins: split_list(
                &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),

            // Storage
            storage_backend,
            database_url,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            admin_emails: split_list(&env::var("ADMIN_EMAILS").unwrap_or_default())
                .into_iter()
                .map(|email| email.to_lowercase())
                .collect(),

            // Chat
            max_message_length: env::var("MAX_MESSAGE_LENGTH")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
        })
    }

    /// Whether a newly registered account with this email becomes an admin
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "STORAGE_BACKEND",
        "DATABASE_URL",
        "JWT_SECRET",
        "ADMIN_EMAILS",
        "CORS_ALLOWED_ORIGINS",
        "MAX_MESSAGE_LENGTH",
    ];

    fn cleanup_config() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    fn setup_minimal_config() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
    }

    #[test]
    #[serial]
    fn test_defaults() {
        setup_minimal_config();

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3001");
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.cors_allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.max_message_length, 5000);
        assert!(config.admin_emails.is_empty());

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_postgres_requires_database_url() {
        setup_minimal_config();
        env::remove_var("DATABASE_URL");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));

        // Memory backend does not need one
        env::set_var("STORAGE_BACKEND", "memory");
        let config = Config::from_env().unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert!(config.database_url.is_none());

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_weak_jwt_secret_rejected() {
        setup_minimal_config();
        env::set_var("JWT_SECRET", "too-short");

        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret(_))));

        env::remove_var("JWT_SECRET");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_invalid_storage_backend_rejected() {
        setup_minimal_config();
        env::set_var("STORAGE_BACKEND", "mongodb");

        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_admin_emails_are_case_insensitive() {
        setup_minimal_config();
        env::set_var("ADMIN_EMAILS", "Support@Example.com, ops@example.com ,");

        let config = Config::from_env().unwrap();
        assert_eq!(config.admin_emails.len(), 2);
        assert!(config.is_admin_email("support@example.com"));
        assert!(config.is_admin_email("OPS@example.com"));
        assert!(!config.is_admin_email("user@example.com"));

        cleanup_config();
    }
}
