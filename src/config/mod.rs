use serde::Deserialize;
use std::env;

use crate::error::AuthError;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC signing secret. Absence is a deployment misconfiguration and
    /// fails startup; it is never defaulted, even in dev.
    pub secret: String,
    pub session_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AuthError::Internal(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("studio-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env("PORT", Some("8080"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AuthError::Internal(anyhow::anyhow!("Invalid PORT: {}", e))
                })?,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("studio"), is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", Some("redis://localhost:6379"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", None, is_prod)?,
                session_ttl_days: get_env("SESSION_TTL_DAYS", Some("7"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AuthError::Internal(anyhow::anyhow!("Invalid SESSION_TTL_DAYS: {}", e))
                    })?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
        };

        Ok(config)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AuthError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AuthError::Internal(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AuthError::Internal(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_get_env_default_in_dev() {
        assert_eq!(
            get_env("STUDIO_AUTH_TEST_UNSET_VAR", Some("fallback"), false).unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_get_env_required() {
        assert!(get_env("STUDIO_AUTH_TEST_UNSET_VAR", None, false).is_err());
        assert!(get_env("STUDIO_AUTH_TEST_UNSET_VAR", Some("fallback"), true).is_err());
    }
}
