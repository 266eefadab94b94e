//! Process configuration read from the environment (and `.env` when present).

use std::net::SocketAddr;

use axum::http::HeaderValue;
use secrecy::SecretString;
use thiserror::Error;

use tribal_core::Money;
use tribal_observability::LogFormat;
use tribal_orders::PricingPolicy;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Credentials for the bootstrap admin account.
#[derive(Debug)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: SecretString,
    /// True when `JWT_SECRET` was missing and the insecure default is in use.
    pub jwt_secret_is_default: bool,
    pub jwt_ttl: chrono::Duration,
    /// Unset means the in-memory store.
    pub database_url: Option<SecretString>,
    pub database_max_connections: u32,
    pub admin: Option<AdminBootstrap>,
    pub pricing: PricingPolicy,
    /// `None` allows any origin.
    pub cors_allow_origin: Option<HeaderValue>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside local development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr: SocketAddr = parse_or(var("BIND_ADDR"), "BIND_ADDR", "0.0.0.0:8080".parse().ok())?;
        let (jwt_secret, jwt_secret_is_default) = match var("JWT_SECRET") {
            Some(secret) => (SecretString::from(secret), false),
            None => (SecretString::from(DEV_JWT_SECRET.to_string()), true),
        };
        let ttl_minutes: i64 = parse_or(var("JWT_TTL_MINUTES"), "JWT_TTL_MINUTES", Some(1440))?;
        if ttl_minutes <= 0 {
            return Err(invalid("JWT_TTL_MINUTES", ttl_minutes.to_string(), "must be positive"));
        }
        let database_max_connections: u32 =
            parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", Some(10))?;
        if database_max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "0".into(), "must be at least 1"));
        }

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password: SecretString::from(password),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Incomplete("ADMIN_EMAIL", "ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("ADMIN_PASSWORD", "ADMIN_EMAIL")),
        };

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: Money::from_paise(parse_or(
                var("FREE_SHIPPING_THRESHOLD"),
                "FREE_SHIPPING_THRESHOLD",
                Some(defaults.free_shipping_threshold.paise()),
            )?),
            shipping_fee: Money::from_paise(parse_or(
                var("SHIPPING_FEE"),
                "SHIPPING_FEE",
                Some(defaults.shipping_fee.paise()),
            )?),
        };

        let cors_allow_origin = match var("CORS_ALLOW_ORIGIN") {
            None => None,
            Some(origin) if origin.trim() == "*" => None,
            Some(origin) => Some(
                HeaderValue::from_str(origin.trim())
                    .map_err(|e| invalid("CORS_ALLOW_ORIGIN", origin.clone(), e.to_string()))?,
            ),
        };

        let log_format = match var("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse().map_err(|e: String| invalid("LOG_FORMAT", raw.clone(), e))?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_is_default,
            jwt_ttl: chrono::Duration::minutes(ttl_minutes),
            database_url: var("DATABASE_URL").map(SecretString::from),
            database_max_connections,
            admin,
            pricing,
            cors_allow_origin,
            log_format,
        })
    }
}

fn invalid(name: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        value,
        reason: reason.into(),
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match (raw, default) {
        (Some(raw), _) => raw.trim().parse().map_err(|e: T::Err| invalid(name, raw.clone(), e.to_string())),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(invalid(name, String::new(), "no value and no default")),
    }
}
