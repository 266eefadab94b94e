//! Service wiring: store selection, token codecs, pricing and the chat hub.

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use tribal_auth::{hash_password, normalize_email, Hs256JwtIssuer, Hs256JwtValidator, JwtValidator, User};
use tribal_infra::{MemoryStore, PostgresStore, RepositoryError, Store, UserRepository};
use tribal_orders::PricingPolicy;

use crate::app::chat::ChatHub;
use crate::app::errors::{ApiError, ApiResult};
use crate::config::AppConfig;

const ADMIN_DISPLAY_NAME: &str = "Administrator";

pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub jwt: Arc<dyn JwtValidator>,
    pub issuer: Hs256JwtIssuer,
    pub pricing: PricingPolicy,
    pub chat: ChatHub,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn Store>,
        jwt_secret: &SecretString,
        jwt_ttl: chrono::Duration,
        pricing: PricingPolicy,
    ) -> Self {
        let secret = jwt_secret.expose_secret().as_bytes();
        Self {
            store,
            jwt: Arc::new(Hs256JwtValidator::new(secret)),
            issuer: Hs256JwtIssuer::new(secret, jwt_ttl),
            pricing,
            chat: ChatHub::new(),
        }
    }

    /// In-memory services with default pricing and a one-day token lifetime.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            &SecretString::from(jwt_secret.to_string()),
            chrono::Duration::days(1),
            PricingPolicy::default(),
        )
    }

    /// Connect to Postgres (running migrations) when configured, else fall back to memory.
    pub async fn from_config(config: &AppConfig) -> Result<Self, RepositoryError> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let store = PostgresStore::connect(url, config.database_max_connections).await?;
                tracing::info!(max_connections = config.database_max_connections, "using postgres store");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(store, &config.jwt_secret, config.jwt_ttl, config.pricing))
    }

    /// Create the bootstrap admin unless an account with that email exists.
    ///
    /// Returns true when a new admin was created.
    pub async fn ensure_admin(&self, email: &str, password: &SecretString) -> ApiResult<bool> {
        let email = normalize_email(email)?;
        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            if existing.role != tribal_auth::Role::Admin {
                tracing::warn!(user_id = %existing.id, "bootstrap admin email belongs to a non-admin account");
            }
            return Ok(false);
        }

        let hash = hash_password(password.expose_secret())?;
        let admin = User::provision_admin(ADMIN_DISPLAY_NAME, &email, hash, Utc::now())?;
        self.store.insert_user(&admin).await?;
        tracing::info!(user_id = %admin.id, "provisioned bootstrap admin");
        Ok(true)
    }

    /// Mint a bearer token for `user`.
    pub fn issue_token(&self, user: &User) -> ApiResult<String> {
        self.issuer
            .issue(user.id, user.role, Utc::now())
            .map_err(ApiError::internal)
    }
}
