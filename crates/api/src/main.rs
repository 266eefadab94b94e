use std::sync::Arc;

use anyhow::Context;

use tribal_api::app::{build_app, services::AppServices};
use tribal_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    tribal_observability::init_with(config.log_format);

    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialise the store")?;
    if let Some(admin) = &config.admin {
        services
            .ensure_admin(&admin.email, &admin.password)
            .await
            .map_err(|e| anyhow::anyhow!("failed to provision the bootstrap admin: {e:?}"))?;
    }

    let app = build_app(Arc::new(services), config.cors_allow_origin.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
