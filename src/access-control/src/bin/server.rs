//! # Access Control HTTP Server
//!
//! Loads the policy tree once at startup and serves store lookups and access
//! checks. See [`access_control::config`] for the environment variables and
//! [`access_control::api`] for the endpoints.

use access_control::api::{create_admin_router, create_router, AppState};
use access_control::config::Config;
use access_control::gateway::{
    ClientCredentials, HttpGateway, IdentityProviderClient, PartnerDirectoryClient,
};
use access_control::{AccessResolver, PolicyLoader};

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gateway for one upstream, authenticated when credentials are configured
fn upstream_gateway(http: &HttpGateway, credentials: Option<&ClientCredentials>) -> HttpGateway {
    match credentials {
        Some(credentials) => http.clone().with_credentials(credentials.clone()),
        None => http.clone(),
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to read configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.http.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        name = %config.app.name,
        version = %config.app.version,
        env = %config.app.env,
        "Starting access-control server"
    );

    let loader = PolicyLoader::with_config(&config.policy.root_dir, config.policy.loader.clone());
    let store = Arc::new(
        loader
            .load()
            .await
            .with_context(|| format!("failed to load policy from {}", config.policy.root_dir.display()))?,
    );

    let upstream = &config.upstream;
    let http = HttpGateway::new(&upstream.transport).context("failed to build HTTP client")?;
    info!(
        identity_provider_auth = upstream.identity_provider_credentials.is_some(),
        partner_directory_auth = upstream.partner_directory_credentials.is_some(),
        "Configured upstream gateways"
    );

    let identity = IdentityProviderClient::new(
        &upstream.identity_provider_url,
        upstream.identity_provider_user_key.clone(),
        upstream_gateway(&http, upstream.identity_provider_credentials.as_ref()),
    )
    .context("invalid identity provider configuration")?;
    let partners = PartnerDirectoryClient::new(
        &upstream.partner_directory_url,
        upstream_gateway(&http, upstream.partner_directory_credentials.as_ref()),
    )
    .context("invalid partner directory configuration")?;

    let resolver = AccessResolver::new(
        Arc::clone(&store) as Arc<dyn access_control::RoleMappingSource>,
        Arc::new(identity),
        Arc::new(partners),
    );

    let app = create_router(AppState::new(store, resolver, config.app.version.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let admin_addr = SocketAddr::from(([0, 0, 0, 0], config.http.admin_port));

    info!(%addr, "Starting HTTP server");
    info!(addr = %admin_addr, "Starting admin server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("failed to bind {admin_addr}"))?;

    let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, create_admin_router().into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async { server.await.context("HTTP server error") },
        async { admin_server.await.context("admin server error") },
    )?;

    info!("Server shut down gracefully");
    Ok(())
}
