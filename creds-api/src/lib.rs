pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod model;
pub mod operations;
pub mod request;
pub mod response;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod testutils;

use crate::config::{Config, ValidationError};
use crate::errors::ApiError;
use crate::model::RecordLayout;
use crate::operations::Credentials;
use crate::request::ProxyEvent;
use crate::response::{ApiResponse, ProxyResult};
use crate::router::Router;
use crate::service::CredsService;
use crate::store::StoreError;
use shared::admin_service::AdminService;
use shared::http::run_http_service;

#[derive(thiserror::Error, Debug)]
pub enum CredsApiError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
}

async fn build_router(config: &Config) -> Result<Router, StoreError> {
    let store = store::shared_store(&config.store).await?;
    let credentials = Credentials::new(store, RecordLayout::from(&config.store));
    Ok(Router::new(credentials, config.collection_path.clone()))
}

/// Serves the API and the admin endpoints until either listener fails.
pub async fn run(config: Config) -> Result<(), CredsApiError> {
    config.validate()?;
    let router = build_router(&config).await?;

    let api_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        CredsService::new(router),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, CredsApiError>::new(store::is_initialized),
    );

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

/// Handles a single API gateway proxy event. Failures are always rendered
/// into the result rather than returned.
pub async fn handle_event(event: ProxyEvent, config: &Config) -> ProxyResult {
    let response = match build_router(config).await {
        Ok(router) => match event.into_request() {
            Some(request) => router.route(request).await.1,
            None => ApiResponse::from(ApiError::RouteNotFound),
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize the credential store");
            ApiResponse::from(ApiError::Unexpected(e.to_string()))
        }
    };

    response.into_proxy_result()
}
