//! HTTP surface of the router.
//!
//! # Endpoints
//!
//! - `POST /event` - GitHub webhook ingestion (202)
//! - `POST /refresh/{owner}/{repo}/{*selector}` - refresh one repository (202)
//! - `POST /refresh` - refresh every installation (202 + summary)
//! - `DELETE /subscription-cache/{installation_id}` - reset a subscription (200)
//! - `GET /check_status_msg/{*key}` - render a cached status message
//! - `GET|POST|DELETE /events-testing` - capture deliveries for fixtures
//! - `GET /` - redirect to the app's public page
//! - `GET /health` - liveness
//!
//! `/check_status_msg`, `/` and `/health` are open. Every other endpoint
//! checks the `X-Hub-Signature` header first and answers 403 on failure.

use std::sync::Arc;

use axum::http::{StatusCode, header};
use axum::response::IntoResponse;

pub mod auth;
pub mod event;
pub mod events_testing;
pub mod health;
pub mod refresh;
pub mod status_msg;
pub mod subscription_cache;

pub use event::event_handler;
pub use health::health_handler;
pub use refresh::{refresh_all_handler, refresh_handler};
pub use status_msg::status_msg_handler;
pub use subscription_cache::subscription_cache_handler;

use crate::cache::{CacheInvalidator, CacheStore};
use crate::dispatch::Dispatcher;
use crate::github::SourceHost;
use crate::refresh::RefreshOrchestrator;
use crate::subscription::SubscriptionStore;

/// External collaborators the handlers talk to.
#[derive(Clone)]
pub struct Services {
    pub cache: Arc<dyn CacheStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub dispatcher: Dispatcher,
    pub host: Arc<dyn SourceHost>,
}

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Secret for HMAC-SHA1 signature verification.
    webhook_secret: Vec<u8>,

    /// Target of `GET /`.
    redirect_url: String,

    cache: Arc<dyn CacheStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    dispatcher: Dispatcher,
    invalidator: CacheInvalidator,
    refresher: RefreshOrchestrator,
}

impl AppState {
    /// Wires the handlers to their collaborators.
    ///
    /// `config_file` is the repository file whose presence enables refreshes.
    pub fn new(
        webhook_secret: impl Into<Vec<u8>>,
        redirect_url: impl Into<String>,
        config_file: impl Into<String>,
        services: Services,
    ) -> Self {
        let invalidator = CacheInvalidator::new(services.cache.clone());
        let refresher = RefreshOrchestrator::new(
            services.host,
            services.subscriptions.clone(),
            services.dispatcher.clone(),
            invalidator.clone(),
            config_file,
        );

        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                redirect_url: redirect_url.into(),
                cache: services.cache,
                subscriptions: services.subscriptions,
                dispatcher: services.dispatcher,
                invalidator,
                refresher,
            }),
        }
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn redirect_url(&self) -> &str {
        &self.inner.redirect_url
    }

    pub fn cache(&self) -> &dyn CacheStore {
        self.inner.cache.as_ref()
    }

    pub fn subscriptions(&self) -> &dyn SubscriptionStore {
        self.inner.subscriptions.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn invalidator(&self) -> &CacheInvalidator {
        &self.inner.invalidator
    }

    pub fn refresher(&self) -> &RefreshOrchestrator {
        &self.inner.refresher
    }
}

/// `GET /`: 302 to the configured page.
pub async fn index_handler(
    axum::extract::State(app_state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [(header::LOCATION, app_state.redirect_url().to_string())],
    )
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{delete, get, post};

    axum::Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/event", post(event_handler))
        .route("/refresh", post(refresh_all_handler))
        .route("/refresh/{owner}/{repo}/{*selector}", post(refresh_handler))
        .route(
            "/subscription-cache/{installation_id}",
            delete(subscription_cache_handler),
        )
        .route("/check_status_msg/{*key}", get(status_msg_handler))
        .route(
            "/events-testing",
            get(events_testing::replay_handler)
                .post(events_testing::record_handler)
                .delete(events_testing::clear_handler),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
