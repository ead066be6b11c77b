use crate::{
    api::handlers::{health, root},
    auth::{
        AuthConfig, PgCredentialStore, PgRevocationLedger, RevocationLedger, SessionManager,
        apply_schema, spawn_revocation_sweeper,
    },
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_REVOCATION_SWEEP_SECONDS: u64 = 60 * 60;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// HTTP server and pool settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    port: u16,
    dsn: String,
    db_max_connections: u32,
    request_timeout: Duration,
    allowed_origin: Option<String>,
    revocation_sweep_interval: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn new(port: u16, dsn: String) -> Self {
        Self {
            port,
            dsn,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            allowed_origin: None,
            revocation_sweep_interval: Duration::from_secs(DEFAULT_REVOCATION_SWEEP_SECONDS),
        }
    }

    #[must_use]
    pub fn with_db_max_connections(mut self, max_connections: u32) -> Self {
        self.db_max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_allowed_origin(mut self, origin: Option<String>) -> Self {
        self.allowed_origin = origin;
        self
    }

    #[must_use]
    pub fn with_revocation_sweep_interval(mut self, interval: Duration) -> Self {
        self.revocation_sweep_interval = interval;
        self
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(server: ServerConfig, auth_config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(server.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&server.dsn)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let store = Arc::new(PgCredentialStore::new(pool.clone()));
    let ledger: Arc<dyn RevocationLedger> = Arc::new(PgRevocationLedger::new(pool));
    let sessions = Arc::new(
        SessionManager::new(auth_config, store, ledger.clone())
            .context("Invalid password hashing parameters")?,
    );

    let sweeper = spawn_revocation_sweeper(ledger, server.revocation_sweep_interval);

    let cors = cors_layer(server.allowed_origin.as_deref())?;
    let app = app(sessions, server.request_timeout, cors).merge(
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()),
    );

    let listener = TcpListener::bind(format!("::0:{}", server.port)).await?;

    info!("Listening on [::]:{}", server.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    Ok(())
}

/// Router with every route and middleware layer, without binding a socket.
pub(crate) fn app(sessions: Arc<SessionManager>, request_timeout: Duration, cors: CorsLayer) -> Router {
    let (router, _openapi) = router().split_for_parts();
    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .layer(cors)
                .layer(Extension(sessions.clone())),
        )
        // Outside the layer stack so CORS does not answer `OPTIONS /health`.
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(Extension(sessions))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// CORS for the configured origin, or any origin when unset.
pub(crate) fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    match allowed_origin {
        Some(origin) => Ok(cors.allow_origin(AllowOrigin::exact(origin_header(origin)?))),
        None => Ok(cors.allow_origin(Any)),
    }
}

fn origin_header(origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(origin).with_context(|| format!("Invalid allowed origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Allowed origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build allowed origin header")
}
