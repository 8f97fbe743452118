//! Pennywise Web Server
//!
//! Axum-based REST API exposing the receipt extraction and financial
//! analysis pipelines, plus reference data, currency conversion and the
//! theme preference.
//!
//! Security features:
//! - Restrictive CORS policy
//! - Upload size limit on receipt images
//! - Sanitized error responses (pipeline kind and retry hint, no internals)

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use pennywise_core::currency::{
    CachedRateProvider, CurrencyConverter, StalenessPolicy, StaticRateProvider,
};
use pennywise_core::pipeline::{FinancialAnalyzer, ReceiptScanner, RetryPolicy};
use pennywise_core::preferences::{
    default_cache_path, InMemoryProfileStore, LocalCache, PreferenceStore, ProfileStore,
};
use pennywise_core::{
    AIBackend, AIClient, ErrorKind, ModelSettings, Pipeline, PromptLibrary, ReferenceData,
};

mod handlers;

/// Maximum receipt upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Rate converter used by the server
pub type Converter = CurrencyConverter<CachedRateProvider<StaticRateProvider>>;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Model settings shared by both pipelines
    pub settings: ModelSettings,
    /// Lists that constrain receipt extraction
    pub reference: ReferenceData,
    /// Local theme cache file
    pub theme_cache: PathBuf,
    /// Remote profile; None means the user is signed out
    pub profile: Option<Arc<dyn ProfileStore>>,
    pub rate_policy: StalenessPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            settings: ModelSettings::default(),
            reference: ReferenceData::builtin(),
            theme_cache: default_cache_path().unwrap_or_else(|| PathBuf::from("theme.json")),
            profile: Some(Arc::new(InMemoryProfileStore::new())),
            rate_policy: StalenessPolicy::default(),
        }
    }
}

/// Shared application state
pub struct AppState {
    /// None when the model backend is not configured
    pub ai: Option<AIClient>,
    pub scanner: Option<ReceiptScanner>,
    pub analyzer: Option<FinancialAnalyzer>,
    pub reference: ReferenceData,
    pub currency: Converter,
    pub preferences: PreferenceStore,
}

impl AppState {
    pub fn new(ai: Option<AIClient>, config: &ServerConfig) -> Self {
        let prompts = Arc::new(RwLock::new(PromptLibrary::new()));
        let retry = RetryPolicy::from_settings(&config.settings);

        let scanner = ai.as_ref().map(|client| {
            ReceiptScanner::new(client.clone(), config.reference.clone())
                .with_prompts(Arc::clone(&prompts))
                .with_retry(retry)
        });
        let analyzer = ai.as_ref().map(|client| {
            FinancialAnalyzer::new(client.clone())
                .with_prompts(Arc::clone(&prompts))
                .with_retry(retry)
        });

        let local = LocalCache::new(config.theme_cache.clone());
        let preferences = match &config.profile {
            Some(remote) => PreferenceStore::with_remote(local, Arc::clone(remote)),
            None => PreferenceStore::local_only(local),
        };

        Self {
            ai,
            scanner,
            analyzer,
            reference: config.reference.clone(),
            currency: CurrencyConverter::new(CachedRateProvider::new(
                StaticRateProvider::builtin(),
                config.rate_policy,
            )),
            preferences,
        }
    }
}

/// Create the API router
pub fn create_router(ai: Option<AIClient>, static_dir: Option<&str>, config: ServerConfig) -> Router {
    match &ai {
        Some(client) => info!(
            "AI backend configured: {} (model: {})",
            client.host(),
            client.model()
        ),
        None => info!("ℹ️  AI backend not configured (set GEMINI_API_KEY to enable scanning and analysis)"),
    }

    let state = Arc::new(AppState::new(ai, &config));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/reference", get(handlers::get_reference))
        .route("/receipts/scan", post(handlers::scan_receipt))
        .route("/analysis", post(handlers::analyze_finances))
        .route("/currency/convert", get(handlers::convert_currency))
        .route("/currencies", get(handlers::list_currencies))
        .route(
            "/preferences/theme",
            get(handlers::get_theme).put(handlers::set_theme),
        );

    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server.
///
/// A missing API key does not stop the server; scanning and analysis
/// answer 503 until it is configured.
pub async fn serve(
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let ai = match AIClient::from_env_with(config.settings.clone()) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("⚠️  {}", e);
            None
        }
    };

    check_ai_connection(ai.as_ref()).await;

    let app = create_router(ai, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn check_ai_connection(ai: Option<&AIClient>) {
    match ai {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "✅ AI backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "⚠️  AI backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("ℹ️  AI backend not configured (set GEMINI_API_KEY to enable AI features)");
        }
    }
}

/// API error response
///
/// Pipeline failures carry their taxonomy kind and a retry hint so the UI
/// can decide between a retry button and guidance. Internal details are
/// logged, never returned.
pub struct AppError {
    status: StatusCode,
    message: String,
    kind: Option<ErrorKind>,
    fallback: Option<&'static str>,
    internal: Option<anyhow::Error>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<&'static str>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            kind: None,
            fallback: None,
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            kind: None,
            fallback: None,
            internal: None,
        }
    }

    /// The model backend is not configured
    pub fn not_configured() -> Self {
        Self::pipeline(pennywise_core::Error::Configuration(
            "GEMINI_API_KEY is not set".to_string(),
        ))
    }

    /// Map a pipeline failure onto a status code by its kind
    pub fn pipeline(err: pennywise_core::Error) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Invocation | ErrorKind::MalformedOutput | ErrorKind::Validation => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self {
            status,
            message: err.user_message(),
            kind: Some(kind),
            fallback: None,
            internal: Some(err.into()),
        }
    }

    /// Pipeline failure with the message worded for that pipeline
    pub fn pipeline_in(err: pennywise_core::Error, pipeline: Pipeline) -> Self {
        let message = err.user_message_in(pipeline);
        let mut app_err = Self::pipeline(err);
        app_err.message = message;
        app_err
    }

    /// Validation failures on caller input are the caller's fault (400)
    pub fn input(err: pennywise_core::Error) -> Self {
        if err.kind() == ErrorKind::Validation {
            Self {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
                kind: Some(ErrorKind::Validation),
                fallback: None,
                internal: None,
            }
        } else {
            Self::pipeline(err)
        }
    }

    /// Attach a user-facing fallback suggestion
    pub fn with_fallback(mut self, fallback: &'static str) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            if self.status.is_server_error() {
                error!(error = %err, status = %self.status, "Request failed");
            } else {
                warn!(error = %err, status = %self.status, "Request rejected");
            }
        }

        let body = ErrorBody {
            error: &self.message,
            kind: self.kind.map(|k| k.as_str()),
            retryable: self.kind.map(|k| k.is_retryable()).unwrap_or(false),
            fallback: self.fallback,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<pennywise_core::Error> for AppError {
    fn from(err: pennywise_core::Error) -> Self {
        Self::pipeline(err)
    }
}
