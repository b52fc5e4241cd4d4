mod config;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Json, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use ivr_core::{IntentMapping, ResolveError, Resolver, RouteDecision, Service};
use ivr_dispatch::{DispatchError, IvrDispatcher, IvrRequest, MENU_TEXT};
use ivr_observability::AppMetrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use crate::config::GatewayConfig;
use crate::rate_limit::IpRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<IvrDispatcher>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: ivr_observability::MetricsSnapshot,
    intent_rules: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct IvrRequestBody {
    #[serde(rename = "sessionId", alias = "session_id")]
    session_id: Option<String>,
    #[serde(default)]
    digit: Option<Value>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Serialize)]
struct IvrResponseBody {
    #[serde(rename = "sessionId")]
    session_id: String,
    response: String,
}

#[derive(Debug, Serialize)]
struct ConversationResponseBody {
    #[serde(rename = "sessionId")]
    session_id: String,
    response: String,
    #[serde(flatten)]
    decision: Option<RouteDecision>,
}

#[derive(Debug, Serialize)]
struct ProviderResponseBody {
    #[serde(rename = "sessionId")]
    session_id: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct MenuResponseBody {
    response: &'static str,
}

#[derive(Debug, Serialize)]
struct IntentsResponseBody {
    intents: Vec<IntentMapping>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::MissingSession => {
                Self::bad_request("missing_session", "Missing sessionId")
            }
            DispatchError::Resolve(ResolveError::InvalidInput) => Self::bad_request(
                "invalid_input",
                "Provide exactly one of digit or query",
            ),
            DispatchError::Resolve(ResolveError::InvalidDigit(_)) => {
                Self::bad_request("invalid_digit", "Invalid option selected")
            }
            DispatchError::ProviderMissing { .. } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "processing_failed",
                message: "Failed to process request".to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "invalid_body"
        };

        Self {
            status,
            code,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({
                "error": self.code,
                "message": self.message
            })),
        )
            .into_response()
    }
}

pub async fn build_app() -> Result<Router> {
    build_app_with(GatewayConfig::from_env()).await
}

pub async fn build_app_with(config: GatewayConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let rules = config
        .load_rules()
        .context("failed to load intent rules")?;

    let source = config
        .rules_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "builtin".to_string());
    tracing::info!(rules = rules.len(), source = %source, "intent rules loaded");

    let dispatcher = Arc::new(IvrDispatcher::new(
        Resolver::new(Arc::new(rules)),
        metrics.clone(),
    ));

    let state = ApiState {
        dispatcher,
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        allowed_origins: Arc::new(config.allowed_origins.clone()),
        trust_forwarded_for: config.trust_forwarded_for,
    };

    Ok(build_router(state, config.max_body_bytes))
}

/// Binds `config.bind` and serves the gateway until the process stops.
pub async fn serve(config: GatewayConfig) -> Result<()> {
    let bind = config.bind.clone();
    let app = build_app_with(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "ivr gateway started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn build_router(state: ApiState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ivr/request", post(ivr_request))
        .route("/ivr/menu", get(ivr_menu))
        .route("/ivr/intents", get(ivr_intents))
        .route("/conversation/process", post(conversation_process))
        .route("/acs/process", post(acs_process))
        .route("/bap/process", post(bap_process))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        intent_rules: state.dispatcher.resolver().rules().len(),
    };
    (StatusCode::OK, Json(payload))
}

async fn ivr_request(
    State(state): State<ApiState>,
    payload: Result<Json<IvrRequestBody>, JsonRejection>,
) -> Result<Json<IvrResponseBody>, ApiError> {
    let Json(body) = payload?;
    let reply = state.dispatcher.handle(to_ivr_request(body)?)?;

    Ok(Json(IvrResponseBody {
        session_id: reply.session_id,
        response: reply.response,
    }))
}

async fn conversation_process(
    State(state): State<ApiState>,
    payload: Result<Json<IvrRequestBody>, JsonRejection>,
) -> Result<Json<ConversationResponseBody>, ApiError> {
    let Json(body) = payload?;
    let reply = state.dispatcher.handle(to_ivr_request(body)?)?;
    let decision = reply.decision().cloned();

    Ok(Json(ConversationResponseBody {
        session_id: reply.session_id,
        response: reply.response,
        decision,
    }))
}

async fn acs_process(
    State(state): State<ApiState>,
    payload: Result<Json<IvrRequestBody>, JsonRejection>,
) -> Result<Json<ProviderResponseBody>, ApiError> {
    provider_process(&state, Service::Account, payload)
}

async fn bap_process(
    State(state): State<ApiState>,
    payload: Result<Json<IvrRequestBody>, JsonRejection>,
) -> Result<Json<ProviderResponseBody>, ApiError> {
    provider_process(&state, Service::Agent, payload)
}

fn provider_process(
    state: &ApiState,
    service: Service,
    payload: Result<Json<IvrRequestBody>, JsonRejection>,
) -> Result<Json<ProviderResponseBody>, ApiError> {
    let Json(body) = payload?;
    let request = to_ivr_request(body)?;
    let digit = request
        .digit
        .ok_or_else(|| ApiError::bad_request("missing_digit", "Missing sessionId or digit"))?;

    let message = state.dispatcher.provider_reply(service, &digit)?;
    Ok(Json(ProviderResponseBody {
        session_id: request.session_id,
        message,
    }))
}

async fn ivr_menu() -> impl IntoResponse {
    Json(MenuResponseBody {
        response: MENU_TEXT,
    })
}

async fn ivr_intents(State(state): State<ApiState>) -> impl IntoResponse {
    Json(IntentsResponseBody {
        intents: state.dispatcher.intent_mapping(),
    })
}

fn to_ivr_request(body: IvrRequestBody) -> Result<IvrRequest, ApiError> {
    let session_id = body
        .session_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::from(DispatchError::MissingSession))?;

    Ok(IvrRequest {
        session_id,
        digit: body.digit.map(digit_text).transpose()?.flatten(),
        query: body.query,
    })
}

/// Keypads send digits as strings; some clients send bare numbers.
fn digit_text(value: Value) -> Result<Option<String>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(ApiError::from(DispatchError::Resolve(
            ResolveError::InvalidDigit(other.to_string()),
        ))),
    }
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:3000")]
    } else {
        origins
    };

    layer.allow_origin(AllowOrigin::list(origins))
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request, state.trust_forwarded_for);
    if !state.limiter.allow(&ip) {
        tracing::warn!(ip = %ip, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health" | "/ivr/menu")
}

fn request_ip(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        })
        .flatten();

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );

    response
}
