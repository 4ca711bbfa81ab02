//! HTTP Server for the walletcards API.
//!
//! Provides REST endpoints for CSV upload, rendering and PDF download.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                            |
//! |--------|-------------------|----------------------------------------|
//! | GET    | `/health`         | Health check                           |
//! | POST   | `/api/render`     | Upload CSV, get view + base64 PDF      |
//! | POST   | `/api/document`   | Upload CSV, get the PDF as attachment  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs          |
//!
//! When an access key is configured every `/api` route requires the
//! `x-access-key` header.

use axum::{
    extract::{Multipart, Request, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    middleware::{self, Next},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{empty_response, error_response, RenderResponse};
use crate::config::AppConfig;
use crate::document::{DOCUMENT_FILE_NAME, DOCUMENT_MIME};
use crate::error::{RenderError, ServerError, ServerResult};
use crate::models::Field;
use crate::transform::grouper::{Filter, Selection};
use crate::transform::pipeline::{render_bytes, RenderContext, RenderOptions, RenderOutput};

/// Header carrying the shared secret.
pub const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Shared-secret check in front of the API.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    key: Option<Arc<str>>,
}

impl AccessGate {
    /// A gate requiring `key`, or an open gate for `None`.
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.map(Arc::from),
        }
    }

    pub fn is_open(&self) -> bool {
        self.key.is_none()
    }

    pub fn check(&self, headers: &HeaderMap) -> ServerResult<()> {
        let Some(expected) = &self.key else {
            return Ok(());
        };
        let given = headers
            .get(ACCESS_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        if given == Some(expected.as_ref()) {
            Ok(())
        } else {
            Err(ServerError::Unauthorized)
        }
    }
}

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub ctx: Arc<RenderContext>,
    pub gate: AccessGate,
}

impl AppState {
    pub fn new(ctx: RenderContext, gate: AccessGate) -> Self {
        Self {
            ctx: Arc::new(ctx),
            gate,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Render(e @ RenderError::Csv(_)) => (StatusCode::BAD_REQUEST, e.user_message()),
            ServerError::Render(e @ RenderError::Schema(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.user_message())
            }
            ServerError::Render(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.user_message()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "A valid access key is required.".to_string(),
            ),
        };
        log_error(self.to_string());
        (status, Json(error_response(&message))).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(ACCESS_KEY_HEADER),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let api = Router::new()
        .route("/api/render", post(render_csv))
        .route("/api/document", post(download_document))
        .route("/api/logs", get(sse_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_access_key));

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = RenderContext::from_config(&config)?;
    let gate = AccessGate::new(config.access_key.clone());
    let gated = !gate.is_open();
    let app = router(AppState::new(ctx, gate));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("🚀 walletcards server running on http://localhost:{}", port);
    tracing::info!("   POST /api/render   - Upload CSV, get cards + PDF");
    tracing::info!("   POST /api/document - Upload CSV, download PDF");
    tracing::info!("   GET  /api/logs     - SSE log stream");
    tracing::info!("   GET  /health       - Health check");
    if gated {
        tracing::info!("🔒 /api requires the {} header", ACCESS_KEY_HEADER);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn require_access_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.gate.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "walletcards",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "render": "POST /api/render",
            "document": "POST /api/document",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Render endpoint: view and base64 PDF.
async fn render_csv(State(state): State<AppState>, multipart: Multipart) -> ServerResult<Response> {
    let form = UploadForm::read(multipart).await?;
    match run(&state, &form).await? {
        Rendered::Output(output) => Ok(Json(RenderResponse::from(*output)).into_response()),
        Rendered::Empty(message) => Ok(Json(empty_response(&message)).into_response()),
    }
}

/// Download endpoint: the PDF as an attachment.
async fn download_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Response> {
    let form = UploadForm::read(multipart).await?;
    match run(&state, &form).await? {
        Rendered::Output(output) => Ok((
            [
                (header::CONTENT_TYPE, DOCUMENT_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", DOCUMENT_FILE_NAME),
                ),
            ],
            output.document,
        )
            .into_response()),
        Rendered::Empty(message) => Ok(Json(empty_response(&message)).into_response()),
    }
}

enum Rendered {
    Output(Box<RenderOutput>),
    Empty(String),
}

async fn run(state: &AppState, form: &UploadForm) -> ServerResult<Rendered> {
    let options = form.options()?;
    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        form.file_name.as_deref().unwrap_or("unknown"),
        form.bytes.len()
    ));

    match render_bytes(&state.ctx, &form.bytes, options).await {
        Ok(output) => Ok(Rendered::Output(Box::new(output))),
        Err(e) if e.is_recoverable() => {
            log_info(e.to_string());
            Ok(Rendered::Empty(e.user_message()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    bytes: Vec<u8>,
    file_name: Option<String>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = UploadForm::default();
        let mut has_file = false;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                form.file_name = field.file_name().map(|s| s.to_string());
                form.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec();
                has_file = true;
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                form.fields.insert(name, value);
            }
        }

        if !has_file {
            return Err(ServerError::BadRequest("No file provided".to_string()));
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn field(&self, name: &str) -> ServerResult<Option<Field>> {
        match self.text(name) {
            None => Ok(None),
            Some(v) if v.eq_ignore_ascii_case("none") => Ok(None),
            Some(v) => v.parse().map(Some).map_err(ServerError::BadRequest),
        }
    }

    fn filter(&self, field: &str, value: &str) -> ServerResult<Option<Filter>> {
        match (self.field(field)?, self.text(value)) {
            (Some(field), Some(value)) => Ok(Filter::new(field, value)),
            _ => Ok(None),
        }
    }

    fn options(&self) -> ServerResult<RenderOptions> {
        let selection = Selection::new(
            self.filter("filterField", "filterValue")?,
            self.filter("secondaryField", "secondaryValue")?,
            self.field("groupBy")?,
        );
        let logos = !matches!(
            self.text("logos").map(str::to_lowercase).as_deref(),
            Some("false" | "0" | "off" | "no")
        );
        Ok(RenderOptions { selection, logos })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ScratchSpace;
    use crate::logo::LogoResolver;
    use axum::body::{to_bytes, Body};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const SCENARIO: &str = "Wallet Name,Wallet Address,Wallet Type\n\
                            Hot B,0xBBB,Software\n\
                            Cold A,0xAAA,Hardware\n";
    const BOUNDARY: &str = "walletcardsformboundary";

    fn app(key: Option<&str>) -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let ctx = RenderContext::new(
            LogoResolver::disabled(),
            ScratchSpace::new(dir.path()).unwrap(),
        );
        let state = AppState::new(ctx, AccessGate::new(key.map(String::from)));
        (dir, router(state))
    }

    fn upload(uri: &str) -> axum::http::request::Builder {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
    }

    fn form_body(csv: Option<&str>, fields: &[(&str, &str)]) -> Body {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        if let Some(csv) = csv {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"wallets.csv\"\r\n\
                 Content-Type: text/csv\r\n\r\n{}\r\n",
                BOUNDARY, csv
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        Body::from(body)
    }

    async fn send(router: Router, uri: &str, csv: Option<&str>, fields: &[(&str, &str)]) -> Response {
        let request = upload(uri).body(form_body(csv, fields)).unwrap();
        router.oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, router) = app(None);
        let response = router
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_render_returns_view_and_document() {
        let (_dir, router) = app(None);
        let response = send(router, "/api/render", Some(SCENARIO), &[("groupBy", "wallet-type")]).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["view"]["sections"][0]["key"], "Hardware");
        assert_eq!(body["view"]["sections"][1]["key"], "Software");
        assert_eq!(body["metadata"]["pageCount"], 2);
        assert_eq!(body["document"]["fileName"], "crypto_wallets.pdf");

        let pdf = STANDARD
            .decode(body["document"]["data"].as_str().unwrap())
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4"));
    }

    #[tokio::test]
    async fn test_document_download() {
        let (_dir, router) = app(None);
        let response = send(router, "/api/document", Some(SCENARIO), &[("logos", "false")]).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"crypto_wallets.pdf\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_missing_column_message() {
        let (_dir, router) = app(None);
        let response = send(router, "/api/render", Some("Wallet Name\nCold A\n"), &[]).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"], "The CSV file must have a column named 'Wallet Address'.");
    }

    #[tokio::test]
    async fn test_empty_selection_is_not_an_error() {
        let (_dir, router) = app(None);
        let response = send(
            router,
            "/api/render",
            Some(SCENARIO),
            &[("filterField", "wallet-name"), ("filterValue", "Nobody")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "empty");
        assert!(body["document"].is_null());
    }

    #[tokio::test]
    async fn test_all_filter_keeps_everything() {
        let (_dir, router) = app(None);
        let response = send(
            router,
            "/api/render",
            Some(SCENARIO),
            &[("filterField", "wallet-name"), ("filterValue", "All")],
        )
        .await;

        let body = json_body(response).await;
        assert_eq!(body["metadata"]["renderedWallets"], 2);
    }

    #[tokio::test]
    async fn test_access_key_required() {
        let (_dir, router) = app(Some("wallet123"));

        let denied = send(router.clone(), "/api/render", Some(SCENARIO), &[]).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let request = upload("/api/render")
            .header(ACCESS_KEY_HEADER, "wallet123")
            .body(form_body(Some(SCENARIO), &[]))
            .unwrap();
        let allowed = router.clone().oneshot(request).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        let health = router
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (_dir, router) = app(None);

        let no_file = send(router.clone(), "/api/render", None, &[("groupBy", "type")]).await;
        assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

        let bad_field = send(router, "/api/render", Some(SCENARIO), &[("groupBy", "color")]).await;
        assert_eq!(bad_field.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(bad_field).await["error"]
            .as_str()
            .unwrap()
            .contains("unknown field"));
    }

    #[test]
    fn test_gate() {
        let mut headers = HeaderMap::new();
        assert!(AccessGate::new(None).check(&headers).is_ok());

        let gate = AccessGate::new(Some("wallet123".into()));
        assert!(matches!(gate.check(&headers), Err(ServerError::Unauthorized)));

        headers.insert(ACCESS_KEY_HEADER, "wrong".parse().unwrap());
        assert!(gate.check(&headers).is_err());

        headers.insert(ACCESS_KEY_HEADER, "wallet123".parse().unwrap());
        assert!(gate.check(&headers).is_ok());
    }
}
