//! serve subcommand - upload form and analysis endpoint over HTTP

use crate::analyze_cli::{record_history, OutputArgs, SourceArgs};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use docgen::{AnalysisReport, History, Pipeline};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>VBA Macro Documentation</title></head>
<body>
<h1>VBA Macro Documentation</h1>
<form action="/analyze" method="post" enctype="multipart/form-data">
  <input type="file" name="file" accept=".xlsm,.xlsb,.xltm,.xlam,.zip" required>
  <button type="submit">Analyze</button>
</form>
</body>
</html>
"#;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

struct AppState {
    pipeline: Pipeline,
    history: Option<Mutex<History>>,
}

impl AppState {
    fn record(&self, report: &AnalysisReport) {
        let Some(history) = &self.history else {
            return;
        };
        match history.lock() {
            Ok(history) => record_history(&history, report),
            Err(e) => warn!("History lock poisoned: {}", e),
        }
    }
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let pipeline = args.output.pipeline(&args.source)?;
    let history = match History::open(&History::default_path()) {
        Ok(history) => Some(Mutex::new(history)),
        Err(e) => {
            warn!("History unavailable: {}", e);
            None
        }
    };

    info!("Artifacts under {}", pipeline.store().root().display());
    let app = router(Arc::new(AppState { pipeline, history }));

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    println!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/artifacts/{request_id}/{name}", get(artifact))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// JSON error body
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "artifact not found".to_string(),
        }
    }

    fn internal(e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisReport>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(ApiError::bad_request)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(ApiError::bad_request)?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(ApiError::bad_request("missing multipart field `file`"));
    };

    let report = state
        .pipeline
        .analyze(&file_name, &bytes)
        .await
        .map_err(ApiError::internal)?;
    state.record(&report);
    Ok(Json(report))
}

async fn artifact(
    State(state): State<Arc<AppState>>,
    Path((request_id, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::parse_str(&request_id).map_err(|_| ApiError::not_found())?;
    let path = state
        .pipeline
        .store()
        .locate(request_id, &name)
        .ok_or_else(ApiError::not_found)?;
    let bytes = tokio::fs::read(&path).await.map_err(ApiError::internal)?;
    Ok(([(header::CONTENT_TYPE, content_type(&name))], bytes).into_response())
}

fn content_type(name: &str) -> &'static str {
    if name.ends_with(".png") {
        "image/png"
    } else {
        "text/markdown; charset=utf-8"
    }
}
