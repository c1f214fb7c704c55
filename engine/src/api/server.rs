//! HTTP server for the impex API.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                         |
//! |--------|-----------------------|-------------------------------------|
//! | GET    | `/health`             | Health check                        |
//! | GET    | `/api/models`         | Importable/exportable models        |
//! | GET    | `/api/export/{model}` | Download a model's records as CSV   |
//! | POST   | `/api/import/{model}` | Upload CSV, run as `UPDATE <model>` |
//! | POST   | `/api/import`         | Upload impex scripts                |
//! | GET    | `/api/import/status`  | Current import, if any              |
//! | GET    | `/api/logs`           | SSE stream for real-time logs       |

use axum::{
    extract::{Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_success, LOG_BROADCASTER};
use super::types::{error_response, ImportResponse, ImportStatus, ModelInfo};
use crate::command::CommandRegistry;
use crate::encode::encode_to_string;
use crate::input::normalize;
use crate::model::{Capabilities, Model as _, ModelRegistry};
use crate::script::{ScriptRunner, ScriptSummary};

type ApiError = (StatusCode, Json<Value>);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelRegistry>,
    pub commands: Arc<CommandRegistry>,
    importing: Arc<Mutex<Option<(String, usize)>>>,
}

impl AppState {
    pub fn new(models: Arc<ModelRegistry>, commands: Arc<CommandRegistry>) -> Self {
        AppState {
            models,
            commands,
            importing: Arc::new(Mutex::new(None)),
        }
    }
}

/// One import at a time. Releases the slot when dropped, so every exit
/// path of a handler frees it.
struct ImportLatch {
    slot: Arc<Mutex<Option<(String, usize)>>>,
}

impl ImportLatch {
    fn acquire(slot: &Arc<Mutex<Option<(String, usize)>>>) -> Result<Self, String> {
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((file, _)) = guard.as_ref() {
            return Err(file.clone());
        }
        *guard = Some((String::new(), 0));
        Ok(ImportLatch {
            slot: Arc::clone(slot),
        })
    }

    fn set_file(&self, name: &str, size: usize) {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some((name.to_string(), size));
    }
}

impl Drop for ImportLatch {
    fn drop(&mut self) {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

/// Start the HTTP server
pub async fn start_server(
    port: u16,
    models: Arc<ModelRegistry>,
    commands: Arc<CommandRegistry>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let state = AppState::new(models, commands);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/models", get(list_models))
        .route("/api/export/{model}", get(export_model))
        .route("/api/import/{model}", post(import_model))
        .route("/api/import", post(import_script))
        .route("/api/import/status", get(import_status))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("impex server running on http://localhost:{}", port);
    println!("   GET  /api/models          - registered models");
    println!("   GET  /api/export/{{model}}  - export model as CSV");
    println!("   POST /api/import/{{model}}  - import CSV into model");
    println!("   POST /api/import          - run impex scripts");
    println!("   GET  /api/logs            - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "impex",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Models that can take part in import/export
async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    let mut result = Vec::new();
    for name in state.models.names() {
        if let Ok(model) = state.models.get(&name) {
            let capabilities = model.capabilities();
            if capabilities.storable && capabilities.object {
                result.push(ModelInfo {
                    name,
                    capabilities: capabilities.into(),
                });
            }
        }
    }
    Json(result)
}

/// Stream a model's records as a downloadable CSV
async fn export_model(
    State(state): State<AppState>,
    Path(model_name): Path<String>,
) -> Result<([(header::HeaderName, String); 2], String), ApiError> {
    let needed = Capabilities {
        listable: true,
        object: true,
        ..Capabilities::default()
    };
    let model = state.models.require(&model_name, needed).map_err(|e| {
        (StatusCode::NOT_FOUND, Json(error_response(&e.to_string())))
    })?;

    // the engine is synchronous, keep it off the async workers
    let csv_text = tokio::task::spawn_blocking(move || {
        let records = model.list_records()?;
        encode_to_string(&records).map_err(crate::error::ImpexError::from)
    })
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_response(&e.to_string())),
        )
    })?
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_response(&e.to_string())),
        )
    })?;

    let filename = export_filename(&model_name);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment;filename={filename}"),
            ),
        ],
        csv_text,
    ))
}

/// Timestamped download name, model part lowercased.
fn export_filename(model: &str) -> String {
    format!(
        "{}_export_{}.csv",
        model.to_lowercase(),
        chrono::Utc::now().to_rfc3339()
    )
}

/// Read every uploaded file from a multipart body.
async fn collect_files(multipart: &mut Multipart) -> Result<Vec<(String, Vec<u8>)>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(error_response(&format!("multipart error: {e}"))),
        )
    })? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(error_response(&format!("read error: {e}"))),
            )
        })?;
        files.push((file_name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(error_response("no file provided")),
        ));
    }
    Ok(files)
}

fn busy_response(file: String) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(error_response(&format!(
            "another import is in progress, currently processing {file}"
        ))),
    )
}

async fn run_files<F>(
    state: &AppState,
    latch: &ImportLatch,
    files: Vec<(String, Vec<u8>)>,
    run: F,
) -> Result<Json<ImportResponse>, ApiError>
where
    F: Fn(Arc<CommandRegistry>, Arc<ModelRegistry>, String) -> crate::error::ImpexResult<ScriptSummary>
        + Clone
        + Send
        + 'static,
{
    let mut processed = 0usize;
    let mut failed = false;
    let mut total = ScriptSummary::default();

    for (file_name, bytes) in files {
        latch.set_file(&file_name, bytes.len());

        let commands = Arc::clone(&state.commands);
        let models = Arc::clone(&state.models);
        let run = run.clone();
        let result = tokio::task::spawn_blocking(move || {
            let content = normalize(&bytes);
            run(commands, models, content)
        })
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response(&e.to_string())),
            )
        })?;

        match result {
            Ok(summary) => {
                log_success(format!(
                    "{}: {} record(s) in {} block(s)",
                    file_name, summary.records, summary.blocks
                ));
                total.blocks += summary.blocks;
                total.records += summary.records;
                total.errors += summary.errors;
                processed += 1;
            }
            Err(err) => {
                log_error(format!("{file_name}: {err}"));
                failed = true;
            }
        }
    }

    Ok(Json(ImportResponse::new(processed, total, failed)))
}

/// Upload CSV data files and run each as an `UPDATE <model>` block
async fn import_model(
    State(state): State<AppState>,
    Path(model_name): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let latch = ImportLatch::acquire(&state.importing).map_err(busy_response)?;
    let files = collect_files(&mut multipart).await?;

    run_files(&state, &latch, files, move |commands, models, content| {
        let runner = ScriptRunner::new(&commands, &models);
        runner.run_command(&format!("UPDATE {model_name}"), content.as_bytes())
    })
    .await
}

/// Upload impex script files and run them
async fn import_script(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let latch = ImportLatch::acquire(&state.importing).map_err(busy_response)?;
    let files = collect_files(&mut multipart).await?;

    run_files(&state, &latch, files, |commands, models, content| {
        let runner = ScriptRunner::new(&commands, &models);
        runner.run_script(content.as_bytes())
    })
    .await
}

/// Current import, if one is running
async fn import_status(State(state): State<AppState>) -> Json<ImportStatus> {
    let guard = state.importing.lock().unwrap_or_else(|e| e.into_inner());
    let status = match guard.as_ref() {
        Some((file, size)) => ImportStatus::processing(file.clone(), *size),
        None => ImportStatus::idle(),
    };
    Json(status)
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
