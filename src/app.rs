#![cfg(feature = "web")]
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::charts;
use crate::config::Config;
use crate::loader;
use crate::session::{SESSION_COOKIE, SessionStore};
use crate::stats;
use crate::storage::{FileSystemStorage, StorageError, UPLOAD_DIR};
use crate::views::{
    DASHBOARD_TEMPLATE, DashboardView, INDEX_TEMPLATE, Templates, UPLOAD_TEMPLATE, UploadView,
    ViewError, summary_html, table_html,
};

pub const PATH_INDEX: &str = "/";
pub const PATH_UPLOAD: &str = "/upload/";
pub const PATH_DASHBOARD: &str = "/dashboard/";
pub const PATH_FILTERED_DATA: &str = "/filtered-data/";

pub const ONLY_CSV_ERROR: &str = "Only CSV files are allowed.";
pub const UPLOAD_PROCESSING_ERROR: &str = "Error processing the file";
pub const NO_FILE_ERROR: &str = "No file uploaded yet!";
pub const NO_FILE_JSON_ERROR: &str = "No file uploaded yet.";
pub const FILTER_ERROR: &str = "Error processing the filter.";

/// Rows and columns shown in the post-upload preview
pub const PREVIEW_ROWS: usize = 5;
pub const PREVIEW_COLS: usize = 5;

/// Rows of the full table shown on the dashboard
pub const DASHBOARD_ROWS: usize = 5;

/// Filter value that disables category filtering
pub const FILTER_ALL: &str = "all";

/// Column the filtered-data endpoint matches against
pub const CATEGORY_COLUMN: &str = "Category";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    View(#[from] ViewError),
}

/// Everything the handlers share
pub struct AppState {
    pub config: Config,
    pub storage: FileSystemStorage,
    pub sessions: SessionStore,
    pub templates: Templates,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let storage = FileSystemStorage::new(&config.media_root, &config.media_url)?;
        let sessions = SessionStore::new(config.session_ttl);
        let templates = Templates::new()?;
        Ok(AppState {
            config,
            storage,
            sessions,
            templates,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    FILTER_ALL.to_string()
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    // Only the uploads themselves are public, not the rest of the media root
    let media = ServeDir::new(state.storage.upload_dir());
    let media_path = format!(
        "{}/{}",
        state.config.media_url.trim_end_matches('/'),
        UPLOAD_DIR
    );

    Router::new()
        .route(PATH_INDEX, get(serve_index))
        .route(PATH_UPLOAD, get(serve_upload).post(upload_file))
        .route(PATH_DASHBOARD, get(dashboard))
        .route(PATH_FILTERED_DATA, get(filtered_data))
        .nest_service(&media_path, media)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    // Start server
    let listener = TcpListener::bind(bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index(State(state): State<Arc<AppState>>) -> Response {
    render_page(&state, INDEX_TEMPLATE, &json!({}))
}

async fn serve_upload(State(state): State<Arc<AppState>>) -> Response {
    render_page(&state, UPLOAD_TEMPLATE, &UploadView::default())
}

#[axum::debug_handler]
async fn upload_file(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            log::warn!("upload without a multipart body: {}", e);
            return render_page(&state, UPLOAD_TEMPLATE, &UploadView::default());
        }
    };
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(data) if !file_name.is_empty() => upload = Some((file_name, data.to_vec())),
            Ok(_) => {}
            Err(e) => {
                log::warn!("failed to read uploaded file {}: {}", file_name, e);
                let view = UploadView::error(UPLOAD_PROCESSING_ERROR);
                return render_page(&state, UPLOAD_TEMPLATE, &view);
            }
        }
    }

    let Some((file_name, data)) = upload else {
        return render_page(&state, UPLOAD_TEMPLATE, &UploadView::default());
    };

    let existing = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let session_id = existing
        .clone()
        .unwrap_or_else(SessionStore::new_session_id);
    let view = process_upload(
        &state.storage,
        &state.sessions,
        &session_id,
        &file_name,
        &data,
    );

    // A cookie is only handed out once a file is attached to the session
    let jar = match existing {
        None if view.error.is_none() => jar.add(session_cookie(session_id)),
        _ => jar,
    };
    (jar, render_page(&state, UPLOAD_TEMPLATE, &view)).into_response()
}

async fn dashboard(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let file_path = session_file(&state, &jar);
    let view = build_dashboard(file_path.as_deref());
    render_page(&state, DASHBOARD_TEMPLATE, &view)
}

async fn filtered_data(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<FilterQuery>,
) -> Json<JsonValue> {
    let file_path = session_file(&state, &jar);
    Json(filter_rows(file_path.as_deref(), &params.filter))
}

/// Validate, store and preview one uploaded file.
///
/// Only names ending in `.csv` are accepted; anything else is rejected
/// before the storage adapter is touched. On success expired sessions are
/// dropped and the session is pointed at the stored file.
///
/// # Arguments
/// * `storage` - Where accepted files are written
/// * `sessions` - Session store updated on success
/// * `session_id` - Session of the uploading client
/// * `file_name` - Name the client supplied
/// * `content` - Raw file bytes
///
/// # Returns
/// * `UploadView` - Either the preview and file URL, or a user-facing error
pub fn process_upload(
    storage: &FileSystemStorage,
    sessions: &SessionStore,
    session_id: &str,
    file_name: &str,
    content: &[u8],
) -> UploadView {
    if !file_name.ends_with(".csv") {
        log::warn!("rejected upload {}: not a .csv file", file_name);
        return UploadView::error(ONLY_CSV_ERROR);
    }

    let dataset = match storage.save(file_name, content) {
        Ok(dataset) => dataset,
        Err(e) => {
            log::error!("could not store upload {}: {}", file_name, e);
            return UploadView::error(UPLOAD_PROCESSING_ERROR);
        }
    };

    let table = match loader::from_csv(&dataset.file.path) {
        Ok(table) => table,
        Err(e) => {
            log::error!("could not parse upload {}: {}", dataset.file.name, e);
            return UploadView::error(UPLOAD_PROCESSING_ERROR);
        }
    };

    let preview = table.preview(PREVIEW_ROWS, PREVIEW_COLS);
    let purged = sessions.purge_expired();
    if purged > 0 {
        log::debug!("dropped {} expired sessions", purged);
    }
    sessions.set_file(session_id, &dataset.file.path);

    UploadView {
        error: None,
        file_path: Some(dataset.file.url),
        preview_columns: preview.column_names().into_iter().map(String::from).collect(),
        preview_data: preview.records(),
    }
}

/// Assemble the dashboard for the file a session last uploaded
pub fn build_dashboard(file_path: Option<&Path>) -> DashboardView {
    let Some(path) = file_path else {
        return DashboardView::error(NO_FILE_ERROR);
    };

    let table = match loader::from_csv(path) {
        Ok(table) => table,
        Err(e) => {
            log::error!("could not read dataset {}: {}", path.display(), e);
            return DashboardView::error(format!("Error reading the dataset: {}", e));
        }
    };

    let summary = stats::describe(&table);
    let charts = charts::generate_charts(&table);

    DashboardView {
        error: None,
        df: Some(table_html(&table.head(DASHBOARD_ROWS))),
        summary_stats_dict: summary.to_map(),
        summary_stats_html: Some(summary_html(&summary)),
        bar_graph: charts.bar,
        pie_graph: charts.pie,
        hist_graph: charts.histogram,
        scatter_graph: charts.scatter,
    }
}

/// Rows of the session's file as JSON, optionally restricted to one category.
///
/// The filter applies only when it is not `all` and the table has a
/// `Category` column; matching is exact.
pub fn filter_rows(file_path: Option<&Path>, filter: &str) -> JsonValue {
    let Some(path) = file_path else {
        return json!({ "error": NO_FILE_JSON_ERROR });
    };

    let table = match loader::from_csv(path) {
        Ok(table) => table,
        Err(e) => {
            log::error!("could not filter dataset {}: {}", path.display(), e);
            return json!({ "error": FILTER_ERROR });
        }
    };

    let rows = if filter == FILTER_ALL {
        table.records()
    } else {
        match table.filter_eq(CATEGORY_COLUMN, filter) {
            Some(filtered) => filtered.records(),
            None => table.records(),
        }
    };

    json!({ "data": rows })
}

fn render_page<T: Serialize>(state: &AppState, template: &str, view: &T) -> Response {
    match state.templates.render(template, view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            log::error!("failed to render {} page: {}", template, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

fn session_file(state: &AppState, jar: &CookieJar) -> Option<PathBuf> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.file_for(cookie.value()))
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}
