mod config;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{Method, StatusCode, header},
    routing::{delete, get, post, put},
};
use base64::Engine;
use chrono::{Days, Local, NaiveDate};
use choreboard_shared::api;
pub use config::{AppConfig, ConfigError, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PHOTO_DIR};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info_span;
use uuid::Uuid;

use crate::completion::{CompleteError, PhotoInput, complete_assignment};
use crate::photos::{PhotoError, PhotoStore};
use crate::report::{DayProgress, Report};
use crate::storage::models::{AssignmentView, Chore, Completion};
use crate::storage::{AssignmentFilter, StorageError, Store};

/// Days covered by the report when the caller gives no start date.
const DEFAULT_REPORT_DAYS: u64 = 7;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub photos: Arc<dyn PhotoStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store, photos: Arc<dyn PhotoStore>) -> Self {
        Self {
            config,
            store,
            photos,
        }
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/version", get(api_version))
        .route("/people", get(api_list_people).post(api_add_person))
        .route("/chores", get(api_list_chores).post(api_add_chore))
        .route(
            "/days/{date}/assignments",
            get(api_day_assignments).delete(api_clear_day),
        )
        .route("/days/{date}/chores/{chore_id}", put(api_assign_chore))
        .route("/days/{date}/copy", post(api_copy_day))
        .route("/assignments/{id}", delete(api_delete_assignment))
        .route(
            "/assignments/{id}/complete",
            post(api_complete_assignment)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes())),
        )
        .route("/report", get(api_report))
        .route("/report.csv", get(api_report_csv))
        .route("/photos/{id}", get(api_photo));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .nest(api::API_V1_PREFIX, api_routes)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn api_version() -> Json<api::VersionDto> {
    Json(api::VersionDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );

    // Chore boards change constantly; photos are immutable once stored
    let photos_prefix = format!("{}/photos/", api::API_V1_PREFIX);
    if path == "/healthz" || (path.starts_with("/api/") && !path.starts_with(&photos_prefix)) {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(
            HeaderName::from_static("pragma"),
            HeaderValue::from_static("no-cache"),
        );
    }

    Ok(resp)
}

async fn api_list_people(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::PersonDto>>, AppError> {
    let rows = state.store.list_people().await?;
    let items = rows
        .into_iter()
        .map(|p| api::PersonDto {
            id: p.id,
            name: p.name,
        })
        .collect();
    Ok(Json(items))
}

async fn api_add_person(
    State(state): State<AppState>,
    Json(body): Json<api::NewPersonReq>,
) -> Result<(StatusCode, Json<api::PersonDto>), AppError> {
    let p = state.store.add_person(&body.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(api::PersonDto {
            id: p.id,
            name: p.name,
        }),
    ))
}

fn chore_dto(c: Chore) -> Result<api::ChoreDto, AppError> {
    let frequency = c.frequency().map_err(AppError::internal)?;
    Ok(api::ChoreDto {
        id: c.id,
        room: c.room,
        task: c.task,
        frequency,
        estimated_time: c.estimated_time,
    })
}

async fn api_list_chores(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::ChoreDto>>, AppError> {
    let rows = state.store.list_chores().await?;
    let items = rows
        .into_iter()
        .map(chore_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

async fn api_add_chore(
    State(state): State<AppState>,
    Json(body): Json<api::NewChoreReq>,
) -> Result<(StatusCode, Json<api::ChoreDto>), AppError> {
    let c = state
        .store
        .add_chore(&body.room, &body.task, body.frequency, body.estimated_time)
        .await?;
    Ok((StatusCode::CREATED, Json(chore_dto(c)?)))
}

fn rfc3339(dt: chrono::NaiveDateTime) -> String {
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(dt, chrono::Utc).to_rfc3339()
}

fn view_dto(v: AssignmentView) -> api::AssignmentViewDto {
    api::AssignmentViewDto {
        is_completed: v.is_completed(),
        assignment_id: v.assignment_id,
        chore_id: v.chore_id,
        room: v.room,
        task: v.task,
        estimated_time: v.estimated_time,
        person_id: v.person_id,
        assigned_to: v.assigned_to,
        completed_datetime: v.completed_datetime.map(rfc3339),
        actual_minutes: v.actual_minutes,
        photo_filename: v.photo_filename,
    }
}

fn completion_dto(c: Completion) -> api::CompletionDto {
    api::CompletionDto {
        id: c.id,
        assignment_id: c.assignment_id,
        completed_datetime: rfc3339(c.completed_datetime),
        actual_minutes: c.actual_minutes,
        photo_filename: c.photo_filename,
    }
}

#[derive(Debug, Default, Deserialize)]
struct DayQuery {
    person_id: Option<i32>,
    pending_only: Option<bool>,
}

async fn api_day_assignments(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Query(q): Query<DayQuery>,
) -> Result<Json<api::DayAssignmentsDto>, AppError> {
    // Progress always covers the whole day, whatever the filter
    let all = state
        .store
        .assignments_for_date(date, AssignmentFilter::default())
        .await?;
    let progress = DayProgress::from_views(&all);
    let filter = AssignmentFilter {
        person_id: q.person_id,
        pending_only: q.pending_only.unwrap_or(false),
    };
    let rows = if filter.person_id.is_none() && !filter.pending_only {
        all
    } else {
        state.store.assignments_for_date(date, filter).await?
    };
    Ok(Json(api::DayAssignmentsDto {
        date,
        progress: api::DayProgressDto {
            total: progress.total,
            completed: progress.completed,
        },
        assignments: rows.into_iter().map(view_dto).collect(),
    }))
}

async fn api_clear_day(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<api::ClearResp>, AppError> {
    let deleted = state.store.clear_assignments(date).await?;
    Ok(Json(api::ClearResp { deleted }))
}

async fn api_assign_chore(
    State(state): State<AppState>,
    Path((date, chore_id)): Path<(NaiveDate, i32)>,
    Json(body): Json<api::AssignReq>,
) -> Result<Json<api::AssignmentDto>, AppError> {
    let a = state
        .store
        .assign_chore(chore_id, body.person_id, date)
        .await?;
    Ok(Json(api::AssignmentDto {
        id: a.id,
        chore_id: a.chore_id,
        person_id: a.person_id,
        assigned_date: a.assigned_date,
    }))
}

async fn api_copy_day(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    body: Option<Json<api::CopyReq>>,
) -> Result<Json<api::CopyResp>, AppError> {
    // A bare POST copies from the previous day
    let from_date = match body.and_then(|Json(b)| b.from_date) {
        Some(d) => d,
        None => date
            .pred_opt()
            .ok_or_else(|| AppError::bad_request("date has no previous day"))?,
    };
    let copied = state.store.copy_assignments(from_date, date).await?;
    Ok(Json(api::CopyResp {
        from_date,
        to_date: date,
        copied,
    }))
}

async fn api_delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_assignment(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("assignment {}", id)))
    }
}

async fn api_complete_assignment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<api::CompleteReq>,
) -> Result<(StatusCode, Json<api::CompletionDto>), AppError> {
    let photo_bytes = match &body.photo {
        Some(p) => Some(
            base64::engine::general_purpose::STANDARD
                .decode(p.data_base64.as_bytes())
                .map_err(|e| AppError::bad_request(format!("photo is not valid base64: {}", e)))?,
        ),
        None => None,
    };
    let photo = match (&body.photo, &photo_bytes) {
        (Some(p), Some(bytes)) => Some(PhotoInput {
            bytes: bytes.as_slice(),
            filename: &p.filename,
        }),
        _ => None,
    };
    let c = complete_assignment(
        &state.store,
        state.photos.as_ref(),
        id,
        body.actual_minutes,
        photo,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(completion_dto(c))))
}

#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl RangeQuery {
    fn resolve(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        let end = self.end.unwrap_or_else(|| Local::now().date_naive());
        let start = match self.start {
            Some(s) => s,
            None => end
                .checked_sub_days(Days::new(DEFAULT_REPORT_DAYS))
                .ok_or_else(|| AppError::bad_request("end date out of range"))?,
        };
        Ok((start, end))
    }
}

async fn load_report(state: &AppState, q: &RangeQuery) -> Result<Report, AppError> {
    let (start, end) = q.resolve()?;
    Ok(Report::load(&state.store, start, end).await?)
}

async fn api_report(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<api::ReportDto>, AppError> {
    let report = load_report(&state, &q).await?;
    Ok(Json(api::ReportDto {
        start: report.start,
        end: report.end,
        summary: report.summary.into(),
        rows: report.rows.into_iter().map(Into::into).collect(),
    }))
}

async fn api_report_csv(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> Result<AxumResponse, AppError> {
    let report = load_report(&state, &q).await?;
    let disposition = format!("attachment; filename=\"{}\"", report.csv_filename());
    let mut resp = AxumResponse::new(axum::body::Body::from(report.to_csv()));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(hv) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, hv);
    }
    Ok(resp)
}

async fn api_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<AxumResponse, AppError> {
    let bytes = state
        .photos
        .read(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("photo not found: {}", id)))?;
    let mime = from_path(&id).first_or_octet_stream();
    let mut resp = AxumResponse::new(axum::body::Body::from(bytes));
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    Ok(resp)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidInput(m) => AppError::BadRequest(m),
            StorageError::NotFound(m) => AppError::NotFound(m),
            StorageError::Conflict(m) => AppError::Conflict(m),
            other => AppError::internal(other),
        }
    }
}

impl From<PhotoError> for AppError {
    fn from(e: PhotoError) -> Self {
        match e {
            PhotoError::InvalidName(_) | PhotoError::Empty => AppError::bad_request(e.to_string()),
            PhotoError::Io(_) => AppError::internal(e),
        }
    }
}

impl From<CompleteError> for AppError {
    fn from(e: CompleteError) -> Self {
        match e {
            CompleteError::Storage(s) => s.into(),
            CompleteError::Photo(p) => p.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> AxumResponse {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::warn!(status = %status, kind = kind, message = %msg, "request rejected");
        }
        let body = Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
