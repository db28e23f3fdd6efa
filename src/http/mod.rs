mod error;
mod views;

pub use error::{ApiError, status_code};
pub use views::*;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use crate::model::{PropertyStatus, RangeInput, SeasonInput};
use crate::normalize::normalize_list;
use crate::observability::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{AvailabilityService, NewProperty, Requester};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AvailabilityService>,
}

impl AppState {
    pub fn new(service: Arc<AvailabilityService>) -> Self {
        Self { service }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/properties", post(register_property))
        .route("/properties/{id}", delete(deactivate_property))
        .route(
            "/properties/{id}/availability",
            get(get_availability).put(add_range).patch(add_range),
        )
        .route("/properties/{id}/availability/calendar", get(calendar))
        .route(
            "/properties/{id}/availability/{range_id}",
            delete(remove_range).put(replace_range),
        )
        .route("/properties/{id}/seasons", get(list_seasons).post(add_season))
        .route("/properties/{id}/seasons/quote", get(quote))
        .route("/properties/{id}/seasons/{season_id}", delete(remove_season))
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".into());
    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "route" => route.clone(), "status" => status).increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "route" => route)
        .record(started.elapsed().as_secs_f64());
    response
}

// ── Helpers ──────────────────────────────────────────────

/// Success body of every mutation: `{status: true, message, value}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: bool,
    pub message: &'static str,
    pub value: T,
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

fn envelope<T>(message: &'static str, value: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        status: true,
        message,
        value,
    }))
}

fn parse_id(raw: &str, what: &str) -> Result<Ulid, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("malformed {what} id: {raw:?}")))
}

fn parse_day(raw: Option<&str>, field: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

// ── Handlers ─────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "now": Utc::now().to_rfc3339(),
        "properties": state.service.property_count(),
        "activeProperties": state.service.active_property_count(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    id: Option<String>,
    owner_id: Option<String>,
    status: Option<String>,
    nightly_price: Option<Value>,
    #[serde(default)]
    servicios: Value,
    #[serde(default)]
    reglas_propiedad: Value,
    #[serde(default)]
    metodos_pago: Value,
}

fn price_from(value: Option<&Value>) -> Result<Option<f64>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("nightlyPrice must be a number".into())),
        Some(_) => Err(ApiError::BadRequest("nightlyPrice must be a number".into())),
    }
}

async fn register_property(
    State(state): State<AppState>,
    requester: Requester,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<PropertyView> {
    let req = body(payload)?;
    let new = NewProperty {
        id: req.id.as_deref().map(|s| parse_id(s, "property")).transpose()?,
        owner_id: req.owner_id.as_deref().map(|s| parse_id(s, "owner")).transpose()?,
        status: req
            .status
            .filter(|s| !s.trim().is_empty())
            .map(PropertyStatus::from),
        nightly_price: price_from(req.nightly_price.as_ref())?,
        amenities: normalize_list(&req.servicios),
        house_rules: normalize_list(&req.reglas_propiedad),
        payment_methods: normalize_list(&req.metodos_pago),
    };
    let property = state.service.register_property(&requester, new).await?;
    envelope("Propiedad registrada", PropertyView::from(&property))
}

async fn deactivate_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
    requester: Requester,
) -> ApiResult<PropertyView> {
    let id = parse_id(&id, "property")?;
    let property = state.service.deactivate_property(id, &requester).await?;
    envelope("Propiedad eliminada", PropertyView::from(&property))
}

async fn get_availability(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<AvailabilityView>, ApiError> {
    let id = parse_id(&id, "property")?;
    let snapshot = state.service.get_availability(id).await?;
    Ok(Json(AvailabilityView::from(&snapshot)))
}

async fn add_range(
    State(state): State<AppState>,
    Path(id): Path<String>,
    requester: Requester,
    payload: Result<Json<RangeInput>, JsonRejection>,
) -> ApiResult<PropertyView> {
    let id = parse_id(&id, "property")?;
    let input = body(payload)?;
    let property = state.service.add_range(id, &requester, input).await?;
    envelope("Disponibilidad actualizada", PropertyView::from(&property))
}

async fn remove_range(
    State(state): State<AppState>,
    Path((id, range_id)): Path<(String, String)>,
    requester: Requester,
) -> ApiResult<PropertyView> {
    let id = parse_id(&id, "property")?;
    let property = state.service.remove_range(id, &range_id, &requester).await?;
    envelope("Rango eliminado", PropertyView::from(&property))
}

async fn replace_range(
    State(state): State<AppState>,
    Path((id, range_id)): Path<(String, String)>,
    requester: Requester,
    payload: Result<Json<RangeInput>, JsonRejection>,
) -> ApiResult<PropertyView> {
    let id = parse_id(&id, "property")?;
    let input = body(payload)?;
    let property = state
        .service
        .replace_range(id, &range_id, &requester, input)
        .await?;
    envelope("Rango actualizado", PropertyView::from(&property))
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    from: Option<String>,
    to: Option<String>,
}

async fn calendar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(window): Query<WindowQuery>,
) -> Result<Json<CalendarResponse>, ApiError> {
    let id = parse_id(&id, "property")?;
    let from = parse_day(window.from.as_deref(), "from")?;
    let to = parse_day(window.to.as_deref(), "to")?;
    let view = state.service.calendar(id, from, to).await?;
    Ok(Json(CalendarResponse::from(&view)))
}

async fn list_seasons(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Vec<SeasonView>> {
    let id = parse_id(&id, "property")?;
    let seasons = state.service.list_seasons(id).await?;
    let views: Vec<SeasonView> = seasons.iter().map(SeasonView::from).collect();
    envelope("Temporadas", views)
}

async fn add_season(
    State(state): State<AppState>,
    Path(id): Path<String>,
    requester: Requester,
    payload: Result<Json<SeasonInput>, JsonRejection>,
) -> ApiResult<PropertyView> {
    let id = parse_id(&id, "property")?;
    let input = body(payload)?;
    let property = state.service.add_season(id, &requester, input).await?;
    envelope("Temporada agregada", PropertyView::from(&property))
}

async fn remove_season(
    State(state): State<AppState>,
    Path((id, season_id)): Path<(String, String)>,
    requester: Requester,
) -> ApiResult<PropertyView> {
    let id = parse_id(&id, "property")?;
    let property = state
        .service
        .remove_season(id, &season_id, &requester)
        .await?;
    envelope("Temporada eliminada", PropertyView::from(&property))
}

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    date: Option<String>,
    base: Option<String>,
}

async fn quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<QuoteQuery>,
) -> Result<Json<QuoteView>, ApiError> {
    let id = parse_id(&id, "property")?;
    let date = parse_day(q.date.as_deref(), "date")?;
    let base = price_from(q.base.map(Value::String).as_ref())?;
    let quote = state.service.quote(id, date, base).await?;
    Ok(Json(QuoteView::from(&quote)))
}
