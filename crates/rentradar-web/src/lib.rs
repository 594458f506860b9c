//! Axum JSON API for rentradar: run triggering, direct ingestion from the
//! parser service, and the listing query surface.

use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rentradar_core::{Listing, RawRecord, Source};
use rentradar_ingest::{Dispatcher, IngestConfig, Reconciler};
use rentradar_store::{ListingFilter, ListingPage, ListingStore, RunTracker, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "rentradar-web";

#[derive(Clone)]
pub struct AppState {
    pub listings: Arc<ListingStore>,
    pub runs: Arc<RunTracker>,
    pub reconciler: Reconciler,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(
        listings: Arc<ListingStore>,
        runs: Arc<RunTracker>,
        reconciler: Reconciler,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            listings,
            runs,
            reconciler,
            dispatcher,
        }
    }

    /// Wire up stores, reconciler and dispatcher from environment config.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = IngestConfig::from_env();
        let listings = Arc::new(ListingStore::new());
        let runs = Arc::new(RunTracker::new());
        let reconciler =
            Reconciler::new(Arc::clone(&listings)).with_price_policy(config.price_policy);
        let dispatcher = Dispatcher::new(&config, Arc::clone(&runs), reconciler.clone())?;
        Ok(Self::new(listings, runs, reconciler, dispatcher))
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/apartments", get(apartments_list_handler))
        .route("/api/apartments/stats", get(apartments_stats_handler))
        .route("/api/apartments/favorites", get(apartments_favorites_handler))
        .route("/api/apartments/{id}", get(apartment_detail_handler))
        .route(
            "/api/apartments/{id}/toggle_favorite",
            post(toggle_favorite_handler),
        )
        .route("/api/parse-tasks", get(parse_tasks_list_handler))
        .route("/api/parse-tasks/start", post(parse_task_start_handler))
        .route("/api/parse-tasks/{id}", get(parse_task_detail_handler))
        .route("/api/parse-tasks/{id}/logs", get(parse_task_logs_handler))
        .route("/parser/update-apartments/", post(update_apartments_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("RENTRADAR_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::from_env()?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "rentradar web listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn known_sources() -> String {
    Source::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trimmed row for the list and favorites endpoints. The detail endpoint
/// returns the full listing with description, contacts and amenity flags.
#[derive(Debug, Serialize)]
struct ListingSummary {
    id: Uuid,
    source: Source,
    external_id: String,
    url: String,
    price: f64,
    area: Option<f64>,
    rooms: Option<i32>,
    floor: Option<i32>,
    total_floors: Option<i32>,
    district: Option<String>,
    metro_station: Option<String>,
    address: Option<String>,
    title: Option<String>,
    photos: Vec<String>,
    is_verified: bool,
    is_favorite: bool,
    created_at: DateTime<Utc>,
}

impl From<Listing> for ListingSummary {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            source: listing.source,
            external_id: listing.external_id,
            url: listing.url,
            price: listing.price,
            area: listing.area,
            rooms: listing.rooms,
            floor: listing.floor,
            total_floors: listing.total_floors,
            district: listing.district,
            metro_station: listing.metro_station,
            address: listing.address,
            title: listing.title,
            photos: listing.photos,
            is_verified: listing.is_verified,
            is_favorite: listing.is_favorite,
            created_at: listing.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListingSummaryPage {
    count: usize,
    page: usize,
    total_pages: usize,
    results: Vec<ListingSummary>,
}

impl From<ListingPage> for ListingSummaryPage {
    fn from(page: ListingPage) -> Self {
        Self {
            count: page.count,
            page: page.page,
            total_pages: page.total_pages,
            results: page.results.into_iter().map(ListingSummary::from).collect(),
        }
    }
}

async fn apartments_list_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ListingFilter>,
) -> Response {
    let page = state.listings.list(&filter).await;
    Json(ListingSummaryPage::from(page)).into_response()
}

async fn apartments_favorites_handler(
    State(state): State<Arc<AppState>>,
    Query(mut filter): Query<ListingFilter>,
) -> Response {
    filter.is_favorite = Some(true);
    let page = state.listings.list(&filter).await;
    Json(ListingSummaryPage::from(page)).into_response()
}

async fn apartments_stats_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.listings.stats().await).into_response()
}

async fn apartment_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Response {
    match state.listings.get(id).await {
        Some(listing) => Json(listing).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Apartment not found"),
    }
}

async fn toggle_favorite_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Response {
    match state.listings.toggle_favorite(id).await {
        Some(is_favorite) => Json(json!({ "is_favorite": is_favorite })).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Apartment not found"),
    }
}

#[derive(Debug, Deserialize)]
struct StartTaskRequest {
    source: String,
}

async fn parse_task_start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTaskRequest>,
) -> Response {
    let Some(source) = Source::parse(&request.source) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid source. Must be one of: {}", known_sources()),
        );
    };
    let task_id = state.dispatcher.dispatch(source).await;
    Json(json!({ "task_id": task_id, "source": source })).into_response()
}

async fn parse_tasks_list_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.runs.list(50).await).into_response()
}

async fn parse_task_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Response {
    match state.runs.get(id).await {
        Some(run) => Json(run).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Parse task not found"),
    }
}

async fn parse_task_logs_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Response {
    match state.runs.logs(id).await {
        Ok(logs) => Json(logs).into_response(),
        Err(StoreError::RunNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Parse task not found")
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateApartmentsRequest {
    source: String,
    #[serde(default)]
    apartments: Vec<RawRecord>,
}

/// Push-style ingestion entry point for the parser service. Validates the
/// source exactly like the run trigger does, then reconciles synchronously;
/// no run record is created on this path.
async fn update_apartments_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateApartmentsRequest>,
) -> Response {
    let Some(source) = Source::parse(&request.source) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid source");
    };
    let summary = state.reconciler.reconcile(source, &request.apartments).await;
    Json(json!({ "new": summary.new, "updated": summary.updated })).into_response()
}
