//! In-memory canonical stores for rentradar (listings + parse runs) and the
//! outbound HTTP client for the external parser service.
//!
//! Persistence technology is deliberately out of scope; both stores keep
//! their guarantees behind a single async mutex so every upsert and state
//! transition is one short critical section.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use rentradar_core::{
    Listing, LogLevel, RawRecord, Run, RunLogEntry, RunOutcome, RunStatus, Source,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rentradar-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run {0} not found")]
    RunNotFound(Uuid),
    #[error("invalid run transition {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Canonical listing store keyed by `(source, external_id)`.
///
/// The key map lives behind one mutex, so concurrent writers to the same
/// key serialize on it: at most one row per key can ever exist.
#[derive(Debug, Default)]
pub struct ListingStore {
    inner: Mutex<HashMap<(Source, String), Listing>>,
}

impl ListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-update the listing for `(source, external_id)` from a raw
    /// record. Atomic per key; the curation flags and `created_at` of an
    /// existing row survive untouched.
    pub async fn upsert(
        &self,
        source: Source,
        external_id: &str,
        record: &RawRecord,
        now: chrono::DateTime<Utc>,
    ) -> UpsertOutcome {
        let mut map = self.inner.lock().await;
        match map.entry((source, external_id.to_string())) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().apply_record(record, now);
                debug!(source = source.as_str(), external_id, "listing updated");
                UpsertOutcome::Updated
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Listing::from_record(source, external_id, record, now));
                debug!(source = source.as_str(), external_id, "listing created");
                UpsertOutcome::Created
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Listing> {
        let map = self.inner.lock().await;
        map.values().find(|l| l.id == id).cloned()
    }

    pub async fn get_by_key(&self, source: Source, external_id: &str) -> Option<Listing> {
        let map = self.inner.lock().await;
        map.get(&(source, external_id.to_string())).cloned()
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Flip the user-owned favorite flag. Returns the new value, or `None`
    /// when no listing has this id.
    pub async fn toggle_favorite(&self, id: Uuid) -> Option<bool> {
        let mut map = self.inner.lock().await;
        let listing = map.values_mut().find(|l| l.id == id)?;
        listing.is_favorite = !listing.is_favorite;
        listing.updated_at = Utc::now();
        Some(listing.is_favorite)
    }

    /// Filtered, ordered, paginated view over active listings.
    pub async fn list(&self, filter: &ListingFilter) -> ListingPage {
        let map = self.inner.lock().await;
        let mut rows: Vec<Listing> = map
            .values()
            .filter(|l| l.is_active && filter.matches(l))
            .cloned()
            .collect();
        drop(map);

        sort_listings(&mut rows, filter.ordering.as_deref().unwrap_or("-created_at"));

        let per_page = filter.per_page.unwrap_or(20).max(1);
        let count = rows.len();
        let total_pages = count.max(1).div_ceil(per_page);
        let page = filter.page.unwrap_or(1).clamp(1, total_pages);
        let results = rows
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        ListingPage {
            count,
            page,
            total_pages,
            results,
        }
    }

    /// Aggregate statistics over active listings.
    pub async fn stats(&self) -> ListingStats {
        let map = self.inner.lock().await;
        let active: Vec<&Listing> = map.values().filter(|l| l.is_active).collect();

        let mut by_source = BTreeMap::new();
        for source in Source::ALL {
            by_source.insert(
                source.as_str().to_string(),
                active.iter().filter(|l| l.source == source).count(),
            );
        }

        let total = active.len();
        let prices: Vec<f64> = active.iter().map(|l| l.price).collect();
        let areas: Vec<f64> = active.iter().filter_map(|l| l.area).collect();

        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        ListingStats {
            total,
            by_source,
            avg_price: mean(&prices),
            min_price: if min_price.is_finite() { min_price } else { 0.0 },
            max_price: prices.iter().copied().fold(0.0, f64::max),
            avg_area: mean(&areas),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Query parameters for the listing store, mirroring the public filter
/// surface of the HTTP API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListingFilter {
    pub source: Option<Source>,
    pub rooms: Option<i32>,
    pub min_rooms: Option<i32>,
    pub max_rooms: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_floor: Option<i32>,
    pub max_floor: Option<i32>,
    pub building_year: Option<i32>,
    pub min_building_year: Option<i32>,
    pub district: Option<String>,
    pub metro_station: Option<String>,
    pub building_type: Option<String>,
    pub is_verified: Option<bool>,
    pub is_favorite: Option<bool>,
    pub has_furniture: Option<bool>,
    pub has_appliances: Option<bool>,
    pub has_internet: Option<bool>,
    pub has_parking: Option<bool>,
    pub has_elevator: Option<bool>,
    pub has_balcony: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl ListingFilter {
    fn matches(&self, l: &Listing) -> bool {
        if self.source.is_some_and(|s| l.source != s) {
            return false;
        }
        if self.rooms.is_some_and(|v| l.rooms != Some(v)) {
            return false;
        }
        if self.min_rooms.is_some_and(|v| l.rooms.unwrap_or(i32::MIN) < v) {
            return false;
        }
        if self.max_rooms.is_some_and(|v| l.rooms.unwrap_or(i32::MAX) > v) {
            return false;
        }
        if self.min_price.is_some_and(|v| l.price < v) {
            return false;
        }
        if self.max_price.is_some_and(|v| l.price > v) {
            return false;
        }
        if self.min_area.is_some_and(|v| l.area.unwrap_or(f64::MIN) < v) {
            return false;
        }
        if self.max_area.is_some_and(|v| l.area.unwrap_or(f64::MAX) > v) {
            return false;
        }
        if self.min_floor.is_some_and(|v| l.floor.unwrap_or(i32::MIN) < v) {
            return false;
        }
        if self.max_floor.is_some_and(|v| l.floor.unwrap_or(i32::MAX) > v) {
            return false;
        }
        if self.building_year.is_some_and(|v| l.building_year != Some(v)) {
            return false;
        }
        if self
            .min_building_year
            .is_some_and(|v| l.building_year.unwrap_or(i32::MIN) < v)
        {
            return false;
        }
        if let Some(district) = &self.district {
            if l.district.as_deref() != Some(district.as_str()) {
                return false;
            }
        }
        if let Some(station) = &self.metro_station {
            if l.metro_station.as_deref() != Some(station.as_str()) {
                return false;
            }
        }
        if let Some(building_type) = &self.building_type {
            if l.building_type.as_deref() != Some(building_type.as_str()) {
                return false;
            }
        }
        if self.is_verified.is_some_and(|v| l.is_verified != v) {
            return false;
        }
        if self.is_favorite.is_some_and(|v| l.is_favorite != v) {
            return false;
        }
        for (wanted, actual) in [
            (self.has_furniture, l.has_furniture),
            (self.has_appliances, l.has_appliances),
            (self.has_internet, l.has_internet),
            (self.has_parking, l.has_parking),
            (self.has_elevator, l.has_elevator),
            (self.has_balcony, l.has_balcony),
        ] {
            if wanted.is_some_and(|v| actual != v) {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let haystacks = [
                l.address.as_deref(),
                l.district.as_deref(),
                l.metro_station.as_deref(),
                l.description.as_deref(),
                l.title.as_deref(),
            ];
            if !haystacks
                .iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}

fn sort_listings(rows: &mut [Listing], ordering: &str) {
    let (field, descending) = match ordering.strip_prefix('-') {
        Some(field) => (field, true),
        None => (ordering, false),
    };
    match field {
        "price" => rows.sort_by(|a, b| a.price.total_cmp(&b.price)),
        "area" => rows.sort_by(|a, b| {
            a.area
                .unwrap_or(0.0)
                .total_cmp(&b.area.unwrap_or(0.0))
        }),
        _ => rows.sort_by_key(|l| l.created_at),
    }
    if descending {
        rows.reverse();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingPage {
    pub count: usize,
    pub page: usize,
    pub total_pages: usize,
    pub results: Vec<Listing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingStats {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_area: f64,
}

#[derive(Debug, Default)]
struct RunTable {
    runs: HashMap<Uuid, Run>,
    logs: HashMap<Uuid, Vec<RunLogEntry>>,
}

impl RunTable {
    fn push_log(&mut self, run_id: Uuid, level: LogLevel, message: impl Into<String>) {
        self.logs.entry(run_id).or_default().push(RunLogEntry {
            level,
            message: message.into(),
            created_at: Utc::now(),
        });
    }
}

/// Lifecycle tracker for parse runs and their append-only logs.
///
/// Transitions are monotonic: `pending -> running -> completed | failed`.
/// Every transition (and any error text) is mirrored into the run's log.
#[derive(Debug, Default)]
pub struct RunTracker {
    inner: Mutex<RunTable>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new run in `pending` and return it immediately.
    pub async fn create(&self, source: Source) -> Run {
        let run = Run::new(source, Utc::now());
        let mut table = self.inner.lock().await;
        table.push_log(
            run.id,
            LogLevel::Info,
            format!("run created for source {source}"),
        );
        table.runs.insert(run.id, run.clone());
        info!(run_id = %run.id, source = source.as_str(), "parse run created");
        run
    }

    /// `pending -> running`, stamping `started_at`.
    pub async fn begin(&self, run_id: Uuid) -> Result<(), StoreError> {
        let mut table = self.inner.lock().await;
        let run = table
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        if run.status != RunStatus::Pending {
            return Err(StoreError::InvalidTransition {
                from: run.status,
                to: RunStatus::Running,
            });
        }
        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        table.push_log(run_id, LogLevel::Info, "run started");
        info!(%run_id, "parse run started");
        Ok(())
    }

    /// `running -> completed | failed`, always stamping `completed_at`.
    pub async fn finish(&self, run_id: Uuid, outcome: RunOutcome) -> Result<(), StoreError> {
        let mut table = self.inner.lock().await;
        let run = table
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        let target = match &outcome {
            RunOutcome::Completed(_) => RunStatus::Completed,
            RunOutcome::Failed(_) => RunStatus::Failed,
        };
        if run.status != RunStatus::Running {
            return Err(StoreError::InvalidTransition {
                from: run.status,
                to: target,
            });
        }
        run.completed_at = Some(Utc::now());
        match outcome {
            RunOutcome::Completed(counts) => {
                run.status = RunStatus::Completed;
                run.apartments_found = counts.found;
                run.apartments_new = counts.new;
                run.apartments_updated = counts.updated;
                let message = format!(
                    "run completed: found={} new={} updated={}",
                    counts.found, counts.new, counts.updated
                );
                table.push_log(run_id, LogLevel::Info, message);
                info!(%run_id, found = counts.found, new = counts.new, updated = counts.updated, "parse run completed");
            }
            RunOutcome::Failed(error) => {
                run.status = RunStatus::Failed;
                run.error_message = Some(error.clone());
                table.push_log(run_id, LogLevel::Error, error.clone());
                info!(%run_id, error, "parse run failed");
            }
        }
        Ok(())
    }

    pub async fn log(
        &self,
        run_id: Uuid,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Result<(), StoreError> {
        let mut table = self.inner.lock().await;
        if !table.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        table.push_log(run_id, level, message);
        Ok(())
    }

    pub async fn get(&self, run_id: Uuid) -> Option<Run> {
        self.inner.lock().await.runs.get(&run_id).cloned()
    }

    /// Most recent runs first.
    pub async fn list(&self, limit: usize) -> Vec<Run> {
        let table = self.inner.lock().await;
        let mut runs: Vec<Run> = table.runs.values().cloned().collect();
        runs.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        runs.truncate(limit);
        runs
    }

    pub async fn logs(&self, run_id: Uuid) -> Result<Vec<RunLogEntry>, StoreError> {
        let table = self.inner.lock().await;
        if !table.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(table.logs.get(&run_id).cloned().unwrap_or_default())
    }

    /// Delete a run and cascade its log entries.
    pub async fn delete(&self, run_id: Uuid) -> Result<(), StoreError> {
        let mut table = self.inner.lock().await;
        table
            .runs
            .remove(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        table.logs.remove(&run_id);
        Ok(())
    }
}

/// Configuration for the outbound parser-service client.
#[derive(Debug, Clone)]
pub struct ParserClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ParserClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            // parsing a source can take minutes; the call is made once and
            // never retried, so the timeout is generous
            timeout: Duration::from_secs(600),
        }
    }
}

/// Success body of `POST {base_url}/parse/{source}`. Absent counts read as
/// zero; push-capable parsers may also inline the records themselves.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParseResponse {
    pub found: u64,
    pub new: u64,
    pub updated: u64,
    pub apartments: Vec<RawRecord>,
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("parser request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("parser service error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("parser response body is not valid JSON: {0}")]
    Body(#[from] serde_json::Error),
}

/// Thin HTTP client for the external parser service. One call per run,
/// bounded by the configured timeout, no internal retries.
#[derive(Debug, Clone)]
pub struct ParserClient {
    client: reqwest::Client,
    base_url: String,
}

impl ParserClient {
    pub fn new(config: ParserClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn trigger_parse(
        &self,
        run_id: Uuid,
        source: Source,
    ) -> Result<ParseResponse, ParserError> {
        let url = format!("{}/parse/{}", self.base_url, source);
        let span = info_span!("parser_call", %run_id, source = source.as_str(), url);
        let _guard = span.enter();

        let response = self.client.post(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ParserError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // absent counts read as zero, but a body that is not JSON at all is
        // an upstream failure and must fail the run
        let parsed = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentradar_core::ParseCounts;
    use serde_json::json;
    use std::sync::Arc;

    fn record(external_id: &str, price: i64) -> RawRecord {
        RawRecord {
            external_id: Some(external_id.to_string()),
            price: Some(json!(price)),
            ..RawRecord::default()
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_key() {
        let store = ListingStore::new();
        let now = Utc::now();

        let first = store
            .upsert(Source::Cian, "c1", &record("c1", 40000), now)
            .await;
        let second = store
            .upsert(Source::Cian, "c1", &record("c1", 42000), now)
            .await;

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.count().await, 1);

        let row = store.get_by_key(Source::Cian, "c1").await.unwrap();
        assert_eq!(row.price, 42000.0);
    }

    #[tokio::test]
    async fn same_external_id_on_other_source_is_a_new_row() {
        let store = ListingStore::new();
        let now = Utc::now();
        store
            .upsert(Source::Cian, "x1", &record("x1", 100), now)
            .await;
        store
            .upsert(Source::Avito, "x1", &record("x1", 200), now)
            .await;
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_upserts_never_duplicate_a_key() {
        let store = Arc::new(ListingStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .upsert(Source::Yandex, "y1", &record("y1", 1000 + i), Utc::now())
                    .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == UpsertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn curation_flags_survive_upsert() {
        let store = ListingStore::new();
        let now = Utc::now();
        store
            .upsert(Source::Avito, "a1", &record("a1", 500), now)
            .await;
        let id = store.get_by_key(Source::Avito, "a1").await.unwrap().id;
        assert_eq!(store.toggle_favorite(id).await, Some(true));

        store
            .upsert(Source::Avito, "a1", &record("a1", 600), now)
            .await;
        let row = store.get_by_key(Source::Avito, "a1").await.unwrap();
        assert!(row.is_favorite);
        assert_eq!(row.price, 600.0);
        assert_eq!(row.id, id);
    }

    #[tokio::test]
    async fn list_filters_search_and_paginates() {
        let store = ListingStore::new();
        let now = Utc::now();
        for i in 0..5 {
            let mut rec = record(&format!("c{i}"), 10000 * (i + 1));
            rec.rooms = Some(i as i32 + 1);
            rec.district = Some(if i < 3 { "Arbat" } else { "Khamovniki" }.into());
            rec.description = Some(format!("bright flat number {i}"));
            store
                .upsert(Source::Cian, &format!("c{i}"), &rec, now)
                .await;
        }

        let by_district = store
            .list(&ListingFilter {
                district: Some("Arbat".into()),
                ..ListingFilter::default()
            })
            .await;
        assert_eq!(by_district.count, 3);

        let by_price = store
            .list(&ListingFilter {
                min_price: Some(20000.0),
                max_price: Some(40000.0),
                ordering: Some("price".into()),
                ..ListingFilter::default()
            })
            .await;
        assert_eq!(by_price.count, 3);
        assert_eq!(by_price.results[0].price, 20000.0);

        let searched = store
            .list(&ListingFilter {
                search: Some("NUMBER 4".into()),
                ..ListingFilter::default()
            })
            .await;
        assert_eq!(searched.count, 1);

        let paged = store
            .list(&ListingFilter {
                per_page: Some(2),
                page: Some(3),
                ..ListingFilter::default()
            })
            .await;
        assert_eq!(paged.count, 5);
        assert_eq!(paged.total_pages, 3);
        assert_eq!(paged.results.len(), 1);
    }

    #[tokio::test]
    async fn stats_cover_active_listings() {
        let store = ListingStore::new();
        let now = Utc::now();
        let mut cheap = record("c1", 10000);
        cheap.area = Some(30.0);
        let mut dear = record("a1", 30000);
        dear.area = Some(50.0);
        store.upsert(Source::Cian, "c1", &cheap, now).await;
        store.upsert(Source::Avito, "a1", &dear, now).await;

        let stats = store.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_source["cian"], 1);
        assert_eq!(stats.by_source["avito"], 1);
        assert_eq!(stats.by_source["yandex"], 0);
        assert_eq!(stats.min_price, 10000.0);
        assert_eq!(stats.max_price, 30000.0);
        assert_eq!(stats.avg_price, 20000.0);
        assert_eq!(stats.avg_area, 40.0);
    }

    #[tokio::test]
    async fn empty_store_stats_are_zero() {
        let stats = ListingStore::new().stats().await;
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_price, 0.0);
        assert_eq!(stats.min_price, 0.0);
        assert_eq!(stats.max_price, 0.0);
    }

    #[tokio::test]
    async fn run_transitions_are_monotonic() {
        let tracker = RunTracker::new();
        let run = tracker.create(Source::Cian).await;
        assert_eq!(run.status, RunStatus::Pending);

        tracker.begin(run.id).await.unwrap();
        let err = tracker.begin(run.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        tracker
            .finish(run.id, RunOutcome::Completed(ParseCounts { found: 5, new: 3, updated: 2 }))
            .await
            .unwrap();

        let done = tracker.get(run.id).await.unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.apartments_found, 5);
        assert_eq!(done.apartments_new, 3);
        assert_eq!(done.apartments_updated, 2);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        // terminal states reject further transitions
        let err = tracker
            .finish(run.id, RunOutcome::Failed("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn finish_from_pending_is_rejected() {
        let tracker = RunTracker::new();
        let run = tracker.create(Source::Avito).await;
        let err = tracker
            .finish(run.id, RunOutcome::Failed("never started".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: RunStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failed_runs_keep_error_text_and_log_it() {
        let tracker = RunTracker::new();
        let run = tracker.create(Source::Yandex).await;
        tracker.begin(run.id).await.unwrap();
        tracker
            .finish(run.id, RunOutcome::Failed("parser service error: 503 - busy".into()))
            .await
            .unwrap();

        let failed = tracker.get(run.id).await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.completed_at.is_some());
        assert!(failed.error_message.as_deref().unwrap().contains("503"));

        let logs = tracker.logs(run.id).await.unwrap();
        assert!(logs
            .iter()
            .any(|entry| entry.message.contains("503") && entry.level == LogLevel::Error));
    }

    #[tokio::test]
    async fn deleting_a_run_cascades_its_logs() {
        let tracker = RunTracker::new();
        let run = tracker.create(Source::Cian).await;
        tracker
            .log(run.id, LogLevel::Debug, "fetched page 1")
            .await
            .unwrap();
        assert!(!tracker.logs(run.id).await.unwrap().is_empty());

        tracker.delete(run.id).await.unwrap();
        assert!(tracker.get(run.id).await.is_none());
        assert!(matches!(
            tracker.logs(run.id).await,
            Err(StoreError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn runs_list_newest_first() {
        let tracker = RunTracker::new();
        let first = tracker.create(Source::Cian).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = tracker.create(Source::Avito).await;

        let listed = tracker.list(10).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }
}
