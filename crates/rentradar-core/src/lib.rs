//! Core domain model for rentradar: listing sources, canonical listings,
//! raw parser records, and parse-run lifecycle types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const CRATE_NAME: &str = "rentradar-core";

/// Closed set of listing sites we ingest from. Adding a source is a code
/// change, not runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cian,
    Avito,
    Yandex,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Cian, Source::Avito, Source::Yandex];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Cian => "cian",
            Source::Avito => "avito",
            Source::Yandex => "yandex",
        }
    }

    pub fn parse(value: &str) -> Option<Source> {
        match value {
            "cian" => Some(Source::Cian),
            "avito" => Some(Source::Avito),
            "yandex" => Some(Source::Yandex),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one parse run. Transitions are monotonic:
/// pending -> running -> completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Counts reported for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseCounts {
    pub found: u64,
    pub new: u64,
    pub updated: u64,
}

/// Terminal outcome handed to the run tracker when a run leaves `running`.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(ParseCounts),
    Failed(String),
}

/// One invocation of ingestion for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub source: Source,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub apartments_found: u64,
    pub apartments_new: u64,
    pub apartments_updated: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    pub fn new(source: Source, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            apartments_found: 0,
            apartments_new: 0,
            apartments_updated: 0,
            error_message: None,
            created_at: now,
        }
    }
}

/// Append-only log line owned by exactly one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Raw listing record as handed over by the external parser service.
/// Every field is optional; the listing defaults below are applied when a
/// field is absent. `price` is kept as raw JSON so non-numeric input never
/// fails deserialization of the whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub external_id: Option<String>,
    pub url: Option<String>,
    pub price: Option<JsonValue>,
    pub area: Option<f64>,
    pub rooms: Option<i32>,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    pub building_year: Option<i32>,
    pub building_type: Option<String>,
    pub living_area: Option<f64>,
    pub kitchen_area: Option<f64>,
    pub deposit: Option<f64>,
    pub commission: Option<f64>,
    pub rental_period: Option<String>,
    pub metro_distance: Option<String>,
    pub metro_transport: Option<String>,
    pub published_date: Option<String>,
    pub district: Option<String>,
    pub metro_station: Option<String>,
    pub address: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_name: Option<String>,
    pub is_owner: Option<bool>,
    pub no_commission: Option<bool>,
    pub utilities_included: Option<bool>,
    pub photos: Option<Vec<String>>,
    pub infrastructure: Option<serde_json::Map<String, JsonValue>>,
    pub features: Option<Vec<String>>,
    pub has_furniture: Option<bool>,
    pub has_appliances: Option<bool>,
    pub has_internet: Option<bool>,
    pub has_parking: Option<bool>,
    pub has_elevator: Option<bool>,
    pub has_balcony: Option<bool>,
}

impl RawRecord {
    /// External identifier if present and non-empty; records without one
    /// are skipped by reconciliation.
    pub fn usable_external_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Price as a number, accepting JSON numbers and numeric strings.
    /// Negative prices are invalid input and read as absent.
    pub fn price_value(&self) -> Option<f64> {
        let price = match self.price.as_ref()? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        price.filter(|p| *p >= 0.0)
    }

    /// Permissive coercion: missing or non-numeric price becomes 0.
    pub fn price_or_zero(&self) -> f64 {
        self.price_value().unwrap_or(0.0)
    }
}

/// Canonical listing record, deduplicated by `(source, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub source: Source,
    pub external_id: String,
    pub url: String,
    pub price: f64,
    pub area: Option<f64>,
    pub rooms: Option<i32>,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    pub building_year: Option<i32>,
    pub building_type: Option<String>,
    pub living_area: Option<f64>,
    pub kitchen_area: Option<f64>,
    pub deposit: Option<f64>,
    pub commission: Option<f64>,
    pub rental_period: Option<String>,
    pub metro_distance: Option<String>,
    pub metro_transport: Option<String>,
    pub published_date: Option<String>,
    pub district: Option<String>,
    pub metro_station: Option<String>,
    pub address: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_name: Option<String>,
    pub is_owner: bool,
    pub no_commission: bool,
    pub utilities_included: bool,
    pub photos: Vec<String>,
    pub infrastructure: serde_json::Map<String, JsonValue>,
    pub features: Vec<String>,
    pub has_furniture: bool,
    pub has_appliances: bool,
    pub has_internet: bool,
    pub has_parking: bool,
    pub has_elevator: bool,
    pub has_balcony: bool,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub parsed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Build a fresh listing from a raw record, applying per-field defaults
    /// for everything the record leaves out.
    pub fn from_record(
        source: Source,
        external_id: impl Into<String>,
        record: &RawRecord,
        now: DateTime<Utc>,
    ) -> Self {
        let mut listing = Self {
            id: Uuid::new_v4(),
            source,
            external_id: external_id.into(),
            url: String::new(),
            price: 0.0,
            area: None,
            rooms: None,
            floor: None,
            total_floors: None,
            building_year: None,
            building_type: None,
            living_area: None,
            kitchen_area: None,
            deposit: None,
            commission: None,
            rental_period: None,
            metro_distance: None,
            metro_transport: None,
            published_date: None,
            district: None,
            metro_station: None,
            address: None,
            title: None,
            description: None,
            contact_phone: None,
            contact_name: None,
            is_owner: true,
            no_commission: true,
            utilities_included: false,
            photos: Vec::new(),
            infrastructure: serde_json::Map::new(),
            features: Vec::new(),
            has_furniture: false,
            has_appliances: false,
            has_internet: false,
            has_parking: false,
            has_elevator: false,
            has_balcony: false,
            is_active: true,
            is_verified: false,
            is_favorite: false,
            created_at: now,
            updated_at: now,
            parsed_at: None,
            expires_at: None,
        };
        listing.apply_record(record, now);
        listing
    }

    /// Overwrite every parser-owned field from the record. A field absent
    /// from the record resets to its default, it does not keep the old
    /// value. Identity, `created_at`, `expires_at`, and the curation flags
    /// (`is_verified`, `is_favorite`) are never touched here.
    pub fn apply_record(&mut self, record: &RawRecord, now: DateTime<Utc>) {
        self.url = record.url.clone().unwrap_or_default();
        self.price = record.price_or_zero();
        self.area = record.area;
        self.rooms = record.rooms;
        self.floor = record.floor;
        self.total_floors = record.total_floors;
        self.building_year = record.building_year;
        self.building_type = record.building_type.clone();
        self.living_area = record.living_area;
        self.kitchen_area = record.kitchen_area;
        self.deposit = record.deposit;
        self.commission = record.commission;
        self.rental_period = record.rental_period.clone();
        self.metro_distance = record.metro_distance.clone();
        self.metro_transport = record.metro_transport.clone();
        self.published_date = record.published_date.clone();
        self.district = record.district.clone();
        self.metro_station = record.metro_station.clone();
        self.address = record.address.clone();
        self.title = record.title.clone();
        self.description = record.description.clone();
        self.contact_phone = record.contact_phone.clone();
        self.contact_name = record.contact_name.clone();
        self.is_owner = record.is_owner.unwrap_or(true);
        self.no_commission = record.no_commission.unwrap_or(true);
        self.utilities_included = record.utilities_included.unwrap_or(false);
        self.photos = record.photos.clone().unwrap_or_default();
        self.infrastructure = record.infrastructure.clone().unwrap_or_default();
        self.features = record.features.clone().unwrap_or_default();
        self.has_furniture = record.has_furniture.unwrap_or(false);
        self.has_appliances = record.has_appliances.unwrap_or(false);
        self.has_internet = record.has_internet.unwrap_or(false);
        self.has_parking = record.has_parking.unwrap_or(false);
        self.has_elevator = record.has_elevator.unwrap_or(false);
        self.has_balcony = record.has_balcony.unwrap_or(false);
        self.is_active = true;
        self.parsed_at = Some(now);
        self.updated_at = now;
    }
}
