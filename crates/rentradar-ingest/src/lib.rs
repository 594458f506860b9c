//! Ingestion orchestration: the reconciler that merges raw parser records
//! into the listing store, and the dispatcher that drives one parse run
//! against the external parser service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use rentradar_core::{LogLevel, ParseCounts, RawRecord, RunOutcome, Source};
use rentradar_store::{
    ListingStore, ParserClient, ParserClientConfig, RunTracker, UpsertOutcome,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rentradar-ingest";

/// What to do with a record whose price is missing or non-numeric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PricePolicy {
    /// Coerce to 0 and ingest anyway (historic behavior).
    #[default]
    CoerceZero,
    /// Skip the record, like a record without an external id.
    RejectRecord,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub parser_base_url: String,
    pub parser_timeout_secs: u64,
    pub price_policy: PricePolicy,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self {
            parser_base_url: std::env::var("PARSER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            parser_timeout_secs: std::env::var("PARSER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            price_policy: match std::env::var("RENTRADAR_PRICE_POLICY").as_deref() {
                Ok("reject") => PricePolicy::RejectRecord,
                _ => PricePolicy::CoerceZero,
            },
        }
    }

    pub fn parser_client_config(&self) -> ParserClientConfig {
        ParserClientConfig {
            base_url: self.parser_base_url.clone(),
            timeout: Duration::from_secs(self.parser_timeout_secs),
        }
    }
}

/// Per-batch reconciliation result. The public API exposes only `new` and
/// `updated`; `skipped` is kept for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub new: u64,
    pub updated: u64,
    pub skipped: u64,
}

/// Merges batches of raw records into the canonical listing store.
///
/// The contract is independent of how it is invoked: the dispatcher and the
/// direct ingestion endpoint both go through here.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<ListingStore>,
    price_policy: PricePolicy,
}

impl Reconciler {
    pub fn new(store: Arc<ListingStore>) -> Self {
        Self {
            store,
            price_policy: PricePolicy::default(),
        }
    }

    pub fn with_price_policy(mut self, policy: PricePolicy) -> Self {
        self.price_policy = policy;
        self
    }

    /// Upsert each record by `(source, external_id)`. Malformed records are
    /// skipped, never errors; records are independent, so batch order does
    /// not affect the final state and there is no batch-wide transaction.
    pub async fn reconcile(&self, source: Source, records: &[RawRecord]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for record in records {
            let Some(external_id) = record.usable_external_id() else {
                debug!(source = source.as_str(), "skipping record without external_id");
                summary.skipped += 1;
                continue;
            };
            if self.price_policy == PricePolicy::RejectRecord && record.price_value().is_none() {
                warn!(
                    source = source.as_str(),
                    external_id, "skipping record with missing or non-numeric price"
                );
                summary.skipped += 1;
                continue;
            }
            match self.store.upsert(source, external_id, record, Utc::now()).await {
                UpsertOutcome::Created => summary.new += 1,
                UpsertOutcome::Updated => summary.updated += 1,
            }
        }
        info!(
            source = source.as_str(),
            new = summary.new,
            updated = summary.updated,
            skipped = summary.skipped,
            "reconciliation finished"
        );
        summary
    }
}

/// Drives one parse run per call: creates the run record, triggers the
/// external parser on a spawned task, and guarantees the run reaches a
/// terminal state whatever the call does.
#[derive(Clone)]
pub struct Dispatcher {
    runs: Arc<RunTracker>,
    reconciler: Reconciler,
    client: Arc<ParserClient>,
}

impl Dispatcher {
    pub fn new(
        config: &IngestConfig,
        runs: Arc<RunTracker>,
        reconciler: Reconciler,
    ) -> anyhow::Result<Self> {
        let client =
            ParserClient::new(config.parser_client_config()).context("building parser client")?;
        Ok(Self {
            runs,
            reconciler,
            client: Arc::new(client),
        })
    }

    /// Create a run in `pending` and kick off its execution on a separate
    /// task. Returns the run id immediately; callers poll the run tracker.
    /// No internal retries: a retry is a new `dispatch` and a new run.
    pub async fn dispatch(&self, source: Source) -> Uuid {
        let run = self.runs.create(source).await;
        let run_id = run.id;
        let this = self.clone();
        tokio::spawn(async move {
            let worker = {
                let inner = this.clone();
                tokio::spawn(async move { inner.execute(run_id, source).await })
            };
            settle_run(&this.runs, run_id, worker).await;
        });
        run_id
    }

    async fn execute(&self, run_id: Uuid, source: Source) -> anyhow::Result<ParseCounts> {
        self.runs.begin(run_id).await?;

        let response = self.client.trigger_parse(run_id, source).await?;

        if response.apartments.is_empty() {
            return Ok(ParseCounts {
                found: response.found,
                new: response.new,
                updated: response.updated,
            });
        }

        // push-capable parser inlined its records; reconcile them here and
        // report the counts we actually applied
        let found = response.apartments.len() as u64;
        let _ = self
            .runs
            .log(
                run_id,
                LogLevel::Info,
                format!("reconciling {found} inlined records"),
            )
            .await;
        let summary = self.reconciler.reconcile(source, &response.apartments).await;
        Ok(ParseCounts {
            found,
            new: summary.new,
            updated: summary.updated,
        })
    }
}

/// Await the worker task and record the run outcome. The worker runs on its
/// own task so that even a panic inside it lands here as a join error and
/// the run still leaves `running`.
async fn settle_run(
    runs: &RunTracker,
    run_id: Uuid,
    worker: JoinHandle<anyhow::Result<ParseCounts>>,
) {
    let outcome = match worker.await {
        Ok(Ok(counts)) => RunOutcome::Completed(counts),
        Ok(Err(err)) => RunOutcome::Failed(format!("{err:#}")),
        Err(err) => RunOutcome::Failed(format!("parse task aborted: {err}")),
    };
    if let Err(err) = runs.finish(run_id, outcome).await {
        error!(%run_id, %err, "failed to record run outcome");
    }
}
