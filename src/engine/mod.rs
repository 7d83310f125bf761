use std::fmt;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::merge::{merge, MergeResult};
use crate::catalog::watermark::latest_modified;
use crate::catalog::{FetchParams, Snapshot};
use crate::error::Result;
use crate::source::{fetch_all, PageSource, Pagination};
use crate::store::SnapshotStore;

/// Steps of a sync run. Errors before `Merged` leave the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loaded,
    WatermarkComputed,
    Fetching,
    Merged,
    Persisted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Loaded => "loaded",
            Phase::WatermarkComputed => "watermark-computed",
            Phase::Fetching => "fetching",
            Phase::Merged => "merged",
            Phase::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    FetchAll,
    FetchSince,
    Update,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncMode::FetchAll => "fetch-all",
            SyncMode::FetchSince => "fetch-since",
            SyncMode::Update => "update",
        };
        f.write_str(name)
    }
}

/// Outcome of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub version: String,
    pub mode: SyncMode,
    /// Where the snapshot was written
    pub destination: String,
    /// Entries in the snapshot before the run (0 for fresh fetches)
    pub loaded: usize,
    /// Entries returned by the API
    pub fetched: usize,
    /// Latest modification date of the loaded snapshot (update mode only)
    pub watermark: Option<String>,
    /// `last_updated` filter sent to the API
    pub since: Option<NaiveDate>,
    pub pages: u32,
    pub result: MergeResult,
    pub total_entries: usize,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// Drives load → watermark → fetch → merge → save against a source and a store.
pub struct SyncEngine<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    store: &'a T,
    pacing: Pagination,
    page_size: u32,
    phase: Phase,
}

impl<'a, S, T> SyncEngine<'a, S, T>
where
    S: PageSource + ?Sized,
    T: SnapshotStore + ?Sized,
{
    pub fn new(source: &'a S, store: &'a T, pacing: Pagination, page_size: u32) -> Self {
        SyncEngine {
            source,
            store,
            pacing,
            page_size,
            phase: Phase::Idle,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!("sync phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Download the catalog (optionally only entries modified since `since`)
    /// into a fresh snapshot, replacing whatever the store held.
    pub fn fetch(&mut self, since: Option<NaiveDate>) -> Result<SyncReport> {
        let start = Instant::now();
        let mode = if since.is_some() {
            SyncMode::FetchSince
        } else {
            SyncMode::FetchAll
        };
        info!("Fetching plugins ({})", mode);
        if self.store.exists() {
            info!("{} will be replaced", self.store.location());
        }

        self.run(mode, Snapshot::empty(), None, since, start)
    }

    /// Bring the stored snapshot up to date with entries modified since its
    /// latest modification date.
    pub fn update(&mut self) -> Result<SyncReport> {
        let start = Instant::now();
        self.enter(Phase::Idle);

        let base = self.store.load()?;
        self.enter(Phase::Loaded);
        info!("Loaded {} plugins from {}", base.len(), self.store.location());

        let watermark = latest_modified(&base)?;
        self.enter(Phase::WatermarkComputed);
        info!("Latest plugin modification date {}", watermark.to_rfc3339());

        let since = watermark.date_naive();
        self.run(
            SyncMode::Update,
            base,
            Some(watermark.to_rfc3339()),
            Some(since),
            start,
        )
    }

    fn run(
        &mut self,
        mode: SyncMode,
        base: Snapshot,
        watermark: Option<String>,
        since: Option<NaiveDate>,
        start: Instant,
    ) -> Result<SyncReport> {
        let loaded = base.len();

        self.enter(Phase::Fetching);
        let mut params = FetchParams::new(self.page_size, since);
        let fetched = fetch_all(self.source, &mut params, &self.pacing)?;
        let incoming = Snapshot::from_entries(fetched);

        info!("Merging in {} plugins", incoming.len());
        let (mut merged, result) = merge(base, &incoming);
        merged.params = Some(params.clone());
        self.enter(Phase::Merged);
        info!(
            "Merged {} new plugins, updated {} existing plugins, ignored {} duplicate plugins",
            result.new, result.updated, result.duplicate
        );

        info!("Saving {} plugins to {}", merged.len(), self.store.location());
        self.store.save(&merged)?;
        self.enter(Phase::Persisted);

        let report = SyncReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode,
            destination: self.store.location(),
            loaded,
            fetched: incoming.len(),
            watermark,
            since,
            pages: params.page,
            result,
            total_entries: merged.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.enter(Phase::Idle);
        Ok(report)
    }
}
