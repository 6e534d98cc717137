//! One-time data-shape migrations.
//!
//! Both routines are idempotent: documents already present in the target
//! shape are skipped, so an interrupted run can simply be started again.
//! Failures are collected per item (or per batch) instead of aborting.

use serde_json::Value;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{CatalogKind, Category, Invoice, ServiceItem, StockItem, YearMonth, INVOICES};
use crate::services::catalog::CatalogService;
use crate::services::metrics::MIGRATION_ITEMS_TOTAL;
use crate::services::store::{list_as, DocumentStore, Snapshot, WriteBatch};

/// Outcome of a migration or recalculation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl MigrationReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn fail(&mut self, id: &str, error: &impl Display) {
        self.failed += 1;
        self.errors.push(format!("{}: {}", id, error));
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Characters used as the letter shard of the legacy catalog layout.
fn legacy_letters() -> impl Iterator<Item = char> {
    ('A'..='Z').chain('0'..='9')
}

pub struct Migrator {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<CatalogService>,
    batch_size: usize,
}

impl Migrator {
    /// `catalog` is the service whose item snapshots go stale when flattening
    /// writes into the flat collections.
    pub fn new(store: Arc<dyn DocumentStore>, catalog: Arc<CatalogService>, batch_size: usize) -> Self {
        Self {
            store,
            catalog,
            batch_size: batch_size.max(1),
        }
    }

    /// Copy invoices that only exist in the flat collection into their month
    /// partition. `progress` receives `(processed, total)` after each batch.
    #[instrument(skip(self, progress))]
    pub async fn backfill_invoice_partitions(
        &self,
        mut progress: impl FnMut(usize, usize) + Send,
    ) -> Result<MigrationReport, AppError> {
        const ROUTINE: &str = "invoice_partitions";
        info!("Starting invoice month-partition backfill");

        let snapshots = self.store.list(INVOICES).await?;
        let mut report = MigrationReport::new(snapshots.len());
        let mut present: HashMap<YearMonth, HashSet<String>> = HashMap::new();
        let mut pending: Vec<(String, Snapshot)> = Vec::new();

        for snapshot in snapshots {
            let invoice = match snapshot.decode::<Invoice>() {
                Ok(invoice) => invoice,
                Err(e) => {
                    report.fail(&snapshot.id, &e);
                    MIGRATION_ITEMS_TOTAL.with_label_values(&[ROUTINE, "failed"]).inc();
                    continue;
                }
            };

            let year_month = invoice.year_month();
            if !present.contains_key(&year_month) {
                let ids = self
                    .store
                    .list(&year_month.partition(INVOICES))
                    .await?
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
                present.insert(year_month, ids);
            }

            if present.get(&year_month).is_some_and(|ids| ids.contains(&snapshot.id)) {
                report.skipped += 1;
                MIGRATION_ITEMS_TOTAL.with_label_values(&[ROUTINE, "skipped"]).inc();
            } else {
                pending.push((year_month.partition(INVOICES), snapshot));
            }
        }

        let mut processed = report.skipped + report.failed;
        progress(processed, report.total);

        for chunk in pending.chunks(self.batch_size) {
            let mut batch = WriteBatch::new();
            for (partition, snapshot) in chunk {
                batch.set(partition, &snapshot.id, snapshot.data.clone());
            }
            self.commit_chunk(ROUTINE, batch, chunk.iter().map(|(_, s)| s.id.as_str()), &mut report)
                .await;
            processed += chunk.len();
            progress(processed, report.total);
        }

        info!(
            total = report.total,
            migrated = report.success,
            skipped = report.skipped,
            failed = report.failed,
            "Invoice month-partition backfill finished"
        );
        Ok(report)
    }

    /// Copy items from the legacy `{items}/{category}/{letter}` shards into
    /// the flat collection, taking `category` from the shard path.
    #[instrument(skip(self, progress))]
    pub async fn flatten_legacy_catalog(
        &self,
        kind: CatalogKind,
        mut progress: impl FnMut(usize, usize) + Send,
    ) -> Result<MigrationReport, AppError> {
        let routine = match kind {
            CatalogKind::Stock => "legacy_stocks",
            CatalogKind::Service => "legacy_services",
        };
        info!(kind = kind.as_str(), "Starting legacy catalog flattening");

        let categories: Vec<Category> =
            list_as(self.store.as_ref(), kind.category_collection()).await?;
        let existing: HashSet<String> = self
            .store
            .list(kind.items_collection())
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let mut legacy: Vec<(String, Snapshot)> = Vec::new();
        for category in &categories {
            for letter in legacy_letters() {
                let shard = kind.legacy_collection(&category.name, letter);
                for snapshot in self.store.list(&shard).await? {
                    legacy.push((category.name.clone(), snapshot));
                }
            }
        }

        let mut report = MigrationReport::new(legacy.len());
        let mut pending: Vec<(String, Value)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (category, snapshot) in legacy {
            if existing.contains(&snapshot.id) || !seen.insert(snapshot.id.clone()) {
                report.skipped += 1;
                MIGRATION_ITEMS_TOTAL.with_label_values(&[routine, "skipped"]).inc();
                continue;
            }
            match flatten_item(kind, &category, &snapshot) {
                Ok(data) => pending.push((snapshot.id, data)),
                Err(e) => {
                    warn!(id = %snapshot.id, error = %e, "Unreadable legacy catalog item");
                    report.fail(&snapshot.id, &e);
                    MIGRATION_ITEMS_TOTAL.with_label_values(&[routine, "failed"]).inc();
                }
            }
        }

        let mut processed = report.skipped + report.failed;
        progress(processed, report.total);

        for chunk in pending.chunks(self.batch_size) {
            let mut batch = WriteBatch::new();
            for (id, data) in chunk {
                batch.set(kind.items_collection(), id, data.clone());
            }
            self.commit_chunk(routine, batch, chunk.iter().map(|(id, _)| id.as_str()), &mut report)
                .await;
            processed += chunk.len();
            progress(processed, report.total);
        }
        if report.success > 0 {
            self.catalog.invalidate(kind);
        }

        info!(
            kind = kind.as_str(),
            total = report.total,
            migrated = report.success,
            skipped = report.skipped,
            failed = report.failed,
            "Legacy catalog flattening finished"
        );
        Ok(report)
    }

    async fn commit_chunk<'a>(
        &self,
        routine: &str,
        batch: WriteBatch,
        ids: impl Iterator<Item = &'a str>,
        report: &mut MigrationReport,
    ) {
        let ids: Vec<&str> = ids.collect();
        match self.store.commit(batch).await {
            Ok(()) => {
                report.success += ids.len();
                MIGRATION_ITEMS_TOTAL
                    .with_label_values(&[routine, "success"])
                    .inc_by(ids.len() as f64);
            }
            Err(e) => {
                warn!(routine, items = ids.len(), error = %e, "Migration batch failed");
                for id in &ids {
                    report.fail(id, &e);
                }
                MIGRATION_ITEMS_TOTAL
                    .with_label_values(&[routine, "failed"])
                    .inc_by(ids.len() as f64);
            }
        }
    }
}

/// Shape a legacy document as a flat catalog item and check it decodes.
fn flatten_item(kind: CatalogKind, category: &str, snapshot: &Snapshot) -> Result<Value, AppError> {
    let mut data = snapshot.data.clone();
    let fields = data.as_object_mut().ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Legacy item is not an object"))
    })?;
    fields.insert("id".to_string(), Value::String(snapshot.id.clone()));
    fields.insert("category".to_string(), Value::String(category.to_string()));

    match kind {
        CatalogKind::Stock => {
            serde_json::from_value::<StockItem>(data.clone())?;
        }
        CatalogKind::Service => {
            serde_json::from_value::<ServiceItem>(data.clone())?;
        }
    }
    Ok(data)
}
