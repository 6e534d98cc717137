//! Fan-out writer: one logical record kept in sync across its flat
//! collection, its status collection (job cards only) and its month
//! partition, always through a single atomic batch.

use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{Invoice, JobCard, YearMonth, INVOICES, JOBCARDS};
use crate::services::metrics::{record_error, FANOUT_BATCHES_TOTAL};
use crate::services::store::{to_document, to_fields, DocumentStore, WriteBatch};

/// A record that is fanned out to several physical collections.
pub trait Partitioned: Serialize + Send + Sync {
    /// Metrics label.
    const ENTITY: &'static str;
    /// Flat all-records collection, also the prefix of month partitions.
    const BASE: &'static str;

    fn id(&self) -> &str;

    fn year_month(&self) -> YearMonth;

    fn status_collection(&self) -> Option<&'static str> {
        None
    }

    /// Every collection currently holding a copy of this record.
    fn locations(&self) -> Vec<String> {
        let mut locations = vec![Self::BASE.to_string()];
        if let Some(status) = self.status_collection() {
            locations.push(status.to_string());
        }
        locations.push(self.year_month().partition(Self::BASE));
        locations
    }
}

impl Partitioned for JobCard {
    const ENTITY: &'static str = "jobcard";
    const BASE: &'static str = JOBCARDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn year_month(&self) -> YearMonth {
        JobCard::year_month(self)
    }

    fn status_collection(&self) -> Option<&'static str> {
        Some(self.status.collection())
    }
}

impl Partitioned for Invoice {
    const ENTITY: &'static str = "invoice";
    const BASE: &'static str = INVOICES;

    fn id(&self) -> &str {
        &self.id
    }

    fn year_month(&self) -> YearMonth {
        Invoice::year_month(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutEvent {
    Create,
    StatusChange,
    Edit,
    Delete,
}

impl FanoutEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanoutEvent::Create => "create",
            FanoutEvent::StatusChange => "status_change",
            FanoutEvent::Edit => "edit",
            FanoutEvent::Delete => "delete",
        }
    }
}

/// Writes creating the record in every location.
pub fn plan_create<T: Partitioned>(entity: &T) -> Result<WriteBatch, AppError> {
    let document = to_document(entity)?;
    let mut batch = WriteBatch::new();
    for location in entity.locations() {
        batch.set(&location, entity.id(), document.clone());
    }
    Ok(batch)
}

/// Writes moving the record from `before` to `after`.
///
/// Locations shared by both versions are updated in place. A location only
/// `after` occupies (new status, new month) gets a fresh copy, and one only
/// `before` occupied loses its copy.
pub fn plan_update<T: Partitioned>(before: &T, after: &T) -> Result<WriteBatch, AppError> {
    if before.id() != after.id() {
        return Err(AppError::InternalError(anyhow::anyhow!(
            "Cannot move record {} onto id {}",
            before.id(),
            after.id()
        )));
    }

    let fields = to_fields(after)?;
    let old_locations = before.locations();
    let new_locations = after.locations();

    let mut batch = WriteBatch::new();
    for location in &new_locations {
        if old_locations.contains(location) {
            batch.update(location, after.id(), fields.clone());
        } else {
            batch.set(location, after.id(), to_document(after)?);
        }
    }
    for location in old_locations.iter().filter(|l| !new_locations.contains(l)) {
        batch.delete(location, before.id());
    }
    Ok(batch)
}

/// Writes removing the record from every location.
pub fn plan_delete<T: Partitioned>(entity: &T) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for location in entity.locations() {
        batch.delete(&location, entity.id());
    }
    batch
}

#[derive(Clone)]
pub struct FanoutWriter {
    store: Arc<dyn DocumentStore>,
}

impl FanoutWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create<T: Partitioned>(&self, entity: &T) -> Result<(), AppError> {
        let batch = plan_create(entity)?;
        self.commit::<T>(entity.id(), FanoutEvent::Create, batch).await
    }

    pub async fn update<T: Partitioned>(
        &self,
        before: &T,
        after: &T,
        event: FanoutEvent,
    ) -> Result<(), AppError> {
        let batch = plan_update(before, after)?;
        self.commit::<T>(after.id(), event, batch).await
    }

    pub async fn delete<T: Partitioned>(&self, entity: &T) -> Result<(), AppError> {
        let batch = plan_delete(entity);
        self.commit::<T>(entity.id(), FanoutEvent::Delete, batch).await
    }

    async fn commit<T: Partitioned>(
        &self,
        id: &str,
        event: FanoutEvent,
        batch: WriteBatch,
    ) -> Result<(), AppError> {
        let writes = batch.len();
        match self.store.commit(batch).await {
            Ok(()) => {
                FANOUT_BATCHES_TOTAL
                    .with_label_values(&[T::ENTITY, event.as_str(), "success"])
                    .inc();
                info!(entity = T::ENTITY, id = %id, event = event.as_str(), writes, "Fan-out committed");
                Ok(())
            }
            Err(e) => {
                FANOUT_BATCHES_TOTAL
                    .with_label_values(&[T::ENTITY, event.as_str(), "failure"])
                    .inc();
                record_error(&e);
                warn!(entity = T::ENTITY, id = %id, event = event.as_str(), error = %e, "Fan-out failed");
                Err(e)
            }
        }
    }
}
