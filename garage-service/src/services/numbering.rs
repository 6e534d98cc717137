//! Month-scoped sequence numbers for job cards and invoices.

use serde_json::Value;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::debug;

use crate::models::{MonthCounter, SequenceKind, YearMonth};
use crate::services::store::{get_as, to_document, DocumentStore};

pub const COUNTERS: &str = "counters";

#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn DocumentStore>,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Atomically increment the month counter and format the new number.
    pub async fn next(&self, kind: SequenceKind, year_month: YearMonth) -> Result<String, AppError> {
        let bump = move |current: Option<&Value>| -> Result<Value, AppError> {
            let count = match current {
                Some(value) => serde_json::from_value::<MonthCounter>(value.clone())?.count,
                None => 0,
            };
            to_document(&MonthCounter {
                year_month,
                count: count + 1,
            })
        };

        let stored = self
            .store
            .modify(COUNTERS, &kind.counter_id(year_month), &bump)
            .await?;
        let counter: MonthCounter = serde_json::from_value(stored)?;

        let number = kind.format_number(year_month, counter.count);
        debug!(number = %number, "Allocated sequence number");
        Ok(number)
    }

    /// Numbers issued so far in the month.
    pub async fn current(&self, kind: SequenceKind, year_month: YearMonth) -> Result<u64, AppError> {
        let counter: Option<MonthCounter> =
            get_as(self.store.as_ref(), COUNTERS, &kind.counter_id(year_month)).await?;
        Ok(counter.map_or(0, |c| c.count))
    }
}
