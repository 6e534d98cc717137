//! Per-invoice profit and the monthly rollups built from it.

use rust_decimal::Decimal;
use serde_json::Value;
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::models::{
    Invoice, InvoiceProfit, MonthProfit, YearMonth, INVOICES, INVOICE_PROFITS, MONTHLY_PROFITS,
};
use crate::services::metrics::MIGRATION_ITEMS_TOTAL;
use crate::services::migration::MigrationReport;
use crate::services::store::{get_as, list_as, to_document, DocumentStore, WriteBatch};

const ROUTINE: &str = "profit_recalculation";

/// Profit of one invoice. Service lines cost nothing; stock lines cost the
/// purchase price frozen on the line. Stock lines without a cost basis
/// contribute no profit.
pub fn compute_profit(invoice: &Invoice) -> InvoiceProfit {
    let service_profit: Decimal = invoice.services.iter().map(|line| line.price * line.qty).sum();
    let stock_profit: Decimal = invoice
        .stocks
        .iter()
        .map(|line| match line.purchase_price {
            Some(cost) => (line.price - cost) * line.qty,
            None => Decimal::ZERO,
        })
        .sum();

    InvoiceProfit {
        invoice_id: invoice.id.clone(),
        year_month: invoice.year_month(),
        service_profit,
        stock_profit,
        total_profit: service_profit + stock_profit,
    }
}

#[derive(Clone)]
pub struct ProfitService {
    store: Arc<dyn DocumentStore>,
}

impl ProfitService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record (or re-record) an invoice's profit. The invoice's share is set
    /// in its month and dropped from any month it was previously counted in:
    /// the one on the stored profit record and `previous_month` (the month
    /// the invoice had before an edit). Every step can be repeated, so a
    /// failed attempt is repaired by the next save.
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    pub async fn record(
        &self,
        invoice: &Invoice,
        previous_month: Option<YearMonth>,
    ) -> Result<InvoiceProfit, AppError> {
        let profit = compute_profit(invoice);

        let mut stale: BTreeSet<YearMonth> = previous_month.into_iter().collect();
        if let Some(previous) = self.invoice_profit(&invoice.id).await? {
            stale.insert(previous.year_month);
        }
        stale.remove(&profit.year_month);

        self.adjust_month(profit.year_month, |month| month.apply(&profit))
            .await?;
        for year_month in stale {
            self.remove_from_month(year_month, &invoice.id).await?;
        }

        let mut batch = WriteBatch::new();
        batch.set(INVOICE_PROFITS, &invoice.id, to_document(&profit)?);
        self.store.commit(batch).await?;

        debug!(total_profit = %profit.total_profit, "Invoice profit recorded");
        Ok(profit)
    }

    /// Take a deleted invoice's profit back out of its month.
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    pub async fn retract(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut months = BTreeSet::from([invoice.year_month()]);
        if let Some(previous) = self.invoice_profit(&invoice.id).await? {
            months.insert(previous.year_month);
        }
        for year_month in months {
            self.remove_from_month(year_month, &invoice.id).await?;
        }

        let mut batch = WriteBatch::new();
        batch.delete(INVOICE_PROFITS, &invoice.id);
        self.store.commit(batch).await
    }

    pub async fn invoice_profit(&self, invoice_id: &str) -> Result<Option<InvoiceProfit>, AppError> {
        get_as(self.store.as_ref(), INVOICE_PROFITS, invoice_id).await
    }

    pub async fn month(&self, year_month: YearMonth) -> Result<Option<MonthProfit>, AppError> {
        get_as(self.store.as_ref(), MONTHLY_PROFITS, &year_month.to_string()).await
    }

    /// Every month rollup, oldest first.
    pub async fn months(&self) -> Result<Vec<MonthProfit>, AppError> {
        let mut months: Vec<MonthProfit> = list_as(self.store.as_ref(), MONTHLY_PROFITS).await?;
        months.sort_by_key(|m| m.year_month);
        Ok(months)
    }

    async fn adjust_month<F>(&self, year_month: YearMonth, change: F) -> Result<(), AppError>
    where
        F: Fn(&mut MonthProfit) + Send + Sync,
    {
        let mutation = |current: Option<&Value>| -> Result<Value, AppError> {
            let mut month = match current {
                Some(value) => serde_json::from_value(value.clone())?,
                None => MonthProfit::empty(year_month),
            };
            change(&mut month);
            to_document(&month)
        };
        self.store
            .modify(MONTHLY_PROFITS, &year_month.to_string(), &mutation)
            .await?;
        Ok(())
    }

    async fn remove_from_month(&self, year_month: YearMonth, invoice_id: &str) -> Result<(), AppError> {
        let counted = self
            .month(year_month)
            .await?
            .is_some_and(|month| month.contains(invoice_id));
        if counted {
            self.adjust_month(year_month, |month| {
                month.remove(invoice_id);
            })
            .await?;
        }
        Ok(())
    }

    /// Rebuild every rollup from the flat invoice collection. Rollups are
    /// overwritten, so the run can be repeated; months without invoices are
    /// removed.
    #[instrument(skip(self, progress))]
    pub async fn recalculate_all(
        &self,
        mut progress: impl FnMut(usize, usize) + Send,
    ) -> Result<MigrationReport, AppError> {
        info!("Recalculating monthly profits");

        let snapshots = self.store.list(INVOICES).await?;
        let total = snapshots.len();
        let mut report = MigrationReport::new(total);

        let mut months: BTreeMap<YearMonth, MonthProfit> = BTreeMap::new();
        let mut batch = WriteBatch::new();
        for (index, snapshot) in snapshots.iter().enumerate() {
            match snapshot.decode::<Invoice>() {
                Ok(invoice) => {
                    let profit = compute_profit(&invoice);
                    months
                        .entry(profit.year_month)
                        .or_insert_with(|| MonthProfit::empty(profit.year_month))
                        .apply(&profit);
                    batch.set(INVOICE_PROFITS, &invoice.id, to_document(&profit)?);
                    report.success += 1;
                    MIGRATION_ITEMS_TOTAL.with_label_values(&[ROUTINE, "success"]).inc();
                }
                Err(e) => {
                    warn!(invoice_id = %snapshot.id, error = %e, "Skipping unreadable invoice");
                    report.fail(&snapshot.id, &e);
                    MIGRATION_ITEMS_TOTAL.with_label_values(&[ROUTINE, "failed"]).inc();
                }
            }
            progress(index + 1, total);
        }

        for (year_month, month) in &months {
            batch.set(MONTHLY_PROFITS, &year_month.to_string(), to_document(month)?);
        }
        for stale in self.store.list(MONTHLY_PROFITS).await? {
            let backed = stale
                .id
                .parse::<YearMonth>()
                .is_ok_and(|ym| months.contains_key(&ym));
            if !backed {
                batch.delete(MONTHLY_PROFITS, &stale.id);
            }
        }
        for orphan in self.store.list(INVOICE_PROFITS).await? {
            if !snapshots.iter().any(|s| s.id == orphan.id) {
                batch.delete(INVOICE_PROFITS, &orphan.id);
            }
        }

        self.store.commit(batch).await?;
        info!(
            invoices = total,
            months = months.len(),
            failed = report.failed,
            "Monthly profits recalculated"
        );
        Ok(report)
    }
}
