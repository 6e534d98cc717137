//! Profit documents: one per invoice plus a rollup per month.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::counter::YearMonth;

pub const INVOICE_PROFITS: &str = "invoiceProfits";
pub const MONTHLY_PROFITS: &str = "monthlyProfits";

/// Profit recorded for a single invoice, keyed by invoice id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceProfit {
    pub invoice_id: String,
    pub year_month: YearMonth,
    pub service_profit: Decimal,
    pub stock_profit: Decimal,
    pub total_profit: Decimal,
}

/// One invoice's share of a month rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitShare {
    pub service_profit: Decimal,
    pub stock_profit: Decimal,
}

/// Month rollup, keyed by `YYYY-MM`.
///
/// The rollup keeps every contributing invoice's share, so recording an
/// invoice replaces its entry instead of adding to the sums. Applying the
/// same profit twice leaves the month unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthProfit {
    pub year_month: YearMonth,
    pub service_profit: Decimal,
    pub stock_profit: Decimal,
    pub total_profit: Decimal,
    #[serde(default)]
    pub invoice_count: i64,
    #[serde(default)]
    pub invoices: BTreeMap<String, ProfitShare>,
}

impl MonthProfit {
    pub fn empty(year_month: YearMonth) -> Self {
        Self {
            year_month,
            service_profit: Decimal::ZERO,
            stock_profit: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            invoice_count: 0,
            invoices: BTreeMap::new(),
        }
    }

    /// Set the invoice's share to `profit`.
    pub fn apply(&mut self, profit: &InvoiceProfit) {
        self.invoices.insert(
            profit.invoice_id.clone(),
            ProfitShare {
                service_profit: profit.service_profit,
                stock_profit: profit.stock_profit,
            },
        );
        self.refresh();
    }

    /// Drop the invoice's share. Returns whether it was present.
    pub fn remove(&mut self, invoice_id: &str) -> bool {
        let removed = self.invoices.remove(invoice_id).is_some();
        self.refresh();
        removed
    }

    pub fn contains(&self, invoice_id: &str) -> bool {
        self.invoices.contains_key(invoice_id)
    }

    fn refresh(&mut self) {
        self.service_profit = self.invoices.values().map(|s| s.service_profit).sum();
        self.stock_profit = self.invoices.values().map(|s| s.stock_profit).sum();
        self.total_profit = self.service_profit + self.stock_profit;
        self.invoice_count = self.invoices.len() as i64;
    }
}
