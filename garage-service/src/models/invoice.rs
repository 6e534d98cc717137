//! Invoice model for garage-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::catalog::{ServiceItem, StockItem};
use super::counter::YearMonth;

pub const INVOICES: &str = "invoices";

/// Invoice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceType {
    #[serde(rename = "GST")]
    Gst,
    #[serde(rename = "Non-GST")]
    NonGst,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Gst => "GST",
            InvoiceType::NonGst => "Non-GST",
        }
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen copy of a catalog item at the time it was added to an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    pub ref_id: String,
    pub name: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub gst: Decimal,
    /// `price * qty` when the line was added.
    pub amount: Decimal,
    /// Cost basis for profit; present on stock lines only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Decimal>,
}

impl InvoiceLineItem {
    pub fn new(ref_id: &str, name: &str, qty: Decimal, price: Decimal, gst: Decimal) -> Self {
        Self {
            ref_id: ref_id.to_string(),
            name: name.to_string(),
            qty,
            price,
            gst,
            amount: price * qty,
            purchase_price: None,
        }
    }

    pub fn from_stock(item: &StockItem, qty: Decimal) -> Self {
        let mut line = Self::new(&item.id, &item.product_name, qty, item.selling_price, item.gst);
        line.purchase_price = Some(item.purchase_price);
        line
    }

    pub fn from_service(item: &ServiceItem, qty: Decimal) -> Self {
        Self::new(&item.id, &item.service_name, qty, item.labour, item.gst)
    }

    /// Undiscounted GST on this line.
    pub fn gst_amount(&self) -> Decimal {
        self.amount * self.gst / Decimal::ONE_HUNDRED
    }
}

/// Flat charge added after discount and tax (towing, disposal, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub description: String,
    pub amount: Decimal,
}

/// Computed invoice totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
}

/// Invoice document, stored in `invoices` and in its month partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_gst: Option<String>,
    pub vehicle_id: String,
    pub vehicle_number: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_kilometer: u64,
    pub invoice_type: InvoiceType,
    pub invoice_number: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub stocks: Vec<InvoiceLineItem>,
    pub services: Vec<InvoiceLineItem>,
    /// Percent, 0 to 100.
    pub discount: Decimal,
    #[serde(default)]
    pub additional_charges: Vec<AdditionalCharge>,
    #[serde(default)]
    pub note: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
}

impl Invoice {
    pub fn year_month(&self) -> YearMonth {
        YearMonth::of(&self.date)
    }

    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals {
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            gst_amount: self.gst_amount,
            total_amount: self.total_amount,
        }
    }

    pub fn set_totals(&mut self, totals: InvoiceTotals) {
        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount_amount;
        self.gst_amount = totals.gst_amount;
        self.total_amount = totals.total_amount;
    }

    /// Stock lines followed by service lines.
    pub fn lines(&self) -> impl Iterator<Item = &InvoiceLineItem> {
        self.stocks.iter().chain(self.services.iter())
    }
}

/// Input for creating an invoice for a registered customer and vehicle.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub customer_id: String,
    pub vehicle_id: String,
    pub invoice_type: InvoiceType,
    /// Invoice date; defaults to now.
    pub date: Option<DateTime<Utc>>,
    pub stocks: Vec<InvoiceLineItem>,
    pub services: Vec<InvoiceLineItem>,
    pub discount: Decimal,
    pub additional_charges: Vec<AdditionalCharge>,
    pub note: String,
}

/// Input for editing an invoice. Customer and vehicle copies are not refreshed.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub invoice_type: Option<InvoiceType>,
    pub date: Option<DateTime<Utc>>,
    pub stocks: Option<Vec<InvoiceLineItem>>,
    pub services: Option<Vec<InvoiceLineItem>>,
    pub discount: Option<Decimal>,
    pub additional_charges: Option<Vec<AdditionalCharge>>,
    pub note: Option<String>,
    pub vehicle_kilometer: Option<u64>,
}

/// In-memory filter applied to the cached invoice snapshot.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub search: Option<String>,
    pub month: Option<YearMonth>,
    pub invoice_type: Option<InvoiceType>,
}

impl InvoiceFilter {
    pub fn accepts(&self, invoice: &Invoice) -> bool {
        if let Some(month) = self.month {
            if invoice.year_month() != month {
                return false;
            }
        }
        if let Some(kind) = self.invoice_type {
            if invoice.invoice_type != kind {
                return false;
            }
        }
        match self.search.as_deref().map(|s| s.trim().to_lowercase()) {
            Some(needle) if !needle.is_empty() => [
                &invoice.invoice_number,
                &invoice.customer_name,
                &invoice.customer_phone,
                &invoice.vehicle_number,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle)),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_amount_is_frozen_price_times_qty() {
        let line = InvoiceLineItem::new("s1", "Brake pads", Decimal::new(2, 0), Decimal::new(1000, 0), Decimal::new(18, 0));
        assert_eq!(line.amount, Decimal::new(2000, 0));
        assert_eq!(line.gst_amount(), Decimal::new(360, 0));
    }

    #[test]
    fn stock_line_keeps_cost_basis() {
        let item = StockItem {
            id: "p1".to_string(),
            product_name: "Air filter".to_string(),
            part_number: "AF-1".to_string(),
            hsn_code: "8421".to_string(),
            purchase_price: Decimal::new(300, 0),
            profit_margin: Decimal::new(20, 0),
            selling_price: Decimal::new(360, 0),
            gst: Decimal::new(28, 0),
            category: "Filters".to_string(),
        };
        let line = InvoiceLineItem::from_stock(&item, Decimal::ONE);
        assert_eq!(line.price, Decimal::new(360, 0));
        assert_eq!(line.purchase_price, Some(Decimal::new(300, 0)));
    }

    #[test]
    fn invoice_type_uses_display_names() {
        let json = serde_json::to_value(InvoiceType::NonGst).unwrap();
        assert_eq!(json, serde_json::json!("Non-GST"));
    }
}
