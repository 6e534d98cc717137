//! Invoice totals and GST arithmetic. No rounding happens here; only the
//! printable summary rounds for display.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::{AdditionalCharge, InvoiceLineItem, InvoiceTotals, InvoiceType};

/// `1 - discount / 100`.
pub fn discount_factor(discount_percent: Decimal) -> Decimal {
    Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED
}

/// Compute subtotal, discount, GST and grand total.
///
/// GST is summed over the undiscounted lines and the sum is then scaled by
/// the discount factor. With mixed rates this differs from discounting each
/// line first, and the summed form is the one invoices are printed with.
pub fn compute_totals(
    stocks: &[InvoiceLineItem],
    services: &[InvoiceLineItem],
    discount_percent: Decimal,
    additional_charges: &[AdditionalCharge],
    invoice_type: InvoiceType,
) -> InvoiceTotals {
    let lines = || stocks.iter().chain(services.iter());

    let subtotal: Decimal = lines().map(|line| line.amount).sum();
    let discount_amount = subtotal * discount_percent / Decimal::ONE_HUNDRED;

    let gst_amount = match invoice_type {
        InvoiceType::NonGst => Decimal::ZERO,
        InvoiceType::Gst => {
            let raw: Decimal = lines().map(InvoiceLineItem::gst_amount).sum();
            raw * discount_factor(discount_percent)
        }
    };

    let charges: Decimal = additional_charges.iter().map(|c| c.amount).sum();

    InvoiceTotals {
        subtotal,
        discount_amount,
        gst_amount,
        total_amount: (subtotal - discount_amount) + gst_amount + charges,
    }
}

/// GST collected at one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GstSlab {
    pub rate: Decimal,
    /// Discounted taxable value of the lines at this rate.
    pub taxable_amount: Decimal,
    pub gst_amount: Decimal,
}

impl GstSlab {
    /// Central and state halves of an intra-state supply.
    pub fn cgst(&self) -> Decimal {
        self.gst_amount / Decimal::TWO
    }

    pub fn sgst(&self) -> Decimal {
        self.gst_amount - self.cgst()
    }
}

/// Per-rate GST, ordered by rate. Slabs sum to `compute_totals(..).gst_amount`.
pub fn gst_breakdown(
    lines: &[&InvoiceLineItem],
    discount_percent: Decimal,
    invoice_type: InvoiceType,
) -> Vec<GstSlab> {
    if invoice_type == InvoiceType::NonGst {
        return Vec::new();
    }

    let factor = discount_factor(discount_percent);
    let mut by_rate: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let (taxable, gst) = by_rate.entry(line.gst.normalize()).or_default();
        *taxable += line.amount;
        *gst += line.gst_amount();
    }

    by_rate
        .into_iter()
        .map(|(rate, (taxable, gst))| GstSlab {
            rate,
            taxable_amount: taxable * factor,
            gst_amount: gst * factor,
        })
        .collect()
}
