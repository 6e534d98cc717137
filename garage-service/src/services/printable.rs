//! Numeric content of a printed invoice. Layout belongs to whatever renders
//! it; every figure here is derived with `compute_totals` and rounded only
//! when formatted.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::{GarageAddress, Invoice, InvoiceLineItem};
use crate::services::totals::{compute_totals, gst_breakdown};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintableLine {
    pub name: String,
    pub qty: String,
    pub price: String,
    pub gst_rate: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintableGstSlab {
    pub rate: String,
    pub taxable_amount: String,
    pub cgst: String,
    pub sgst: String,
    pub gst_amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintableCharge {
    pub description: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintableInvoice {
    pub garage_name: Option<String>,
    pub garage_address: Option<String>,
    pub garage_gst_number: Option<String>,
    pub invoice_number: String,
    /// `DD/MM/YYYY`.
    pub date: String,
    pub invoice_type: String,
    pub customer_name: String,
    pub vehicle_number: String,
    pub stocks: Vec<PrintableLine>,
    pub services: Vec<PrintableLine>,
    pub subtotal: String,
    pub discount_percent: String,
    pub discount_amount: String,
    pub gst_breakdown: Vec<PrintableGstSlab>,
    pub cgst_amount: String,
    pub sgst_amount: String,
    pub gst_amount: String,
    pub additional_charges: Vec<PrintableCharge>,
    pub total_amount: String,
    pub amount_in_words: String,
}

/// Two decimals, half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

fn format_plain(value: Decimal) -> String {
    value.normalize().to_string()
}

fn printable_line(line: &InvoiceLineItem) -> PrintableLine {
    PrintableLine {
        name: line.name.clone(),
        qty: format_plain(line.qty),
        price: format_amount(line.price),
        gst_rate: format!("{}%", format_plain(line.gst)),
        amount: format_amount(line.amount),
    }
}

pub fn render(invoice: &Invoice, garage: Option<&GarageAddress>) -> PrintableInvoice {
    let totals = compute_totals(
        &invoice.stocks,
        &invoice.services,
        invoice.discount,
        &invoice.additional_charges,
        invoice.invoice_type,
    );
    let lines: Vec<_> = invoice.lines().collect();
    let slabs = gst_breakdown(&lines, invoice.discount, invoice.invoice_type);

    let cgst: Decimal = slabs.iter().map(|s| s.cgst()).sum();
    let sgst: Decimal = slabs.iter().map(|s| s.sgst()).sum();

    PrintableInvoice {
        garage_name: garage.map(|g| g.garage_name.clone()),
        garage_address: garage.map(|g| g.address.clone()),
        garage_gst_number: garage.and_then(|g| g.gst_number.clone()),
        invoice_number: invoice.invoice_number.clone(),
        date: invoice.date.format("%d/%m/%Y").to_string(),
        invoice_type: invoice.invoice_type.to_string(),
        customer_name: invoice.customer_name.clone(),
        vehicle_number: invoice.vehicle_number.clone(),
        stocks: invoice.stocks.iter().map(printable_line).collect(),
        services: invoice.services.iter().map(printable_line).collect(),
        subtotal: format_amount(totals.subtotal),
        discount_percent: format_plain(invoice.discount),
        discount_amount: format_amount(totals.discount_amount),
        gst_breakdown: slabs
            .iter()
            .map(|slab| PrintableGstSlab {
                rate: format!("{}%", format_plain(slab.rate)),
                taxable_amount: format_amount(slab.taxable_amount),
                cgst: format_amount(slab.cgst()),
                sgst: format_amount(slab.sgst()),
                gst_amount: format_amount(slab.gst_amount),
            })
            .collect(),
        cgst_amount: format_amount(cgst),
        sgst_amount: format_amount(sgst),
        gst_amount: format_amount(totals.gst_amount),
        additional_charges: invoice
            .additional_charges
            .iter()
            .map(|c| PrintableCharge {
                description: c.description.clone(),
                amount: format_amount(c.amount),
            })
            .collect(),
        total_amount: format_amount(totals.total_amount),
        amount_in_words: amount_in_words(totals.total_amount),
    }
}

const ONES: [&str; 20] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn below_hundred(n: u64) -> String {
    match n {
        0..=19 => ONES[n as usize].to_string(),
        _ if n % 10 == 0 => TENS[(n / 10) as usize].to_string(),
        _ => format!("{} {}", TENS[(n / 10) as usize], ONES[(n % 10) as usize]),
    }
}

/// Words for `n` using the Indian grouping (thousand, lakh, crore).
fn number_in_words(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut parts = Vec::new();
    let crore = n / 10_000_000;
    let lakh = (n / 100_000) % 100;
    let thousand = (n / 1_000) % 100;
    let hundred = (n / 100) % 10;
    let rest = n % 100;

    if crore > 0 {
        parts.push(format!("{} Crore", number_in_words(crore)));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", below_hundred(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", below_hundred(thousand)));
    }
    if hundred > 0 {
        parts.push(format!("{} Hundred", ONES[hundred as usize]));
    }
    if rest > 0 {
        parts.push(below_hundred(rest));
    }
    parts.join(" ")
}

/// "Rupees Two Thousand Six Hundred Fifty Five Only", with paise when the
/// rounded amount has any.
pub fn amount_in_words(amount: Decimal) -> String {
    let rounded = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let rupees = rounded.trunc().to_u64().unwrap_or(0);
    let paise = ((rounded - rounded.trunc()) * Decimal::ONE_HUNDRED)
        .to_u64()
        .unwrap_or(0);

    let mut words = format!("Rupees {}", number_in_words(rupees));
    if paise > 0 {
        words.push_str(&format!(" and {} Paise", below_hundred(paise)));
    }
    words.push_str(" Only");
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_print_with_two_decimals() {
        assert_eq!(format_amount(Decimal::from(2655)), "2655.00");
        assert_eq!(format_amount(Decimal::new(405, 1)), "40.50");
        assert_eq!(format_amount(Decimal::new(1005, 3)), "1.01");
        assert_eq!(format_amount(Decimal::new(123_456, 4)), "12.35");
    }

    #[test]
    fn words_follow_indian_grouping() {
        assert_eq!(number_in_words(2655), "Two Thousand Six Hundred Fifty Five");
        assert_eq!(number_in_words(100_000), "One Lakh");
        assert_eq!(
            number_in_words(123_456_789),
            "Twelve Crore Thirty Four Lakh Fifty Six Thousand Seven Hundred Eighty Nine"
        );
        assert_eq!(number_in_words(1_010), "One Thousand Ten");
    }

    #[test]
    fn amount_in_words_includes_paise() {
        assert_eq!(
            amount_in_words(Decimal::from(2655)),
            "Rupees Two Thousand Six Hundred Fifty Five Only"
        );
        assert_eq!(
            amount_in_words(Decimal::new(10_050, 2)),
            "Rupees One Hundred and Fifty Paise Only"
        );
        assert_eq!(amount_in_words(Decimal::ZERO), "Rupees Zero Only");
    }
}
