mod common;

use common::{at, TestGarage};
use garage_service::models::{AdditionalCharge, CreateGarageAddress, InvoiceLineItem};
use garage_service::services::printable::render;
use rust_decimal::Decimal;

#[tokio::test]
async fn printed_figures_match_the_stored_totals() {
    let t = TestGarage::new();
    let garage = t
        .garage
        .garage_info
        .add(CreateGarageAddress {
            garage_name: "Sahay Motors".to_string(),
            address: "14 Ring Road".to_string(),
            phone: "080-4000000".to_string(),
            email: None,
            gst_number: Some("29ABCDE1234F1Z5".to_string()),
        })
        .await
        .unwrap();
    let input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    let invoice = t.garage.invoices.create(input).await.unwrap();

    let printed = render(&invoice, Some(&garage));

    assert_eq!(printed.garage_name.as_deref(), Some("Sahay Motors"));
    assert_eq!(printed.date, "14/03/2026");
    assert_eq!(printed.invoice_number, "INV-202603-0001");
    assert_eq!(printed.subtotal, "2500.00");
    assert_eq!(printed.discount_amount, "250.00");
    assert_eq!(printed.gst_amount, "405.00");
    assert_eq!(printed.cgst_amount, "202.50");
    assert_eq!(printed.sgst_amount, "202.50");
    assert_eq!(printed.total_amount, "2655.00");
    assert_eq!(
        printed.amount_in_words,
        "Rupees Two Thousand Six Hundred Fifty Five Only"
    );

    assert_eq!(printed.gst_breakdown.len(), 1);
    assert_eq!(printed.gst_breakdown[0].rate, "18%");
    assert_eq!(printed.gst_breakdown[0].taxable_amount, "2250.00");
    assert_eq!(printed.stocks[0].qty, "2");
    assert_eq!(printed.stocks[0].amount, "2000.00");
}

#[tokio::test]
async fn mixed_rates_split_into_slabs() {
    let t = TestGarage::new();
    let mut input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    input.discount = Decimal::ZERO;
    input.stocks.push(InvoiceLineItem::new(
        "p9",
        "Battery",
        Decimal::ONE,
        Decimal::from(4000),
        Decimal::from(28),
    ));
    input.additional_charges = vec![AdditionalCharge {
        description: "Disposal".to_string(),
        amount: Decimal::new(9950, 2),
    }];
    let invoice = t.garage.invoices.create(input).await.unwrap();

    let printed = render(&invoice, None);

    assert!(printed.garage_name.is_none());
    let rates: Vec<_> = printed.gst_breakdown.iter().map(|s| s.rate.as_str()).collect();
    assert_eq!(rates, vec!["18%", "28%"]);
    assert_eq!(printed.gst_breakdown[1].gst_amount, "1120.00");
    // 6500 + (450 + 1120) + 99.50
    assert_eq!(printed.total_amount, "8169.50");
    assert_eq!(printed.additional_charges[0].amount, "99.50");
    assert_eq!(
        printed.amount_in_words,
        "Rupees Eight Thousand One Hundred Sixty Nine and Fifty Paise Only"
    );
}
