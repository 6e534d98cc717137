mod common;

use common::{at, TestGarage};
use garage_service::models::{
    AdditionalCharge, Invoice, InvoiceFilter, InvoiceType, UpdateInvoice, YearMonth, INVOICES,
};
use garage_service::services::store::{get_as, WriteBatch};
use garage_service::services::DocumentStore;
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;

#[tokio::test]
async fn worked_example_totals_2655() {
    let t = TestGarage::new();
    let input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;

    let invoice = t.garage.invoices.create(input).await.unwrap();

    assert_eq!(invoice.invoice_number, "INV-202603-0001");
    assert_eq!(invoice.subtotal, Decimal::from(2500));
    assert_eq!(invoice.discount_amount, Decimal::from(250));
    assert_eq!(invoice.gst_amount, Decimal::from(405));
    assert_eq!(invoice.total_amount, Decimal::from(2655));
    assert_eq!(invoice.customer_name, "Asha Rao");
    assert_eq!(invoice.vehicle_number, "KA01AB1234");
}

#[tokio::test]
async fn flat_and_partition_copies_are_identical() {
    let t = TestGarage::new();
    let input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    let invoice = t.garage.invoices.create(input).await.unwrap();

    let flat = t.store.get(INVOICES, &invoice.id).await.unwrap().unwrap();
    let partition = t
        .store
        .get("invoices-2026-03", &invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flat.data, partition.data);

    let reloaded: Invoice = flat.decode().unwrap();
    assert_eq!(reloaded, invoice);
}

#[tokio::test]
async fn non_gst_invoice_has_no_tax() {
    let t = TestGarage::new();
    let mut input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    input.invoice_type = InvoiceType::NonGst;
    input.additional_charges = vec![AdditionalCharge {
        description: "Towing".to_string(),
        amount: Decimal::from(300),
    }];

    let invoice = t.garage.invoices.create(input).await.unwrap();
    assert_eq!(invoice.gst_amount, Decimal::ZERO);
    assert_eq!(invoice.total_amount, Decimal::from(2550));
}

#[tokio::test]
async fn vehicle_must_belong_to_customer() {
    let t = TestGarage::new();
    let mut input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    let stranger = t.customer("Someone Else", &["TN09QQ0009"]).await;
    input.vehicle_id = stranger.vehicles[0].id.clone();

    let err = t.garage.invoices.create(input).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(t.store.collection_len(INVOICES).await, 0);
}

#[tokio::test]
async fn invalid_lines_are_rejected_before_numbering() {
    let t = TestGarage::new();
    let mut input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    input.discount = Decimal::from(120);

    let err = t.garage.invoices.create(input.clone()).await.unwrap_err();
    assert!(err.is_validation());

    input.discount = Decimal::ZERO;
    input.stocks.clear();
    input.services.clear();
    let err = t.garage.invoices.create(input).await.unwrap_err();
    assert!(err.is_validation());

    assert_eq!(t.store.collection_len("counters").await, 0);
}

#[tokio::test]
async fn editing_the_date_moves_the_month_partition() {
    let t = TestGarage::new();
    let input = t.sample_invoice_input(at(2026, 3, 31, 18)).await;
    let invoice = t.garage.invoices.create(input).await.unwrap();

    let edited = t
        .garage
        .invoices
        .update(
            &invoice.id,
            UpdateInvoice {
                date: Some(at(2026, 4, 1, 9)),
                discount: Some(Decimal::ZERO),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.total_amount, Decimal::from(2950));
    assert_eq!(edited.invoice_number, invoice.invoice_number);
    assert_eq!(t.store.collection_len("invoices-2026-03").await, 0);
    let april: Invoice = get_as(&t.store, "invoices-2026-04", &invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(april, edited);
}

#[tokio::test]
async fn editing_an_unpartitioned_invoice_backfills_it_first() {
    let t = TestGarage::new();
    let input = t.sample_invoice_input(at(2026, 2, 10, 10)).await;
    let invoice = t.garage.invoices.create(input).await.unwrap();

    // Drop the partition copy, as for invoices saved before partitions existed.
    let mut batch = WriteBatch::new();
    batch.delete("invoices-2026-02", &invoice.id);
    t.store.commit(batch).await.unwrap();

    t.garage
        .invoices
        .update(
            &invoice.id,
            UpdateInvoice {
                note: Some("Paid in cash".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let partition: Invoice = get_as(&t.store, "invoices-2026-02", &invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(partition.note, "Paid in cash");
}

#[tokio::test]
async fn delete_removes_both_copies() {
    let t = TestGarage::new();
    let input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    let invoice = t.garage.invoices.create(input).await.unwrap();

    t.garage.invoices.delete(&invoice.id).await.unwrap();

    assert_eq!(t.store.collection_len(INVOICES).await, 0);
    assert_eq!(t.store.collection_len("invoices-2026-03").await, 0);
    let err = t.garage.invoices.get(&invoice.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn failed_fanout_leaves_nothing_behind() {
    let t = TestGarage::new();
    let input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;

    t.store.fail_next_commit_at(1).await;
    t.garage.invoices.create(input).await.unwrap_err();

    assert_eq!(t.store.collection_len(INVOICES).await, 0);
    assert_eq!(t.store.collection_len("invoices-2026-03").await, 0);
    assert_eq!(t.store.collection_len("invoiceProfits").await, 0);
}

#[tokio::test]
async fn listing_filters_by_month_type_and_search() {
    let t = TestGarage::new();
    let march = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    let mut april = march.clone();
    april.date = Some(at(2026, 4, 2, 11));
    april.invoice_type = InvoiceType::NonGst;

    t.garage.invoices.create(march).await.unwrap();
    let latest = t.garage.invoices.create(april).await.unwrap();

    let all = t
        .garage
        .invoices
        .list(&InvoiceFilter::default(), 1, None)
        .await
        .unwrap();
    assert_eq!(all.total_count, 2);
    assert_eq!(all.items[0].id, latest.id);

    let only_march = t
        .garage
        .invoices
        .list(
            &InvoiceFilter {
                month: YearMonth::new(2026, 3),
                ..Default::default()
            },
            1,
            None,
        )
        .await
        .unwrap();
    assert_eq!(only_march.total_count, 1);

    let non_gst = t
        .garage
        .invoices
        .list(
            &InvoiceFilter {
                invoice_type: Some(InvoiceType::NonGst),
                search: Some("inv-202604".to_string()),
                ..Default::default()
            },
            1,
            None,
        )
        .await
        .unwrap();
    assert_eq!(non_gst.total_count, 1);

    let month = t
        .garage
        .invoices
        .list_month(YearMonth::new(2026, 4).unwrap())
        .await
        .unwrap();
    assert_eq!(month.len(), 1);
    assert_eq!(month[0].invoice_number, "INV-202604-0001");
}

#[tokio::test]
async fn lines_are_frozen_from_the_catalog() {
    let t = TestGarage::new();
    let filter = t.stock("Oil filter", 150, 200, 18, "Filters").await;
    let line = t
        .garage
        .invoices
        .stock_line(&filter.id, Decimal::from(3))
        .await
        .unwrap();
    assert_eq!(line.amount, Decimal::from(600));
    assert_eq!(line.purchase_price, Some(Decimal::from(150)));

    let err = t
        .garage
        .invoices
        .service_line("missing", Decimal::ONE)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn same_time_invoices_list_by_numeric_sequence() {
    let t = TestGarage::new();
    let mut batch = WriteBatch::new();
    batch.set(
        "counters",
        "invoiceCounter-2026-03",
        json!({ "yearMonth": "2026-03", "count": 9998 }),
    );
    t.store.commit(batch).await.unwrap();

    let input = t.sample_invoice_input(at(2026, 3, 14, 11)).await;
    let older = t.garage.invoices.create(input.clone()).await.unwrap();
    let newer = t.garage.invoices.create(input).await.unwrap();
    assert_eq!(older.invoice_number, "INV-202603-9999");
    assert_eq!(newer.invoice_number, "INV-202603-10000");

    let page = t
        .garage
        .invoices
        .list(&InvoiceFilter::default(), 1, None)
        .await
        .unwrap();
    let numbers: Vec<_> = page.items.iter().map(|i| i.invoice_number.as_str()).collect();
    assert_eq!(numbers, vec!["INV-202603-10000", "INV-202603-9999"]);
}
