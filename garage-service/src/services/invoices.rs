//! Invoices: creation from registered customers and vehicles, edits,
//! deletion and listing. Every write goes through the fan-out writer to the
//! flat `invoices` collection and the invoice's month partition.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::models::{
    sequence_count, store_timestamp, AdditionalCharge, CatalogKind, CreateInvoice, Customer,
    Invoice, InvoiceFilter, InvoiceLineItem, SequenceKind, ServiceItem, StockItem, UpdateInvoice,
    Vehicle, YearMonth, CUSTOMERS, INVOICES, VEHICLES,
};
use crate::services::cache::{paginate, Page, PageLimits, SnapshotCache};
use crate::services::fanout::{FanoutEvent, FanoutWriter};
use crate::services::metrics::{record_error, INVOICE_AMOUNT_TOTAL};
use crate::services::numbering::SequenceAllocator;
use crate::services::profit::ProfitService;
use crate::services::store::{
    get_as, list_as, query_as, to_document, DocumentStore, Query, SortOrder, WriteBatch,
};
use crate::services::totals::compute_totals;

const ALL_INVOICES: &str = "allInvoices";

pub struct InvoiceService {
    store: Arc<dyn DocumentStore>,
    fanout: FanoutWriter,
    sequences: SequenceAllocator,
    profits: ProfitService,
    cache: SnapshotCache<Invoice>,
    limits: PageLimits,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn DocumentStore>, profits: ProfitService, limits: PageLimits) -> Self {
        Self {
            fanout: FanoutWriter::new(Arc::clone(&store)),
            sequences: SequenceAllocator::new(Arc::clone(&store)),
            store,
            profits,
            cache: SnapshotCache::new("invoices"),
            limits,
        }
    }

    /// Freeze a stock item as an invoice line, keeping its purchase price as
    /// the cost basis.
    pub async fn stock_line(
        &self,
        stock_id: &str,
        qty: Decimal,
    ) -> Result<InvoiceLineItem, AppError> {
        let collection = CatalogKind::Stock.items_collection();
        let item: StockItem = get_as(self.store.as_ref(), collection, stock_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Stock item {} not found", stock_id))
            })?;
        Ok(InvoiceLineItem::from_stock(&item, qty))
    }

    pub async fn service_line(
        &self,
        service_id: &str,
        qty: Decimal,
    ) -> Result<InvoiceLineItem, AppError> {
        let collection = CatalogKind::Service.items_collection();
        let item: ServiceItem = get_as(self.store.as_ref(), collection, service_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Service item {} not found", service_id))
            })?;
        Ok(InvoiceLineItem::from_service(&item, qty))
    }

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create(&self, input: CreateInvoice) -> Result<Invoice, AppError> {
        validate_lines(&input.stocks, &input.services, input.discount, &input.additional_charges)?;

        let customer: Customer = get_as(self.store.as_ref(), CUSTOMERS, &input.customer_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Customer {} not found", input.customer_id))
            })?;
        let vehicle: Vehicle = get_as(self.store.as_ref(), VEHICLES, &input.vehicle_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Vehicle {} not found", input.vehicle_id))
            })?;
        if vehicle.customer_id != customer.id {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Vehicle {} does not belong to customer {}",
                vehicle.id,
                customer.id
            )));
        }

        let date = store_timestamp(input.date.unwrap_or_else(Utc::now));
        let invoice_number = self
            .sequences
            .next(SequenceKind::Invoice, YearMonth::of(&date))
            .await?;

        let mut invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id,
            customer_name: customer.name,
            customer_phone: customer.phone,
            customer_address: customer.address,
            customer_gst: customer.gst_number,
            vehicle_id: vehicle.id,
            vehicle_number: vehicle.vehicle_number,
            vehicle_make: vehicle.make,
            vehicle_model: vehicle.model,
            vehicle_kilometer: vehicle.kilometer,
            invoice_type: input.invoice_type,
            invoice_number,
            date,
            stocks: input.stocks,
            services: input.services,
            discount: input.discount,
            additional_charges: input.additional_charges,
            note: input.note,
            subtotal: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            gst_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        };
        refresh_totals(&mut invoice);

        self.fanout.create(&invoice).await?;
        self.cache.invalidate();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[invoice.invoice_type.as_str()])
            .inc_by(invoice.total_amount.to_f64().unwrap_or_default());
        info!(
            invoice_id = %invoice.id,
            number = %invoice.invoice_number,
            total = %invoice.total_amount,
            "Invoice created"
        );

        self.record_profit(&invoice, None).await;
        Ok(invoice)
    }

    pub async fn get(&self, id: &str) -> Result<Invoice, AppError> {
        get_as(self.store.as_ref(), INVOICES, id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", id)))
    }

    /// Edit an invoice. Totals are recomputed; a date in another month moves
    /// the invoice to that month's partition.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: UpdateInvoice) -> Result<Invoice, AppError> {
        let before = self.get(id).await?;
        let mut after = before.clone();
        apply_update(&mut after, input);
        validate_lines(&after.stocks, &after.services, after.discount, &after.additional_charges)?;
        refresh_totals(&mut after);

        self.ensure_partitioned(&before).await?;
        self.fanout.update(&before, &after, FanoutEvent::Edit).await?;
        self.cache.invalidate();
        info!(invoice_id = %id, total = %after.total_amount, "Invoice updated");

        self.record_profit(&after, Some(before.year_month())).await;
        Ok(after)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let invoice = self.get(id).await?;
        self.fanout.delete(&invoice).await?;
        self.cache.invalidate();
        info!(invoice_id = %id, number = %invoice.invoice_number, "Invoice deleted");

        if let Err(e) = self.profits.retract(&invoice).await {
            record_error(&e);
            error!(invoice_id = %id, error = %e, "Failed to retract invoice profit");
        }
        Ok(())
    }

    /// Page through all invoices, newest first, filtered in memory.
    pub async fn list(
        &self,
        filter: &InvoiceFilter,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<Invoice>, AppError> {
        let snapshot = self
            .cache
            .get_or_fetch(ALL_INVOICES, || async {
                let mut invoices: Vec<Invoice> = list_as(self.store.as_ref(), INVOICES).await?;
                invoices.sort_by(|a, b| {
                    b.date
                        .cmp(&a.date)
                        .then_with(|| {
                            sequence_count(&b.invoice_number).cmp(&sequence_count(&a.invoice_number))
                        })
                });
                Ok::<_, AppError>(invoices)
            })
            .await?;

        let matching: Vec<_> = snapshot
            .iter()
            .filter(|invoice| filter.accepts(invoice))
            .cloned()
            .collect();
        Ok(paginate(&matching, page, self.limits.resolve(page_size)))
    }

    /// Every invoice of one month, read from its partition, newest first.
    pub async fn list_month(&self, year_month: YearMonth) -> Result<Vec<Invoice>, AppError> {
        let query = Query::new().order_by("date", SortOrder::Descending);
        query_as(self.store.as_ref(), &year_month.partition(INVOICES), &query).await
    }

    /// Invoices saved before month partitions existed are copied into theirs
    /// before an edit updates that copy in place.
    async fn ensure_partitioned(&self, invoice: &Invoice) -> Result<(), AppError> {
        let partition = invoice.year_month().partition(INVOICES);
        if self.store.get(&partition, &invoice.id).await?.is_none() {
            let mut batch = WriteBatch::new();
            batch.set(&partition, &invoice.id, to_document(invoice)?);
            self.store.commit(batch).await?;
            info!(invoice_id = %invoice.id, partition = %partition, "Backfilled month partition");
        }
        Ok(())
    }

    /// Profit rollups are repaired by a recalculation, so a failure here does
    /// not fail the invoice write that already succeeded.
    async fn record_profit(&self, invoice: &Invoice, previous_month: Option<YearMonth>) {
        if let Err(e) = self.profits.record(invoice, previous_month).await {
            record_error(&e);
            error!(invoice_id = %invoice.id, error = %e, "Failed to record invoice profit");
        }
    }
}

fn refresh_totals(invoice: &mut Invoice) {
    let totals = compute_totals(
        &invoice.stocks,
        &invoice.services,
        invoice.discount,
        &invoice.additional_charges,
        invoice.invoice_type,
    );
    invoice.set_totals(totals);
}

fn apply_update(invoice: &mut Invoice, input: UpdateInvoice) {
    if let Some(v) = input.invoice_type {
        invoice.invoice_type = v;
    }
    if let Some(v) = input.date {
        invoice.date = store_timestamp(v);
    }
    if let Some(v) = input.stocks {
        invoice.stocks = v;
    }
    if let Some(v) = input.services {
        invoice.services = v;
    }
    if let Some(v) = input.discount {
        invoice.discount = v;
    }
    if let Some(v) = input.additional_charges {
        invoice.additional_charges = v;
    }
    if let Some(v) = input.note {
        invoice.note = v;
    }
    if let Some(v) = input.vehicle_kilometer {
        invoice.vehicle_kilometer = v;
    }
}

fn validate_lines(
    stocks: &[InvoiceLineItem],
    services: &[InvoiceLineItem],
    discount: Decimal,
    additional_charges: &[AdditionalCharge],
) -> Result<(), AppError> {
    if stocks.is_empty() && services.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invoice must contain at least one stock or service line"
        )));
    }
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount must be between 0 and 100 percent"
        )));
    }
    if let Some(line) = stocks
        .iter()
        .chain(services.iter())
        .find(|l| l.qty <= Decimal::ZERO || l.price < Decimal::ZERO || l.gst < Decimal::ZERO)
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Line {} needs a positive quantity and non-negative price and GST",
            line.name
        )));
    }
    if additional_charges.iter().any(|c| c.description.trim().is_empty()) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Additional charges need a description"
        )));
    }
    Ok(())
}
