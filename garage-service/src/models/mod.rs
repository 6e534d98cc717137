//! Domain models for garage-service.

mod catalog;
mod counter;
mod customer;
mod garage_info;
mod invoice;
mod jobcard;
mod profit;

use chrono::{DateTime, SubsecRound, Utc};

pub use catalog::{
    selling_price_for, CatalogFilter, CatalogKind, Category, CreateServiceItem, CreateStockItem,
    ServiceItem, StockItem, UpdateServiceItem, UpdateStockItem, SERVICES, STOCKS,
};
pub use counter::{sequence_count, MonthCounter, SequenceKind, YearMonth};
pub use customer::{
    CreateCustomer, CreateVehicle, Customer, CustomerWithVehicles, UpdateCustomer, UpdateVehicle,
    Vehicle, CUSTOMERS, VEHICLES,
};
pub use garage_info::{
    AddressStatus, CreateGarageAddress, GarageAddress, UpdateGarageAddress, GARAGE_INFO,
};
pub use invoice::{
    AdditionalCharge, CreateInvoice, Invoice, InvoiceFilter, InvoiceLineItem, InvoiceTotals,
    InvoiceType, UpdateInvoice, INVOICES,
};
pub use jobcard::{
    CreateJobCard, JobCard, JobCardPage, JobCardStatus, UpdateJobCard, WorkType, JOBCARDS,
};
pub use profit::{InvoiceProfit, MonthProfit, ProfitShare, INVOICE_PROFITS, MONTHLY_PROFITS};

/// Strip surrounding whitespace so length rules reject blank input.
pub(crate) fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Timestamps are persisted with millisecond precision.
pub fn store_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}
