#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use garage_service::models::{
    CatalogKind, CreateCustomer, CreateInvoice, CreateJobCard, CreateServiceItem, CreateStockItem,
    CreateVehicle, CustomerWithVehicles, InvoiceLineItem, InvoiceType, ServiceItem, StockItem,
    WorkType,
};
use garage_service::services::{InMemoryStore, PageLimits};
use garage_service::startup::Garage;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A fully wired `Garage` on a fresh in-memory store. The store handle is
/// kept so tests can inspect collections and inject write failures.
pub struct TestGarage {
    pub store: InMemoryStore,
    pub garage: Garage,
}

impl TestGarage {
    pub fn new() -> Self {
        Self::with_batch_size(50)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        let store = InMemoryStore::new();
        let garage = Garage::new(Arc::new(store.clone()), PageLimits::default(), batch_size);
        Self { store, garage }
    }

    pub async fn customer(&self, name: &str, vehicle_numbers: &[&str]) -> CustomerWithVehicles {
        self.garage
            .customers
            .create(CreateCustomer {
                name: name.to_string(),
                phone: "9800000000".to_string(),
                address: "12 Workshop Lane".to_string(),
                gst_number: None,
                vehicles: vehicle_numbers
                    .iter()
                    .map(|number| CreateVehicle {
                        vehicle_number: number.to_string(),
                        make: "Maruti".to_string(),
                        model: "Swift".to_string(),
                        kilometer: 42_000,
                    })
                    .collect(),
            })
            .await
            .expect("Failed to create customer")
    }

    /// Register a category unless one with that name already exists.
    pub async fn category(&self, kind: CatalogKind, name: &str) {
        let existing = self
            .garage
            .catalog
            .categories(kind)
            .await
            .expect("Failed to list categories");
        if !existing.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            self.garage
                .catalog
                .create_category(kind, name)
                .await
                .expect("Failed to create category");
        }
    }

    pub async fn stock(
        &self,
        name: &str,
        purchase_price: i64,
        selling_price: i64,
        gst: i64,
        category: &str,
    ) -> StockItem {
        self.category(CatalogKind::Stock, category).await;
        self.garage
            .catalog
            .create_stock(CreateStockItem {
                product_name: name.to_string(),
                part_number: format!("PN-{}", name.len()),
                hsn_code: "8708".to_string(),
                purchase_price: Decimal::from(purchase_price),
                profit_margin: Decimal::ZERO,
                selling_price: Some(Decimal::from(selling_price)),
                gst: Decimal::from(gst),
                category: category.to_string(),
            })
            .await
            .expect("Failed to create stock item")
    }

    pub async fn service(&self, name: &str, labour: i64, gst: i64, category: &str) -> ServiceItem {
        self.category(CatalogKind::Service, category).await;
        self.garage
            .catalog
            .create_service(CreateServiceItem {
                service_name: name.to_string(),
                hsn_code: "9987".to_string(),
                gst: Decimal::from(gst),
                labour: Decimal::from(labour),
                category: category.to_string(),
            })
            .await
            .expect("Failed to create service item")
    }

    /// The worked example: two brake pad sets at 1000 and one labour line at
    /// 500, both 18% GST, 10% discount.
    pub async fn sample_invoice_input(&self, date: DateTime<Utc>) -> CreateInvoice {
        let owner = self.customer("Asha Rao", &["KA01AB1234"]).await;
        let pads = self.stock("Brake pads", 700, 1000, 18, "Brakes").await;
        let labour = self.service("Brake service", 500, 18, "Labour").await;

        CreateInvoice {
            customer_id: owner.customer.id.clone(),
            vehicle_id: owner.vehicles[0].id.clone(),
            invoice_type: InvoiceType::Gst,
            date: Some(date),
            stocks: vec![InvoiceLineItem::from_stock(&pads, Decimal::from(2))],
            services: vec![InvoiceLineItem::from_service(&labour, Decimal::ONE)],
            discount: Decimal::from(10),
            additional_charges: vec![],
            note: String::new(),
        }
    }
}

pub fn jobcard_input(registration: &str, date: DateTime<Utc>) -> CreateJobCard {
    CreateJobCard {
        vehicle_registration: registration.to_string(),
        customer_name: "Ravi Kumar".to_string(),
        mobile_number: "9811111111".to_string(),
        gst_number: None,
        address: None,
        chassis_number: None,
        kilometer: 35_500,
        model: "Honda City".to_string(),
        work_type: WorkType::GeneralService,
        complaints: vec!["Brake noise".to_string(), "  ".to_string()],
        date_created: Some(date),
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}
