//! Customers and their vehicles.

use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::models::{
    CreateCustomer, CreateVehicle, Customer, CustomerWithVehicles, UpdateCustomer, UpdateVehicle,
    Vehicle, CUSTOMERS, VEHICLES,
};
use crate::services::cache::{paginate, Page, PageLimits, SnapshotCache};
use crate::services::store::{get_as, list_as, query_as, to_document, DocumentStore, Query, WriteBatch};

const ALL_CUSTOMERS: &str = "customersWithVehicles";

pub struct CustomerService {
    store: Arc<dyn DocumentStore>,
    cache: SnapshotCache<CustomerWithVehicles>,
    limits: PageLimits,
}

impl CustomerService {
    pub fn new(store: Arc<dyn DocumentStore>, limits: PageLimits) -> Self {
        Self {
            store,
            cache: SnapshotCache::new("customers"),
            limits,
        }
    }

    /// Create a customer and its initial vehicles in one batch.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateCustomer) -> Result<CustomerWithVehicles, AppError> {
        let input = input.trimmed();
        input.validate()?;

        let (customer, vehicles) = input.into_customer();
        let vehicles: Vec<Vehicle> = vehicles
            .into_iter()
            .map(|v| v.into_vehicle(&customer.id))
            .collect();

        let mut batch = WriteBatch::new();
        batch.set(CUSTOMERS, &customer.id, to_document(&customer)?);
        for vehicle in &vehicles {
            batch.set(VEHICLES, &vehicle.id, to_document(vehicle)?);
        }
        self.store.commit(batch).await?;
        self.cache.invalidate();

        info!(customer_id = %customer.id, vehicles = vehicles.len(), "Customer created");
        Ok(CustomerWithVehicles { customer, vehicles })
    }

    pub async fn get(&self, id: &str) -> Result<CustomerWithVehicles, AppError> {
        let customer = self.find_customer(id).await?;
        let vehicles = self.vehicles_of(id).await?;
        Ok(CustomerWithVehicles { customer, vehicles })
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: UpdateCustomer) -> Result<Customer, AppError> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Customer name cannot be empty"
            )));
        }

        let mut customer = self.find_customer(id).await?;
        input.apply(&mut customer);

        let mut batch = WriteBatch::new();
        batch.set(CUSTOMERS, id, to_document(&customer)?);
        self.store.commit(batch).await?;
        self.cache.invalidate();

        info!(customer_id = %id, "Customer updated");
        Ok(customer)
    }

    /// Delete a customer together with every vehicle it owns.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.find_customer(id).await?;
        let vehicles = self.vehicles_of(id).await?;

        let mut batch = WriteBatch::new();
        for vehicle in &vehicles {
            batch.delete(VEHICLES, &vehicle.id);
        }
        batch.delete(CUSTOMERS, id);
        self.store.commit(batch).await?;
        self.cache.invalidate();

        info!(customer_id = %id, vehicles = vehicles.len(), "Customer deleted");
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn add_vehicle(&self, customer_id: &str, input: CreateVehicle) -> Result<Vehicle, AppError> {
        let input = input.trimmed();
        input.validate()?;
        self.find_customer(customer_id).await?;

        let vehicle = input.into_vehicle(customer_id);
        let mut batch = WriteBatch::new();
        batch.set(VEHICLES, &vehicle.id, to_document(&vehicle)?);
        self.store.commit(batch).await?;
        self.cache.invalidate();

        info!(customer_id = %customer_id, vehicle_id = %vehicle.id, "Vehicle added");
        Ok(vehicle)
    }

    #[instrument(skip(self, input))]
    pub async fn update_vehicle(&self, id: &str, input: UpdateVehicle) -> Result<Vehicle, AppError> {
        let mut vehicle = self.find_vehicle(id).await?;
        input.apply(&mut vehicle);
        if vehicle.vehicle_number.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Vehicle number cannot be empty"
            )));
        }

        let mut batch = WriteBatch::new();
        batch.set(VEHICLES, id, to_document(&vehicle)?);
        self.store.commit(batch).await?;
        self.cache.invalidate();
        Ok(vehicle)
    }

    #[instrument(skip(self))]
    pub async fn delete_vehicle(&self, id: &str) -> Result<(), AppError> {
        self.find_vehicle(id).await?;
        let mut batch = WriteBatch::new();
        batch.delete(VEHICLES, id);
        self.store.commit(batch).await?;
        self.cache.invalidate();
        Ok(())
    }

    pub async fn find_customer(&self, id: &str) -> Result<Customer, AppError> {
        get_as(self.store.as_ref(), CUSTOMERS, id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer {} not found", id)))
    }

    pub async fn find_vehicle(&self, id: &str) -> Result<Vehicle, AppError> {
        get_as(self.store.as_ref(), VEHICLES, id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Vehicle {} not found", id)))
    }

    pub async fn vehicles_of(&self, customer_id: &str) -> Result<Vec<Vehicle>, AppError> {
        query_as(
            self.store.as_ref(),
            VEHICLES,
            &Query::new().eq("customerId", customer_id),
        )
        .await
    }

    /// Page through all customers, optionally filtered by name, phone or
    /// vehicle number.
    pub async fn list(
        &self,
        page: usize,
        page_size: Option<usize>,
        search: Option<&str>,
    ) -> Result<Page<CustomerWithVehicles>, AppError> {
        let snapshot = self
            .cache
            .get_or_fetch(ALL_CUSTOMERS, || self.fetch_all())
            .await?;

        let page_size = self.limits.resolve(page_size);
        match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let matching: Vec<_> = snapshot
                    .iter()
                    .filter(|c| c.matches(needle))
                    .cloned()
                    .collect();
                Ok(paginate(&matching, page, page_size))
            }
            None => Ok(paginate(&snapshot, page, page_size)),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<CustomerWithVehicles>, AppError> {
        let customers: Vec<Customer> = list_as(self.store.as_ref(), CUSTOMERS).await?;
        let vehicles: Vec<Vehicle> = list_as(self.store.as_ref(), VEHICLES).await?;

        let mut by_owner: HashMap<String, Vec<Vehicle>> = HashMap::new();
        for vehicle in vehicles {
            by_owner
                .entry(vehicle.customer_id.clone())
                .or_default()
                .push(vehicle);
        }

        let mut all: Vec<_> = customers
            .into_iter()
            .map(|customer| {
                let vehicles = by_owner.remove(&customer.id).unwrap_or_default();
                CustomerWithVehicles { customer, vehicles }
            })
            .collect();
        all.sort_by(|a, b| {
            a.customer
                .name
                .to_lowercase()
                .cmp(&b.customer.name.to_lowercase())
                .then_with(|| a.customer.created_at.cmp(&b.customer.created_at))
        });
        Ok(all)
    }
}
