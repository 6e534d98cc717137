//! Garage profile addresses; exactly one is the default at any time.

use serde_json::{Map, Value};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::models::{
    AddressStatus, CreateGarageAddress, GarageAddress, UpdateGarageAddress, GARAGE_INFO,
};
use crate::services::store::{get_as, list_as, to_document, DocumentStore, WriteBatch};

pub struct GarageInfoService {
    store: Arc<dyn DocumentStore>,
}

impl GarageInfoService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All addresses, default first.
    pub async fn list(&self) -> Result<Vec<GarageAddress>, AppError> {
        let mut addresses: Vec<GarageAddress> = list_as(self.store.as_ref(), GARAGE_INFO).await?;
        addresses.sort_by(|a, b| {
            b.is_default()
                .cmp(&a.is_default())
                .then_with(|| a.garage_name.cmp(&b.garage_name))
        });
        Ok(addresses)
    }

    pub async fn default_address(&self) -> Result<Option<GarageAddress>, AppError> {
        Ok(self.list().await?.into_iter().find(GarageAddress::is_default))
    }

    pub async fn get(&self, id: &str) -> Result<GarageAddress, AppError> {
        get_as(self.store.as_ref(), GARAGE_INFO, id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Garage address {} not found", id))
            })
    }

    /// Add an address. The first address becomes the default.
    #[instrument(skip(self, input))]
    pub async fn add(&self, input: CreateGarageAddress) -> Result<GarageAddress, AppError> {
        let input = input.trimmed();
        input.validate()?;

        let has_default = self.default_address().await?.is_some();
        let status = if has_default {
            AddressStatus::Secondary
        } else {
            AddressStatus::Default
        };
        let address = input.into_address(status);

        let mut batch = WriteBatch::new();
        batch.set(GARAGE_INFO, &address.id, to_document(&address)?);
        self.store.commit(batch).await?;

        info!(address_id = %address.id, default = address.is_default(), "Garage address added");
        Ok(address)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: &str,
        input: UpdateGarageAddress,
    ) -> Result<GarageAddress, AppError> {
        let mut address = self.get(id).await?;
        input.apply(&mut address);
        if address.garage_name.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Garage name cannot be empty"
            )));
        }

        let mut batch = WriteBatch::new();
        batch.set(GARAGE_INFO, id, to_document(&address)?);
        self.store.commit(batch).await?;
        Ok(address)
    }

    /// Make `id` the only default address. The old flag is cleared and the new
    /// one set in the same batch.
    #[instrument(skip(self))]
    pub async fn set_default(&self, id: &str) -> Result<GarageAddress, AppError> {
        let mut target = self.get(id).await?;

        let mut batch = WriteBatch::new();
        for address in self.list().await? {
            if address.id != id && address.is_default() {
                batch.update(GARAGE_INFO, &address.id, status_fields(AddressStatus::Secondary)?);
            }
        }
        batch.update(GARAGE_INFO, id, status_fields(AddressStatus::Default)?);
        self.store.commit(batch).await?;

        target.status = AddressStatus::Default;
        info!(address_id = %id, "Default garage address switched");
        Ok(target)
    }

    /// Delete an address. The default address can only go when it is the
    /// last one.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let address = self.get(id).await?;
        if address.is_default() && self.list().await?.len() > 1 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Choose another default address before deleting {}",
                address.garage_name
            )));
        }

        let mut batch = WriteBatch::new();
        batch.delete(GARAGE_INFO, id);
        self.store.commit(batch).await
    }
}

fn status_fields(status: AddressStatus) -> Result<Map<String, Value>, AppError> {
    let mut fields = Map::new();
    fields.insert("status".to_string(), serde_json::to_value(status)?);
    Ok(fields)
}
