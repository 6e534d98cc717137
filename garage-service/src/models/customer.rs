//! Customer and vehicle documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::trim_in_place;

pub const CUSTOMERS: &str = "customers";
pub const VEHICLES: &str = "vehicles";

/// Customer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Vehicle document, linked to its owner by `customer_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub customer_id: String,
    pub vehicle_number: String,
    pub make: String,
    pub model: String,
    pub kilometer: u64,
}

/// A customer together with every vehicle it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerWithVehicles {
    #[serde(flatten)]
    pub customer: Customer,
    pub vehicles: Vec<Vehicle>,
}

impl CustomerWithVehicles {
    /// Case-insensitive match on name, phone or any vehicle number.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.customer.name.to_lowercase().contains(&needle)
            || self.customer.phone.to_lowercase().contains(&needle)
            || self
                .vehicles
                .iter()
                .any(|v| v.vehicle_number.to_lowercase().contains(&needle))
    }
}

/// Input for creating a customer, optionally with its first vehicles.
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, message = "Customer name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "Phone number cannot be empty"))]
    pub phone: String,
    pub address: String,
    pub gst_number: Option<String>,
    #[validate(nested)]
    pub vehicles: Vec<CreateVehicle>,
}

impl CreateCustomer {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.name);
        trim_in_place(&mut self.phone);
        self.vehicles = self.vehicles.into_iter().map(CreateVehicle::trimmed).collect();
        self
    }

    pub fn into_customer(self) -> (Customer, Vec<CreateVehicle>) {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address,
            gst_number: self.gst_number.filter(|g| !g.trim().is_empty()),
            created_at: Utc::now(),
        };
        (customer, self.vehicles)
    }
}

/// Input for updating a customer.
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
}

impl UpdateCustomer {
    pub fn apply(self, customer: &mut Customer) {
        if let Some(name) = self.name {
            customer.name = name;
        }
        if let Some(phone) = self.phone {
            customer.phone = phone;
        }
        if let Some(address) = self.address {
            customer.address = address;
        }
        if let Some(gst) = self.gst_number {
            customer.gst_number = Some(gst).filter(|g| !g.trim().is_empty());
        }
    }
}

/// Input for registering a vehicle.
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateVehicle {
    #[validate(length(min = 1, message = "Vehicle number cannot be empty"))]
    pub vehicle_number: String,
    pub make: String,
    pub model: String,
    pub kilometer: u64,
}

impl CreateVehicle {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.vehicle_number);
        self
    }

    pub fn into_vehicle(self, customer_id: &str) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            vehicle_number: self.vehicle_number.trim().to_uppercase(),
            make: self.make,
            model: self.model,
            kilometer: self.kilometer,
        }
    }
}

/// Input for updating a vehicle.
#[derive(Debug, Clone, Default)]
pub struct UpdateVehicle {
    pub vehicle_number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub kilometer: Option<u64>,
}

impl UpdateVehicle {
    pub fn apply(self, vehicle: &mut Vehicle) {
        if let Some(number) = self.vehicle_number {
            vehicle.vehicle_number = number.trim().to_uppercase();
        }
        if let Some(make) = self.make {
            vehicle.make = make;
        }
        if let Some(model) = self.model {
            vehicle.model = model;
        }
        if let Some(km) = self.kilometer {
            vehicle.kilometer = km;
        }
    }
}
