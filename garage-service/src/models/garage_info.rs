//! Garage profile addresses printed on invoices and job cards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::trim_in_place;

pub const GARAGE_INFO: &str = "garageInfo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressStatus {
    Default,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarageAddress {
    pub id: String,
    pub garage_name: String,
    pub address: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
    pub status: AddressStatus,
}

impl GarageAddress {
    pub fn is_default(&self) -> bool {
        self.status == AddressStatus::Default
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct CreateGarageAddress {
    #[validate(length(min = 1, message = "Garage name cannot be empty"))]
    pub garage_name: String,
    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: String,
    pub phone: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub gst_number: Option<String>,
}

impl CreateGarageAddress {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.garage_name);
        trim_in_place(&mut self.address);
        self
    }

    pub fn into_address(self, status: AddressStatus) -> GarageAddress {
        GarageAddress {
            id: Uuid::new_v4().to_string(),
            garage_name: self.garage_name,
            address: self.address,
            phone: self.phone,
            email: self.email,
            gst_number: self.gst_number,
            status,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateGarageAddress {
    pub garage_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gst_number: Option<String>,
}

impl UpdateGarageAddress {
    pub fn apply(self, address: &mut GarageAddress) {
        if let Some(v) = self.garage_name {
            address.garage_name = v;
        }
        if let Some(v) = self.address {
            address.address = v;
        }
        if let Some(v) = self.phone {
            address.phone = v;
        }
        if let Some(v) = self.email {
            address.email = Some(v);
        }
        if let Some(v) = self.gst_number {
            address.gst_number = Some(v);
        }
    }
}
