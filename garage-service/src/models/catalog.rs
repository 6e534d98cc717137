//! Stock and service catalog documents and their category catalogs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::trim_in_place;

pub const STOCKS: &str = "stocks";
pub const SERVICES: &str = "services";

/// The two independent item catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Stock,
    Service,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Stock => "stock",
            CatalogKind::Service => "service",
        }
    }

    /// Flat item collection.
    pub fn items_collection(&self) -> &'static str {
        match self {
            CatalogKind::Stock => STOCKS,
            CatalogKind::Service => SERVICES,
        }
    }

    pub fn category_collection(&self) -> &'static str {
        match self {
            CatalogKind::Stock => "stocksCategory",
            CatalogKind::Service => "servicesCategory",
        }
    }

    /// Superseded `{items}/{category}/{letter}` sharded path.
    pub fn legacy_collection(&self, category: &str, letter: char) -> String {
        format!("{}/{}/{}", self.items_collection(), category, letter)
    }
}

/// Category document, one catalog per `CatalogKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
        }
    }
}

/// Stock item (spare part) document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: String,
    pub product_name: String,
    pub part_number: String,
    pub hsn_code: String,
    pub purchase_price: Decimal,
    pub profit_margin: Decimal,
    /// Stored independently; may drift from `purchase_price` and `profit_margin` after edits.
    pub selling_price: Decimal,
    pub gst: Decimal,
    pub category: String,
}

/// `purchase_price * (1 + margin / 100)`.
pub fn selling_price_for(purchase_price: Decimal, profit_margin: Decimal) -> Decimal {
    purchase_price * (Decimal::ONE + profit_margin / Decimal::ONE_HUNDRED)
}

/// Input for creating a stock item.
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateStockItem {
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub product_name: String,
    pub part_number: String,
    pub hsn_code: String,
    pub purchase_price: Decimal,
    pub profit_margin: Decimal,
    /// Derived from purchase price and margin when absent.
    pub selling_price: Option<Decimal>,
    pub gst: Decimal,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: String,
}

impl CreateStockItem {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.product_name);
        trim_in_place(&mut self.category);
        self
    }

    pub fn into_item(self) -> StockItem {
        let selling_price = self
            .selling_price
            .unwrap_or_else(|| selling_price_for(self.purchase_price, self.profit_margin));
        StockItem {
            id: Uuid::new_v4().to_string(),
            product_name: self.product_name.trim().to_string(),
            part_number: self.part_number,
            hsn_code: self.hsn_code,
            purchase_price: self.purchase_price,
            profit_margin: self.profit_margin,
            selling_price,
            gst: self.gst,
            category: self.category,
        }
    }
}

/// Input for updating a stock item. Price fields are written as given.
#[derive(Debug, Clone, Default)]
pub struct UpdateStockItem {
    pub product_name: Option<String>,
    pub part_number: Option<String>,
    pub hsn_code: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub gst: Option<Decimal>,
    pub category: Option<String>,
}

impl UpdateStockItem {
    pub fn apply(self, item: &mut StockItem) {
        if let Some(v) = self.product_name {
            item.product_name = v;
        }
        if let Some(v) = self.part_number {
            item.part_number = v;
        }
        if let Some(v) = self.hsn_code {
            item.hsn_code = v;
        }
        if let Some(v) = self.purchase_price {
            item.purchase_price = v;
        }
        if let Some(v) = self.profit_margin {
            item.profit_margin = v;
        }
        if let Some(v) = self.selling_price {
            item.selling_price = v;
        }
        if let Some(v) = self.gst {
            item.gst = v;
        }
        if let Some(v) = self.category {
            item.category = v;
        }
    }
}

/// Service (labour) item document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItem {
    pub id: String,
    pub service_name: String,
    pub hsn_code: String,
    pub gst: Decimal,
    /// Billable rate.
    pub labour: Decimal,
    pub category: String,
}

/// Input for creating a service item.
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateServiceItem {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,
    pub hsn_code: String,
    pub gst: Decimal,
    pub labour: Decimal,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: String,
}

impl CreateServiceItem {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.service_name);
        trim_in_place(&mut self.category);
        self
    }

    pub fn into_item(self) -> ServiceItem {
        ServiceItem {
            id: Uuid::new_v4().to_string(),
            service_name: self.service_name.trim().to_string(),
            hsn_code: self.hsn_code,
            gst: self.gst,
            labour: self.labour,
            category: self.category,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateServiceItem {
    pub service_name: Option<String>,
    pub hsn_code: Option<String>,
    pub gst: Option<Decimal>,
    pub labour: Option<Decimal>,
    pub category: Option<String>,
}

impl UpdateServiceItem {
    pub fn apply(self, item: &mut ServiceItem) {
        if let Some(v) = self.service_name {
            item.service_name = v;
        }
        if let Some(v) = self.hsn_code {
            item.hsn_code = v;
        }
        if let Some(v) = self.gst {
            item.gst = v;
        }
        if let Some(v) = self.labour {
            item.labour = v;
        }
        if let Some(v) = self.category {
            item.category = v;
        }
    }
}

/// In-memory filter applied to a cached catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl CatalogFilter {
    fn accepts(&self, category: &str, texts: &[&str]) -> bool {
        if let Some(wanted) = &self.category {
            if !wanted.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        match self.search.as_deref().map(|s| s.trim().to_lowercase()) {
            Some(needle) if !needle.is_empty() => {
                texts.iter().any(|t| t.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }

    pub fn accepts_stock(&self, item: &StockItem) -> bool {
        self.accepts(
            &item.category,
            &[&item.product_name, &item.part_number, &item.hsn_code],
        )
    }

    pub fn accepts_service(&self, item: &ServiceItem) -> bool {
        self.accepts(&item.category, &[&item.service_name, &item.hsn_code])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selling_price_applies_margin() {
        let price = selling_price_for(Decimal::new(1000, 0), Decimal::new(25, 0));
        assert_eq!(price, Decimal::new(1250, 0));
    }

    #[test]
    fn explicit_selling_price_is_kept() {
        let item = CreateStockItem {
            product_name: "Oil filter".to_string(),
            purchase_price: Decimal::new(200, 0),
            profit_margin: Decimal::new(10, 0),
            selling_price: Some(Decimal::new(260, 0)),
            category: "Filters".to_string(),
            ..Default::default()
        }
        .into_item();
        assert_eq!(item.selling_price, Decimal::new(260, 0));
    }

    #[test]
    fn legacy_paths_nest_category_and_letter() {
        assert_eq!(
            CatalogKind::Stock.legacy_collection("Engine", 'O'),
            "stocks/Engine/O"
        );
        assert_eq!(CatalogKind::Service.category_collection(), "servicesCategory");
    }
}
