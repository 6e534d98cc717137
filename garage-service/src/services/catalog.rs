//! Stock and service catalogs with their category lists.

use serde::de::DeserializeOwned;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::models::{
    CatalogFilter, CatalogKind, Category, CreateServiceItem, CreateStockItem, ServiceItem,
    StockItem, UpdateServiceItem, UpdateStockItem,
};
use crate::services::cache::{paginate, Page, PageLimits, SnapshotCache};
use crate::services::store::{
    get_as, list_as, query_as, to_document, DocumentStore, Query, WriteBatch,
};

const ALL_ITEMS: &str = "all";

pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    stocks: SnapshotCache<StockItem>,
    services: SnapshotCache<ServiceItem>,
    limits: PageLimits,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, limits: PageLimits) -> Self {
        Self {
            store,
            stocks: SnapshotCache::new("stocks"),
            services: SnapshotCache::new("services"),
            limits,
        }
    }

    // -------------------------------------------------------------------------
    // Stock items
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_stock(&self, input: CreateStockItem) -> Result<StockItem, AppError> {
        let mut input = input.trimmed();
        input.validate()?;
        input.category = self.resolve_category(CatalogKind::Stock, &input.category).await?;
        let item = input.into_item();
        self.put(CatalogKind::Stock, &item.id, &item).await?;
        self.stocks.invalidate();
        info!(stock_id = %item.id, category = %item.category, "Stock item created");
        Ok(item)
    }

    pub async fn get_stock(&self, id: &str) -> Result<StockItem, AppError> {
        self.find(CatalogKind::Stock, id).await
    }

    /// Apply an edit. A directly edited selling price is kept even if it no
    /// longer matches purchase price and margin.
    #[instrument(skip(self, input))]
    pub async fn update_stock(&self, id: &str, mut input: UpdateStockItem) -> Result<StockItem, AppError> {
        let mut item: StockItem = self.find(CatalogKind::Stock, id).await?;
        if let Some(category) = &input.category {
            input.category = Some(self.resolve_category(CatalogKind::Stock, category).await?);
        }
        input.apply(&mut item);
        self.put(CatalogKind::Stock, id, &item).await?;
        self.stocks.invalidate();
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_stock(&self, id: &str) -> Result<(), AppError> {
        self.remove(CatalogKind::Stock, id).await?;
        self.stocks.invalidate();
        Ok(())
    }

    pub async fn list_stocks(
        &self,
        filter: &CatalogFilter,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<StockItem>, AppError> {
        let snapshot = self
            .stocks
            .get_or_fetch(ALL_ITEMS, || {
                self.fetch_sorted(CatalogKind::Stock, |i: &StockItem| i.product_name.to_lowercase())
            })
            .await?;
        let matching: Vec<_> = snapshot
            .iter()
            .filter(|item| filter.accepts_stock(item))
            .cloned()
            .collect();
        Ok(paginate(&matching, page, self.limits.resolve(page_size)))
    }

    // -------------------------------------------------------------------------
    // Service items
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_service(&self, input: CreateServiceItem) -> Result<ServiceItem, AppError> {
        let mut input = input.trimmed();
        input.validate()?;
        input.category = self.resolve_category(CatalogKind::Service, &input.category).await?;
        let item = input.into_item();
        self.put(CatalogKind::Service, &item.id, &item).await?;
        self.services.invalidate();
        info!(service_id = %item.id, category = %item.category, "Service item created");
        Ok(item)
    }

    pub async fn get_service(&self, id: &str) -> Result<ServiceItem, AppError> {
        self.find(CatalogKind::Service, id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_service(
        &self,
        id: &str,
        mut input: UpdateServiceItem,
    ) -> Result<ServiceItem, AppError> {
        let mut item: ServiceItem = self.find(CatalogKind::Service, id).await?;
        if let Some(category) = &input.category {
            input.category = Some(self.resolve_category(CatalogKind::Service, category).await?);
        }
        input.apply(&mut item);
        self.put(CatalogKind::Service, id, &item).await?;
        self.services.invalidate();
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_service(&self, id: &str) -> Result<(), AppError> {
        self.remove(CatalogKind::Service, id).await?;
        self.services.invalidate();
        Ok(())
    }

    pub async fn list_services(
        &self,
        filter: &CatalogFilter,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<ServiceItem>, AppError> {
        let snapshot = self
            .services
            .get_or_fetch(ALL_ITEMS, || {
                self.fetch_sorted(CatalogKind::Service, |i: &ServiceItem| {
                    i.service_name.to_lowercase()
                })
            })
            .await?;
        let matching: Vec<_> = snapshot
            .iter()
            .filter(|item| filter.accepts_service(item))
            .cloned()
            .collect();
        Ok(paginate(&matching, page, self.limits.resolve(page_size)))
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn create_category(&self, kind: CatalogKind, name: &str) -> Result<Category, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Category name cannot be empty"
            )));
        }

        let existing = self.categories(kind).await?;
        if existing.iter().any(|c| c.name.eq_ignore_ascii_case(name.trim())) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "{} category {} already exists",
                kind.as_str(),
                name.trim()
            )));
        }

        let category = Category::new(name);
        let mut batch = WriteBatch::new();
        batch.set(kind.category_collection(), &category.id, to_document(&category)?);
        self.store.commit(batch).await?;

        info!(kind = kind.as_str(), category = %category.name, "Category created");
        Ok(category)
    }

    pub async fn categories(&self, kind: CatalogKind) -> Result<Vec<Category>, AppError> {
        let mut categories: Vec<Category> =
            list_as(self.store.as_ref(), kind.category_collection()).await?;
        categories.sort_by_key(|c| c.name.to_lowercase());
        Ok(categories)
    }

    /// Delete a category unless an item of the same catalog still uses it.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, kind: CatalogKind, id: &str) -> Result<(), AppError> {
        let category: Category = get_as(self.store.as_ref(), kind.category_collection(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Category {} not found", id)))?;

        let in_use = self
            .store
            .list(kind.items_collection())
            .await?
            .iter()
            .filter(|item| {
                item.data
                    .get("category")
                    .and_then(|c| c.as_str())
                    .is_some_and(|c| c.trim().eq_ignore_ascii_case(&category.name))
            })
            .count();
        if in_use > 0 {
            warn!(kind = kind.as_str(), category = %category.name, in_use, "Category still referenced");
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Category {} is used by {} {} item(s)",
                category.name,
                in_use,
                kind.as_str()
            )));
        }

        let mut batch = WriteBatch::new();
        batch.delete(kind.category_collection(), id);
        self.store.commit(batch).await?;
        info!(kind = kind.as_str(), category = %category.name, "Category deleted");
        Ok(())
    }

    /// Drop the cached snapshot of one catalog after an out-of-band write.
    pub fn invalidate(&self, kind: CatalogKind) {
        match kind {
            CatalogKind::Stock => self.stocks.invalidate(),
            CatalogKind::Service => self.services.invalidate(),
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Map a category as typed onto the registered name it refers to.
    async fn resolve_category(&self, kind: CatalogKind, name: &str) -> Result<String, AppError> {
        let wanted = name.trim();
        self.categories(kind)
            .await?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted))
            .map(|c| c.name)
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Unknown {} category {}",
                    kind.as_str(),
                    wanted
                ))
            })
    }

    async fn find<T: DeserializeOwned>(&self, kind: CatalogKind, id: &str) -> Result<T, AppError> {
        get_as(self.store.as_ref(), kind.items_collection(), id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("{} item {} not found", kind.as_str(), id))
            })
    }

    async fn put<T: Serialize>(&self, kind: CatalogKind, id: &str, item: &T) -> Result<(), AppError> {
        let mut batch = WriteBatch::new();
        batch.set(kind.items_collection(), id, to_document(item)?);
        self.store.commit(batch).await
    }

    async fn remove(&self, kind: CatalogKind, id: &str) -> Result<(), AppError> {
        if self.store.get(kind.items_collection(), id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "{} item {} not found",
                kind.as_str(),
                id
            )));
        }
        let mut batch = WriteBatch::new();
        batch.delete(kind.items_collection(), id);
        self.store.commit(batch).await
    }

    async fn fetch_sorted<T, K, F>(&self, kind: CatalogKind, key: F) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned,
        K: Ord,
        F: Fn(&T) -> K,
    {
        let mut items: Vec<T> = list_as(self.store.as_ref(), kind.items_collection()).await?;
        items.sort_by_key(key);
        Ok(items)
    }

    /// Items of one category, server-side.
    pub async fn stocks_in_category(&self, category: &str) -> Result<Vec<StockItem>, AppError> {
        query_as(
            self.store.as_ref(),
            CatalogKind::Stock.items_collection(),
            &Query::new().eq("category", category),
        )
        .await
    }
}
