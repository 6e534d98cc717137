mod common;

use common::TestGarage;
use garage_service::models::{
    CatalogFilter, CatalogKind, CreateServiceItem, CreateStockItem, UpdateStockItem, STOCKS,
};
use garage_service::services::{DocumentStore, WriteBatch};
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;

#[tokio::test]
async fn category_in_use_cannot_be_deleted() {
    let t = TestGarage::new();
    let brakes = t
        .garage
        .catalog
        .create_category(CatalogKind::Stock, "Brakes")
        .await
        .unwrap();
    let pads = t.stock("Brake pads", 700, 1000, 18, "Brakes").await;

    let err = t
        .garage
        .catalog
        .delete_category(CatalogKind::Stock, &brakes.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.garage.catalog.categories(CatalogKind::Stock).await.unwrap().len(), 1);

    t.garage.catalog.delete_stock(&pads.id).await.unwrap();
    t.garage
        .catalog
        .delete_category(CatalogKind::Stock, &brakes.id)
        .await
        .unwrap();
    assert!(t.garage.catalog.categories(CatalogKind::Stock).await.unwrap().is_empty());
}

#[tokio::test]
async fn stock_and_service_categories_are_independent() {
    let t = TestGarage::new();
    let stock_cat = t
        .garage
        .catalog
        .create_category(CatalogKind::Stock, "Engine")
        .await
        .unwrap();
    t.garage
        .catalog
        .create_category(CatalogKind::Service, "Engine")
        .await
        .unwrap();
    t.service("Engine tuning", 1500, 18, "Engine").await;

    // Only service items reference the name; the stock category is free.
    t.garage
        .catalog
        .delete_category(CatalogKind::Stock, &stock_cat.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_category_names_are_rejected() {
    let t = TestGarage::new();
    t.garage
        .catalog
        .create_category(CatalogKind::Service, "Body Work")
        .await
        .unwrap();

    let err = t
        .garage
        .catalog
        .create_category(CatalogKind::Service, "  body work ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = t
        .garage
        .catalog
        .create_category(CatalogKind::Service, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn selling_price_is_derived_then_may_drift() {
    let t = TestGarage::new();
    t.category(CatalogKind::Stock, "Transmission").await;
    let item = t
        .garage
        .catalog
        .create_stock(CreateStockItem {
            product_name: "Clutch plate".to_string(),
            purchase_price: Decimal::from(2000),
            profit_margin: Decimal::from(15),
            gst: Decimal::from(28),
            category: "Transmission".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(item.selling_price, Decimal::from(2300));

    let edited = t
        .garage
        .catalog
        .update_stock(
            &item.id,
            UpdateStockItem {
                selling_price: Some(Decimal::from(2450)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.selling_price, Decimal::from(2450));
    assert_eq!(edited.profit_margin, Decimal::from(15));
    assert_eq!(
        t.garage.catalog.get_stock(&item.id).await.unwrap().selling_price,
        Decimal::from(2450)
    );
}

#[tokio::test]
async fn listing_filters_the_cached_snapshot() {
    let t = TestGarage::new();
    t.stock("Oil filter", 150, 200, 18, "Filters").await;
    t.stock("Air filter", 250, 320, 18, "Filters").await;
    t.stock("Spark plug", 90, 120, 28, "Ignition").await;

    let filters = t
        .garage
        .catalog
        .list_stocks(
            &CatalogFilter {
                category: Some("filters".to_string()),
                search: None,
            },
            1,
            None,
        )
        .await
        .unwrap();
    assert_eq!(filters.total_count, 2);
    assert_eq!(filters.items[0].product_name, "Air filter");

    let reads = t.store.collection_reads().await;
    let search = t
        .garage
        .catalog
        .list_stocks(
            &CatalogFilter {
                category: None,
                search: Some("plug".to_string()),
            },
            1,
            None,
        )
        .await
        .unwrap();
    assert_eq!(search.total_count, 1);
    assert_eq!(t.store.collection_reads().await, reads);

    let ignition = t.garage.catalog.stocks_in_category("Ignition").await.unwrap();
    assert_eq!(ignition.len(), 1);
    assert_eq!(t.store.collection_len(STOCKS).await, 3);
}

#[tokio::test]
async fn missing_items_are_not_found() {
    let t = TestGarage::new();
    let err = t.garage.catalog.delete_service("nope").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = t.garage.catalog.get_stock("nope").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn category_guard_matches_names_case_insensitively() {
    let t = TestGarage::new();
    let filters = t
        .garage
        .catalog
        .create_category(CatalogKind::Stock, "Filters")
        .await
        .unwrap();

    let item = t
        .garage
        .catalog
        .create_stock(CreateStockItem {
            product_name: "Oil filter".to_string(),
            purchase_price: Decimal::from(150),
            gst: Decimal::from(18),
            category: "  filters ".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(item.category, "Filters");

    let err = t
        .garage
        .catalog
        .delete_category(CatalogKind::Stock, &filters.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.garage.catalog.categories(CatalogKind::Stock).await.unwrap().len(), 1);
}

#[tokio::test]
async fn guard_also_catches_stored_spelling_variants() {
    let t = TestGarage::new();
    let filters = t
        .garage
        .catalog
        .create_category(CatalogKind::Stock, "Filters")
        .await
        .unwrap();

    // Written directly, as older data may have been.
    let mut batch = WriteBatch::new();
    batch.set(
        STOCKS,
        "legacy-1",
        json!({ "id": "legacy-1", "productName": "Fuel filter", "category": "filters" }),
    );
    t.store.commit(batch).await.unwrap();

    let err = t
        .garage
        .catalog
        .delete_category(CatalogKind::Stock, &filters.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn items_need_a_registered_category() {
    let t = TestGarage::new();
    let err = t
        .garage
        .catalog
        .create_service(CreateServiceItem {
            service_name: "Wheel balancing".to_string(),
            labour: Decimal::from(400),
            gst: Decimal::from(18),
            category: "Tyres".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let pads = t.stock("Brake pads", 700, 1000, 18, "Brakes").await;
    let err = t
        .garage
        .catalog
        .update_stock(
            &pads.id,
            UpdateStockItem {
                category: Some("Suspension".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(t.garage.catalog.get_stock(&pads.id).await.unwrap().category, "Brakes");
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let t = TestGarage::new();
    t.category(CatalogKind::Stock, "Engine").await;

    let err = t
        .garage
        .catalog
        .create_stock(CreateStockItem {
            product_name: "   ".to_string(),
            category: "Engine".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(t.store.collection_len(STOCKS).await, 0);
}
