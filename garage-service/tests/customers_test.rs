mod common;

use common::TestGarage;
use garage_service::models::{
    CreateCustomer, CreateVehicle, UpdateCustomer, CUSTOMERS, VEHICLES,
};
use service_core::error::AppError;

#[tokio::test]
async fn new_customer_appears_exactly_once_on_next_page_read() {
    let t = TestGarage::new();
    t.customer("Bhavna", &["KA02CD0001"]).await;

    let first = t.garage.customers.list(1, None, None).await.unwrap();
    assert_eq!(first.total_count, 1);

    // Served from the snapshot cache.
    let reads = t.store.collection_reads().await;
    t.garage.customers.list(1, None, None).await.unwrap();
    assert_eq!(t.store.collection_reads().await, reads);

    let added = t.customer("Arjun", &[]).await;
    let page = t.garage.customers.list(1, None, None).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(
        page.items
            .iter()
            .filter(|c| c.customer.id == added.customer.id)
            .count(),
        1
    );
    // Sorted by name, case-insensitive.
    assert_eq!(page.items[0].customer.name, "Arjun");
}

#[tokio::test]
async fn pages_slice_the_snapshot() {
    let t = TestGarage::new();
    for name in ["A", "B", "C", "D", "E"] {
        t.customer(name, &[]).await;
    }

    let second = t.garage.customers.list(2, Some(2), None).await.unwrap();
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.items[0].customer.name, "C");
    assert_eq!(second.total_count, 5);
    assert!(second.has_more);

    let last = t.garage.customers.list(3, Some(2), None).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(!last.has_more);
}

#[tokio::test]
async fn search_matches_vehicle_numbers() {
    let t = TestGarage::new();
    t.customer("Meera", &["MH12XY9999"]).await;
    t.customer("Kiran", &["KA05ZZ0005"]).await;

    let page = t
        .garage
        .customers
        .list(1, None, Some("xy99"))
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].customer.name, "Meera");
}

#[tokio::test]
async fn deleting_customer_removes_its_vehicles() {
    let t = TestGarage::new();
    let owner = t.customer("Farhan", &["DL01AA0001", "DL01AA0002"]).await;
    let other = t.customer("Geeta", &["DL02BB0001"]).await;
    assert_eq!(t.store.collection_len(VEHICLES).await, 3);

    t.garage.customers.delete(&owner.customer.id).await.unwrap();

    assert_eq!(t.store.collection_len(CUSTOMERS).await, 1);
    assert_eq!(t.store.collection_len(VEHICLES).await, 1);
    assert!(t
        .garage
        .customers
        .vehicles_of(&owner.customer.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        t.garage
            .customers
            .get(&other.customer.id)
            .await
            .unwrap()
            .vehicles
            .len(),
        1
    );
}

#[tokio::test]
async fn vehicle_numbers_are_normalised() {
    let t = TestGarage::new();
    let owner = t.customer("Hari", &[]).await;

    let vehicle = t
        .garage
        .customers
        .add_vehicle(
            &owner.customer.id,
            CreateVehicle {
                vehicle_number: " ka03 mm 1111 ".to_string(),
                make: "Hyundai".to_string(),
                model: "i20".to_string(),
                kilometer: 1_200,
            },
        )
        .await
        .unwrap();
    assert_eq!(vehicle.vehicle_number, "KA03 MM 1111");
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_write() {
    let t = TestGarage::new();
    let owner = t.customer("Isha", &[]).await;

    let err = t
        .garage
        .customers
        .update(
            &owner.customer.id,
            UpdateCustomer {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = t
        .garage
        .customers
        .add_vehicle("missing", CreateVehicle {
            vehicle_number: "KA01".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(t.store.collection_len(VEHICLES).await, 0);
}

#[tokio::test]
async fn whitespace_only_names_are_rejected() {
    let t = TestGarage::new();

    let err = t
        .garage
        .customers
        .create(CreateCustomer {
            name: "   ".to_string(),
            phone: "9800000000".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = t
        .garage
        .customers
        .create(CreateCustomer {
            name: "Jaya".to_string(),
            phone: "9800000000".to_string(),
            vehicles: vec![CreateVehicle {
                vehicle_number: " \t ".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(t.store.collection_len(CUSTOMERS).await, 0);
}
