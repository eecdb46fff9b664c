use jsonapi_core::mock::Operation;
use jsonapi_core::{JsonApiError, RequestContext, SecondaryResult};
use jsonapi_sample::lifecycle::{ids, BlogSystem};

async fn seeded() -> BlogSystem {
    let system = BlogSystem::new().expect("system");
    system.seed_demo_data().await.expect("seed");
    system
}

async fn inventory(system: &BlogSystem) -> Vec<String> {
    system
        .dealerships()
        .expect("service")
        .get_relationship(&1, "inventory", &mut RequestContext::new())
        .await
        .expect("inventory")
        .ids()
}

#[tokio::test]
async fn test_adding_a_car_writes_once_without_join_conflicts() {
    let system = seeded().await;
    let dealerships = system.dealerships().expect("service");
    assert_eq!(inventory(&system).await, vec!["carX", "carY"]);
    system.repository.clear_calls();

    dealerships
        .add_to_to_many(&1, "inventory", ids(["carZ"]), &mut RequestContext::new())
        .await
        .expect("add");

    assert_eq!(system.repository.count_of(Operation::AddToToMany), 1);
    assert_eq!(system.repository.write_calls(), 1);
    assert_eq!(inventory(&system).await, vec!["carX", "carY", "carZ"]);
}

#[tokio::test]
async fn test_adding_stocked_cars_only_adds_the_new_ones() {
    let system = seeded().await;
    let dealerships = system.dealerships().expect("service");

    dealerships
        .add_to_to_many(&1, "inventory", ids(["carX", "carZ"]), &mut RequestContext::new())
        .await
        .expect("add");

    assert_eq!(system.repository.write_calls(), 1);
    assert_eq!(inventory(&system).await, vec!["carX", "carY", "carZ"]);

    // The inverse side sees the new stock too.
    let cars = system.cars().expect("service");
    let stocked_at = cars
        .get_relationship(&"carZ".to_string(), "dealerships", &mut RequestContext::new())
        .await
        .expect("dealerships")
        .ids();
    assert_eq!(stocked_at, vec!["1"]);
}

#[tokio::test]
async fn test_adding_an_unknown_car_names_it() {
    let system = seeded().await;
    let dealerships = system.dealerships().expect("service");

    let error = dealerships
        .add_to_to_many(&1, "inventory", ids(["carQ"]), &mut RequestContext::new())
        .await
        .unwrap_err();

    match &error {
        JsonApiError::ResourcesInRelationshipsNotFound(missing) => {
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].id, "carQ");
            assert_eq!(missing[0].relationship, "inventory");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(inventory(&system).await, vec!["carX", "carY"]);
}

#[tokio::test]
async fn test_removing_a_car_and_listing_the_lot() {
    let system = seeded().await;
    let dealerships = system.dealerships().expect("service");

    dealerships
        .remove_from_to_many(&1, "inventory", ids(["carX"]), &mut RequestContext::new())
        .await
        .expect("remove");
    assert_eq!(inventory(&system).await, vec!["carY"]);

    let mut request = RequestContext::new().with_query(&[("filter[model]", "like:o")]);
    let lot = dealerships
        .get_secondary(&1, "inventory", &mut request)
        .await
        .expect("lot");
    match lot {
        SecondaryResult::ToMany(cars) => assert_eq!(cars.len(), 1),
        SecondaryResult::ToOne(_) => panic!("inventory is to-many"),
    }

    let cars = system.cars().expect("service");
    let mut request = RequestContext::new();
    let all = cars.get_all(&mut request).await.expect("cars");
    let models: Vec<String> = all.iter().map(|c| c.read().model.clone()).collect();
    assert_eq!(models, vec!["Civic", "Corolla", "Golf"]);
}
