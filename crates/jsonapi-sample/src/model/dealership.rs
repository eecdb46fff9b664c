//! Dealership models: a dealership stocks cars through [`InventoryItem`] rows.
//!
//! Cars are identified by their VIN, so their ids are client-chosen strings.

use jsonapi_core::{shared, Shared};

#[derive(Debug, Clone, Default)]
pub struct Dealership {
    pub id: i64,
    pub name: String,
    pub inventory_items: Vec<Shared<InventoryItem>>,
}

impl Dealership {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn stub(id: i64) -> Shared<Dealership> {
        shared(Dealership {
            id,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Car {
    pub id: String,
    pub model: String,
    pub inventory_items: Vec<Shared<InventoryItem>>,
}

impl Car {
    pub fn new(vin: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: vin.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn stub(vin: &str) -> Shared<Car> {
        shared(Car {
            id: vin.to_string(),
            ..Self::default()
        })
    }
}

/// One car on the lot of one dealership.
#[derive(Debug, Clone, Default)]
pub struct InventoryItem {
    pub id: i64,
    pub dealership: Option<Shared<Dealership>>,
    pub car: Option<Shared<Car>>,
}

identifiable!(i64 => Dealership, InventoryItem);
identifiable!(String => Car);
