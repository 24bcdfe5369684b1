//! Test fixtures with sample data.
//!
//! This module provides a sample catalog entity and request records shaped
//! like the ones services send to each other.

use microservices_common::Entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog item used as a repository entity and as an HTTP payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleItem {
    /// Identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Free text description
    pub description: String,
    /// Unit price
    pub price: f64,
    /// Units in stock
    pub quantity: u32,
    /// Catalog category
    pub category: String,
}

impl Entity for SampleItem {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl SampleItem {
    /// Create an item with a fresh identifier.
    #[must_use]
    pub fn new(name: &str, category: &str, price: f64, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} from the {category} shelf"),
            price,
            quantity,
            category: category.to_string(),
        }
    }

    /// A cheap consumable.
    #[must_use]
    pub fn potion() -> Self {
        Self::new("Potion", "consumables", 5.0, 20)
    }

    /// A mid-priced consumable.
    #[must_use]
    pub fn antidote() -> Self {
        Self::new("Antidote", "consumables", 7.0, 8)
    }

    /// An expensive, scarce item.
    #[must_use]
    pub fn bronze_sword() -> Self {
        Self::new("Bronze sword", "weapons", 120.0, 1)
    }

    /// A small mixed catalog.
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        vec![Self::potion(), Self::antidote(), Self::bronze_sword()]
    }
}

/// Search request sent as a query string.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SampleSearch {
    /// Category to search in
    pub category: Option<String>,
    /// Name fragment, empty means any
    pub name: String,
    /// Upper price bound
    pub max_price: Option<f64>,
    /// Page number
    pub page: Option<u32>,
}

impl SampleSearch {
    /// Search a single category.
    #[must_use]
    pub fn in_category(category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            ..Self::default()
        }
    }
}

/// Purchase request sent as a JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplePurchase {
    /// Buyer
    pub user_id: Uuid,
    /// Item being bought
    pub item_id: Uuid,
    /// Units
    pub quantity: u32,
}
