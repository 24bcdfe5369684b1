//! Shared proptest generators.
//!
//! Strategies for entities, filters and HTTP outcomes used by the property
//! tests of the workspace.

use microservices_common::Filter;
use proptest::prelude::*;
use uuid::Uuid;

use crate::fixtures::SampleItem;

/// Category names used by generated items.
pub const CATEGORIES: [&str; 3] = ["consumables", "weapons", "armor"];

/// Generate random identifiers.
pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Generate a catalog category.
pub fn category_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(CATEGORIES.to_vec()).prop_map(str::to_string)
}

/// Generate a catalog item.
pub fn sample_item_strategy() -> impl Strategy<Value = SampleItem> {
    (
        uuid_strategy(),
        "[A-Z][a-z]{2,12}",
        category_strategy(),
        0u32..10_000,
        0u32..100,
    )
        .prop_map(|(id, name, category, cents, quantity)| SampleItem {
            id,
            description: format!("{name} ({category})"),
            name,
            price: f64::from(cents) / 100.0,
            quantity,
            category,
        })
}

/// Generate a catalog with distinct identifiers.
pub fn catalog_strategy(max_len: usize) -> impl Strategy<Value = Vec<SampleItem>> {
    prop::collection::vec(sample_item_strategy(), 0..=max_len).prop_map(|mut items| {
        let mut seen = std::collections::HashSet::new();
        items.retain(|item| seen.insert(item.id));
        items
    })
}

/// Generate a leaf filter over [`SampleItem`] fields.
pub fn item_leaf_filter_strategy() -> impl Strategy<Value = Filter> {
    prop_oneof![
        Just(Filter::all()),
        Just(Filter::none()),
        category_strategy().prop_map(|c| Filter::eq("category", c)),
        category_strategy().prop_map(|c| Filter::ne("category", c)),
        (0u32..100).prop_map(|q| Filter::gte("quantity", q)),
        (0u32..100).prop_map(|q| Filter::lt("quantity", q)),
        (0u32..10_000).prop_map(|cents| Filter::lte("price", f64::from(cents) / 100.0)),
        "[a-z]{1,2}".prop_map(|s| Filter::contains("name", s)),
        Just(Filter::exists("description")),
    ]
}

/// Generate a composite filter over [`SampleItem`] fields.
pub fn item_filter_strategy() -> impl Strategy<Value = Filter> {
    item_leaf_filter_strategy().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
            inner.prop_map(|f| !f),
        ]
    })
}

/// Generate HTTP status codes the client treats as transient.
pub fn transient_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![Just(408u16), 500u16..600]
}

/// Generate HTTP error status codes the client treats as terminal.
pub fn terminal_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![400u16..408, 409u16..500]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_item_fields_in_range() {
        let mut runner = TestRunner::default();
        for _ in 0..10 {
            let item = sample_item_strategy().new_tree(&mut runner).unwrap().current();
            assert!(CATEGORIES.contains(&item.category.as_str()));
            assert!(item.price < 100.0);
            assert!(item.quantity < 100);
        }
    }

    #[test]
    fn test_catalog_ids_distinct() {
        let mut runner = TestRunner::default();
        for _ in 0..10 {
            let items = catalog_strategy(8).new_tree(&mut runner).unwrap().current();
            let ids: std::collections::HashSet<_> = items.iter().map(|i| i.id).collect();
            assert_eq!(ids.len(), items.len());
        }
    }

    #[test]
    fn test_status_classes() {
        let mut runner = TestRunner::default();
        for _ in 0..10 {
            let transient = transient_status_strategy().new_tree(&mut runner).unwrap().current();
            assert!(transient == 408 || (500..600).contains(&transient));
            let terminal = terminal_status_strategy().new_tree(&mut runner).unwrap().current();
            assert!((400..500).contains(&terminal) && terminal != 408);
        }
    }
}
