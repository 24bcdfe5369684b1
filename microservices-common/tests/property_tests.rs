//! Property-based tests for microservices-common.
//!
//! These tests verify properties of the query builder, filters, retry
//! schedule, circuit breaker and endpoint naming across generated inputs.

use std::collections::BTreeMap;
use std::time::Duration;

use microservices_common::filter::Filter;
use microservices_common::repository::{DocumentRepository, Entity, Repository};
use microservices_common::store::{Document, InMemoryDatabase};
use microservices_common::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, CommonError, RetryConfig, RetryPolicy, build_query,
    endpoint_name,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Stock {
    id: Uuid,
    sku: String,
    level: u32,
}

impl Entity for Stock {
    fn id(&self) -> Uuid {
        self.id
    }
}

fn stock_strategy() -> impl Strategy<Value = Stock> {
    (any::<u128>(), "[a-d]{1,3}", 0u32..50).prop_map(|(id, sku, level)| Stock {
        id: Uuid::from_u128(id),
        sku,
        level,
    })
}

fn leaf_filter() -> impl Strategy<Value = Filter> {
    prop_oneof![
        Just(Filter::all()),
        Just(Filter::none()),
        "[a-d]{1,3}".prop_map(|s| Filter::eq("sku", s)),
        "[a-d]{1}".prop_map(|s| Filter::contains("sku", s)),
        (0u32..50).prop_map(|l| Filter::gt("level", l)),
        (0u32..50).prop_map(|l| Filter::lte("level", l)),
    ]
}

fn filter_strategy() -> impl Strategy<Value = Filter> {
    leaf_filter().prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
            inner.prop_map(|f| !f),
        ]
    })
}

fn as_document(stock: &Stock) -> Document {
    match serde_json::to_value(stock) {
        Ok(Value::Object(map)) => map,
        other => panic!("unexpected stock encoding: {other:?}"),
    }
}

// Query strings contain exactly the non-empty fields, each decoded back to
// its original value.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_query_keeps_only_non_empty_fields(
        fields in prop::collection::btree_map("[a-z]{1,8}", prop::option::of("[ -~]{0,12}"), 0..8)
    ) {
        let query = build_query(&fields).unwrap();

        let expected: BTreeMap<String, String> = fields
            .iter()
            .filter_map(|(k, v)| v.as_ref().filter(|s| !s.is_empty()).map(|s| (k.clone(), s.clone())))
            .collect();
        let decoded: BTreeMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        prop_assert_eq!(&decoded, &expected);
        prop_assert_eq!(query.is_empty(), expected.is_empty());
    }

    #[test]
    fn prop_query_rejects_nested_values(name in "[a-z]{1,8}", inner in "[a-z]{1,8}") {
        let request = json!({ name: { inner: 1 } });
        prop_assert!(matches!(build_query(&request), Err(CommonError::InvalidArgument(_))));
    }
}

// Negation inverts every filter and double negation is the identity.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_filter_negation(stock in stock_strategy(), filter in filter_strategy()) {
        let doc = as_document(&stock);
        let negated = !filter.clone();
        prop_assert_eq!(negated.matches(&doc), !filter.matches(&doc));
        prop_assert_eq!(!negated, filter);
    }

    #[test]
    fn prop_filter_and_or_semantics(
        stock in stock_strategy(),
        a in filter_strategy(),
        b in filter_strategy(),
    ) {
        let doc = as_document(&stock);
        prop_assert_eq!(a.clone().and(b.clone()).matches(&doc), a.matches(&doc) && b.matches(&doc));
        prop_assert_eq!(a.clone().or(b.clone()).matches(&doc), a.matches(&doc) || b.matches(&doc));
    }

    #[test]
    fn prop_filter_serde_preserves_meaning(stock in stock_strategy(), filter in filter_strategy()) {
        let doc = as_document(&stock);
        let restored: Filter = serde_json::from_value(serde_json::to_value(&filter).unwrap()).unwrap();
        prop_assert_eq!(restored.matches(&doc), filter.matches(&doc));
    }
}

// The repository returns exactly the matching subset, in insertion order.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_get_all_matching_is_exact_subset(
        stocks in prop::collection::vec(stock_strategy(), 0..12),
        filter in filter_strategy(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let database = InMemoryDatabase::new("warehouse");
            let repo: DocumentRepository<Stock> = DocumentRepository::new(&database, "stock");

            let mut stored = Vec::new();
            for stock in stocks {
                if repo.insert(&stock).await.is_ok() {
                    stored.push(stock);
                }
            }

            let expected: Vec<Stock> = stored
                .iter()
                .filter(|s| filter.matches(&as_document(s)))
                .cloned()
                .collect();
            let actual = repo.get_all_matching(&filter).await.unwrap();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(repo.get_all().await.unwrap(), stored);
            Ok(())
        })?;
    }
}

// Retry delays stay within [2^n, 2^n + jitter) seconds.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_retry_delay_bounds(retry in 1u32..=5) {
        let policy = RetryPolicy::with_defaults();
        let floor = Duration::from_secs(1 << retry);
        let delay = policy.delay_for_retry(retry);

        prop_assert!(delay >= floor, "delay {:?} below {:?}", delay, floor);
        prop_assert!(delay < floor + Duration::from_secs(1), "delay {:?} above bound", delay);
    }

    #[test]
    fn prop_retry_budget_respected(max_retries in 0u32..8, done in 0u32..10) {
        let policy = RetryPolicy::new(RetryConfig::default().with_max_retries(max_retries));
        let transient = CommonError::request_failed(Some(503), "unavailable");
        let terminal = CommonError::request_failed(Some(404), "not found");

        prop_assert_eq!(policy.should_retry(&transient, done), done < max_retries);
        prop_assert!(!policy.should_retry(&terminal, done));
    }
}

// The breaker opens exactly at the threshold and any success in between
// resets the count.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_breaker_opens_at_threshold(threshold in 1u32..10, outcomes in prop::collection::vec(any::<bool>(), 0..30)) {
        let cb = CircuitBreaker::new(
            "inventory",
            CircuitBreakerConfig::default().with_failure_threshold(threshold),
        );

        let mut streak = 0;
        for success in outcomes {
            let Ok(permit) = cb.try_acquire() else {
                prop_assert!(streak >= threshold);
                break;
            };
            if success {
                permit.record_success();
                streak = 0;
            } else {
                permit.record_failure();
                streak += 1;
            }
            let expected = if streak >= threshold { CircuitState::Open } else { CircuitState::Closed };
            prop_assert_eq!(cb.state(), expected);
        }
    }
}

// Endpoint names are lowercase kebab-case.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_endpoint_name_is_kebab_case(words in prop::collection::vec("[A-Z][a-z]{1,6}", 1..4)) {
        let type_name = format!("{}Consumer", words.concat());
        let expected = words.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("-");
        prop_assert_eq!(endpoint_name(&type_name), expected);
    }
}
