//! Tests for fleetplane-changes: filtered agent change subscriptions over the store

use fleetplane_changes::*;
use fleetplane_core::*;
use fleetplane_store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

fn linux(id: &str) -> Agent {
    Agent::new(id, format!("web-{}", id)).with_label("os", "linux")
}

fn windows(id: &str) -> Agent {
    Agent::new(id, format!("win-{}", id)).with_label("os", "windows")
}

async fn next<R>(sub: &mut ChangesSubscription<R>) -> Changes<R> {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("timed out waiting for changes")
        .expect("subscription ended")
}

async fn assert_quiet<R: std::fmt::Debug>(sub: &mut ChangesSubscription<R>) {
    let result = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
    assert!(result.is_err(), "unexpected delivery: {:?}", result);
}

fn summary(batch: &Changes<Agent>) -> Vec<(String, EventType)> {
    batch
        .changes
        .iter()
        .map(|c| (c.item.id.clone(), c.event_type))
        .collect()
}

// ===========================================================================
// Unfiltered
// ===========================================================================

#[tokio::test]
async fn unfiltered_subscription_sees_every_commit() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new()).unwrap();

    store.upsert_agent(linux("a1"));
    let batch = next(&mut sub).await;
    assert_eq!(summary(&batch), vec![("a1".into(), EventType::Insert)]);
    assert_eq!(batch.query, None);
    assert_eq!(batch.suggestions, None);

    store.delete_agent("a1").unwrap();
    let batch = next(&mut sub).await;
    assert_eq!(summary(&batch), vec![("a1".into(), EventType::Remove)]);
}

// ===========================================================================
// Query filtering
// ===========================================================================

#[tokio::test]
async fn query_drops_non_matching_items() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(
        store.clone(),
        ChangesOptions::new().with_query("os:linux").with_suggestions(false),
    )
    .unwrap();

    store.upsert_agent(windows("w1"));
    store.upsert_agent(linux("l1"));

    let batch = next(&mut sub).await;
    assert_eq!(summary(&batch), vec![("l1".into(), EventType::Insert)]);
    assert_eq!(batch.query.as_deref(), Some("os:linux"));
}

#[tokio::test]
async fn item_leaving_the_query_is_evicted() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(
        store.clone(),
        ChangesOptions::new().with_query("os:linux"),
    )
    .unwrap();

    store.upsert_agent(linux("a1"));
    assert_eq!(
        summary(&next(&mut sub).await),
        vec![("a1".into(), EventType::Insert)]
    );

    store.upsert_agent(Agent::new("a1", "web-a1").with_label("os", "windows"));
    assert_eq!(
        summary(&next(&mut sub).await),
        vec![("a1".into(), EventType::Remove)]
    );

    store.delete_agent("a1").unwrap();
    assert_quiet(&mut sub).await;
}

#[tokio::test]
async fn item_entering_the_query_is_inserted() {
    let store = Arc::new(MemoryStore::new());
    store.upsert_agent(windows("a1"));
    let mut sub = subscribe_changes::<Agent, _>(
        store.clone(),
        ChangesOptions::new().with_query("os:linux"),
    )
    .unwrap();

    store.upsert_agent(Agent::new("a1", "win-a1").with_label("os", "linux"));
    assert_eq!(
        summary(&next(&mut sub).await),
        vec![("a1".into(), EventType::Insert)]
    );
}

#[tokio::test]
async fn selector_and_query_combine() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(
        store.clone(),
        ChangesOptions::new().with_selector("env=prod").with_query("web"),
    )
    .unwrap();

    store.upsert_agent(linux("a1"));
    store.upsert_agent(linux("a2").with_label("env", "prod"));
    store.upsert_agent(windows("a3").with_label("env", "prod"));

    assert_eq!(
        summary(&next(&mut sub).await),
        vec![("a2".into(), EventType::Insert)]
    );
}

#[test]
fn invalid_selector_is_rejected_up_front() {
    let store = Arc::new(MemoryStore::new());
    let err = subscribe_changes::<Agent, _>(store, ChangesOptions::new().with_selector("env")).unwrap_err();
    assert!(matches!(err, ChangesError::InvalidSelector { .. }));
}

// ===========================================================================
// Seed, batching, suggestions
// ===========================================================================

#[tokio::test]
async fn seed_delivers_current_matches_first() {
    let store = Arc::new(MemoryStore::new());
    store.upsert_agent(linux("a1"));
    store.upsert_agent(windows("a2"));
    store.upsert_agent(linux("a3"));

    let mut sub = subscribe_changes::<Agent, _>(
        store.clone(),
        ChangesOptions::new().with_query("os:linux").seeded(),
    )
    .unwrap();

    let seed = next(&mut sub).await;
    assert_eq!(
        summary(&seed),
        vec![
            ("a1".into(), EventType::Insert),
            ("a3".into(), EventType::Insert)
        ]
    );

    store.delete_agent("a3").unwrap();
    assert_eq!(
        summary(&next(&mut sub).await),
        vec![("a3".into(), EventType::Remove)]
    );
}

#[tokio::test]
async fn queued_events_are_batched() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(
        store.clone(),
        ChangesOptions::new().with_batch_size(3),
    )
    .unwrap();

    // The relay task cannot run until this test yields, so all five queue up.
    for i in 0..5 {
        store.upsert_agent(linux(&format!("a{}", i)));
    }

    let mut sizes = Vec::new();
    let mut total = 0;
    while total < 5 {
        let batch = next(&mut sub).await;
        assert!(batch.changes.len() <= 3);
        total += batch.changes.len();
        sizes.push(batch.changes.len());
    }
    assert_eq!(total, 5);
    assert_eq!(sizes.iter().max(), Some(&3));
}

#[tokio::test]
async fn batches_carry_suggestions_for_the_last_token() {
    let store = Arc::new(MemoryStore::new());
    store.upsert_agent(windows("a0"));
    let mut sub = subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new().with_query("os:")).unwrap();

    store.upsert_agent(linux("a1"));
    let batch = next(&mut sub).await;
    let labels: Vec<String> = batch
        .suggestions
        .unwrap()
        .into_iter()
        .map(|s| s.label)
        .collect();
    assert_eq!(labels, vec!["os:linux", "os:windows"]);
}

#[tokio::test]
async fn suggestions_survive_non_ascii_whitespace() {
    let store = Arc::new(MemoryStore::new());
    let mut nbsp = subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new().with_query("web\u{a0}n")).unwrap();
    let mut ideographic =
        subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new().with_query("web\u{3000}os:lin")).unwrap();

    store.upsert_agent(linux("a1"));

    let batch = next(&mut nbsp).await;
    assert_eq!(summary(&batch), vec![("a1".to_string(), EventType::Insert)]);
    let suggestions = batch.suggestions.unwrap();
    assert_eq!(suggestions[0].label, "name:");
    assert_eq!(suggestions[0].query, "web\u{a0}name:");

    let batch = next(&mut ideographic).await;
    let suggestions = batch.suggestions.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].query, "web\u{3000}os:linux");

    // both relays are still running
    store.upsert_agent(linux("a2"));
    assert_eq!(summary(&next(&mut nbsp).await)[0].0, "a2");
    assert_eq!(summary(&next(&mut ideographic).await)[0].0, "a2");
}

#[tokio::test]
async fn non_ascii_query_filters_by_label() {
    let store = Arc::new(MemoryStore::new());
    let mut sub =
        subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new().with_query("site:東")).unwrap();

    store.upsert_agent(linux("a1").with_label("site", "大阪"));
    store.upsert_agent(linux("a2").with_label("site", "東京"));

    let batch = next(&mut sub).await;
    assert_eq!(summary(&batch), vec![("a2".to_string(), EventType::Insert)]);
    assert_eq!(batch.suggestions.unwrap()[0].label, "site:東京");
}

#[tokio::test]
async fn changes_serialize_for_the_api() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new()).unwrap();
    store.upsert_agent(linux("a1"));

    let value = serde_json::to_value(next(&mut sub).await).unwrap();
    assert_eq!(value["changes"][0]["eventType"], "INSERT");
    assert_eq!(value["changes"][0]["item"]["labels"]["os"], "linux");
    assert!(value.get("suggestions").is_none());
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn closed_subscription_is_terminal() {
    let store = Arc::new(MemoryStore::new());
    let mut sub = subscribe_changes::<Agent, _>(store.clone(), ChangesOptions::new()).unwrap();
    assert_eq!(sub.state(), SubscriptionState::Active);

    store.upsert_agent(linux("a1"));
    sub.close();
    sub.close();
    assert_eq!(sub.state(), SubscriptionState::Closed);
    assert!(sub.recv().await.is_none());

    // the relay lets go of the raw topic
    for _ in 0..50 {
        if store.agents().bus().subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.agents().bus().subscriber_count(), 0);
}

#[tokio::test]
async fn source_changes_filter_by_type() {
    let store = MemoryStore::new();
    store
        .apply_resource_type(
            ResourceType::new(Kind::SourceType, "file")
                .with_parameter(ParameterDefinition::new("path", ParameterType::String)),
        )
        .unwrap();
    let store = Arc::new(store);
    let mut sub = subscribe_changes::<Source, _>(store.clone(), ChangesOptions::new().with_query("type:fi")).unwrap();

    store
        .apply_source(Source::new("logs", ParameterizedSpec::new("file")))
        .unwrap();
    let batch = next(&mut sub).await;
    assert_eq!(batch.changes[0].item.metadata.name, "logs");
}
