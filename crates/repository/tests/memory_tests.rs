//! Integration tests for the in-memory store.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{ids, patient};
use helios_repository::core::{OperationRegistry, ResourceMatcher};
use helios_repository::memory::SequenceGenerator;
use helios_repository::types::{
    Bundle, BundleEntry, BundleType, OperationResult, OperationTarget, Parameters, Resource,
    SearchQuery,
};
use helios_repository::{InMemoryStore, Repository, RepositoryError};

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let store = InMemoryStore::new();

    let created = store
        .create(Resource::new("Patient", json!({"name": [{"family": "Smith"}]})))
        .await
        .unwrap();
    assert!(created.created);
    let id = created.id.id().to_string();

    let read = store.read("Patient", &id).await.unwrap();
    assert_eq!(read.id_part(), Some(id.as_str()));
    assert_eq!(read.content()["id"], id.as_str());

    let updated = store
        .update(read.clone().with_id(id.clone()))
        .await
        .unwrap();
    assert!(!updated.created);
    assert_eq!(updated.id, created.id);

    store.delete("Patient", &id).await.unwrap();
    assert!(store.read("Patient", &id).await.unwrap_err().is_not_found());
    assert!(store.delete("Patient", &id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_creates_when_absent() {
    let store = InMemoryStore::new();
    let outcome = store.update(patient("p1", "Smith")).await.unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.id.url(), "Patient/p1");
}

#[tokio::test]
async fn test_versioned_read_is_versionless() {
    let store = InMemoryStore::from_resources(vec![patient("abc", "Smith")]);

    let plain = store.read("Patient", "abc").await.unwrap();
    let versioned = store.read("Patient", "abc/_history/2").await.unwrap();
    assert_eq!(plain, versioned);
}

#[tokio::test]
async fn test_ids_are_scoped_per_type() {
    let store = InMemoryStore::new();
    store.update(patient("same", "Smith")).await.unwrap();
    store
        .create(Resource::new("Observation", json!({"id": "same"})))
        .await
        .unwrap();
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_sequence_generator_ids() {
    let store = InMemoryStore::new().with_id_generator(Arc::new(SequenceGenerator::starting_at(1)));
    let first = store.create(Resource::new("Patient", json!({}))).await.unwrap();
    let second = store.create(Resource::new("Patient", json!({}))).await.unwrap();
    assert_eq!(first.id.id(), "1");
    assert_eq!(second.id.id(), "2");
}

#[tokio::test]
async fn test_concurrent_creates_get_unique_ids() {
    let store = Arc::new(InMemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create(Resource::new("Patient", json!({})))
                .await
                .unwrap()
                .id
        }));
    }

    let mut seen = std::collections::HashSet::new();
    for handle in handles {
        assert!(seen.insert(handle.await.unwrap()));
    }
    assert_eq!(store.len(), 32);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_by_id() {
    let store = InMemoryStore::from_resources(vec![
        patient("p1", "Smith"),
        patient("p2", "Jones"),
        patient("p3", "Smith"),
    ]);

    let bundle = store
        .search("Patient", &SearchQuery::new().with_ids(["p3", "p1", "missing"]))
        .await
        .unwrap();
    assert_eq!(bundle.bundle_type, BundleType::Searchset);
    assert_eq!(ids(&bundle), vec!["p3", "p1"]);
}

#[tokio::test]
async fn test_search_id_then_filter() {
    let store = InMemoryStore::from_resources(vec![
        patient("p1", "Smith"),
        patient("p2", "Jones"),
        patient("p3", "Smith"),
    ]);

    let query = SearchQuery::new()
        .with_ids(["p1", "p2"])
        .with_parameter("name.family", ["smith"]);
    let bundle = store.search("Patient", &query).await.unwrap();
    assert_eq!(ids(&bundle), vec!["p1"]);
}

#[tokio::test]
async fn test_search_and_of_parameters() {
    let store = InMemoryStore::from_resources(vec![
        patient("p1", "Smith"),
        Resource::new(
            "Patient",
            json!({"id": "p2", "name": [{"family": "Smith"}], "active": false}),
        ),
    ]);

    let query = SearchQuery::from_pairs(["name.family=Smith", "active=true"]);
    let bundle = store.search("Patient", &query).await.unwrap();
    assert_eq!(ids(&bundle), vec!["p1"]);
}

#[tokio::test]
async fn test_custom_matcher() {
    struct PrefixMatcher;
    impl ResourceMatcher for PrefixMatcher {
        fn matches(&self, name: &str, values: &[String], resource: &Resource) -> bool {
            name == "id-prefix"
                && values
                    .iter()
                    .any(|v| resource.id_part().is_some_and(|id| id.starts_with(v.as_str())))
        }
    }

    let store = InMemoryStore::from_resources(vec![patient("ab1", "A"), patient("cd1", "B")])
        .with_matcher(Arc::new(PrefixMatcher));
    let bundle = store
        .search("Patient", &SearchQuery::new().with_parameter("id-prefix", ["ab"]))
        .await
        .unwrap();
    assert_eq!(ids(&bundle), vec!["ab1"]);
}

// ============================================================================
// Seeding, transactions and operations
// ============================================================================

#[tokio::test]
async fn test_from_bundle() {
    let bundle = Bundle::new(BundleType::Collection)
        .with_entry(BundleEntry::resource(patient("p1", "Smith")))
        .with_entry(BundleEntry::resource(Resource::new("Patient", json!({}))));
    let store = InMemoryStore::from_bundle(bundle);

    assert_eq!(store.len(), 2);
    assert!(store.read("Patient", "p1").await.is_ok());
}

#[tokio::test]
async fn test_transaction_from_json() {
    let store = InMemoryStore::new();
    let bundle = Bundle::from_json(&json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": [
            {"resource": {"resourceType": "Patient", "id": "p1"},
             "request": {"method": "PUT", "url": "Patient/p1"}},
            {"resource": {"resourceType": "Patient"},
             "request": {"method": "POST", "url": "Patient"}}
        ]
    }))
    .unwrap();

    let response = store.transaction(bundle).await.unwrap();
    let json = response.to_json();
    assert_eq!(json["type"], "transaction-response");
    assert_eq!(json["entry"][0]["response"]["status"], "201 Created");
    assert_eq!(json["entry"][0]["response"]["location"], "Patient/p1");
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_transaction_requires_transaction_bundle() {
    let store = InMemoryStore::new();
    let err = store
        .transaction(Bundle::searchset(vec![patient("p1", "A")]))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidResource { .. }));
}

#[tokio::test]
async fn test_invoke_through_registry() {
    let registry = OperationRegistry::new().with_type_operation(
        "Patient",
        "$summary",
        |target: &OperationTarget, _: &Parameters| {
            let id = match target {
                OperationTarget::Instance(id) => id.id().to_string(),
                _ => "all".to_string(),
            };
            Ok(Some(OperationResult::Resource(Resource::new(
                "Parameters",
                json!({"parameter": [{"name": "subject", "valueString": id}]}),
            ))))
        },
    );
    let store = InMemoryStore::new().with_operations(registry);

    let target = OperationTarget::Instance(helios_repository::ResourceId::new("Patient", "p9"));
    let result = store.invoke(&target, "$summary", &json!({})).await.unwrap();
    match result {
        Some(OperationResult::Resource(r)) => {
            assert_eq!(r.content()["parameter"][0]["valueString"], "p9");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // names nobody registered are rejected
    let err = store
        .invoke(&target, "$unknown", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidOperation { .. }));
}
