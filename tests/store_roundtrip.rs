//! Disconnect/reconnect behavior of the instance store: serialized rows
//! carry the full persistent state, runtime bindings are rebuilt on every
//! load, and a reconnected instance is observably equivalent to the one
//! that was stored.

use std::sync::Arc;

use serde_json::json;
use usertask_core::assignment::StrategyRegistry;
use usertask_core::events::RecordingListener;
use usertask_core::identity::Identity;
use usertask_core::lifecycle::LifeCycle;
use usertask_core::service::{EngineConnector, EngineDisconnector};
use usertask_core::store::{InMemoryInstanceStore, InstanceStore, StoreError};
use usertask_core::task::{DefinitionRegistry, TaskDefinition, TaskInstance};
use usertask_core::TaskStatus;

fn review_definition() -> TaskDefinition {
    TaskDefinition::new("review", "Review", "1")
        .with_potential_users(["alice", "bob"])
        .with_admin_users(["root"])
}

struct Fixture {
    store: InMemoryInstanceStore,
    listener: Arc<RecordingListener>,
}

fn fixture() -> Fixture {
    let definitions = Arc::new(DefinitionRegistry::new());
    definitions.register(review_definition());

    let listener = Arc::new(RecordingListener::new("store-recorder"));
    let connector = Arc::new(EngineConnector::new(
        definitions,
        Arc::new(LifeCycle::new()),
        vec![listener.clone()],
    ));
    let store = InMemoryInstanceStore::new(connector, Arc::new(EngineDisconnector));
    Fixture { store, listener }
}

fn detached_instance() -> TaskInstance {
    review_definition()
        .create_instance(&StrategyRegistry::default(), "basic")
        .unwrap()
}

#[tokio::test]
async fn reconnected_instance_is_immediately_usable() {
    let f = fixture();
    let instance = detached_instance();
    assert!(!instance.is_connected());

    let stored = f.store.create(instance).await.unwrap();
    assert!(stored.is_connected());
    assert!(stored.definition().is_some());

    let mut loaded = f.store.find_by_id(stored.id()).await.unwrap();
    assert!(loaded.is_connected());

    // Transitions work on the loaded copy, and its events reach the
    // configured listener set.
    let status = loaded
        .transition("claim", None, &Identity::new("alice"))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Reserved);
    assert_eq!(
        f.listener.event_types(),
        vec!["state_changed", "state_changed"]
    );
}

#[tokio::test]
async fn persistent_state_survives_the_round_trip() {
    let f = fixture();
    let mut instance = f.store.create(detached_instance()).await.unwrap();
    let alice = Identity::new("alice");

    instance.transition("claim", None, &alice).await.unwrap();
    instance
        .set_input("amount", json!(250), &alice)
        .await
        .unwrap();
    instance.add_comment("looks fine", &alice).await.unwrap();
    let id = instance.id();
    f.store.update(instance).await.unwrap();

    let loaded = f.store.find_by_id(id).await.unwrap();
    assert_eq!(loaded.status(), TaskStatus::Reserved);
    assert_eq!(loaded.actual_owner(), Some("alice"));
    assert_eq!(loaded.model().inputs.get("amount"), Some(&json!(250)));
    assert_eq!(loaded.comments().len(), 1);
    assert_eq!(loaded.comments()[0].content, "looks fine");
}

#[tokio::test]
async fn detached_snapshot_serializes_without_runtime_state() {
    let instance = detached_instance();
    let row = serde_json::to_value(&instance).unwrap();

    // The serialized form is plain data only.
    assert!(row.get("runtime").is_none());
    assert_eq!(row["definition_id"], json!("review"));

    let parsed: TaskInstance = serde_json::from_value(row).unwrap();
    assert!(!parsed.is_connected());
    assert_eq!(parsed.id(), instance.id());
    assert_eq!(parsed.status(), instance.status());
}

#[tokio::test]
async fn unknown_definition_fails_reconnection() {
    let f = fixture();
    let stranger = TaskDefinition::new("unregistered", "Unregistered", "1")
        .with_potential_users(["alice"])
        .create_instance(&StrategyRegistry::default(), "basic")
        .unwrap();

    let result = f.store.create(stranger).await;
    assert!(matches!(
        result,
        Err(StoreError::UnknownDefinition { definition_id }) if definition_id == "unregistered"
    ));
}

#[tokio::test]
async fn every_loaded_copy_is_wired_to_the_listener_set() {
    let f = fixture();
    let stored = f.store.create(detached_instance()).await.unwrap();
    let bob = Identity::new("bob");

    let mut first = f.store.find_by_id(stored.id()).await.unwrap();
    first.transition("claim", None, &bob).await.unwrap();
    f.store.update(first).await.unwrap();

    // A separately loaded copy gets its own freshly built event support,
    // carrying the same configured listeners.
    let mut second = f.store.find_by_id(stored.id()).await.unwrap();
    assert_eq!(second.status(), TaskStatus::Reserved);
    second.transition("start", None, &bob).await.unwrap();

    assert_eq!(f.listener.event_types().len(), 4);
}
