//! Integration tests for the cache module
//!
//! These tests drive the public session API end to end:
//! - Round trips and partial merges
//! - Evictions, including superseded ones
//! - Array, map, sum and option write semantics
//! - Entity aliasing and variables
//! - Write ordering, cooperative yielding and persistence

use ouroboros_cache::{
    Cache, CacheConfig, CacheError, CacheSession, Entry, Persist, Result, SchemaNode,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn person() -> SchemaNode {
    SchemaNode::object(
        "Person",
        [
            ("age", SchemaNode::int()),
            ("weight", SchemaNode::int()),
            ("name", SchemaNode::string()),
        ],
    )
}

fn open(schema: SchemaNode, config: CacheConfig) -> (Cache, CacheSession) {
    let cache = Cache::new(schema.clone(), config).unwrap();
    let session = cache.session(schema).unwrap();
    (cache, session)
}

#[tokio::test]
async fn test_round_trip() {
    let (_cache, session) = open(person(), CacheConfig::default());
    let value = json!({"age": 29, "weight": 145, "name": "Harry"});

    session.write(json!({}), value.clone()).await.unwrap();

    assert_eq!(session.read(&json!({})), Some(value));
}

#[tokio::test]
async fn test_partial_update_and_eviction() {
    let (_cache, session) = open(person(), CacheConfig::default());

    session
        .write(json!({}), json!({"age": 29, "weight": 145, "name": "Harry"}))
        .await
        .unwrap();
    let rename = session.write(json!({}), json!({"name": "Sam"})).await.unwrap();
    assert_eq!(
        session.read(&json!({})),
        Some(json!({"age": 29, "weight": 145, "name": "Sam"}))
    );

    rename.evict();
    assert_eq!(
        session.read(&json!({})),
        Some(json!({"age": 29, "weight": 145, "name": "Harry"}))
    );
}

#[tokio::test]
async fn test_superseded_eviction_is_noop() {
    let (_cache, session) = open(person(), CacheConfig::default());

    session
        .write(json!({}), json!({"age": 1, "weight": 1, "name": "a"}))
        .await
        .unwrap();
    let first = session.write(json!({}), json!({"name": "b"})).await.unwrap();
    let _second = session.write(json!({}), json!({"name": "c"})).await.unwrap();

    first.evict();
    assert_eq!(session.read(&json!({})).unwrap()["name"], "c");
}

#[tokio::test]
async fn test_evicting_in_reverse_order_does_not_stack() {
    let (_cache, session) = open(person(), CacheConfig::default());
    let harry = json!({"age": 29, "weight": 145, "name": "Harry"});

    let first = session.write(json!({}), harry.clone()).await.unwrap();
    let second = session.write(json!({}), json!({"name": "Sam"})).await.unwrap();

    second.evict();
    assert_eq!(session.read(&json!({})), Some(harry.clone()));

    first.evict();
    assert_eq!(session.read(&json!({})), Some(harry));
}

#[tokio::test]
async fn test_array_overlay_vs_immutable_arrays() {
    let schema = SchemaNode::array(SchemaNode::int());

    let (_cache, mutable) = open(schema.clone(), CacheConfig::default());
    mutable.write(json!({}), json!([1, 2, 3])).await.unwrap();
    mutable.write(json!({}), json!([7])).await.unwrap();
    assert_eq!(mutable.read(&json!({})), Some(json!([7, 2, 3])));

    let config = CacheConfig::builder().use_immutable_arrays(true).build();
    let (_cache, immutable) = open(schema, config);
    immutable.write(json!({}), json!([1, 2, 3])).await.unwrap();
    immutable.write(json!({}), json!([7])).await.unwrap();
    assert_eq!(immutable.read(&json!({})), Some(json!([7])));
}

#[tokio::test]
async fn test_map_null_deletes_and_restores() {
    let schema = SchemaNode::map(SchemaNode::string(), SchemaNode::int());
    let (_cache, session) = open(schema, CacheConfig::default());

    session.write(json!({}), json!({"1": 1})).await.unwrap();
    let delete = session.write(json!({}), json!({"1": null})).await.unwrap();
    assert_eq!(session.read(&json!({})), Some(json!({})));

    delete.evict();
    assert_eq!(session.read(&json!({})), Some(json!({"1": 1})));
}

fn education() -> SchemaNode {
    SchemaNode::sum([
        SchemaNode::object(
            "HighSchoolEducation",
            [("city", SchemaNode::string()), ("graduated", SchemaNode::boolean())],
        ),
        SchemaNode::object(
            "CollegeEducation",
            [("major", SchemaNode::string()), ("graduated", SchemaNode::boolean())],
        ),
    ])
}

#[tokio::test]
async fn test_sum_same_type_merge() {
    let (_cache, session) = open(education(), CacheConfig::default());

    session
        .write(
            json!({}),
            json!({"__typename": "HighSchoolEducation", "city": "LC", "graduated": true}),
        )
        .await
        .unwrap();
    let update = session
        .write(json!({}), json!({"graduated": false}))
        .await
        .unwrap();
    assert_eq!(
        session.read(&json!({})),
        Some(json!({"__typename": "HighSchoolEducation", "city": "LC", "graduated": false}))
    );

    update.evict();
    assert_eq!(session.read(&json!({})).unwrap()["graduated"], true);
}

#[tokio::test]
async fn test_sum_replacement() {
    let (_cache, session) = open(education(), CacheConfig::default());
    let high_school = json!({"__typename": "HighSchoolEducation", "city": "LC", "graduated": true});

    session.write(json!({}), high_school.clone()).await.unwrap();
    let college = session
        .write(
            json!({}),
            json!({"__typename": "CollegeEducation", "major": "CS", "graduated": false}),
        )
        .await
        .unwrap();
    assert_eq!(session.read(&json!({})).unwrap()["__typename"], "CollegeEducation");

    college.evict();
    assert_eq!(session.read(&json!({})), Some(high_school));
}

#[tokio::test]
async fn test_option_flip_and_restore() {
    let schema = SchemaNode::option(SchemaNode::string());
    let (_cache, session) = open(schema, CacheConfig::default());

    let only = session.write(json!({}), json!("1")).await.unwrap();
    only.evict();
    assert_eq!(session.read(&json!({})), None);

    session.write(json!({}), json!("1")).await.unwrap();
    let second = session.write(json!({}), json!("2")).await.unwrap();
    second.evict();
    assert_eq!(session.read(&json!({})), Some(json!("1")));

    session.write(json!({}), Value::Null).await.unwrap();
    assert_eq!(session.read(&json!({})), Some(Value::Null));
}

#[tokio::test]
async fn test_custom_identity_aliases_paths() {
    let friend = SchemaNode::object(
        "Person",
        [("id", SchemaNode::string()), ("name", SchemaNode::string())],
    )
    .with_cache_id(|_, _, data| {
        data.and_then(|d| d.get("id"))
            .and_then(Value::as_str)
            .map(|id| format!("Person:{}", id))
    });
    let schema = SchemaNode::object("Query", [("me", friend.clone()), ("bestFriend", friend)]);
    let (cache, session) = open(schema, CacheConfig::default());

    session
        .write(json!({}), json!({"me": {"id": "1", "name": "Ann"}}))
        .await
        .unwrap();
    session
        .write(json!({}), json!({"bestFriend": {"id": "1", "name": "Annie"}}))
        .await
        .unwrap();

    assert_eq!(
        session.read(&json!({})),
        Some(json!({
            "me": {"id": "1", "name": "Annie"},
            "bestFriend": {"id": "1", "name": "Annie"}
        }))
    );
    assert_eq!(cache.entity_count(), 1);
    assert!(cache.has_entity("Person:1"));
}

#[tokio::test]
async fn test_members_keyed_by_variables() {
    let schema = SchemaNode::object(
        "Query",
        [(
            "greeting",
            SchemaNode::string().with_variable("lang", SchemaNode::string()),
        )],
    );
    let (_cache, session) = open(schema, CacheConfig::default());

    session
        .write(json!({"lang": "en"}), json!({"greeting": "hello"}))
        .await
        .unwrap();
    session
        .write(json!({"lang": "fr"}), json!({"greeting": "bonjour"}))
        .await
        .unwrap();

    assert_eq!(
        session.read(&json!({"lang": "en"})),
        Some(json!({"greeting": "hello"}))
    );
    assert_eq!(
        session.read(&json!({"lang": "fr"})),
        Some(json!({"greeting": "bonjour"}))
    );
    assert_eq!(session.read(&json!({"lang": "de"})), None);
}

#[tokio::test]
async fn test_entity_values_are_stored_whole() {
    let address = SchemaNode::object(
        "Address",
        [("city", SchemaNode::string()), ("zip", SchemaNode::string())],
    )
    .as_entity();
    let schema = SchemaNode::object("Person", [("address", address)]);
    let (_cache, session) = open(schema, CacheConfig::default());

    session
        .write(json!({}), json!({"address": {"city": "X", "zip": "1"}}))
        .await
        .unwrap();
    session
        .write(json!({}), json!({"address": {"city": "Y"}}))
        .await
        .unwrap();

    assert_eq!(
        session.read(&json!({})),
        Some(json!({"address": {"city": "Y"}}))
    );
}

#[tokio::test]
async fn test_mutation_root_is_transparent() {
    let schema = SchemaNode::mutation(person());
    let (_cache, session) = open(schema, CacheConfig::default());
    let value = json!({"age": 3, "weight": 4, "name": "Kid"});

    session.write(json!({}), value.clone()).await.unwrap();
    assert_eq!(session.read(&json!({})), Some(value));
}

#[tokio::test]
async fn test_writes_apply_in_submission_order() {
    let (cache, first_session) = open(person(), CacheConfig::default());
    let second_session = cache.session(person()).unwrap();

    let a = first_session.write(json!({}), json!({"age": 1, "weight": 1, "name": "A"}));
    let b = second_session.write(json!({}), json!({"name": "B"}));

    // b is polled first but was submitted second
    let (b, a) = tokio::join!(b, a);
    a.unwrap();
    b.unwrap();

    assert_eq!(first_session.read(&json!({})).unwrap()["name"], "B");
}

#[tokio::test]
async fn test_large_array_write_yields() {
    let schema = SchemaNode::array(SchemaNode::int());
    let (_cache, session) = open(schema, CacheConfig::default());
    let ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ran);
    let other = tokio::spawn(async move {
        flag.store(true, Ordering::SeqCst);
    });

    let values: Vec<i64> = (0..1_000).collect();
    session.write(json!({}), json!(values)).await.unwrap();

    assert!(ran.load(Ordering::SeqCst));
    other.await.unwrap();
    assert_eq!(session.read(&json!({})), Some(json!(values)));
}

#[tokio::test]
async fn test_incompatible_request_is_rejected() {
    let cache = Cache::new(person(), CacheConfig::default()).unwrap();
    let request = SchemaNode::object("Person", [("age", SchemaNode::string())]);

    match cache.session(request) {
        Err(CacheError::Incompatible(errors)) => assert_eq!(errors.leaf_count(), 1),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("request should be rejected"),
    }
}

#[tokio::test]
async fn test_entries_observe_writes_and_evictions() {
    let (_cache, session) = open(person(), CacheConfig::default());
    session
        .write(json!({}), json!({"age": 1, "weight": 1, "name": "a"}))
        .await
        .unwrap();

    let entries = session.to_entries(&json!({}));
    let Some(Entry::Value(name)) = entries.get("name") else {
        panic!("name should be a value handle");
    };
    let mut name = name.clone();
    name.borrow_and_update();

    let rename = session.write(json!({}), json!({"name": "b"})).await.unwrap();
    assert!(name.has_changed().unwrap());
    assert_eq!(*name.borrow_and_update(), Some(json!("b")));

    rename.evict();
    assert_eq!(*name.borrow_and_update(), Some(json!("a")));
}

#[derive(Default)]
struct MemoryPersist {
    snapshots: Mutex<HashMap<String, Value>>,
}

impl Persist for MemoryPersist {
    fn store(&self, key: &str, snapshot: &Value) -> Result<()> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn restore(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.snapshots.lock().unwrap().get(key).cloned())
    }
}

#[tokio::test]
async fn test_persist_and_restore() -> anyhow::Result<()> {
    let hook = Arc::new(MemoryPersist::default());
    let config = CacheConfig::builder().id("people").persist(hook.clone()).build();
    let value = json!({"age": 29, "weight": 145, "name": "Harry"});

    let (_cache, session) = open(person(), config.clone());
    session.write(json!({}), value.clone()).await?;
    assert!(session.persist(&json!({}))?);
    assert!(hook.snapshots.lock().unwrap().contains_key("people:{}"));

    let (_fresh, restored) = open(person(), config);
    assert_eq!(restored.read(&json!({})), None);
    let eviction = restored.restore(json!({})).await?;
    assert!(eviction.is_some());
    assert_eq!(restored.read(&json!({})), Some(value));
    Ok(())
}
