//! Cache Demo Application
//!
//! Walks through merge writes, evictions, sums and entity aliasing.
//!
//! Usage:
//!   cargo run --example cache_demo
//!
//! Environment variables:
//!   RUST_LOG                          - log filter (default: info)
//!   OUROBOROS_CACHE_ID                - root path id (default: root)
//!   OUROBOROS_CACHE_IMMUTABLE_ARRAYS  - truncate arrays on write (default: false)
//!   OUROBOROS_CACHE_YIELD_EVERY       - items between scheduler yields (default: 100)

use ouroboros_cache::{Cache, CacheConfig, SchemaNode};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn schema() -> SchemaNode {
    let person = SchemaNode::object(
        "Person",
        [
            ("id", SchemaNode::string()),
            ("name", SchemaNode::string()),
            ("nickname", SchemaNode::option(SchemaNode::string())),
        ],
    )
    .with_cache_id(|_, _, data| {
        data.and_then(|d| d.get("id"))
            .and_then(Value::as_str)
            .map(|id| format!("Person:{}", id))
    });

    let pet = SchemaNode::sum([
        SchemaNode::object(
            "Cat",
            [("name", SchemaNode::string()), ("lives", SchemaNode::int())],
        ),
        SchemaNode::object(
            "Dog",
            [("name", SchemaNode::string()), ("good", SchemaNode::boolean())],
        ),
    ]);

    SchemaNode::object(
        "Query",
        [
            ("me", person.clone()),
            ("friends", SchemaNode::array(person)),
            ("pet", pet),
            (
                "scores",
                SchemaNode::map(SchemaNode::string(), SchemaNode::int())
                    .with_variable("season", SchemaNode::int()),
            ),
        ],
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Normalized Cache Demo ===");

    let config = CacheConfig::from_env()?;
    let schema = schema();
    let cache = Cache::new(schema.clone(), config)?;
    let session = cache.session(schema)?;
    let vars = json!({"season": 2024});

    info!("\n--- Merge writes ---");
    session
        .write(
            vars.clone(),
            json!({
                "me": {"id": "1", "name": "Ann", "nickname": null},
                "friends": [{"id": "2", "name": "Bob", "nickname": "B"}],
                "pet": {"__typename": "Cat", "name": "Tom", "lives": 9},
                "scores": {"ann": 10, "bob": 7}
            }),
        )
        .await?;
    info!("Read: {}", session.read(&vars).unwrap_or(serde_json::Value::Null));

    info!("\n--- Evictions ---");
    let rename = session
        .write(vars.clone(), json!({"me": {"id": "1", "name": "Annie"}}))
        .await?;
    info!("After rename: {}", session.read(&vars).unwrap_or(serde_json::Value::Null)["me"]);
    rename.evict();
    info!("After eviction: {}", session.read(&vars).unwrap_or(serde_json::Value::Null)["me"]);

    info!("\n--- Sum replacement ---");
    let swap = session
        .write(vars.clone(), json!({"pet": {"__typename": "Dog", "name": "Rex", "good": true}}))
        .await?;
    info!("Pet: {}", session.read(&vars).unwrap_or(serde_json::Value::Null)["pet"]);
    swap.evict();
    info!("Pet restored: {}", session.read(&vars).unwrap_or(serde_json::Value::Null)["pet"]);

    info!("\n--- Entity aliasing ---");
    session
        .write(
            vars.clone(),
            json!({"friends": [{"id": "2"}, {"id": "1", "name": "Ann (friend view)"}]}),
        )
        .await?;
    info!("me: {}", session.read(&vars).unwrap_or(serde_json::Value::Null)["me"]);
    info!("Registered entities: {}", cache.entity_count());

    info!("\n--- Variables ---");
    let other_season = json!({"season": 2023});
    info!("Season 2023 cached: {}", session.read(&other_season).is_some());

    info!("\n{}", cache.stats());
    Ok(())
}
