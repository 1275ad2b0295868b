//! Cache instances and the sessions bound to them

use crate::cache::config::CacheConfig;
use crate::cache::eviction::Eviction;
use crate::cache::sequencer::WriteSequencer;
use crate::cache::types::{CacheStats, Entry};
use crate::cache::{locked, CacheNode, Context};
use crate::error::{CacheError, Result};
use crate::schema::{validate, Path, SchemaNode};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Normalized cache for one schema
///
/// All sessions created from a cache share:
/// - one root node tree and its entity registry
/// - one write sequencer, so top-level writes apply in submission order
/// - one set of statistics
#[derive(Clone)]
pub struct Cache {
    schema: SchemaNode,
    shared: Arc<Shared>,
}

struct Shared {
    root: Arc<CacheNode>,
    ctx: Arc<Context>,
    sequencer: WriteSequencer,
    stats: Arc<Mutex<CacheStats>>,
}

impl Cache {
    /// Create a cache for `schema`
    pub fn new(schema: SchemaNode, config: CacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;
        info!("Initializing cache with config: {:?}", config);

        let ctx = Context::new(config);
        let root = CacheNode::build(&schema, Path::root(ctx.config.id.clone()), &ctx);

        Ok(Self {
            schema,
            shared: Arc::new(Shared {
                root,
                ctx,
                sequencer: WriteSequencer::default(),
                stats: Arc::new(Mutex::new(CacheStats::default())),
            }),
        })
    }

    /// Bind a session to `request`, a sub-selection of the schema
    pub fn session(&self, request: SchemaNode) -> Result<CacheSession> {
        let errors = validate(&request, &self.schema);
        if !errors.is_empty() {
            warn!("Rejected request with {} validation errors", errors.leaf_count());
            return Err(CacheError::Incompatible(errors));
        }

        let session = CacheSession {
            id: Uuid::new_v4(),
            request,
            shared: Arc::clone(&self.shared),
        };
        debug!("Opened session {}", session.id);
        Ok(session)
    }

    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.ctx.config
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        locked(&self.shared.stats).clone()
    }

    /// Number of identities registered by custom cache hooks
    pub fn entity_count(&self) -> usize {
        self.shared.ctx.registry.len()
    }

    /// Whether some node resolved the identity `id`
    pub fn has_entity(&self, id: &str) -> bool {
        self.shared.ctx.registry.contains(id)
    }
}

/// Read, write and observe a cache through one request
#[derive(Clone)]
pub struct CacheSession {
    id: Uuid,
    request: SchemaNode,
    shared: Arc<Shared>,
}

impl CacheSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &SchemaNode {
        &self.request
    }

    /// Reconstruct the selected value, or `None` if any selected part is missing
    pub fn read(&self, variables: &Value) -> Option<Value> {
        let value = self.shared.root.read(&self.request, variables);
        locked(&self.shared.stats).record_read(value.is_some());
        value
    }

    /// Merge `data` into the cache.
    ///
    /// The turn is reserved when this is called, not when the future is first
    /// polled, so writes apply in the order they were submitted.
    pub fn write(
        &self,
        variables: Value,
        data: Value,
    ) -> impl Future<Output = Result<Eviction>> + Send + 'static {
        let mut turn = self.shared.sequencer.enqueue();
        let shared = Arc::clone(&self.shared);
        let session = self.id;

        async move {
            turn.wait().await;
            debug!("Session {} writing at {}", session, shared.ctx.config.id);

            let result = shared.root.write(&variables, data).await;
            locked(&shared.stats).record_write(result.is_ok());
            drop(turn);

            match result {
                Ok(eviction) => Ok(counted(eviction, &shared.stats)),
                Err(err) => {
                    debug!("Session {} write failed: {}", session, err);
                    Err(err)
                }
            }
        }
    }

    /// Live handles for the selected value
    pub fn to_entries(&self, variables: &Value) -> Entry {
        self.shared.root.to_entries(&self.request, variables)
    }

    /// Save the current snapshot through the persistence hook.
    ///
    /// Returns `false` when no hook is configured or nothing is cached yet.
    pub fn persist(&self, variables: &Value) -> Result<bool> {
        let Some(hook) = self.shared.ctx.config.persist.as_ref() else {
            debug!("No persistence hook configured");
            return Ok(false);
        };
        let Some(snapshot) = self.read(variables) else {
            return Ok(false);
        };

        hook.store(&self.storage_key(variables)?, &snapshot)?;
        Ok(true)
    }

    /// Write back the snapshot saved for `variables`, if the hook has one
    pub async fn restore(&self, variables: Value) -> Result<Option<Eviction>> {
        let Some(hook) = self.shared.ctx.config.persist.clone() else {
            return Ok(None);
        };
        let Some(snapshot) = hook.restore(&self.storage_key(&variables)?)? else {
            return Ok(None);
        };

        self.write(variables, snapshot).await.map(Some)
    }

    fn storage_key(&self, variables: &Value) -> Result<String> {
        Ok(format!(
            "{}:{}",
            self.shared.ctx.config.id,
            serde_json::to_string(variables)?
        ))
    }
}

fn counted(eviction: Eviction, stats: &Arc<Mutex<CacheStats>>) -> Eviction {
    let stats = Arc::clone(stats);
    Eviction::all([
        eviction,
        Eviction::new(move || locked(&stats).evictions += 1),
    ])
}
