//! Read handlers.
//!
//! A [`ReadType`] is a named, read-only query against the store. Reads never
//! go through the transaction queue: they run immediately against whatever
//! the store holds between ticks.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use engine_component::ArchetypeStore;
use engine_tx::{Schema, TxError, TxPayload};
use tracing::debug;

use crate::error::WorldError;

type ReadFn<Req, Reply> = dyn Fn(&ArchetypeStore, Req) -> anyhow::Result<Reply> + Send + Sync;

/// A named read handler taking `Req` and producing `Reply`.
pub struct ReadType<Req, Reply> {
    name: String,
    schema: Option<Schema>,
    handler: Arc<ReadFn<Req, Reply>>,
    _types: PhantomData<fn(Req) -> Reply>,
}

impl<Req, Reply> Clone for ReadType<Req, Reply> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            schema: self.schema,
            handler: Arc::clone(&self.handler),
            _types: PhantomData,
        }
    }
}

impl<Req, Reply> std::fmt::Debug for ReadType<Req, Reply> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadType")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<Req: TxPayload, Reply: TxPayload> ReadType<Req, Reply> {
    /// Create a read named `name` that answers with `handler`.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ArchetypeStore, Req) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            schema: None,
            handler: Arc::new(handler),
            _types: PhantomData,
        }
    }

    /// Set the encoding used for external requests and replies.
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Returns the read name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the external encoding, if one is set.
    #[must_use]
    pub fn schema(&self) -> Option<Schema> {
        self.schema
    }

    /// Run the handler with a typed request.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ReadFailure`] if the handler fails.
    pub fn handle(&self, store: &ArchetypeStore, request: Req) -> Result<Reply, WorldError> {
        (self.handler)(store, request).map_err(|source| WorldError::ReadFailure {
            name: self.name.clone(),
            source,
        })
    }

    /// Decode `bytes` as a request, run the handler, and encode the reply.
    ///
    /// # Errors
    ///
    /// [`TxError::SchemaNotConfigured`], [`TxError::DecodeFailure`] and
    /// [`TxError::EncodeFailure`] wrapped in [`WorldError::Tx`], or
    /// [`WorldError::ReadFailure`].
    pub fn handle_bytes(&self, store: &ArchetypeStore, bytes: &[u8]) -> Result<Vec<u8>, WorldError> {
        let schema = self
            .schema
            .ok_or_else(|| TxError::SchemaNotConfigured(self.name.clone()))?;
        let request: Req = schema.decode(bytes).map_err(|source| TxError::DecodeFailure {
            name: self.name.clone(),
            source,
        })?;
        let reply = self.handle(store, request)?;
        let encoded = schema.encode(&reply).map_err(|source| TxError::EncodeFailure {
            name: self.name.clone(),
            source,
        })?;
        Ok(encoded)
    }
}

/// Object-safe view of a [`ReadType`].
pub trait AnyRead: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// See [`ReadType::handle_bytes`].
    ///
    /// # Errors
    ///
    /// See [`ReadType::handle_bytes`].
    fn handle_external(&self, store: &ArchetypeStore, bytes: &[u8]) -> Result<Vec<u8>, WorldError>;

    fn clone_arc(&self) -> Arc<dyn AnyRead>;
}

impl<Req: TxPayload, Reply: TxPayload> AnyRead for ReadType<Req, Reply> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_external(&self, store: &ArchetypeStore, bytes: &[u8]) -> Result<Vec<u8>, WorldError> {
        self.handle_bytes(store, bytes)
    }

    fn clone_arc(&self) -> Arc<dyn AnyRead> {
        Arc::new(self.clone())
    }
}

/// Registered reads, addressable by name and listed in registration order.
#[derive(Debug, Default)]
pub struct ReadRegistry {
    reads: Vec<Arc<dyn AnyRead>>,
    by_name: HashMap<String, usize>,
}

impl ReadRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateRegistration`] if a name is already
    /// registered or repeats within `reads`. Nothing is registered in that
    /// case.
    pub fn register(&mut self, reads: &[&dyn AnyRead]) -> Result<(), WorldError> {
        let mut batch: Vec<&str> = Vec::with_capacity(reads.len());
        for read in reads {
            let name = read.name();
            if self.by_name.contains_key(name) || batch.contains(&name) {
                return Err(WorldError::DuplicateRegistration(name.to_string()));
            }
            batch.push(name);
        }
        for read in reads {
            debug!(name = read.name(), "registered read");
            self.by_name.insert(read.name().to_string(), self.reads.len());
            self.reads.push(read.clone_arc());
        }
        Ok(())
    }

    /// Look up a read by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AnyRead>> {
        self.by_name.get(name).map(|&i| &self.reads[i])
    }

    /// All registered reads in registration order.
    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn AnyRead>> {
        self.reads.iter()
    }

    /// Returns the number of registered reads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// Returns `true` if no read has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{Component, Entity};
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Gold(u64);

    impl Component for Gold {
        fn type_name() -> &'static str {
            "Gold"
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct GoldRequest {
        entity: Entity,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct GoldReply {
        gold: u64,
    }

    fn gold_read() -> ReadType<GoldRequest, GoldReply> {
        ReadType::new("gold", |store: &ArchetypeStore, req: GoldRequest| {
            let gold = store.get::<Gold>(req.entity)?;
            Ok(GoldReply { gold: gold.0 })
        })
    }

    fn store_with_gold(amount: u64) -> (ArchetypeStore, Entity) {
        let mut store = ArchetypeStore::new();
        store.register::<Gold>().unwrap();
        let entity = store.create(&[Gold::component_type_id()]).unwrap();
        store.set(entity, Gold(amount)).unwrap();
        (store, entity)
    }

    #[test]
    fn test_typed_handle() {
        let (store, entity) = store_with_gold(42);
        let reply = gold_read().handle(&store, GoldRequest { entity }).unwrap();
        assert_eq!(reply, GoldReply { gold: 42 });
    }

    #[test]
    fn test_handler_error_is_read_failure() {
        let (store, _) = store_with_gold(1);
        let err = gold_read()
            .handle(&store, GoldRequest { entity: Entity::from_raw(999) })
            .unwrap_err();
        assert!(matches!(err, WorldError::ReadFailure { ref name, .. } if name == "gold"));
    }

    #[test]
    fn test_bytes_require_schema() {
        let (store, entity) = store_with_gold(1);
        let bytes = Schema::Json.encode(&GoldRequest { entity }).unwrap();
        let err = gold_read().handle_bytes(&store, &bytes).unwrap_err();
        assert!(matches!(err, WorldError::Tx(TxError::SchemaNotConfigured(_))));

        let read = gold_read().with_schema(Schema::Json);
        let reply: GoldReply = Schema::Json
            .decode(&read.handle_bytes(&store, &bytes).unwrap())
            .unwrap();
        assert_eq!(reply.gold, 1);
    }

    #[test]
    fn test_registry_rejects_duplicates_atomically() {
        let mut registry = ReadRegistry::new();
        let a = gold_read();
        let b = ReadType::new("other", |_store: &ArchetypeStore, req: GoldRequest| {
            Ok(GoldReply { gold: req.entity.id() })
        });
        assert!(registry.register(&[&b, &a, &a]).is_err());
        assert!(registry.is_empty());

        registry.register(&[&a, &b]).unwrap();
        let names: Vec<&str> = registry.list().map(|r| r.name()).collect();
        assert_eq!(names, vec!["gold", "other"]);
        assert!(registry.get("gold").is_some());
        assert!(registry.get("missing").is_none());
    }
}
