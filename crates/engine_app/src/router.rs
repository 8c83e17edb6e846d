//! External entry point for encoded messages and queries.
//!
//! A [`Router`] is what a bridge or RPC layer holds: it turns raw bytes into
//! queued transactions and runs reads on behalf of callers that only know
//! type IDs and read names.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use engine_tx::{AnyTransactionType, Signature, TxQueue, TxTypeId};
use tracing::{debug, trace};

use crate::error::WorldError;
use crate::world::{World, WorldState};

/// Submitter tag stamped on messages sent through a router unless overridden.
pub const DEFAULT_SUBMITTER_TAG: &str = "router";

/// Decodes external messages into a world's transaction queue and answers
/// external reads.
#[derive(Debug)]
pub struct Router {
    transactions: HashMap<TxTypeId, Arc<dyn AnyTransactionType>>,
    queue: Arc<TxQueue>,
    submitter_tag: String,
    next_nonce: AtomicU64,
}

impl Router {
    /// Build a router over a loaded world's transaction types.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotLoaded`] if registration is still open.
    pub fn new(world: &World) -> Result<Self, WorldError> {
        if world.state() != WorldState::Loaded {
            return Err(WorldError::NotLoaded);
        }
        let transactions = world
            .transaction_types()
            .list()
            .filter_map(|ty| Some((ty.id()?, Arc::clone(ty))))
            .collect();
        Ok(Self {
            transactions,
            queue: world.queue(),
            submitter_tag: DEFAULT_SUBMITTER_TAG.to_string(),
            next_nonce: AtomicU64::new(1),
        })
    }

    /// Replace the submitter tag stamped on routed messages.
    #[must_use]
    pub fn with_submitter_tag(mut self, tag: impl Into<String>) -> Self {
        self.submitter_tag = tag.into();
        self
    }

    /// Returns the submitter tag stamped on routed messages.
    #[must_use]
    pub fn submitter_tag(&self) -> &str {
        &self.submitter_tag
    }

    /// Decode `bytes` with the schema of transaction type `type_id` and queue
    /// the result. Returns the signature it was queued under.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownTransactionType`], or a wrapped
    /// [`TxError`](engine_tx::TxError) if the bytes cannot be decoded.
    pub fn send_message(&self, type_id: u32, bytes: &[u8]) -> Result<Signature, WorldError> {
        let id = TxTypeId(type_id);
        let ty = self
            .transactions
            .get(&id)
            .ok_or(WorldError::UnknownTransactionType(type_id))?;
        let payload = ty.decode_payload(bytes)?;
        let signature = Signature::new(
            self.submitter_tag.clone(),
            self.next_nonce.fetch_add(1, Ordering::Relaxed),
        );
        trace!(name = ty.name(), type_id, nonce = signature.nonce, "routing message");
        self.queue.add_transaction(id, payload, signature.clone());
        Ok(signature)
    }

    /// Run the read named `resource` against `world` with an encoded request.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownRead`], [`WorldError::ReadFailure`], or a wrapped
    /// codec error.
    pub fn query(&self, world: &World, resource: &str, bytes: &[u8]) -> Result<Vec<u8>, WorldError> {
        let read = world
            .reads()
            .get(resource)
            .ok_or_else(|| WorldError::UnknownRead(resource.to_string()))?;
        debug!(resource, "handling query");
        read.handle_external(world.store(), bytes)
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ArchetypeStore;
    use engine_tx::{Schema, TransactionType, TxError};
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::read::ReadType;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Chat {
        text: String,
    }

    fn loaded_world(chat: &TransactionType<Chat>) -> World {
        let mut world = World::new();
        world.register_transaction_types(&[chat]).unwrap();
        let echo = ReadType::new("echo", |_store: &ArchetypeStore, text: String| Ok(text))
            .with_schema(Schema::MessagePack);
        world.register_reads(&[&echo]).unwrap();
        world.load_game_state().unwrap();
        world
    }

    #[test]
    fn test_router_requires_loaded_world() {
        assert!(matches!(Router::new(&World::new()), Err(WorldError::NotLoaded)));
    }

    #[test]
    fn test_send_message_queues_with_increasing_nonces() {
        let chat = TransactionType::<Chat>::new("chat").with_schema(Schema::Json);
        let world = loaded_world(&chat);
        let router = Router::new(&world).unwrap().with_submitter_tag("bridge");

        let first = router.send_message(1, br#"{"text":"hi"}"#).unwrap();
        let second = router.send_message(1, br#"{"text":"yo"}"#).unwrap();
        assert_eq!(first, Signature::new("bridge", 1));
        assert_eq!(second.nonce, 2);

        let batch = world.queue().swap_and_get_processing();
        let texts: Vec<&str> = batch.view(&chat).map(|r| r.value.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "yo"]);
    }

    #[test]
    fn test_send_message_errors() {
        let chat = TransactionType::<Chat>::new("chat");
        let world = loaded_world(&chat);
        let router = Router::new(&world).unwrap();

        assert!(matches!(
            router.send_message(42, b"{}"),
            Err(WorldError::UnknownTransactionType(42))
        ));
        assert!(matches!(
            router.send_message(1, b"{}"),
            Err(WorldError::Tx(TxError::SchemaNotConfigured(_)))
        ));
        assert_eq!(world.queue().pending(), 0);
    }

    #[test]
    fn test_query_routes_by_name() {
        let chat = TransactionType::<Chat>::new("chat");
        let world = loaded_world(&chat);
        let router = Router::new(&world).unwrap();

        let request = Schema::MessagePack.encode(&"ping".to_string()).unwrap();
        let reply = router.query(&world, "echo", &request).unwrap();
        let text: String = Schema::MessagePack.decode(&reply).unwrap();
        assert_eq!(text, "ping");

        assert!(matches!(
            router.query(&world, "nope", &request),
            Err(WorldError::UnknownRead(ref name)) if name == "nope"
        ));
    }
}
