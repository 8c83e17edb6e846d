//! Transaction types, signatures, and type-erased payloads.
//!
//! A [`TransactionType<T>`] is a named descriptor for payloads of type `T`.
//! Registering it with a [`TxRegistry`](crate::TxRegistry) assigns its
//! [`TxTypeId`]; clones share that identity, so a clone captured by a system
//! sees the ID assigned to the original.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TxError;
use crate::queue::TxQueue;
use crate::schema::Schema;

/// Numeric identifier of a registered transaction type. Assigned in
/// registration order starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxTypeId(pub u32);

impl std::fmt::Display for TxTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxType({})", self.0)
    }
}

/// Who submitted a transaction. Carried through to systems; never verified
/// by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Opaque tag naming the submitter (e.g. a persona).
    pub submitter_tag: String,
    /// Submitter-chosen sequence number.
    pub nonce: u64,
}

impl Signature {
    /// Create a signature from a submitter tag and nonce.
    #[must_use]
    pub fn new(submitter_tag: impl Into<String>, nonce: u64) -> Self {
        Self {
            submitter_tag: submitter_tag.into(),
            nonce,
        }
    }
}

/// A type-erased transaction payload. Systems only ever see it downcast to
/// its concrete type through a [`TypedView`](crate::TypedView).
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Bound satisfied by every type usable as a transaction payload.
pub trait TxPayload: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> TxPayload for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Identity shared by a transaction type and all its clones.
#[derive(Debug)]
pub struct TxDescriptor {
    name: String,
    /// Assigned ID; 0 while unregistered.
    id: AtomicU32,
    schema: RwLock<Option<Schema>>,
}

impl TxDescriptor {
    fn new(name: String) -> Self {
        Self {
            name,
            id: AtomicU32::new(0),
            schema: RwLock::new(None),
        }
    }

    /// The unique transaction type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The assigned ID, or `None` before registration.
    #[must_use]
    pub fn id(&self) -> Option<TxTypeId> {
        match self.id.load(Ordering::Acquire) {
            0 => None,
            id => Some(TxTypeId(id)),
        }
    }

    /// The configured external schema, if any.
    #[must_use]
    pub fn schema(&self) -> Option<Schema> {
        *self.schema.read()
    }

    /// Assign the ID. Returns `false` if one was already set.
    pub(crate) fn assign(&self, id: TxTypeId) -> bool {
        self.id
            .compare_exchange(0, id.0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Undo an [`assign`](Self::assign) of `id`. A no-op if the descriptor
    /// holds any other ID.
    pub(crate) fn unassign(&self, id: TxTypeId) {
        let _ = self
            .id
            .compare_exchange(id.0, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Object-safe view of a transaction type, used by registries and by
/// boundary adapters that only know a [`TxTypeId`].
pub trait AnyTransactionType: Send + Sync + std::fmt::Debug {
    /// Shared identity of this type.
    fn descriptor(&self) -> &TxDescriptor;

    /// Decode external bytes into a type-erased payload.
    ///
    /// # Errors
    ///
    /// [`TxError::SchemaNotConfigured`] or [`TxError::DecodeFailure`].
    fn decode_payload(&self, bytes: &[u8]) -> Result<Payload, TxError>;

    /// Clone into a shared trait object.
    fn clone_arc(&self) -> Arc<dyn AnyTransactionType>;

    fn name(&self) -> &str {
        self.descriptor().name()
    }

    fn id(&self) -> Option<TxTypeId> {
        self.descriptor().id()
    }
}

/// A named transaction type carrying payloads of type `T`.
pub struct TransactionType<T> {
    descriptor: Arc<TxDescriptor>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for TransactionType<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for TransactionType<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionType")
            .field("name", &self.descriptor.name)
            .field("id", &self.descriptor.id())
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: TxPayload> TransactionType<T> {
    /// Create an unregistered transaction type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: Arc::new(TxDescriptor::new(name.into())),
            _payload: PhantomData,
        }
    }

    /// Builder form of [`TransactionType::set_schema`].
    #[must_use]
    pub fn with_schema(self, schema: Schema) -> Self {
        self.set_schema(schema);
        self
    }

    /// Configure the external encoding used by
    /// [`TransactionType::decode_external_bytes`] and
    /// [`TransactionType::encode_external`].
    pub fn set_schema(&self, schema: Schema) {
        *self.descriptor.schema.write() = Some(schema);
    }

    /// Returns the transaction type name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the assigned ID, or `None` before registration.
    #[must_use]
    pub fn id(&self) -> Option<TxTypeId> {
        self.descriptor.id()
    }

    /// Returns `true` if `other` is this very type object (or a clone of it).
    #[must_use]
    pub fn same_type(&self, other: &TransactionType<T>) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
    }

    /// Decode a payload from external bytes using the configured schema.
    ///
    /// # Errors
    ///
    /// [`TxError::SchemaNotConfigured`] before [`TransactionType::set_schema`],
    /// [`TxError::DecodeFailure`] on malformed input.
    pub fn decode_external_bytes(&self, bytes: &[u8]) -> Result<T, TxError> {
        let schema = self.schema_or_err()?;
        schema.decode(bytes).map_err(|source| TxError::DecodeFailure {
            name: self.name().to_string(),
            source,
        })
    }

    /// Encode a payload for the outside world using the configured schema.
    ///
    /// # Errors
    ///
    /// [`TxError::SchemaNotConfigured`] or [`TxError::EncodeFailure`].
    pub fn encode_external(&self, value: &T) -> Result<Vec<u8>, TxError> {
        let schema = self.schema_or_err()?;
        schema.encode(value).map_err(|source| TxError::EncodeFailure {
            name: self.name().to_string(),
            source,
        })
    }

    /// Submit `value` to `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotRegistered`] if this type has no ID yet.
    pub fn add_to_queue(&self, queue: &TxQueue, value: T, signature: Signature) -> Result<(), TxError> {
        let id = self
            .id()
            .ok_or_else(|| TxError::NotRegistered(self.name().to_string()))?;
        queue.add_transaction(id, Arc::new(value), signature);
        Ok(())
    }

    fn schema_or_err(&self) -> Result<Schema, TxError> {
        self.descriptor
            .schema()
            .ok_or_else(|| TxError::SchemaNotConfigured(self.name().to_string()))
    }
}

impl<T: TxPayload> AnyTransactionType for TransactionType<T> {
    fn descriptor(&self) -> &TxDescriptor {
        &self.descriptor
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<Payload, TxError> {
        let value = self.decode_external_bytes(bytes)?;
        Ok(Arc::new(value))
    }

    fn clone_arc(&self) -> Arc<dyn AnyTransactionType> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct FooTx {
        x: u64,
        y: u64,
        name: String,
    }

    #[test]
    fn test_decode_before_schema_fails() {
        let tx = TransactionType::<FooTx>::new("foo");
        let err = tx.decode_external_bytes(&[]).unwrap_err();
        assert!(matches!(err, TxError::SchemaNotConfigured(ref name) if name == "foo"));
        assert!(
            err.to_string()
                .contains("without setting a schema first")
        );
    }

    #[test]
    fn test_encode_then_decode_after_schema() {
        let tx = TransactionType::<FooTx>::new("foo");
        tx.set_schema(Schema::MessagePack);
        let value = FooTx {
            x: 1,
            y: 2,
            name: "foo".into(),
        };
        let bytes = tx.encode_external(&value).unwrap();
        assert_eq!(tx.decode_external_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn test_malformed_bytes_fail_to_decode() {
        let tx = TransactionType::<FooTx>::new("foo").with_schema(Schema::Json);
        let err = tx.decode_external_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, TxError::DecodeFailure { .. }));
    }

    #[test]
    fn test_type_erased_decode_downcasts() {
        let tx = TransactionType::<FooTx>::new("foo").with_schema(Schema::MessagePackNamed);
        let value = FooTx {
            x: 7,
            y: 8,
            name: "bar".into(),
        };
        let bytes = tx.encode_external(&value).unwrap();
        let erased: &dyn AnyTransactionType = &tx;
        let payload = erased.decode_payload(&bytes).unwrap();
        assert_eq!(payload.downcast_ref::<FooTx>(), Some(&value));
    }

    #[test]
    fn test_clones_share_identity() {
        let tx = TransactionType::<FooTx>::new("foo");
        let copy = tx.clone();
        assert!(tx.same_type(&copy));
        assert!(tx.descriptor().assign(TxTypeId(4)));
        assert_eq!(copy.id(), Some(TxTypeId(4)));
        assert!(!copy.descriptor().assign(TxTypeId(5)));
        assert!(!tx.same_type(&TransactionType::new("foo")));
    }

    #[test]
    fn test_add_to_queue_requires_registration() {
        let tx = TransactionType::<FooTx>::new("foo");
        let queue = TxQueue::new();
        let value = FooTx {
            x: 0,
            y: 0,
            name: String::new(),
        };
        let err = tx
            .add_to_queue(&queue, value, Signature::default())
            .unwrap_err();
        assert!(matches!(err, TxError::NotRegistered(_)));
        assert_eq!(queue.pending(), 0);
    }
}
