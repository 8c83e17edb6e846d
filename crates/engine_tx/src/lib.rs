//! # engine_tx
//!
//! Typed transactions and the double-buffered queue that feeds them to the
//! tick scheduler.
//!
//! This crate provides:
//!
//! - [`transaction`]: [`TransactionType`], [`Signature`], and type-erased payloads.
//! - [`queue`]: [`TxQueue`], the frozen per-tick [`TxBatch`], and [`TypedView`].
//! - [`registry`]: [`TxRegistry`], which assigns [`TxTypeId`]s.
//! - [`schema`] and [`codec`]: the external encoding boundary.
//! - [`error`]: transaction-layer error types.

pub mod codec;
pub mod error;
pub mod queue;
pub mod registry;
pub mod schema;
pub mod transaction;

pub use codec::{decode, encode};
pub use error::{CodecError, TxError};
pub use queue::{TxBatch, TxEntry, TxQueue, TxRecord, TypedView};
pub use registry::TxRegistry;
pub use schema::Schema;
pub use transaction::{
    AnyTransactionType, Payload, Signature, TransactionType, TxDescriptor, TxPayload, TxTypeId,
};
