//! Double-buffered transaction queue.
//!
//! Submitters append to the **active** buffer under a short mutex. Once per
//! tick the scheduler swaps that buffer out, receiving it as an immutable
//! [`TxBatch`], and a fresh empty buffer takes its place. The swap is the only
//! point where submission and tick processing touch the same lock, and the
//! lock is never held while systems run.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::transaction::{Payload, Signature, TransactionType, TxPayload, TxTypeId};

/// One queued transaction.
#[derive(Debug, Clone)]
pub struct TxEntry {
    pub type_id: TxTypeId,
    pub payload: Payload,
    pub signature: Signature,
}

/// Accepts submissions from any thread and hands out one frozen batch per
/// tick.
#[derive(Debug, Default)]
pub struct TxQueue {
    active: Mutex<Vec<TxEntry>>,
    submitted: AtomicU64,
}

impl TxQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction to the active buffer.
    ///
    /// Holds the buffer lock only for the push, so this never waits on a
    /// running tick.
    pub fn add_transaction(&self, type_id: TxTypeId, payload: Payload, signature: Signature) {
        trace!(type_id = type_id.0, submitter = %signature.submitter_tag, nonce = signature.nonce, "queued transaction");
        self.active.lock().push(TxEntry {
            type_id,
            payload,
            signature,
        });
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Swap the active buffer for an empty one and return its contents as
    /// this tick's batch.
    ///
    /// Only the scheduler calls this, exactly once per tick.
    #[must_use]
    pub fn swap_and_get_processing(&self) -> TxBatch {
        let entries = std::mem::take(&mut *self.active.lock());
        TxBatch { entries }
    }

    /// Number of transactions waiting for the next tick.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.active.lock().len()
    }

    /// Total number of transactions ever submitted to this queue.
    #[must_use]
    pub fn total_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

/// The frozen set of transactions processed by one tick, in submission order.
#[derive(Debug, Default)]
pub struct TxBatch {
    entries: Vec<TxEntry>,
}

impl TxBatch {
    /// Returns the number of entries in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was submitted before the swap.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, TxEntry> {
        self.entries.iter()
    }

    /// Entries of one type ID, in submission order.
    pub fn entries_of(&self, type_id: TxTypeId) -> impl Iterator<Item = &TxEntry> + Clone {
        self.entries.iter().filter(move |entry| entry.type_id == type_id)
    }

    /// Number of entries of one type ID.
    #[must_use]
    pub fn count(&self, type_id: TxTypeId) -> usize {
        self.entries_of(type_id).count()
    }

    /// Typed view over the entries of `tx`. Empty if `tx` is unregistered.
    #[must_use]
    pub fn view<'a, T: TxPayload>(&'a self, tx: &TransactionType<T>) -> TypedView<'a, T> {
        TypedView {
            entries: self.entries.iter(),
            type_id: tx.id(),
            _payload: PhantomData,
        }
    }
}

impl<'a> IntoIterator for &'a TxBatch {
    type Item = &'a TxEntry;
    type IntoIter = std::slice::Iter<'a, TxEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A transaction payload together with its signature.
#[derive(Debug)]
pub struct TxRecord<'a, T> {
    pub value: &'a T,
    pub signature: &'a Signature,
}

impl<T> Clone for TxRecord<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TxRecord<'_, T> {}

impl<T> std::ops::Deref for TxRecord<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

/// Iterator over the payloads of a single transaction type within a batch.
///
/// Finite and read-only. Clone it to walk the same entries more than once.
pub struct TypedView<'a, T> {
    entries: std::slice::Iter<'a, TxEntry>,
    type_id: Option<TxTypeId>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            type_id: self.type_id,
            _payload: PhantomData,
        }
    }
}

impl<'a, T: 'static> Iterator for TypedView<'a, T> {
    type Item = TxRecord<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let type_id = self.type_id?;
        self.entries.by_ref().find_map(|entry| {
            if entry.type_id != type_id {
                return None;
            }
            entry.payload.downcast_ref::<T>().map(|value| TxRecord {
                value,
                signature: &entry.signature,
            })
        })
    }
}

impl<T: 'static> FusedIterator for TypedView<'_, T> {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct NewOwner {
        name: String,
    }

    fn registered(name: &str) -> TransactionType<NewOwner> {
        let tx = TransactionType::new(name);
        let mut registry = crate::TxRegistry::new();
        registry.register(&[&tx]).unwrap();
        assert_eq!(tx.id(), Some(TxTypeId(1)));
        tx
    }

    fn owner(name: &str) -> NewOwner {
        NewOwner { name: name.into() }
    }

    #[test]
    fn test_swap_freezes_batch_and_resets_active() {
        let queue = TxQueue::new();
        queue.add_transaction(TxTypeId(1), Arc::new(owner("a")), Signature::new("p", 1));
        queue.add_transaction(TxTypeId(1), Arc::new(owner("b")), Signature::new("p", 2));

        let batch = queue.swap_and_get_processing();
        queue.add_transaction(TxTypeId(1), Arc::new(owner("c")), Signature::new("p", 3));

        assert_eq!(batch.len(), 2);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.total_submitted(), 3);

        let next = queue.swap_and_get_processing();
        assert_eq!(next.len(), 1);
        assert!(queue.swap_and_get_processing().is_empty());
    }

    #[test]
    fn test_typed_view_filters_and_preserves_order() {
        let alpha = registered("alpha_tx");
        let queue = TxQueue::new();
        for (i, name) in ["x", "y", "z"].iter().enumerate() {
            alpha
                .add_to_queue(&queue, owner(name), Signature::new("p", i as u64))
                .unwrap();
            queue.add_transaction(TxTypeId(99), Arc::new(0u8), Signature::default());
        }

        let batch = queue.swap_and_get_processing();
        let names: Vec<&str> = batch.view(&alpha).map(|r| r.value.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        let nonces: Vec<u64> = batch.view(&alpha).map(|r| r.signature.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
        assert_eq!(batch.count(TxTypeId(99)), 3);
        assert_eq!(batch.len(), 6);
    }

    #[test]
    fn test_typed_view_is_restartable() {
        let alpha = registered("alpha_tx");
        let queue = TxQueue::new();
        alpha
            .add_to_queue(&queue, owner("only"), Signature::default())
            .unwrap();
        let batch = queue.swap_and_get_processing();

        let view = batch.view(&alpha);
        assert_eq!(view.clone().count(), 1);
        assert_eq!(view.count(), 1);
    }

    #[test]
    fn test_unregistered_type_views_nothing() {
        let queue = TxQueue::new();
        queue.add_transaction(TxTypeId(1), Arc::new(owner("a")), Signature::default());
        let batch = queue.swap_and_get_processing();
        let unregistered = TransactionType::<NewOwner>::new("ghost");
        assert_eq!(batch.view(&unregistered).count(), 0);
    }

    #[test]
    fn test_concurrent_submitters_lose_nothing() {
        let queue = Arc::new(TxQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for n in 0..250 {
                        queue.add_transaction(TxTypeId(1), Arc::new(n), Signature::new(format!("t{t}"), n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.swap_and_get_processing().len(), 2000);
    }
}
