//! Transaction type registry.
//!
//! Assigns [`TxTypeId`]s in registration order and keeps every registered
//! type addressable by ID and by name.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::TxError;
use crate::transaction::{AnyTransactionType, TxTypeId};

/// Registry of every transaction type known to a world.
#[derive(Debug, Default)]
pub struct TxRegistry {
    /// Registered types; `types[i]` has ID `i + 1`.
    types: Vec<Arc<dyn AnyTransactionType>>,
    by_name: HashMap<String, TxTypeId>,
}

impl TxRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of transaction types, assigning ascending IDs in
    /// slice order.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::DuplicateRegistration`] if a name is already
    /// registered, appears twice in `types`, or a type object already carries
    /// an ID. No type in the batch is registered in that case.
    pub fn register(&mut self, types: &[&dyn AnyTransactionType]) -> Result<Vec<TxTypeId>, TxError> {
        let mut batch_names: Vec<&str> = Vec::with_capacity(types.len());
        for ty in types {
            let name = ty.name();
            if self.by_name.contains_key(name) || batch_names.contains(&name) {
                return Err(TxError::DuplicateRegistration(name.to_string()));
            }
            batch_names.push(name);
        }

        // Claim every ID before touching the registry. A type object already
        // claimed by any registry fails the claim, and the batch is released.
        let next = self.types.len() as u32 + 1;
        let mut claimed = Vec::with_capacity(types.len());
        for (offset, ty) in types.iter().enumerate() {
            let id = TxTypeId(next + offset as u32);
            if !ty.descriptor().assign(id) {
                for (prev, prev_id) in types.iter().zip(&claimed) {
                    prev.descriptor().unassign(*prev_id);
                }
                return Err(TxError::DuplicateRegistration(ty.name().to_string()));
            }
            claimed.push(id);
        }

        for (ty, &id) in types.iter().zip(&claimed) {
            debug!(name = ty.name(), type_id = id.0, "registered transaction type");
            self.by_name.insert(ty.name().to_string(), id);
            self.types.push(ty.clone_arc());
        }
        Ok(claimed)
    }

    /// Look up a type by ID.
    #[must_use]
    pub fn get(&self, id: TxTypeId) -> Option<&Arc<dyn AnyTransactionType>> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.types.get(index)
    }

    /// Look up a type by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<dyn AnyTransactionType>> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// All registered types in ID order.
    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn AnyTransactionType>> {
        self.types.iter()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::transaction::TransactionType;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct SomeTx {
        x: i32,
        y: i32,
        z: i32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct OtherTx {
        alpha: String,
        beta: String,
    }

    #[test]
    fn test_ids_ascend_in_registration_order() {
        let mut registry = TxRegistry::new();
        let a = TransactionType::<SomeTx>::new("a");
        let b = TransactionType::<OtherTx>::new("b");
        let c = TransactionType::<SomeTx>::new("c");

        let ids = registry.register(&[&a, &b]).unwrap();
        assert_eq!(ids, vec![TxTypeId(1), TxTypeId(2)]);
        registry.register(&[&c]).unwrap();
        assert_eq!(c.id(), Some(TxTypeId(3)));

        let names: Vec<&str> = registry.list().map(|ty| ty.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.get(TxTypeId(2)).unwrap().name(), "b");
        assert_eq!(registry.get_by_name("c").unwrap().id(), Some(TxTypeId(3)));
        assert!(registry.get(TxTypeId(0)).is_none());
    }

    #[test]
    fn test_duplicate_names_fail_regardless_of_payload() {
        let mut registry = TxRegistry::new();
        let alpha = TransactionType::<SomeTx>::new("name_match");
        let beta = TransactionType::<OtherTx>::new("name_match");
        let err = registry.register(&[&alpha, &beta]).unwrap_err();
        assert!(matches!(err, TxError::DuplicateRegistration(ref n) if n == "name_match"));
        // All or nothing: the first entry was not registered either.
        assert!(alpha.id().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_same_object_twice_in_one_call() {
        let mut registry = TxRegistry::new();
        let tx = TransactionType::<SomeTx>::new("modify_score");
        assert!(matches!(
            registry.register(&[&tx, &tx]),
            Err(TxError::DuplicateRegistration(_))
        ));
        assert!(tx.id().is_none());
    }

    #[test]
    fn test_same_object_in_separate_calls() {
        let mut registry = TxRegistry::new();
        let tx = TransactionType::<SomeTx>::new("modify_score");
        registry.register(&[&tx]).unwrap();
        assert!(matches!(
            registry.register(&[&tx]),
            Err(TxError::DuplicateRegistration(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_object_registered_elsewhere_is_rejected() {
        let tx = TransactionType::<SomeTx>::new("shared");
        TxRegistry::new().register(&[&tx]).unwrap();
        let mut other = TxRegistry::new();
        assert!(other.register(&[&tx]).is_err());
    }

    #[test]
    fn test_claim_failure_releases_earlier_ids() {
        let taken = TransactionType::<OtherTx>::new("taken");
        TxRegistry::new().register(&[&taken]).unwrap();

        let fresh = TransactionType::<SomeTx>::new("fresh");
        let mut registry = TxRegistry::new();
        let err = registry.register(&[&fresh, &taken]).unwrap_err();
        assert!(matches!(err, TxError::DuplicateRegistration(ref n) if n == "taken"));
        assert!(fresh.id().is_none());
        assert!(registry.is_empty());
        assert_eq!(taken.id(), Some(TxTypeId(1)));

        // The released type registers cleanly afterwards.
        assert_eq!(registry.register(&[&fresh]).unwrap(), vec![TxTypeId(1)]);
    }
}
