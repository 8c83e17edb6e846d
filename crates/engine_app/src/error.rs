//! World-level error types.

use engine_component::StoreError;
use engine_tx::TxError;

/// Errors returned by [`World`](crate::World) lifecycle and tick operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A system or read name is already taken, or repeated within one
    /// registration call.
    #[error("{0:?} is already registered")]
    DuplicateRegistration(String),

    /// A registration call was made after `load_game_state`.
    #[error("cannot {0} after the game state has been loaded")]
    RegistrationClosed(&'static str),

    /// `tick` was called before `load_game_state`.
    #[error("the game state has not been loaded")]
    NotLoaded,

    /// A system returned an error; the rest of the tick was skipped.
    #[error("system {system:?} failed at tick {tick}: {source}")]
    SystemFailure {
        system: String,
        tick: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The tick rate cannot produce a usable, non-zero tick budget.
    #[error("invalid tick rate {0}: must be a finite number of ticks per second above zero")]
    InvalidTickRate(f64),

    /// No transaction type carries this ID.
    #[error("no transaction type with ID {0} is registered")]
    UnknownTransactionType(u32),

    /// No read handler carries this name.
    #[error("no read with name {0:?} is registered")]
    UnknownRead(String),

    /// A read handler returned an error.
    #[error("read {name:?} failed: {source}")]
    ReadFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tx(#[from] TxError),
}

impl WorldError {
    /// Returns `true` for a duplicate registration of a system, component,
    /// transaction type, or read.
    #[must_use]
    pub fn is_duplicate_registration(&self) -> bool {
        matches!(
            self,
            WorldError::DuplicateRegistration(_)
                | WorldError::Store(StoreError::DuplicateRegistration(_))
                | WorldError::Tx(TxError::DuplicateRegistration(_))
        )
    }
}
