//! Error types for the schedz core library.

use thiserror::Error;

use crate::namespace::SymbolKind;

/// Top-level error type for all schedz operations.
#[derive(Error, Debug)]
pub enum SchedzError {
    /// A symbol name was registered twice in the same namespace.
    #[error("Duplicate {kind} symbol: {name}")]
    DuplicateSymbol {
        /// Which namespace rejected the name.
        kind: SymbolKind,
        /// The offending symbol.
        name: String,
    },

    /// A global ID is already held by another symbol of the same kind.
    #[error("{kind} id {id} is already held by {owner}")]
    GlobalIdTaken {
        /// Which namespace rejected the ID.
        kind: SymbolKind,
        /// Raw global ID.
        id: i32,
        /// Symbol already holding it.
        owner: String,
    },

    /// The condition namespace is full.
    #[error("Condition {name} exceeds the condition bit limit ({limit})")]
    ConditionLimit {
        /// Rejected condition.
        name: String,
        /// Number of distinguishable condition bits.
        limit: usize,
    },

    /// A class reused a local ID it had already bound.
    #[error("{class}: local {kind} id {local} is already bound to {existing}")]
    DuplicateLocalId {
        /// Owning class.
        class: String,
        /// Symbol kind of the local space.
        kind: SymbolKind,
        /// The reused local ID.
        local: u32,
        /// Symbol already holding that ID.
        existing: String,
    },

    /// A local ID would map onto a global ID claimed by someone else.
    #[error("{class}: local {kind} id {local} collides with global id {global} ({owner})")]
    IdRangeCollision {
        /// Owning class.
        class: String,
        /// Symbol kind of the local space.
        kind: SymbolKind,
        /// Local ID being registered.
        local: u32,
        /// Raw global ID it would occupy.
        global: i32,
        /// Symbol already occupying it.
        owner: String,
    },

    /// Local IDs must not go below the first ID a class registered.
    #[error("{class}: local {kind} id {local} is below the class base {base}")]
    LocalIdOutOfOrder {
        /// Owning class.
        class: String,
        /// Symbol kind of the local space.
        kind: SymbolKind,
        /// Rejected local ID.
        local: u32,
        /// First local ID of the class.
        base: u32,
    },

    /// No class ID space with this name or handle exists.
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// A task declared more parameters than a task can carry.
    #[error("Task declares {found} parameters (limit: {limit})")]
    TooManyParameters {
        /// Declared count.
        found: usize,
        /// Maximum allowed.
        limit: usize,
    },

    /// Schedule text could not be loaded.
    #[error("LoadSchd ({class}) line {line}: {message}")]
    ScheduleLoad {
        /// Class the text was loaded for.
        class: String,
        /// 1-based source line.
        line: u32,
        /// What went wrong.
        message: String,
    },

    /// A channel index outside the agent's channel list.
    #[error("Bad schedule channel: {0}")]
    InvalidChannel(usize),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SchedzError>;
