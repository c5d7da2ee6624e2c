//! Error handling for the ledger
//!
//! Every failure the ledger can report is a variant of [`LedgerError`]. I group
//! the variants into the classes callers actually act on through
//! [`LedgerError::kind`]: malformed input, invalid transactions, invalid block
//! linkage, fatal consistency violations, recoverable conditions (something is
//! missing and could be fetched) and environment failures (disk, config).

use crate::core::Hash;
use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Structurally invalid encoding or field values
    Malformed(String),
    /// A transaction failed a validity or witness check
    InvalidTransaction(String),
    /// A block does not link correctly onto its parent
    InvalidBlock(String),
    /// The ledger state contradicts itself; mutation halts
    Consistency(String),
    /// Sibling data needed for a proof is not held by this node
    ProofUnavailable(String),
    /// A proof or request reaches further back than retained history
    NotEnoughHistory(String),
    /// A block references a transaction this node does not have
    MissingTransaction(Hash),
    /// The parent of a candidate block is not in the tree
    UnknownParent(Hash),
    /// The block is already in the tree
    AlreadyKnown(Hash),
    /// A previous consistency failure stopped all further mutation
    Halted(String),
    /// Database-related errors
    Database(String),
    /// Encoding errors
    Serialization(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

/// The handling class of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    InvalidTransaction,
    InvalidLinkage,
    ConsistencyFatal,
    Recoverable,
    Environment,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Malformed(_) => ErrorKind::Malformed,
            LedgerError::InvalidTransaction(_) => ErrorKind::InvalidTransaction,
            LedgerError::InvalidBlock(_) => ErrorKind::InvalidLinkage,
            LedgerError::Consistency(_) | LedgerError::Halted(_) => ErrorKind::ConsistencyFatal,
            LedgerError::ProofUnavailable(_)
            | LedgerError::NotEnoughHistory(_)
            | LedgerError::MissingTransaction(_)
            | LedgerError::UnknownParent(_)
            | LedgerError::AlreadyKnown(_) => ErrorKind::Recoverable,
            LedgerError::Database(_)
            | LedgerError::Serialization(_)
            | LedgerError::Crypto(_)
            | LedgerError::Config(_)
            | LedgerError::Io(_) => ErrorKind::Environment,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::ConsistencyFatal
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Malformed(msg) => write!(f, "Malformed input: {msg}"),
            LedgerError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::Consistency(msg) => write!(f, "Consistency failure: {msg}"),
            LedgerError::ProofUnavailable(msg) => write!(f, "Proof unavailable: {msg}"),
            LedgerError::NotEnoughHistory(msg) => write!(f, "Not enough history: {msg}"),
            LedgerError::MissingTransaction(id) => write!(f, "Missing transaction: {id}"),
            LedgerError::UnknownParent(id) => write!(f, "Unknown parent block: {id}"),
            LedgerError::AlreadyKnown(id) => write!(f, "Block already known: {id}"),
            LedgerError::Halted(msg) => write!(f, "Ledger halted: {msg}"),
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

// Anything that fails to decode came from outside, so it is malformed input.
impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Malformed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
