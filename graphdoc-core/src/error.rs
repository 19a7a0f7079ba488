//! Error types and result types for graph store operations.
//!
//! This module provides error handling for all mapping and store operations.
//! Use [`GraphStoreResult<T>`] as the return type for fallible operations.
//!
//! Two failure classes from the mapping layer are deliberately *not* errors:
//! a class URI that cannot be resolved against the type registry (the
//! affected node materializes as `None`, partial graphs are allowed), and an
//! identifier segment that does not parse as an ObjectId (the address is
//! treated as identifier-less, enabling the trailing-empty "list" form).
//! Both surface as `Option` at the call site instead.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when mapping object graphs
/// to and from a document store.
///
/// This enum covers address validation, value conversion, serialization
/// failures, and backend-specific errors.
#[derive(Error, Debug)]
pub enum GraphStoreError {
    /// The address does not have the `database/collection/{id}` three-segment form.
    #[error("Invalid store address: {0}")]
    AddressFormat(String),
    /// The store or collection cannot be reached or does not exist.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// A stored value could not be converted to or from its typed form.
    /// Conversion failures are not locally recovered; they fail the whole
    /// load or save.
    #[error("Value conversion failed: {0}")]
    Conversion(String),
    /// The object graph or document structure could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for graph store operations.
///
/// This type alias is used throughout the crate to indicate operations that
/// may fail with a [`GraphStoreError`].
pub type GraphStoreResult<T> = Result<T, GraphStoreError>;

impl From<BsonError> for GraphStoreError {
    fn from(err: BsonError) -> Self {
        GraphStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for GraphStoreError {
    fn from(err: SerdeJsonError) -> Self {
        GraphStoreError::Serialization(err.to_string())
    }
}
