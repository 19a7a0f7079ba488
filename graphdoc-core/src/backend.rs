//! Storage backend abstraction: the driver surface the mapping engine
//! delegates to.
//!
//! The engine needs exactly five collection-scoped operations from a
//! document store: insert, replace, find-one, find-by-filter, and
//! find-and-remove. Everything above single-document granularity
//! (transactions, retries, reconnection) belongs to the backend
//! implementation or its driver, not to this layer — every call here is
//! treated as blocking and atomic at document granularity.
//!
//! Implementations must be thread-safe (`Send + Sync`) and are expected to
//! support concurrent per-document operations; the engine adds no locking
//! of its own.

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::fmt::Debug;

use crate::address::CollectionRef;
use crate::error::GraphStoreResult;

/// Abstract interface for document storage backends.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document into a collection and returns its identifier.
    ///
    /// When the document has no `_id`, the backend assigns one; a document
    /// arriving with an `_id` (a client-generated identifier) is stored
    /// under it.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection cannot be reached or a document
    /// with the same identifier already exists.
    async fn insert(
        &self,
        collection: &CollectionRef,
        document: Document,
    ) -> GraphStoreResult<ObjectId>;

    /// Replaces the document with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection does not exist or holds no
    /// document with that identifier.
    async fn replace(
        &self,
        collection: &CollectionRef,
        id: &ObjectId,
        document: Document,
    ) -> GraphStoreResult<()>;

    /// Finds the first document matching a filter, or `None`.
    async fn find_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Option<Document>>;

    /// Finds all documents matching a filter.
    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Vec<Document>>;

    /// Removes the first document matching a filter and returns it, or
    /// `None` when nothing matched.
    async fn remove(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Option<Document>>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert(
        &self,
        collection: &CollectionRef,
        document: Document,
    ) -> GraphStoreResult<ObjectId> {
        (*self).insert(collection, document).await
    }

    async fn replace(
        &self,
        collection: &CollectionRef,
        id: &ObjectId,
        document: Document,
    ) -> GraphStoreResult<()> {
        (*self)
            .replace(collection, id, document)
            .await
    }

    async fn find_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Option<Document>> {
        (*self).find_one(collection, filter).await
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Vec<Document>> {
        (*self).find(collection, filter).await
    }

    async fn remove(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Option<Document>> {
        (*self).remove(collection, filter).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> GraphStoreResult<Self::Backend>;
}
