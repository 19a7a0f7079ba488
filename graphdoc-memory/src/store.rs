//! In-memory storage implementation for graph stores.
//!
//! Documents are stored as BSON in nested HashMaps behind an async-aware
//! read-write lock: collection reference to identifier to document. Filters
//! are evaluated by scanning the collection, which is fine for the sizes
//! this backend is meant for (development, testing, fixtures).
//!
//! The store is cloneable; clones share the same underlying data.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use mea::rwlock::RwLock;

use graphdoc_core::{
    address::CollectionRef,
    backend::{StoreBackend, StoreBackendBuilder},
    document::{ID_KEY, identifier_of},
    error::{GraphStoreError, GraphStoreResult},
};

use crate::matcher::matches;

type DocumentMap = HashMap<String, Document>;
type StoreMap = HashMap<String, DocumentMap>;

/// Thread-safe in-memory document storage backend.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert(
        &self,
        collection: &CollectionRef,
        mut document: Document,
    ) -> GraphStoreResult<ObjectId> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        let id = identifier_of(&document).unwrap_or_else(ObjectId::new);
        document.insert(ID_KEY, id);

        let key = id.to_hex();
        if documents.contains_key(&key) {
            return Err(GraphStoreError::Backend(format!(
                "document {key} already exists in {collection}"
            )));
        }

        tracing::trace!("inserted {key} into {collection}");
        documents.insert(key, document);
        Ok(id)
    }

    async fn replace(
        &self,
        collection: &CollectionRef,
        id: &ObjectId,
        mut document: Document,
    ) -> GraphStoreResult<()> {
        let mut store = self.store.write().await;
        let documents = store.get_mut(&collection.to_string()).ok_or_else(|| {
            GraphStoreError::StoreUnavailable(format!("no collection {collection}"))
        })?;

        let key = id.to_hex();
        if !documents.contains_key(&key) {
            return Err(GraphStoreError::Backend(format!(
                "document {key} not found in {collection}"
            )));
        }

        document.insert(ID_KEY, *id);
        documents.insert(key, document);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Option<Document>> {
        let store = self.store.read().await;

        Ok(store.get(&collection.to_string()).and_then(|documents| {
            documents
                .values()
                .find(|document| matches(&filter, document))
                .cloned()
        }))
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Vec<Document>> {
        let store = self.store.read().await;

        Ok(store
            .get(&collection.to_string())
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| matches(&filter, document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove(
        &self,
        collection: &CollectionRef,
        filter: Document,
    ) -> GraphStoreResult<Option<Document>> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(&collection.to_string()) {
            Some(documents) => documents,
            None => return Ok(None),
        };

        let key = documents
            .iter()
            .find(|(_, document)| matches(&filter, document))
            .map(|(key, _)| key.clone());

        Ok(key.and_then(|key| documents.remove(&key)))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> GraphStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
