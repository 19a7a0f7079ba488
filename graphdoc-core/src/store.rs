//! The store front end: routing object-graph operations to a backend.
//!
//! [`GraphStore`] accepts addresses of the form
//! `{scheme}://{authority}/{database}/{collection}/{id?}` and routes store,
//! load, query, and delete operations: a save serializes the resource's
//! root and inserts or replaces its document; a load by identifier
//! materializes one document; a query compiles an expression to a filter
//! and materializes every match; a delete removes by identifier.
//!
//! The save protocol assigns identifiers exactly once: when the address has
//! no identifier, the document is inserted, the store-assigned identifier
//! is read back, and the resource address is rewritten to include it. The
//! new address and the write timestamp are reported in the outcome.

use std::sync::Arc;

use bson::{Bson, doc};
use chrono::Utc;

use crate::address::{BaseRelativeMapper, StoreAddress, StoreUri, UriMapper};
use crate::backend::StoreBackend;
use crate::document::{ID_KEY, TIME_STAMP_KEY};
use crate::error::{GraphStoreError, GraphStoreResult};
use crate::materialize::GraphMaterializer;
use crate::object::{ResourceId, ResourceSet};
use crate::query::{Expr, QueryCompiler};
use crate::serialize::GraphSerializer;

/// Options recognized by [`GraphStore::save`].
#[derive(Clone)]
pub struct SaveOptions {
    /// When `false` and the address already carries an identifier, the
    /// identifier is client-generated: the save inserts instead of
    /// replacing.
    pub generate_id: bool,
    /// Custom address translation for proxy URIs. Defaults to plain
    /// base-relative mapping scoped to the resource's own address.
    pub mapper: Option<Arc<dyn UriMapper>>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { generate_id: true, mapper: None }
    }
}

/// Options recognized by [`GraphStore::load`] and [`GraphStore::query`].
#[derive(Clone)]
pub struct LoadOptions {
    /// Whether query results are tagged as addressable proxies with their
    /// attributes populated. When `false`, results are materialized in
    /// full, untagged.
    pub proxy_attributes: bool,
    /// Custom address translation for proxy URIs. Defaults to plain
    /// base-relative mapping scoped to the resource's own address.
    pub mapper: Option<Arc<dyn UriMapper>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { proxy_attributes: true, mapper: None }
    }
}

/// The result of a save: the (possibly rewritten) resource address and the
/// stamped write time.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub uri: StoreUri,
    pub time_stamp: i64,
}

/// The result of a load or query: the populated resource and the mirrored
/// write time of the loaded document, when one was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub resource: ResourceId,
    pub time_stamp: Option<i64>,
}

/// A graph store bound to a backend implementation.
#[derive(Debug)]
pub struct GraphStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> GraphStore<B> {
    /// Creates a graph store over the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Serializes and stores the first root of a resource.
    ///
    /// # Errors
    ///
    /// Returns an error when the resource address is invalid or empty, a
    /// value does not convert, or the backend fails.
    pub async fn save(
        &self,
        set: &mut ResourceSet,
        resource: ResourceId,
        options: &SaveOptions,
    ) -> GraphStoreResult<SaveOutcome> {
        let uri = set.resource(resource).uri.clone();
        let address = StoreAddress::from_uri(&uri)?;

        // Without an identifier, a placeholder segment keeps relative proxy
        // addresses stable until the assigned identifier is known.
        if address.id.is_none() {
            set.resource_mut(resource).uri = uri.trim_segments(1).append_segment("-1");
        }

        let base = set.resource(resource).uri.clone();
        let mapper = options.mapper.clone().unwrap_or_else(|| BaseRelativeMapper::shared(base));

        let root = set.resource(resource).contents().first().copied().ok_or_else(|| {
            GraphStoreError::Serialization(format!("resource '{uri}' has no contents to save"))
        })?;

        let mut document = GraphSerializer::new(set, mapper.as_ref()).serialize(root)?;

        let time_stamp = Utc::now().timestamp_millis();
        document.insert(TIME_STAMP_KEY, Bson::Int64(time_stamp));
        set.resource_mut(resource).time_stamp = Some(time_stamp);

        let collection = address.collection_ref();

        match address.id {
            None => {
                tracing::debug!("inserting new document into {collection}");
                let id = self.backend.insert(&collection, document).await?;
                let new_uri =
                    set.resource(resource).uri.trim_segments(1).append_segment(&id.to_hex());
                set.resource_mut(resource).uri = new_uri.clone();
                Ok(SaveOutcome { uri: new_uri, time_stamp })
            }
            Some(id) => {
                document.insert(ID_KEY, id);
                if options.generate_id {
                    tracing::debug!("replacing document {id} in {collection}");
                    self.backend.replace(&collection, &id, document).await?;
                } else {
                    // A client-generated identifier: first save, insert.
                    tracing::debug!("inserting document {id} into {collection}");
                    self.backend.insert(&collection, document).await?;
                }
                Ok(SaveOutcome { uri, time_stamp })
            }
        }
    }

    /// Loads a single document by identifier into a new resource of the
    /// session. A missing document or an unresolvable class yields an empty
    /// resource, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the address is invalid or carries a query
    /// (use [`GraphStore::query`]), a stored value does not convert, or the
    /// backend fails.
    pub async fn load(
        &self,
        set: &mut ResourceSet,
        uri: StoreUri,
        options: &LoadOptions,
    ) -> GraphStoreResult<LoadOutcome> {
        if uri.query().is_some() {
            return Err(GraphStoreError::AddressFormat(format!(
                "address '{uri}' carries a query expression; load takes an identifier"
            )));
        }

        let address = StoreAddress::from_uri(&uri)?;
        let collection = address.collection_ref();
        let filter = doc! { ID_KEY: address.id.map_or(Bson::Null, Bson::ObjectId) };

        let mapper =
            options.mapper.clone().unwrap_or_else(|| BaseRelativeMapper::shared(uri.clone()));
        let resource = set.create_resource(uri);

        tracing::debug!("loading {filter:?} from {collection}");

        let mut time_stamp = None;

        if let Some(document) = self.backend.find_one(&collection, filter).await? {
            time_stamp = match document.get(TIME_STAMP_KEY) {
                Some(Bson::Int64(ms)) => Some(*ms),
                _ => None,
            };

            let root =
                GraphMaterializer::new(set, mapper.as_ref()).materialize(&document, None)?;
            if let Some(root) = root {
                set.attach(resource, root);
            }
            set.resource_mut(resource).time_stamp = time_stamp;
        }

        Ok(LoadOutcome { resource, time_stamp })
    }

    /// Compiles an expression, runs it against the addressed collection,
    /// and materializes every match as a root of a new resource.
    ///
    /// # Errors
    ///
    /// Returns an error when the address or expression is invalid, a stored
    /// value does not convert, or the backend fails.
    pub async fn query(
        &self,
        set: &mut ResourceSet,
        uri: StoreUri,
        expr: &Expr,
        options: &LoadOptions,
    ) -> GraphStoreResult<LoadOutcome> {
        let address = StoreAddress::from_uri(&uri)?;
        let collection = address.collection_ref();
        let filter = QueryCompiler::compile(expr)?;

        // Results address themselves relative to a placeholder identifier.
        let base = uri.trim_segments(1).append_segment("-1");
        let mapper = options.mapper.clone().unwrap_or_else(|| BaseRelativeMapper::shared(base));
        let resource = set.create_resource(uri);

        tracing::debug!("querying {collection} with {filter:?}");

        let documents = self.backend.find(&collection, filter).await?;
        let tag = options.proxy_attributes.then_some(address.collection.as_str());

        for document in &documents {
            let root = GraphMaterializer::new(set, mapper.as_ref()).materialize(document, tag)?;
            if let Some(root) = root {
                set.attach(resource, root);
            }
        }

        Ok(LoadOutcome { resource, time_stamp: None })
    }

    /// Removes the document at the given address. Removing an absent
    /// document is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the address is invalid or the backend fails.
    pub async fn delete(&self, uri: &StoreUri) -> GraphStoreResult<()> {
        let address = StoreAddress::from_uri(uri)?;
        let collection = address.collection_ref();
        let filter = doc! { ID_KEY: address.id.map_or(Bson::Null, Bson::ObjectId) };

        tracing::debug!("removing {filter:?} from {collection}");

        self.backend.remove(&collection, filter).await?;
        Ok(())
    }
}
