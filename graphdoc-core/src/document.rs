//! Reserved document keys and document-level helpers.
//!
//! Every persisted document carries a small set of reserved keys alongside
//! the mapped feature values. This module defines those keys and the helpers
//! used by the serializer and materializer to read and write them, as well
//! as utilities for converting documents between BSON and JSON formats.

use bson::{Bson, Document, doc, oid::ObjectId};
use serde_json::Value;

use crate::error::GraphStoreResult;

/// Store-assigned document identifier.
pub const ID_KEY: &str = "_id";

/// Serialized type identity of the mapped object (a globally resolvable class URI).
pub const ECLASS_KEY: &str = "_eClass";

/// Marks a sub-document as a reference placeholder rather than an embedded object.
pub const PROXY_KEY: &str = "_eProxyURI";

/// Optional externally-assigned stable identifier, distinct from [`ID_KEY`].
pub const EXTRINSIC_ID_KEY: &str = "_eId";

/// Last-write wall-clock marker in milliseconds.
pub const TIME_STAMP_KEY: &str = "_timeStamp";

/// Reads the store-assigned identifier from a document, if present.
pub fn identifier_of(document: &Document) -> Option<ObjectId> {
    match document.get(ID_KEY) {
        Some(Bson::ObjectId(id)) => Some(*id),
        _ => None,
    }
}

/// Builds a proxy descriptor: the two-key placeholder stored in place of an
/// embedded object when a reference is serialized as a link.
pub fn proxy_descriptor(proxy_uri: &str, class_uri: &str) -> Document {
    doc! {
        PROXY_KEY: proxy_uri,
        ECLASS_KEY: class_uri,
    }
}

/// Returns the proxy URI of a descriptor, or `None` when the document is an
/// embedded object. A value is either one or the other, never both.
pub fn proxy_uri_of(document: &Document) -> Option<&str> {
    match document.get(PROXY_KEY) {
        Some(Bson::String(uri)) => Some(uri),
        _ => None,
    }
}

/// Reads the class URI of a document or proxy descriptor.
pub fn class_uri_of(document: &Document) -> Option<&str> {
    match document.get(ECLASS_KEY) {
        Some(Bson::String(uri)) => Some(uri),
        _ => None,
    }
}

/// Converts a document to a JSON value.
///
/// # Errors
///
/// Returns an error if the document contains BSON types with no JSON
/// representation.
pub fn to_json(document: &Document) -> GraphStoreResult<Value> {
    Ok(serde_json::to_value(document)?)
}

/// Creates a document from a JSON value.
///
/// # Errors
///
/// Returns an error if the value is not a JSON object or cannot be
/// represented as BSON.
pub fn from_json(value: Value) -> GraphStoreResult<Document> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_of_reads_object_id() {
        let id = ObjectId::new();
        let doc = doc! { ID_KEY: id, "name": "x" };
        assert_eq!(identifier_of(&doc), Some(id));
    }

    #[test]
    fn identifier_of_ignores_non_object_id_values() {
        assert_eq!(identifier_of(&doc! { ID_KEY: "not-an-oid" }), None);
        assert_eq!(identifier_of(&doc! { "name": "x" }), None);
    }

    #[test]
    fn json_conversion_round_trips() {
        let document = doc! { ECLASS_KEY: "http://model#//Person", "name": "Alice", "scores": [1, 2] };
        let json = to_json(&document).unwrap();
        assert_eq!(json["name"], serde_json::json!("Alice"));
        assert_eq!(from_json(json).unwrap(), document);
    }

    #[test]
    fn proxy_descriptor_round_trips() {
        let descriptor = proxy_descriptor("../people/4d0a#/0", "http://model#//Person");
        assert_eq!(proxy_uri_of(&descriptor), Some("../people/4d0a#/0"));
        assert_eq!(class_uri_of(&descriptor), Some("http://model#//Person"));
        assert!(proxy_uri_of(&doc! { ECLASS_KEY: "http://model#//Person" }).is_none());
    }
}
