//! Graph-to-document serialization.
//!
//! [`GraphSerializer`] turns a typed object and everything it owns into a
//! single document. The embed-versus-link decision is made per reference:
//! non-containment references always serialize as proxy descriptors, and so
//! do containment references that resolve proxies when their target has an
//! independent storage location (its own resource, or an unresolved proxy
//! address). Everything else is embedded by full recursion — there is no
//! depth limit, so cyclic containment graphs are the caller's to avoid;
//! non-containment and proxy-resolving edges are what break cycles.
//!
//! Serialization never resolves proxies: an unresolved target contributes
//! its proxy address as-is.

use bson::{Bson, Document, doc};

use crate::address::UriMapper;
use crate::convert;
use crate::document::{ECLASS_KEY, EXTRINSIC_ID_KEY, proxy_descriptor};
use crate::error::{GraphStoreError, GraphStoreResult};
use crate::meta::{FeatureDef, FeatureKind, ValueType};
use crate::object::{ObjId, ResourceSet, SlotValue, Value};

/// Serializes objects of one session, deresolving proxy addresses through
/// the given mapper.
pub struct GraphSerializer<'a> {
    set: &'a ResourceSet,
    mapper: &'a dyn UriMapper,
}

impl<'a> GraphSerializer<'a> {
    pub fn new(set: &'a ResourceSet, mapper: &'a dyn UriMapper) -> Self {
        Self { set, mapper }
    }

    /// Serializes one object (and, recursively, everything embedded in it)
    /// into a document.
    ///
    /// # Errors
    ///
    /// Returns an error when a value does not convert to its stored form or
    /// a reference target has no resolvable address.
    pub fn serialize(&self, object: ObjId) -> GraphStoreResult<Document> {
        let obj = self.set.object(object);
        let class = obj.class().clone();

        let mut document = Document::new();
        document.insert(ECLASS_KEY, class.uri.clone());

        if let Some(id) = obj.extrinsic_id() {
            document.insert(EXTRINSIC_ID_KEY, id);
        }

        // Attributes and feature maps first, then references, each in
        // declaration order.
        for feature in &class.features {
            if feature.transient {
                continue;
            }
            match &feature.kind {
                FeatureKind::Attribute { value_type, derived_id } => {
                    if *derived_id {
                        continue;
                    }
                    self.serialize_attribute(object, feature, value_type, &mut document)?;
                }
                FeatureKind::FeatureMap => {
                    self.serialize_feature_map(object, feature, &mut document)?;
                }
                FeatureKind::Reference { .. } => {}
            }
        }

        for feature in &class.features {
            if feature.transient {
                continue;
            }
            if let FeatureKind::Reference { containment, resolve_proxies } = feature.kind {
                self.serialize_reference_slot(
                    object,
                    feature,
                    containment,
                    resolve_proxies,
                    &mut document,
                )?;
            }
        }

        Ok(document)
    }

    fn serialize_attribute(
        &self,
        object: ObjId,
        feature: &FeatureDef,
        value_type: &ValueType,
        document: &mut Document,
    ) -> GraphStoreResult<()> {
        let stored = match self.set.object(object).get(&feature.name) {
            None => return Ok(()),
            Some(SlotValue::Single(value)) => convert::to_bson(value_type, value)?,
            Some(SlotValue::Many(values)) if value_type.is_native() => Bson::Array(
                values
                    .iter()
                    .map(|v| convert::to_bson(value_type, v))
                    .collect::<GraphStoreResult<Vec<_>>>()?,
            ),
            Some(SlotValue::Many(values)) => Bson::Array(
                values
                    .iter()
                    .map(|v| convert::to_literal(value_type, v).map(Bson::String))
                    .collect::<GraphStoreResult<Vec<_>>>()?,
            ),
            Some(SlotValue::FeatureMap(_)) => {
                return Err(GraphStoreError::Serialization(format!(
                    "attribute '{}' holds feature-map entries",
                    feature.name
                )));
            }
        };

        document.insert(feature.name.clone(), stored);
        Ok(())
    }

    fn serialize_feature_map(
        &self,
        object: ObjId,
        feature: &FeatureDef,
        document: &mut Document,
    ) -> GraphStoreResult<()> {
        let entries = match self.set.object(object).get(&feature.name) {
            None => return Ok(()),
            Some(SlotValue::FeatureMap(entries)) => entries,
            Some(_) => {
                return Err(GraphStoreError::Serialization(format!(
                    "feature map '{}' holds a plain value",
                    feature.name
                )));
            }
        };

        let mut stored = Vec::with_capacity(entries.len());

        for entry in entries {
            let (class, index) =
                self.set.registry().resolve_feature(&entry.feature).ok_or_else(|| {
                    GraphStoreError::Serialization(format!(
                        "unresolvable feature-map key '{}'",
                        entry.feature
                    ))
                })?;
            let entry_feature = &class.features[index];

            let value = match &entry_feature.kind {
                FeatureKind::Attribute { value_type, .. } => {
                    convert::to_bson(value_type, &entry.value)?
                }
                FeatureKind::Reference { containment, resolve_proxies } => match &entry.value {
                    Value::Object(target) => {
                        self.serialize_reference(*containment, *resolve_proxies, *target)?
                    }
                    Value::Null => Bson::Null,
                    other => {
                        return Err(GraphStoreError::Conversion(format!(
                            "feature-map reference entry '{}' holds {other:?}",
                            entry.feature
                        )));
                    }
                },
                FeatureKind::FeatureMap => {
                    return Err(GraphStoreError::Serialization(format!(
                        "feature-map entry '{}' names a feature map",
                        entry.feature
                    )));
                }
            };

            stored.push(Bson::Document(doc! { "key": entry.feature.clone(), "value": value }));
        }

        document.insert(feature.name.clone(), stored);
        Ok(())
    }

    fn serialize_reference_slot(
        &self,
        object: ObjId,
        feature: &FeatureDef,
        containment: bool,
        resolve_proxies: bool,
        document: &mut Document,
    ) -> GraphStoreResult<()> {
        let stored = match self.set.object(object).get(&feature.name) {
            None => return Ok(()),
            // A null single-valued reference omits the key; the explicit
            // null of an unsettable feature is the one exception.
            Some(SlotValue::Single(Value::Null)) => {
                if feature.unsettable {
                    document.insert(feature.name.clone(), Bson::Null);
                }
                return Ok(());
            }
            Some(SlotValue::Single(Value::Object(target))) => {
                self.serialize_reference(containment, resolve_proxies, *target)?
            }
            Some(SlotValue::Many(values)) => Bson::Array(
                values
                    .iter()
                    .map(|value| match value {
                        Value::Object(target) => {
                            self.serialize_reference(containment, resolve_proxies, *target)
                        }
                        Value::Null => Ok(Bson::Null),
                        other => Err(GraphStoreError::Conversion(format!(
                            "reference '{}' holds {other:?}",
                            feature.name
                        ))),
                    })
                    .collect::<GraphStoreResult<Vec<_>>>()?,
            ),
            Some(other) => {
                return Err(GraphStoreError::Conversion(format!(
                    "reference '{}' holds {other:?}",
                    feature.name
                )));
            }
        };

        document.insert(feature.name.clone(), stored);
        Ok(())
    }

    /// The embed-versus-link rule, applied identically on every recursion.
    fn serialize_reference(
        &self,
        containment: bool,
        resolve_proxies: bool,
        target: ObjId,
    ) -> GraphStoreResult<Bson> {
        let tgt = self.set.object(target);
        let has_own_location = tgt.is_proxy() || self.set.direct_resource(target).is_some();

        if !containment || (resolve_proxies && has_own_location) {
            let uri = self.set.uri_of(target).ok_or_else(|| {
                GraphStoreError::Serialization(
                    "reference target has no resolvable address".to_string(),
                )
            })?;
            let relative = self.mapper.deresolve(&uri);
            Ok(Bson::Document(proxy_descriptor(&relative.to_string(), &tgt.class().uri)))
        } else {
            Ok(Bson::Document(self.serialize(target)?))
        }
    }
}
