//! The reflective meta-model: classes, features, and the type registry.
//!
//! The mapping engine never hard-codes a model. Every object carries a
//! handle to a [`ClassDef`] describing its ordered feature list, and every
//! serialized document records the class URI so the object can be
//! reconstructed later. The [`TypeRegistry`] resolves those URIs back to
//! live class handles; it is read-mostly state that is always passed
//! explicitly, so tests can substitute fixture registries.
//!
//! Registries can be built programmatically or deserialized from JSON,
//! which is the usual way tests and hosts describe their models.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GraphStoreResult;

/// The value-type category of an attribute.
///
/// Every category except [`ValueType::Custom`] is natively representable by
/// the document store. Custom values are carried in their canonical,
/// round-trippable string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Byte,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Date,
    Custom,
}

impl ValueType {
    /// Whether values of this category are stored natively rather than as
    /// converted strings.
    pub fn is_native(&self) -> bool {
        !matches!(self, ValueType::Custom)
    }
}

/// The closed set of feature kinds the engine dispatches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// A scalar or scalar-collection slot.
    Attribute {
        value_type: ValueType,
        /// A derived identifier is implied by `_id`/structure and never
        /// re-serialized.
        #[serde(default)]
        derived_id: bool,
    },
    /// A pointer to another typed object.
    Reference {
        /// Owning (`true`) vs. pointing (`false`).
        containment: bool,
        /// Whether dereferencing through this slot forces immediate
        /// materialization of proxy targets.
        #[serde(default)]
        resolve_proxies: bool,
    },
    /// An ordered, heterogeneous slot of (dynamic feature, value) pairs.
    FeatureMap,
}

/// A named, typed slot declared on a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    /// Single (`false`) or many (`true`) multiplicity.
    #[serde(default)]
    pub many: bool,
    /// Transient features are never persisted.
    #[serde(default)]
    pub transient: bool,
    /// Unsettable features distinguish "explicitly set to null" from
    /// "never set".
    #[serde(default)]
    pub unsettable: bool,
    pub kind: FeatureKind,
}

impl FeatureDef {
    /// Whether this feature is an attribute.
    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, FeatureKind::Attribute { .. })
    }

    /// Whether this feature is a reference.
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FeatureKind::Reference { .. })
    }
}

/// A polymorphic runtime type: a globally resolvable URI, a name, and the
/// ordered list of declared features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Global type identity, stored under `_eClass`.
    pub uri: String,
    pub name: String,
    pub features: Vec<FeatureDef>,
}

impl ClassDef {
    /// Looks up a declared feature by name.
    pub fn feature(&self, name: &str) -> Option<&FeatureDef> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Returns the globally resolvable URI of a declared feature, used as
    /// the `key` of feature-map entries.
    pub fn feature_uri(&self, feature: &FeatureDef) -> String {
        format!("{}/{}", self.uri, feature.name)
    }
}

/// Resolves class and feature URIs to live handles.
///
/// Lookup failure is absence, not an error: a document whose `_eClass`
/// cannot be resolved materializes as nothing, and the rest of the graph
/// load proceeds.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    classes: HashMap<String, Arc<ClassDef>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class and returns its shared handle.
    pub fn register(&mut self, class: ClassDef) -> Arc<ClassDef> {
        let class = Arc::new(class);
        self.classes.insert(class.uri.clone(), class.clone());
        class
    }

    /// Resolves a class URI.
    pub fn resolve_class(&self, uri: &str) -> Option<Arc<ClassDef>> {
        self.classes.get(uri).cloned()
    }

    /// Resolves a feature URI of the form `{class-uri}/{feature-name}` to
    /// the owning class and the feature's index in its declaration order.
    pub fn resolve_feature(&self, uri: &str) -> Option<(Arc<ClassDef>, usize)> {
        let (class_uri, feature_name) = uri.rsplit_once('/')?;
        let class = self.resolve_class(class_uri)?;
        let index = class.features.iter().position(|f| f.name == feature_name)?;
        Some((class, index))
    }

    /// Builds a registry from a JSON array of class definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not deserialize into class
    /// definitions.
    pub fn from_json(json: &str) -> GraphStoreResult<Self> {
        let classes: Vec<ClassDef> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for class in classes {
            registry.register(class);
        }
        Ok(registry)
    }
}
