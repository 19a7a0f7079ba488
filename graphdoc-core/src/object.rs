//! Dynamic typed objects, resources, and the session arena.
//!
//! Objects live in an arena owned by a [`ResourceSet`] and refer to each
//! other through copyable [`ObjId`] handles, so cyclic graphs never create
//! ownership cycles. A [`Resource`] is a storable unit: one address plus
//! the roots stored under it. The resource set is the unit of a load/save
//! session — it also owns the session-scoped proxy table used to
//! deduplicate stand-ins for cross-document targets. Sessions must not be
//! shared across concurrent loads of different resources.

use std::collections::HashMap;
use std::sync::Arc;

use crate::address::StoreUri;
use crate::meta::{ClassDef, FeatureKind, TypeRegistry};

/// A copyable handle to an object in a session arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(usize);

/// A copyable handle to a resource in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(usize);

/// A single attribute or reference value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    /// A reference to another object in the same session arena.
    Object(ObjId),
}

/// One element of a feature map: a dynamic feature (by its global URI)
/// paired with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMapEntry {
    pub feature: String,
    pub value: Value,
}

/// The stored state of one feature slot.
///
/// A slot that is absent from an object is *unset*, which is distinct from
/// a present slot holding [`Value::Null`] — that distinction carries the
/// explicit-null semantics of unsettable features.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Single(Value),
    Many(Vec<Value>),
    FeatureMap(Vec<FeatureMapEntry>),
}

/// A dynamic instance of a [`ClassDef`].
///
/// An object carrying a proxy URI is an address-only stand-in: the
/// unresolved half of the proxy state. Once a full object is materialized
/// for the same address, the host swaps handles through the session's proxy
/// table rather than mutating the stand-in's identity in place.
#[derive(Debug)]
pub struct TypedObject {
    class: Arc<ClassDef>,
    extrinsic_id: Option<String>,
    proxy_uri: Option<StoreUri>,
    slots: HashMap<String, SlotValue>,
}

impl TypedObject {
    fn new(class: Arc<ClassDef>) -> Self {
        Self { class, extrinsic_id: None, proxy_uri: None, slots: HashMap::new() }
    }

    /// The runtime type of this object.
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// The externally-assigned stable identifier, if any.
    pub fn extrinsic_id(&self) -> Option<&str> {
        self.extrinsic_id.as_deref()
    }

    pub fn set_extrinsic_id(&mut self, id: impl Into<String>) {
        self.extrinsic_id = Some(id.into());
    }

    /// Whether this object is an address-only proxy.
    pub fn is_proxy(&self) -> bool {
        self.proxy_uri.is_some()
    }

    pub fn proxy_uri(&self) -> Option<&StoreUri> {
        self.proxy_uri.as_ref()
    }

    pub fn set_proxy_uri(&mut self, uri: StoreUri) {
        self.proxy_uri = Some(uri);
    }

    /// Returns a feature slot, or `None` when the feature is unset.
    pub fn get(&self, feature: &str) -> Option<&SlotValue> {
        self.slots.get(feature)
    }

    /// Whether the feature has been set at all.
    pub fn is_set(&self, feature: &str) -> bool {
        self.slots.contains_key(feature)
    }

    /// Sets a single-valued feature. Setting [`Value::Null`] records an
    /// explicit null, which is distinguishable from never setting the slot.
    pub fn set(&mut self, feature: &str, value: Value) {
        self.slots.insert(feature.to_string(), SlotValue::Single(value));
    }

    /// Replaces the whole collection of a many-valued feature.
    pub fn set_many(&mut self, feature: &str, values: Vec<Value>) {
        self.slots.insert(feature.to_string(), SlotValue::Many(values));
    }

    /// Appends to a many-valued feature, creating the collection on first use.
    pub fn push(&mut self, feature: &str, value: Value) {
        match self
            .slots
            .entry(feature.to_string())
            .or_insert_with(|| SlotValue::Many(Vec::new()))
        {
            SlotValue::Many(values) => values.push(value),
            _ => {}
        }
    }

    /// Appends an entry to a feature-map slot, creating it on first use.
    pub fn push_entry(&mut self, feature: &str, entry: FeatureMapEntry) {
        match self
            .slots
            .entry(feature.to_string())
            .or_insert_with(|| SlotValue::FeatureMap(Vec::new()))
        {
            SlotValue::FeatureMap(entries) => entries.push(entry),
            _ => {}
        }
    }

    /// Returns the feature back to its unset state.
    pub fn unset(&mut self, feature: &str) {
        self.slots.remove(feature);
    }

    /// The value of a single-valued feature, if set.
    pub fn single(&self, feature: &str) -> Option<&Value> {
        match self.slots.get(feature) {
            Some(SlotValue::Single(value)) => Some(value),
            _ => None,
        }
    }

    /// The values of a many-valued feature, if set.
    pub fn many(&self, feature: &str) -> Option<&[Value]> {
        match self.slots.get(feature) {
            Some(SlotValue::Many(values)) => Some(values),
            _ => None,
        }
    }

    /// The entries of a feature-map slot, if set.
    pub fn entries(&self, feature: &str) -> Option<&[FeatureMapEntry]> {
        match self.slots.get(feature) {
            Some(SlotValue::FeatureMap(entries)) => Some(entries),
            _ => None,
        }
    }
}

/// A storable unit: an address plus the roots stored under it.
#[derive(Debug)]
pub struct Resource {
    pub uri: StoreUri,
    contents: Vec<ObjId>,
    /// Mirror of the document's `_timeStamp` after the last save or load.
    pub time_stamp: Option<i64>,
}

impl Resource {
    /// The root objects of this resource, in order.
    pub fn contents(&self) -> &[ObjId] {
        &self.contents
    }
}

/// A load/save session: the object arena, the resources taking part, the
/// registry handle, and the session-scoped proxy table.
#[derive(Debug)]
pub struct ResourceSet {
    registry: Arc<TypeRegistry>,
    objects: Vec<TypedObject>,
    resources: Vec<Resource>,
    proxies: HashMap<String, ObjId>,
}

impl ResourceSet {
    /// Creates a session over the given registry.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry, objects: Vec::new(), resources: Vec::new(), proxies: HashMap::new() }
    }

    /// The registry this session resolves types against.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Default-constructs an instance of the given class in the arena.
    pub fn create(&mut self, class: &Arc<ClassDef>) -> ObjId {
        self.objects.push(TypedObject::new(class.clone()));
        ObjId(self.objects.len() - 1)
    }

    pub fn object(&self, id: ObjId) -> &TypedObject {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjId) -> &mut TypedObject {
        &mut self.objects[id.0]
    }

    /// Creates an empty resource at the given address.
    pub fn create_resource(&mut self, uri: StoreUri) -> ResourceId {
        self.resources.push(Resource { uri, contents: Vec::new(), time_stamp: None });
        ResourceId(self.resources.len() - 1)
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn resource_mut(&mut self, id: ResourceId) -> &mut Resource {
        &mut self.resources[id.0]
    }

    /// Attaches an object as a root of a resource.
    pub fn attach(&mut self, resource: ResourceId, object: ObjId) {
        self.resources[resource.0].contents.push(object);
    }

    /// Looks up the session's stand-in for an absolute address.
    pub fn lookup_proxy(&self, uri: &str) -> Option<ObjId> {
        self.proxies.get(uri).copied()
    }

    /// Registers the session's stand-in for an absolute address.
    pub fn register_proxy(&mut self, uri: impl Into<String>, object: ObjId) {
        self.proxies.insert(uri.into(), object);
    }

    /// The resource that stores the object as a root, if any. Objects with
    /// a direct resource have an independent storage location.
    pub fn direct_resource(&self, object: ObjId) -> Option<ResourceId> {
        self.resources
            .iter()
            .position(|r| r.contents.contains(&object))
            .map(ResourceId)
    }

    /// Computes an object's address: proxies report their proxy URI, stored
    /// objects report their resource address plus a containment fragment
    /// path of the form `/rootIndex(/@feature.index)*`.
    pub fn uri_of(&self, object: ObjId) -> Option<StoreUri> {
        if let Some(uri) = self.object(object).proxy_uri() {
            return Some(uri.clone());
        }

        for resource in &self.resources {
            for (index, root) in resource.contents.iter().enumerate() {
                if let Some(fragment) = self.fragment_to(*root, object, format!("/{index}")) {
                    return Some(resource.uri.with_fragment(&fragment));
                }
            }
        }

        None
    }

    fn fragment_to(&self, from: ObjId, target: ObjId, path: String) -> Option<String> {
        if from == target {
            return Some(path);
        }

        let object = self.object(from);
        for feature in &object.class().features {
            match &feature.kind {
                FeatureKind::Reference { containment: true, .. } => match object.get(&feature.name)
                {
                    Some(SlotValue::Single(Value::Object(child))) => {
                        let step = format!("{path}/@{}", feature.name);
                        if let Some(found) = self.fragment_to(*child, target, step) {
                            return Some(found);
                        }
                    }
                    Some(SlotValue::Many(values)) => {
                        for (i, value) in values.iter().enumerate() {
                            if let Value::Object(child) = value {
                                let step = format!("{path}/@{}.{i}", feature.name);
                                if let Some(found) = self.fragment_to(*child, target, step) {
                                    return Some(found);
                                }
                            }
                        }
                    }
                    _ => {}
                },
                FeatureKind::FeatureMap => {
                    if let Some(SlotValue::FeatureMap(entries)) = object.get(&feature.name) {
                        for (i, entry) in entries.iter().enumerate() {
                            let contains = matches!(
                                self.registry.resolve_feature(&entry.feature),
                                Some((class, index))
                                    if matches!(
                                        class.features[index].kind,
                                        FeatureKind::Reference { containment: true, .. }
                                    )
                            );
                            if !contains {
                                continue;
                            }
                            if let Value::Object(child) = entry.value {
                                let step = format!("{path}/@{}.{i}", feature.name);
                                if let Some(found) = self.fragment_to(child, target, step) {
                                    return Some(found);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        None
    }
}
