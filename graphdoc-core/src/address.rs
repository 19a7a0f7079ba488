//! Store addresses and relative reference handling.
//!
//! Objects are addressed by URIs of the form
//! `scheme://authority/database/collection/{id}`, where the identifier
//! segment is optional the first time an object is saved. When building
//! queries, no identifier is given, but the path must still have three
//! segments — a trailing `/` after the collection keeps the empty segment.
//!
//! [`StoreUri`] is the minimal URI value type used throughout the crate:
//! parse/display, segment editing, and relative reference resolution and
//! deresolution. [`StoreAddress`] is the validated three-segment form.
//! [`UriMapper`] is the capability that translates between absolute object
//! addresses and addresses relative to the resource being saved or loaded;
//! proxy URIs are stored in the relative form.

use std::fmt;
use std::sync::Arc;

use bson::oid::ObjectId;

use crate::error::{GraphStoreError, GraphStoreResult};

/// A parsed URI: optional scheme and authority, path segments, optional
/// query and fragment.
///
/// Path segments are kept verbatim, including a trailing empty segment for
/// paths ending in `/`. This matters: `data/people/` has three segments and
/// is a valid identifier-less address, while `data/people` has two and is
/// not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreUri {
    scheme: Option<String>,
    authority: Option<String>,
    segments: Vec<String>,
    query: Option<String>,
    fragment: Option<String>,
}

impl StoreUri {
    /// Parses a URI string. Parsing is lenient: any string yields a URI,
    /// validation happens when an address is derived from it.
    pub fn parse(input: &str) -> Self {
        let (rest, fragment) = match input.split_once('#') {
            Some((r, f)) => (r, Some(f.to_string())),
            None => (input, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q.to_string())),
            None => (rest, None),
        };

        let (scheme, authority, path) = match rest.split_once("://") {
            Some((scheme, tail)) => match tail.split_once('/') {
                Some((authority, path)) => {
                    (Some(scheme.to_string()), Some(authority.to_string()), path)
                }
                None => (Some(scheme.to_string()), Some(tail.to_string()), ""),
            },
            None => (None, None, rest),
        };

        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').map(str::to_string).collect()
        };

        Self { scheme, authority, segments, query, fragment }
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the raw (still percent-encoded) query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the fragment, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns the percent-decoded query string, if any.
    pub fn decoded_query(&self) -> Option<String> {
        self.query.as_deref().map(percent_decode)
    }

    /// Returns a copy of this URI with the last `count` segments removed.
    pub fn trim_segments(&self, count: usize) -> Self {
        let mut uri = self.clone();
        let keep = uri.segments.len().saturating_sub(count);
        uri.segments.truncate(keep);
        uri
    }

    /// Returns a copy of this URI with one segment appended.
    pub fn append_segment(&self, segment: &str) -> Self {
        let mut uri = self.clone();
        uri.segments.push(segment.to_string());
        uri
    }

    /// Returns a copy of this URI with the given fragment.
    pub fn with_fragment(&self, fragment: &str) -> Self {
        let mut uri = self.clone();
        uri.fragment = Some(fragment.to_string());
        uri
    }

    /// Whether this URI carries a scheme (an absolute reference).
    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }

    /// Resolves this (possibly relative) reference against a base URI.
    ///
    /// An absolute reference is returned unchanged. Otherwise the reference
    /// is interpreted relative to the base's directory (its path minus the
    /// last segment), with `..` and `.` segments normalized away. Scheme and
    /// authority come from the base; query and fragment from the reference.
    pub fn resolve_against(&self, base: &StoreUri) -> StoreUri {
        if self.is_absolute() {
            return self.clone();
        }

        // A path-less reference points into the base document itself.
        if self.segments.is_empty() {
            let mut resolved = base.clone();
            resolved.query = self.query.clone();
            resolved.fragment = self.fragment.clone();
            return resolved;
        }

        let dir = base.segments.len().saturating_sub(1);
        let mut segments: Vec<String> = base.segments[..dir].to_vec();

        for segment in &self.segments {
            match segment.as_str() {
                ".." => {
                    segments.pop();
                }
                "." => {}
                other => segments.push(other.to_string()),
            }
        }

        StoreUri {
            scheme: base.scheme.clone(),
            authority: base.authority.clone(),
            segments,
            query: self.query.clone(),
            fragment: self.fragment.clone(),
        }
    }

    /// Deresolves this absolute URI into a reference relative to the base's
    /// directory. When scheme or authority differ, the URI is returned
    /// unchanged (it cannot be expressed relative to the base).
    pub fn deresolve_against(&self, base: &StoreUri) -> StoreUri {
        if self.scheme != base.scheme || self.authority != base.authority {
            return self.clone();
        }

        // A reference into the base document itself keeps no path, so it
        // stays valid when the document's address is rewritten.
        if self.segments == base.segments {
            return StoreUri {
                scheme: None,
                authority: None,
                segments: Vec::new(),
                query: self.query.clone(),
                fragment: self.fragment.clone(),
            };
        }

        let dir = &base.segments[..base.segments.len().saturating_sub(1)];
        let common = dir
            .iter()
            .zip(self.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<String> = Vec::new();
        for _ in common..dir.len() {
            segments.push("..".to_string());
        }
        segments.extend(self.segments[common..].iter().cloned());

        StoreUri {
            scheme: None,
            authority: None,
            segments,
            query: self.query.clone(),
            fragment: self.fragment.clone(),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(scheme), Some(authority)) = (&self.scheme, &self.authority) {
            write!(f, "{scheme}://{authority}")?;
            if !self.segments.is_empty() {
                write!(f, "/")?;
            }
        }
        write!(f, "{}", self.segments.join("/"))?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// A collection-scoped location within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    /// The database name (first path segment).
    pub database: String,
    /// The collection name (second path segment).
    pub collection: String,
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// The validated `database/collection/{id}` form of a store URI.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreAddress {
    /// The database name.
    pub database: String,
    /// The collection name.
    pub collection: String,
    /// The document identifier, when the segment holds a parseable one.
    pub id: Option<ObjectId>,
}

impl StoreAddress {
    /// Derives an address from a URI.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::AddressFormat`] unless the path has
    /// exactly three segments. A third segment that is empty or not a valid
    /// ObjectId yields an identifier-less address, never an error — that is
    /// the query/list form.
    pub fn from_uri(uri: &StoreUri) -> GraphStoreResult<Self> {
        let segments = uri.segments();

        if segments.len() != 3 {
            return Err(GraphStoreError::AddressFormat(format!(
                "expected database/collection/{{id}}, got '{uri}'"
            )));
        }

        Ok(Self {
            database: segments[0].clone(),
            collection: segments[1].clone(),
            id: ObjectId::parse_str(&segments[2]).ok(),
        })
    }

    /// Returns the collection-scoped part of this address.
    pub fn collection_ref(&self) -> CollectionRef {
        CollectionRef {
            database: self.database.clone(),
            collection: self.collection.clone(),
        }
    }
}

/// Translates between absolute object addresses and addresses relative to
/// the resource currently being saved or loaded.
///
/// The default implementation, [`BaseRelativeMapper`], is scoped to the
/// resource's own address. A custom mapper can be supplied through the save
/// and load options to change how proxy URIs are written and read.
pub trait UriMapper: Send + Sync {
    /// Makes an absolute URI relative to the mapper's base.
    fn deresolve(&self, uri: &StoreUri) -> StoreUri;

    /// Makes a (possibly relative) URI absolute against the mapper's base.
    fn resolve(&self, uri: &StoreUri) -> StoreUri;
}

/// The default [`UriMapper`]: plain base-relative resolution against a
/// resource address.
pub struct BaseRelativeMapper {
    base: StoreUri,
}

impl BaseRelativeMapper {
    /// Creates a mapper scoped to the given base address.
    pub fn new(base: StoreUri) -> Self {
        Self { base }
    }

    /// Boxes a mapper for the given base behind the trait object used by
    /// the store options.
    pub fn shared(base: StoreUri) -> Arc<dyn UriMapper> {
        Arc::new(Self::new(base))
    }
}

impl UriMapper for BaseRelativeMapper {
    fn deresolve(&self, uri: &StoreUri) -> StoreUri {
        uri.deresolve_against(&self.base)
    }

    fn resolve(&self, uri: &StoreUri) -> StoreUri {
        uri.resolve_against(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        for input in [
            "mongo://localhost/data/people/4d0a3e259095b5b334a59df0",
            "mongo://localhost:27017/data/people/",
            "../people/4d0a3e259095b5b334a59df0#/0",
            "data/people/?name%3D%3D%27junit%27",
        ] {
            assert_eq!(StoreUri::parse(input).to_string(), input);
        }
    }

    #[test]
    fn address_requires_three_segments() {
        let err = StoreAddress::from_uri(&StoreUri::parse("mongo://localhost/data/people"));
        assert!(matches!(err, Err(GraphStoreError::AddressFormat(_))));

        let err = StoreAddress::from_uri(&StoreUri::parse("mongo://localhost/data/people/a/b"));
        assert!(matches!(err, Err(GraphStoreError::AddressFormat(_))));
    }

    #[test]
    fn empty_or_malformed_identifier_is_absent() {
        let listing =
            StoreAddress::from_uri(&StoreUri::parse("mongo://localhost/data/people/")).unwrap();
        assert!(listing.id.is_none());
        assert_eq!(listing.database, "data");
        assert_eq!(listing.collection, "people");

        // The dummy "-1" segment used before a first save must not be fatal.
        let dummy =
            StoreAddress::from_uri(&StoreUri::parse("mongo://localhost/data/people/-1")).unwrap();
        assert!(dummy.id.is_none());
    }

    #[test]
    fn valid_identifier_parses() {
        let id = ObjectId::new();
        let uri = StoreUri::parse(&format!("mongo://localhost/data/people/{}", id.to_hex()));
        let address = StoreAddress::from_uri(&uri).unwrap();
        assert_eq!(address.id, Some(id));
    }

    #[test]
    fn decoded_query() {
        let uri = StoreUri::parse("mongo://localhost/data/people/?name%20%3D%3D%20%27a%27");
        assert_eq!(uri.decoded_query().as_deref(), Some("name == 'a'"));
    }

    #[test]
    fn resolve_and_deresolve_round_trip() {
        let base = StoreUri::parse("mongo://localhost/data/people/4d0a3e259095b5b334a59df0");
        let mapper = BaseRelativeMapper::new(base);

        let same_collection = StoreUri::parse("mongo://localhost/data/people/aaaabbbbccccddddeeeeffff")
            .with_fragment("/0");
        let relative = mapper.deresolve(&same_collection);
        assert_eq!(relative.to_string(), "aaaabbbbccccddddeeeeffff#/0");
        assert_eq!(mapper.resolve(&relative), same_collection);

        let other_collection =
            StoreUri::parse("mongo://localhost/data/targets/aaaabbbbccccddddeeeeffff")
                .with_fragment("/0");
        let relative = mapper.deresolve(&other_collection);
        assert_eq!(relative.to_string(), "../targets/aaaabbbbccccddddeeeeffff#/0");
        assert_eq!(mapper.resolve(&relative), other_collection);
    }

    #[test]
    fn same_document_reference_keeps_no_path() {
        let base = StoreUri::parse("mongo://localhost/data/people/-1");
        let mapper = BaseRelativeMapper::new(base);

        let inner = StoreUri::parse("mongo://localhost/data/people/-1#/0/@children.1");
        let relative = mapper.deresolve(&inner);
        assert_eq!(relative.to_string(), "#/0/@children.1");

        // Resolution against a rewritten base follows the new address.
        let rewritten = BaseRelativeMapper::new(StoreUri::parse(
            "mongo://localhost/data/people/4d0a3e259095b5b334a59df0",
        ));
        assert_eq!(
            rewritten.resolve(&relative).to_string(),
            "mongo://localhost/data/people/4d0a3e259095b5b334a59df0#/0/@children.1"
        );
    }

    #[test]
    fn deresolve_keeps_foreign_authority_absolute() {
        let base = StoreUri::parse("mongo://localhost/data/people/4d0a3e259095b5b334a59df0");
        let mapper = BaseRelativeMapper::new(base);
        let foreign = StoreUri::parse("mongo://otherhost/data/people/aaaabbbbccccddddeeeeffff");
        assert_eq!(mapper.deresolve(&foreign), foreign);
    }
}
