//! Candidate sources for entity discovery
//!
//! A source answers one question: which types live under a namespace, and
//! which marker does each carry. Two sources ship with the crate:
//!
//! - [`InventorySource`] reads the registrations `#[derive(Entity)]` submits
//!   at compile time.
//! - [`ManifestSource`] reads a TOML manifest listing type names, for
//!   deployments that enable entities without recompiling.
//!
//! # Manifest format
//!
//! ```toml
//! [[entity]]
//! type_name = "shop::model::Order"
//! marker = "entity"
//!
//! [[entity]]
//! type_name = "shop::model::Auditable"
//! marker = "mapped_superclass"
//!
//! [[entity]]
//! type_name = "shop::model::Money"   # unmarked, never discovered
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{namespace_contains, DiscoveryError};
use crate::metamodel::{EntityMarker, EntityRegistration};

/// A type found under a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCandidate {
    /// Fully qualified type name
    pub type_name: String,
    /// Marker, `None` for plain types
    pub marker: Option<EntityMarker>,
}

impl EntityCandidate {
    /// Candidate with a marker
    #[must_use]
    pub fn marked(type_name: impl Into<String>, marker: EntityMarker) -> Self {
        Self {
            type_name: type_name.into(),
            marker: Some(marker),
        }
    }

    /// Candidate without marker
    #[must_use]
    pub fn unmarked(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            marker: None,
        }
    }
}

/// Enumerates the types living under a namespace
#[cfg_attr(test, mockall::automock)]
pub trait EntitySource: Send + Sync {
    /// Candidates under `namespace` (already validated and normalized).
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] when the namespace cannot be enumerated.
    fn candidates(&self, namespace: &str) -> Result<Vec<EntityCandidate>, DiscoveryError>;

    /// Human-readable source name for logs
    fn name(&self) -> &'static str;
}

impl<T: EntitySource + ?Sized> EntitySource for &T {
    fn candidates(&self, namespace: &str) -> Result<Vec<EntityCandidate>, DiscoveryError> {
        (**self).candidates(namespace)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: EntitySource + ?Sized> EntitySource for Box<T> {
    fn candidates(&self, namespace: &str) -> Result<Vec<EntityCandidate>, DiscoveryError> {
        (**self).candidates(namespace)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Source backed by compile-time `inventory` registrations
#[derive(Debug, Clone, Copy, Default)]
pub struct InventorySource;

impl InventorySource {
    /// Create the source
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EntitySource for InventorySource {
    fn candidates(&self, namespace: &str) -> Result<Vec<EntityCandidate>, DiscoveryError> {
        let candidates: Vec<EntityCandidate> = EntityRegistration::all()
            .filter(|registration| namespace_contains(namespace, registration.type_name()))
            .map(|registration| {
                EntityCandidate::marked(registration.type_name(), registration.marker())
            })
            .collect();

        if candidates.is_empty() {
            return Err(DiscoveryError::UnknownNamespace {
                namespace: namespace.to_string(),
            });
        }
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "inventory"
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    entity: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    type_name: String,
    #[serde(default)]
    marker: Option<ManifestMarker>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ManifestMarker {
    Entity,
    MappedSuperclass,
}

impl From<ManifestMarker> for EntityMarker {
    fn from(marker: ManifestMarker) -> Self {
        match marker {
            ManifestMarker::Entity => Self::Entity,
            ManifestMarker::MappedSuperclass => Self::MappedSuperclass,
        }
    }
}

/// Source backed by a TOML manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestSource {
    origin: Option<PathBuf>,
    entries: Vec<EntityCandidate>,
}

impl ManifestSource {
    /// Parse a manifest from a string
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Manifest`] when the TOML is malformed.
    pub fn parse(content: &str) -> Result<Self, DiscoveryError> {
        Self::parse_with_origin(content, None)
    }

    /// Read and parse a manifest file
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Io`] when the file cannot be read,
    /// [`DiscoveryError::Manifest`] when it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;
        Self::parse_with_origin(&content, Some(path.to_path_buf()))
    }

    fn parse_with_origin(content: &str, origin: Option<PathBuf>) -> Result<Self, DiscoveryError> {
        let manifest: Manifest = toml::from_str(content).map_err(|source| DiscoveryError::Manifest {
            origin: origin
                .as_ref()
                .map_or_else(|| "<inline>".to_string(), |path| path.display().to_string()),
            message: source.to_string(),
        })?;

        let entries = manifest
            .entity
            .into_iter()
            .map(|entry| EntityCandidate {
                type_name: entry.type_name,
                marker: entry.marker.map(Into::into),
            })
            .collect();

        Ok(Self { origin, entries })
    }

    /// File the manifest was read from, if any
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Number of listed entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the manifest lists nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntitySource for ManifestSource {
    fn candidates(&self, namespace: &str) -> Result<Vec<EntityCandidate>, DiscoveryError> {
        let candidates: Vec<EntityCandidate> = self
            .entries
            .iter()
            .filter(|entry| namespace_contains(namespace, &entry.type_name))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Err(DiscoveryError::UnknownNamespace {
                namespace: namespace.to_string(),
            });
        }
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "manifest"
    }
}

/// Manifest file opened for a scan
///
/// Unlike [`ManifestSource::from_path`], opening never fails: an unreadable
/// or malformed file is reported as the failure of every namespace scanned
/// against it, so it lands in the [`DiscoveryReport`](super::DiscoveryReport)
/// next to the other namespace failures.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
    loaded: Result<ManifestSource, DiscoveryError>,
}

impl ManifestFile {
    /// Read and parse the manifest at `path`
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let loaded = ManifestSource::from_path(&path);
        if let Err(error) = &loaded {
            tracing::warn!(path = %path.display(), error = %error, "Entity manifest unavailable");
        }
        Self { path, loaded }
    }

    /// Manifest path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Why the manifest could not be loaded, if it could not
    #[must_use]
    pub fn error(&self) -> Option<&DiscoveryError> {
        self.loaded.as_ref().err()
    }
}

impl EntitySource for ManifestFile {
    fn candidates(&self, namespace: &str) -> Result<Vec<EntityCandidate>, DiscoveryError> {
        match &self.loaded {
            Ok(manifest) => manifest.candidates(namespace),
            Err(error) => Err(error.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "manifest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::EntityDiscoverer;

    const MANIFEST: &str = r#"
[[entity]]
type_name = "shop::model::Order"
marker = "entity"

[[entity]]
type_name = "shop::model::Auditable"
marker = "mapped_superclass"

[[entity]]
type_name = "shop::model::Money"

[[entity]]
type_name = "billing::Invoice"
marker = "entity"
"#;

    #[test]
    fn test_manifest_candidates_by_namespace() {
        let source = ManifestSource::parse(MANIFEST).unwrap();
        assert_eq!(source.len(), 4);

        let candidates = source.candidates("shop::model").unwrap();
        assert_eq!(
            candidates,
            vec![
                EntityCandidate::marked("shop::model::Order", EntityMarker::Entity),
                EntityCandidate::marked("shop::model::Auditable", EntityMarker::MappedSuperclass),
                EntityCandidate::unmarked("shop::model::Money"),
            ]
        );
    }

    #[test]
    fn test_manifest_unknown_namespace() {
        let source = ManifestSource::parse(MANIFEST).unwrap();
        assert!(matches!(
            source.candidates("warehouse"),
            Err(DiscoveryError::UnknownNamespace { .. })
        ));
    }

    #[test]
    fn test_manifest_prefix_is_segment_aware() {
        let source = ManifestSource::parse(MANIFEST).unwrap();
        assert!(source.candidates("sho").is_err());
        assert_eq!(source.candidates("billing").unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_manifest() {
        let result = ManifestSource::parse("[[entity]]\nmarker = 3");
        assert!(matches!(result, Err(DiscoveryError::Manifest { .. })));
    }

    #[test]
    fn test_manifest_from_missing_file() {
        let result = ManifestSource::from_path("/nonexistent/entities.toml");
        assert!(matches!(result, Err(DiscoveryError::Io { .. })));
    }

    #[test]
    fn test_unreadable_manifest_fails_each_namespace() {
        let file = ManifestFile::open("/nonexistent/entities.toml");
        assert!(matches!(file.error(), Some(DiscoveryError::Io { .. })));

        let report = EntityDiscoverer::new(&file).discover(["shop", "billing"]);
        assert!(report.registry().is_empty());
        let namespaces: Vec<&str> = report
            .failures()
            .iter()
            .map(|failure| failure.namespace.as_str())
            .collect();
        assert_eq!(namespaces, vec!["shop", "billing"]);
        assert!(report
            .failures()
            .iter()
            .all(|failure| matches!(failure.error, DiscoveryError::Io { .. })));
    }

    #[test]
    fn test_manifest_file_scans_like_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let file = ManifestFile::open(&path);
        assert!(file.error().is_none());
        assert_eq!(file.path(), path.as_path());
        assert_eq!(file.candidates("shop::model").unwrap().len(), 3);
    }

    #[test]
    fn test_manifest_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let source = ManifestSource::from_path(&path).unwrap();
        assert_eq!(source.origin(), Some(path.as_path()));
        assert_eq!(source.candidates("shop").unwrap().len(), 3);
    }
}
