//! Entity discovery
//!
//! Turns a list of namespaces (Rust module paths) into an [`EntityRegistry`]
//! of the entity and mapped-superclass types living under them.
//!
//! Discovery is an explicit function from namespaces to type names. Each
//! namespace is scanned in configuration order; a failing namespace is
//! logged and reported but never aborts the scan of the others.
//!
//! ```rust
//! use crud_admin::discovery::{EntityDiscoverer, ManifestSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = ManifestSource::parse(r#"
//!     [[entity]]
//!     type_name = "shop::model::Order"
//!     marker = "entity"
//! "#)?;
//!
//! let report = EntityDiscoverer::new(source).discover(["shop", "warehouse"]);
//! assert!(report.registry().contains("shop::model::Order"));
//! assert_eq!(report.failures().len(), 1);
//! # Ok(())
//! # }
//! ```

mod source;

pub use source::{
    EntityCandidate, EntitySource, InventorySource, ManifestFile, ManifestSource,
};

#[cfg(test)]
pub use source::MockEntitySource;

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexSet;
use thiserror::Error;

use crate::config::AdminSettings;

/// Errors raised while scanning one namespace
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// Namespace is not a valid module path
    #[error("invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        /// Namespace as configured
        namespace: String,
        /// What is wrong with it
        reason: String,
    },

    /// Nothing is registered under the namespace
    #[error("namespace '{namespace}' does not exist or contains no registered types")]
    UnknownNamespace {
        /// Normalized namespace
        namespace: String,
    },

    /// Manifest file could not be read
    #[error("cannot read entity manifest {}: {message}", path.display())]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        message: String,
    },

    /// Manifest is not valid TOML or has the wrong shape
    #[error("malformed entity manifest {origin}: {message}")]
    Manifest {
        /// Manifest path or `<inline>`
        origin: String,
        /// Parser message
        message: String,
    },
}

/// A namespace that could not be scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    /// Namespace as configured
    pub namespace: String,
    /// Cause
    pub error: DiscoveryError,
}

/// Ordered set of discovered type names
///
/// Immutable once built. Names are de-duplicated: a type reachable from two
/// overlapping namespaces appears once, at the position it was first found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRegistry {
    type_names: Arc<IndexSet<String>>,
}

impl EntityRegistry {
    /// Registry holding exactly these names (duplicates collapsed)
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_names: Arc::new(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether the type was discovered
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.type_names.contains(type_name)
    }

    /// Discovered names in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.type_names.iter().map(String::as_str)
    }

    /// Number of discovered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.type_names.len()
    }

    /// True when nothing was discovered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_names.is_empty()
    }

    /// New registry with `other`'s names appended after this one's.
    ///
    /// Names are never removed; names already present keep their position.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut type_names = (*self.type_names).clone();
        type_names.extend(other.type_names.iter().cloned());
        Self {
            type_names: Arc::new(type_names),
        }
    }
}

impl<'a> IntoIterator for &'a EntityRegistry {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.type_names.iter()
    }
}

/// Outcome of a scan
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    registry: EntityRegistry,
    failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    /// Discovered types
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Namespaces that failed
    #[must_use]
    pub fn failures(&self) -> &[DiscoveryFailure] {
        &self.failures
    }

    /// True when every namespace was scanned
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Take the registry, dropping the failures
    #[must_use]
    pub fn into_registry(self) -> EntityRegistry {
        self.registry
    }
}

/// Scans namespaces through an [`EntitySource`]
#[derive(Debug, Clone)]
pub struct EntityDiscoverer<S> {
    source: S,
}

impl<S: EntitySource> EntityDiscoverer<S> {
    /// Discoverer over `source`
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// The underlying source
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Scan the namespaces listed in `basePackages`.
    ///
    /// When nothing is configured the scan is skipped with a warning and an
    /// empty report is returned.
    #[must_use]
    pub fn discover_configured(&self, settings: &AdminSettings) -> DiscoveryReport {
        match settings.namespaces() {
            Some(namespaces) => self.discover(namespaces),
            None => {
                tracing::warn!("No base packages configured; skipping entity scan");
                DiscoveryReport::default()
            }
        }
    }

    /// Scan every namespace in order.
    #[must_use]
    pub fn discover<I, N>(&self, namespaces: I) -> DiscoveryReport
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut type_names = IndexSet::new();
        let mut failures = Vec::new();

        for namespace in namespaces {
            let namespace = namespace.as_ref();
            match self.scan_namespace(namespace) {
                Ok(found) => {
                    for type_name in found {
                        tracing::debug!(entity = %type_name, namespace, "Scanned entity");
                        type_names.insert(type_name);
                    }
                }
                Err(error) => {
                    tracing::error!(
                        namespace,
                        source = self.source.name(),
                        error = %error,
                        "Failed to scan namespace for entities"
                    );
                    failures.push(DiscoveryFailure {
                        namespace: namespace.to_string(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            discovered = type_names.len(),
            failed = failures.len(),
            "Entity scan finished"
        );

        DiscoveryReport {
            registry: EntityRegistry {
                type_names: Arc::new(type_names),
            },
            failures,
        }
    }

    /// Marked type names under one namespace
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::InvalidNamespace`] for malformed input, otherwise
    /// whatever the source reports.
    pub fn scan_namespace(&self, namespace: &str) -> Result<Vec<String>, DiscoveryError> {
        let namespace = normalize_namespace(namespace)?;
        let candidates = self.source.candidates(&namespace)?;

        Ok(candidates
            .into_iter()
            .filter(|candidate| candidate.marker.is_some())
            .map(|candidate| candidate.type_name)
            .collect())
    }
}

/// Validate a namespace and strip surrounding whitespace and a trailing `::`.
///
/// # Errors
///
/// [`DiscoveryError::InvalidNamespace`] when empty or when a segment is not
/// an identifier.
pub fn normalize_namespace(namespace: &str) -> Result<String, DiscoveryError> {
    let trimmed = namespace.trim();
    let trimmed = trimmed.strip_suffix("::").unwrap_or(trimmed);

    let invalid = |reason: &str| DiscoveryError::InvalidNamespace {
        namespace: namespace.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("namespace is empty"));
    }

    for segment in trimmed.split("::") {
        let mut chars = segment.chars();
        let valid_start = chars
            .next()
            .is_some_and(|first| first == '_' || first.is_ascii_alphabetic());
        if !valid_start || !chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
            return Err(invalid(&format!("'{segment}' is not a valid path segment")));
        }
    }

    Ok(trimmed.to_string())
}

/// Whether `type_name` lives in `namespace` (segment-aware prefix match)
pub(crate) fn namespace_contains(namespace: &str, type_name: &str) -> bool {
    type_name
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}
