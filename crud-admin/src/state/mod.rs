//! Application state management
//!
//! [`CrudAdmin`] is the assembled add-on: configuration, the metamodel and
//! the registry of discovered entity types. It hands out attribute mappers
//! and repositories, but only for types the scan discovered.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::CrudAdminConfig;
use crate::discovery::{DiscoveryReport, EntityDiscoverer, EntityRegistry, EntitySource};
use crate::error::CrudAdminError;
use crate::mapper::EntityAttributeMapper;
use crate::metamodel::{Entity, Metamodel, ToValue};
use crate::repository::{AdminRepository, PersistenceContext};

/// Assembled crud-admin state
///
/// Cheap to clone; clones share the registry, so a [`rescan`](Self::rescan)
/// is visible to all of them.
///
/// # Example
///
/// ```rust
/// use crud_admin::prelude::*;
///
/// # fn main() -> Result<(), CrudAdminError> {
/// let admin = CrudAdmin::bootstrap(CrudAdminConfig::default(), &InventorySource::new())?;
///
/// // Disabled by default: nothing is scanned
/// assert!(admin.registry().is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CrudAdmin {
    /// Configuration, immutable after startup
    config: Arc<CrudAdminConfig>,

    /// Schema metamodel
    metamodel: Arc<Metamodel>,

    /// Discovered entity types; swapped wholesale on rescan
    registry: Arc<RwLock<Arc<EntityRegistry>>>,
}

impl CrudAdmin {
    /// Build the metamodel from every compiled-in entity and scan the
    /// configured namespaces.
    ///
    /// Scanning is skipped when `admin.enabled` is false. Namespaces that
    /// fail to scan are logged and left out.
    ///
    /// # Errors
    ///
    /// [`CrudAdminError::Metamodel`] when a registered entity is invalid.
    pub fn bootstrap<S: EntitySource>(
        config: CrudAdminConfig,
        source: &S,
    ) -> Result<Self, CrudAdminError> {
        let metamodel = Metamodel::from_inventory()?;
        let admin = Self::with_parts(config, metamodel, EntityRegistry::default());

        if admin.config.admin.enabled {
            let report = admin.rescan(source);
            if !report.is_complete() {
                tracing::warn!(
                    failed = report.failures().len(),
                    "Some configured namespaces could not be scanned"
                );
            }
        } else {
            tracing::info!("CRUD admin disabled; skipping entity scan");
        }
        Ok(admin)
    }

    /// Assemble from explicit parts
    #[must_use]
    pub fn with_parts(
        config: CrudAdminConfig,
        metamodel: Metamodel,
        registry: EntityRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            metamodel: Arc::new(metamodel),
            registry: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Scan the configured namespaces again and append what is new.
    ///
    /// Previously discovered names are kept even if they no longer turn up.
    #[must_use]
    pub fn rescan<S: EntitySource>(&self, source: &S) -> DiscoveryReport {
        let report = EntityDiscoverer::new(source).discover_configured(&self.config.admin);

        let mut registry = self.registry.write();
        let merged = registry.merged(report.registry());
        tracing::debug!(
            before = registry.len(),
            after = merged.len(),
            "Entity registry updated"
        );
        *registry = Arc::new(merged);
        report
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &CrudAdminConfig {
        &self.config
    }

    /// Metamodel
    #[must_use]
    pub fn metamodel(&self) -> &Metamodel {
        &self.metamodel
    }

    /// Snapshot of the discovered entity types
    #[must_use]
    pub fn registry(&self) -> Arc<EntityRegistry> {
        self.registry.read().clone()
    }

    /// Whether `E` was discovered
    #[must_use]
    pub fn is_discovered<E: Entity>(&self) -> bool {
        self.registry.read().contains(E::TYPE_NAME)
    }

    /// Attribute mapper for a discovered type
    ///
    /// # Errors
    ///
    /// [`CrudAdminError::NotDiscovered`] when the scan did not register `E`.
    pub fn mapper<E: Entity, R>(
        &self,
        result: R,
    ) -> Result<EntityAttributeMapper<'_, E, R>, CrudAdminError> {
        self.ensure_discovered::<E>()?;
        Ok(EntityAttributeMapper::new(&self.metamodel, result)?)
    }

    /// Repository for a discovered type
    ///
    /// # Errors
    ///
    /// [`CrudAdminError::NotDiscovered`] when the scan did not register `E`.
    pub fn repository<E, C>(&self, context: C) -> Result<AdminRepository<E, C>, CrudAdminError>
    where
        E: Entity,
        E::Id: ToValue,
        C: PersistenceContext<E>,
    {
        self.ensure_discovered::<E>()?;
        Ok(AdminRepository::new(&self.metamodel, context)?)
    }

    fn ensure_discovered<E: Entity>(&self) -> Result<(), CrudAdminError> {
        if self.is_discovered::<E>() {
            Ok(())
        } else {
            Err(CrudAdminError::NotDiscovered(E::TYPE_NAME.to_string()))
        }
    }
}

impl std::fmt::Debug for CrudAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudAdmin")
            .field("config", &self.config)
            .field("entities", &self.metamodel.len())
            .field("discovered", &self.registry.read().len())
            .finish()
    }
}
