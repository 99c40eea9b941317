//! crud-admin: entity discovery and generic data access for CRUD admin screens
//!
//! The crate is a thin layer over an application's persistence stack:
//!
//! - **Metamodel**: every entity describes its attributes and accessors,
//!   usually through `#[derive(Entity)]`
//! - **Discovery**: configured namespaces are scanned for entity types
//! - **Introspection**: [`EntityAttributeMapper`](mapper::EntityAttributeMapper)
//!   reads attribute values and related primary keys for list/detail views
//! - **Repository**: [`AdminRepository`](repository::AdminRepository) offers
//!   find-by-id, paging, sorting and criteria queries over any
//!   [`PersistenceContext`](repository::PersistenceContext)
//!
//! # Quick Start
//!
//! ```rust
//! use crud_admin::prelude::*;
//! use crud_admin::demo::Person;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let mut config = CrudAdminConfig::default();
//! config.admin.enabled = true;
//! config.admin.base_packages = Some("crud_admin::demo".into());
//!
//! // Scan the configured namespaces and assemble the admin state
//! let admin = CrudAdmin::bootstrap(config, &InventorySource::new())?;
//! assert!(admin.registry().contains(Person::TYPE_NAME));
//!
//! // Build a repository for a discovered type
//! let context = MemoryContext::new(vec![Person::new(1, "Ada", 36)]);
//! let people = admin.repository::<Person, _>(context)?;
//! assert_eq!(people.find_by_id(&1).await?.name, "Ada");
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `postgres` - `PostgreSQL` persistence context (default)
//! - `sqlite` - `SQLite` persistence context

#![allow(clippy::missing_errors_doc)]

extern crate self as crud_admin;

pub mod config;
pub mod demo;
pub mod discovery;
pub mod error;
pub mod mapper;
pub mod metamodel;
pub mod observability;
pub mod repository;
pub mod state;

#[cfg(test)]
pub mod testing;

pub use crud_admin_macros::Entity;

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use crud_admin::prelude::*;
    //! ```

    // Metamodel
    pub use crate::metamodel::{
        AccessorTable, AttributeDescriptor, AttributeKind, Entity, EntityDescriptor,
        EntityMarker, EntityRef, Metamodel, RuntimeType, ToValue, Value,
    };
    pub use crud_admin_macros::Entity;

    // Discovery
    pub use crate::discovery::{
        EntityDiscoverer, EntityRegistry, EntitySource, InventorySource, ManifestSource,
    };

    // Introspection
    pub use crate::mapper::EntityAttributeMapper;

    // Repository
    pub use crate::repository::{
        AdminRepository, Criteria, Direction, MemoryContext, Page, PageRequest,
        PersistenceContext, Sort,
    };
    #[cfg(any(feature = "postgres", feature = "sqlite"))]
    pub use crate::repository::SqlContext;

    // Configuration and state
    pub use crate::config::CrudAdminConfig;
    pub use crate::error::CrudAdminError;
    pub use crate::state::CrudAdmin;
}
