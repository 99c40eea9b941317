//! Error types and error handling
//!
//! Each component raises its own error type; [`CrudAdminError`] wraps them
//! for callers that work with the assembled [`CrudAdmin`](crate::state::CrudAdmin).

use thiserror::Error;

pub use crate::discovery::DiscoveryError;
pub use crate::metamodel::{IntrospectionError, MetamodelError};
pub use crate::repository::{PersistenceError, RepositoryError};

/// Crate-level error type
#[derive(Debug, Error)]
pub enum CrudAdminError {
    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Metamodel error
    #[error("Metamodel error: {0}")]
    Metamodel(#[from] MetamodelError),

    /// Introspection error
    #[error("Introspection error: {0}")]
    Introspection(#[from] IntrospectionError),

    /// Repository error
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Type exists in the metamodel but was not discovered by the scan
    #[error("Entity type {0} was not discovered; check admin.base_packages")]
    NotDiscovered(String),
}
