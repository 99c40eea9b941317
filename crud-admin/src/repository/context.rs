//! Persistence context abstraction
//!
//! A context executes already-validated queries for one entity type. The
//! repository never talks to storage directly.

use async_trait::async_trait;
use thiserror::Error;

use super::Criteria;
use crate::metamodel::{Entity, EntityType, IntrospectionError};

/// Errors raised by a persistence context
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database driver error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Value or operator the backend cannot express
    #[error("Unsupported query: {0}")]
    Unsupported(String),

    /// Attribute could not be read from an in-memory row
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

/// Validated query handed to a [`PersistenceContext`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter and ordering
    pub criteria: Criteria,
    /// Rows to skip
    pub offset: u64,
    /// Maximum rows to return
    pub limit: Option<u64>,
}

impl Query {
    /// Every row matching `criteria`
    #[must_use]
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            offset: 0,
            limit: None,
        }
    }

    /// Return at most `limit` rows
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip `offset` rows
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// Storage seam for [`AdminRepository`](super::AdminRepository)
///
/// `entity` is the metamodel entry of `E`; contexts use it for table and
/// column names or to read attributes from in-memory rows.
#[async_trait]
pub trait PersistenceContext<E: Entity>: Send + Sync {
    /// Rows matching the query, in its ordering (store order when unordered)
    async fn select(&self, entity: &EntityType, query: &Query) -> Result<Vec<E>, PersistenceError>;

    /// Number of rows matching `criteria`
    async fn count(&self, entity: &EntityType, criteria: &Criteria)
        -> Result<u64, PersistenceError>;

    /// Delete rows matching `criteria`, returning how many were removed
    async fn delete(
        &self,
        entity: &EntityType,
        criteria: &Criteria,
    ) -> Result<u64, PersistenceError>;
}
