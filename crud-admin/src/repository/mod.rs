//! Generic admin repository
//!
//! [`AdminRepository`] implements the data access every admin screen needs
//! once, for any entity type, on top of a [`PersistenceContext`]:
//!
//! ```rust
//! use crud_admin::demo::Person;
//! use crud_admin::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metamodel = Metamodel::builder().register::<Person>().build()?;
//! let context = MemoryContext::new(vec![
//!     Person::new(1, "Grace", 45),
//!     Person::new(2, "Ada", 36),
//! ]);
//! let people = AdminRepository::new(&metamodel, context)?;
//!
//! let page = people.find_all_sorted(0, 10, "name", Direction::Asc).await?;
//! assert_eq!(page.content()[0].name, "Ada");
//! assert_eq!(page.total_elements(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! Every call validates its input against the metamodel and then issues a
//! fresh query; nothing is cached and context errors are passed through.

mod context;
mod criteria;
mod memory;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
mod sql;

pub use context::{PersistenceContext, PersistenceError, Query};
pub use criteria::{like_regex, Criteria, Direction, Operator, Predicate, Sort};
pub use memory::MemoryContext;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub use sql::{SqlBackend, SqlContext, Statement};

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::metamodel::{
    AttributeDescriptor, Entity, EntityType, IntrospectionError, Metamodel, ToValue,
};

/// Errors raised by [`AdminRepository`]
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No row with the requested identifier
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity type name
        entity: String,
        /// Requested identifier, formatted
        id: String,
    },

    /// Single-result query matched nothing
    #[error("query on {entity} returned no result")]
    NoResult {
        /// Entity type name
        entity: String,
    },

    /// Single-result query matched more than one row
    #[error("query on {entity} returned more than one result")]
    NonUniqueResult {
        /// Entity type name
        entity: String,
    },

    /// Sort or filter names an attribute the entity does not declare
    #[error("entity {entity} has no attribute '{attribute}'")]
    UnknownAttribute {
        /// Entity type name
        entity: String,
        /// Requested attribute
        attribute: String,
    },

    /// Sort or filter on an association attribute
    #[error("attribute '{attribute}' of {entity} is an association and cannot be queried")]
    AssociationNotQueryable {
        /// Entity type name
        entity: String,
        /// Association attribute
        attribute: String,
    },

    /// Page size of zero or offset overflow
    #[error("Invalid page request: {0}")]
    InvalidPageRequest(String),

    /// Criteria the repository cannot express
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Entity type has no identifier attribute
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    /// Error from the persistence context
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Zero-indexed page request with optional single-field sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: Option<Sort>,
}

impl PageRequest {
    /// Page `page` (zero-indexed) of `size` rows
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidPageRequest`] when `size` is zero.
    pub fn new(page: u64, size: u64) -> Result<Self, RepositoryError> {
        if size == 0 {
            return Err(RepositoryError::InvalidPageRequest(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            page,
            size,
            sort: None,
        })
    }

    /// Sort the page by one attribute
    #[must_use]
    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Zero-indexed page number
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Rows per page
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Requested ordering, if any
    #[must_use]
    pub const fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// Rows skipped before this page
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidPageRequest`] on overflow.
    pub fn offset(&self) -> Result<u64, RepositoryError> {
        self.page.checked_mul(self.size).ok_or_else(|| {
            RepositoryError::InvalidPageRequest(format!(
                "page {} of size {} overflows",
                self.page, self.size
            ))
        })
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<E> {
    content: Vec<E>,
    number: u64,
    size: u64,
    total_elements: u64,
}

impl<E> Page<E> {
    /// Assemble a page
    #[must_use]
    pub const fn new(content: Vec<E>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        }
    }

    /// Rows on this page
    #[must_use]
    pub fn content(&self) -> &[E] {
        &self.content
    }

    /// Take the rows
    #[must_use]
    pub fn into_content(self) -> Vec<E> {
        self.content
    }

    /// Zero-indexed page number
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Requested page size
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Rows across all pages
    #[must_use]
    pub const fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// Number of pages, zero when there are no rows
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.size)
    }

    /// Whether this is the first page
    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.number == 0
    }

    /// Whether a later page holds rows
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.number.saturating_add(1) < self.total_pages()
    }
}

/// Data access for entity type `E` through context `C`
pub struct AdminRepository<E, C> {
    entity_type: Arc<EntityType>,
    context: C,
    _entity: PhantomData<fn() -> E>,
}

impl<E, C> AdminRepository<E, C>
where
    E: Entity,
    E::Id: ToValue,
    C: PersistenceContext<E>,
{
    /// Repository for `E` backed by `context`
    ///
    /// # Errors
    ///
    /// [`IntrospectionError::UnknownEntity`] when `E` is not in the metamodel.
    pub fn new(metamodel: &Metamodel, context: C) -> Result<Self, RepositoryError> {
        let entity_type = Arc::clone(metamodel.entity_of::<E>()?);
        Ok(Self::with_entity_type(entity_type, context))
    }

    pub(crate) const fn with_entity_type(entity_type: Arc<EntityType>, context: C) -> Self {
        Self {
            entity_type,
            context,
            _entity: PhantomData,
        }
    }

    /// Metamodel entry of `E`
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Persistence context
    #[must_use]
    pub const fn context(&self) -> &C {
        &self.context
    }

    /// Entity with identifier `id`
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when no row has this identifier.
    pub async fn find_by_id(&self, id: &E::Id) -> Result<E, RepositoryError> {
        let query = Query::new(self.id_criteria(id)?).with_limit(1);
        tracing::trace!(entity = E::TYPE_NAME, ?id, "find_by_id");

        self.context
            .select(&self.entity_type, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: E::TYPE_NAME.to_string(),
                id: format!("{id:?}"),
            })
    }

    /// Whether a row with identifier `id` exists
    pub async fn exists_by_id(&self, id: &E::Id) -> Result<bool, RepositoryError> {
        let criteria = self.id_criteria(id)?;
        Ok(self.context.count(&self.entity_type, &criteria).await? > 0)
    }

    /// Number of rows
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self
            .context
            .count(&self.entity_type, &Criteria::new())
            .await?)
    }

    /// All rows in store order
    pub async fn find_all(&self) -> Result<Vec<E>, RepositoryError> {
        tracing::trace!(entity = E::TYPE_NAME, "find_all");
        Ok(self
            .context
            .select(&self.entity_type, &Query::default())
            .await?)
    }

    /// Page `page` (zero-indexed) of `size` rows, store order
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidPageRequest`] when `size` is zero.
    pub async fn find_all_paged(&self, page: u64, size: u64) -> Result<Page<E>, RepositoryError> {
        self.find_page(&PageRequest::new(page, size)?).await
    }

    /// Page `page` of `size` rows ordered by `sort_by`
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::InvalidPageRequest`] when `size` is zero
    /// - [`RepositoryError::UnknownAttribute`] when `sort_by` is not an attribute
    /// - [`RepositoryError::AssociationNotQueryable`] when `sort_by` is an association
    pub async fn find_all_sorted(
        &self,
        page: u64,
        size: u64,
        sort_by: &str,
        direction: Direction,
    ) -> Result<Page<E>, RepositoryError> {
        let request = PageRequest::new(page, size)?.sorted(Sort::new(sort_by, direction));
        self.find_page(&request).await
    }

    /// Page described by `request`
    pub async fn find_page(&self, request: &PageRequest) -> Result<Page<E>, RepositoryError> {
        let criteria = request
            .sort()
            .cloned()
            .map_or_else(Criteria::new, |sort| Criteria::new().with_sort(sort));
        criteria.validate(self.entity_type.descriptor())?;

        let query = Query::new(criteria)
            .with_offset(request.offset()?)
            .with_limit(request.size());
        tracing::trace!(
            entity = E::TYPE_NAME,
            page = request.page(),
            size = request.size(),
            "find_page"
        );

        let content = self.context.select(&self.entity_type, &query).await?;
        let total = self
            .context
            .count(&self.entity_type, &Criteria::new())
            .await?;
        Ok(Page::new(content, request, total))
    }

    /// Every row matching `criteria`, in its ordering
    ///
    /// # Errors
    ///
    /// Validation errors of [`Criteria::validate`], then context errors.
    pub async fn find_all_by_criteria(
        &self,
        criteria: &Criteria,
    ) -> Result<Vec<E>, RepositoryError> {
        criteria.validate(self.entity_type.descriptor())?;
        tracing::trace!(entity = E::TYPE_NAME, ?criteria, "find_all_by_criteria");
        Ok(self
            .context
            .select(&self.entity_type, &Query::new(criteria.clone()))
            .await?)
    }

    /// The single row matching `criteria`
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NoResult`] when nothing matches
    /// - [`RepositoryError::NonUniqueResult`] when more than one row matches
    pub async fn find_one_by_criteria(&self, criteria: &Criteria) -> Result<E, RepositoryError> {
        criteria.validate(self.entity_type.descriptor())?;
        let query = Query::new(criteria.clone()).with_limit(2);
        tracing::trace!(entity = E::TYPE_NAME, ?criteria, "find_one_by_criteria");

        let mut rows = self.context.select(&self.entity_type, &query).await?;
        match rows.len() {
            0 => Err(RepositoryError::NoResult {
                entity: E::TYPE_NAME.to_string(),
            }),
            1 => Ok(rows.remove(0)),
            _ => Err(RepositoryError::NonUniqueResult {
                entity: E::TYPE_NAME.to_string(),
            }),
        }
    }

    /// Delete the row with identifier `id`, returning whether one was removed
    pub async fn delete_by_id(&self, id: &E::Id) -> Result<bool, RepositoryError> {
        let criteria = self.id_criteria(id)?;
        let removed = self.context.delete(&self.entity_type, &criteria).await?;
        tracing::debug!(entity = E::TYPE_NAME, ?id, removed, "delete_by_id");
        Ok(removed > 0)
    }

    fn identifier(&self) -> Result<&AttributeDescriptor, RepositoryError> {
        self.entity_type.descriptor().identifier().ok_or_else(|| {
            RepositoryError::Introspection(IntrospectionError::IdentifierNotDefined {
                entity: E::TYPE_NAME.to_string(),
            })
        })
    }

    fn id_criteria(&self, id: &E::Id) -> Result<Criteria, RepositoryError> {
        Ok(Criteria::new().eq(self.identifier()?.name(), id.to_value()))
    }
}

impl<E, C: Clone> Clone for AdminRepository<E, C> {
    fn clone(&self) -> Self {
        Self {
            entity_type: Arc::clone(&self.entity_type),
            context: self.context.clone(),
            _entity: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::Person;
    use proptest::prelude::*;

    fn repository() -> AdminRepository<Person, MemoryContext<Person>> {
        let metamodel = Metamodel::builder().register::<Person>().build().unwrap();
        let context =
            MemoryContext::new((1..=25).map(|id| Person::new(id, format!("p{id:02}"), 20)));
        AdminRepository::new(&metamodel, context).unwrap()
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(matches!(
            PageRequest::new(0, 0),
            Err(RepositoryError::InvalidPageRequest(_))
        ));
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let request = PageRequest::new(u64::MAX, 2).unwrap();
        assert!(request.offset().is_err());
    }

    #[tokio::test]
    async fn test_last_partial_page() {
        let repository = repository();
        let page = repository.find_all_paged(2, 10).await.unwrap();

        assert_eq!(page.content().len(), 5);
        assert_eq!(page.total_elements(), 25);
        assert_eq!(page.total_pages(), 3);
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let repository = repository();
        assert!(repository.delete_by_id(&3).await.unwrap());
        assert!(!repository.delete_by_id(&3).await.unwrap());
        assert!(!repository.exists_by_id(&3).await.unwrap());
        assert_eq!(repository.count().await.unwrap(), 24);
    }

    proptest! {
        #[test]
        fn prop_page_math(total in 0u64..500, size in 1u64..50, page in 0u64..20) {
            let request = PageRequest::new(page, size).unwrap();
            let offset = request.offset().unwrap();
            let expected = total.saturating_sub(offset).min(size);

            let content = vec![(); usize::try_from(expected).unwrap()];
            let page = Page::new(content, &request, total);

            prop_assert_eq!(page.total_pages(), total.div_ceil(size));
            prop_assert_eq!(page.has_next(), offset + size < total);
            prop_assert!(page.content().len() as u64 <= size);
        }
    }
}
