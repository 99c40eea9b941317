//! In-process persistence context
//!
//! Rows live in a `Vec` behind a lock and are filtered and ordered by
//! reading attributes through the metamodel's accessors, so an entity
//! behaves here the same way the admin screens see it.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;

use super::criteria::{like_regex, Operator};
use super::{Criteria, Direction, PersistenceContext, PersistenceError, Query};
use crate::metamodel::{Entity, EntityType, Value};

/// Persistence context over an in-memory row list
///
/// Clones share the same rows.
#[derive(Debug)]
pub struct MemoryContext<E> {
    rows: Arc<RwLock<Vec<E>>>,
}

impl<E> Clone for MemoryContext<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<E> Default for MemoryContext<E> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<E: Entity + Clone> MemoryContext<E> {
    /// Context holding `rows` in store order
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = E>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows.into_iter().collect())),
        }
    }

    /// Append a row
    pub fn insert(&self, row: E) {
        self.rows.write().push(row);
    }

    /// Snapshot of all rows
    #[must_use]
    pub fn rows(&self) -> Vec<E> {
        self.rows.read().clone()
    }

    /// Number of stored rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the store holds no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn select_rows(&self, entity: &EntityType, query: &Query) -> Result<Vec<E>, PersistenceError> {
        let filter = Filter::compile(&query.criteria)?;
        let rows = self.rows.read();

        let mut matched = Vec::new();
        for row in rows.iter() {
            if filter.matches(entity, row)? {
                matched.push(row);
            }
        }

        let ordering = query.criteria.ordering();
        if !ordering.is_empty() {
            let mut keyed = matched
                .into_iter()
                .map(|row| {
                    let keys = ordering
                        .iter()
                        .map(|sort| entity.read(sort.attribute(), row))
                        .collect::<Result<Vec<Value>, _>>()?;
                    Ok((keys, row))
                })
                .collect::<Result<Vec<_>, PersistenceError>>()?;

            keyed.sort_by(|(left, _), (right, _)| {
                for ((a, b), sort) in left.iter().zip(right).zip(ordering) {
                    let cmp = a.compare(b).unwrap_or(Ordering::Equal);
                    let cmp = match sort.direction() {
                        Direction::Asc => cmp,
                        Direction::Desc => cmp.reverse(),
                    };
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                Ordering::Equal
            });
            matched = keyed.into_iter().map(|(_, row)| row).collect();
        }

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_rows(
        &self,
        entity: &EntityType,
        criteria: &Criteria,
    ) -> Result<u64, PersistenceError> {
        let filter = Filter::compile(criteria)?;
        let rows = self.rows.read();

        let mut count = 0u64;
        for row in rows.iter() {
            if filter.matches(entity, row)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn delete_rows(
        &self,
        entity: &EntityType,
        criteria: &Criteria,
    ) -> Result<u64, PersistenceError> {
        let filter = Filter::compile(criteria)?;
        let mut rows = self.rows.write();

        let keep = rows
            .iter()
            .map(|row| filter.matches(entity, row).map(|matched| !matched))
            .collect::<Result<Vec<bool>, _>>()?;
        let removed = keep.iter().filter(|keep| !**keep).count();

        let mut keep = keep.into_iter();
        rows.retain(|_| keep.next().unwrap_or(true));
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

/// Criteria with LIKE patterns compiled once per query
struct Filter<'c> {
    criteria: &'c Criteria,
    patterns: Vec<Option<Regex>>,
}

impl<'c> Filter<'c> {
    fn compile(criteria: &'c Criteria) -> Result<Self, PersistenceError> {
        let patterns = criteria
            .predicates()
            .iter()
            .map(|predicate| match (predicate.operator(), predicate.value()) {
                (Operator::Like, Value::Text(pattern)) => like_regex(pattern)
                    .map(Some)
                    .map_err(|e| PersistenceError::Unsupported(e.to_string())),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { criteria, patterns })
    }

    fn matches<E: Entity>(&self, entity: &EntityType, row: &E) -> Result<bool, PersistenceError> {
        for (predicate, pattern) in self.criteria.predicates().iter().zip(&self.patterns) {
            let actual = entity.read(predicate.attribute(), row)?;
            if !predicate.matches(&actual, pattern.as_ref()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl<E: Entity + Clone> PersistenceContext<E> for MemoryContext<E> {
    async fn select(&self, entity: &EntityType, query: &Query) -> Result<Vec<E>, PersistenceError> {
        self.select_rows(entity, query)
    }

    async fn count(
        &self,
        entity: &EntityType,
        criteria: &Criteria,
    ) -> Result<u64, PersistenceError> {
        self.count_rows(entity, criteria)
    }

    async fn delete(
        &self,
        entity: &EntityType,
        criteria: &Criteria,
    ) -> Result<u64, PersistenceError> {
        self.delete_rows(entity, criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::Person;
    use crate::testing::people_context as people;

    fn person_type() -> EntityType {
        EntityType::of::<Person>().unwrap()
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let context = people();
        let query = Query::new(
            Criteria::new()
                .like("name", "A%")
                .order_by("age", Direction::Desc),
        );

        let rows = context.select(&person_type(), &query).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alan", "Ada"]);
    }

    #[tokio::test]
    async fn test_select_applies_offset_and_limit() {
        let context = people();
        let query = Query::new(Criteria::new().order_by("id", Direction::Asc))
            .with_offset(1)
            .with_limit(1);

        let rows = context.select(&person_type(), &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[tokio::test]
    async fn test_count_and_delete() {
        let context = people();
        let entity = person_type();
        let inactive = Criteria::new().eq("active", false);

        assert_eq!(context.count(&entity, &inactive).await.unwrap(), 1);
        assert_eq!(context.delete(&entity, &inactive).await.unwrap(), 1);
        assert_eq!(context.len(), 3);
        assert_eq!(context.count(&entity, &inactive).await.unwrap(), 0);
    }

    #[derive(Debug, Clone, crate::Entity)]
    struct Reading {
        #[crud(id)]
        id: i64,
        level: f64,
    }

    #[tokio::test]
    async fn test_sort_with_nan_levels() {
        let levels = [
            3.5,
            f64::NAN,
            -1.0,
            12.25,
            f64::NAN,
            0.0,
            7.0,
            f64::NAN,
            -4.5,
            2.0,
        ];
        let context = MemoryContext::new(
            (0u32..)
                .zip(levels.iter().cycle().take(60))
                .map(|(step, level)| Reading {
                    id: i64::from(step),
                    level: level + f64::from(step) * 0.001,
                }),
        );
        let entity = EntityType::of::<Reading>().unwrap();

        let query = Query::new(Criteria::new().order_by("level", Direction::Asc));
        let rows = context.select(&entity, &query).await.unwrap();
        assert_eq!(rows.len(), 60);

        let numbers: Vec<f64> = rows
            .iter()
            .map(|r| r.level)
            .take_while(|level| !level.is_nan())
            .collect();
        assert_eq!(numbers.len(), 42);
        assert!(numbers.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(rows[42..].iter().all(|r| r.level.is_nan()));

        let query = Query::new(Criteria::new().order_by("level", Direction::Desc));
        let rows = context.select(&entity, &query).await.unwrap();
        assert!(rows[..18].iter().all(|r| r.level.is_nan()));
        assert!(rows[18..].windows(2).all(|pair| pair[0].level >= pair[1].level));
    }

    #[tokio::test]
    async fn test_null_column_filter() {
        let context = people();
        let rows = context
            .select(&person_type(), &Query::new(Criteria::new().is_not_null("email")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Ada");
    }
}
