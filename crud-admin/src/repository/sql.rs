//! SQL persistence contexts
//!
//! Statements are assembled from the metamodel into a backend-neutral
//! [`Statement`] (SQL fragments plus values) and then replayed into a
//! `sqlx::QueryBuilder` for the concrete backend. Values are always bound,
//! never spliced into the SQL text; identifiers are double-quoted.

use std::fmt;

use async_trait::async_trait;
use sqlx::{Database, Pool, QueryBuilder};

use super::{Criteria, PersistenceContext, PersistenceError, Query};
use crate::metamodel::{Entity, EntityType, Value};

/// Persistence context backed by a sqlx pool
#[derive(Debug)]
pub struct SqlContext<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> Clone for SqlContext<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: Database> SqlContext<DB> {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Bind(Value),
}

/// SQL text with its bound values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pieces: Vec<Piece>,
}

impl Statement {
    /// `SELECT <columns> FROM <table> [WHERE] [ORDER BY] [LIMIT OFFSET]`
    ///
    /// Association attributes have no column and are not selected.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Unsupported`] when offset or limit exceed `i64`.
    pub fn select(entity: &EntityType, query: &Query) -> Result<Self, PersistenceError> {
        let descriptor = entity.descriptor();
        let columns = descriptor
            .attributes()
            .iter()
            .filter(|attribute| !attribute.is_association())
            .map(|attribute| quote_identifier(attribute.name()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut statement = Self::default();
        statement.push(format!(
            "SELECT {columns} FROM {}",
            quote_identifier(descriptor.table())
        ));
        statement.push_where(&query.criteria);

        let ordering = query.criteria.ordering();
        if !ordering.is_empty() {
            let clauses = ordering
                .iter()
                .map(|sort| {
                    format!(
                        "{} {} {}",
                        quote_identifier(sort.attribute()),
                        sort.direction().as_sql(),
                        sort.direction().nulls_sql()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            statement.push(format!(" ORDER BY {clauses}"));
        }

        if query.limit.is_some() || query.offset > 0 {
            let limit = query.limit.map_or(Ok(i64::MAX), i64::try_from);
            let offset = i64::try_from(query.offset);
            let (Ok(limit), Ok(offset)) = (limit, offset) else {
                return Err(PersistenceError::Unsupported(
                    "limit or offset out of range".to_string(),
                ));
            };
            statement.push(" LIMIT ");
            statement.bind(Value::Int(limit));
            statement.push(" OFFSET ");
            statement.bind(Value::Int(offset));
        }

        Ok(statement)
    }

    /// `SELECT COUNT(*) FROM <table> [WHERE]`
    #[must_use]
    pub fn count(entity: &EntityType, criteria: &Criteria) -> Self {
        let mut statement = Self::default();
        statement.push(format!(
            "SELECT COUNT(*) FROM {}",
            quote_identifier(entity.descriptor().table())
        ));
        statement.push_where(criteria);
        statement
    }

    /// `DELETE FROM <table> [WHERE]`
    #[must_use]
    pub fn delete(entity: &EntityType, criteria: &Criteria) -> Self {
        let mut statement = Self::default();
        statement.push(format!(
            "DELETE FROM {}",
            quote_identifier(entity.descriptor().table())
        ));
        statement.push_where(criteria);
        statement
    }

    /// Values in binding order
    pub fn binds(&self) -> impl Iterator<Item = &Value> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Bind(value) => Some(value),
            Piece::Sql(_) => None,
        })
    }

    fn push(&mut self, sql: impl Into<String>) {
        self.pieces.push(Piece::Sql(sql.into()));
    }

    fn bind(&mut self, value: Value) {
        self.pieces.push(Piece::Bind(value));
    }

    fn push_where(&mut self, criteria: &Criteria) {
        for (index, predicate) in criteria.predicates().iter().enumerate() {
            self.push(if index == 0 { " WHERE " } else { " AND " });
            let column = quote_identifier(predicate.attribute());
            let operator = predicate.operator();
            if operator.is_unary() {
                self.push(format!("{column} {}", operator.as_sql()));
            } else {
                self.push(format!("{column} {} ", operator.as_sql()));
                self.bind(predicate.value().clone());
            }
        }
    }
}

impl fmt::Display for Statement {
    /// Renders with `?` placeholders
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            match piece {
                Piece::Sql(sql) => f.write_str(sql)?,
                Piece::Bind(_) => f.write_str("?")?,
            }
        }
        Ok(())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Backend able to replay a [`Statement`] into its own query builder
pub trait SqlBackend: Database {
    /// Build the backend query
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Unsupported`] for values the backend cannot bind.
    fn build(statement: &Statement) -> Result<QueryBuilder<'static, Self>, PersistenceError>;
}

macro_rules! sql_backend {
    ($feature:literal, $db:ty, $row:ty) => {
        #[cfg(feature = $feature)]
        impl SqlBackend for $db {
            fn build(
                statement: &Statement,
            ) -> Result<QueryBuilder<'static, Self>, PersistenceError> {
                let mut builder = QueryBuilder::<Self>::new("");
                for piece in &statement.pieces {
                    match piece {
                        Piece::Sql(sql) => {
                            builder.push(sql);
                        }
                        Piece::Bind(value) => match value.clone() {
                            Value::Null => {
                                builder.push("NULL");
                            }
                            Value::Bool(value) => {
                                builder.push_bind(value);
                            }
                            Value::Int(value) => {
                                builder.push_bind(value);
                            }
                            Value::Float(value) => {
                                builder.push_bind(value);
                            }
                            Value::Text(value) => {
                                builder.push_bind(value);
                            }
                            Value::Uuid(value) => {
                                builder.push_bind(value);
                            }
                            Value::Timestamp(value) => {
                                builder.push_bind(value);
                            }
                            Value::Date(value) => {
                                builder.push_bind(value);
                            }
                            Value::Entity(entity) => {
                                return Err(PersistenceError::Unsupported(format!(
                                    "cannot bind a reference to {}",
                                    entity.type_name()
                                )))
                            }
                        },
                    }
                }
                Ok(builder)
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait]
        impl<E> PersistenceContext<E> for SqlContext<$db>
        where
            E: Entity + Unpin + for<'r> sqlx::FromRow<'r, $row>,
        {
            async fn select(
                &self,
                entity: &EntityType,
                query: &Query,
            ) -> Result<Vec<E>, PersistenceError> {
                let statement = Statement::select(entity, query)?;
                tracing::trace!(entity = entity.type_name(), sql = %statement, "Executing select");
                let mut builder = <$db as SqlBackend>::build(&statement)?;
                let rows = builder.build_query_as::<E>().fetch_all(&self.pool).await?;
                Ok(rows)
            }

            async fn count(
                &self,
                entity: &EntityType,
                criteria: &Criteria,
            ) -> Result<u64, PersistenceError> {
                let statement = Statement::count(entity, criteria);
                tracing::trace!(entity = entity.type_name(), sql = %statement, "Executing count");
                let mut builder = <$db as SqlBackend>::build(&statement)?;
                let count = builder.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
                Ok(u64::try_from(count).unwrap_or_default())
            }

            async fn delete(
                &self,
                entity: &EntityType,
                criteria: &Criteria,
            ) -> Result<u64, PersistenceError> {
                let statement = Statement::delete(entity, criteria);
                tracing::trace!(entity = entity.type_name(), sql = %statement, "Executing delete");
                let mut builder = <$db as SqlBackend>::build(&statement)?;
                let result = builder.build().execute(&self.pool).await?;
                Ok(result.rows_affected())
            }
        }
    };
}

sql_backend!("postgres", sqlx::Postgres, sqlx::postgres::PgRow);
sql_backend!("sqlite", sqlx::Sqlite, sqlx::sqlite::SqliteRow);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{Department, Employee, Person};
    use crate::repository::Direction;

    fn person_type() -> EntityType {
        EntityType::of::<Person>().unwrap()
    }

    #[test]
    fn test_select_all() {
        let statement = Statement::select(&person_type(), &Query::default()).unwrap();
        assert_eq!(
            statement.to_string(),
            r#"SELECT "id", "name", "age", "active", "email" FROM "people""#
        );
        assert_eq!(statement.binds().count(), 0);
    }

    #[test]
    fn test_select_with_criteria_and_paging() {
        let query = Query::new(
            Criteria::new()
                .eq("active", true)
                .is_null("email")
                .order_by("name", Direction::Desc),
        )
        .with_offset(20)
        .with_limit(10);

        let statement = Statement::select(&person_type(), &query).unwrap();
        assert_eq!(
            statement.to_string(),
            r#"SELECT "id", "name", "age", "active", "email" FROM "people" WHERE "active" = ? AND "email" IS NULL ORDER BY "name" DESC NULLS LAST LIMIT ? OFFSET ?"#
        );
        let binds: Vec<&Value> = statement.binds().collect();
        assert_eq!(binds, vec![&Value::Bool(true), &Value::Int(10), &Value::Int(20)]);
    }

    #[test]
    fn test_order_by_places_nulls_like_memory() {
        let query = Query::new(
            Criteria::new()
                .order_by("email", Direction::Asc)
                .order_by("age", Direction::Desc),
        );
        let statement = Statement::select(&person_type(), &query).unwrap();
        assert!(statement
            .to_string()
            .ends_with(r#"ORDER BY "email" ASC NULLS FIRST, "age" DESC NULLS LAST"#));
    }

    #[test]
    fn test_select_skips_association_columns() {
        let employee = EntityType::of::<Employee>().unwrap();
        let statement = Statement::select(&employee, &Query::default()).unwrap();
        assert_eq!(
            statement.to_string(),
            r#"SELECT "id", "name" FROM "employees""#
        );
    }

    #[test]
    fn test_select_includes_inherited_columns() {
        let department = EntityType::of::<Department>().unwrap();
        let statement = Statement::select(&department, &Query::default()).unwrap();
        assert_eq!(
            statement.to_string(),
            r#"SELECT "id", "name", "created_at", "created_by" FROM "departments""#
        );
    }

    #[test]
    fn test_count_and_delete() {
        let criteria = Criteria::new().like("name", "A%");
        assert_eq!(
            Statement::count(&person_type(), &criteria).to_string(),
            r#"SELECT COUNT(*) FROM "people" WHERE "name" LIKE ?"#
        );
        assert_eq!(
            Statement::delete(&person_type(), &criteria).to_string(),
            r#"DELETE FROM "people" WHERE "name" LIKE ?"#
        );
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_placeholders() {
        let query = Query::new(Criteria::new().eq("id", 1_i64)).with_limit(1);
        let statement = Statement::select(&person_type(), &query).unwrap();
        let builder = <sqlx::Postgres as SqlBackend>::build(&statement).unwrap();
        assert!(builder.sql().ends_with(r#"WHERE "id" = $1 LIMIT $2 OFFSET $3"#));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_placeholders() {
        let query = Query::new(Criteria::new().eq("id", 1_i64));
        let statement = Statement::select(&person_type(), &query).unwrap();
        let builder = <sqlx::Sqlite as SqlBackend>::build(&statement).unwrap();
        assert!(builder.sql().ends_with(r#"WHERE "id" = ?"#));
    }
}
