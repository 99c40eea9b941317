//! Structured query criteria
//!
//! Criteria are built against attribute names and validated against the
//! metamodel before a context sees them, so contexts can trust every name
//! they receive.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::RepositoryError;
use crate::metamodel::{EntityDescriptor, Value};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending, nulls first
    #[default]
    Asc,
    /// Descending, nulls last
    Desc,
}

impl Direction {
    /// SQL keyword
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Null placement matching this direction, for backends whose default
    /// differs
    #[must_use]
    pub const fn nulls_sql(self) -> &'static str {
        match self {
            Self::Asc => "NULLS FIRST",
            Self::Desc => "NULLS LAST",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Single-attribute ordering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    attribute: String,
    direction: Direction,
}

impl Sort {
    /// Order by `attribute` in `direction`
    #[must_use]
    pub fn new(attribute: impl Into<String>, direction: Direction) -> Self {
        Self {
            attribute: attribute.into(),
            direction,
        }
    }

    /// Ascending order by `attribute`
    #[must_use]
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Direction::Asc)
    }

    /// Descending order by `attribute`
    #[must_use]
    pub fn desc(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Direction::Desc)
    }

    /// Attribute to order by
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Sort direction
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }
}

/// Comparison operator of a [`Predicate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// SQL `LIKE` with `%` and `_` wildcards
    Like,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// SQL operator text
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator takes no operand
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// One `attribute <op> value` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    attribute: String,
    operator: Operator,
    value: Value,
}

impl Predicate {
    fn new(attribute: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value,
        }
    }

    /// Constrained attribute
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Comparison operator
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// Operand; [`Value::Null`] for unary operators
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluate against an attribute value with SQL null semantics.
    ///
    /// `like` is the compiled pattern for [`Operator::Like`], see
    /// [`like_regex`].
    #[must_use]
    pub fn matches(&self, actual: &Value, like: Option<&Regex>) -> bool {
        match self.operator {
            Operator::IsNull => return actual.is_null(),
            Operator::IsNotNull => return !actual.is_null(),
            _ if actual.is_null() || self.value.is_null() => return false,
            _ => {}
        }

        if self.operator == Operator::Like {
            return match (actual, like) {
                (Value::Text(text), Some(pattern)) => pattern.is_match(text),
                _ => false,
            };
        }

        let Some(ordering) = actual.compare(&self.value) else {
            return false;
        };
        match self.operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Like | Operator::IsNull | Operator::IsNotNull => false,
        }
    }
}

/// Conjunction of predicates plus ordering
///
/// ```rust
/// use crud_admin::repository::{Criteria, Direction};
///
/// let criteria = Criteria::new()
///     .eq("active", true)
///     .ge("age", 18)
///     .like("name", "A%")
///     .order_by("name", Direction::Asc);
/// assert_eq!(criteria.predicates().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
    ordering: Vec<Sort>,
}

impl Criteria {
    /// Matches every row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `attribute = value`; a null value becomes `IS NULL`
    #[must_use]
    pub fn eq(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            return self.is_null(attribute);
        }
        self.push(Predicate::new(attribute, Operator::Eq, value))
    }

    /// `attribute <> value`; a null value becomes `IS NOT NULL`
    #[must_use]
    pub fn ne(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            return self.is_not_null(attribute);
        }
        self.push(Predicate::new(attribute, Operator::Ne, value))
    }

    /// `attribute < value`
    #[must_use]
    pub fn lt(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Predicate::new(attribute, Operator::Lt, value.into()))
    }

    /// `attribute <= value`
    #[must_use]
    pub fn le(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Predicate::new(attribute, Operator::Le, value.into()))
    }

    /// `attribute > value`
    #[must_use]
    pub fn gt(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Predicate::new(attribute, Operator::Gt, value.into()))
    }

    /// `attribute >= value`
    #[must_use]
    pub fn ge(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Predicate::new(attribute, Operator::Ge, value.into()))
    }

    /// `attribute LIKE pattern`, case-sensitive, `%` and `_` wildcards
    #[must_use]
    pub fn like(self, attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.push(Predicate::new(
            attribute,
            Operator::Like,
            Value::Text(pattern.into()),
        ))
    }

    /// `attribute IS NULL`
    #[must_use]
    pub fn is_null(self, attribute: impl Into<String>) -> Self {
        self.push(Predicate::new(attribute, Operator::IsNull, Value::Null))
    }

    /// `attribute IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, attribute: impl Into<String>) -> Self {
        self.push(Predicate::new(attribute, Operator::IsNotNull, Value::Null))
    }

    /// Append an ordering; earlier orderings take precedence
    #[must_use]
    pub fn order_by(mut self, attribute: impl Into<String>, direction: Direction) -> Self {
        self.ordering.push(Sort::new(attribute, direction));
        self
    }

    /// Append a prepared ordering
    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.ordering.push(sort);
        self
    }

    /// Conditions, all of which must hold
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Orderings in precedence order
    #[must_use]
    pub fn ordering(&self) -> &[Sort] {
        &self.ordering
    }

    /// Same predicates without ordering, for counting
    #[must_use]
    pub fn without_ordering(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            ordering: Vec::new(),
        }
    }

    fn push(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Check every referenced attribute against `descriptor`.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::UnknownAttribute`] for a name the entity does not declare
    /// - [`RepositoryError::AssociationNotQueryable`] for association attributes
    /// - [`RepositoryError::InvalidCriteria`] for an entity reference operand
    pub fn validate(&self, descriptor: &EntityDescriptor) -> Result<(), RepositoryError> {
        let names = self
            .predicates
            .iter()
            .map(Predicate::attribute)
            .chain(self.ordering.iter().map(Sort::attribute));

        for name in names {
            let attribute =
                descriptor
                    .attribute(name)
                    .ok_or_else(|| RepositoryError::UnknownAttribute {
                        entity: descriptor.type_name().to_string(),
                        attribute: name.to_string(),
                    })?;
            if attribute.is_association() {
                return Err(RepositoryError::AssociationNotQueryable {
                    entity: descriptor.type_name().to_string(),
                    attribute: name.to_string(),
                });
            }
        }

        if let Some(predicate) = self
            .predicates
            .iter()
            .find(|predicate| matches!(predicate.value, Value::Entity(_)))
        {
            return Err(RepositoryError::InvalidCriteria(format!(
                "attribute '{}' compared against an entity reference",
                predicate.attribute
            )));
        }

        Ok(())
    }
}

/// Compile a SQL `LIKE` pattern into an anchored regex
///
/// # Errors
///
/// Returns the regex compilation error.
pub fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push_str("(?s)^");
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => expression.push_str(".*"),
            '_' => expression.push('.'),
            other => expression.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    expression.push('$');
    Regex::new(&expression)
}
