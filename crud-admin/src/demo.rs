//! Sample entities
//!
//! A small HR model used by the documentation, the test suite and the
//! `crud-admin` binary's smoke runs. The namespace `crud_admin::demo` is
//! registered like any application module would be.

use chrono::{DateTime, Utc};

use crate::Entity;

/// Audit columns shared by several entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Entity, sqlx::FromRow)]
#[crud(mapped_superclass)]
pub struct Audited {
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// Who created the row
    pub created_by: Option<String>,
}

/// Person with a boolean flag and an optional column
#[derive(Debug, Clone, PartialEq, Eq, Entity, sqlx::FromRow)]
#[crud(table = "people")]
pub struct Person {
    /// Identifier
    #[crud(id)]
    pub id: i64,
    /// Full name
    pub name: String,
    /// Age in years
    pub age: i32,
    /// Whether the person is active
    pub active: bool,
    /// Contact address
    pub email: Option<String>,
}

impl Person {
    /// Active person without email
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, age: i32) -> Self {
        Self {
            id,
            name: name.into(),
            age,
            active: true,
            email: None,
        }
    }

    /// Set the email address
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Mark as inactive
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Inherits the audit columns; declares no accessors for them
#[derive(Debug, Clone, PartialEq, Eq, Entity, sqlx::FromRow)]
#[crud(table = "departments")]
pub struct Department {
    /// Identifier
    #[crud(id)]
    pub id: i64,
    /// Department name
    pub name: String,
    /// Inherited audit columns
    #[crud(inherit)]
    #[sqlx(flatten)]
    pub audit: Audited,
}

impl Department {
    /// Department with default audit columns
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            audit: Audited::default(),
        }
    }
}

/// Employee with two optional associations
#[derive(Debug, Clone, PartialEq, Eq, Entity)]
#[crud(table = "employees")]
pub struct Employee {
    /// Identifier
    #[crud(id)]
    pub id: i64,
    /// Full name
    pub name: String,
    /// Reporting line
    #[crud(association)]
    pub manager: Option<Person>,
    /// Home department
    #[crud(association)]
    pub department: Option<Department>,
}

impl Employee {
    /// Employee without manager or department
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            manager: None,
            department: None,
        }
    }

    /// Set the manager
    #[must_use]
    pub fn with_manager(mut self, manager: Person) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Set the department
    #[must_use]
    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }
}
