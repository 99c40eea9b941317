//! Test fixtures
//!
//! Sample rows and metamodels over the [`demo`](crate::demo) entities, shared
//! by the unit tests.

use crate::demo::{Audited, Department, Employee, Person};
use crate::metamodel::Metamodel;
use crate::repository::MemoryContext;

// Re-export for convenience
pub use crate::discovery::MockEntitySource;

/// Metamodel with every demo type
#[must_use]
pub fn demo_metamodel() -> Metamodel {
    Metamodel::builder()
        .register::<Audited>()
        .register::<Person>()
        .register::<Department>()
        .register::<Employee>()
        .build()
        .expect("demo entities are valid")
}

/// Four people in id order; Alan is inactive, Ada has an email
#[must_use]
pub fn people() -> Vec<Person> {
    vec![
        Person::new(1, "Grace", 45),
        Person::new(2, "Ada", 36).with_email("ada@example.com"),
        Person::new(3, "Alan", 41).inactive(),
        Person::new(4, "Barbara", 36),
    ]
}

/// Memory context holding [`people`]
#[must_use]
pub fn people_context() -> MemoryContext<Person> {
    MemoryContext::new(people())
}

/// Employees managed by Grace, one without manager
#[must_use]
pub fn staff() -> Vec<Employee> {
    let grace = Person::new(1, "Grace", 45);
    let research = Department::new(7, "Research");
    vec![
        Employee::new(10, "Edsger")
            .with_manager(grace.clone())
            .with_department(research),
        Employee::new(11, "Donald").with_manager(grace),
        Employee::new(12, "Ken"),
    ]
}
