//! `#[derive(Entity)]` on application types

use chrono::NaiveDate;
use crud_admin::demo::Person;
use crud_admin::metamodel::{AttributeKind, EntityType, RuntimeType};
use crud_admin::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Entity)]
struct Reviewer {
    #[crud(id)]
    id: i64,
    verified: bool,
}

#[derive(Debug, Clone, Entity)]
struct AuditLog {
    #[crud(id)]
    id: Uuid,
    archived: Option<bool>,
    verified: bool,
    recorded_on: NaiveDate,
    #[crud(skip)]
    scratch: Vec<u8>,
    #[crud(association)]
    reviewer: Reviewer,
}

fn audit_log() -> AuditLog {
    AuditLog {
        id: Uuid::nil(),
        archived: None,
        verified: true,
        recorded_on: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        scratch: vec![1, 2, 3],
        reviewer: Reviewer {
            id: 4,
            verified: false,
        },
    }
}

#[test]
fn test_default_table_is_snake_case() {
    assert_eq!(AuditLog::TABLE, "audit_log");
    assert_eq!(AuditLog::TYPE_NAME, "derive::AuditLog");
    assert_eq!(AuditLog::MARKER, EntityMarker::Entity);
}

#[test]
fn test_attributes_follow_field_types() {
    let entity = EntityType::of::<AuditLog>().unwrap();
    let descriptor = entity.descriptor();

    let names: Vec<&str> = descriptor.attributes().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["id", "archived", "verified", "recorded_on", "reviewer"]);

    let id = descriptor.identifier().unwrap();
    assert_eq!(id.name(), "id");
    assert_eq!(*id.runtime_type(), RuntimeType::Uuid);

    let archived = descriptor.attribute("archived").unwrap();
    assert!(archived.is_nullable());
    assert_eq!(*archived.runtime_type(), RuntimeType::Bool);

    let reviewer = descriptor.attribute("reviewer").unwrap();
    assert_eq!(reviewer.kind(), AttributeKind::Association);
    assert!(!reviewer.is_nullable());
    assert_eq!(reviewer.target_entity(), Some(Reviewer::TYPE_NAME));

    assert!(descriptor.attribute("scratch").is_none());
}

#[test]
fn test_accessor_names() {
    let entity = EntityType::of::<AuditLog>().unwrap();

    assert!(entity.has_accessor("getId"));
    assert!(entity.has_accessor("getArchived"));
    assert!(!entity.has_accessor("isArchived"));
    assert!(entity.has_accessor("isVerified"));
    assert!(entity.has_accessor("getRecordedOn"));
    assert!(entity.has_accessor("getReviewer"));
    assert!(!entity.has_accessor("getScratch"));
}

#[test]
fn test_generated_accessors_read_fields() {
    let entity = EntityType::of::<AuditLog>().unwrap();
    let log = audit_log();

    assert_eq!(entity.read("id", &log).unwrap(), Value::Uuid(Uuid::nil()));
    assert!(entity.read("archived", &log).unwrap().is_null());
    assert_eq!(entity.read("verified", &log).unwrap(), Value::Bool(true));
    assert_eq!(
        entity.read("recorded_on", &log).unwrap().to_string(),
        "2024-02-29"
    );

    let reviewer = entity.read("reviewer", &log).unwrap();
    let reviewer = reviewer.as_entity().unwrap();
    assert_eq!(reviewer.downcast_ref::<Reviewer>(), Some(&log.reviewer));
    assert!(reviewer.downcast_ref::<Person>().is_none());
    assert_eq!(log.scratch.len(), 3);
}

#[test]
fn test_required_association_primary_key() {
    let metamodel = Metamodel::builder()
        .register::<Reviewer>()
        .register::<AuditLog>()
        .build()
        .unwrap();
    let mapper = EntityAttributeMapper::<AuditLog, ()>::new(&metamodel, ()).unwrap();

    assert_eq!(
        mapper
            .associate_primary_key_value("reviewer", &audit_log())
            .unwrap(),
        Value::Int(4)
    );
}

#[test]
fn test_derived_types_are_registered() {
    let metamodel = Metamodel::from_inventory().unwrap();
    assert!(metamodel.contains(AuditLog::TYPE_NAME));
    assert!(metamodel.contains(Reviewer::TYPE_NAME));
    assert!(metamodel.contains(Person::TYPE_NAME));
}
