//! Attribute introspection over the demo model

use crud_admin::demo::{Audited, Department, Employee, Person};
use crud_admin::metamodel::{EntityType, IntrospectionError};
use crud_admin::prelude::*;

fn metamodel() -> Metamodel {
    Metamodel::builder()
        .register::<Audited>()
        .register::<Person>()
        .register::<Department>()
        .register::<Employee>()
        .build()
        .unwrap()
}

#[test]
fn test_sorted_attributes_are_stable() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Employee, ()>::new(&metamodel, ()).unwrap();

    let first: Vec<&str> = mapper.sorted_attributes().iter().map(|a| a.name()).collect();
    let second: Vec<&str> = mapper.sorted_attributes().iter().map(|a| a.name()).collect();
    assert_eq!(first, second);
    assert_eq!(first, vec!["id", "name", "manager", "department"]);
}

#[test]
fn test_scalar_values_use_conventional_accessors() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Person, ()>::new(&metamodel, ()).unwrap();
    let ada = Person::new(1, "Ada", 36).with_email("ada@example.com");

    assert_eq!(mapper.attribute_value("age", &ada).unwrap(), Value::Int(36));
    assert_eq!(mapper.attribute_value("active", &ada).unwrap(), Value::Bool(true));
    assert_eq!(
        mapper.attribute_value("email", &ada).unwrap(),
        Value::Text("ada@example.com".into())
    );
    assert!(mapper
        .attribute_value("email", &Person::new(2, "Alan", 41))
        .unwrap()
        .is_null());

    let person = mapper.entity_type();
    assert!(person.has_accessor("getAge"));
    assert!(person.has_accessor("isActive"));
    assert!(!person.has_accessor("getActive"));
    assert!(person.has_accessor("getEmail"));
}

#[test]
fn test_unknown_attribute() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Person, ()>::new(&metamodel, ()).unwrap();

    assert_eq!(
        mapper
            .attribute_value("missingField", &Person::new(1, "Ada", 36))
            .unwrap_err(),
        IntrospectionError::AttributeNotFound {
            entity: Person::TYPE_NAME.into(),
            attribute: "missingField".into(),
        }
    );
}

#[test]
fn test_inherited_attribute_needs_own_accessor() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Department, ()>::new(&metamodel, ()).unwrap();
    let research = Department::new(7, "Research");

    assert_eq!(
        mapper.attribute_value("name", &research).unwrap(),
        Value::Text("Research".into())
    );
    assert_eq!(
        mapper.attribute_value("created_at", &research).unwrap_err(),
        IntrospectionError::AccessorNotFound {
            entity: Department::TYPE_NAME.into(),
            attribute: "created_at".into(),
            accessor: "getCreatedAt".into(),
        }
    );
}

#[test]
fn test_associate_primary_key_value() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Employee, ()>::new(&metamodel, ()).unwrap();
    let edsger = Employee::new(10, "Edsger")
        .with_manager(Person::new(1, "Grace", 45))
        .with_department(Department::new(7, "Research"));

    assert_eq!(
        mapper.associate_primary_key_value("manager", &edsger).unwrap(),
        Value::Int(1)
    );
    assert_eq!(
        mapper.associate_primary_key_value("department", &edsger).unwrap(),
        Value::Int(7)
    );
}

#[test]
fn test_associate_primary_key_of_null_reference() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Employee, ()>::new(&metamodel, ()).unwrap();

    assert_eq!(
        mapper
            .associate_primary_key_value("manager", &Employee::new(12, "Ken"))
            .unwrap_err(),
        IntrospectionError::NullReference {
            entity: Employee::TYPE_NAME.into(),
            attribute: "manager".into(),
        }
    );
}

#[test]
fn test_related_instance_is_shared_reference() {
    let metamodel = metamodel();
    let mapper = EntityAttributeMapper::<Employee, ()>::new(&metamodel, ()).unwrap();
    let grace = Person::new(1, "Grace", 45);
    let donald = Employee::new(11, "Donald").with_manager(grace.clone());

    let Value::Entity(manager) = mapper.attribute_value("manager", &donald).unwrap() else {
        panic!("manager should be an entity reference");
    };
    assert_eq!(manager.type_name(), Person::TYPE_NAME);
    assert_eq!(manager.downcast_ref::<Person>(), Some(&grace));
}

#[test]
fn test_receiver_mismatch() {
    let person = EntityType::of::<Person>().unwrap();
    let ken = Employee::new(12, "Ken");

    assert_eq!(
        person.read("name", &ken).unwrap_err(),
        IntrospectionError::ReceiverMismatch {
            entity: Person::TYPE_NAME.into(),
            accessor: "getName".into(),
        }
    );
}

#[test]
fn test_result_accumulator_collects_row() {
    let metamodel = metamodel();
    let mut mapper =
        EntityAttributeMapper::<Person, Vec<(String, String)>>::new(&metamodel, Vec::new())
            .unwrap();
    let ada = Person::new(1, "Ada", 36);

    let names: Vec<String> = mapper
        .sorted_attributes()
        .iter()
        .map(|attribute| attribute.name().to_string())
        .collect();
    for name in names {
        let value = mapper.attribute_value(&name, &ada).unwrap();
        mapper.result_mut().push((name, value.to_string()));
    }

    let row = mapper.into_result();
    assert_eq!(row[1], ("name".to_string(), "Ada".to_string()));
    assert_eq!(row[4], ("email".to_string(), "null".to_string()));
}
