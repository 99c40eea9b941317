//! Attribute introspection for admin views
//!
//! [`EntityAttributeMapper`] binds one entity type, the metamodel and a
//! caller-supplied result accumulator. It is cheap to build, so list and
//! detail views create one per request.
//!
//! Accessors are resolved by convention from the bound type's own accessor
//! table: `is<Name>` for non-nullable `bool` attributes, `get<Name>` for
//! everything else. Accessors declared only on a mapped superclass are not
//! found; an entity inheriting attributes with `#[crud(inherit)]` has to
//! declare accessors for them itself.
//!
//! ```rust
//! use crud_admin::demo::Person;
//! use crud_admin::mapper::EntityAttributeMapper;
//! use crud_admin::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metamodel = Metamodel::builder().register::<Person>().build()?;
//! let mapper = EntityAttributeMapper::<Person, _>::new(&metamodel, Vec::<String>::new())?;
//!
//! let ada = Person::new(1, "Ada", 36);
//! assert_eq!(mapper.attribute_value("age", &ada)?, Value::Int(36));
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::metamodel::{
    AttributeDescriptor, Entity, EntityType, IntrospectionError, Metamodel, Value,
};

/// Introspector bound to entity type `E` and result accumulator `R`
pub struct EntityAttributeMapper<'m, E, R> {
    metamodel: &'m Metamodel,
    entity_type: Arc<EntityType>,
    result: R,
    _entity: PhantomData<fn() -> E>,
}

impl<'m, E: Entity, R> EntityAttributeMapper<'m, E, R> {
    /// Bind `E` within `metamodel`
    ///
    /// # Errors
    ///
    /// [`IntrospectionError::UnknownEntity`] when `E` is not registered.
    pub fn new(metamodel: &'m Metamodel, result: R) -> Result<Self, IntrospectionError> {
        let entity_type = Arc::clone(metamodel.entity_of::<E>()?);
        Ok(Self {
            metamodel,
            entity_type,
            result,
            _entity: PhantomData,
        })
    }

    /// Metamodel entry of the bound type
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Result accumulator
    #[must_use]
    pub const fn result(&self) -> &R {
        &self.result
    }

    /// Mutable result accumulator
    pub fn result_mut(&mut self) -> &mut R {
        &mut self.result
    }

    /// Give back the result accumulator
    #[must_use]
    pub fn into_result(self) -> R {
        self.result
    }

    /// Attributes in canonical order.
    ///
    /// The metamodel's declaration order, collected into an order-preserving
    /// set keyed by name. Two calls over the same metamodel iterate
    /// identically.
    #[must_use]
    pub fn sorted_attributes(&self) -> IndexSet<&AttributeDescriptor> {
        let descriptor = self.entity_type.descriptor();
        let mut names = IndexSet::new();
        for attribute in descriptor.attributes() {
            names.insert(attribute.name());
        }

        names
            .into_iter()
            .filter_map(|name| descriptor.attribute(name))
            .collect()
    }

    /// Value of attribute `name` on `entity`
    ///
    /// # Errors
    ///
    /// - [`IntrospectionError::AttributeNotFound`] for an unknown attribute
    /// - [`IntrospectionError::AccessorNotFound`] when `E` declares no conventional accessor
    pub fn attribute_value(&self, name: &str, entity: &E) -> Result<Value, IntrospectionError> {
        self.entity_type.read(name, entity)
    }

    /// Identifier value of the entity referenced by `foreign_key`
    ///
    /// # Errors
    ///
    /// Everything [`Self::attribute_value`] raises, plus
    /// - [`IntrospectionError::NotAnAssociation`] when `foreign_key` is a scalar
    /// - [`IntrospectionError::UnknownEntity`] when the target type is not registered
    /// - [`IntrospectionError::IdentifierNotDefined`] when the target has no identifier
    /// - [`IntrospectionError::NullReference`] when the related instance is null
    pub fn associate_primary_key_value(
        &self,
        foreign_key: &str,
        entity: &E,
    ) -> Result<Value, IntrospectionError> {
        let entity_name = self.entity_type.type_name();
        let attribute = self
            .entity_type
            .descriptor()
            .attribute(foreign_key)
            .ok_or_else(|| IntrospectionError::AttributeNotFound {
                entity: entity_name.to_string(),
                attribute: foreign_key.to_string(),
            })?;

        let target = attribute
            .target_entity()
            .ok_or_else(|| IntrospectionError::NotAnAssociation {
                entity: entity_name.to_string(),
                attribute: foreign_key.to_string(),
            })?;

        let related = self.attribute_value(foreign_key, entity)?;
        let related = match related {
            Value::Entity(related) => related,
            Value::Null => {
                return Err(IntrospectionError::NullReference {
                    entity: entity_name.to_string(),
                    attribute: foreign_key.to_string(),
                })
            }
            _ => {
                return Err(IntrospectionError::NotAnAssociation {
                    entity: entity_name.to_string(),
                    attribute: foreign_key.to_string(),
                })
            }
        };

        let target_type = self.metamodel.entity(target)?;
        let identifier = target_type.descriptor().identifier().ok_or_else(|| {
            IntrospectionError::IdentifierNotDefined {
                entity: target.to_string(),
            }
        })?;

        tracing::trace!(
            entity = entity_name,
            foreign_key,
            target,
            identifier = identifier.name(),
            "Resolving associated primary key"
        );
        target_type.read_attribute(identifier, related.as_any())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{Department, Employee, Person};
    use crate::metamodel::{AccessorTable, AttributeDescriptor, RuntimeType};

    /// Declares `getActive` where the convention asks for `isActive`
    #[derive(Debug, Clone)]
    struct Switch {
        id: i64,
        active: bool,
    }

    impl Entity for Switch {
        type Id = i64;
        const TYPE_NAME: &'static str = "crud_admin::mapper::tests::Switch";
        const TABLE: &'static str = "switch";

        fn attributes() -> Vec<AttributeDescriptor> {
            vec![
                AttributeDescriptor::scalar("id", RuntimeType::Integer).identifier(),
                AttributeDescriptor::scalar("active", RuntimeType::Bool),
            ]
        }

        fn accessors() -> AccessorTable<Self> {
            AccessorTable::new()
                .with("getId", |switch: &Self| Value::from(switch.id))
                .with("getActive", |switch: &Self| Value::from(switch.active))
        }
    }

    /// Association whose target has no identifier
    #[derive(Debug, Clone)]
    struct Label {
        text: String,
    }

    impl Entity for Label {
        type Id = ();
        const TYPE_NAME: &'static str = "crud_admin::mapper::tests::Label";
        const MARKER: crate::metamodel::EntityMarker =
            crate::metamodel::EntityMarker::MappedSuperclass;
        const TABLE: &'static str = "label";

        fn attributes() -> Vec<AttributeDescriptor> {
            vec![AttributeDescriptor::scalar("text", RuntimeType::Text)]
        }

        fn accessors() -> AccessorTable<Self> {
            AccessorTable::new().with("getText", |label: &Self| Value::from(label.text.clone()))
        }
    }

    #[derive(Debug, Clone)]
    struct Parcel {
        id: i64,
        label: Label,
    }

    impl Entity for Parcel {
        type Id = i64;
        const TYPE_NAME: &'static str = "crud_admin::mapper::tests::Parcel";
        const TABLE: &'static str = "parcel";

        fn attributes() -> Vec<AttributeDescriptor> {
            vec![
                AttributeDescriptor::scalar("id", RuntimeType::Integer).identifier(),
                AttributeDescriptor::association("label", Label::TYPE_NAME),
            ]
        }

        fn accessors() -> AccessorTable<Self> {
            AccessorTable::new()
                .with("getId", |parcel: &Self| Value::from(parcel.id))
                .with("getLabel", |parcel: &Self| {
                    Value::Entity(crate::metamodel::EntityRef::new(parcel.label.clone()))
                })
        }
    }

    fn metamodel() -> Metamodel {
        Metamodel::builder()
            .register::<Person>()
            .register::<Department>()
            .register::<Employee>()
            .register::<Switch>()
            .register::<Label>()
            .register::<Parcel>()
            .build()
            .unwrap()
    }

    #[test]
    fn test_unregistered_entity() {
        let metamodel = Metamodel::builder().register::<Person>().build().unwrap();
        let result = EntityAttributeMapper::<Switch, ()>::new(&metamodel, ());
        assert!(matches!(result, Err(IntrospectionError::UnknownEntity { .. })));
    }

    #[test]
    fn test_sorted_attributes_follow_declaration_order() {
        let metamodel = metamodel();
        let mapper = EntityAttributeMapper::<Person, ()>::new(&metamodel, ()).unwrap();

        let names: Vec<&str> = mapper.sorted_attributes().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["id", "name", "age", "active", "email"]);
    }

    #[test]
    fn test_boolean_uses_is_accessor_only() {
        let metamodel = metamodel();
        let mapper = EntityAttributeMapper::<Switch, ()>::new(&metamodel, ()).unwrap();
        let switch = Switch { id: 1, active: true };

        assert_eq!(mapper.attribute_value("id", &switch).unwrap(), Value::Int(1));
        assert_eq!(
            mapper.attribute_value("active", &switch).unwrap_err(),
            IntrospectionError::AccessorNotFound {
                entity: Switch::TYPE_NAME.into(),
                attribute: "active".into(),
                accessor: "isActive".into(),
            }
        );
    }

    #[test]
    fn test_result_accumulator_is_carried() {
        let metamodel = metamodel();
        let mut mapper =
            EntityAttributeMapper::<Person, Vec<String>>::new(&metamodel, Vec::new()).unwrap();
        let ada = Person::new(1, "Ada", 36);

        let value = mapper.attribute_value("name", &ada).unwrap();
        mapper.result_mut().push(value.to_string());

        assert_eq!(mapper.result(), &vec!["Ada".to_string()]);
        assert_eq!(mapper.into_result(), vec!["Ada".to_string()]);
    }

    #[test]
    fn test_associate_primary_key_of_scalar_fails() {
        let metamodel = metamodel();
        let mapper = EntityAttributeMapper::<Employee, ()>::new(&metamodel, ()).unwrap();
        let employee = Employee::new(10, "Grace");

        assert!(matches!(
            mapper.associate_primary_key_value("name", &employee),
            Err(IntrospectionError::NotAnAssociation { .. })
        ));
    }

    #[test]
    fn test_associate_primary_key_without_target_identifier() {
        let metamodel = metamodel();
        let mapper = EntityAttributeMapper::<Parcel, ()>::new(&metamodel, ()).unwrap();
        let parcel = Parcel {
            id: 1,
            label: Label {
                text: "fragile".into(),
            },
        };

        assert_eq!(
            mapper.associate_primary_key_value("label", &parcel).unwrap_err(),
            IntrospectionError::IdentifierNotDefined {
                entity: Label::TYPE_NAME.into()
            }
        );
    }

    #[test]
    fn test_associate_primary_key_with_unregistered_target() {
        let metamodel = Metamodel::builder().register::<Employee>().build().unwrap();
        let mapper = EntityAttributeMapper::<Employee, ()>::new(&metamodel, ()).unwrap();
        let employee = Employee::new(10, "Grace").with_manager(Person::new(1, "Ada", 36));

        assert!(matches!(
            mapper.associate_primary_key_value("manager", &employee),
            Err(IntrospectionError::UnknownEntity { .. })
        ));
    }
}
