//! Schema metamodel
//!
//! The metamodel is the read-only oracle the rest of the crate asks about
//! entity types: which attributes they declare, in which order, which one is
//! the identifier, and how to read each attribute from an instance.
//!
//! Entity types describe themselves through the [`Entity`] trait, normally
//! via `#[derive(Entity)]`:
//!
//! ```rust
//! use crud_admin::prelude::*;
//!
//! #[derive(Debug, Clone, Entity)]
//! #[crud(table = "books")]
//! pub struct Book {
//!     #[crud(id)]
//!     pub id: i64,
//!     pub title: String,
//!     pub in_print: bool,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metamodel = Metamodel::builder().register::<Book>().build()?;
//! let book = metamodel.entity_of::<Book>()?;
//! assert_eq!(book.descriptor().table(), "books");
//! assert_eq!(book.descriptor().identifier().map(|id| id.name()), Some("id"));
//! # Ok(())
//! # }
//! ```
//!
//! The derive also submits an [`EntityRegistration`] to the process-wide
//! inventory, which is what [`Metamodel::from_inventory`] and the
//! [`InventorySource`](crate::discovery::InventorySource) read.

mod accessor;
mod value;

pub use accessor::{accessor_name, Accessor, AccessorTable, ErasedAccessor};
pub use value::{EntityRef, ToValue, Value};

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Marker carried by every registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityMarker {
    /// Type mapped to its own table
    Entity,
    /// Base type whose attributes are inherited by entities embedding it
    MappedSuperclass,
}

impl fmt::Display for EntityMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => write!(f, "entity"),
            Self::MappedSuperclass => write!(f, "mapped_superclass"),
        }
    }
}

/// Whether an attribute holds a plain value or references another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Plain column value
    Scalar,
    /// Reference to another entity
    Association,
}

/// Runtime type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeType {
    /// `bool`
    Bool,
    /// Signed or unsigned integer up to 32 bits, or `i64`
    Integer,
    /// `f32` / `f64`
    Float,
    /// `String`
    Text,
    /// `uuid::Uuid`
    Uuid,
    /// `chrono::DateTime<Utc>`
    Timestamp,
    /// `chrono::NaiveDate`
    Date,
    /// Another entity, by registered type name
    Entity(&'static str),
}

/// Metadata for one persisted attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttributeDescriptor {
    name: String,
    kind: AttributeKind,
    runtime_type: RuntimeType,
    nullable: bool,
    identifier: bool,
}

impl AttributeDescriptor {
    /// Scalar attribute
    #[must_use]
    pub fn scalar(name: impl Into<String>, runtime_type: RuntimeType) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Scalar,
            runtime_type,
            nullable: false,
            identifier: false,
        }
    }

    /// Association attribute referencing `target` (a registered type name)
    #[must_use]
    pub fn association(name: impl Into<String>, target: &'static str) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Association,
            runtime_type: RuntimeType::Entity(target),
            nullable: false,
            identifier: false,
        }
    }

    /// Set nullability
    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark as the identifier attribute
    #[must_use]
    pub const fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    /// Attribute name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scalar or association
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// Runtime type
    #[must_use]
    pub const fn runtime_type(&self) -> &RuntimeType {
        &self.runtime_type
    }

    /// Whether the attribute may be null
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether this is the identifier attribute
    #[must_use]
    pub const fn is_identifier(&self) -> bool {
        self.identifier
    }

    /// Whether this attribute references another entity
    #[must_use]
    pub fn is_association(&self) -> bool {
        self.kind == AttributeKind::Association
    }

    /// Target entity type name for associations
    #[must_use]
    pub const fn target_entity(&self) -> Option<&'static str> {
        match self.runtime_type {
            RuntimeType::Entity(target) => Some(target),
            _ => None,
        }
    }

    /// Conventional accessor name, see [`accessor_name`]
    #[must_use]
    pub fn accessor_name(&self) -> String {
        accessor_name(&self.name, &self.runtime_type, self.nullable)
    }
}

/// Errors raised while building descriptors or the metamodel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetamodelError {
    /// Two attributes share a name
    #[error("entity {entity} declares attribute '{attribute}' more than once")]
    DuplicateAttribute {
        /// Entity type name
        entity: String,
        /// Repeated attribute name
        attribute: String,
    },

    /// More than one identifier attribute
    #[error("entity {entity} declares an unsupported composite key ({attributes:?})")]
    CompositeKey {
        /// Entity type name
        entity: String,
        /// Attributes marked as identifier
        attributes: Vec<String>,
    },

    /// Entity without identifier attribute
    #[error("entity {entity} has no identifier attribute")]
    MissingIdentifier {
        /// Entity type name
        entity: String,
    },

    /// Same type name registered twice
    #[error("entity {entity} is registered more than once")]
    DuplicateEntity {
        /// Entity type name
        entity: String,
    },
}

/// Immutable description of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    type_name: &'static str,
    marker: EntityMarker,
    table: &'static str,
    attributes: Vec<AttributeDescriptor>,
}

impl EntityDescriptor {
    /// Build and validate a descriptor.
    ///
    /// # Errors
    ///
    /// - [`MetamodelError::DuplicateAttribute`] when two attributes share a name
    /// - [`MetamodelError::CompositeKey`] when more than one attribute is an identifier
    /// - [`MetamodelError::MissingIdentifier`] when an [`EntityMarker::Entity`] has none
    pub fn new(
        type_name: &'static str,
        marker: EntityMarker,
        table: &'static str,
        attributes: Vec<AttributeDescriptor>,
    ) -> Result<Self, MetamodelError> {
        let mut seen = HashSet::new();
        for attribute in &attributes {
            if !seen.insert(attribute.name()) {
                return Err(MetamodelError::DuplicateAttribute {
                    entity: type_name.to_string(),
                    attribute: attribute.name().to_string(),
                });
            }
        }

        let identifiers: Vec<String> = attributes
            .iter()
            .filter(|attribute| attribute.is_identifier())
            .map(|attribute| attribute.name().to_string())
            .collect();

        if identifiers.len() > 1 {
            return Err(MetamodelError::CompositeKey {
                entity: type_name.to_string(),
                attributes: identifiers,
            });
        }
        if identifiers.is_empty() && marker == EntityMarker::Entity {
            return Err(MetamodelError::MissingIdentifier {
                entity: type_name.to_string(),
            });
        }

        Ok(Self {
            type_name,
            marker,
            table,
            attributes,
        })
    }

    /// Fully qualified type name (`crate::module::Type`)
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Entity or mapped superclass
    #[must_use]
    pub const fn marker(&self) -> EntityMarker {
        self.marker
    }

    /// Backing table name
    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    /// Attributes in declaration order
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Attribute by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attribute| attribute.name() == name)
    }

    /// The identifier attribute, if any
    #[must_use]
    pub fn identifier(&self) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attribute| attribute.is_identifier())
    }
}

/// A type that can be administered
///
/// Usually derived. Hand-written implementations are useful when the
/// accessor table should differ from the field list.
pub trait Entity: Any + Send + Sync + Sized {
    /// Identifier type; `()` for mapped superclasses without identifier
    type Id: Clone + Send + Sync + fmt::Debug;

    /// Fully qualified type name; its module path is the namespace scanned
    /// by discovery
    const TYPE_NAME: &'static str;

    /// Entity or mapped superclass
    const MARKER: EntityMarker = EntityMarker::Entity;

    /// Backing table name
    const TABLE: &'static str;

    /// Attribute descriptors in declaration order
    fn attributes() -> Vec<AttributeDescriptor>;

    /// Accessors declared on this type itself
    fn accessors() -> AccessorTable<Self>;
}

/// Metamodel entry: descriptor plus type-erased accessors
pub struct EntityType {
    descriptor: EntityDescriptor,
    accessors: IndexMap<String, ErasedAccessor>,
}

impl EntityType {
    /// Build the entry for `E`
    ///
    /// # Errors
    ///
    /// Returns the descriptor validation error, see [`EntityDescriptor::new`].
    pub fn of<E: Entity>() -> Result<Self, MetamodelError> {
        let descriptor = EntityDescriptor::new(E::TYPE_NAME, E::MARKER, E::TABLE, E::attributes())?;
        Ok(Self {
            descriptor,
            accessors: E::accessors().into_erased(),
        })
    }

    /// Descriptor
    #[must_use]
    pub const fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Registered type name
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.descriptor.type_name
    }

    /// Whether an accessor with this name is declared on the type itself
    #[must_use]
    pub fn has_accessor(&self, name: &str) -> bool {
        self.accessors.contains_key(name)
    }

    /// Read an attribute from an instance of this type.
    ///
    /// The accessor is found by its conventional name in this type's own
    /// table. Accessors of a mapped superclass the type inherits attributes
    /// from are never consulted.
    ///
    /// # Errors
    ///
    /// - [`IntrospectionError::AttributeNotFound`] for an unknown attribute
    /// - [`IntrospectionError::AccessorNotFound`] when the type declares no accessor for it
    /// - [`IntrospectionError::ReceiverMismatch`] when `instance` is not of this type
    pub fn read(&self, attribute: &str, instance: &dyn Any) -> Result<Value, IntrospectionError> {
        let descriptor = self.descriptor.attribute(attribute).ok_or_else(|| {
            IntrospectionError::AttributeNotFound {
                entity: self.type_name().to_string(),
                attribute: attribute.to_string(),
            }
        })?;
        self.read_attribute(descriptor, instance)
    }

    pub(crate) fn read_attribute(
        &self,
        descriptor: &AttributeDescriptor,
        instance: &dyn Any,
    ) -> Result<Value, IntrospectionError> {
        let accessor_name = descriptor.accessor_name();
        let accessor = self.accessors.get(&accessor_name).ok_or_else(|| {
            IntrospectionError::AccessorNotFound {
                entity: self.type_name().to_string(),
                attribute: descriptor.name().to_string(),
                accessor: accessor_name.clone(),
            }
        })?;

        accessor(instance).ok_or_else(|| IntrospectionError::ReceiverMismatch {
            entity: self.type_name().to_string(),
            accessor: accessor_name,
        })
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("descriptor", &self.descriptor)
            .field("accessors", &self.accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Errors raised by attribute introspection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    /// Type is not part of the metamodel
    #[error("entity type {type_name} is not registered in the metamodel")]
    UnknownEntity {
        /// Requested type name
        type_name: String,
    },

    /// Attribute is not declared on the entity
    #[error("entity {entity} has no attribute '{attribute}'")]
    AttributeNotFound {
        /// Entity type name
        entity: String,
        /// Requested attribute
        attribute: String,
    },

    /// Entity declares no accessor with the conventional name
    #[error("entity {entity} declares no accessor {accessor}() for attribute '{attribute}'")]
    AccessorNotFound {
        /// Entity type name
        entity: String,
        /// Attribute name
        attribute: String,
        /// Expected accessor name
        accessor: String,
    },

    /// Accessor was invoked on an instance of another type
    #[error("accessor {accessor}() of {entity} was invoked on an instance of another type")]
    ReceiverMismatch {
        /// Entity type name
        entity: String,
        /// Accessor name
        accessor: String,
    },

    /// Attribute is a scalar where an association was required
    #[error("attribute '{attribute}' of {entity} is not an association")]
    NotAnAssociation {
        /// Entity type name
        entity: String,
        /// Attribute name
        attribute: String,
    },

    /// Target entity has no identifier attribute
    #[error("entity {entity} defines no identifier attribute")]
    IdentifierNotDefined {
        /// Entity type name
        entity: String,
    },

    /// Related instance is null
    #[error("attribute '{attribute}' of {entity} is null; cannot dereference the related entity")]
    NullReference {
        /// Entity type name
        entity: String,
        /// Association attribute name
        attribute: String,
    },
}

/// Compile-time registration of an entity type
///
/// Submitted to the `inventory` by `#[derive(Entity)]`.
pub struct EntityRegistration {
    type_name: &'static str,
    marker: EntityMarker,
    describe: fn() -> Result<EntityType, MetamodelError>,
}

impl EntityRegistration {
    /// Registration for `E`
    #[must_use]
    pub const fn of<E: Entity>() -> Self {
        Self {
            type_name: E::TYPE_NAME,
            marker: E::MARKER,
            describe: EntityType::of::<E>,
        }
    }

    /// Registered type name
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Entity or mapped superclass
    #[must_use]
    pub const fn marker(&self) -> EntityMarker {
        self.marker
    }

    /// Build the metamodel entry
    ///
    /// # Errors
    ///
    /// Returns the descriptor validation error.
    pub fn describe(&self) -> Result<EntityType, MetamodelError> {
        (self.describe)()
    }

    /// All registrations linked into the process
    pub fn all() -> impl Iterator<Item = &'static Self> {
        inventory::iter::<Self>.into_iter()
    }
}

impl fmt::Debug for EntityRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistration")
            .field("type_name", &self.type_name)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

inventory::collect!(EntityRegistration);

/// Registry of entity types keyed by type name
#[derive(Debug, Default)]
pub struct Metamodel {
    entities: IndexMap<&'static str, Arc<EntityType>>,
}

impl Metamodel {
    /// Start an explicit metamodel
    #[must_use]
    pub fn builder() -> MetamodelBuilder {
        MetamodelBuilder::default()
    }

    /// Metamodel of every type registered through `#[derive(Entity)]`
    ///
    /// # Errors
    ///
    /// Returns the first descriptor validation error.
    pub fn from_inventory() -> Result<Self, MetamodelError> {
        let mut builder = Self::builder();
        for registration in EntityRegistration::all() {
            builder = builder.registration(registration);
        }
        builder.build()
    }

    /// Entry by type name
    ///
    /// # Errors
    ///
    /// [`IntrospectionError::UnknownEntity`] when the type is not registered.
    pub fn entity(&self, type_name: &str) -> Result<&Arc<EntityType>, IntrospectionError> {
        self.entities
            .get(type_name)
            .ok_or_else(|| IntrospectionError::UnknownEntity {
                type_name: type_name.to_string(),
            })
    }

    /// Entry for `E`
    ///
    /// # Errors
    ///
    /// [`IntrospectionError::UnknownEntity`] when `E` is not registered.
    pub fn entity_of<E: Entity>(&self) -> Result<&Arc<EntityType>, IntrospectionError> {
        self.entity(E::TYPE_NAME)
    }

    /// Whether the type is registered
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.entities.contains_key(type_name)
    }

    /// Registered entries in registration order
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entities.values()
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Builder for [`Metamodel`]
#[derive(Default)]
pub struct MetamodelBuilder {
    pending: Vec<Result<EntityType, MetamodelError>>,
}

impl MetamodelBuilder {
    /// Add `E`
    #[must_use]
    pub fn register<E: Entity>(mut self) -> Self {
        self.pending.push(EntityType::of::<E>());
        self
    }

    /// Add a compile-time registration
    #[must_use]
    pub fn registration(mut self, registration: &EntityRegistration) -> Self {
        self.pending.push(registration.describe());
        self
    }

    /// Validate and freeze.
    ///
    /// # Errors
    ///
    /// Returns the first descriptor error, or
    /// [`MetamodelError::DuplicateEntity`] when a type is added twice.
    pub fn build(self) -> Result<Metamodel, MetamodelError> {
        let mut entities = IndexMap::with_capacity(self.pending.len());
        for entity_type in self.pending {
            let entity_type = entity_type?;
            let type_name = entity_type.type_name();
            if entities.insert(type_name, Arc::new(entity_type)).is_some() {
                return Err(MetamodelError::DuplicateEntity {
                    entity: type_name.to_string(),
                });
            }
        }

        tracing::debug!(entities = entities.len(), "Metamodel built");
        Ok(Metamodel { entities })
    }
}
