//! Dynamic attribute values
//!
//! Accessors hand back a [`Value`] so admin screens can render any entity
//! without knowing its concrete type. Scalar fields convert through
//! [`ToValue`]; associations are wrapped in an [`EntityRef`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::{Entity, RuntimeType};

/// Value produced by an attribute accessor
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value (`None` field or SQL `NULL`)
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// UUID value
    Uuid(Uuid),
    /// UTC timestamp
    Timestamp(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
    /// Related entity instance
    Entity(EntityRef),
}

impl Value {
    /// Returns true for [`Value::Null`]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the related entity reference, if this is an association value
    #[must_use]
    pub const fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Entity(_) => "entity",
        }
    }

    /// Orders two values of the same kind.
    ///
    /// `Null` sorts before everything else. Integers and floats compare
    /// numerically with each other; NaN equals NaN and sorts after every
    /// other number, as in PostgreSQL. Entity references and mismatched
    /// kinds are not comparable.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => Some(compare_floats(*a, *b)),
            (Self::Int(a), Self::Float(b)) => Some(compare_floats(*a as f64, *b)),
            (Self::Float(a), Self::Int(b)) => Some(compare_floats(*a, *b as f64)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Total order over floats: NaN last, `-0.0 == 0.0`
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Entity(a), Self::Entity(b)) => a == b,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Uuid(value) => write!(f, "{value}"),
            Self::Timestamp(value) => write!(f, "{}", value.to_rfc3339()),
            Self::Date(value) => write!(f, "{value}"),
            Self::Entity(entity) => write!(f, "<{}>", entity.type_name()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Shared handle to a related entity instance
///
/// Holds the instance behind an `Arc<dyn Any>` together with the registered
/// type name, so the target type's accessors can be invoked on it later.
#[derive(Clone)]
pub struct EntityRef {
    type_name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
}

impl EntityRef {
    /// Wrap an entity instance
    #[must_use]
    pub fn new<E: Entity>(entity: E) -> Self {
        Self {
            type_name: E::TYPE_NAME,
            instance: Arc::new(entity),
        }
    }

    /// Registered type name of the referenced entity
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The instance as `&dyn Any`, for type-erased accessors
    #[must_use]
    pub fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self.instance.as_ref()
    }

    /// Borrow the instance as a concrete entity type
    #[must_use]
    pub fn downcast_ref<E: Entity>(&self) -> Option<&E> {
        self.instance.downcast_ref::<E>()
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Conversion of a scalar field into a [`Value`]
///
/// The associated constants feed the generated attribute descriptors, so a
/// field's runtime type and nullability come from its Rust type.
pub trait ToValue {
    /// Runtime type reported in the metamodel
    const RUNTIME_TYPE: RuntimeType;

    /// Whether the field may hold [`Value::Null`]
    const NULLABLE: bool = false;

    /// Read the field as a dynamic value
    fn to_value(&self) -> Value;
}

macro_rules! to_value {
    ($($ty:ty => $runtime:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                const RUNTIME_TYPE: RuntimeType = RuntimeType::$runtime;

                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )*
    };
}

to_value! {
    bool => Bool,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    f32 => Float,
    f64 => Float,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
}

impl<T: ToValue> ToValue for Option<T> {
    const RUNTIME_TYPE: RuntimeType = T::RUNTIME_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}
