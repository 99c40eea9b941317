//! Accessor tables
//!
//! Every entity declares its accessors explicitly, keyed by the conventional
//! accessor name (`getName`, `isActive`). The introspector derives the name
//! it needs from the attribute descriptor and looks it up here; there is no
//! runtime method guessing.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{RuntimeType, Value};

/// Typed accessor for entity `E`
pub type Accessor<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;

/// Type-erased accessor; yields `None` when the receiver is not the entity
/// type the accessor was declared on.
pub type ErasedAccessor = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;

/// Conventional accessor name for an attribute.
///
/// `is<Capitalized>` for a non-nullable `bool` attribute, `get<Capitalized>`
/// for everything else (including `Option<bool>`).
///
/// ```rust
/// use crud_admin::metamodel::{accessor_name, RuntimeType};
///
/// assert_eq!(accessor_name("age", &RuntimeType::Integer, false), "getAge");
/// assert_eq!(accessor_name("active", &RuntimeType::Bool, false), "isActive");
/// assert_eq!(accessor_name("active", &RuntimeType::Bool, true), "getActive");
/// ```
#[must_use]
pub fn accessor_name(attribute: &str, runtime_type: &RuntimeType, nullable: bool) -> String {
    let prefix = if *runtime_type == RuntimeType::Bool && !nullable {
        "is"
    } else {
        "get"
    };
    format!("{prefix}{}", capitalize(attribute))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Accessors declared by one entity type, in declaration order
pub struct AccessorTable<E> {
    accessors: IndexMap<String, Accessor<E>>,
}

impl<E: 'static> AccessorTable<E> {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            accessors: IndexMap::new(),
        }
    }

    /// Declare an accessor under `name`.
    ///
    /// A later declaration with the same name replaces the earlier one.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        self.accessors.insert(name.into(), Arc::new(accessor));
        self
    }

    /// Look up an accessor by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Accessor<E>> {
        self.accessors.get(name)
    }

    /// Declared accessor names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.accessors.keys().map(String::as_str)
    }

    /// Number of declared accessors
    #[must_use]
    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    /// True when no accessor is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    pub(crate) fn into_erased(self) -> IndexMap<String, ErasedAccessor>
    where
        E: Any,
    {
        self.accessors
            .into_iter()
            .map(|(name, accessor)| {
                let erased: ErasedAccessor = Arc::new(move |instance: &dyn Any| {
                    instance.downcast_ref::<E>().map(|entity| accessor(entity))
                });
                (name, erased)
            })
            .collect()
    }
}

impl<E: 'static> Default for AccessorTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        label: String,
    }

    #[test]
    fn test_accessor_name_prefixes() {
        assert_eq!(accessor_name("name", &RuntimeType::Text, false), "getName");
        assert_eq!(accessor_name("active", &RuntimeType::Bool, false), "isActive");
        assert_eq!(accessor_name("active", &RuntimeType::Bool, true), "getActive");
        assert_eq!(
            accessor_name("manager", &RuntimeType::Entity("app::Person"), true),
            "getManager"
        );
    }

    #[test]
    fn test_capitalize_keeps_rest() {
        assert_eq!(accessor_name("createdAt", &RuntimeType::Timestamp, false), "getCreatedAt");
        assert_eq!(accessor_name("created_at", &RuntimeType::Timestamp, false), "getCreated_at");
    }

    #[test]
    fn test_erased_accessor_rejects_other_receivers() {
        let table = AccessorTable::<Widget>::new()
            .with("getLabel", |widget: &Widget| Value::from(widget.label.clone()));
        assert_eq!(table.len(), 1);

        let erased = table.into_erased();
        let accessor = erased.get("getLabel").unwrap();

        let widget = Widget {
            label: "bolt".into(),
        };
        assert_eq!(accessor(&widget), Some(Value::Text("bolt".into())));
        assert_eq!(accessor(&42_u8), None);
    }
}
