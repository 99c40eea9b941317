//! Procedural macros for crud-admin
//!
//! `#[derive(Entity)]` generates the metamodel description of a struct: its
//! attribute descriptors, its accessor table and a compile-time registration
//! that entity discovery picks up.
//!
//! # Attributes
//!
//! Struct level:
//! - `#[crud(table = "name")]` backing table (default: snake_case struct name)
//! - `#[crud(mapped_superclass)]` mark as a base type instead of an entity
//!
//! Field level:
//! - `#[crud(id)]` identifier attribute (exactly one per entity)
//! - `#[crud(association)]` reference to another entity (`T` or `Option<T>`)
//! - `#[crud(inherit)]` embed a mapped superclass; its attributes are
//!   inherited, its accessors are not
//! - `#[crud(skip)]` not persisted

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod entity;

/// Derive `crud_admin::metamodel::Entity`
#[proc_macro_derive(Entity, attributes(crud))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
