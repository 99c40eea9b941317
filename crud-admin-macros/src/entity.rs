use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Result, Type,
};

#[derive(Default)]
struct EntityOptions {
    table: Option<String>,
    mapped_superclass: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Scalar,
    Id,
    Association,
    Inherit,
    Skip,
}

struct EntityField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    role: FieldRole,
}

pub fn expand(input: &DeriveInput) -> Result<TokenStream> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic types",
        ));
    }

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Entity can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Entity can only be derived for structs with named fields",
            ))
        }
    };

    let options = parse_entity_options(&input.attrs)?;
    let fields = named
        .iter()
        .map(|field| {
            Ok(EntityField {
                ident: field.ident.as_ref().ok_or_else(|| {
                    Error::new_spanned(field, "Entity fields must be named")
                })?,
                ty: &field.ty,
                role: parse_field_role(&field.attrs)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let id_type = identifier_type(ident, &fields, options.mapped_superclass)?;

    let ident_str = LitStr::new(&ident.to_string(), ident.span());
    let table = options
        .table
        .unwrap_or_else(|| ident.to_string().to_case(Case::Snake));
    let marker = if options.mapped_superclass {
        quote!(::crud_admin::metamodel::EntityMarker::MappedSuperclass)
    } else {
        quote!(::crud_admin::metamodel::EntityMarker::Entity)
    };

    let attribute_pushes = fields
        .iter()
        .map(attribute_push)
        .collect::<Result<Vec<_>>>()?;
    let accessor_calls = fields
        .iter()
        .map(accessor_call)
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        impl ::crud_admin::metamodel::Entity for #ident {
            type Id = #id_type;

            const TYPE_NAME: &'static str =
                ::core::concat!(::core::module_path!(), "::", #ident_str);
            const MARKER: ::crud_admin::metamodel::EntityMarker = #marker;
            const TABLE: &'static str = #table;

            fn attributes() -> ::std::vec::Vec<::crud_admin::metamodel::AttributeDescriptor> {
                let mut attributes = ::std::vec::Vec::new();
                #(#attribute_pushes)*
                attributes
            }

            fn accessors() -> ::crud_admin::metamodel::AccessorTable<Self> {
                ::crud_admin::metamodel::AccessorTable::new()
                    #(#accessor_calls)*
            }
        }

        ::crud_admin::__private::inventory::submit! {
            ::crud_admin::metamodel::EntityRegistration::of::<#ident>()
        }
    })
}

fn parse_entity_options(attrs: &[Attribute]) -> Result<EntityOptions> {
    let mut options = EntityOptions::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("crud")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let table: LitStr = meta.value()?.parse()?;
                options.table = Some(table.value());
                Ok(())
            } else if meta.path.is_ident("mapped_superclass") {
                options.mapped_superclass = true;
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"` or `mapped_superclass`"))
            }
        })?;
    }
    Ok(options)
}

fn parse_field_role(attrs: &[Attribute]) -> Result<FieldRole> {
    let mut role = FieldRole::Scalar;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("crud")) {
        attr.parse_nested_meta(|meta| {
            let next = if meta.path.is_ident("id") {
                FieldRole::Id
            } else if meta.path.is_ident("association") {
                FieldRole::Association
            } else if meta.path.is_ident("inherit") {
                FieldRole::Inherit
            } else if meta.path.is_ident("skip") {
                FieldRole::Skip
            } else {
                return Err(meta.error(
                    "expected one of `id`, `association`, `inherit`, `skip`",
                ));
            };

            if role != FieldRole::Scalar {
                return Err(meta.error("a field takes at most one crud role"));
            }
            role = next;
            Ok(())
        })?;
    }
    Ok(role)
}

fn identifier_type(
    ident: &Ident,
    fields: &[EntityField<'_>],
    mapped_superclass: bool,
) -> Result<TokenStream> {
    let ids: Vec<&EntityField<'_>> = fields
        .iter()
        .filter(|field| field.role == FieldRole::Id)
        .collect();

    if let [_, second, ..] = ids.as_slice() {
        return Err(Error::new_spanned(
            second.ident,
            "composite keys are not supported; mark exactly one field with #[crud(id)]",
        ));
    }

    if let Some(id) = ids.first() {
        let ty = id.ty;
        return Ok(quote!(#ty));
    }

    if let Some(base) = fields.iter().find(|field| field.role == FieldRole::Inherit) {
        let ty = base.ty;
        return Ok(quote!(<#ty as ::crud_admin::metamodel::Entity>::Id));
    }

    if mapped_superclass {
        Ok(quote!(()))
    } else {
        Err(Error::new_spanned(
            ident,
            "an entity needs one #[crud(id)] field (or #[crud(mapped_superclass)])",
        ))
    }
}

fn attribute_push(field: &EntityField<'_>) -> Result<TokenStream> {
    let name = LitStr::new(&field.ident.to_string(), field.ident.span());
    let ty = field.ty;

    Ok(match field.role {
        FieldRole::Skip => quote!(),
        FieldRole::Inherit => quote! {
            attributes.extend(<#ty as ::crud_admin::metamodel::Entity>::attributes());
        },
        FieldRole::Scalar | FieldRole::Id => {
            let identifier = if field.role == FieldRole::Id {
                quote!(.identifier())
            } else {
                quote!()
            };
            quote! {
                attributes.push(
                    ::crud_admin::metamodel::AttributeDescriptor::scalar(
                        #name,
                        <#ty as ::crud_admin::metamodel::ToValue>::RUNTIME_TYPE,
                    )
                    .nullable(<#ty as ::crud_admin::metamodel::ToValue>::NULLABLE)
                    #identifier
                );
            }
        }
        FieldRole::Association => {
            let (target, nullable) = association_target(ty);
            quote! {
                attributes.push(
                    ::crud_admin::metamodel::AttributeDescriptor::association(
                        #name,
                        <#target as ::crud_admin::metamodel::Entity>::TYPE_NAME,
                    )
                    .nullable(#nullable)
                );
            }
        }
    })
}

fn accessor_call(field: &EntityField<'_>) -> Result<TokenStream> {
    let name = LitStr::new(&field.ident.to_string(), field.ident.span());
    let ident = field.ident;
    let ty = field.ty;

    Ok(match field.role {
        // inherited accessors stay on the mapped superclass
        FieldRole::Skip | FieldRole::Inherit => quote!(),
        FieldRole::Scalar | FieldRole::Id => quote! {
            .with(
                ::crud_admin::metamodel::accessor_name(
                    #name,
                    &<#ty as ::crud_admin::metamodel::ToValue>::RUNTIME_TYPE,
                    <#ty as ::crud_admin::metamodel::ToValue>::NULLABLE,
                ),
                |entity: &Self| ::crud_admin::metamodel::ToValue::to_value(&entity.#ident),
            )
        },
        FieldRole::Association => {
            let (target, nullable) = association_target(ty);
            let read = if nullable {
                quote! {
                    match &entity.#ident {
                        ::core::option::Option::Some(related) => {
                            ::crud_admin::metamodel::Value::Entity(
                                ::crud_admin::metamodel::EntityRef::new(
                                    ::core::clone::Clone::clone(related),
                                ),
                            )
                        }
                        ::core::option::Option::None => ::crud_admin::metamodel::Value::Null,
                    }
                }
            } else {
                quote! {
                    ::crud_admin::metamodel::Value::Entity(
                        ::crud_admin::metamodel::EntityRef::new(
                            ::core::clone::Clone::clone(&entity.#ident),
                        ),
                    )
                }
            };
            quote! {
                .with(
                    ::crud_admin::metamodel::accessor_name(
                        #name,
                        &::crud_admin::metamodel::RuntimeType::Entity(
                            <#target as ::crud_admin::metamodel::Entity>::TYPE_NAME,
                        ),
                        #nullable,
                    ),
                    |entity: &Self| #read,
                )
            }
        }
    })
}

/// Target entity type of an association field and whether it is optional
fn association_target(ty: &Type) -> (&Type, bool) {
    option_inner(ty).map_or((ty, false), |inner| (inner, true))
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first()? {
        GenericArgument::Type(inner) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}
