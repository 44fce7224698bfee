//! Derive macro for object-wiring
//!
//! `#[derive(Wire)]` generates a `Wire` implementation describing the
//! struct's type binding: a zero-argument constructor built from `Default`
//! and one property setter per named field.
//!
//! ```rust,ignore
//! use object_wiring::{BindingTable, Context, Descriptor, Wire};
//!
//! #[derive(Default, Wire)]
//! #[wire(name = "Mailer")]
//! struct Mailer {
//!     host: String,
//!     port: u16,
//!     #[wire(rename = "tls")]
//!     use_tls: bool,
//!     #[wire(skip)]
//!     sent: u64,
//! }
//!
//! let registry = BindingTable::new().with_wired::<Mailer>();
//! let mut ctx = Context::new(registry);
//! ctx.insert(Descriptor::new("mailer", "Mailer").with_property("host", "smtp.local")).unwrap();
//! ```
//!
//! # Attributes
//!
//! Struct level:
//! - `#[wire(name = "...")]` - type name to register under (default: the struct name)
//! - `#[wire(no_constructor)]` - omit the constructor; build through a factory only
//! - `#[wire(assignable_to = "...")]` - declare a supertype name (repeatable)
//!
//! Field level:
//! - `#[wire(skip)]` - no property setter for this field
//! - `#[wire(rename = "...")]` - property name (default: the field name)

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Derive macro for the `Wire` trait.
///
/// Field types must implement `FromResolved`. Unless `no_constructor` is
/// given, the struct must implement `Default`.
#[proc_macro_derive(Wire, attributes(wire))]
pub fn derive_wire(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Wire cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Wire requires named fields; use an empty `{}` body for field-less types",
                ));
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Wire can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Wire can only be derived for structs",
            ));
        }
    };

    let options = StructOptions::parse(&input.attrs)?;
    let type_name = options.name.unwrap_or_else(|| name.to_string());

    let constructor = if options.no_constructor {
        quote! {}
    } else {
        quote! {
            .constructor(::object_wiring::Arity::none(), |_args| {
                ::std::result::Result::Ok(::object_wiring::Object::new(
                    <#name as ::std::default::Default>::default(),
                ))
            })
        }
    };

    let supertypes = options.assignable_to.iter().map(|supertype| {
        quote! { .assignable_to(#supertype) }
    });

    let mut setters = Vec::new();
    for field in fields {
        let options = FieldOptions::parse(&field.attrs)?;
        if options.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let property = options.rename.unwrap_or_else(|| ident.to_string());

        setters.push(quote! {
            .property(#property, |this: &mut #name, value: &::object_wiring::Resolved| {
                this.#ident = <#ty as ::object_wiring::FromResolved>::from_resolved(value)?;
                ::std::result::Result::Ok(())
            })
        });
    }

    Ok(quote! {
        impl ::object_wiring::Wire for #name {
            fn binding() -> ::object_wiring::TypeBinding {
                ::object_wiring::TypeBinding::of::<#name>(#type_name)
                    #constructor
                    #(#setters)*
                    #(#supertypes)*
            }
        }
    })
}

#[derive(Default)]
struct StructOptions {
    name: Option<String>,
    no_constructor: bool,
    assignable_to: Vec<String>,
}

impl StructOptions {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("wire")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    options.name = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else if meta.path.is_ident("no_constructor") {
                    options.no_constructor = true;
                    Ok(())
                } else if meta.path.is_ident("assignable_to") {
                    options
                        .assignable_to
                        .push(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `name`, `no_constructor` or `assignable_to`"))
                }
            })?;
        }
        Ok(options)
    }
}

#[derive(Default)]
struct FieldOptions {
    skip: bool,
    rename: Option<String>,
}

impl FieldOptions {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("wire")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    options.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `rename`"))
                }
            })?;
        }
        Ok(options)
    }
}
