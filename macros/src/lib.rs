//! Derive macros for entity-sync
//!
//! This crate removes the per-domain boilerplate of implementing the model
//! and operation traits by hand.
//!
//! # Available Macros
//!
//! - `#[derive(Model)]` - Implements `entity_sync_core::model::Model` from a
//!   model name and a primary-key field
//! - `#[derive(Operation)]` - Implements `entity_sync_core::model::Operation`
//!   for an enum of status-tracked lifecycle operations
//!
//! # Example
//!
//! ```ignore
//! use entity_sync_macros::{Model, Operation};
//!
//! #[derive(Operation, Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum PodOperation {
//!     Compose,
//!     Delete,
//!     #[operation(verb = "refresh", status = "refreshing")]
//!     Refresh,
//! }
//!
//! #[derive(Model, Clone, Debug, PartialEq, Serialize, Deserialize)]
//! #[model(name = "pod", operations = PodOperation)]
//! struct Pod {
//!     id: u32,
//!     name: String,
//! }
//!
//! assert_eq!(Pod::MODEL, "pod");
//! assert_eq!(PodOperation::Compose.status_key(), "composing");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Path, parse_macro_input};

/// Derive macro for model structs
///
/// Generates the `Model` impl: `MODEL`, `PRIMARY_KEY`, `type Id` (the type
/// of the primary-key field), `type Operation` and `primary_key()`.
///
/// # Attributes
///
/// `#[model(...)]` on the struct:
///
/// - `name = "..."` - Model name used on the wire (required)
/// - `primary_key = "..."` - Primary-key field, defaults to `"id"`
/// - `operations = Type` - Operation enum, defaults to `NoOperation`
/// - `specs = path` - `fn(Operation) -> OperationSpec<Self>` overriding the
///   default request shaping and success handling
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to anything but a struct with named fields
/// - `name` is missing
/// - The primary-key field does not exist
///
/// # Example
///
/// ```ignore
/// #[derive(Model, Clone, Debug, PartialEq, Serialize, Deserialize)]
/// #[model(name = "machine", primary_key = "system_id", operations = MachineOperation)]
/// struct Machine {
///     system_id: String,
///     hostname: String,
/// }
///
/// let machine = Machine { system_id: "abc123".into(), hostname: "koala".into() };
/// assert_eq!(machine.primary_key(), "abc123");
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_model(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed `#[model(...)]` arguments
struct ModelArgs {
    name: Option<LitStr>,
    primary_key: Option<LitStr>,
    operations: Option<Path>,
    specs: Option<Path>,
}

fn parse_model_args(input: &DeriveInput) -> syn::Result<ModelArgs> {
    let mut args = ModelArgs {
        name: None,
        primary_key: None,
        operations: None,
        specs: None,
    };

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                args.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("primary_key") {
                args.primary_key = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("operations") {
                args.operations = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("specs") {
                args.specs = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected `name`, `primary_key`, `operations` or `specs`"));
            }
            Ok(())
        })?;
    }

    Ok(args)
}

fn expand_model(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Model)] can only be used on structs",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Model)] requires named fields",
        ));
    };

    let args = parse_model_args(input)?;
    let Some(model_name) = args.name else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Model)] requires #[model(name = \"...\")]",
        ));
    };

    let key_name = args
        .primary_key
        .map_or_else(|| "id".to_string(), |lit| lit.value());
    let Some(key_field) = fields
        .named
        .iter()
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == key_name.as_str()))
    else {
        return Err(syn::Error::new_spanned(
            input,
            format!("#[derive(Model)] found no primary-key field `{key_name}`"),
        ));
    };
    let key_ident = &key_field.ident;
    let key_ty = &key_field.ty;

    let operation_ty = args.operations.map_or_else(
        || quote! { ::entity_sync_core::model::NoOperation },
        |path| quote! { #path },
    );

    let specs_impl = args.specs.map(|path| {
        quote! {
            fn operation_spec(op: Self::Operation) -> ::entity_sync_core::model::OperationSpec<Self> {
                #path(op)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::entity_sync_core::model::Model for #name #ty_generics #where_clause {
            type Id = #key_ty;
            type Operation = #operation_ty;

            const MODEL: &'static str = #model_name;
            const PRIMARY_KEY: &'static str = #key_name;

            fn primary_key(&self) -> Self::Id {
                ::core::clone::Clone::clone(&self.#key_ident)
            }

            #specs_impl
        }
    })
}

/// Derive macro for operation enums
///
/// Generates the `Operation` impl: `ALL` in declaration order, `verb()` and
/// `status_key()`.
///
/// # Attributes
///
/// `#[operation(...)]` on a variant:
///
/// - `verb = "..."` - Method sent to the server. Defaults to the snake_case
///   variant name (`PowerOn` → `"power_on"`)
/// - `status = "..."` - Status flag toggled while the call is in flight.
///   Defaults to the verb's present participle with a trailing `e` dropped
///   (`"compose"` → `"composing"`); give it explicitly for anything
///   irregular
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type
/// - A variant carries fields
/// - Two variants share a status flag
///
/// # Example
///
/// ```ignore
/// #[derive(Operation, Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// enum MachineOperation {
///     Deploy,
///     #[operation(verb = "on", status = "turningOn")]
///     TurnOn,
/// }
///
/// assert_eq!(MachineOperation::Deploy.status_key(), "deploying");
/// assert_eq!(MachineOperation::TurnOn.verb(), "on");
/// ```
#[proc_macro_derive(Operation, attributes(operation))]
pub fn derive_operation(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_operation(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_operation(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Operation)] can only be used on enums",
        ));
    };

    let mut variants = Vec::new();
    let mut verbs = Vec::new();
    let mut statuses: Vec<String> = Vec::new();

    for variant in &data_enum.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "#[derive(Operation)] variants cannot carry fields",
            ));
        }

        let mut verb: Option<String> = None;
        let mut status: Option<String> = None;
        for attr in variant.attrs.iter().filter(|attr| attr.path().is_ident("operation")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("verb") {
                    verb = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("status") {
                    status = Some(meta.value()?.parse::<LitStr>()?.value());
                } else {
                    return Err(meta.error("expected `verb` or `status`"));
                }
                Ok(())
            })?;
        }

        let verb = verb.unwrap_or_else(|| snake_case(&variant.ident.to_string()));
        let status = status.unwrap_or_else(|| participle(&verb));
        if statuses.contains(&status) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("status flag `{status}` is used by more than one operation"),
            ));
        }

        variants.push(&variant.ident);
        verbs.push(verb);
        statuses.push(status);
    }

    let verb_arms = variants.iter().zip(&verbs).map(|(variant, verb)| {
        quote! { Self::#variant => #verb, }
    });
    let status_arms = variants.iter().zip(&statuses).map(|(variant, status)| {
        quote! { Self::#variant => #status, }
    });

    // An empty enum still needs exhaustive (empty) matches
    let (verb_body, status_body) = if variants.is_empty() {
        (quote! { match self {} }, quote! { match self {} })
    } else {
        (
            quote! { match self { #(#verb_arms)* } },
            quote! { match self { #(#status_arms)* } },
        )
    };

    Ok(quote! {
        impl ::entity_sync_core::model::Operation for #name {
            const ALL: &'static [Self] = &[#(Self::#variants),*];

            fn verb(self) -> &'static str {
                #verb_body
            }

            fn status_key(self) -> &'static str {
                #status_body
            }
        }
    })
}

/// `PowerOn` → `power_on`
fn snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `compose` → `composing`, `refresh` → `refreshing`
fn participle(verb: &str) -> String {
    let stem = verb
        .strip_suffix('e')
        .filter(|stem| !stem.ends_with('e') && !stem.is_empty())
        .unwrap_or(verb);
    format!("{stem}ing")
}
