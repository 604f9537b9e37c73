use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{DeriveInput, FieldsNamed, Generics, Visibility, parse_quote};

use crate::attributes::{FieldAttributes, TypeAttributes};
use crate::path;

/// The generics of the impl: every type parameter must be persistable, and
/// a record read through `Default` must have it.
pub(crate) fn persist_generics(
    persist: &syn::Path,
    attrs: &TypeAttributes,
    ast: &DeriveInput,
) -> Generics {
    let mut generics = ast.generics.clone();
    let params: Vec<_> = generics.type_params().map(|param| param.ident.clone()).collect();
    if params.is_empty() {
        return generics;
    }

    let ident = &ast.ident;
    let (_, ty_generics, _) = ast.generics.split_for_impl();
    let where_clause = generics.make_where_clause();
    for param in &params {
        where_clause
            .predicates
            .push(parse_quote!(#param: #persist::Persist));
    }
    if !attrs.no_default && !attrs.scalar && matches!(ast.data, syn::Data::Struct(_)) {
        where_clause
            .predicates
            .push(parse_quote!(#ident #ty_generics: ::core::default::Default));
    }
    generics
}

pub(crate) fn record_shape(
    persist: &syn::Path,
    attrs: &TypeAttributes,
    ast: &DeriveInput,
    fields: &FieldsNamed,
) -> syn::Result<TokenStream> {
    let schema_ = path::schema_(persist);
    let exports_ = path::exports_(persist);

    let mut shape = quote! { #schema_::RecordShape::new() };
    if !attrs.no_default {
        shape.extend(quote! { .with_default::<Self>() });
    }
    if let Some(blank) = &attrs.blank {
        shape.extend(quote! {
            .with_blank(|| #exports_::Box::new(#blank()) as #exports_::Box<dyn ::core::any::Any>)
        });
    }

    for field in &fields.named {
        let field_attrs = FieldAttributes::parse(&field.attrs)?;
        if field_attrs.skip {
            continue;
        }
        if !field_attrs.marked && !matches!(field.vis, Visibility::Public(_)) {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let ident_str = ident.unraw().to_string();
        let ty = &field.ty;
        let options = member_options(&schema_, &field_attrs);

        shape.extend(quote! {
            .field::<Self, #ty>(
                #ident_str,
                #options,
                |value| &value.#ident,
                |value| &mut value.#ident,
            )
        });
    }

    if ast.generics.lifetimes().next().is_some() {
        return Err(syn::Error::new_spanned(
            &ast.generics,
            "persisted types cannot borrow; remove the lifetime parameters",
        ));
    }

    Ok(quote! { #schema_::Shape::Record(#shape) })
}

fn member_options(schema_: &TokenStream, attrs: &FieldAttributes) -> TokenStream {
    let mut options = quote! { #schema_::MemberOptions::new() };
    if let Some(name) = &attrs.name {
        options.extend(quote! { .rename(#name) });
    }
    if attrs.reference {
        options.extend(quote! { .reference() });
    }
    if let Some(name) = &attrs.child_name {
        options.extend(quote! { .child_name(#name) });
    }
    if let Some(name) = &attrs.key_name {
        options.extend(quote! { .key_name(#name) });
    }
    if let Some(name) = &attrs.value_name {
        options.extend(quote! { .value_name(#name) });
    }
    if let Some(run) = attrs.run_constructor {
        options.extend(quote! { .run_constructor(#run) });
    }
    options
}
