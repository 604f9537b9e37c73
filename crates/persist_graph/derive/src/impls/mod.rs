//! Code generation.

// -----------------------------------------------------------------------------
// Modules

mod naming;
mod record;
mod scalar;
mod variant;

// -----------------------------------------------------------------------------
// Entry

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields};

use crate::attributes::TypeAttributes;
use crate::path;

pub(crate) fn derive_persist(ast: &DeriveInput) -> syn::Result<TokenStream> {
    let attrs = TypeAttributes::parse(&ast.attrs)?;
    let persist = path::persist_graph();

    let shape = if attrs.scalar {
        scalar::display_shape(&persist)
    } else {
        match &ast.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(fields) => record::record_shape(&persist, &attrs, ast, fields)?,
                Fields::Unit => record::record_shape(&persist, &attrs, ast, &syn::parse_quote!({}))?,
                Fields::Unnamed(_) => {
                    return Err(syn::Error::new_spanned(
                        &ast.ident,
                        "tuple structs are not supported; name the fields or use `#[persist(scalar)]`",
                    ));
                }
            },
            Data::Enum(data) => scalar::enum_shape(&persist, ast, data)?,
            Data::Union(_) => {
                return Err(syn::Error::new_spanned(
                    &ast.ident,
                    "unions are not supported",
                ));
            }
        }
    };

    let naming = naming::naming_fns(&persist, &attrs, ast);
    let variants = variant::submit_variants(&persist, &attrs, ast)?;

    let ident = &ast.ident;
    let schema_ = path::schema_(&persist);
    let generics = record::persist_generics(&persist, &attrs, ast);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #persist::Persist for #ident #ty_generics #where_clause {
            #naming

            fn shape() -> #schema_::Shape {
                #shape
            }
        }

        #variants
    })
}
