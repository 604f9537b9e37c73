use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{DataEnum, DeriveInput, Fields};

use crate::attributes::FieldAttributes;
use crate::path;

/// A scalar converted through `Display` and `FromStr`.
pub(crate) fn display_shape(persist: &syn::Path) -> TokenStream {
    let schema_ = path::schema_(persist);
    quote! {
        #schema_::Shape::Scalar(#schema_::ScalarShape::of::<Self>())
    }
}

/// A scalar enum written as the name of its variant.
pub(crate) fn enum_shape(
    persist: &syn::Path,
    ast: &DeriveInput,
    data: &DataEnum,
) -> syn::Result<TokenStream> {
    if ast.generics.params.iter().next().is_some() {
        return Err(syn::Error::new_spanned(
            &ast.generics,
            "generic enums are not supported",
        ));
    }

    let schema_ = path::schema_(persist);
    let exports_ = path::exports_(persist);

    let mut idents = Vec::with_capacity(data.variants.len());
    let mut names = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "only unit variants are supported; use `#[persist(scalar)]` for custom text",
            ));
        }
        let attrs = FieldAttributes::parse(&variant.attrs)?;
        names.push(attrs.name.unwrap_or_else(|| variant.ident.unraw().to_string()));
        idents.push(&variant.ident);
    }

    Ok(quote! {
        #schema_::Shape::Scalar(#schema_::ScalarShape::new(
            |value| {
                let text = match #schema_::downcast_ref::<Self>(value)? {
                    #(Self::#idents => #names,)*
                };
                ::core::result::Result::Ok(::core::convert::From::from(text))
            },
            |text| match text {
                #(#names => ::core::result::Result::Ok(
                    #exports_::Box::new(Self::#idents) as #exports_::Box<dyn ::core::any::Any>
                ),)*
                _ => ::core::result::Result::Err(#persist::Error::parse(
                    <Self as #persist::Persist>::type_name(),
                    text,
                )),
            },
        ))
    })
}
