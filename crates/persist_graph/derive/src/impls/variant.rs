use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::attributes::TypeAttributes;

/// Submits the type for discovery under every `variant_of` trait.
pub(crate) fn submit_variants(
    persist: &syn::Path,
    attrs: &TypeAttributes,
    ast: &DeriveInput,
) -> syn::Result<TokenStream> {
    if attrs.variant_of.is_empty() {
        return Ok(TokenStream::new());
    }
    if ast.generics.params.iter().next().is_some() {
        return Err(syn::Error::new_spanned(
            &ast.generics,
            "`variant_of` cannot be used on generic types; include each instance with `variant!`",
        ));
    }

    let ident = &ast.ident;
    let traits = &attrs.variant_of;
    Ok(quote! {
        #(#persist::submit_variant!(dyn #traits => #ident);)*
    })
}
