//! Paths of the items generated code refers to.

use proc_macro2::TokenStream;
use quote::quote;

/// The access path of `persist_graph` from the crate being compiled.
///
/// Resolved by scanning the caller's Cargo.toml, which is relatively
/// expensive: resolve it once per derive and pass it around.
pub(crate) fn persist_graph() -> syn::Path {
    persist_macro_utils::Manifest::shared(|manifest| manifest.get_crate_path("persist_graph"))
}

#[inline(always)]
pub(crate) fn schema_(persist: &syn::Path) -> TokenStream {
    quote! { #persist::schema }
}

#[inline(always)]
pub(crate) fn exports_(persist: &syn::Path) -> TokenStream {
    quote! { #persist::__macro_exports }
}
