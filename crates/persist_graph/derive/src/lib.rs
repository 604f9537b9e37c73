//! See [`Persist`].
#![allow(clippy::std_instead_of_core, reason = "proc-macro lib")]
#![allow(clippy::std_instead_of_alloc, reason = "proc-macro lib")]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

static PERSIST_ATTRIBUTE_NAME: &str = "persist";

// -----------------------------------------------------------------------------
// Modules

mod attributes;
mod impls;
mod path;

// -----------------------------------------------------------------------------
// Macros

/// # Persist Derivation
///
/// `#[derive(Persist)]` implements `persist_graph::Persist`.
///
/// - A struct with named fields becomes a record. A field takes part if it
///   is `pub` or carries a `#[persist(..)]` attribute.
/// - A unit struct becomes a record without fields.
/// - An enum whose variants are all units becomes a scalar written as the
///   variant name.
///
/// ## Type Attributes
///
/// ```rust, ignore
/// #[derive(Persist)]
/// #[persist(name = "Transition")]          // document and discriminator name
/// #[persist(no_default)]                   // no `Default` impl
/// #[persist(blank = Transition::blank)]    // `fn() -> Self` for `run_constructor = false`
/// #[persist(variant_of = dyn Edge)]        // submit for discovery
/// #[persist(scalar)]                       // written through `Display` and `FromStr`
/// struct Plain { /* ... */ }
/// ```
///
/// Records materialize through `Default` unless `no_default` is set, in
/// which case a `blank` function is required to read them.
///
/// ## Field Attributes
///
/// ```rust, ignore
/// #[persist(name = "Student")]             // an empty name splices the content into the owner
/// #[persist(reference)]                    // write an address, the value is owned elsewhere
/// #[persist(child_name = "Item")]          // name of sequence elements or map entries
/// #[persist(key_name = "K", value_name = "V")]
/// #[persist(run_constructor = false)]      // read through the blank function
/// #[persist(skip)]                         // never written or read
/// ```
#[proc_macro_derive(Persist, attributes(persist))]
pub fn derive_persist(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    impls::derive_persist(&ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
