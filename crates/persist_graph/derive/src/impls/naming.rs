use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;
use syn::ext::IdentExt;

use crate::attributes::TypeAttributes;
use crate::path;

/// `type_path`, `type_name` and `type_ident`.
///
/// Generic arguments are appended to the path and the name, so
/// `Pair<u8>` is named `Pair<u8>` and identified as `Pair`.
pub(crate) fn naming_fns(
    persist: &syn::Path,
    attrs: &TypeAttributes,
    ast: &DeriveInput,
) -> TokenStream {
    let exports_ = path::exports_(persist);
    let ident = ast.ident.unraw().to_string();
    let name = attrs.name.clone().unwrap_or_else(|| ident.clone());
    let params: Vec<_> = ast.generics.type_params().map(|param| &param.ident).collect();

    if params.is_empty() {
        return quote! {
            fn type_path() -> #exports_::Cow<'static, str> {
                #exports_::Cow::Borrowed(::core::concat!(::core::module_path!(), "::", #ident))
            }

            fn type_name() -> #exports_::Cow<'static, str> {
                #exports_::Cow::Borrowed(#name)
            }

            fn type_ident() -> &'static str {
                #name
            }
        };
    }

    quote! {
        fn type_path() -> #exports_::Cow<'static, str> {
            let args: &[#exports_::Cow<'static, str>] = &[#(<#params as #persist::Persist>::type_path()),*];
            #exports_::Cow::Owned(#exports_::format!(
                "{}::{}<{}>",
                ::core::module_path!(),
                #ident,
                args.join(", "),
            ))
        }

        fn type_name() -> #exports_::Cow<'static, str> {
            let args: &[#exports_::Cow<'static, str>] = &[#(<#params as #persist::Persist>::type_name()),*];
            #exports_::Cow::Owned(#exports_::format!("{}<{}>", #name, args.join(", ")))
        }

        fn type_ident() -> &'static str {
            #name
        }
    }
}
