//! Parsing of `#[persist(..)]` attributes.

use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, LitBool, LitStr, Type, TypeParamBound};

use crate::PERSIST_ATTRIBUTE_NAME;

fn for_each_persist_attr(
    attrs: &[Attribute],
    mut parse: impl FnMut(ParseNestedMeta) -> syn::Result<()>,
) -> syn::Result<()> {
    for attr in attrs {
        if attr.path().is_ident(PERSIST_ATTRIBUTE_NAME) {
            attr.parse_nested_meta(&mut parse)?;
        }
    }
    Ok(())
}

fn parse_str(meta: &ParseNestedMeta) -> syn::Result<String> {
    Ok(meta.value()?.parse::<LitStr>()?.value())
}

// -----------------------------------------------------------------------------
// TypeAttributes

/// Attributes on the deriving type.
#[derive(Default)]
pub(crate) struct TypeAttributes {
    pub name: Option<String>,
    pub blank: Option<syn::Path>,
    pub no_default: bool,
    pub scalar: bool,
    /// Trait paths from `variant_of = dyn Trait`.
    pub variant_of: Vec<syn::Path>,
}

impl TypeAttributes {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for_each_persist_attr(attrs, |meta| {
            if meta.path.is_ident("name") {
                this.name = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("blank") {
                this.blank = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("no_default") {
                this.no_default = true;
            } else if meta.path.is_ident("scalar") {
                this.scalar = true;
            } else if meta.path.is_ident("variant_of") {
                let ty: Type = meta.value()?.parse()?;
                this.variant_of.push(trait_path(&ty)?);
            } else {
                return Err(meta.error("unknown type attribute; expected one of `name`, `blank`, `no_default`, `scalar`, `variant_of`"));
            }
            Ok(())
        })?;
        Ok(this)
    }
}

fn trait_path(ty: &Type) -> syn::Result<syn::Path> {
    if let Type::TraitObject(object) = ty
        && object.dyn_token.is_some()
    {
        for bound in &object.bounds {
            if let TypeParamBound::Trait(bound) = bound {
                return Ok(bound.path.clone());
            }
        }
    }
    Err(syn::Error::new(ty.span(), "expected `dyn Trait`"))
}

// -----------------------------------------------------------------------------
// FieldAttributes

/// Attributes on a field or an enum variant.
#[derive(Default)]
pub(crate) struct FieldAttributes {
    /// Any `#[persist]` attribute was present.
    pub marked: bool,
    pub name: Option<String>,
    pub reference: bool,
    pub child_name: Option<String>,
    pub key_name: Option<String>,
    pub value_name: Option<String>,
    pub run_constructor: Option<bool>,
    pub skip: bool,
}

impl FieldAttributes {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        this.marked = attrs
            .iter()
            .any(|attr| attr.path().is_ident(PERSIST_ATTRIBUTE_NAME));
        for_each_persist_attr(attrs, |meta| {
            if meta.path.is_ident("name") {
                this.name = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("reference") {
                this.reference = true;
            } else if meta.path.is_ident("child_name") {
                this.child_name = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("key_name") {
                this.key_name = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("value_name") {
                this.value_name = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("run_constructor") {
                this.run_constructor = Some(meta.value()?.parse::<LitBool>()?.value());
            } else if meta.path.is_ident("skip") {
                this.skip = true;
            } else {
                return Err(meta.error("unknown member attribute; expected one of `name`, `reference`, `child_name`, `key_name`, `value_name`, `run_constructor`, `skip`"));
            }
            Ok(())
        })?;
        Ok(this)
    }
}
