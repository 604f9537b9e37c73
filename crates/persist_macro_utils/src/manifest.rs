use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use toml_edit::{Document, Item, Table};

/// Locate an accessible [`syn::Path`] for a workspace crate as seen from the
/// caller's Cargo.toml.
///
/// Generated code has to name `persist_graph` however the invoking crate
/// depends on it: directly, or through the `persist_core` facade.
///
/// ```rust
/// # use persist_macro_utils::Manifest;
/// let p: syn::Path = Manifest::shared(|m| m.get_crate_path("persist_graph"));
/// ```
///
/// # Resolution rules
///
/// 1. If the requested crate is listed in `dependencies`, return `::crate_name`.
/// 2. If the requested name begins with `persist_` and the caller depends on
///    the facade `persist_core`, return `::persist_core::short_name`
///    (e.g. `persist_graph` -> `::persist_core::graph`).
/// 3. Same as 2 for a dependency renamed to `persist`.
/// 4. Repeat steps 1-3 in `dev-dependencies`.
/// 5. Otherwise, fall back to the absolute path `::crate_name`.
///
/// A crate that refers to itself from doctests or its own derives declares
/// `extern crate self as persist_graph;` so that rule 5 also works inside it.
#[derive(Debug)]
pub struct Manifest {
    pub manifest: Option<Document<Box<str>>>,
    pub modified_time: Option<SystemTime>,
}

const FACADE_NAME: &str = "persist_core";
const SHORT_FACADE_NAME: &str = "persist";
const CRATE_PREFIX: &str = "persist_";

impl Manifest {
    #[inline(never)]
    fn get_manifest_path() -> Option<PathBuf> {
        let mut path = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR")?);
        path.push("Cargo.toml");
        path.exists().then_some(path)
    }

    #[inline(never)]
    fn get_manifest_modified_time(path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    #[inline(never)]
    fn read_manifest(path: &Path) -> Option<Document<Box<str>>> {
        let manifest = std::fs::read_to_string(path).ok()?.into_boxed_str();
        Document::parse(manifest).ok()
    }

    fn absolute(name: &str) -> Option<syn::Path> {
        syn::parse_str(&format!("::{name}")).ok()
    }

    fn find_in_deps(deps: &Table, name: &str) -> Option<syn::Path> {
        if deps.contains_key(name) {
            return Self::absolute(name);
        }
        let module = name.strip_prefix(CRATE_PREFIX)?;
        [FACADE_NAME, SHORT_FACADE_NAME]
            .into_iter()
            .find(|facade| deps.contains_key(facade))
            .and_then(|facade| {
                let mut path = Self::absolute(facade)?;
                path.segments.push(syn::parse_str(module).ok()?);
                Some(path)
            })
    }

    /// Return a [`syn::Path`] for the package named `name` as resolved from this
    /// crate's Cargo.toml. See the type documentation for the resolution order.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid Rust path segment.
    #[inline(never)]
    pub fn get_crate_path(&self, name: &str) -> syn::Path {
        let found = self.manifest.as_ref().and_then(|manifest| {
            ["dependencies", "dev-dependencies"]
                .into_iter()
                .filter_map(|section| match manifest.get(section) {
                    Some(Item::Table(deps)) => Some(deps),
                    _ => None,
                })
                .find_map(|deps| Self::find_in_deps(deps, name))
        });

        found
            .or_else(|| Self::absolute(name))
            .unwrap_or_else(|| panic!("`{name}` is not a valid crate name"))
    }

    /// Obtain the [`Manifest`] of the caller's Cargo.toml.
    ///
    /// Parsed manifests are cached per path and invalidated when the file's
    /// modification time changes. Callers should resolve paths once per macro
    /// invocation and pass them around.
    pub fn shared<R>(func: impl FnOnce(&Self) -> R) -> R {
        static MANIFESTS: RwLock<BTreeMap<PathBuf, Manifest>> = RwLock::new(BTreeMap::new());

        let Some(manifest_path) = Self::get_manifest_path() else {
            return func(&Manifest {
                manifest: None,
                modified_time: None,
            });
        };
        let modified_time = Self::get_manifest_modified_time(&manifest_path);

        let manifests = MANIFESTS.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(manifest) = manifests.get(&manifest_path)
            && manifest.modified_time == modified_time
        {
            return func(manifest);
        }

        drop(manifests);

        let manifest = Manifest {
            manifest: Self::read_manifest(&manifest_path),
            modified_time,
        };

        let result = func(&manifest);

        MANIFESTS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(manifest_path, manifest);

        result
    }
}
