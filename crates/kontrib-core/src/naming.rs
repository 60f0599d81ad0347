//! Naming conventions for declarations the downstream generator emits.
//!
//! The resolver only needs the names, never the declarations, so both sides
//! must agree on these functions.

use crate::ids::{ScopeId, TypeId};

/// Package prefix for generated subcomponents.
pub const COMPONENT_PACKAGE_PREFIX: &str = "kontrib.component";
pub const PARENT_COMPONENT: &str = "ParentComponent";
pub const SUBCOMPONENT_MODULE: &str = "SubcomponentModule";
const SUBCOMPONENT_SUFFIX: &str = "A";

/// Default module generated for a binding of `contributed` in `scope`.
pub fn binding_module(contributed: &TypeId, scope: &ScopeId, multibinding: bool) -> TypeId {
    let suffix = if multibinding {
        "MultiBindingModule"
    } else {
        "BindingModule"
    };
    TypeId::new(format!("{contributed}_{}_{suffix}", scope.simple_name()))
}

/// The subcomponent generated for `contributed` when merged into `parent`.
///
/// The parent's name is encoded in the package to keep the class name short.
pub fn generated_subcomponent(contributed: &TypeId, parent: &TypeId) -> TypeId {
    let parent_segment = parent.as_str().replace('.', "_").to_lowercase();
    TypeId::new(format!(
        "{COMPONENT_PACKAGE_PREFIX}.{parent_segment}.{}{SUBCOMPONENT_SUFFIX}",
        contributed.simple_name()
    ))
}

pub fn parent_component(generated: &TypeId) -> TypeId {
    TypeId::new(format!("{generated}.{PARENT_COMPONENT}"))
}

pub fn subcomponent_module(generated: &TypeId) -> TypeId {
    TypeId::new(format!("{generated}.{SUBCOMPONENT_MODULE}"))
}
