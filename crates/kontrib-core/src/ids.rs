//! Canonical identifiers for referenced types and scopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Canonical, fully-qualified name of a referenced type.
///
/// Cheap to clone. Ordering is the lexicographic order of the canonical
/// name, which is what every deterministic output in the engine sorts by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(Arc<str>);

impl TypeId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last `.`-separated segment.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl AsRef<str> for TypeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A type used as a scope marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(TypeId);

impl ScopeId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(TypeId::new(name))
    }

    pub fn as_type(&self) -> &TypeId {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn simple_name(&self) -> &str {
        self.0.simple_name()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ScopeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<TypeId> for ScopeId {
    fn from(ty: TypeId) -> Self {
        Self(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name() {
        assert_eq!(TypeId::new("com.example.app.Logger").simple_name(), "Logger");
        assert_eq!(TypeId::new("Logger").simple_name(), "Logger");
    }

    #[test]
    fn ordering_follows_canonical_name() {
        let mut ids = vec![TypeId::new("b.Y"), TypeId::new("a.Z"), TypeId::new("b.X")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(TypeId::as_str).collect();
        assert_eq!(names, ["a.Z", "b.X", "b.Y"]);
    }

    #[test]
    fn scope_wraps_type() {
        let scope = ScopeId::new("com.example.AppScope");
        assert_eq!(scope.simple_name(), "AppScope");
        assert_eq!(scope.as_type(), &TypeId::new("com.example.AppScope"));
        assert_eq!(scope.to_string(), "com.example.AppScope");
    }
}
