//! Stable type identity used by the registry, the waiters and the event bus

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A `TypeId` paired with the type's name for diagnostics
///
/// Works for unsized types too, so listener interfaces are keyed as
/// `TypeKey::of::<dyn Trait>()`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    /// Leading path segment of the type name, i.e. the defining crate
    pub fn crate_name(&self) -> &'static str {
        let name = self.name.trim_start_matches("dyn ");
        name.split("::").next().unwrap_or(name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greets {}
    struct Clock;

    #[test]
    fn test_equality_uses_type_id() {
        assert_eq!(TypeKey::of::<Clock>(), TypeKey::of::<Clock>());
        assert_ne!(TypeKey::of::<Clock>(), TypeKey::of::<dyn Greets>());
    }

    #[test]
    fn test_names() {
        let key = TypeKey::of::<Clock>();
        assert_eq!(key.short_name(), "Clock");
        assert_eq!(key.crate_name(), "plinth");
        assert_eq!(TypeKey::of::<dyn Greets>().crate_name(), "plinth");
    }
}
