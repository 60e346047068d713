//! Type identities used as registry keys.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable key identifying a Rust type.
///
/// Equality and hashing use the [`TypeId`] only; the name is carried for error
/// messages and logs.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
}

impl TypeIdentity {
    /// Returns the identity of `T`.
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, e.g. `alloc::string::String`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, e.g. `String`. Tuple, slice,
    /// array and reference names are returned whole.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        if base.contains(['(', '[', '&']) {
            return self.name;
        }
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIdentity({})", self.name)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_equality() {
        assert_eq!(TypeIdentity::of::<i32>(), TypeIdentity::of::<i32>());
        assert_ne!(TypeIdentity::of::<i32>(), TypeIdentity::of::<u32>());
        assert!(TypeIdentity::of::<String>().is::<String>());
        assert!(!TypeIdentity::of::<String>().is::<&'static str>());
    }

    #[test]
    fn test_identity_hash() {
        let mut set = HashSet::new();
        set.insert(TypeIdentity::of::<u8>());
        set.insert(TypeIdentity::of::<u8>());
        set.insert(TypeIdentity::of::<i8>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeIdentity::of::<String>().short_name(), "String");
        assert_eq!(TypeIdentity::of::<u64>().short_name(), "u64");
        assert_eq!(TypeIdentity::of::<String>().name(), "alloc::string::String");
        assert_eq!(TypeIdentity::of::<Vec<u8>>().short_name(), "Vec<u8>");
    }

    #[test]
    fn test_short_name_keeps_compound_names_whole() {
        let tuple = TypeIdentity::of::<(i32, String)>();
        assert_eq!(tuple.short_name(), tuple.name());
        assert!(tuple.short_name().starts_with('('));
        assert!(tuple.short_name().ends_with(')'));

        let slice = TypeIdentity::of::<[String; 2]>();
        assert_eq!(slice.short_name(), slice.name());
    }
}
