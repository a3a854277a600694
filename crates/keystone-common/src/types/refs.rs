//! Collection references.
//!
//! A transaction names the collections it needs either by numeric
//! identifier or by name. The reference is resolved exactly once per
//! transaction, before any lock is taken.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CollectionId;

/// A reference to a collection, by id or by name.
///
/// References arrive from callers and are resolved into live collection
/// handles by the registry. A name that consists only of digits is
/// ambiguous; the registry tries it as an identifier first and falls
/// back to name lookup if no such identifier exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionRef {
    /// Reference by numeric identifier.
    Id(CollectionId),
    /// Reference by name.
    Name(String),
}

impl CollectionRef {
    /// Creates a reference by identifier.
    #[must_use]
    pub const fn id(id: CollectionId) -> Self {
        CollectionRef::Id(id)
    }

    /// Creates a reference by name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        CollectionRef::Name(name.into())
    }

    /// Returns the numeric identifier a name-reference may stand for.
    ///
    /// Returns `Some` when the name consists only of ASCII digits and
    /// parses as a valid identifier. Id-references return their id
    /// directly.
    #[must_use]
    pub fn as_numeric(&self) -> Option<CollectionId> {
        match self {
            CollectionRef::Id(id) => Some(*id),
            CollectionRef::Name(name) => {
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    name.parse::<u64>().ok().map(CollectionId::new)
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionRef::Id(id) => write!(f, "{}", id),
            CollectionRef::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<CollectionId> for CollectionRef {
    fn from(id: CollectionId) -> Self {
        CollectionRef::Id(id)
    }
}

impl From<&str> for CollectionRef {
    fn from(name: &str) -> Self {
        CollectionRef::Name(name.to_string())
    }
}

impl From<String> for CollectionRef {
    fn from(name: String) -> Self {
        CollectionRef::Name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_constructors() {
        let by_id = CollectionRef::id(CollectionId::new(9));
        assert_eq!(by_id, CollectionRef::Id(CollectionId::new(9)));

        let by_name: CollectionRef = "orders".into();
        assert_eq!(by_name, CollectionRef::Name("orders".to_string()));
    }

    #[test]
    fn test_numeric_name_detection() {
        assert_eq!(
            CollectionRef::name("123").as_numeric(),
            Some(CollectionId::new(123))
        );
        assert_eq!(CollectionRef::name("orders").as_numeric(), None);
        assert_eq!(CollectionRef::name("12a").as_numeric(), None);
        assert_eq!(CollectionRef::name("").as_numeric(), None);
    }

    #[test]
    fn test_overflowing_numeric_name() {
        // Too large for u64: treated as a plain name
        assert_eq!(
            CollectionRef::name("99999999999999999999999999").as_numeric(),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CollectionRef::name("orders")), "orders");
        assert_eq!(format!("{}", CollectionRef::id(CollectionId::new(5))), "5");
    }
}
