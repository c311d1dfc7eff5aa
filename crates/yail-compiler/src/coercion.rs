//! One-hop type coercions
//!
//! The table answers "may a value of type A sit in a socket of type B if the
//! runtime converts it". Coercions never chain: text -> number -> boolean is
//! not derived from the two single hops.

use std::collections::{BTreeMap, BTreeSet};

/// Registered coercions, keyed by source type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionTable {
    rules: BTreeMap<String, BTreeSet<String>>,
}

impl CoercionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The coercions the runtime performs on its own.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register("text", "number", true);
        table.register("list", "text", false);
        table.register("boolean", "text", false);
        table
    }

    /// Register `from -> to`; a reversible rule also registers `to -> from`.
    pub fn register(&mut self, from: &str, to: &str, reversible: bool) {
        self.rules
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        if reversible {
            self.rules
                .entry(to.to_string())
                .or_default()
                .insert(from.to_string());
        }
    }

    pub fn can_coerce(&self, from: &str, to: &str) -> bool {
        self.rules.get(from).is_some_and(|targets| targets.contains(to))
    }

    /// Types `from` coerces to in one hop.
    pub fn targets(&self, from: &str) -> impl Iterator<Item = &str> {
        self.rules
            .get(from)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }
}

/// Outcome of a coercion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionResult {
    /// The link is accepted, possibly through a conversion.
    Allowed { via: Option<(String, String)> },
    /// The link is refused; the reason is shown to the user.
    Refused { reason: String },
}

impl CoercionResult {
    pub fn direct() -> Self {
        CoercionResult::Allowed { via: None }
    }

    pub fn via(from: &str, to: &str) -> Self {
        CoercionResult::Allowed {
            via: Some((from.to_string(), to.to_string())),
        }
    }

    pub fn refused(reason: impl Into<String>) -> Self {
        CoercionResult::Refused { reason: reason.into() }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, CoercionResult::Allowed { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CoercionResult::Refused { reason } => Some(reason),
            CoercionResult::Allowed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_seeds() {
        let table = CoercionTable::standard();
        assert!(table.can_coerce("text", "number"));
        assert!(table.can_coerce("number", "text"));
        assert!(table.can_coerce("list", "text"));
        assert!(table.can_coerce("boolean", "text"));
        assert!(!table.can_coerce("text", "list"));
        assert!(!table.can_coerce("text", "boolean"));
    }

    #[test]
    fn test_no_transitive_closure() {
        let mut table = CoercionTable::new();
        table.register("a", "b", false);
        table.register("b", "c", false);
        assert!(table.can_coerce("a", "b"));
        assert!(!table.can_coerce("a", "c"));
        assert_eq!(table.targets("a").collect::<Vec<_>>(), vec!["b"]);
    }
}
