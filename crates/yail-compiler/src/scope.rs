//! Lexical scope chain used during code generation
//!
//! Each procedure, event handler or loop pushes a frame holding the names it
//! binds. Frames live on the Rust stack and are never mutated, so a nested
//! scope cannot leak into a sibling.

#[derive(Debug, Clone, Copy)]
pub enum Scope<'s> {
    /// Global scope: no lexical names.
    Global,
    Frame {
        names: &'s [String],
        parent: &'s Scope<'s>,
    },
}

impl<'s> Scope<'s> {
    /// A child scope binding `names`.
    pub fn push(&'s self, names: &'s [String]) -> Scope<'s> {
        Scope::Frame { names, parent: self }
    }

    /// Whether `name` is bound by an enclosing frame.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Scope::Global => false,
            Scope::Frame { names, parent } => {
                names.iter().any(|n| n == name) || parent.contains(name)
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Scope::Global => 0,
            Scope::Frame { parent, .. } => parent.depth() + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_lookup() {
        let outer_names = vec!["x".to_string()];
        let inner_names = vec!["y".to_string()];
        let global = Scope::Global;
        let outer = global.push(&outer_names);
        let inner = outer.push(&inner_names);

        assert!(inner.contains("x"));
        assert!(inner.contains("y"));
        assert!(!outer.contains("y"));
        assert!(!global.contains("x"));
        assert_eq!(inner.depth(), 2);
    }
}
