//! Component containment tree

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::error::{ModelError, Result};

/// A named instance of a component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Component type, e.g. `Button`.
    pub genus: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    /// Property values exactly as the designer stores them.
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    /// Blocks derived from this component.
    #[serde(default)]
    pub blocks: BTreeSet<BlockId>,
}

impl Component {
    pub fn new(name: impl Into<String>, genus: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            genus: genus.into(),
            parent: None,
            children: Vec::new(),
            properties: IndexMap::new(),
            blocks: BTreeSet::new(),
        }
    }
}

/// Components of a project; names are unique across the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentTree {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    components: IndexMap<String, Component>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree holding only the root form.
    pub fn with_root(name: impl Into<String>, genus: impl Into<String>) -> Self {
        let root = Component::new(name, genus);
        let mut tree = Self::new();
        tree.root = Some(root.name.clone());
        tree.components.insert(root.name.clone(), root);
        tree
    }

    pub fn root(&self) -> Option<&Component> {
        self.root.as_deref().and_then(|name| self.components.get(name))
    }

    pub fn root_name(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    pub fn require(&self, name: &str) -> Result<&Component> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Component> {
        self.components
            .get_mut(name)
            .ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Add a component under `parent`.
    pub fn add(&mut self, name: impl Into<String>, genus: impl Into<String>, parent: &str) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ModelError::DuplicateComponent(name));
        }
        self.require_mut(parent)?.children.push(name.clone());
        let mut component = Component::new(name.clone(), genus);
        component.parent = Some(parent.to_string());
        self.components.insert(name, component);
        Ok(())
    }

    /// Remove a component and its descendants. Children come before their
    /// parents in the returned list.
    pub fn remove(&mut self, name: &str) -> Result<Vec<Component>> {
        let parent = self.require(name)?.parent.clone();
        let mut order = Vec::new();
        self.post_order(name, &mut order);

        if let Some(parent) = parent {
            if let Some(parent) = self.components.get_mut(&parent) {
                parent.children.retain(|c| c != name);
            }
        }
        if self.root.as_deref() == Some(name) {
            self.root = None;
        }

        Ok(order
            .into_iter()
            .filter_map(|n| self.components.shift_remove(&n))
            .collect())
    }

    fn post_order(&self, name: &str, out: &mut Vec<String>) {
        if let Some(component) = self.get(name) {
            for child in &component.children {
                self.post_order(child, out);
            }
            out.push(name.to_string());
        }
    }

    /// Rename a component. Fails if `new` is already taken.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return self.require(old).map(|_| ());
        }
        if self.contains(new) {
            return Err(ModelError::DuplicateComponent(new.to_string()));
        }
        let index = self
            .components
            .get_index_of(old)
            .ok_or_else(|| ModelError::UnknownComponent(old.to_string()))?;
        let Some(mut component) = self.components.shift_remove(old) else {
            return Err(ModelError::UnknownComponent(old.to_string()));
        };
        component.name = new.to_string();

        for child in &component.children {
            if let Some(c) = self.components.get_mut(child) {
                c.parent = Some(new.to_string());
            }
        }
        if let Some(parent) = component.parent.as_deref() {
            if let Some(parent) = self.components.get_mut(parent) {
                for child in parent.children.iter_mut() {
                    if child == old {
                        *child = new.to_string();
                    }
                }
            }
        }
        if self.root.as_deref() == Some(old) {
            self.root = Some(new.to_string());
        }
        self.components.shift_insert(index, new.to_string(), component);
        Ok(())
    }

    pub fn set_property(&mut self, name: &str, property: &str, value: impl Into<String>) -> Result<()> {
        self.require_mut(name)?
            .properties
            .insert(property.to_string(), value.into());
        Ok(())
    }

    pub fn children_of(&self, name: &str) -> Vec<&Component> {
        self.get(name)
            .map(|c| c.children.iter().filter_map(|n| self.get(n)).collect())
            .unwrap_or_default()
    }

    /// Pre-order walk from the root: every parent precedes its children.
    pub fn walk(&self) -> Vec<&Component> {
        let mut out = Vec::new();
        if let Some(root) = self.root() {
            self.walk_from(root, &mut out);
        }
        out
    }

    fn walk_from<'a>(&'a self, component: &'a Component, out: &mut Vec<&'a Component>) {
        out.push(component);
        for child in self.children_of(&component.name) {
            self.walk_from(child, out);
        }
    }

    /// Find the component that owns a derived block.
    pub fn owner_of(&self, block: BlockId) -> Option<&Component> {
        self.components.values().find(|c| c.blocks.contains(&block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ComponentTree {
        let mut tree = ComponentTree::with_root("Screen1", "Form");
        tree.add("Arrangement1", "HorizontalArrangement", "Screen1").unwrap();
        tree.add("Button1", "Button", "Arrangement1").unwrap();
        tree.add("Label1", "Label", "Screen1").unwrap();
        tree
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = tree();
        let names: Vec<&str> = tree.walk().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Screen1", "Arrangement1", "Button1", "Label1"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut tree = tree();
        assert_eq!(
            tree.add("Button1", "Button", "Screen1"),
            Err(ModelError::DuplicateComponent("Button1".to_string()))
        );
        assert_eq!(
            tree.rename("Label1", "Button1"),
            Err(ModelError::DuplicateComponent("Button1".to_string()))
        );
    }

    #[test]
    fn test_rename_keeps_position_and_links() {
        let mut tree = tree();
        tree.rename("Arrangement1", "Row").unwrap();
        let names: Vec<&str> = tree.walk().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Screen1", "Row", "Button1", "Label1"]);
        assert_eq!(tree.get("Button1").unwrap().parent.as_deref(), Some("Row"));

        tree.rename("Screen1", "Main").unwrap();
        assert_eq!(tree.root_name(), Some("Main"));
    }

    #[test]
    fn test_remove_is_post_order() {
        let mut tree = tree();
        let removed: Vec<String> = tree
            .remove("Arrangement1")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(removed, vec!["Button1", "Arrangement1"]);
        assert!(!tree.contains("Button1"));
        assert_eq!(tree.get("Screen1").unwrap().children, vec!["Label1"]);
    }
}
