//! Project assembly
//!
//! Wraps compiled block code with component creation and property
//! initialization to produce a complete YAIL program, either as a form
//! definition or as a REPL reload of the current form.

use yail_blocks::{Component, ComponentTree};

use crate::codegen::BlockCode;
use crate::error::{CompileError, Result};
use crate::rules::LinkRules;
use crate::yail;

/// Package prefix used when none is configured.
pub const DEFAULT_PACKAGE: &str = "appinventor.ai_user";

/// Name the REPL runtime gives the form it starts with.
pub const REPL_FORM_NAME: &str = "Screen1";

pub struct ProjectAssembler<'a> {
    rules: &'a LinkRules,
    package: String,
}

impl<'a> ProjectAssembler<'a> {
    pub fn new(rules: &'a LinkRules) -> Self {
        Self {
            rules,
            package: DEFAULT_PACKAGE.to_string(),
        }
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Assemble the whole program.
    ///
    /// Components are walked parent first, so a parent's creation form
    /// always precedes its children's. Each component's handlers follow its
    /// creation form; block code for components no longer in the tree is
    /// dropped.
    pub fn assemble_program(&self, components: &ComponentTree, code: &BlockCode, for_repl: bool) -> Result<String> {
        let root = components.root().ok_or(CompileError::NoRootForm)?;
        let mut out = String::new();

        if for_repl {
            push_line(&mut out, yail::CLEAR_CURRENT_FORM);
            if root.name != REPL_FORM_NAME {
                push_line(&mut out, &rename_component(REPL_FORM_NAME, &root.name));
            }
        } else {
            push_line(&mut out, yail::SOURCE_HEADER);
            out.push('\n');
            push_line(
                &mut out,
                &format!("(define-form {}.{} {})", self.package, root.name, root.name),
            );
            push_line(&mut out, yail::RUNTIME_REQUIRE);
        }

        for component in components.walk() {
            if !for_repl {
                out.push('\n');
                push_line(&mut out, &format!(";;; {}", component.name));
                out.push('\n');
            }
            if component.parent.is_none() {
                if let Some(form) = self.form_properties(component) {
                    push_line(&mut out, &form);
                }
            } else {
                push_line(&mut out, &self.add_component(component));
            }

            if for_repl {
                continue;
            }
            for form in code.by_component.get(&component.name).into_iter().flatten() {
                push_line(&mut out, form);
            }
        }

        if !code.globals.is_empty() && !for_repl {
            out.push('\n');
        }
        for form in &code.globals {
            push_line(&mut out, form);
        }

        if for_repl {
            // Handlers go after every component exists in the live form.
            for component in components.walk() {
                for form in code.by_component.get(&component.name).into_iter().flatten() {
                    push_line(&mut out, form);
                }
            }
            let names: Vec<String> = components.walk().iter().map(|c| yail::quote_symbol(&c.name)).collect();
            push_line(&mut out, &format!("(call-Initialize-of-components {})", names.join(" ")));
        } else {
            push_line(&mut out, yail::INIT_RUNTIME);
        }

        for name in code.by_component.keys().filter(|n| !components.contains(n)) {
            tracing::warn!(component = %name, "dropping block code for a component that no longer exists");
        }

        Ok(out)
    }

    /// `(set-and-coerce-property! ...)` forms for every designer property.
    pub fn property_setters(&self, component: &Component) -> Vec<String> {
        component
            .properties
            .iter()
            .map(|(property, value)| self.property_setter(component, property, value))
            .collect()
    }

    /// A single property set form, typed from the property table.
    pub fn property_setter(&self, component: &Component, property: &str, value: &str) -> String {
        let ty = self.rules.property_type(&component.genus, property);
        yail::set_property(&component.name, property, &yail::property_value(ty, value), ty)
    }

    /// `(add-component Parent Genus Name props...)`
    pub fn add_component(&self, component: &Component) -> String {
        let parent = component.parent.as_deref().unwrap_or(REPL_FORM_NAME);
        let mut form = format!("(add-component {} {} {}", parent, component.genus, component.name);
        for setter in self.property_setters(component) {
            form.push(' ');
            form.push_str(&setter);
        }
        form.push(')');
        form
    }

    /// Root form properties run once the form exists.
    fn form_properties(&self, root: &Component) -> Option<String> {
        let setters = self.property_setters(root);
        if setters.is_empty() {
            return None;
        }
        Some(format!("(do-after-form-creation {})", setters.join(" ")))
    }
}

/// `(rename-component "Old" "New")`
pub fn rename_component(old: &str, new: &str) -> String {
    format!(
        "(rename-component {} {})",
        yail::quote_string(old),
        yail::quote_string(new)
    )
}

/// `(remove-component "Name")`
pub fn remove_component(name: &str) -> String {
    format!("(remove-component {})", yail::quote_string(name))
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use yail_blocks::LanguageDef;

    fn tree() -> ComponentTree {
        let mut tree = ComponentTree::with_root("Screen1", "Form");
        tree.set_property("Screen1", "Title", "Hello").unwrap();
        tree.add("Button1", "Button", "Screen1").unwrap();
        tree.set_property("Button1", "FontSize", "20").unwrap();
        tree.set_property("Button1", "Enabled", "False").unwrap();
        tree
    }

    #[test]
    fn test_add_component_carries_properties() {
        let lang = LanguageDef::standard();
        let rules = LinkRules::new(&lang).unwrap();
        let tree = tree();
        let asm = ProjectAssembler::new(&rules);
        assert_eq!(
            asm.add_component(tree.get("Button1").unwrap()),
            "(add-component Screen1 Button Button1 \
             (set-and-coerce-property! 'Button1 'FontSize 20 'number) \
             (set-and-coerce-property! 'Button1 'Enabled #f 'boolean))"
        );
    }

    #[test]
    fn test_program_order() {
        let lang = LanguageDef::standard();
        let rules = LinkRules::new(&lang).unwrap();
        let tree = tree();
        let mut code = BlockCode::default();
        code.by_component
            .insert("Button1".to_string(), vec!["(define-event Button1 Click () (set-this-form))".to_string()]);

        let program = ProjectAssembler::new(&rules)
            .package("com.example")
            .assemble_program(&tree, &code, false)
            .unwrap();

        assert!(program.starts_with("#|\n$Source $Yail\n|#\n"));
        assert!(program.contains("(define-form com.example.Screen1 Screen1)"));
        let form_props = program.find("(do-after-form-creation").unwrap();
        let button = program.find("(add-component Screen1 Button Button1").unwrap();
        let handler = program.find("(define-event Button1 Click").unwrap();
        assert!(form_props < button && button < handler);
        assert!(program.trim_end().ends_with("(init-runtime)"));
    }

    #[test]
    fn test_repl_program_renames_and_initializes() {
        let lang = LanguageDef::standard();
        let rules = LinkRules::new(&lang).unwrap();
        let mut tree = tree();
        tree.rename("Screen1", "Main").unwrap();

        let program = ProjectAssembler::new(&rules)
            .assemble_program(&tree, &BlockCode::default(), true)
            .unwrap();
        let lines: Vec<&str> = program.lines().collect();
        assert_eq!(lines[0], "(clear-current-form)");
        assert_eq!(lines[1], "(rename-component \"Screen1\" \"Main\")");
        assert_eq!(
            *lines.last().unwrap(),
            "(call-Initialize-of-components 'Main 'Button1)"
        );
        assert!(!program.contains("define-form"));
    }

    #[test]
    fn test_missing_root_is_error() {
        let lang = LanguageDef::standard();
        let rules = LinkRules::new(&lang).unwrap();
        let result = ProjectAssembler::new(&rules).assemble_program(&ComponentTree::new(), &BlockCode::default(), false);
        assert!(matches!(result, Err(CompileError::NoRootForm)));
    }
}
