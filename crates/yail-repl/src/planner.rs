//! Sync planning
//!
//! Turns edits in the workspace into the YAIL that brings the live form up
//! to date. The planner remembers which components exist on the device, so
//! a rename that would give two live components one name is caught before
//! anything is sent.

use std::collections::BTreeSet;

use yail_blocks::{BlockId, LanguageDef, ModelError, Workspace};
use yail_compiler::assembler::{remove_component, rename_component};
use yail_compiler::{apply_diagnostics, declaration_of, CodeGenerator, Declaration, Diagnostic, LinkRules, ProjectAssembler};

use crate::error::{Result, SyncError};
use crate::protocol::Purpose;

/// An edit the live session has to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    BlockChanged(BlockId),
    /// A declaration was deleted; its definition must be neutralized.
    BlockDeleted(Declaration),
    DoIt(BlockId),
    PropertyChanged { component: String, property: String },
    ComponentAdded { name: String },
    ComponentRemoved { name: String },
    ComponentRenamed { old: String, new: String },
    ProjectLoad,
}

/// One request for the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUnit {
    pub code: String,
    pub purpose: Purpose,
    pub origin: Option<BlockId>,
}

impl SyncUnit {
    fn new(code: impl Into<String>, purpose: Purpose, origin: Option<BlockId>) -> Self {
        Self {
            code: code.into(),
            purpose,
            origin,
        }
    }
}

#[derive(Debug, Default)]
pub struct Plan {
    pub units: Vec<SyncUnit>,
    /// Already attached to their blocks.
    pub diagnostics: Vec<Diagnostic>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

pub struct SyncPlanner<'a> {
    lang: &'a LanguageDef,
    rules: &'a LinkRules,
    live: BTreeSet<String>,
}

impl<'a> SyncPlanner<'a> {
    pub fn new(lang: &'a LanguageDef, rules: &'a LinkRules) -> Self {
        Self {
            lang,
            rules,
            live: BTreeSet::new(),
        }
    }

    /// Components believed to exist on the device.
    pub fn live_components(&self) -> impl Iterator<Item = &str> {
        self.live.iter().map(String::as_str)
    }

    pub fn plan(&mut self, workspace: &mut Workspace, event: WorkspaceEvent) -> Result<Plan> {
        let mut plan = Plan::default();
        match event {
            WorkspaceEvent::BlockChanged(id) => {
                let top = workspace.blocks.top_of_clump(id);
                if declaration_of(self.lang, workspace, top).is_some() {
                    self.compile_into(&mut plan, workspace, top, Purpose::Block);
                }
            }
            WorkspaceEvent::BlockDeleted(decl) => {
                plan.units.push(SyncUnit::new(decl.null_redefinition(), Purpose::Block, None));
            }
            WorkspaceEvent::DoIt(id) => {
                let watched = workspace.blocks.require(id)?.should_report;
                workspace.blocks.set_should_report(id, true)?;
                self.compile_into(&mut plan, workspace, id, Purpose::DoIt);
                workspace.blocks.set_should_report(id, watched)?;
            }
            WorkspaceEvent::PropertyChanged { component, property } => {
                let target = workspace.components.require(&component)?;
                let value = target
                    .properties
                    .get(&property)
                    .ok_or_else(|| ModelError::unknown_member(&target.genus, &property))?;
                let code = ProjectAssembler::new(self.rules).property_setter(target, &property, value);
                plan.units.push(SyncUnit::new(code, Purpose::Property, None));
            }
            WorkspaceEvent::ComponentAdded { name } => {
                let component = workspace.components.require(&name)?;
                let code = ProjectAssembler::new(self.rules).add_component(component);
                plan.units.push(SyncUnit::new(code, Purpose::Component, None));
                self.live.insert(name);
            }
            WorkspaceEvent::ComponentRemoved { name } => {
                plan.units.push(SyncUnit::new(remove_component(&name), Purpose::Component, None));
                self.live.remove(&name);
            }
            WorkspaceEvent::ComponentRenamed { old, new } => {
                if old != new && self.live.contains(&new) {
                    return Err(SyncError::DuplicateComponent(new));
                }
                plan.units.push(SyncUnit::new(rename_component(&old, &new), Purpose::Component, None));
                if self.live.remove(&old) {
                    self.live.insert(new.clone());
                }
                for handler in self.handlers_of(workspace, &new) {
                    self.compile_into(&mut plan, workspace, handler, Purpose::Block);
                }
            }
            WorkspaceEvent::ProjectLoad => {
                let mut generator = CodeGenerator::new(self.lang, self.rules, workspace).for_repl(true);
                let code = generator.compile_workspace();
                let diagnostics = generator.take_diagnostics();
                let program = ProjectAssembler::new(self.rules).assemble_program(&workspace.components, &code, true)?;

                apply_diagnostics(&mut workspace.blocks, &diagnostics);
                plan.diagnostics = diagnostics;
                plan.units.push(SyncUnit::new(program, Purpose::Load, None));
                self.live = workspace.components.iter().map(|c| c.name.clone()).collect();
            }
        }
        Ok(plan)
    }

    fn compile_into(&self, plan: &mut Plan, workspace: &mut Workspace, id: BlockId, purpose: Purpose) {
        let mut generator = CodeGenerator::new(self.lang, self.rules, workspace).for_repl(true);
        let code = generator.compile_unit(id);
        let diagnostics = generator.take_diagnostics();

        apply_diagnostics(&mut workspace.blocks, &diagnostics);
        plan.diagnostics.extend(diagnostics);
        match code {
            Some(code) if !code.is_empty() => plan.units.push(SyncUnit::new(code, purpose, Some(id))),
            _ => tracing::debug!(block = %id, "nothing to send"),
        }
    }

    /// Top-level event handlers that belong to `component`.
    fn handlers_of(&self, workspace: &Workspace, component: &str) -> Vec<BlockId> {
        let Some(owner) = workspace.components.get(component) else {
            return Vec::new();
        };
        let tops: BTreeSet<BlockId> = owner
            .blocks
            .iter()
            .map(|id| workspace.blocks.top_of_clump(*id))
            .collect();
        tops.into_iter()
            .filter(|id| {
                matches!(
                    declaration_of(self.lang, workspace, *id),
                    Some(Declaration::Event { component: ref c, .. }) if c == component
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yail_blocks::genera;

    fn setup() -> (LanguageDef, Workspace) {
        let lang = LanguageDef::standard();
        let mut ws = Workspace::new("Screen1");
        ws.add_component("Button1", "Button", "Screen1").unwrap();
        ws.add_component("Label1", "Label", "Screen1").unwrap();
        (lang, ws)
    }

    #[test]
    fn test_loose_clump_sends_nothing() {
        let (lang, mut ws) = setup();
        let rules = LinkRules::new(&lang).unwrap();
        let number = ws.add_block(&lang, genera::NUMBER, "5").unwrap();

        let mut planner = SyncPlanner::new(&lang, &rules);
        let plan = planner.plan(&mut ws, WorkspaceEvent::BlockChanged(number)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_do_it_reports_and_keeps_watch_flag() {
        let (lang, mut ws) = setup();
        let rules = LinkRules::new(&lang).unwrap();
        let watched = ws.add_block(&lang, genera::NUMBER, "5").unwrap();
        let plain = ws.add_block(&lang, genera::NUMBER, "6").unwrap();
        ws.blocks.set_should_report(watched, true).unwrap();

        let mut planner = SyncPlanner::new(&lang, &rules);
        let plan = planner.plan(&mut ws, WorkspaceEvent::DoIt(watched)).unwrap();
        assert_eq!(plan.units[0].code, format!("(report-block-value \"{}\" 5)", watched));
        assert_eq!(plan.units[0].purpose, Purpose::DoIt);
        assert!(ws.blocks.get(watched).unwrap().should_report);

        planner.plan(&mut ws, WorkspaceEvent::DoIt(plain)).unwrap();
        assert!(!ws.blocks.get(plain).unwrap().should_report);
    }

    #[test]
    fn test_rename_onto_live_name_is_unrecoverable() {
        let (lang, mut ws) = setup();
        let rules = LinkRules::new(&lang).unwrap();
        let mut planner = SyncPlanner::new(&lang, &rules);
        planner.plan(&mut ws, WorkspaceEvent::ProjectLoad).unwrap();

        let err = planner
            .plan(
                &mut ws,
                WorkspaceEvent::ComponentRenamed {
                    old: "Button1".to_string(),
                    new: "Label1".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::DuplicateComponent(ref n) if n == "Label1"));
        assert!(err.is_unrecoverable());
    }

    #[test]
    fn test_property_changed() {
        let (lang, mut ws) = setup();
        let rules = LinkRules::new(&lang).unwrap();
        ws.components.set_property("Label1", "Text", "Hi").unwrap();

        let mut planner = SyncPlanner::new(&lang, &rules);
        let plan = planner
            .plan(
                &mut ws,
                WorkspaceEvent::PropertyChanged {
                    component: "Label1".to_string(),
                    property: "Text".to_string(),
                },
            )
            .unwrap();
        assert_eq!(plan.units[0].code, "(set-and-coerce-property! 'Label1 'Text \"Hi\" 'text)");
        assert_eq!(plan.units[0].purpose, Purpose::Property);
    }
}
