//! Code generation
//!
//! Turns clumps of the block graph into YAIL forms. Generation never fails as
//! a whole: problems are recorded as diagnostics against the offending block
//! and only the affected clump is dropped.

use std::collections::HashSet;

use indexmap::IndexMap;
use yail_blocks::{Annotation, Block, BlockGraph, BlockId, BlockKind, Genus, LanguageDef, Workspace};

use crate::rules::{LinkRules, COMPONENT_SOCKET, SETTER_SOCKET};
use crate::scope::Scope;
use crate::yail::{self, NULL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    /// A fault in the compiler or the language definition, not in the user's
    /// blocks.
    Internal,
}

/// A message attached to a block during generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub block: BlockId,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn annotation(&self) -> Annotation {
        match self.severity {
            Severity::Warning => Annotation::Warning(self.message.clone()),
            Severity::Error | Severity::Internal => Annotation::Error(self.message.clone()),
        }
    }
}

/// Attach diagnostics to their blocks. Returns how many blocks changed.
pub fn apply_diagnostics(graph: &mut BlockGraph, diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| graph.annotate(d.block, Some(d.annotation())))
        .count()
}

/// A top-level definition in the generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Global { name: String },
    Procedure { name: String, params: Vec<String> },
    Event {
        component: String,
        event: String,
        params: Vec<String>,
    },
}

impl Declaration {
    /// Name under which the runtime stores the definition.
    pub fn key(&self) -> String {
        match self {
            Declaration::Global { name } | Declaration::Procedure { name, .. } => name.clone(),
            Declaration::Event { component, event, .. } => format!("{}.{}", component, event),
        }
    }

    /// Code that redefines the declaration to do nothing, used when its block
    /// is deleted or deactivated in a live session.
    pub fn null_redefinition(&self) -> String {
        match self {
            Declaration::Global { name } => yail::define_global(name, NULL),
            Declaration::Procedure { name, params } => yail::define_procedure(name, params, NULL),
            Declaration::Event { component, event, params } => {
                yail::define_event(component, event, params, &[NULL.to_string()])
            }
        }
    }
}

/// Describe the declaration a block introduces, if any.
pub fn declaration_of(lang: &LanguageDef, workspace: &Workspace, id: BlockId) -> Option<Declaration> {
    let block = workspace.blocks.get(id)?;
    match lang.genus(&block.genus)?.kind {
        BlockKind::GlobalDef => Some(Declaration::Global {
            name: block.label.clone(),
        }),
        BlockKind::ProcedureDef | BlockKind::ProcedureWithResult => Some(Declaration::Procedure {
            name: block.label.clone(),
            params: workspace.procedure_params(id),
        }),
        BlockKind::ComponentEvent => {
            let (component, event) = block.component_and_member()?;
            Some(Declaration::Event {
                component: component.to_string(),
                event: event.to_string(),
                params: event_params(lang, workspace, block)?,
            })
        }
        _ => None,
    }
}

fn event_params(lang: &LanguageDef, workspace: &Workspace, block: &Block) -> Option<Vec<String>> {
    let (component, event) = block.component_and_member()?;
    let genus = &workspace.components.get(component)?.genus;
    let def = lang.component_type(genus)?.event(event)?;
    Some(def.params.iter().map(|p| p.name.clone()).collect())
}

/// Generated code grouped by owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockCode {
    /// Procedures and globals.
    pub globals: Vec<String>,
    /// Event handlers keyed by component name.
    pub by_component: IndexMap<String, Vec<String>>,
}

impl BlockCode {
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.by_component.values().all(Vec::is_empty)
    }
}

/// Why a block could not be generated.
#[derive(Debug)]
enum GenError {
    /// A required socket is empty in live mode.
    EmptySocket { block: BlockId, socket: String },
    /// The subtree refers to a block that no longer exists.
    Stale { block: BlockId },
    /// The user's blocks are wrong in a way the user can fix.
    Invalid { block: BlockId, message: String },
    /// The language definition or the graph is inconsistent.
    System { block: BlockId, message: String },
}

impl GenError {
    fn invalid(block: BlockId, message: impl Into<String>) -> Self {
        GenError::Invalid {
            block,
            message: message.into(),
        }
    }

    fn system(block: BlockId, message: impl Into<String>) -> Self {
        GenError::System {
            block,
            message: message.into(),
        }
    }
}

type GenResult<T = String> = std::result::Result<T, GenError>;

/// YAIL generator over one workspace snapshot.
pub struct CodeGenerator<'a> {
    lang: &'a LanguageDef,
    rules: &'a LinkRules,
    workspace: &'a Workspace,
    /// Live mode: empty required sockets abort the unit instead of
    /// compiling to null.
    for_repl: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(lang: &'a LanguageDef, rules: &'a LinkRules, workspace: &'a Workspace) -> Self {
        Self {
            lang,
            rules,
            workspace,
            for_repl: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn for_repl(mut self, for_repl: bool) -> Self {
        self.for_repl = for_repl;
        self
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Whether any diagnostic so far is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity != Severity::Warning)
    }

    /// Compile the clump rooted at `root`. An aborted clump yields the null
    /// literal.
    pub fn compile(&mut self, root: BlockId) -> String {
        self.compile_unit(root).unwrap_or_else(|| NULL.to_string())
    }

    /// Compile the clump rooted at `root`, or `None` if it was aborted.
    pub fn compile_unit(&mut self, root: BlockId) -> Option<String> {
        match self.gen_top(root) {
            Ok(code) => Some(code),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    /// Compile every top-level declaration of the workspace.
    ///
    /// Loose blocks outside any declaration get a warning and are left out.
    /// A second handler for the same event, or a second definition of the
    /// same name, is an error and only the first is kept.
    pub fn compile_workspace(&mut self) -> BlockCode {
        let ws = self.workspace;
        let mut code = BlockCode::default();
        let mut seen = HashSet::new();

        for root in ws.blocks.roots() {
            let Some(block) = ws.blocks.get(root) else {
                continue;
            };
            let is_declaration = self
                .lang
                .genus(&block.genus)
                .is_some_and(|g| g.kind.is_declaration());
            if !is_declaration {
                self.push(
                    root,
                    Severity::Warning,
                    "This block should be connected to an event block or a procedure definition",
                );
                continue;
            }

            if let Some(decl) = declaration_of(self.lang, ws, root) {
                if !seen.insert(decl.key()) {
                    let message = match decl {
                        Declaration::Event { .. } => "Duplicate event handler for this component".to_string(),
                        _ => format!("Duplicate definition of '{}'", decl.key()),
                    };
                    self.push(root, Severity::Error, message);
                    continue;
                }
            }

            let Some(form) = self.compile_unit(root).filter(|f| !f.is_empty()) else {
                continue;
            };
            match ws.components.owner_of(root) {
                Some(owner) => code
                    .by_component
                    .entry(owner.name.clone())
                    .or_default()
                    .push(form),
                None => code.globals.push(form),
            }
        }

        tracing::debug!(
            globals = code.globals.len(),
            components = code.by_component.len(),
            diagnostics = self.diagnostics.len(),
            "compiled workspace"
        );
        code
    }

    fn block(&self, id: BlockId) -> Option<&'a Block> {
        self.workspace.blocks.get(id)
    }

    fn push(&mut self, block: BlockId, severity: Severity, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            block,
            severity,
            message: message.into(),
        });
    }

    fn report(&mut self, err: GenError) {
        match err {
            GenError::EmptySocket { block, socket } => {
                let severity = if self.for_repl { Severity::Error } else { Severity::Warning };
                self.push(block, severity, format!("This block has an empty socket: '{}'", socket));
            }
            GenError::Stale { block } => {
                self.push(block, Severity::Error, "This block refers to something that no longer exists");
            }
            GenError::Invalid { block, message } => self.push(block, Severity::Error, message),
            GenError::System { block, message } => {
                tracing::error!(block = %block, "{}", message);
                self.push(block, Severity::Internal, message);
            }
        }
    }

    fn gen_top(&mut self, root: BlockId) -> GenResult {
        let stack = self.workspace.blocks.stack(root);
        if stack.len() > 1 {
            let forms = self.gen_stack(root, &Scope::Global)?;
            Ok(yail::begin(&forms))
        } else {
            self.gen_block(root, &Scope::Global)
        }
    }

    fn gen_stack(&mut self, first: BlockId, scope: &Scope<'_>) -> GenResult<Vec<String>> {
        let mut forms = Vec::new();
        for id in self.workspace.blocks.stack(first) {
            let form = self.gen_block(id, scope)?;
            if !form.is_empty() {
                forms.push(form);
            }
        }
        Ok(forms)
    }

    fn gen_block(&mut self, id: BlockId, scope: &Scope<'_>) -> GenResult {
        let Some(block) = self.block(id) else {
            self.report(GenError::system(id, format!("Block {} is missing from the graph", id)));
            return Ok(String::new());
        };
        let lang = self.lang;
        let Some(genus) = lang.genus(&block.genus) else {
            self.report(GenError::system(id, format!("Unknown block genus '{}'", block.genus)));
            return Ok(String::new());
        };
        if block.bad {
            self.push(id, Severity::Error, "This block is invalid and must be fixed before it can run");
            return Ok(NULL.to_string());
        }
        if !block.active {
            return match genus.kind {
                BlockKind::ComponentEvent => self.gen_event(block, None),
                _ => Ok(NULL.to_string()),
            };
        }

        let code = match self.gen_kind(genus, block, scope) {
            Ok(code) => code,
            Err(err @ GenError::System { .. }) => {
                self.report(err);
                return Ok(String::new());
            }
            Err(err) => return Err(err),
        };

        if block.should_report && !code.is_empty() {
            Ok(yail::report(block.id, &code))
        } else {
            Ok(code)
        }
    }

    fn gen_kind(&mut self, genus: &'a Genus, block: &'a Block, scope: &Scope<'_>) -> GenResult {
        let label = block.label.as_str();
        match genus.kind {
            BlockKind::Number => yail::number_literal(label)
                .ok_or_else(|| GenError::invalid(block.id, format!("'{}' is not a valid number", label))),
            BlockKind::Text => Ok(yail::quote_string(label)),
            BlockKind::True => Ok(yail::TRUE.to_string()),
            BlockKind::False => Ok(yail::FALSE.to_string()),
            BlockKind::Color => yail::color_literal(label)
                .ok_or_else(|| GenError::invalid(block.id, format!("'{}' is not a valid color", label))),

            BlockKind::If => {
                let test = self.socket_expr(block, "test", scope)?;
                let then = self.socket_body(block, "then", scope)?;
                if block.child("else").is_some() {
                    let otherwise = self.socket_body(block, "else", scope)?;
                    Ok(format!("(if {} {} {})", test, then, otherwise))
                } else {
                    Ok(format!("(if {} {})", test, then))
                }
            }
            BlockKind::Choose => {
                let test = self.socket_expr(block, "test", scope)?;
                let then = self.socket_expr(block, "then-return", scope)?;
                let otherwise = self.socket_expr(block, "else-return", scope)?;
                Ok(format!("(if {} {} {})", test, then, otherwise))
            }
            BlockKind::While => {
                let test = self.socket_expr(block, "test", scope)?;
                let body = self.socket_body(block, "do", scope)?;
                Ok(format!("(while {} {})", test, body))
            }
            BlockKind::ForEach => {
                let var = self.name_in(block, "variable")?;
                let list = self.socket_expr(block, "in list", scope)?;
                let names = vec![var];
                let inner = scope.push(&names);
                let body = self.socket_body(block, "do", &inner)?;
                Ok(format!("(foreach {} {} {})", names[0], body, list))
            }
            BlockKind::ForRange => {
                let var = self.name_in(block, "variable")?;
                let from = self.socket_expr(block, "from", scope)?;
                let to = self.socket_expr(block, "to", scope)?;
                let by = self.socket_expr(block, "by", scope)?;
                let names = vec![var];
                let inner = scope.push(&names);
                let body = self.socket_body(block, "do", &inner)?;
                Ok(format!("(forrange {} {} {} {} {})", names[0], body, from, to, by))
            }

            BlockKind::GlobalDef => {
                let value = self.socket_expr(block, "initialize to", &Scope::Global)?;
                Ok(yail::define_global(label, &value))
            }
            BlockKind::VariableGet | BlockKind::Argument => {
                if scope.contains(label) {
                    Ok(format!("(lexical-value {})", label))
                } else if genus.kind == BlockKind::Argument {
                    Err(GenError::invalid(block.id, format!("'{}' is not bound here", label)))
                } else {
                    Ok(format!("(get-var {})", label))
                }
            }
            BlockKind::VariableSet => {
                let value = self.socket_expr(block, "to", scope)?;
                if scope.contains(label) {
                    Ok(format!("(set-lexical! {} {})", label, value))
                } else {
                    Ok(format!("(set-var! {} {})", label, value))
                }
            }

            BlockKind::ProcedureDef => {
                let params = self.workspace.procedure_params(block.id);
                let inner = scope.push(&params);
                let body = self.socket_body(block, "do", &inner)?;
                Ok(yail::define_procedure(label, &params, &body))
            }
            BlockKind::ProcedureWithResult => {
                let params = self.workspace.procedure_params(block.id);
                let inner = scope.push(&params);
                let body = self.socket_expr(block, "return", &inner)?;
                Ok(yail::define_procedure(label, &params, &body))
            }
            BlockKind::ProcedureCall => {
                if let Some(def) = block.declaring_parent {
                    if self.block(def).is_none() {
                        return Err(GenError::Stale { block: block.id });
                    }
                }
                let args = self.socket_args(block, scope, false)?;
                let mut out = format!("((get-var {})", label);
                for arg in &args {
                    out.push(' ');
                    out.push_str(arg);
                }
                out.push(')');
                Ok(out)
            }

            BlockKind::ComponentEvent => self.gen_event(block, Some(scope)),
            BlockKind::ComponentGetter => {
                let (component, property) = split_member(block)?;
                Ok(yail::get_property(component, property))
            }
            BlockKind::ComponentSetter => {
                let (component, property) = split_member(block)?;
                let (genus, _) = self.member_of(block)?;
                let value = self.socket_expr(block, SETTER_SOCKET, scope)?;
                let ty = self.rules.property_type(&genus, property);
                Ok(yail::set_property(component, property, &value, ty))
            }
            BlockKind::ComponentMethod => {
                let (component, method) = split_member(block)?;
                let args = self.socket_args(block, scope, false)?;
                Ok(format!(
                    "(call-component-method {} {} {} {})",
                    yail::quote_symbol(component),
                    yail::quote_symbol(method),
                    yail::runtime_list(&args),
                    self.coercion_types(block)
                ))
            }
            BlockKind::ComponentObject => Ok(format!("(get-component {})", label)),
            BlockKind::ComponentTypeGetter => {
                let (ty, property) = split_member(block)?;
                let component = self.socket_expr(block, COMPONENT_SOCKET, scope)?;
                Ok(format!(
                    "(get-property-and-check {} {} {})",
                    component,
                    yail::quote_symbol(ty),
                    yail::quote_symbol(property)
                ))
            }
            BlockKind::ComponentTypeSetter => {
                let (ty, property) = split_member(block)?;
                let component = self.socket_expr(block, COMPONENT_SOCKET, scope)?;
                let value = self.socket_expr(block, SETTER_SOCKET, scope)?;
                Ok(format!(
                    "(set-and-coerce-property-and-check! {} {} {} {} {})",
                    component,
                    yail::quote_symbol(ty),
                    yail::quote_symbol(property),
                    value,
                    yail::quote_symbol(self.rules.property_type(ty, property))
                ))
            }
            BlockKind::ComponentTypeMethod => {
                let (ty, method) = split_member(block)?;
                let component = self.socket_expr(block, COMPONENT_SOCKET, scope)?;
                let args = self.socket_args(block, scope, true)?;
                Ok(format!(
                    "(call-component-type-method {} {} {} {} {})",
                    component,
                    yail::quote_symbol(ty),
                    yail::quote_symbol(method),
                    yail::runtime_list(&args),
                    self.coercion_types(block)
                ))
            }

            BlockKind::Primitive => {
                let primitive = genus.primitive.as_ref().ok_or_else(|| {
                    GenError::system(block.id, format!("Genus '{}' names no runtime primitive", genus.name))
                })?;
                let args = self.socket_args(block, scope, false)?;
                Ok(format!(
                    "(call-yail-primitive {} {} {} {})",
                    primitive.op,
                    yail::runtime_list(&args),
                    self.coercion_types(block),
                    yail::quote_string(&primitive.description)
                ))
            }
        }
    }

    /// `body` is `None` for a deactivated handler, which keeps its
    /// definition but does nothing.
    fn gen_event(&mut self, block: &'a Block, scope: Option<&Scope<'_>>) -> GenResult {
        let (component, event) = split_member(block)?;
        let params = event_params(self.lang, self.workspace, block).ok_or_else(|| {
            GenError::system(block.id, format!("Unknown event '{}'", block.label))
        })?;
        let body = match scope {
            None => vec![NULL.to_string()],
            Some(scope) => {
                let inner = scope.push(&params);
                match block.child("do") {
                    Some(first) => self.gen_stack(first, &inner)?,
                    None => Vec::new(),
                }
            }
        };
        Ok(yail::define_event(component, event, &params, &body))
    }

    fn member_of(&self, block: &'a Block) -> GenResult<(String, &'a str)> {
        self.rules
            .member_of(&self.workspace.components, block)
            .ok_or_else(|| GenError::system(block.id, format!("Unknown component member '{}'", block.label)))
    }

    fn coercion_types(&self, block: &Block) -> String {
        match self.rules.argument_types(&self.workspace.components, block) {
            Some(types) => yail::type_list(&types),
            None => yail::NO_COERCION.to_string(),
        }
    }

    /// Expressions for every socket in order. `skip_component` leaves out
    /// the component socket of generic component blocks.
    fn socket_args(&mut self, block: &'a Block, scope: &Scope<'_>, skip_component: bool) -> GenResult<Vec<String>> {
        let mut args = Vec::with_capacity(block.sockets.len());
        for socket in &block.sockets {
            if skip_component && socket.label == COMPONENT_SOCKET {
                continue;
            }
            args.push(self.socket_expr(block, &socket.label, scope)?);
        }
        Ok(args)
    }

    fn socket_expr(&mut self, block: &'a Block, label: &str, scope: &Scope<'_>) -> GenResult {
        let Some(socket) = block.socket(label) else {
            return Err(GenError::system(block.id, format!("Block has no socket named '{}'", label)));
        };
        match socket.block {
            Some(child) => self.gen_block(child, scope),
            None if self.for_repl && socket.optional => Ok(NULL.to_string()),
            None if self.for_repl => Err(GenError::EmptySocket {
                block: block.id,
                socket: label.to_string(),
            }),
            None => {
                self.push(
                    block.id,
                    Severity::Warning,
                    format!("This block has an empty socket: '{}'", label),
                );
                Ok(NULL.to_string())
            }
        }
    }

    /// A command socket as `(begin ...)`; an empty one is an empty body.
    fn socket_body(&mut self, block: &'a Block, label: &str, scope: &Scope<'_>) -> GenResult {
        match block.child(label) {
            Some(first) => Ok(yail::begin(&self.gen_stack(first, scope)?)),
            None => Ok(yail::begin(&[])),
        }
    }

    /// The name held by an argument block in `label`.
    fn name_in(&self, block: &Block, label: &str) -> GenResult {
        let name = block
            .child(label)
            .and_then(|id| self.block(id))
            .map(|b| b.label.clone());
        name.ok_or_else(|| GenError::EmptySocket {
            block: block.id,
            socket: label.to_string(),
        })
    }
}

fn split_member(block: &Block) -> GenResult<(&str, &str)> {
    block
        .component_and_member()
        .ok_or_else(|| GenError::system(block.id, format!("Malformed component label '{}'", block.label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yail_blocks::genera;

    fn setup() -> (LanguageDef, LinkRules, Workspace) {
        let lang = LanguageDef::standard();
        let rules = LinkRules::new(&lang).unwrap();
        let mut ws = Workspace::new("Screen1");
        ws.add_component("Button1", "Button", "Screen1").unwrap();
        (lang, rules, ws)
    }

    #[test]
    fn test_literals() {
        let (lang, rules, mut ws) = setup();
        let n = ws.add_block(&lang, genera::NUMBER, "42").unwrap();
        let t = ws.add_block(&lang, genera::TEXT, "hi \"there\"").unwrap();
        let c = ws.add_block(&lang, genera::COLOR, "00FF00").unwrap();
        let mut generator = CodeGenerator::new(&lang, &rules, &ws);
        assert_eq!(generator.compile(n), "42");
        assert_eq!(generator.compile(t), "\"hi \\\"there\\\"\"");
        assert_eq!(generator.compile(c), "#xFF00FF00");
    }

    #[test]
    fn test_invalid_number_is_error() {
        let (lang, rules, mut ws) = setup();
        let n = ws.add_block(&lang, genera::NUMBER, "lots").unwrap();
        let mut generator = CodeGenerator::new(&lang, &rules, &ws);
        assert_eq!(generator.compile_unit(n), None);
        assert_eq!(generator.diagnostics()[0].severity, Severity::Error);
    }

    #[test]
    fn test_inactive_block_compiles_to_null() {
        let (lang, rules, mut ws) = setup();
        let n = ws.add_block(&lang, genera::NUMBER, "1").unwrap();
        ws.blocks.set_active(n, false).unwrap();
        let mut generator = CodeGenerator::new(&lang, &rules, &ws);
        assert_eq!(generator.compile(n), NULL);
    }

    #[test]
    fn test_bad_block_compiles_to_null() {
        let (lang, rules, mut ws) = setup();
        let n = ws.add_block(&lang, genera::NUMBER, "5").unwrap();
        ws.blocks.set_bad(n, true).unwrap();
        let mut generator = CodeGenerator::new(&lang, &rules, &ws);
        assert_eq!(generator.compile_unit(n), Some(NULL.to_string()));
        assert_eq!(generator.diagnostics()[0].block, n);
        assert_eq!(generator.diagnostics()[0].severity, Severity::Error);
    }

    #[test]
    fn test_unknown_genus_substitutes_empty_fragment() {
        let (lang, rules, mut ws) = setup();
        let add = ws.add_block(&lang, "add", "").unwrap();
        let bogus = ws.blocks.insert(Block::new(BlockId(100), "no-such-genus", "?"));
        ws.blocks.connect(add, "A", bogus).unwrap();
        let one = ws.add_block(&lang, genera::NUMBER, "1").unwrap();
        ws.blocks.connect(add, "B", one).unwrap();

        let mut generator = CodeGenerator::new(&lang, &rules, &ws);
        let code = generator.compile(add);
        assert!(code.contains("(*list-for-runtime*  1)"));
        assert_eq!(generator.diagnostics()[0].severity, Severity::Internal);
    }

    #[test]
    fn test_declaration_null_redefinitions() {
        let global = Declaration::Global { name: "count".to_string() };
        assert_eq!(global.null_redefinition(), "(def count *the-null-value*)");

        let proc_ = Declaration::Procedure {
            name: "go".to_string(),
            params: vec!["a".to_string()],
        };
        assert_eq!(proc_.null_redefinition(), "(def (go a) *the-null-value*)");

        let event = Declaration::Event {
            component: "Button1".to_string(),
            event: "Click".to_string(),
            params: vec![],
        };
        assert_eq!(
            event.null_redefinition(),
            "(define-event Button1 Click () (set-this-form) *the-null-value*)"
        );
        assert_eq!(event.key(), "Button1.Click");
    }

    #[test]
    fn test_apply_diagnostics_annotates_blocks() {
        let (lang, rules, mut ws) = setup();
        let n = ws.add_block(&lang, genera::NUMBER, "x").unwrap();
        let diagnostics = {
            let mut generator = CodeGenerator::new(&lang, &rules, &ws);
            generator.compile(n);
            generator.take_diagnostics()
        };
        assert_eq!(apply_diagnostics(&mut ws.blocks, &diagnostics), 1);
        assert!(ws.blocks.get(n).unwrap().annotation.as_ref().unwrap().is_error());
    }
}
