//! Link rules
//!
//! Decides whether a block's plug may be connected to a socket, and which
//! types a call site should coerce its arguments to.
//!
//! Rules come from genus directives:
//! - `socket-allow-N = "<socket>:<type>"` adds a type to a socket's allow-list
//! - `socket-exclude-N = "<socket>:<type>"` removes a type from the full type set
//! - `plug-type-N = "<type>"` adds a type to the plug's list
//! - `type-exclude-N = "<type>"` removes a type from the plug's full type set
//!
//! A socket or plug with no directive has no rule and links with anything.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use yail_blocks::{Block, BlockKind, ComponentTree, LanguageDef, VALUE_TYPE};

use crate::coercion::{CoercionResult, CoercionTable};
use crate::error::{CompileError, Result};

/// Property type used when the table has no entry.
pub const FALLBACK_PROPERTY_TYPE: &str = "text";

/// Argument type emitted for sockets without a single concrete type.
pub const ANY_TYPE: &str = "any";

/// Socket on generic component blocks that holds the component itself.
pub const COMPONENT_SOCKET: &str = "component";

/// Socket on property setters that holds the new value.
pub const SETTER_SOCKET: &str = "to";

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?\s*$").expect("valid number pattern")
});

/// Whether text parses as a number the runtime accepts.
pub fn is_number(text: &str) -> bool {
    NUMBER_PATTERN.is_match(text)
}

/// Rule sets derived from one genus.
#[derive(Debug, Clone, Default)]
struct GenusRules {
    sockets: HashMap<String, BTreeSet<String>>,
    plug: Option<BTreeSet<String>>,
}

/// Accumulates allow and exclude directives for one connector.
#[derive(Debug, Default)]
struct RuleBuilder {
    allow: Option<BTreeSet<String>>,
    exclude: Option<BTreeSet<String>>,
}

impl RuleBuilder {
    fn allow(&mut self, ty: &str) {
        let set = self.allow.get_or_insert_with(BTreeSet::new);
        if !ty.is_empty() {
            set.insert(ty.to_string());
        }
    }

    fn exclude(&mut self, ty: &str) {
        self.exclude.get_or_insert_with(BTreeSet::new).insert(ty.to_string());
    }

    /// Allow-lists start empty and accumulate; exclude-lists start from every
    /// known type. When both exist the result is their intersection.
    fn finish(self, known: &BTreeSet<String>) -> BTreeSet<String> {
        let excluded = self
            .exclude
            .map(|ex| known.difference(&ex).cloned().collect::<BTreeSet<_>>());
        match (self.allow, excluded) {
            (Some(allow), Some(rest)) => allow.intersection(&rest).cloned().collect(),
            (Some(allow), None) => allow,
            (None, Some(rest)) => rest,
            (None, None) => BTreeSet::new(),
        }
    }
}

/// Type compatibility rules for a language.
#[derive(Debug, Clone)]
pub struct LinkRules {
    known_types: BTreeSet<String>,
    kinds: HashMap<String, BlockKind>,
    genera: HashMap<String, GenusRules>,
    /// (component genus, property) -> property type
    property_types: HashMap<(String, String), String>,
    /// (component genus, method) -> parameter types
    method_params: HashMap<(String, String), Vec<String>>,
    /// (component genus, method) -> return type
    method_returns: HashMap<(String, String), String>,
    coercions: CoercionTable,
}

impl LinkRules {
    /// Build the rule tables for a language with the standard coercions.
    pub fn new(lang: &LanguageDef) -> Result<Self> {
        let known_types: BTreeSet<String> = lang.types.iter().cloned().collect();
        let mut kinds = HashMap::new();
        let mut genera = HashMap::new();

        for genus in lang.genera.values() {
            kinds.insert(genus.name.clone(), genus.kind);

            let mut sockets: HashMap<String, RuleBuilder> = HashMap::new();
            let mut plug: Option<RuleBuilder> = None;
            for (key, value) in &genus.directives {
                let Some((prefix, index)) = key.rsplit_once('-') else {
                    continue;
                };
                if index.parse::<usize>().is_err() {
                    continue;
                }
                match prefix {
                    "socket-allow" | "socket-exclude" => {
                        let (label, ty) = value.split_once(':').ok_or_else(|| {
                            CompileError::rule_table(&genus.name, key, "expected '<socket>:<type>'")
                        })?;
                        let rule = sockets.entry(label.to_string()).or_default();
                        if prefix == "socket-allow" {
                            rule.allow(ty.trim());
                        } else {
                            rule.exclude(ty.trim());
                        }
                    }
                    "plug-type" => plug.get_or_insert_with(RuleBuilder::default).allow(value.trim()),
                    "type-exclude" => plug.get_or_insert_with(RuleBuilder::default).exclude(value.trim()),
                    _ => {}
                }
            }

            let rules = GenusRules {
                sockets: sockets
                    .into_iter()
                    .map(|(label, rule)| (label, rule.finish(&known_types)))
                    .collect(),
                plug: plug.map(|rule| rule.finish(&known_types)),
            };
            genera.insert(genus.name.clone(), rules);
        }

        let mut property_types = HashMap::new();
        let mut method_params = HashMap::new();
        let mut method_returns = HashMap::new();
        for ty in lang.components.values() {
            for prop in &ty.properties {
                property_types.insert((ty.name.clone(), prop.name.clone()), prop.ty.clone());
            }
            for method in &ty.methods {
                let key = (ty.name.clone(), method.name.clone());
                method_params.insert(key.clone(), method.params.iter().map(|p| p.ty.clone()).collect());
                if let Some(returns) = &method.returns {
                    method_returns.insert(key, returns.clone());
                }
            }
        }

        tracing::debug!(
            genera = genera.len(),
            properties = property_types.len(),
            "built link rule tables"
        );

        Ok(Self {
            known_types,
            kinds,
            genera,
            property_types,
            method_params,
            method_returns,
            coercions: CoercionTable::standard(),
        })
    }

    /// Replace the coercion table.
    pub fn with_coercions(mut self, coercions: CoercionTable) -> Self {
        self.coercions = coercions;
        self
    }

    pub fn coercions(&self) -> &CoercionTable {
        &self.coercions
    }

    pub fn known_types(&self) -> &BTreeSet<String> {
        &self.known_types
    }

    pub fn kind_of(&self, genus: &str) -> Option<BlockKind> {
        self.kinds.get(genus).copied()
    }

    /// Register or override a property type.
    pub fn register_property_type(&mut self, genus: &str, property: &str, ty: &str) {
        self.property_types
            .insert((genus.to_string(), property.to_string()), ty.to_string());
    }

    /// The declared type of a component property. Unknown pairs fall back
    /// to text and are logged.
    pub fn property_type(&self, genus: &str, property: &str) -> &str {
        match self.property_types.get(&(genus.to_string(), property.to_string())) {
            Some(ty) => ty,
            None => {
                tracing::error!(genus, property, "no property type registered, using text");
                FALLBACK_PROPERTY_TYPE
            }
        }
    }

    /// Resolve the component type and member named by a component block.
    pub fn member_of<'b>(&self, components: &ComponentTree, block: &'b Block) -> Option<(String, &'b str)> {
        let kind = self.kind_of(&block.genus)?;
        let (owner, member) = block.component_and_member()?;
        if kind.is_component_member() {
            let genus = components.get(owner)?.genus.clone();
            Some((genus, member))
        } else if kind.is_component_type_member() {
            Some((owner.to_string(), member))
        } else {
            None
        }
    }

    /// Types a socket accepts, or `None` when it has no rule.
    pub fn socket_types(&self, components: &ComponentTree, block: &Block, socket: &str) -> Option<BTreeSet<String>> {
        let kind = self.kind_of(&block.genus)?;

        match kind {
            BlockKind::ComponentSetter | BlockKind::ComponentTypeSetter if socket == SETTER_SOCKET => {
                let (genus, property) = self.member_of(components, block)?;
                return Some(type_set([self.property_type(&genus, property), VALUE_TYPE]));
            }
            BlockKind::ComponentTypeGetter | BlockKind::ComponentTypeSetter | BlockKind::ComponentTypeMethod
                if socket == COMPONENT_SOCKET =>
            {
                return Some(type_set([COMPONENT_SOCKET, VALUE_TYPE]));
            }
            BlockKind::ComponentMethod | BlockKind::ComponentTypeMethod => {
                let (genus, method) = self.member_of(components, block)?;
                let params = self.method_params.get(&(genus, method.to_string()))?;
                let position = block
                    .sockets
                    .iter()
                    .filter(|s| s.label != COMPONENT_SOCKET)
                    .position(|s| s.label == socket)?;
                return params.get(position).map(|ty| type_set([ty.as_str()]));
            }
            _ => {}
        }

        self.genera.get(&block.genus)?.sockets.get(socket).cloned()
    }

    /// Types a plug offers, or `None` when it has no rule.
    pub fn plug_types(&self, components: &ComponentTree, block: &Block) -> Option<BTreeSet<String>> {
        let kind = self.kind_of(&block.genus)?;

        match kind {
            BlockKind::ComponentGetter | BlockKind::ComponentTypeGetter => {
                let (genus, property) = self.member_of(components, block)?;
                return Some(type_set([self.property_type(&genus, property), VALUE_TYPE]));
            }
            BlockKind::ComponentMethod | BlockKind::ComponentTypeMethod => {
                let (genus, method) = self.member_of(components, block)?;
                return self
                    .method_returns
                    .get(&(genus, method.to_string()))
                    .map(|ty| type_set([ty.as_str()]));
            }
            _ => {}
        }

        let declared = self.genera.get(&block.genus).and_then(|g| g.plug.clone());
        let resolved = block
            .plug
            .as_ref()
            .filter(|p| p.kind.is_poly())
            .and_then(|p| p.resolved.clone());
        match (declared, resolved) {
            (Some(mut set), Some(ty)) => {
                set.insert(ty);
                Some(set)
            }
            (Some(set), None) => Some(set),
            (None, Some(ty)) => Some(type_set([ty.as_str()])),
            (None, None) => None,
        }
    }

    /// Whether `plug_block` may sit in `socket` of `socket_block` without
    /// conversion.
    pub fn can_link(&self, components: &ComponentTree, socket_block: &Block, plug_block: &Block, socket: &str) -> bool {
        match (
            self.socket_types(components, socket_block, socket),
            self.plug_types(components, plug_block),
        ) {
            (Some(accepts), Some(offers)) => !accepts.is_disjoint(&offers),
            _ => true,
        }
    }

    /// Like `can_link`, but also accepts a one-hop coercion. A text literal
    /// only converts to a number when it parses as one.
    pub fn can_coerce(
        &self,
        components: &ComponentTree,
        socket_block: &Block,
        plug_block: &Block,
        socket: &str,
    ) -> CoercionResult {
        if self.can_link(components, socket_block, plug_block, socket) {
            return CoercionResult::direct();
        }
        let (Some(accepts), Some(offers)) = (
            self.socket_types(components, socket_block, socket),
            self.plug_types(components, plug_block),
        ) else {
            return CoercionResult::direct();
        };

        let literal_text = self.kind_of(&plug_block.genus) == Some(BlockKind::Text);
        let mut blocked_literal = false;
        for from in &offers {
            for to in &accepts {
                if !self.coercions.can_coerce(from, to) {
                    continue;
                }
                if literal_text && to == "number" && !is_number(&plug_block.label) {
                    blocked_literal = true;
                    continue;
                }
                return CoercionResult::via(from, to);
            }
        }

        if blocked_literal {
            return CoercionResult::refused(format!("\"{}\" is not a number", plug_block.label));
        }
        CoercionResult::refused(refusal_message(&accepts))
    }

    /// Coercion types for each argument of a call block, in socket order.
    ///
    /// `None` means no rule covers the call at all, which callers must keep
    /// distinct from a call with zero arguments.
    pub fn argument_types(&self, components: &ComponentTree, block: &Block) -> Option<Vec<String>> {
        let kind = self.kind_of(&block.genus)?;
        let ruled = match kind {
            BlockKind::ComponentMethod | BlockKind::ComponentTypeMethod => {
                let (genus, method) = self.member_of(components, block)?;
                self.method_params.contains_key(&(genus, method.to_string()))
            }
            _ => {
                let rules = self.genera.get(&block.genus)?;
                !rules.sockets.is_empty()
            }
        };
        if !ruled {
            return None;
        }

        Some(
            block
                .sockets
                .iter()
                .map(|s| match self.socket_types(components, block, &s.label) {
                    Some(types) => single_type(&types),
                    None => ANY_TYPE.to_string(),
                })
                .collect(),
        )
    }
}

fn type_set<'a>(types: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    types.into_iter().map(str::to_string).collect()
}

fn single_type(types: &BTreeSet<String>) -> String {
    let mut concrete = types.iter().filter(|t| *t != VALUE_TYPE);
    match (concrete.next(), concrete.next()) {
        (Some(only), None) => only.clone(),
        _ => ANY_TYPE.to_string(),
    }
}

fn refusal_message(accepts: &BTreeSet<String>) -> String {
    let targets: Vec<&str> = accepts
        .iter()
        .map(String::as_str)
        .filter(|t| *t != VALUE_TYPE)
        .collect();
    match targets.as_slice() {
        [] => "This socket cannot accept any block".to_string(),
        ["argument"] => "This socket requires a name block".to_string(),
        [one] => format!("This socket requires a {} block", one),
        many => format!("This socket requires one of these block types: {}", many.join(", ")),
    }
}
