//! Language definition
//!
//! A `LanguageDef` describes every block genus the editor knows about and every
//! component type that can be placed in a project. It is built once (either
//! from `LanguageDef::standard()` or from a JSON document) and passed by
//! reference to the rule engine and the compiler.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Generic type accepted by any socket that lists it.
pub const VALUE_TYPE: &str = "value";

/// The closed set of code generation strategies.
///
/// Every genus maps to exactly one kind; the compiler matches on this
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Number,
    Text,
    True,
    False,
    Color,
    If,
    Choose,
    While,
    ForEach,
    ForRange,
    GlobalDef,
    VariableGet,
    VariableSet,
    Argument,
    ProcedureDef,
    ProcedureWithResult,
    ProcedureCall,
    ComponentEvent,
    ComponentGetter,
    ComponentSetter,
    ComponentMethod,
    ComponentObject,
    ComponentTypeGetter,
    ComponentTypeSetter,
    ComponentTypeMethod,
    Primitive,
}

impl BlockKind {
    /// Kinds that introduce a top-level definition in the generated program.
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            BlockKind::GlobalDef
                | BlockKind::ProcedureDef
                | BlockKind::ProcedureWithResult
                | BlockKind::ComponentEvent
        )
    }

    /// Kinds whose label has the form `Component.Member`.
    pub fn is_component_member(self) -> bool {
        matches!(
            self,
            BlockKind::ComponentEvent
                | BlockKind::ComponentGetter
                | BlockKind::ComponentSetter
                | BlockKind::ComponentMethod
        )
    }

    /// Kinds whose label has the form `ComponentType.Member`.
    pub fn is_component_type_member(self) -> bool {
        matches!(
            self,
            BlockKind::ComponentTypeGetter
                | BlockKind::ComponentTypeSetter
                | BlockKind::ComponentTypeMethod
        )
    }
}

/// Declared kind of a socket or plug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConnectorKind {
    /// A fixed primitive type such as `number`.
    Type(String),
    /// A list whose elements have the given type.
    List(String),
    /// Adapts to whatever gets connected.
    Poly,
}

impl ConnectorKind {
    pub fn of(ty: impl Into<String>) -> Self {
        ConnectorKind::Type(ty.into())
    }

    /// The primitive type this connector carries, if it is not polymorphic.
    pub fn primitive_type(&self) -> Option<&str> {
        match self {
            ConnectorKind::Type(t) => Some(t),
            ConnectorKind::List(_) => Some("list"),
            ConnectorKind::Poly => None,
        }
    }

    pub fn is_poly(&self) -> bool {
        matches!(self, ConnectorKind::Poly)
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorKind::Type(t) => write!(f, "{}", t),
            ConnectorKind::List(t) => write!(f, "list:{}", t),
            ConnectorKind::Poly => write!(f, "poly"),
        }
    }
}

impl FromStr for ConnectorKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ModelError::InvalidConnector(s.to_string()));
        }
        if s == "poly" {
            return Ok(ConnectorKind::Poly);
        }
        match s.strip_prefix("list:") {
            Some("") => Err(ModelError::InvalidConnector(s.to_string())),
            Some(elem) => Ok(ConnectorKind::List(elem.to_string())),
            None => Ok(ConnectorKind::Type(s.to_string())),
        }
    }
}

impl TryFrom<String> for ConnectorKind {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ConnectorKind> for String {
    fn from(kind: ConnectorKind) -> Self {
        kind.to_string()
    }
}

/// Template for a socket on blocks of a genus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketDef {
    pub label: String,
    pub kind: ConnectorKind,
    /// Optional sockets may be left empty without a warning.
    #[serde(default)]
    pub optional: bool,
    /// Command sockets hold a stack of statements rather than an expression.
    #[serde(default)]
    pub command: bool,
}

impl SocketDef {
    pub fn new(label: impl Into<String>, kind: ConnectorKind) -> Self {
        Self {
            label: label.into(),
            kind,
            optional: false,
            command: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn command(mut self) -> Self {
        self.command = true;
        self
    }
}

/// A runtime primitive a `Primitive` genus compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveDef {
    /// Name of the primitive in the runtime, e.g. `make-yail-list`.
    pub op: String,
    /// Human readable name passed along for runtime error messages.
    pub description: String,
}

/// A block genus: the declared type of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genus {
    pub name: String,
    pub kind: BlockKind,
    #[serde(default)]
    pub sockets: Vec<SocketDef>,
    #[serde(default)]
    pub plug: Option<ConnectorKind>,
    /// Whether blocks of this genus stack with before/after links.
    #[serde(default)]
    pub command: bool,
    /// Link rule directives (`socket-allow-N`, `socket-exclude-N`,
    /// `plug-type-N`, `type-exclude-N`).
    #[serde(default)]
    pub directives: IndexMap<String, String>,
    #[serde(default)]
    pub primitive: Option<PrimitiveDef>,
    #[serde(default)]
    pub initial_label: String,
}

impl Genus {
    pub fn new(name: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sockets: Vec::new(),
            plug: None,
            command: false,
            directives: IndexMap::new(),
            primitive: None,
            initial_label: String::new(),
        }
    }

    pub fn socket(&self, label: &str) -> Option<&SocketDef> {
        self.sockets.iter().find(|s| s.label == label)
    }
}

/// A property declared by a component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A parameter of an event or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub returns: Option<String>,
}

/// A component genus (Button, Label, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentType {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub events: Vec<EventDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl ComponentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            events: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    fn with_property(mut self, name: &str, ty: &str, default: &str) -> Self {
        self.properties.push(PropertyDef {
            name: name.to_string(),
            ty: ty.to_string(),
            default: default.to_string(),
            description: None,
        });
        self
    }

    fn with_event(mut self, name: &str, params: &[(&str, &str)]) -> Self {
        self.events.push(EventDef {
            name: name.to_string(),
            params: params_of(params),
        });
        self
    }

    fn with_method(mut self, name: &str, params: &[(&str, &str)], returns: Option<&str>) -> Self {
        self.methods.push(MethodDef {
            name: name.to_string(),
            params: params_of(params),
            returns: returns.map(str::to_string),
        });
        self
    }
}

fn params_of(params: &[(&str, &str)]) -> Vec<ParamDef> {
    params
        .iter()
        .map(|(name, ty)| ParamDef {
            name: name.to_string(),
            ty: ty.to_string(),
        })
        .collect()
}

/// Genus names the workspace helpers instantiate.
pub mod genera {
    pub const NUMBER: &str = "number";
    pub const TEXT: &str = "text";
    pub const TRUE: &str = "true";
    pub const FALSE: &str = "false";
    pub const COLOR: &str = "color";
    pub const IF: &str = "if";
    pub const CHOOSE: &str = "choose";
    pub const WHILE: &str = "while";
    pub const FOREACH: &str = "foreach";
    pub const FORRANGE: &str = "forrange";
    pub const GLOBAL_DEF: &str = "def";
    pub const GETTER: &str = "getter";
    pub const SETTER: &str = "setter";
    pub const ARGUMENT: &str = "argument";
    pub const PROCEDURE: &str = "define-void";
    pub const PROCEDURE_WITH_RESULT: &str = "define";
    pub const CALLER_COMMAND: &str = "caller-command";
    pub const CALLER: &str = "caller";
    pub const COMPONENT_EVENT: &str = "component-event";
    pub const COMPONENT_GETTER: &str = "component-getter";
    pub const COMPONENT_SETTER: &str = "component-setter";
    pub const COMPONENT_METHOD: &str = "component-method";
    pub const COMPONENT_METHOD_VALUE: &str = "component-method-value";
    pub const COMPONENT: &str = "component";
    pub const COMPONENT_TYPE_GETTER: &str = "component-type-getter";
    pub const COMPONENT_TYPE_SETTER: &str = "component-type-setter";
    pub const COMPONENT_TYPE_METHOD: &str = "component-type-method";
}

/// The complete language: genera, component types and known value types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageDef {
    /// Every primitive type name; exclude directives subtract from this set.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub genera: IndexMap<String, Genus>,
    #[serde(default)]
    pub components: IndexMap<String, ComponentType>,
}

impl LanguageDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a language definition from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn add_genus(&mut self, genus: Genus) {
        self.genera.insert(genus.name.clone(), genus);
    }

    pub fn add_component_type(&mut self, ty: ComponentType) {
        self.components.insert(ty.name.clone(), ty);
    }

    pub fn genus(&self, name: &str) -> Option<&Genus> {
        self.genera.get(name)
    }

    pub fn require_genus(&self, name: &str) -> Result<&Genus> {
        self.genus(name)
            .ok_or_else(|| ModelError::UnknownGenus(name.to_string()))
    }

    pub fn component_type(&self, name: &str) -> Option<&ComponentType> {
        self.components.get(name)
    }

    /// The built-in language.
    pub fn standard() -> Self {
        use genera::*;

        let mut lang = LanguageDef::new();
        lang.types = ["number", "text", "boolean", "list", "component", "argument", "InstantInTime"]
            .iter()
            .map(|t| t.to_string())
            .collect();

        // Literals
        lang.add_genus(GenusBuilder::new(NUMBER, BlockKind::Number).plug("number").label("0").build());
        lang.add_genus(GenusBuilder::new(TEXT, BlockKind::Text).plug("text").build());
        lang.add_genus(GenusBuilder::new(TRUE, BlockKind::True).plug("boolean").label("true").build());
        lang.add_genus(GenusBuilder::new(FALSE, BlockKind::False).plug("boolean").label("false").build());
        lang.add_genus(GenusBuilder::new(COLOR, BlockKind::Color).plug("number").label("FF000000").build());

        // Control
        lang.add_genus(
            GenusBuilder::new(IF, BlockKind::If)
                .command()
                .socket("test", "boolean")
                .command_socket("then")
                .optional_command_socket("else")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(CHOOSE, BlockKind::Choose)
                .poly_plug()
                .socket("test", "boolean")
                .poly_socket("then-return")
                .poly_socket("else-return")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(WHILE, BlockKind::While)
                .command()
                .socket("test", "boolean")
                .command_socket("do")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(FOREACH, BlockKind::ForEach)
                .command()
                .socket("variable", "argument")
                .command_socket("do")
                .socket("in list", "list")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(FORRANGE, BlockKind::ForRange)
                .command()
                .socket("variable", "argument")
                .command_socket("do")
                .socket("from", "number")
                .socket("to", "number")
                .socket("by", "number")
                .build(),
        );

        // Variables
        lang.add_genus(
            GenusBuilder::new(GLOBAL_DEF, BlockKind::GlobalDef)
                .label("variable")
                .untyped_socket("initialize to")
                .build(),
        );
        lang.add_genus(GenusBuilder::new(GETTER, BlockKind::VariableGet).untyped_plug().build());
        lang.add_genus(
            GenusBuilder::new(SETTER, BlockKind::VariableSet)
                .command()
                .untyped_socket("to")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(ARGUMENT, BlockKind::Argument)
                .plug("argument")
                .label("x")
                .build(),
        );

        // Procedures
        lang.add_genus(
            GenusBuilder::new(PROCEDURE, BlockKind::ProcedureDef)
                .label("procedure")
                .command_socket("do")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(PROCEDURE_WITH_RESULT, BlockKind::ProcedureWithResult)
                .label("procedure")
                .untyped_socket("return")
                .build(),
        );
        lang.add_genus(GenusBuilder::new(CALLER_COMMAND, BlockKind::ProcedureCall).command().build());
        lang.add_genus(GenusBuilder::new(CALLER, BlockKind::ProcedureCall).untyped_plug().build());

        // Component blocks. Their sockets come from the component type.
        lang.add_genus(GenusBuilder::new(COMPONENT_EVENT, BlockKind::ComponentEvent).build());
        lang.add_genus(GenusBuilder::new(COMPONENT_GETTER, BlockKind::ComponentGetter).untyped_plug().build());
        lang.add_genus(GenusBuilder::new(COMPONENT_SETTER, BlockKind::ComponentSetter).command().build());
        lang.add_genus(GenusBuilder::new(COMPONENT_METHOD, BlockKind::ComponentMethod).command().build());
        lang.add_genus(
            GenusBuilder::new(COMPONENT_METHOD_VALUE, BlockKind::ComponentMethod)
                .untyped_plug()
                .build(),
        );
        lang.add_genus(GenusBuilder::new(COMPONENT, BlockKind::ComponentObject).plug("component").build());
        lang.add_genus(
            GenusBuilder::new(COMPONENT_TYPE_GETTER, BlockKind::ComponentTypeGetter)
                .untyped_plug()
                .untyped_socket("component")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(COMPONENT_TYPE_SETTER, BlockKind::ComponentTypeSetter)
                .command()
                .untyped_socket("component")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new(COMPONENT_TYPE_METHOD, BlockKind::ComponentTypeMethod)
                .command()
                .untyped_socket("component")
                .build(),
        );

        // Primitives
        let binary_math = [
            ("add", "+", "+"),
            ("subtract", "-", "-"),
            ("multiply", "*", "*"),
            ("divide", "yail-divide", "/"),
            ("lessthan", "<", "<"),
            ("greaterthan", ">", ">"),
        ];
        for (name, op, desc) in binary_math {
            let plug = if matches!(name, "lessthan" | "greaterthan") { "boolean" } else { "number" };
            lang.add_genus(
                GenusBuilder::new(name, BlockKind::Primitive)
                    .primitive(op, desc)
                    .plug(plug)
                    .socket("A", "number")
                    .socket("B", "number")
                    .build(),
            );
        }
        lang.add_genus(
            GenusBuilder::new("equal", BlockKind::Primitive)
                .primitive("yail-equal?", "=")
                .plug("boolean")
                .untyped_socket("A")
                .untyped_socket("B")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new("not", BlockKind::Primitive)
                .primitive("yail-not", "not")
                .plug("boolean")
                .socket("test", "boolean")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new("join", BlockKind::Primitive)
                .primitive("string-append", "join")
                .plug("text")
                .socket("text1", "text")
                .socket("text2", "text")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new("length", BlockKind::Primitive)
                .primitive("string-length", "length")
                .plug("number")
                .socket("text", "text")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new("make-a-list", BlockKind::Primitive)
                .primitive("make-yail-list", "make a list")
                .plug_list("any")
                .untyped_socket("item")
                .untyped_socket("item2")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new("select-list-item", BlockKind::Primitive)
                .primitive("yail-list-get-item", "select list item")
                .poly_plug()
                .socket("list", "list")
                .socket("index", "number")
                .build(),
        );
        lang.add_genus(
            GenusBuilder::new("length-of-list", BlockKind::Primitive)
                .primitive("yail-list-length", "length of list")
                .plug("number")
                .socket("list", "list")
                .build(),
        );

        for ty in standard_components() {
            lang.add_component_type(ty);
        }

        lang
    }
}

fn standard_components() -> Vec<ComponentType> {
    vec![
        ComponentType::new("Form")
            .with_property("Title", "text", "")
            .with_property("BackgroundColor", "number", "&HFFFFFFFF")
            .with_property("Scrollable", "boolean", "False")
            .with_event("Initialize", &[])
            .with_event("BackPressed", &[]),
        ComponentType::new("Button")
            .with_property("Text", "text", "Text for Button")
            .with_property("Enabled", "boolean", "True")
            .with_property("FontSize", "number", "14.0")
            .with_property("BackgroundColor", "number", "&HFF444444")
            .with_event("Click", &[])
            .with_event("LongClick", &[]),
        ComponentType::new("Label")
            .with_property("Text", "text", "Text for Label")
            .with_property("FontSize", "number", "14.0")
            .with_property("Visible", "boolean", "True"),
        ComponentType::new("TextBox")
            .with_property("Text", "text", "")
            .with_property("Hint", "text", "")
            .with_method("HideKeyboard", &[], None),
        ComponentType::new("Clock")
            .with_property("TimerInterval", "number", "1000")
            .with_property("TimerEnabled", "boolean", "True")
            .with_event("Timer", &[])
            .with_method("Now", &[], Some("InstantInTime"))
            .with_method("FormatTime", &[("instant", "InstantInTime")], Some("text")),
        ComponentType::new("Canvas")
            .with_property("BackgroundColor", "number", "&HFFFFFFFF")
            .with_property("LineWidth", "number", "2.0")
            .with_event("Touched", &[("x", "number"), ("y", "number")])
            .with_method("DrawCircle", &[("x", "number"), ("y", "number"), ("r", "number")], None)
            .with_method("Clear", &[], None),
    ]
}

/// Builder for genera that writes link directives alongside the connector
/// declarations.
pub struct GenusBuilder {
    genus: Genus,
    socket_rules: usize,
    plug_rules: usize,
}

impl GenusBuilder {
    pub fn new(name: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            genus: Genus::new(name, kind),
            socket_rules: 0,
            plug_rules: 0,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.genus.initial_label = label.into();
        self
    }

    pub fn command(mut self) -> Self {
        self.genus.command = true;
        self
    }

    pub fn primitive(mut self, op: &str, description: &str) -> Self {
        self.genus.primitive = Some(PrimitiveDef {
            op: op.to_string(),
            description: description.to_string(),
        });
        self
    }

    /// Typed plug; registers a `plug-type-N` directive.
    pub fn plug(mut self, ty: &str) -> Self {
        self.genus.plug = Some(ConnectorKind::of(ty));
        self.plug_type(ty)
    }

    pub fn plug_list(mut self, elem: &str) -> Self {
        self.genus.plug = Some(ConnectorKind::List(elem.to_string()));
        self.plug_type("list")
    }

    pub fn poly_plug(mut self) -> Self {
        self.genus.plug = Some(ConnectorKind::Poly);
        self
    }

    /// Plug that declares no restriction.
    pub fn untyped_plug(mut self) -> Self {
        self.genus.plug = Some(ConnectorKind::of(VALUE_TYPE));
        self
    }

    pub fn plug_type(mut self, ty: &str) -> Self {
        let key = format!("plug-type-{}", self.plug_rules);
        self.plug_rules += 1;
        self.genus.directives.insert(key, ty.to_string());
        self
    }

    pub fn plug_exclude(mut self, ty: &str) -> Self {
        let key = format!("type-exclude-{}", self.plug_rules);
        self.plug_rules += 1;
        self.genus.directives.insert(key, ty.to_string());
        self
    }

    /// Typed socket; registers a `socket-allow-N` directive.
    pub fn socket(mut self, label: &str, ty: &str) -> Self {
        self.genus.sockets.push(SocketDef::new(label, ConnectorKind::of(ty)));
        self.socket_allow(label, ty)
    }

    pub fn poly_socket(mut self, label: &str) -> Self {
        self.genus.sockets.push(SocketDef::new(label, ConnectorKind::Poly));
        self
    }

    /// Socket that declares no restriction.
    pub fn untyped_socket(mut self, label: &str) -> Self {
        self.genus
            .sockets
            .push(SocketDef::new(label, ConnectorKind::of(VALUE_TYPE)));
        self
    }

    pub fn command_socket(mut self, label: &str) -> Self {
        self.genus
            .sockets
            .push(SocketDef::new(label, ConnectorKind::of("cmd")).command());
        self
    }

    pub fn optional_command_socket(mut self, label: &str) -> Self {
        self.genus
            .sockets
            .push(SocketDef::new(label, ConnectorKind::of("cmd")).command().optional());
        self
    }

    pub fn socket_allow(mut self, label: &str, ty: &str) -> Self {
        let key = format!("socket-allow-{}", self.socket_rules);
        self.socket_rules += 1;
        self.genus.directives.insert(key, format!("{}:{}", label, ty));
        self
    }

    pub fn socket_exclude(mut self, label: &str, ty: &str) -> Self {
        let key = format!("socket-exclude-{}", self.socket_rules);
        self.socket_rules += 1;
        self.genus.directives.insert(key, format!("{}:{}", label, ty));
        self
    }

    pub fn build(self) -> Genus {
        self.genus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_kind_parse() {
        assert_eq!("number".parse::<ConnectorKind>().unwrap(), ConnectorKind::of("number"));
        assert_eq!(
            "list:text".parse::<ConnectorKind>().unwrap(),
            ConnectorKind::List("text".to_string())
        );
        assert_eq!("poly".parse::<ConnectorKind>().unwrap(), ConnectorKind::Poly);
        assert!("list:".parse::<ConnectorKind>().is_err());
        assert!("".parse::<ConnectorKind>().is_err());
    }

    #[test]
    fn test_standard_language_has_core_genera() {
        let lang = LanguageDef::standard();
        for name in [genera::IF, genera::WHILE, genera::PROCEDURE, genera::COMPONENT_EVENT, "add"] {
            assert!(lang.genus(name).is_some(), "missing genus {}", name);
        }
        assert_eq!(lang.genus("add").unwrap().primitive.as_ref().unwrap().op, "+");
    }

    #[test]
    fn test_builder_writes_directives() {
        let genus = GenusBuilder::new("g", BlockKind::Primitive)
            .plug("number")
            .socket("A", "number")
            .socket_exclude("B", "text")
            .build();
        assert_eq!(genus.directives.get("plug-type-0").map(String::as_str), Some("number"));
        assert_eq!(genus.directives.get("socket-allow-0").map(String::as_str), Some("A:number"));
        assert_eq!(genus.directives.get("socket-exclude-1").map(String::as_str), Some("B:text"));
    }

    #[test]
    fn test_language_json_roundtrip_preserves_genus() {
        let lang = LanguageDef::standard();
        let json = serde_json::to_string(&lang).unwrap();
        let back = LanguageDef::from_json(&json).unwrap();
        assert_eq!(back.genus(genera::FOREACH), lang.genus(genera::FOREACH));
    }
}
