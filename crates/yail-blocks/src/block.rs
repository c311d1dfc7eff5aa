//! Blocks and their connectors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::language::{ConnectorKind, SocketDef};

/// Arena key for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A socket instance on a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    pub label: String,
    pub kind: ConnectorKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub command: bool,
    /// Concrete type a polymorphic socket adapted to.
    #[serde(default)]
    pub resolved: Option<String>,
    #[serde(default)]
    pub block: Option<BlockId>,
}

impl Socket {
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// The type this socket currently carries, after poly adaptation.
    pub fn effective_type(&self) -> Option<&str> {
        match &self.kind {
            ConnectorKind::Poly => self.resolved.as_deref(),
            other => other.primitive_type(),
        }
    }
}

impl From<&SocketDef> for Socket {
    fn from(def: &SocketDef) -> Self {
        Self {
            label: def.label.clone(),
            kind: def.kind.clone(),
            optional: def.optional,
            command: def.command,
            resolved: None,
            block: None,
        }
    }
}

/// The plug a block uses to sit in a parent's socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plug {
    pub kind: ConnectorKind,
    #[serde(default)]
    pub resolved: Option<String>,
}

impl Plug {
    pub fn new(kind: ConnectorKind) -> Self {
        Self { kind, resolved: None }
    }

    pub fn effective_type(&self) -> Option<&str> {
        match &self.kind {
            ConnectorKind::Poly => self.resolved.as_deref(),
            other => other.primitive_type(),
        }
    }
}

/// Feedback attached to a block by the compiler or the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "severity", content = "message", rename_all = "lowercase")]
pub enum Annotation {
    Warning(String),
    Error(String),
    /// A value reported back by the runtime.
    Result(String),
}

impl Annotation {
    pub fn message(&self) -> &str {
        match self {
            Annotation::Warning(m) | Annotation::Error(m) | Annotation::Result(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Annotation::Error(_))
    }
}

/// A node in the block graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub genus: String,
    pub label: String,
    #[serde(default)]
    pub sockets: Vec<Socket>,
    #[serde(default)]
    pub plug: Option<Plug>,
    /// The block whose socket holds this block (or the head of its stack).
    #[serde(default)]
    pub parent: Option<BlockId>,
    /// Stacked command blocks: the block above this one.
    #[serde(default)]
    pub before: Option<BlockId>,
    /// Stacked command blocks: the block below this one.
    #[serde(default)]
    pub after: Option<BlockId>,
    /// For stubs: the declaring block this one is derived from.
    #[serde(default)]
    pub declaring_parent: Option<BlockId>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub bad: bool,
    #[serde(default)]
    pub should_report: bool,
    #[serde(default)]
    pub annotation: Option<Annotation>,
}

fn default_true() -> bool {
    true
}

impl Block {
    pub fn new(id: BlockId, genus: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id,
            genus: genus.into(),
            label: label.into(),
            sockets: Vec::new(),
            plug: None,
            parent: None,
            before: None,
            after: None,
            declaring_parent: None,
            active: true,
            bad: false,
            should_report: false,
            annotation: None,
        }
    }

    pub fn socket(&self, label: &str) -> Option<&Socket> {
        self.sockets.iter().find(|s| s.label == label)
    }

    pub fn socket_mut(&mut self, label: &str) -> Option<&mut Socket> {
        self.sockets.iter_mut().find(|s| s.label == label)
    }

    /// Child held by the named socket.
    pub fn child(&self, label: &str) -> Option<BlockId> {
        self.socket(label).and_then(|s| s.block)
    }

    pub fn children(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.sockets.iter().filter_map(|s| s.block)
    }

    /// Split a `Component.Member` label.
    pub fn component_and_member(&self) -> Option<(&str, &str)> {
        self.label.split_once('.')
    }

    /// Effective plug type, after poly adaptation.
    pub fn plug_type(&self) -> Option<&str> {
        self.plug.as_ref().and_then(Plug::effective_type)
    }
}
