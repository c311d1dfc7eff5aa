//! Block model for the YAIL blocks editor
//!
//! Holds the language definition, the block arena, the component tree and
//! the workspace that ties them together. Everything downstream (link rules,
//! code generation, live sync, history) reads this model by reference.

pub mod block;
pub mod component;
pub mod error;
pub mod graph;
pub mod language;
pub mod workspace;

pub use block::{Annotation, Block, BlockId, Plug, Socket};
pub use component::{Component, ComponentTree};
pub use error::{ModelError, Result};
pub use graph::BlockGraph;
pub use language::{
    genera, BlockKind, ComponentType, ConnectorKind, EventDef, Genus, GenusBuilder, LanguageDef,
    MethodDef, ParamDef, PrimitiveDef, PropertyDef, SocketDef, VALUE_TYPE,
};
pub use workspace::{Workspace, ARG_SOCKET_PREFIX, FORM_TYPE};
