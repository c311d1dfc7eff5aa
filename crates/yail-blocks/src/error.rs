//! Error types for the block model

use thiserror::Error;

use crate::block::BlockId;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown block: {0}")]
    UnknownBlock(BlockId),

    #[error("Unknown genus: {0}")]
    UnknownGenus(String),

    #[error("Block {block} has no socket named '{socket}'")]
    UnknownSocket { block: BlockId, socket: String },

    #[error("Socket '{socket}' of block {block} is already occupied")]
    SocketOccupied { block: BlockId, socket: String },

    #[error("Block {0} is already connected")]
    AlreadyConnected(BlockId),

    #[error("Connecting block {child} under block {parent} would create a cycle")]
    Cycle { parent: BlockId, child: BlockId },

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("A component named '{0}' already exists")]
    DuplicateComponent(String),

    #[error("Component type '{genus}' has no member '{member}'")]
    UnknownMember { genus: String, member: String },

    #[error("Invalid connector kind: {0}")]
    InvalidConnector(String),
}

impl ModelError {
    pub fn unknown_socket(block: BlockId, socket: impl Into<String>) -> Self {
        ModelError::UnknownSocket {
            block,
            socket: socket.into(),
        }
    }

    pub fn unknown_member(genus: impl Into<String>, member: impl Into<String>) -> Self {
        ModelError::UnknownMember {
            genus: genus.into(),
            member: member.into(),
        }
    }
}
