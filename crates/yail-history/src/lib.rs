//! Undo/redo history and auto-save
//!
//! Keeps a bounded list of serialized workspace snapshots and the
//! save-required bookkeeping that drives idle saves.

pub mod autosaver;
pub mod config;
pub mod error;
pub mod store;
pub mod ticker;

pub use autosaver::AutoSaver;
pub use config::{AutoSaveConfig, DEFAULT_CAPACITY};
pub use error::{HistoryError, Result};
pub use store::{FileSaveSink, PropertyContextSink, SaveSink, WorkspaceStore};
pub use ticker::IdleTicker;
