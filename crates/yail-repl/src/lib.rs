//! Live sync with the companion REPL
//!
//! Plans the YAIL that follows each workspace edit, frames it for the
//! device, and routes the companion's responses back onto blocks.

pub mod config;
pub mod controller;
pub mod error;
pub mod planner;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod transport;

pub use config::{BackoffPolicy, SyncConfig};
pub use controller::{ReaderEvent, ReplController, ReplNotice};
pub use error::{Result, SyncError};
pub use planner::{Plan, SyncPlanner, SyncUnit, WorkspaceEvent};
pub use protocol::{escape_payload, unescape_payload, wrap_request, Decoded, FrameDecoder, Purpose, ReplResponse};
pub use queue::{Pending, TaskQueue};
pub use session::{ConnectionState, Session, SessionState};
pub use transport::{AdbTransport, DeviceTransport, ReplStream, ReplWriter};
