//! REPL controller
//!
//! Owns the connection to the companion. All transport work runs on the
//! session's task queue, so at most one connection attempt is ever in
//! flight. A reader thread per connection decodes response frames and hands
//! them back over a channel; the caller pulls them with [`ReplController::drain`].

use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use yail_blocks::{Annotation, BlockId, Workspace};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::protocol::{wrap_request, Decoded, FrameDecoder, Purpose, ReplResponse};
use crate::queue::{Pending, TaskQueue};
use crate::session::{ConnectionState, Session};
use crate::transport::{DeviceTransport, ReplWriter};

/// What a reader thread reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    Frame(ReplResponse),
    Noise(String),
    Malformed(String),
    Closed,
}

/// What `drain` did with the inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplNotice {
    /// A value reported for a block that still exists.
    Value { block: BlockId, value: String },
    BlockError { block: BlockId, message: String },
    /// A failure with no block left to show it on.
    Error { message: String },
    ProjectLoaded,
    Noise(String),
    ConnectionLost,
}

struct Link<T> {
    transport: T,
    /// Dropping the writer tears the connection down.
    writer: Option<ReplWriter>,
    /// Bumped on every reconnect so stale reader threads can tell.
    generation: u64,
}

struct Shared<T> {
    config: SyncConfig,
    session: Session,
    link: Mutex<Link<T>>,
    events: UnboundedSender<ReaderEvent>,
}

pub struct ReplController<T: DeviceTransport> {
    shared: Arc<Shared<T>>,
    queue: Mutex<TaskQueue>,
    inbox: Mutex<UnboundedReceiver<ReaderEvent>>,
}

impl<T: DeviceTransport> ReplController<T> {
    pub fn new(transport: T, config: SyncConfig) -> Self {
        let (events, inbox) = unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                config,
                session: Session::new(),
                link: Mutex::new(Link {
                    transport,
                    writer: None,
                    generation: 0,
                }),
                events,
            }),
            queue: Mutex::new(TaskQueue::new()),
            inbox: Mutex::new(inbox),
        }
    }

    pub fn session(&self) -> &Session {
        &self.shared.session
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.session.state()
    }

    /// Queue code for the REPL. Returns a handle the caller may wait on.
    pub fn send(
        &self,
        code: &str,
        purpose: Purpose,
        origin: Option<BlockId>,
        is_project_load: bool,
    ) -> Result<Pending<Result<()>>> {
        if is_project_load {
            self.shared.session.set_waiting_for_project_load(true);
        }
        let request = wrap_request(code, &purpose, origin);
        let shared = self.shared.clone();
        tracing::debug!(%purpose, ?origin, "queueing repl request");
        self.queue.lock().submit_with_result(move || deliver(&shared, &request))
    }

    /// Send and block until the write has happened or failed.
    pub fn send_now(&self, code: &str, purpose: Purpose, origin: Option<BlockId>) -> Result<()> {
        let pending = self.send(code, purpose, origin, false)?;
        pending.wait()?
    }

    /// Send a full project load and wait for the write.
    pub fn load_project(&self, program: &str) -> Result<()> {
        self.send(program, Purpose::Load, None, true)?.wait()?
    }

    /// Install the companion app on the selected device.
    pub fn install_companion(&self, apk: &Path) -> Result<()> {
        let apk = apk.to_path_buf();
        self.on_device(move |transport, device| transport.install_app(device, &apk))
    }

    /// Copy an asset onto the selected device.
    pub fn push_asset(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_path_buf();
        let remote = remote.to_string();
        self.on_device(move |transport, device| transport.push_file(device, &local, &remote))
    }

    fn on_device<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut T, &str) -> Result<()> + Send + 'static,
    {
        let device = self.shared.session.selected_device().ok_or(SyncError::NoDevice)?;
        let shared = self.shared.clone();
        let pending = self
            .queue
            .lock()
            .submit_with_result(move || job(&mut shared.link.lock().transport, &device))?;
        pending.wait()?
    }

    pub fn select_device(&self, serial: Option<String>) {
        self.shared.session.select_device(serial);
        self.drop_link();
        self.shared.session.mark_unhappy();
    }

    pub fn device_plugged(&self, serial: &str) {
        self.shared.session.device_plugged(serial);
    }

    pub fn device_unplugged(&self, serial: &str) {
        if self.shared.session.device_unplugged(serial) {
            self.drop_link();
        }
    }

    /// Skip queued work, stop the worker and start a fresh one.
    pub fn cancel_and_restart(&self) -> bool {
        let timeout = self.shared.config.queue_shutdown_timeout();
        let stopped = self.queue.lock().restart(timeout);
        if !stopped {
            tracing::warn!("previous queue worker is still running");
        }
        stopped
    }

    /// Route everything the reader threads have decoded so far.
    pub fn drain(&self, workspace: &mut Workspace) -> Vec<ReplNotice> {
        let mut inbox = self.inbox.lock();
        let mut notices = Vec::new();
        while let Ok(event) = inbox.try_recv() {
            match event {
                ReaderEvent::Frame(frame) => notices.extend(self.route(workspace, frame)),
                ReaderEvent::Noise(text) => notices.push(ReplNotice::Noise(text)),
                ReaderEvent::Malformed(text) => notices.push(ReplNotice::Error {
                    message: format!("Malformed response from the companion: {}", text),
                }),
                ReaderEvent::Closed => notices.push(ReplNotice::ConnectionLost),
            }
        }
        notices
    }

    fn route(&self, workspace: &mut Workspace, frame: ReplResponse) -> Option<ReplNotice> {
        if frame.purpose == Purpose::Load {
            self.shared.session.set_waiting_for_project_load(false);
            if frame.success {
                return Some(ReplNotice::ProjectLoaded);
            }
        }

        let block = frame.origin.filter(|id| workspace.blocks.contains(*id));
        match (block, frame.success) {
            (Some(block), true) => {
                if frame.payload.is_empty() {
                    return None;
                }
                workspace
                    .blocks
                    .annotate(block, Some(Annotation::Result(frame.payload.clone())));
                Some(ReplNotice::Value {
                    block,
                    value: frame.payload,
                })
            }
            (Some(block), false) => {
                workspace
                    .blocks
                    .annotate(block, Some(Annotation::Error(frame.payload.clone())));
                Some(ReplNotice::BlockError {
                    block,
                    message: frame.payload,
                })
            }
            (None, false) => Some(ReplNotice::Error {
                message: frame.payload,
            }),
            (None, true) => None,
        }
    }

    fn drop_link(&self) {
        let mut link = self.shared.link.lock();
        link.writer = None;
        link.generation += 1;
    }
}

/// Runs on the queue worker.
fn deliver<T: DeviceTransport>(shared: &Arc<Shared<T>>, request: &str) -> Result<()> {
    if shared.session.is_happy() {
        let mut link = shared.link.lock();
        if let Some(writer) = link.writer.as_mut() {
            match write_request(writer, request) {
                Ok(()) => return Ok(()),
                Err(err) => tracing::warn!(%err, "write failed, reconnecting"),
            }
        }
    }

    if shared.session.selected_device().is_none() {
        shared.session.mark_disconnected();
        return Err(SyncError::NoDevice);
    }

    shared.session.begin_reconnect();
    let mut result = reconnect_and_write(shared, request);
    for (attempt, delay) in shared.config.backoff.delays().into_iter().enumerate() {
        let Err(err) = &result else {
            break;
        };
        tracing::info!(attempt = attempt + 1, ?delay, %err, "reconnect failed, backing off");
        thread::sleep(delay);
        result = reconnect_and_write(shared, request);
    }

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(%err, "giving up on the companion");
            shared.session.mark_disconnected();
            Err(SyncError::Unreachable {
                message: shared.config.troubleshooting_message.clone(),
            })
        }
    }
}

/// Restart the companion, open a fresh socket and write the request.
fn reconnect_and_write<T: DeviceTransport>(shared: &Arc<Shared<T>>, request: &str) -> Result<()> {
    let device = shared.session.selected_device().ok_or(SyncError::NoDevice)?;
    let config = &shared.config;

    let mut link = shared.link.lock();
    link.writer = None;
    link.generation += 1;

    link.transport.kill_app(&device, &config.app_package)?;
    link.transport.start_app(&device, &config.app_package, &config.app_activity)?;
    link.transport.forward_port(&device, config.port)?;
    let stream = link.transport.connect(config.port)?;

    let (reader, mut writer) = stream.split();
    write_request(&mut writer, request)?;
    link.writer = Some(writer);

    spawn_reader(shared.clone(), reader, link.generation);
    shared.session.mark_connected();
    tracing::info!(device = %device, port = config.port, "connected to companion");
    Ok(())
}

fn write_request(writer: &mut dyn Write, request: &str) -> Result<()> {
    writer.write_all(request.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn spawn_reader<T: DeviceTransport>(shared: Arc<Shared<T>>, reader: Box<dyn Read + Send>, generation: u64) {
    let spawned = thread::Builder::new()
        .name("yail-repl-reader".to_string())
        .spawn(move || read_loop(shared, reader, generation));
    if let Err(err) = spawned {
        tracing::error!(%err, "failed to start reader thread");
    }
}

fn read_loop<T: DeviceTransport>(shared: Arc<Shared<T>>, mut reader: Box<dyn Read + Send>, generation: u64) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for item in decoder.push(&buf[..n]) {
                    forward(&shared, item);
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::debug!(%err, "reader stopped");
                break;
            }
        }
    }
    if let Some(rest) = decoder.finish() {
        forward(&shared, rest);
    }

    let current = {
        let mut link = shared.link.lock();
        let current = link.generation == generation;
        if current {
            link.writer = None;
        }
        current
    };
    if current {
        shared.session.mark_unhappy();
        let _ = shared.events.send(ReaderEvent::Closed);
    }
}

fn forward<T>(shared: &Shared<T>, item: Decoded) {
    let event = match item {
        Decoded::Frame(frame) => ReaderEvent::Frame(frame),
        Decoded::Noise(text) => {
            tracing::warn!(noise = %text, "unexpected output from companion");
            ReaderEvent::Noise(text)
        }
        Decoded::Malformed(text) => ReaderEvent::Malformed(text),
    };
    let _ = shared.events.send(event);
}
