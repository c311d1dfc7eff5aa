//! Device transport
//!
//! The controller only needs a handful of device operations and a byte
//! stream to the REPL. `AdbTransport` shells out to `adb`; tests plug in an
//! in-memory fake.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, SyncError};

type ShutdownHook = Box<dyn FnOnce() + Send>;

/// Both halves of a REPL connection.
pub struct ReplStream {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    shutdown: Option<ShutdownHook>,
}

impl ReplStream {
    pub fn new(reader: impl Read + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            shutdown: None,
        }
    }

    /// Run `hook` when the connection is torn down. It must unblock the reader.
    pub fn on_shutdown(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.shutdown = Some(Box::new(hook));
        self
    }

    pub fn tcp(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let reader = stream.try_clone()?;
        let handle = stream.try_clone()?;
        Ok(Self::new(reader, stream).on_shutdown(move || {
            if let Err(err) = handle.shutdown(Shutdown::Both) {
                tracing::debug!(%err, "socket already closed");
            }
        }))
    }

    /// Hand the reader to its thread and keep a writer that owns the teardown.
    pub fn split(self) -> (Box<dyn Read + Send>, ReplWriter) {
        let writer = ReplWriter {
            inner: self.writer,
            shutdown: self.shutdown,
        };
        (self.reader, writer)
    }
}

/// Write half of a connection. Dropping it shuts the whole connection down.
pub struct ReplWriter {
    inner: Box<dyn Write + Send>,
    shutdown: Option<ShutdownHook>,
}

impl Write for ReplWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Drop for ReplWriter {
    fn drop(&mut self) {
        if let Some(hook) = self.shutdown.take() {
            hook();
        }
    }
}

pub trait DeviceTransport: Send + 'static {
    fn install_app(&mut self, device: &str, apk: &Path) -> Result<()>;
    fn kill_app(&mut self, device: &str, package: &str) -> Result<()>;
    fn start_app(&mut self, device: &str, package: &str, activity: &str) -> Result<()>;
    fn forward_port(&mut self, device: &str, port: u16) -> Result<()>;
    fn push_file(&mut self, device: &str, local: &Path, remote: &str) -> Result<()>;
    /// Open a fresh connection to the forwarded REPL port.
    fn connect(&mut self, port: u16) -> Result<ReplStream>;
}

/// Talks to devices through the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbTransport {
    adb: PathBuf,
}

impl AdbTransport {
    pub fn new(adb: impl Into<PathBuf>) -> Self {
        Self { adb: adb.into() }
    }

    fn run(&self, device: &str, args: &[&str]) -> Result<String> {
        tracing::debug!(device, ?args, "adb");
        let output = Command::new(&self.adb)
            .arg("-s")
            .arg(device)
            .args(args)
            .output()
            .map_err(|e| SyncError::transport(format!("Failed to execute {}: {}", self.adb.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::transport(format!(
                "adb {} failed with exit code {:?}: {}",
                args.join(" "),
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for AdbTransport {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl DeviceTransport for AdbTransport {
    fn install_app(&mut self, device: &str, apk: &Path) -> Result<()> {
        let apk = apk.to_string_lossy();
        self.run(device, &["install", "-r", &apk]).map(drop)
    }

    fn kill_app(&mut self, device: &str, package: &str) -> Result<()> {
        self.run(device, &["shell", "am", "force-stop", package]).map(drop)
    }

    fn start_app(&mut self, device: &str, package: &str, activity: &str) -> Result<()> {
        let component = format!("{}/{}", package, activity);
        self.run(device, &["shell", "am", "start", "-n", &component]).map(drop)
    }

    fn forward_port(&mut self, device: &str, port: u16) -> Result<()> {
        let forward = format!("tcp:{}", port);
        self.run(device, &["forward", &forward, &forward]).map(drop)
    }

    fn push_file(&mut self, device: &str, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy();
        self.run(device, &["push", &local, remote]).map(drop)
    }

    fn connect(&mut self, port: u16) -> Result<ReplStream> {
        ReplStream::tcp(("127.0.0.1", port))
    }
}
