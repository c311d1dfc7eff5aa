//! Controller and planner tests against an in-memory device

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use yail_blocks::{genera, Annotation, BlockId, LanguageDef, Workspace};
use yail_compiler::LinkRules;
use yail_repl::{
    wrap_request, BackoffPolicy, ConnectionState, DeviceTransport, Purpose, ReplController, ReplNotice,
    ReplResponse, ReplStream, SyncConfig, SyncError, SyncPlanner, WorkspaceEvent,
};

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Blocks until the test pushes bytes; EOF once the sender is dropped.
struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(bytes) => self.pending = bytes,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[derive(Clone, Default)]
struct Probe {
    written: Arc<Mutex<Vec<u8>>>,
    connects: Arc<AtomicUsize>,
    device: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl Probe {
    fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock()).into_owned()
    }

    fn reply(&self, response: ReplResponse) {
        let device = self.device.lock();
        device.as_ref().unwrap().send(response.to_frame().into_bytes()).unwrap();
    }

    fn hang_up(&self) {
        self.device.lock().take();
    }
}

struct FakeTransport {
    probe: Probe,
    failing_connects: usize,
}

impl FakeTransport {
    fn new(failing_connects: usize) -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                probe: probe.clone(),
                failing_connects,
            },
            probe,
        )
    }
}

impl DeviceTransport for FakeTransport {
    fn install_app(&mut self, device: &str, apk: &Path) -> yail_repl::Result<()> {
        self.probe.calls.lock().push(format!("install {} on {}", apk.display(), device));
        Ok(())
    }

    fn kill_app(&mut self, _device: &str, package: &str) -> yail_repl::Result<()> {
        self.probe.calls.lock().push(format!("kill {}", package));
        Ok(())
    }

    fn start_app(&mut self, _device: &str, package: &str, _activity: &str) -> yail_repl::Result<()> {
        self.probe.calls.lock().push(format!("start {}", package));
        Ok(())
    }

    fn forward_port(&mut self, _device: &str, port: u16) -> yail_repl::Result<()> {
        self.probe.calls.lock().push(format!("forward {}", port));
        Ok(())
    }

    fn push_file(&mut self, _device: &str, local: &Path, remote: &str) -> yail_repl::Result<()> {
        self.probe.calls.lock().push(format!("push {} {}", local.display(), remote));
        Ok(())
    }

    fn connect(&mut self, _port: u16) -> yail_repl::Result<ReplStream> {
        let attempt = self.probe.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failing_connects {
            return Err(SyncError::transport("connection refused"));
        }
        let (tx, rx) = mpsc::channel();
        *self.probe.device.lock() = Some(tx);
        let probe = self.probe.clone();
        Ok(ReplStream::new(
            ChannelReader { rx, pending: Vec::new() },
            SharedWriter(self.probe.written.clone()),
        )
        .on_shutdown(move || {
            probe.closes.fetch_add(1, Ordering::SeqCst);
            probe.hang_up();
        }))
    }
}

fn config() -> SyncConfig {
    SyncConfig {
        backoff: BackoffPolicy {
            attempts: 2,
            initial_delay_ms: 0,
            factor: 2,
        },
        ..SyncConfig::default()
    }
}

fn controller(failing_connects: usize) -> (ReplController<FakeTransport>, Probe) {
    let (transport, probe) = FakeTransport::new(failing_connects);
    let controller = ReplController::new(transport, config());
    controller.device_plugged("emulator-5554");
    controller.select_device(Some("emulator-5554".to_string()));
    (controller, probe)
}

fn drain_until(
    controller: &ReplController<FakeTransport>,
    ws: &mut Workspace,
    done: impl Fn(&ReplNotice) -> bool,
) -> Vec<ReplNotice> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    loop {
        seen.extend(controller.drain(ws));
        if seen.iter().any(&done) {
            return seen;
        }
        assert!(Instant::now() < deadline, "timed out, saw {:?}", seen);
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_first_send_connects_then_reuses_link() {
    let (controller, probe) = controller(0);
    controller.send_now("(+ 1 2)", Purpose::DoIt, Some(BlockId(4))).unwrap();
    controller.send_now("(def x 1)", Purpose::Block, None).unwrap();

    assert_eq!(probe.connects.load(Ordering::SeqCst), 1);
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(
        *probe.calls.lock(),
        vec![
            "kill edu.mit.appinventor.aicompanion3".to_string(),
            "start edu.mit.appinventor.aicompanion3".to_string(),
            "forward 8001".to_string(),
        ]
    );

    let written = probe.written();
    let first = wrap_request("(+ 1 2)", &Purpose::DoIt, Some(BlockId(4)));
    let second = wrap_request("(def x 1)", &Purpose::Block, None);
    assert_eq!(written, format!("{}\n{}\n", first, second));
}

#[test]
fn test_backoff_recovers_after_failures() {
    let (controller, probe) = controller(2);
    controller.send_now("(foo)", Purpose::Block, None).unwrap();
    assert_eq!(probe.connects.load(Ordering::SeqCst), 3);
    assert!(controller.session().snapshot().connected_to_phone);
}

#[test]
fn test_unreachable_after_all_attempts() {
    let (controller, probe) = controller(usize::MAX);
    let err = controller.send_now("(foo)", Purpose::Block, None).unwrap_err();

    match err {
        SyncError::Unreachable { message } => assert_eq!(message, config().troubleshooting_message),
        other => panic!("expected Unreachable, got {:?}", other),
    }
    // The first attempt plus one per backoff step.
    assert_eq!(probe.connects.load(Ordering::SeqCst), 3);
    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert!(!controller.session().snapshot().connected_to_phone);
}

#[test]
fn test_send_without_device() {
    let (transport, _probe) = FakeTransport::new(0);
    let controller = ReplController::new(transport, config());
    let err = controller.send_now("(foo)", Purpose::Block, None).unwrap_err();
    assert!(matches!(err, SyncError::NoDevice));
}

#[test]
fn test_responses_route_to_blocks() {
    let lang = LanguageDef::standard();
    let mut ws = Workspace::new("Screen1");
    let number = ws.add_block(&lang, genera::NUMBER, "3").unwrap();

    let (controller, probe) = controller(0);
    controller.send_now("3", Purpose::DoIt, Some(number)).unwrap();

    probe.reply(ReplResponse {
        purpose: Purpose::DoIt,
        origin: Some(number),
        success: true,
        payload: "3".to_string(),
    });
    probe.reply(ReplResponse {
        purpose: Purpose::Block,
        origin: Some(BlockId(9999)),
        success: false,
        payload: "unbound variable".to_string(),
    });

    let notices = drain_until(&controller, &mut ws, |n| matches!(n, ReplNotice::Error { .. }));
    assert!(notices.contains(&ReplNotice::Value {
        block: number,
        value: "3".to_string()
    }));
    assert!(notices.contains(&ReplNotice::Error {
        message: "unbound variable".to_string()
    }));
    assert_eq!(
        ws.blocks.get(number).unwrap().annotation,
        Some(Annotation::Result("3".to_string()))
    );
}

#[test]
fn test_project_load_flag_cleared_by_response() {
    let mut ws = Workspace::new("Screen1");
    let (controller, probe) = controller(0);

    controller.load_project("(clear-current-form)").unwrap();
    assert!(controller.session().is_waiting_for_project_load());

    probe.reply(ReplResponse {
        purpose: Purpose::Load,
        origin: None,
        success: true,
        payload: String::new(),
    });
    drain_until(&controller, &mut ws, |n| *n == ReplNotice::ProjectLoaded);
    assert!(!controller.session().is_waiting_for_project_load());
}

#[test]
fn test_lost_connection_reconnects_on_next_send() {
    let mut ws = Workspace::new("Screen1");
    let (controller, probe) = controller(0);
    controller.send_now("(a)", Purpose::Block, None).unwrap();

    probe.hang_up();
    drain_until(&controller, &mut ws, |n| *n == ReplNotice::ConnectionLost);
    assert!(!controller.session().is_happy());

    controller.send_now("(b)", Purpose::Block, None).unwrap();
    assert_eq!(probe.connects.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unplugging_selected_device_disconnects() {
    let (controller, _probe) = controller(0);
    controller.send_now("(a)", Purpose::Block, None).unwrap();

    controller.device_unplugged("other-device");
    controller.device_unplugged("other-device");
    assert!(controller.session().snapshot().connected_to_phone);

    controller.device_unplugged("emulator-5554");
    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert!(matches!(
        controller.send_now("(b)", Purpose::Block, None),
        Err(SyncError::NoDevice)
    ));
}

#[test]
fn test_cancel_and_restart_keeps_working() {
    let (controller, probe) = controller(0);
    assert!(controller.cancel_and_restart());
    controller.send_now("(a)", Purpose::Block, None).unwrap();
    assert!(probe.written().contains("(begin (a))"));
}

#[test]
fn test_planned_project_load_is_sent() {
    let lang = LanguageDef::standard();
    let rules = LinkRules::new(&lang).unwrap();
    let mut ws = Workspace::new("Screen1");
    ws.add_component("Button1", "Button", "Screen1").unwrap();

    let mut planner = SyncPlanner::new(&lang, &rules);
    let plan = planner.plan(&mut ws, WorkspaceEvent::ProjectLoad).unwrap();
    assert_eq!(plan.units.len(), 1);
    assert_eq!(plan.units[0].purpose, Purpose::Load);

    let (controller, probe) = controller(0);
    controller.load_project(&plan.units[0].code).unwrap();
    let written = probe.written();
    assert!(written.starts_with("(process-repl-input \"load:-1\" (begin (clear-current-form)"));
    assert!(written.contains("(add-component Screen1 Button Button1)"));
}

#[test]
fn test_rename_resends_handlers() {
    let lang = LanguageDef::standard();
    let rules = LinkRules::new(&lang).unwrap();
    let mut ws = Workspace::new("Screen1");
    ws.add_component("Button1", "Button", "Screen1").unwrap();
    let click = ws.component_event(&lang, "Button1", "Click").unwrap();

    let mut planner = SyncPlanner::new(&lang, &rules);
    planner.plan(&mut ws, WorkspaceEvent::ProjectLoad).unwrap();

    ws.rename_component("Button1", "OkButton").unwrap();
    let plan = planner
        .plan(
            &mut ws,
            WorkspaceEvent::ComponentRenamed {
                old: "Button1".to_string(),
                new: "OkButton".to_string(),
            },
        )
        .unwrap();

    assert_eq!(plan.units[0].code, "(rename-component \"Button1\" \"OkButton\")");
    assert_eq!(plan.units[1].origin, Some(click));
    assert!(plan.units[1].code.starts_with("(define-event OkButton Click ()"));
    assert!(planner.live_components().any(|c| c == "OkButton"));
}

#[test]
fn test_deleted_procedure_is_neutralized() {
    let lang = LanguageDef::standard();
    let rules = LinkRules::new(&lang).unwrap();
    let mut ws = Workspace::new("Screen1");
    let def = ws.add_procedure(&lang, "greet", &["who"], false).unwrap();

    let mut planner = SyncPlanner::new(&lang, &rules);
    let decl = yail_compiler::declaration_of(&lang, &ws, def).unwrap();
    ws.blocks.remove_block(def).unwrap();

    let plan = planner.plan(&mut ws, WorkspaceEvent::BlockDeleted(decl)).unwrap();
    assert_eq!(plan.units[0].code, "(def (greet who) *the-null-value*)");
}

#[test]
fn test_install_and_push_run_on_selected_device() {
    let (controller, probe) = controller(0);
    controller.install_companion(Path::new("companion.apk")).unwrap();
    controller.push_asset(Path::new("kitty.png"), "/sdcard/AppInventor/assets/kitty.png").unwrap();
    assert_eq!(
        *probe.calls.lock(),
        vec![
            "install companion.apk on emulator-5554".to_string(),
            "push kitty.png /sdcard/AppInventor/assets/kitty.png".to_string(),
        ]
    );

    controller.select_device(None);
    assert!(matches!(
        controller.install_companion(Path::new("companion.apk")),
        Err(SyncError::NoDevice)
    ));
}

#[test]
fn test_switching_device_closes_old_connection() {
    let (controller, probe) = controller(0);
    let mut ws = Workspace::new("Screen1");
    controller.send_now("(+ 1 2)", Purpose::DoIt, None).unwrap();
    assert_eq!(probe.closes.load(Ordering::SeqCst), 0);

    controller.device_plugged("emulator-5556");
    controller.select_device(Some("emulator-5556".to_string()));
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    assert!(probe.device.lock().is_none());

    controller.send_now("(+ 3 4)", Purpose::DoIt, None).unwrap();
    assert_eq!(probe.connects.load(Ordering::SeqCst), 2);

    // The first reader has exited without reporting a lost connection.
    thread::sleep(Duration::from_millis(50));
    assert!(!controller.drain(&mut ws).contains(&ReplNotice::ConnectionLost));
}
