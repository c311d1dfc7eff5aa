//! History and save pipeline over real workspaces

use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use yail_blocks::{genera, LanguageDef, Workspace};
use yail_history::{
    AutoSaveConfig, AutoSaver, FileSaveSink, HistoryError, PropertyContextSink, SaveSink, WorkspaceStore,
};

#[derive(Default)]
struct RecordingSession {
    reissued: Vec<String>,
}

impl PropertyContextSink for RecordingSession {
    fn reissue(&mut self, properties: &str) {
        self.reissued.push(properties.to_string());
    }
}

struct BrokenDisk;

impl SaveSink for BrokenDisk {
    fn write(&mut self, _path: &Path, _contents: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

#[test]
fn test_undo_restores_workspace_and_properties() {
    let lang = LanguageDef::standard();
    let mut ws = Workspace::new("Screen1");
    let saver = AutoSaver::default();
    saver.checkpoint(&ws).unwrap();

    let block = ws.add_block(&lang, genera::NUMBER, "42").unwrap();
    saver.mark_changed();
    saver.checkpoint(&ws).unwrap();
    saver.set_property_context(r#"{"Screen1":{"Title":"Hi"}}"#);

    let mut session = RecordingSession::default();
    saver.undo(&mut ws, &mut session).unwrap();
    assert!(!ws.blocks.contains(block));
    assert_eq!(session.reissued, vec![r#"{"Screen1":{"Title":"Hi"}}"#.to_string()]);

    saver.redo(&mut ws, &mut session).unwrap();
    assert_eq!(ws.blocks.get(block).unwrap().label, "42");
    assert_eq!(session.reissued.len(), 2);
}

#[test]
fn test_restore_failure_keeps_cursor() {
    let ws = Workspace::new("Screen1");
    let saver = AutoSaver::default();
    saver.on_snapshot("{ not a workspace");
    saver.mark_changed();
    saver.checkpoint(&ws).unwrap();
    assert_eq!(saver.current_state(), Some(1));

    let mut target = ws.clone();
    let err = saver.undo(&mut target, &mut ()).unwrap_err();
    assert!(matches!(err, HistoryError::Snapshot(_)));
    assert_eq!(saver.current_state(), Some(1));
}

#[test]
fn test_save_clears_flag_only_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project").join("Screen1.json");
    let ws = Workspace::new("Screen1");
    let saver = AutoSaver::default();
    saver.mark_changed();

    assert!(saver.save(&ws, &mut BrokenDisk, &path).is_err());
    assert!(saver.has_unsaved_changes());

    saver.save(&ws, &mut FileSaveSink, &path).unwrap();
    assert!(!saver.has_unsaved_changes());
    assert_eq!(saver.consecutive_save_failures(), 0);

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, ws.snapshot().unwrap());
}

#[test]
fn test_repeated_save_failures_escalate() {
    let config = AutoSaveConfig {
        save_failure_limit: 2,
        ..AutoSaveConfig::default()
    };
    let saver = AutoSaver::new(config);
    let ws = Workspace::new("Screen1");
    let path = Path::new("Screen1.json");

    let first = saver.save(&ws, &mut BrokenDisk, path).unwrap_err();
    assert!(matches!(first, HistoryError::SaveFailed { .. }));
    assert!(!first.is_fatal());

    let second = saver.save(&ws, &mut BrokenDisk, path).unwrap_err();
    assert!(matches!(second, HistoryError::SaveEscalation { failures: 2, .. }));
    assert!(second.is_fatal());
}

#[test]
fn test_idle_ticker_reports_due_save() {
    let config = AutoSaveConfig {
        idle_seconds: 0,
        tick_interval_ms: 5,
        ..AutoSaveConfig::default()
    };
    let saver = AutoSaver::new(config);
    let (tx, rx) = mpsc::channel();
    let mut ticker = saver.start_idle_ticker(move || {
        let _ = tx.send(());
    });

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    saver.mark_changed();
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    ticker.stop();
}
