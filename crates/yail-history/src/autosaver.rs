//! Bounded linear undo history
//!
//! Entries are serialized workspace snapshots. `current_state` points at the
//! entry matching what is on screen; checkpointing an edit drops every entry
//! after it before appending. The same lock guards the history, the
//! changed-since-checkpoint flag and the save bookkeeping, since the idle
//! ticker reads them from its own thread.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::AutoSaveConfig;
use crate::error::{HistoryError, Result};
use crate::store::{PropertyContextSink, SaveSink, WorkspaceStore};
use crate::ticker::IdleTicker;

#[derive(Debug, Default)]
struct HistoryState {
    entries: VecDeque<String>,
    current_state: Option<usize>,
    /// Edits since the last checkpoint or restore.
    changed: bool,
    save_required: bool,
    consecutive_failures: u32,
    last_change: Option<Instant>,
    property_context: Option<String>,
}

impl HistoryState {
    /// Append `state` after the cursor. Returns false for a duplicate of the
    /// current entry.
    fn record(&mut self, state: String, capacity: usize) -> bool {
        self.changed = false;
        if let Some(cur) = self.current_state {
            if self.entries.get(cur) == Some(&state) {
                return false;
            }
            self.entries.truncate(cur + 1);
        }
        self.entries.push_back(state);
        while self.entries.len() > capacity.max(1) {
            self.entries.pop_front();
        }
        self.current_state = Some(self.entries.len() - 1);
        true
    }
}

/// Undo/redo history plus the auto-save state that goes with it.
#[derive(Clone)]
pub struct AutoSaver {
    config: AutoSaveConfig,
    state: Arc<Mutex<HistoryState>>,
}

impl AutoSaver {
    pub fn new(config: AutoSaveConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HistoryState::default())),
        }
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn current_state(&self) -> Option<usize> {
        self.state.lock().current_state
    }

    /// The entry under the cursor.
    pub fn current_entry(&self) -> Option<String> {
        let state = self.state.lock();
        state.current_state.and_then(|i| state.entries.get(i).cloned())
    }

    pub fn can_undo(&self) -> bool {
        self.state.lock().current_state.is_some_and(|i| i > 0)
    }

    pub fn can_redo(&self) -> bool {
        let state = self.state.lock();
        state.current_state.is_some_and(|i| i + 1 < state.entries.len())
    }

    /// Note a user-visible edit.
    pub fn mark_changed(&self) {
        let mut state = self.state.lock();
        state.changed = true;
        state.save_required = true;
        state.last_change = Some(Instant::now());
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state.lock().save_required
    }

    /// Remember the designer properties to hand back after undo or redo.
    pub fn set_property_context(&self, properties: impl Into<String>) {
        self.state.lock().property_context = Some(properties.into());
    }

    /// Commit the workspace into history if it changed. An empty history
    /// always takes the first snapshot.
    pub fn checkpoint(&self, workspace: &impl WorkspaceStore) -> Result<bool> {
        {
            let state = self.state.lock();
            if !state.changed && !state.entries.is_empty() {
                return Ok(false);
            }
        }
        let snapshot = workspace.snapshot()?;
        let recorded = self.state.lock().record(snapshot, self.config.capacity);
        if recorded {
            tracing::debug!(entries = self.len(), "checkpoint");
        }
        Ok(recorded)
    }

    /// Record a snapshot taken elsewhere, for example by a save.
    pub fn on_snapshot(&self, snapshot: impl Into<String>) -> bool {
        self.state.lock().record(snapshot.into(), self.config.capacity)
    }

    pub fn undo(&self, workspace: &mut impl WorkspaceStore, properties: &mut impl PropertyContextSink) -> Result<()> {
        self.step(workspace, properties, Step::Back)
    }

    pub fn redo(&self, workspace: &mut impl WorkspaceStore, properties: &mut impl PropertyContextSink) -> Result<()> {
        self.step(workspace, properties, Step::Forward)
    }

    fn step(&self, workspace: &mut impl WorkspaceStore, properties: &mut impl PropertyContextSink, step: Step) -> Result<()> {
        self.checkpoint(workspace)?;

        let context = {
            let mut state = self.state.lock();
            let cur = state.current_state;
            let target = match step {
                Step::Back => cur.and_then(|i| i.checked_sub(1)).ok_or(HistoryError::NothingToUndo)?,
                Step::Forward => cur
                    .map(|i| i + 1)
                    .filter(|i| *i < state.entries.len())
                    .ok_or(HistoryError::NothingToRedo)?,
            };
            let Some(entry) = state.entries.get(target).cloned() else {
                return Err(match step {
                    Step::Back => HistoryError::NothingToUndo,
                    Step::Forward => HistoryError::NothingToRedo,
                });
            };

            workspace.restore(&entry)?;
            state.current_state = Some(target);
            state.changed = false;
            state.save_required = true;
            state.last_change = Some(Instant::now());
            tracing::debug!(?step, cursor = target, "restored history entry");
            state.property_context.clone()
        };

        if let Some(context) = context {
            properties.reissue(&context);
        }
        Ok(())
    }

    /// Write the workspace through `sink`. The unsaved flag clears only when
    /// the write succeeds; repeated failures escalate.
    pub fn save(&self, workspace: &impl WorkspaceStore, sink: &mut impl SaveSink, path: &Path) -> Result<()> {
        let contents = workspace.snapshot()?;
        match sink.write(path, &contents) {
            Ok(()) => {
                let mut state = self.state.lock();
                state.save_required = false;
                state.consecutive_failures = 0;
                tracing::info!(path = %path.display(), "saved");
                Ok(())
            }
            Err(err) => {
                let failures = {
                    let mut state = self.state.lock();
                    state.consecutive_failures += 1;
                    state.consecutive_failures
                };
                tracing::warn!(path = %path.display(), %err, failures, "save failed");
                if failures >= self.config.save_failure_limit {
                    tracing::error!(failures, "giving up on saving");
                    return Err(HistoryError::SaveEscalation {
                        failures,
                        message: err.to_string(),
                    });
                }
                Err(HistoryError::save_failed(path, err.to_string()))
            }
        }
    }

    pub fn consecutive_save_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Whether unsaved changes have sat untouched for the idle period.
    pub fn idle_save_due(&self, now: Instant) -> bool {
        let state = self.state.lock();
        state.save_required
            && state
                .last_change
                .is_some_and(|t| now.saturating_duration_since(t) >= self.config.idle())
    }

    /// Check for a due idle save on every tick and call `on_due` when one is.
    pub fn start_idle_ticker(&self, mut on_due: impl FnMut() + Send + 'static) -> IdleTicker {
        let saver = self.clone();
        IdleTicker::spawn(self.config.tick_interval(), move || {
            if saver.idle_save_due(Instant::now()) {
                on_due();
            }
        })
    }

    /// How long since the last edit, if any.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.state
            .lock()
            .last_change
            .map(|t| now.saturating_duration_since(t))
    }
}

impl Default for AutoSaver {
    fn default() -> Self {
        Self::new(AutoSaveConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Back,
    Forward,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Doc(String);

    impl WorkspaceStore for Doc {
        fn snapshot(&self) -> Result<String> {
            Ok(self.0.clone())
        }

        fn restore(&mut self, state: &str) -> Result<()> {
            self.0 = state.to_string();
            Ok(())
        }
    }

    fn edit(saver: &AutoSaver, doc: &mut Doc, text: &str) {
        doc.0 = text.to_string();
        saver.mark_changed();
        saver.checkpoint(doc).unwrap();
    }

    #[test]
    fn test_first_checkpoint_records() {
        let saver = AutoSaver::default();
        assert!(saver.checkpoint(&Doc("s0".into())).unwrap());
        assert_eq!(saver.current_state(), Some(0));
        assert!(!saver.checkpoint(&Doc("s0".into())).unwrap());
    }

    #[test]
    fn test_duplicate_is_noop() {
        let saver = AutoSaver::default();
        let mut doc = Doc("s0".into());
        saver.checkpoint(&doc).unwrap();
        edit(&saver, &mut doc, "s0");
        assert_eq!(saver.len(), 1);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let saver = AutoSaver::default();
        let mut doc = Doc("s0".into());
        saver.checkpoint(&doc).unwrap();
        edit(&saver, &mut doc, "s1");

        saver.undo(&mut doc, &mut ()).unwrap();
        assert_eq!(doc.0, "s0");
        assert_eq!(saver.current_state(), Some(0));

        saver.redo(&mut doc, &mut ()).unwrap();
        assert_eq!(doc.0, "s1");
        assert_eq!(saver.current_state(), Some(1));
    }

    #[test]
    fn test_undo_without_prior_state() {
        let saver = AutoSaver::default();
        let mut doc = Doc("s0".into());
        saver.checkpoint(&doc).unwrap();

        assert!(matches!(saver.undo(&mut doc, &mut ()), Err(HistoryError::NothingToUndo)));
        assert_eq!(saver.current_state(), Some(0));
        assert!(matches!(saver.redo(&mut doc, &mut ()), Err(HistoryError::NothingToRedo)));
        assert_eq!(saver.current_state(), Some(0));
    }

    #[test]
    fn test_edit_after_undo_truncates() {
        let saver = AutoSaver::default();
        let mut doc = Doc("s0".into());
        saver.checkpoint(&doc).unwrap();
        edit(&saver, &mut doc, "s1");
        edit(&saver, &mut doc, "s2");

        saver.undo(&mut doc, &mut ()).unwrap();
        edit(&saver, &mut doc, "s3");
        assert_eq!(saver.len(), 3);
        assert!(!saver.can_redo());
        assert_eq!(saver.current_entry().as_deref(), Some("s3"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let saver = AutoSaver::default();
        let mut doc = Doc::default();
        for i in 0..25 {
            edit(&saver, &mut doc, &format!("s{}", i));
        }
        assert_eq!(saver.len(), 20);
        assert_eq!(saver.current_state(), Some(19));

        for _ in 0..19 {
            saver.undo(&mut doc, &mut ()).unwrap();
        }
        assert_eq!(doc.0, "s5");
        assert!(!saver.can_undo());
    }

    #[test]
    fn test_undo_checkpoints_pending_edit() {
        let saver = AutoSaver::default();
        let mut doc = Doc("s0".into());
        saver.checkpoint(&doc).unwrap();

        doc.0 = "s1".into();
        saver.mark_changed();
        saver.undo(&mut doc, &mut ()).unwrap();
        assert_eq!(doc.0, "s0");

        saver.redo(&mut doc, &mut ()).unwrap();
        assert_eq!(doc.0, "s1");
    }

    #[test]
    fn test_idle_save_due() {
        let saver = AutoSaver::default();
        assert!(!saver.idle_save_due(Instant::now()));
        saver.mark_changed();
        assert!(!saver.idle_save_due(Instant::now()));
        assert!(saver.idle_save_due(Instant::now() + Duration::from_secs(6)));
    }
}
