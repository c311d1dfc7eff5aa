//! Liveness flags for a sync session
//!
//! Shared between the caller's thread, the queue worker and the reader
//! thread. Every read and write goes through the one lock.

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Reconnecting,
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub state: ConnectionState,
    /// Writes are believed to reach the device.
    pub connection_happy: bool,
    pub devices_plugged_in: i32,
    pub connected_to_phone: bool,
    pub selected_device: Option<String>,
    /// Set when a project load is sent, cleared by its response.
    pub waiting_for_project_load: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_happy(&self) -> bool {
        self.inner.lock().connection_happy
    }

    pub fn selected_device(&self) -> Option<String> {
        self.inner.lock().selected_device.clone()
    }

    pub fn select_device(&self, serial: Option<String>) {
        self.inner.lock().selected_device = serial;
    }

    pub fn begin_reconnect(&self) {
        let mut s = self.inner.lock();
        s.state = ConnectionState::Reconnecting;
        s.connection_happy = false;
    }

    pub fn mark_connected(&self) {
        let mut s = self.inner.lock();
        s.state = ConnectionState::Connected;
        s.connection_happy = true;
        s.connected_to_phone = true;
    }

    /// The link broke but the device may still be there.
    pub fn mark_unhappy(&self) {
        let mut s = self.inner.lock();
        s.connection_happy = false;
        if s.state == ConnectionState::Connected {
            s.state = ConnectionState::Disconnected;
        }
    }

    pub fn mark_disconnected(&self) {
        let mut s = self.inner.lock();
        s.state = ConnectionState::Disconnected;
        s.connection_happy = false;
        s.connected_to_phone = false;
    }

    pub fn device_plugged(&self, serial: &str) {
        let mut s = self.inner.lock();
        s.devices_plugged_in += 1;
        tracing::debug!(serial, count = s.devices_plugged_in, "device attached");
    }

    /// Returns true when the unplugged device was the selected one, in which
    /// case the session drops to disconnected.
    pub fn device_unplugged(&self, serial: &str) -> bool {
        let mut s = self.inner.lock();
        s.devices_plugged_in -= 1;
        if s.devices_plugged_in < 0 {
            tracing::warn!(count = s.devices_plugged_in, "attached device count went negative, resetting");
            s.devices_plugged_in = 0;
        }

        if s.selected_device.as_deref() != Some(serial) {
            return false;
        }
        tracing::info!(serial, "selected device unplugged");
        s.selected_device = None;
        s.state = ConnectionState::Disconnected;
        s.connection_happy = false;
        s.connected_to_phone = false;
        true
    }

    pub fn set_waiting_for_project_load(&self, waiting: bool) {
        self.inner.lock().waiting_for_project_load = waiting;
    }

    pub fn is_waiting_for_project_load(&self) -> bool {
        self.inner.lock().waiting_for_project_load
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unplug_other_device_keeps_connection() {
        let session = Session::new();
        session.device_plugged("emulator-5554");
        session.select_device(Some("emulator-5554".to_string()));
        session.mark_connected();

        assert!(!session.device_unplugged("R58M123"));
        assert!(!session.device_unplugged("R58M123"));
        let s = session.snapshot();
        assert!(s.connected_to_phone);
        assert_eq!(s.devices_plugged_in, 0);
    }

    #[test]
    fn test_unplug_selected_device_disconnects() {
        let session = Session::new();
        session.device_plugged("emulator-5554");
        session.select_device(Some("emulator-5554".to_string()));
        session.mark_connected();

        assert!(session.device_unplugged("emulator-5554"));
        let s = session.snapshot();
        assert_eq!(s.state, ConnectionState::Disconnected);
        assert!(!s.connected_to_phone);
        assert!(s.selected_device.is_none());
    }

    #[test]
    fn test_count_is_clamped() {
        let session = Session::new();
        session.device_unplugged("ghost");
        assert_eq!(session.snapshot().devices_plugged_in, 0);
        session.device_plugged("a");
        assert_eq!(session.snapshot().devices_plugged_in, 1);
    }

    #[test]
    fn test_mark_unhappy_keeps_phone_flag() {
        let session = Session::new();
        session.mark_connected();
        session.mark_unhappy();
        let s = session.snapshot();
        assert!(!s.connection_happy);
        assert!(s.connected_to_phone);
        assert_eq!(s.state, ConnectionState::Disconnected);
    }
}
