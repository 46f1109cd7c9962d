//! Simulated device adapter for host runs.
//!
//! [`SimDevice`] implements every hardware-side port.  Commands are
//! logged, and the notification a real modem, GNSS receiver or backend
//! client would deliver is pushed into the event queue, so the dispatcher
//! sees the same event flow it sees on hardware.
//!
//! Network conditions live in [`SimNetwork`] (atomics) so a scripted
//! scenario running in another task can change them while the dispatcher
//! holds the device.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{info, warn};

use crate::app::ports::{
    AcquisitionSettings, BackendPort, CellularPort, ClockPort, DeviceInfo, DeviceInfoPort,
    IndicatorMode, IndicatorPort, LocationPort,
};
use crate::error::{BackendError, CellularError, LocationError, QueueError};
use crate::events::{AgpsRequest, Event, EventPush};

use super::log_indicator::LogIndicator;
use super::time::SystemClock;

/// Errno-style codes the simulated backend reports.
const ECONNREFUSED: i32 = -111;
const ECONNRESET: i32 = -104;

// ───────────────────────────────────────────────────────────────
// Network conditions
// ───────────────────────────────────────────────────────────────

pub struct SimNetwork {
    coverage: AtomicBool,
    backend_available: AtomicBool,
    registered: AtomicBool,
    session: AtomicBool,
    published: AtomicU32,
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimNetwork {
    pub const fn new() -> Self {
        Self {
            coverage: AtomicBool::new(true),
            backend_available: AtomicBool::new(true),
            registered: AtomicBool::new(false),
            session: AtomicBool::new(false),
            published: AtomicU32::new(0),
        }
    }

    /// Lose coverage: the modem deregisters and the session dies with it.
    pub fn drop_coverage(&self, events: &dyn EventPush) -> Result<(), QueueError> {
        self.coverage.store(false, Ordering::Relaxed);
        self.session.store(false, Ordering::Relaxed);
        if self.registered.swap(false, Ordering::Relaxed) {
            info!("SIM | coverage lost");
            events.push(Event::CellularDisconnected)?;
        }
        Ok(())
    }

    /// Regain coverage: the modem re-registers on its own.
    pub fn restore_coverage(&self, events: &dyn EventPush) -> Result<(), QueueError> {
        self.coverage.store(true, Ordering::Relaxed);
        if !self.registered.swap(true, Ordering::Relaxed) {
            info!("SIM | coverage restored");
            events.push(Event::CellularConnected)?;
        }
        Ok(())
    }

    /// Make the backend refuse (or accept again) connections and publishes.
    pub fn set_backend_available(&self, available: bool) {
        info!("SIM | backend {}", if available { "up" } else { "down" });
        self.backend_available.store(available, Ordering::Relaxed);
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Relaxed)
    }

    pub fn has_session(&self) -> bool {
        self.session.load(Ordering::Relaxed)
    }

    /// Records the backend accepted.
    pub fn published(&self) -> u32 {
        self.published.load(Ordering::Relaxed)
    }
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

pub struct SimDevice<'a> {
    events: &'a dyn EventPush,
    net: &'a SimNetwork,
    clock: SystemClock,
    indicator: LogIndicator,
    searching: bool,
}

impl<'a> SimDevice<'a> {
    pub fn new(events: &'a dyn EventPush, net: &'a SimNetwork, clock: SystemClock) -> Self {
        Self {
            events,
            net,
            clock,
            indicator: LogIndicator::new(),
            searching: false,
        }
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn indicator(&self) -> &LogIndicator {
        &self.indicator
    }

    fn notify(&self, event: Event) {
        if self.events.push(event).is_err() {
            warn!("SIM | {} notification dropped", event.kind());
        }
    }
}

impl LocationPort for SimDevice<'_> {
    fn start(&mut self, settings: &AcquisitionSettings) -> Result<(), LocationError> {
        info!(
            "SIM | GNSS start (timeout {}s, interval {}s)",
            settings.timeout_secs, settings.fix_interval_secs
        );
        self.searching = true;
        self.notify(Event::AcquisitionActive);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), LocationError> {
        if self.searching {
            info!("SIM | GNSS stop");
            self.searching = false;
            self.notify(Event::AcquisitionInactive);
        }
        Ok(())
    }

    fn request_assistance(&mut self, request: &AgpsRequest) -> Result<(), LocationError> {
        if !self.net.is_registered() {
            return Err(LocationError::Unavailable);
        }
        info!(
            "SIM | A-GPS injected (eph 0x{:08x}, flags 0x{:02x})",
            request.sv_mask_ephemeris, request.data_flags
        );
        Ok(())
    }
}

impl CellularPort for SimDevice<'_> {
    fn activate(&mut self) -> Result<(), CellularError> {
        if self.net.coverage.load(Ordering::Relaxed) {
            info!("SIM | LTE attach");
            if !self.net.registered.swap(true, Ordering::Relaxed) {
                self.notify(Event::CellularConnected);
            }
        } else {
            info!("SIM | LTE attach pending (no coverage)");
        }
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), CellularError> {
        info!("SIM | LTE detach");
        self.net.session.store(false, Ordering::Relaxed);
        if self.net.registered.swap(false, Ordering::Relaxed) {
            self.notify(Event::CellularDisconnected);
        }
        Ok(())
    }
}

impl BackendPort for SimDevice<'_> {
    fn is_connected(&self) -> bool {
        self.net.has_session()
    }

    fn connect(&mut self) -> Result<(), BackendError> {
        if !self.net.is_registered() {
            return Err(BackendError::NotConnected);
        }
        if self.net.backend_available.load(Ordering::Relaxed) {
            info!("SIM | backend session up");
            self.net.session.store(true, Ordering::Relaxed);
            self.notify(Event::BackendConnected);
        } else {
            info!("SIM | backend refused connection");
            self.notify(Event::BackendError(ECONNREFUSED));
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BackendError> {
        if self.net.session.swap(false, Ordering::Relaxed) {
            info!("SIM | backend session closed");
            self.notify(Event::BackendDisconnected);
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BackendError> {
        if !self.net.has_session() {
            return Err(BackendError::NotConnected);
        }
        if !self.net.backend_available.load(Ordering::Relaxed) {
            self.net.session.store(false, Ordering::Relaxed);
            self.notify(Event::BackendError(ECONNRESET));
            return Err(BackendError::PublishFailed(ECONNRESET));
        }
        self.net.published.fetch_add(1, Ordering::Relaxed);
        match core::str::from_utf8(payload) {
            Ok(text) => info!("SIM | PUBLISH {} {}", topic, text),
            Err(_) => info!("SIM | PUBLISH {} <{} bytes>", topic, payload.len()),
        }
        Ok(())
    }
}

impl IndicatorPort for SimDevice<'_> {
    fn set_mode(&mut self, mode: IndicatorMode) {
        self.indicator.set_mode(mode);
    }
}

impl ClockPort for SimDevice<'_> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn unix_time_ms(&self) -> Option<u64> {
        self.clock.unix_time_ms()
    }
}

impl DeviceInfoPort for SimDevice<'_> {
    fn device_info(&mut self) -> DeviceInfo {
        let mut info = DeviceInfo {
            battery_mv: 3_900,
            rsrp: 50,
            ..DeviceInfo::default()
        };
        // Both fit their 16-byte fields.
        let _ = info.imei.push_str("000000000000000");
        let _ = info.app_version.push_str(env!("CARGO_PKG_VERSION"));
        info
    }
}
