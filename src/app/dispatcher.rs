//! Dispatcher — the single consumer of the event queue.
//!
//! [`Dispatcher`] owns the connectivity and acquisition state machines,
//! the outbox and every policy flag.  Each [`Dispatcher::handle`] call is
//! one finite step: it updates state, issues commands through the port
//! traits and returns.  The only suspension point is waiting for the next
//! event in [`Dispatcher::run`] / [`Dispatcher::run_async`].
//!
//! ```text
//!  EventQueue ──pop──▶ ┌──────────────────────────────┐ ──▶ LocationPort
//!                      │          Dispatcher           │ ──▶ CellularPort
//!       Timers ◀─arm── │ Connectivity · Acquisition ·  │ ──▶ BackendPort
//!                      │ Outbox · Codec                │ ──▶ IndicatorPort
//!                      └──────────────────────────────┘
//! ```
//!
//! Timer events can be stale (fired just before a cancel or rearm), so
//! every timer event is re-checked against current state before acting.
//! They can also be lost on a full queue, so timer-driven state is read
//! from [`Timers`] itself: motion suppression is "debounce timer armed",
//! and an `Active` search without an armed acquisition timer is ended on
//! the next event.

use log::{debug, error, info, warn};

use crate::config::{EVENT_QUEUE_CAPACITY, OUTBOX_CAPACITY, TrackerConfig};
use crate::error::{AcquisitionError, ConfigError, OutboxError};
use crate::events::{AgpsRequest, Event, EventQueue, LocationFix, MotionSample};
use crate::fsm::LinkState;
use crate::fsm::acquisition::Acquisition;
use crate::fsm::connectivity::{Connectivity, Reachability};
use crate::outbox::{Outbox, OutboxRecord, Payload};
use crate::timer::{TimerId, TimerMode, Timers};

use super::ports::{AcquisitionSettings, Codec, DevicePorts, IndicatorMode};

/// Backend topic for motion records.
pub const TOPIC_MOTION: &str = "motion";
/// Backend topic for location fixes.
pub const TOPIC_FIX: &str = "gps";
/// Backend topic for the once-per-boot device record.
pub const TOPIC_BOOT: &str = "boot";

// ───────────────────────────────────────────────────────────────
// Stats
// ───────────────────────────────────────────────────────────────

/// Running counters, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatcherStats {
    pub events_handled: u32,
    /// Records the backend accepted (direct, drained and boot).
    pub published: u32,
    /// Records buffered in the outbox.
    pub queued: u32,
    pub outbox_rejections: u32,
    pub publish_failures: u32,
    pub backend_errors: u32,
    pub drains: u32,
    pub stale_timer_events: u32,
    pub encode_failures: u32,
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

pub struct Dispatcher<'q, C: Codec> {
    config: TrackerConfig,
    queue: &'q EventQueue<EVENT_QUEUE_CAPACITY>,
    timers: &'q Timers,
    codec: C,
    connectivity: Connectivity,
    acquisition: Acquisition,
    outbox: Outbox<OUTBOX_CAPACITY>,
    /// Boot record delivered this boot.
    boot_record_sent: bool,
    /// Monotonic time of the last motion event.
    last_motion_ms: Option<u64>,
    /// Assistance request parked until cellular comes up.
    pending_agps: Option<AgpsRequest>,
    /// Assistance data was fetched at least once.
    agps_used: bool,
    indicator: IndicatorMode,
    stats: DispatcherStats,
}

impl<'q, C: Codec> Dispatcher<'q, C> {
    /// Validate `config` and build an idle dispatcher.
    ///
    /// Nothing is commanded until [`start`](Self::start).
    pub fn new(
        config: TrackerConfig,
        queue: &'q EventQueue<EVENT_QUEUE_CAPACITY>,
        timers: &'q Timers,
        codec: C,
    ) -> Result<Self, ConfigError> {
        if let Err(e) = config.validate() {
            error!("Configuration rejected: {}", e);
            return Err(e);
        }

        let settings = AcquisitionSettings {
            timeout_secs: config.acquisition_timeout_secs,
            fix_interval_secs: config.acquisition_fix_interval_secs,
        };
        let acquisition = Acquisition::new(
            settings,
            config.acquisition_timeout_ms(),
            config.motion_trigger_interval_ms(),
        );

        Ok(Self {
            config,
            queue,
            timers,
            codec,
            connectivity: Connectivity::new(),
            acquisition,
            outbox: Outbox::new(),
            boot_record_sent: false,
            last_motion_ms: None,
            pending_agps: None,
            agps_used: false,
            indicator: IndicatorMode::Off,
            stats: DispatcherStats::default(),
        })
    }

    /// Boot sequence: indicator on, cellular activation requested, first
    /// search started if configured.
    pub fn start(&mut self, hw: &mut impl DevicePorts) {
        info!("Dispatcher starting");
        self.indicate(IndicatorMode::Glow, hw);
        self.request_cellular(hw);
        if self.config.start_acquisition_on_boot {
            self.start_acquisition(hw);
        }
    }

    /// Caller needs the backend: bring up whichever layer is missing.
    pub fn require_backend(&mut self, hw: &mut impl DevicePorts) {
        match self.connectivity.cellular() {
            LinkState::Connected => self.request_backend(hw),
            LinkState::Disconnected => self.request_cellular(hw),
            LinkState::Connecting => debug!("Cellular still connecting"),
        }
    }

    /// Block on the queue forever, handling events in order.
    pub fn run(&mut self, hw: &mut impl DevicePorts) -> ! {
        loop {
            let event = self.queue.pop_blocking();
            self.handle(event, hw);
        }
    }

    /// [`run`](Self::run) for cooperative executors.
    pub async fn run_async(&mut self, hw: &mut impl DevicePorts) {
        loop {
            let event = self.queue.pop().await;
            self.handle(event, hw);
        }
    }

    /// Handle every event already queued, including events pushed while
    /// handling.  Returns the number handled.
    pub fn process_pending(&mut self, hw: &mut impl DevicePorts) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.try_pop() {
            self.handle(event, hw);
            handled += 1;
        }
        handled
    }

    /// One state-machine step.
    pub fn handle(&mut self, event: Event, hw: &mut impl DevicePorts) {
        self.stats.events_handled = self.stats.events_handled.wrapping_add(1);
        info!("Evt: {}", event.kind());

        // A fix may still land after the timer fired; the timeout itself
        // goes through the normal path.
        if !matches!(
            event,
            Event::AcquisitionFixAvailable(_) | Event::AcquisitionTimeout
        ) {
            self.end_expired_search(hw);
        }

        match event {
            Event::CellularConnected
            | Event::CellularDisconnected
            | Event::BackendConnected
            | Event::BackendDisconnected
            | Event::BackendError(_) => self.on_connectivity(event, hw),

            Event::AcquisitionStarted | Event::AcquisitionActive => {
                if self.acquisition.is_active() {
                    self.indicate(IndicatorMode::FastBlink, hw);
                }
            }
            Event::AcquisitionInactive => {
                if !self.acquisition.is_active() && self.indicator == IndicatorMode::FastBlink {
                    self.indicate(IndicatorMode::Glow, hw);
                }
            }
            Event::AcquisitionTimeout => self.on_acquisition_timeout(hw),
            Event::AcquisitionFixAvailable(fix) => self.on_fix(fix, hw),
            Event::AgpsAssistanceNeeded(request) => self.on_agps(request, hw),

            Event::MotionDetected(sample) => self.on_motion(sample, hw),
            Event::MotionRearmed => self.on_motion_rearmed(),

            Event::InactivityTimeout => self.on_inactivity(hw),
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    pub fn outbox(&self) -> &Outbox<OUTBOX_CAPACITY> {
        &self.outbox
    }

    pub fn timers(&self) -> &Timers {
        self.timers
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn boot_record_sent(&self) -> bool {
        self.boot_record_sent
    }

    /// Motion may not start a search while the debounce timer runs.
    pub fn motion_suppressed(&self) -> bool {
        self.timers.is_armed(TimerId::MotionDebounce)
    }

    pub fn last_motion_ms(&self) -> Option<u64> {
        self.last_motion_ms
    }

    pub fn pending_agps(&self) -> Option<&AgpsRequest> {
        self.pending_agps.as_ref()
    }

    pub fn indicator(&self) -> IndicatorMode {
        self.indicator
    }

    // ───────────────────────────────────────────────────────────
    // Connectivity
    // ───────────────────────────────────────────────────────────

    fn on_connectivity(&mut self, event: Event, hw: &mut impl DevicePorts) {
        if let Event::BackendError(code) = event {
            self.stats.backend_errors = self.stats.backend_errors.saturating_add(1);
            warn!("Backend error {}", code);
        }

        let edge = self.connectivity.apply(event.kind());

        match event {
            Event::CellularConnected => {
                if let Some(request) = self.pending_agps.take() {
                    info!("Re-queueing deferred A-GPS request");
                    if self.queue.push(Event::AgpsAssistanceNeeded(request)).is_err() {
                        // Cellular is up now, so serve it in this step.
                        self.on_agps(request, hw);
                    }
                }
                if !self.outbox.is_empty() {
                    self.request_backend(hw);
                }
            }
            Event::CellularDisconnected => {
                self.timers.cancel(TimerId::Inactivity);
            }
            _ => {}
        }

        match edge {
            Reachability::BecameReachable => self.on_reachable(hw),
            Reachability::BecameUnreachable => {
                info!("Backend unreachable ({} buffered)", self.outbox.len())
            }
            Reachability::Unchanged => {}
        }
    }

    fn on_reachable(&mut self, hw: &mut impl DevicePorts) {
        info!("Backend reachable");
        self.stats.drains = self.stats.drains.saturating_add(1);

        let report = self.outbox.drain(hw);
        self.stats.published = self.stats.published.saturating_add(report.published as u32);
        if report.failed.is_some() {
            self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
            return;
        }

        if !self.boot_record_sent {
            self.send_boot_record(hw);
        }
    }

    /// Publish the device record.  The flag is set only once the backend
    /// accepted it; a failure is retried on the next reachable edge.
    fn send_boot_record(&mut self, hw: &mut impl DevicePorts) {
        let mut info = hw.device_info();
        if info.timestamp_ms == 0 {
            info.timestamp_ms = hw.unix_time_ms().unwrap_or(0);
        }

        let payload = match self.codec.encode_device_info(&info) {
            Ok(p) => p,
            Err(e) => {
                self.stats.encode_failures = self.stats.encode_failures.saturating_add(1);
                warn!("Boot record encode failed: {}", e);
                return;
            }
        };

        match hw.publish(TOPIC_BOOT, &payload) {
            Ok(()) => {
                self.boot_record_sent = true;
                self.stats.published = self.stats.published.saturating_add(1);
                info!("Boot record published");
            }
            Err(e) => {
                self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
                warn!("Boot record publish failed: {}", e);
            }
        }
    }

    fn request_cellular(&mut self, hw: &mut impl DevicePorts) {
        if !self.connectivity.request_cellular() {
            return;
        }
        if let Err(e) = hw.activate() {
            warn!("Cellular activation refused: {}", e);
            self.connectivity.cellular_request_failed();
        }
    }

    fn request_backend(&mut self, hw: &mut impl DevicePorts) {
        if !self.connectivity.request_backend() {
            return;
        }
        if let Err(e) = hw.connect() {
            warn!("Backend connect refused: {}", e);
            self.connectivity.backend_request_failed();
        }
    }

    // ───────────────────────────────────────────────────────────
    // Acquisition
    // ───────────────────────────────────────────────────────────

    fn start_acquisition(&mut self, hw: &mut impl DevicePorts) -> bool {
        let now = hw.now_ms();
        match self.acquisition.start(hw, self.timers, self.queue, now) {
            Ok(()) => {
                // Not left to AcquisitionStarted, which a full queue drops.
                self.indicate(IndicatorMode::FastBlink, hw);
                true
            }
            Err(AcquisitionError::AlreadyActive) => {
                debug!("Acquisition already active");
                false
            }
            Err(e) => {
                warn!("Acquisition start failed: {}", e);
                false
            }
        }
    }

    fn on_acquisition_timeout(&mut self, hw: &mut impl DevicePorts) {
        if !self.acquisition.on_timeout(hw, self.timers, self.queue) {
            self.stats.stale_timer_events = self.stats.stale_timer_events.saturating_add(1);
            return;
        }
        warn!("No fix before acquisition timeout");
        // Let the next motion start a fresh search.
        self.timers.cancel(TimerId::MotionDebounce);
        self.indicate(IndicatorMode::Glow, hw);
    }

    /// Search still `Active` with its timer gone: the expiry event was
    /// dropped on a full queue, or is still queued and will be stale.
    fn end_expired_search(&mut self, hw: &mut impl DevicePorts) {
        if self.acquisition.is_active() && !self.timers.is_armed(TimerId::Acquisition) {
            warn!("Acquisition outlived its timer, ending search");
            self.on_acquisition_timeout(hw);
        }
    }

    fn on_fix(&mut self, mut fix: LocationFix, hw: &mut impl DevicePorts) {
        let now = hw.now_ms();
        let outcome = self.acquisition.on_fix(self.timers, self.queue, now);

        if fix.timestamp_ms == 0 {
            fix.timestamp_ms = hw.unix_time_ms().unwrap_or(0);
        }
        info!(
            "Fix: {:.6},{:.6} ({} sats, hdop {:.1})",
            fix.latitude, fix.longitude, fix.satellites, fix.hdop
        );
        self.indicate(IndicatorMode::Solid, hw);

        match self.codec.encode_fix(&fix) {
            Ok(payload) => self.deliver(TOPIC_FIX, &payload, hw),
            Err(e) => {
                self.stats.encode_failures = self.stats.encode_failures.saturating_add(1);
                warn!("Fix encode failed: {}", e);
            }
        }

        self.timers.arm(
            TimerId::Inactivity,
            now,
            self.config.inactivity_timeout_ms(),
            TimerMode::OneShot,
        );

        if outcome.first
            && self.config.release_cellular_after_first_fix
            && self.agps_used
            && self.outbox.is_empty()
        {
            info!("First fix obtained, releasing cellular link");
            if let Err(e) = hw.deactivate() {
                warn!("Cellular release refused: {}", e);
            }
        }
    }

    fn on_agps(&mut self, request: AgpsRequest, hw: &mut impl DevicePorts) {
        if self.connectivity.cellular() != LinkState::Connected {
            info!("A-GPS request deferred until cellular is up");
            if self.pending_agps.replace(request).is_some() {
                debug!("Older A-GPS request replaced");
            }
            self.request_cellular(hw);
            return;
        }

        match hw.request_assistance(&request) {
            Ok(()) => {
                self.agps_used = true;
                info!(
                    "A-GPS requested (eph 0x{:08x}, alm 0x{:08x}, flags 0x{:02x})",
                    request.sv_mask_ephemeris, request.sv_mask_almanac, request.data_flags
                );
            }
            Err(e) => warn!("A-GPS request failed: {}", e),
        }
    }

    // ───────────────────────────────────────────────────────────
    // Motion
    // ───────────────────────────────────────────────────────────

    fn on_motion(&mut self, mut sample: MotionSample, hw: &mut impl DevicePorts) {
        let now = hw.now_ms();
        self.last_motion_ms = Some(now);

        if self.motion_suppressed() {
            debug!("Motion inside debounce window, no new search");
        } else if self.start_acquisition(hw) {
            self.timers.arm(
                TimerId::MotionDebounce,
                now,
                self.config.motion_trigger_interval_ms(),
                TimerMode::OneShot,
            );
        }

        if sample.timestamp_ms == 0 {
            sample.timestamp_ms = hw.unix_time_ms().unwrap_or(0);
        }
        match self.codec.encode_motion(&sample) {
            Ok(payload) => self.deliver(TOPIC_MOTION, &payload, hw),
            Err(e) => {
                self.stats.encode_failures = self.stats.encode_failures.saturating_add(1);
                warn!("Motion encode failed: {}", e);
            }
        }
    }

    /// Informational: suppression follows the debounce timer, so a
    /// dropped `MotionRearmed` cannot leave motion locked out.
    fn on_motion_rearmed(&mut self) {
        if self.timers.is_armed(TimerId::MotionDebounce) {
            // Rearmed by a fix after this expiry was queued.
            self.stats.stale_timer_events = self.stats.stale_timer_events.saturating_add(1);
            return;
        }
        debug!("Motion re-armed");
    }

    // ───────────────────────────────────────────────────────────
    // Inactivity
    // ───────────────────────────────────────────────────────────

    fn on_inactivity(&mut self, hw: &mut impl DevicePorts) {
        if self.timers.is_armed(TimerId::Inactivity) {
            self.stats.stale_timer_events = self.stats.stale_timer_events.saturating_add(1);
            return;
        }
        if !self.config.disconnect_on_inactivity {
            debug!("Inactivity timeout, keeping backend session");
            return;
        }
        if self.connectivity.backend() == LinkState::Connected {
            info!("Inactivity timeout, disconnecting backend");
            if let Err(e) = hw.disconnect() {
                warn!("Backend disconnect failed: {}", e);
            }
        }
    }

    // ───────────────────────────────────────────────────────────
    // Delivery
    // ───────────────────────────────────────────────────────────

    /// Publish now if reachable, otherwise (or on failure) buffer.
    fn deliver(&mut self, topic: &'static str, payload: &Payload, hw: &mut impl DevicePorts) {
        if self.connectivity.reachable() {
            match hw.publish(topic, payload) {
                Ok(()) => {
                    self.stats.published = self.stats.published.saturating_add(1);
                    return;
                }
                Err(e) => {
                    self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
                    warn!("Publish to '{}' failed: {}, buffering", topic, e);
                }
            }
        }

        let queued = OutboxRecord::new(topic, payload, hw.now_ms())
            .and_then(|record| self.outbox.enqueue(record));
        match queued {
            Ok(()) => self.stats.queued = self.stats.queued.saturating_add(1),
            Err(OutboxError::Full) => {
                self.stats.outbox_rejections = self.stats.outbox_rejections.saturating_add(1);
            }
            Err(e) => warn!("'{}' record not buffered: {}", topic, e),
        }

        if !self.connectivity.reachable() {
            self.require_backend(hw);
        }
    }

    fn indicate(&mut self, mode: IndicatorMode, hw: &mut impl DevicePorts) {
        if !self.config.use_indicator || self.indicator == mode {
            return;
        }
        self.indicator = mode;
        hw.set_mode(mode);
    }
}
