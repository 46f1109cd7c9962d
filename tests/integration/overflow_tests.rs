//! Dispatcher behaviour while the event queue overflows: dropped timer
//! expiries, dropped self-notifications and a dropped A-GPS re-queue must
//! not leave the tracker stuck.

use tracker::app::ports::IndicatorMode;
use tracker::config::TrackerConfig;
use tracker::events::{AgpsRequest, Event, LocationFix, MotionSample};
use tracker::fsm::acquisition::AcquisitionState;
use tracker::timer::{TimerId, Timers};

use crate::mock_hw::{DeviceCall, MockDevice};
use crate::{Queue, dispatcher, idle_config};

// ── Helpers ───────────────────────────────────────────────────

fn motion(ts: u64) -> Event {
    Event::MotionDetected(MotionSample {
        timestamp_ms: ts,
        ..MotionSample::default()
    })
}

fn fix() -> Event {
    Event::AcquisitionFixAvailable(LocationFix {
        latitude: 60.39,
        longitude: 5.32,
        timestamp_ms: 3,
        ..LocationFix::default()
    })
}

/// Fill the queue with filler until a push fails.
fn fill(q: &Queue) {
    while q.push(Event::AcquisitionActive).is_ok() {}
    assert!(q.is_full());
}

/// Throw away everything queued, as if the filler had been consumed.
fn discard(q: &Queue) {
    while q.try_pop().is_some() {}
}

// ── Timer expiries lost ───────────────────────────────────────

#[test]
fn dropped_rearm_does_not_lock_out_motion() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    d.process_pending(&mut hw);
    hw.advance(10_000);
    d.handle(fix(), &mut hw);
    d.process_pending(&mut hw);
    assert!(d.motion_suppressed());

    fill(&q);
    hw.advance(690_000);
    // Inactivity and debounce expire, both events are lost.
    assert_eq!(timers.tick(hw.now_ms, &q), 2);
    assert_eq!(q.overflow_count(), 3);
    assert!(!timers.is_armed(TimerId::MotionDebounce));
    assert!(!d.motion_suppressed());
    discard(&q);

    hw.advance(3 * 3_600_000);
    d.handle(motion(2), &mut hw);
    assert_eq!(hw.starts(), 2);
    assert!(d.acquisition().is_active());
}

#[test]
fn dropped_timeout_ends_search_on_next_event() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    d.process_pending(&mut hw);

    fill(&q);
    hw.advance(120_000);
    assert_eq!(timers.tick(hw.now_ms, &q), 1);
    assert_eq!(d.acquisition().state(), AcquisitionState::Active);
    assert!(!timers.is_armed(TimerId::Acquisition));
    discard(&q);

    hw.advance(3_600_000);
    d.handle(Event::CellularConnected, &mut hw);

    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    assert_eq!(d.acquisition().timeout_count(), 1);
    assert_eq!(hw.count(&DeviceCall::LocationStop), 1);
    assert_eq!(hw.last_indicator(), Some(IndicatorMode::Glow));
    assert!(!d.motion_suppressed());
    assert_eq!(q.try_pop(), Some(Event::AcquisitionInactive));
}

#[test]
fn motion_restarts_search_after_dropped_timeout() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    d.process_pending(&mut hw);

    fill(&q);
    hw.advance(120_000);
    timers.tick(hw.now_ms, &q);
    discard(&q);

    hw.advance(300_000);
    d.handle(motion(2), &mut hw);

    // Old search stopped, a fresh bounded one started.
    assert_eq!(hw.count(&DeviceCall::LocationStop), 1);
    assert_eq!(hw.starts(), 2);
    assert!(d.acquisition().is_active());
    assert_eq!(timers.deadline(TimerId::Acquisition), Some(540_000));
    assert_eq!(timers.deadline(TimerId::MotionDebounce), Some(1_020_000));
}

#[test]
fn queued_timeout_after_recovery_is_stale() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    d.process_pending(&mut hw);

    hw.advance(120_000);
    timers.tick(hw.now_ms, &q);
    // Motion is handled while the timeout still waits in the queue.
    d.handle(motion(2), &mut hw);
    d.process_pending(&mut hw);

    assert!(d.acquisition().is_active());
    assert_eq!(hw.starts(), 2);
    assert_eq!(hw.count(&DeviceCall::LocationStop), 1);
    assert_eq!(d.stats().stale_timer_events, 1);
}

#[test]
fn fix_after_expiry_is_still_accepted() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    d.process_pending(&mut hw);

    fill(&q);
    hw.advance(120_000);
    timers.tick(hw.now_ms, &q);
    discard(&q);

    d.handle(fix(), &mut hw);
    assert_eq!(d.acquisition().fix_count(), 1);
    assert_eq!(d.acquisition().timeout_count(), 0);
    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    assert_eq!(hw.count(&DeviceCall::LocationStop), 0);
}

// ── Self-notifications lost ───────────────────────────────────

#[test]
fn search_runs_when_started_event_is_dropped() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(TrackerConfig::default(), &q, &timers);
    let mut hw = MockDevice::new();

    fill(&q);
    d.start(&mut hw);
    assert_eq!(q.overflow_count(), 2);
    assert!(d.acquisition().is_active());
    assert!(timers.is_armed(TimerId::Acquisition));
    assert_eq!(hw.last_indicator(), Some(IndicatorMode::FastBlink));
    discard(&q);

    hw.advance(120_000);
    assert_eq!(timers.tick(hw.now_ms, &q), 1);
    d.process_pending(&mut hw);
    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    assert_eq!(hw.last_indicator(), Some(IndicatorMode::Glow));
}

#[test]
fn dropped_inactive_notification_leaves_state_consistent() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    d.process_pending(&mut hw);

    fill(&q);
    d.handle(fix(), &mut hw);
    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    assert_eq!(hw.last_indicator(), Some(IndicatorMode::Solid));
    assert!(d.motion_suppressed());
    discard(&q);

    hw.advance(600_000);
    timers.tick(hw.now_ms, &q);
    d.process_pending(&mut hw);
    d.handle(motion(2), &mut hw);
    assert_eq!(hw.starts(), 2);
}

// ── A-GPS re-queue lost ───────────────────────────────────────

#[test]
fn deferred_agps_is_served_when_requeue_overflows() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();
    let request = AgpsRequest {
        sv_mask_ephemeris: 0x10,
        sv_mask_almanac: 0,
        data_flags: AgpsRequest::UTC,
    };

    d.handle(Event::AgpsAssistanceNeeded(request), &mut hw);
    assert!(d.pending_agps().is_some());

    fill(&q);
    d.handle(Event::CellularConnected, &mut hw);

    assert!(d.pending_agps().is_none());
    assert_eq!(hw.count(&DeviceCall::Assistance(request)), 1);
    discard(&q);
    assert_eq!(d.process_pending(&mut hw), 0);
}
