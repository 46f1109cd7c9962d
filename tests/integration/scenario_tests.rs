//! End-to-end scenarios: outbox drain order, outbox overflow, acquisition
//! timeout, motion debounce and start idempotence.

use tracker::app::dispatcher::TOPIC_MOTION;
use tracker::app::ports::IndicatorMode;
use tracker::config::{OUTBOX_CAPACITY, TrackerConfig};
use tracker::error::AcquisitionError;
use tracker::events::{Event, LocationFix, MotionSample};
use tracker::fsm::acquisition::{Acquisition, AcquisitionState};
use tracker::timer::{TimerId, Timers};

use crate::mock_hw::{DeviceCall, MockDevice};
use crate::{Queue, dispatcher, idle_config};

fn motion(ts: u64) -> Event {
    Event::MotionDetected(MotionSample {
        timestamp_ms: ts,
        ..MotionSample::default()
    })
}

fn fix() -> Event {
    Event::AcquisitionFixAvailable(LocationFix {
        latitude: 48.85,
        longitude: 2.35,
        timestamp_ms: 7,
        ..LocationFix::default()
    })
}

// ── Scenario A: three buffered records drain in order ─────────

#[test]
fn buffered_records_drain_in_insertion_order() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    for ts in [101, 102, 103] {
        d.handle(motion(ts), &mut hw);
    }
    assert_eq!(d.outbox().len(), 3);
    hw.clear();

    q.push(Event::CellularConnected).unwrap();
    q.push(Event::BackendConnected).unwrap();
    d.process_pending(&mut hw);

    let topics = hw.published_topics();
    assert_eq!(topics[..3], [TOPIC_MOTION; 3]);
    let order: Vec<u64> = hw.published_payloads()[..3]
        .iter()
        .map(|p| {
            let v: serde_json::Value = serde_json::from_slice(p).unwrap();
            v["ts"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(order, [101, 102, 103]);
    assert!(d.outbox().is_empty());
    assert_eq!(d.stats().drains, 1);
}

// ── Scenario B: outbox overflow rejects the newest ────────────

#[test]
fn ninth_record_is_rejected_while_unreachable() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();
    assert_eq!(OUTBOX_CAPACITY, 8);

    for ts in 1..=9 {
        d.handle(motion(ts), &mut hw);
    }

    assert_eq!(d.outbox().len(), 8);
    assert_eq!(d.outbox().rejected_count(), 1);
    assert_eq!(d.stats().outbox_rejections, 1);
    assert_eq!(d.stats().queued, 8);

    // The oldest eight survive.
    let first: serde_json::Value =
        serde_json::from_slice(&d.outbox().front().unwrap().payload).unwrap();
    assert_eq!(first["ts"], 1);
}

// ── Scenario C: search times out ──────────────────────────────

#[test]
fn acquisition_timeout_stops_search() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(TrackerConfig::default(), &q, &timers);
    let mut hw = MockDevice::new();

    d.start(&mut hw);
    assert_eq!(q.try_pop(), Some(Event::AcquisitionStarted));
    d.handle(Event::AcquisitionStarted, &mut hw);
    assert_eq!(d.acquisition().state(), AcquisitionState::Active);

    hw.advance(119_999);
    assert_eq!(timers.tick(hw.now_ms, &q), 0);
    hw.advance(1);
    assert_eq!(timers.tick(hw.now_ms, &q), 1);

    let timeout = q.try_pop();
    assert_eq!(timeout, Some(Event::AcquisitionTimeout));
    d.handle(Event::AcquisitionTimeout, &mut hw);

    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    assert_eq!(hw.count(&DeviceCall::LocationStop), 1);
    assert_eq!(q.try_pop(), Some(Event::AcquisitionInactive));
    assert_eq!(hw.last_indicator(), Some(IndicatorMode::Glow));
}

#[test]
fn timeout_after_fix_is_stale() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(TrackerConfig::default(), &q, &timers);
    let mut hw = MockDevice::new();
    d.start(&mut hw);
    d.process_pending(&mut hw);

    // Timer expires, but the fix is handled first.
    hw.advance(120_000);
    timers.tick(hw.now_ms, &q);
    d.handle(fix(), &mut hw);
    d.process_pending(&mut hw);

    assert_eq!(d.stats().stale_timer_events, 1);
    assert_eq!(hw.count(&DeviceCall::LocationStop), 0);
    assert_eq!(d.acquisition().fix_count(), 1);
}

#[test]
fn timeout_lifts_motion_suppression() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    assert!(d.motion_suppressed());

    hw.advance(120_000);
    timers.tick(hw.now_ms, &q);
    d.process_pending(&mut hw);
    assert!(!d.motion_suppressed());
    assert!(!timers.is_armed(TimerId::MotionDebounce));

    // Next motion starts a fresh search straight away.
    d.handle(motion(2), &mut hw);
    assert_eq!(hw.starts(), 2);
}

// ── Scenario D: motion debounce ───────────────────────────────

#[test]
fn second_motion_inside_debounce_does_not_restart() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();
    hw.now_ms = 5_000;

    d.handle(motion(1), &mut hw);
    assert_eq!(hw.starts(), 1);
    let deadline = timers.deadline(TimerId::MotionDebounce);
    assert_eq!(deadline, Some(605_000));

    hw.advance(1_000);
    d.handle(motion(2), &mut hw);
    assert_eq!(hw.starts(), 1);
    assert_eq!(d.acquisition().state(), AcquisitionState::Active);
    assert_eq!(timers.deadline(TimerId::MotionDebounce), deadline);
    assert_eq!(d.last_motion_ms(), Some(6_000));
    // Both motion records were still kept for delivery.
    assert_eq!(d.outbox().len(), 2);
}

#[test]
fn motion_after_fix_waits_for_debounce_to_lapse() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    hw.advance(10_000);
    d.handle(fix(), &mut hw);
    d.process_pending(&mut hw);
    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    // The fix restarted the debounce window.
    assert_eq!(timers.deadline(TimerId::MotionDebounce), Some(610_000));

    hw.advance(300_000);
    // Only the inactivity timer from the fix is due here.
    assert_eq!(timers.tick(hw.now_ms, &q), 1);
    d.process_pending(&mut hw);
    d.handle(motion(2), &mut hw);
    assert_eq!(hw.starts(), 1);

    hw.advance(300_000);
    assert_eq!(timers.tick(hw.now_ms, &q), 1);
    d.process_pending(&mut hw);
    assert!(!d.motion_suppressed());

    d.handle(motion(3), &mut hw);
    assert_eq!(hw.starts(), 2);
}

#[test]
fn stale_rearm_does_not_lift_new_window() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();

    d.handle(motion(1), &mut hw);
    hw.advance(600_000);
    timers.tick(hw.now_ms, &q);
    // A fix lands between expiry and handling of MotionRearmed.
    d.handle(fix(), &mut hw);
    d.process_pending(&mut hw);

    assert!(d.motion_suppressed());
    assert!(d.stats().stale_timer_events >= 1);
}

// ── Start while Active ────────────────────────────────────────

#[test]
fn start_while_active_is_already_active() {
    let timers = Timers::new();
    let q = Queue::new();
    let config = TrackerConfig::default();
    let mut acq = Acquisition::new(
        tracker::app::ports::AcquisitionSettings {
            timeout_secs: config.acquisition_timeout_secs,
            fix_interval_secs: 0,
        },
        config.acquisition_timeout_ms(),
        config.motion_trigger_interval_ms(),
    );
    let mut hw = MockDevice::new();

    acq.start(&mut hw, &timers, &q, 0).unwrap();
    assert_eq!(
        acq.start(&mut hw, &timers, &q, 50),
        Err(AcquisitionError::AlreadyActive)
    );
    assert_eq!(hw.starts(), 1);
    assert_eq!(timers.deadline(TimerId::Acquisition), Some(120_000));
}

#[test]
fn motion_during_boot_search_does_not_reissue_start() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(TrackerConfig::default(), &q, &timers);
    let mut hw = MockDevice::new();

    d.start(&mut hw);
    d.handle(motion(1), &mut hw);
    assert_eq!(hw.starts(), 1);
    // The boot search was not motion-triggered, so no debounce window.
    assert!(!d.motion_suppressed());
}

#[test]
fn refused_start_can_be_retried_by_next_motion() {
    let (q, timers) = (Queue::new(), Timers::new());
    let mut d = dispatcher(idle_config(), &q, &timers);
    let mut hw = MockDevice::new();
    hw.refuse_start = true;

    d.handle(motion(1), &mut hw);
    assert_eq!(d.acquisition().state(), AcquisitionState::Stopped);
    assert!(!d.motion_suppressed());

    hw.refuse_start = false;
    d.handle(motion(2), &mut hw);
    assert_eq!(hw.starts(), 1);
    assert!(d.acquisition().is_active());
}
