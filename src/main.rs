//! Tracker simulator — host entry point.
//!
//! Runs the orchestration core against a simulated modem, GNSS receiver
//! and backend, driven by a scripted scenario.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  edge_executor::LocalExecutor (block_on)                     │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ timer tick   │  │ dispatcher   │  │ scenario (main     │  │
//! │  │ task         │  │ task         │  │ future)            │  │
//! │  └──────┬───────┘  └──────▲───────┘  └─────────┬──────────┘  │
//! │         │ tick()          │ pop()              │ push_event  │
//! │         └────────▶ EVENT_QUEUE ◀───────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `tracker-sim [config.json]`.  Without a file a short-timeout
//! demo configuration is used.  Log level via `RUST_LOG` (default info).

#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use async_io_mini::Timer;
use log::{info, warn};

use tracker::adapters::sim::{SimDevice, SimNetwork};
use tracker::adapters::time::SystemClock;
use tracker::app::dispatcher::Dispatcher;
use tracker::app::ports::ClockPort;
use tracker::codec::JsonCodec;
use tracker::config::TrackerConfig;
use tracker::events::{
    AgpsRequest, EVENT_QUEUE, Event, LocationFix, MotionSample, SensorValue, push_event,
};
use tracker::timer::Timers;

static TIMERS: Timers = Timers::new();
static NETWORK: SimNetwork = SimNetwork::new();

/// Short timeouts so the scripted scenario finishes in seconds.
fn demo_config() -> TrackerConfig {
    TrackerConfig {
        acquisition_timeout_secs: 3,
        motion_trigger_interval_secs: 5,
        inactivity_timeout_secs: 4,
        disconnect_on_inactivity: true,
        ..TrackerConfig::default()
    }
}

fn load_config() -> Result<TrackerConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("No config file given, using demo configuration");
        return Ok(demo_config());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = TrackerConfig::from_json(&text).with_context(|| format!("parsing {path}"))?;
    info!("Config loaded from {}", path);
    Ok(config)
}

fn push(event: Event) {
    if push_event(event).is_err() {
        warn!("Scenario: {} dropped", event.kind());
    }
}

async fn sleep_ms(ms: u64) {
    Timer::after(Duration::from_millis(ms)).await;
}

/// Software timer tick source.
async fn tick_loop(clock: SystemClock, tick_ms: u64) {
    loop {
        sleep_ms(tick_ms).await;
        TIMERS.tick(clock.now_ms(), &EVENT_QUEUE);
    }
}

fn motion(clock: &SystemClock) -> Event {
    Event::MotionDetected(MotionSample {
        timestamp_ms: clock.unix_time_ms().unwrap_or(0),
        x: SensorValue::new(0, 312_500),
        y: SensorValue::new(-1, -125_000),
        // Accelerometer is mounted upside down.
        z: SensorValue::new(9, 806_650).inverted(),
    })
}

fn fix() -> Event {
    Event::AcquisitionFixAvailable(LocationFix {
        latitude: 63.421_45,
        longitude: 10.437_02,
        altitude_m: 41.5,
        speed_kmh: 3.2,
        hdop: 1.1,
        satellites: 8,
        timestamp_ms: 0,
    })
}

/// Scripted day in the life of a tracker.
async fn scenario(clock: SystemClock, config: TrackerConfig) {
    let debounce_ms = config.motion_trigger_interval_ms();
    let acquisition_ms = config.acquisition_timeout_ms();

    info!("── Boot: receiver asks for assistance data, then gets a fix");
    sleep_ms(300).await;
    push(Event::AgpsAssistanceNeeded(AgpsRequest {
        sv_mask_ephemeris: 0x0f0f_00ff,
        sv_mask_almanac: 0xffff_ffff,
        data_flags: AgpsRequest::UTC | AgpsRequest::KLOBUCHAR | AgpsRequest::POSITION,
    }));
    sleep_ms(700).await;
    push(fix());

    info!("── Motion inside the debounce window: reported, no new search");
    sleep_ms(500).await;
    push(motion(&clock));

    info!("── Coverage lost: telemetry goes to the outbox");
    sleep_ms(500).await;
    if NETWORK.drop_coverage(&EVENT_QUEUE).is_err() {
        warn!("Scenario: coverage-loss notification dropped");
    }
    for _ in 0..3 {
        sleep_ms(200).await;
        push(motion(&clock));
    }

    info!("── Debounce lapses; next motion starts a search that times out");
    sleep_ms(debounce_ms).await;
    push(motion(&clock));
    sleep_ms(acquisition_ms + 500).await;

    info!("── Coverage back: outbox drains");
    if NETWORK.restore_coverage(&EVENT_QUEUE).is_err() {
        warn!("Scenario: coverage-restored notification dropped");
    }
    sleep_ms(1_000).await;

    info!("── Backend outage during publish");
    NETWORK.set_backend_available(false);
    sleep_ms(debounce_ms).await;
    push(motion(&clock));
    sleep_ms(500).await;
    NETWORK.set_backend_available(true);
    push(fix());
    sleep_ms(config.inactivity_timeout_ms() + 500).await;

    info!(
        "── Scenario complete: {} records accepted by backend, {} events dropped",
        NETWORK.published(),
        EVENT_QUEUE.overflow_count()
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  Tracker simulator v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config()?;
    let tick_ms = config.timer_tick_ms as u64;

    let clock = SystemClock::new();
    let mut device = SimDevice::new(&EVENT_QUEUE, &NETWORK, clock);
    let mut dispatcher = Dispatcher::new(config.clone(), &EVENT_QUEUE, &TIMERS, JsonCodec)
        .context("dispatcher configuration")?;

    dispatcher.start(&mut device);

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    executor.spawn(tick_loop(clock, tick_ms)).detach();
    executor
        .spawn(async move { dispatcher.run_async(&mut device).await })
        .detach();

    info!("System ready. Entering event loop.");
    futures_lite::future::block_on(executor.run(scenario(clock, config)));
    Ok(())
}
