//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the dispatcher against the
//! recording mock device.  All tests run on the host with no modem, GNSS
//! receiver or backend required.

mod overflow_tests;
mod scenario_tests;

use tracker::app::dispatcher::Dispatcher;
use tracker::codec::JsonCodec;
use tracker::config::{EVENT_QUEUE_CAPACITY, TrackerConfig};
use tracker::events::EventQueue;
use tracker::timer::Timers;

pub type Queue = EventQueue<EVENT_QUEUE_CAPACITY>;

/// Default configuration without the boot-time search, so tests start
/// from an idle receiver.
pub fn idle_config() -> TrackerConfig {
    TrackerConfig {
        start_acquisition_on_boot: false,
        ..TrackerConfig::default()
    }
}

pub fn dispatcher<'q>(
    config: TrackerConfig,
    queue: &'q Queue,
    timers: &'q Timers,
) -> Dispatcher<'q, JsonCodec> {
    Dispatcher::new(config, queue, timers, JsonCodec).expect("valid test config")
}
