//! Tracker orchestration core.
//!
//! Event-driven core of a cellular asset tracker: a bounded event queue
//! fed by hardware, network and timer notifications, consumed by a single
//! [`Dispatcher`](app::dispatcher::Dispatcher) that runs the connectivity
//! and acquisition state machines and buffers telemetry in an offline
//! outbox.  Hardware and network access goes through the port traits in
//! [`app::ports`].

#![deny(unused_must_use)]

// Host adapters need `std`.
#[cfg(feature = "sim")]
pub mod adapters;
pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod outbox;
pub mod timer;
