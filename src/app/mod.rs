//! Application core — orchestration logic, zero I/O.
//!
//! The [`dispatcher`] is the single consumer of the event queue: it steps
//! the connectivity and acquisition state machines, owns the outbox, and
//! issues commands to the outside world.  All interaction with hardware
//! and the network happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod dispatcher;
pub mod ports;
