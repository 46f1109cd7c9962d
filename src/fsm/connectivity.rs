//! Connectivity state machine: cellular link + backend session.
//!
//! `reachable()` holds iff both layers are `Connected`.  Every transition
//! that changes reachability is reported back to the caller so the
//! dispatcher can drain the outbox exactly once per False→True edge.
//!
//! Connect failures are not retried here; reconnect/backoff is the
//! collaborator's business.  This machine only reacts to the terminal
//! notifications it is given.

use log::{info, warn};

use super::LinkState;
use crate::events::EventKind;

/// Edge in `reachable()` produced by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    BecameReachable,
    BecameUnreachable,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
    cellular: LinkState,
    backend: LinkState,
}

impl Connectivity {
    pub const fn new() -> Self {
        Self {
            cellular: LinkState::Disconnected,
            backend: LinkState::Disconnected,
        }
    }

    pub const fn cellular(&self) -> LinkState {
        self.cellular
    }

    pub const fn backend(&self) -> LinkState {
        self.backend
    }

    /// Both the cellular link and the backend session are up.
    pub const fn reachable(&self) -> bool {
        self.cellular.is_connected() && self.backend.is_connected()
    }

    /// Move cellular to `Connecting` if it is down.
    ///
    /// Returns `true` when the caller must issue the activation command.
    pub fn request_cellular(&mut self) -> bool {
        if self.cellular != LinkState::Disconnected {
            return false;
        }
        self.set_cellular(LinkState::Connecting);
        true
    }

    /// Move backend to `Connecting` if cellular is up and backend is down.
    ///
    /// Returns `true` when the caller must issue the connect command.
    pub fn request_backend(&mut self) -> bool {
        if !self.cellular.is_connected() || self.backend != LinkState::Disconnected {
            return false;
        }
        self.set_backend(LinkState::Connecting);
        true
    }

    /// The activation command was refused outright.
    pub fn cellular_request_failed(&mut self) {
        if self.cellular == LinkState::Connecting {
            self.set_cellular(LinkState::Disconnected);
        }
    }

    /// The connect command was refused outright.
    pub fn backend_request_failed(&mut self) {
        if self.backend == LinkState::Connecting {
            self.set_backend(LinkState::Disconnected);
        }
    }

    /// Apply a connectivity notification.  Non-connectivity kinds are
    /// ignored.
    pub fn apply(&mut self, kind: EventKind) -> Reachability {
        let was_reachable = self.reachable();

        match kind {
            EventKind::CellularConnected => self.set_cellular(LinkState::Connected),
            EventKind::CellularDisconnected => {
                self.set_cellular(LinkState::Disconnected);
                // No backend session survives a dead link.
                self.set_backend(LinkState::Disconnected);
            }
            EventKind::BackendConnected => {
                if self.cellular.is_connected() {
                    self.set_backend(LinkState::Connected);
                } else {
                    warn!(
                        "Connectivity: backend up while cellular is {:?}, ignoring",
                        self.cellular
                    );
                }
            }
            EventKind::BackendDisconnected | EventKind::BackendError => {
                self.set_backend(LinkState::Disconnected);
            }
            _ => {}
        }

        match (was_reachable, self.reachable()) {
            (false, true) => Reachability::BecameReachable,
            (true, false) => Reachability::BecameUnreachable,
            _ => Reachability::Unchanged,
        }
    }

    fn set_cellular(&mut self, next: LinkState) {
        if self.cellular != next {
            info!("Connectivity: cellular {:?} -> {:?}", self.cellular, next);
            self.cellular = next;
        }
    }

    fn set_backend(&mut self, next: LinkState) {
        if self.backend != next {
            info!("Connectivity: backend {:?} -> {:?}", self.backend, next);
            self.backend = next;
        }
    }
}
