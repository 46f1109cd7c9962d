//! Connectivity and acquisition state machines.
//!
//! Both machines are plain owned structs mutated only by the dispatcher's
//! event step, never concurrently, so neither needs a lock.
//!
//! ```text
//!  cellular:  Disconnected ──activate──▶ Connecting ──CellularConnected──▶ Connected
//!                  ▲                                                          │
//!                  └──────────────────CellularDisconnected────────────────────┘
//!
//!  backend:   Disconnected ──connect (cellular up)──▶ Connecting ──BackendConnected──▶ Connected
//!                  ▲                                                                    │
//!                  └──────BackendDisconnected / BackendError / CellularDisconnected─────┘
//!
//!  acquisition:  Stopped ──start()──▶ Active ──fix / timeout / stop()──▶ Stopped
//! ```

pub mod acquisition;
pub mod connectivity;

/// State of one link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}
