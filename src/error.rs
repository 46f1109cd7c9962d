//! Error types for the tracker core, one enum per subsystem.
//!
//! Every variant is `Copy`: errors cross the port traits and the outbox
//! drain loop without allocation.
//!
//! Inside the dispatch loop most of these are absorbed locally (logged and
//! counted) rather than propagated; only [`ConfigError`] is fatal.

use core::fmt;

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// No free slot; the event was not stored.
    Overflow,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "event queue overflow"),
        }
    }
}


// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxError {
    /// Outbox at capacity; the newest record was rejected.
    Full,
    /// Topic or payload exceed the fixed record bounds.
    PayloadTooLarge,
}

impl fmt::Display for OutboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "outbox full"),
            Self::PayloadTooLarge => write!(f, "record exceeds outbox bounds"),
        }
    }
}


// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Integer payloads carry the transport library's native error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    /// No session is established.
    NotConnected,
    /// Connection attempt was refused by the client library.
    ConnectFailed(i32),
    /// A publish attempt failed.
    PublishFailed(i32),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::ConnectFailed(code) => write!(f, "connect failed ({code})"),
            Self::PublishFailed(code) => write!(f, "publish failed ({code})"),
        }
    }
}


// ---------------------------------------------------------------------------
// Acquisition / location
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionError {
    /// A search is already running; no new start command was issued.
    AlreadyActive,
    /// The location source refused to start.
    StartFailed(LocationError),
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "acquisition already active"),
            Self::StartFailed(e) => write!(f, "start failed: {e}"),
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    /// GNSS receiver not ready or absent.
    Unavailable,
    /// Receiver blocked by the modem (LTE activity).
    Blocked,
    /// Driver-specific failure code.
    Driver(i32),
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "location source unavailable"),
            Self::Blocked => write!(f, "location source blocked"),
            Self::Driver(code) => write!(f, "driver error ({code})"),
        }
    }
}


// ---------------------------------------------------------------------------
// Cellular
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellularError {
    /// Modem refused the request.
    Rejected(i32),
}

impl fmt::Display for CellularError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(code) => write!(f, "modem rejected request ({code})"),
        }
    }
}


// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Encoded form does not fit in a payload buffer.
    BufferTooSmall,
    /// The serializer rejected the record.
    Serialize,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "payload buffer too small"),
            Self::Serialize => write!(f, "serialization failed"),
        }
    }
}


// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.  The message names the field.
    Invalid(&'static str),
    /// Serialized configuration could not be parsed.
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Parse => write!(f, "configuration could not be parsed"),
        }
    }
}

impl core::error::Error for ConfigError {}
impl core::error::Error for BackendError {}
