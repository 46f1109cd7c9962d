//! Record encoders.
//!
//! - [`JsonCodec`] — human-readable JSON, short field names.
//! - [`PostcardCodec`] — compact binary for metered links.
//!
//! Both write into a bounded [`Payload`] and fail with
//! `CodecError::BufferTooSmall` rather than truncating.

use serde::Serialize;

use crate::app::ports::{Codec, DeviceInfo};
use crate::config::MAX_PAYLOAD_LEN;
use crate::error::CodecError;
use crate::events::{LocationFix, MotionSample};
use crate::outbox::Payload;

// ───────────────────────────────────────────────────────────────
// JSON
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MotionJson {
    ts: u64,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Serialize)]
struct FixJson {
    ts: u64,
    lat: f64,
    lng: f64,
    alt: f32,
    spd: f32,
    hdop: f32,
    sats: u8,
}

#[derive(Serialize)]
struct BootJson<'a> {
    ts: u64,
    imei: &'a str,
    ver: &'a str,
    bat: u16,
    rsrp: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn encode<T: Serialize>(value: &T) -> Result<Payload, CodecError> {
        let bytes = serde_json::to_vec(value).map_err(|_| CodecError::Serialize)?;
        Payload::from_slice(&bytes).map_err(|_| CodecError::BufferTooSmall)
    }
}

impl Codec for JsonCodec {
    fn encode_motion(&self, sample: &MotionSample) -> Result<Payload, CodecError> {
        Self::encode(&MotionJson {
            ts: sample.timestamp_ms,
            x: sample.x.as_f64(),
            y: sample.y.as_f64(),
            z: sample.z.as_f64(),
        })
    }

    fn encode_fix(&self, fix: &LocationFix) -> Result<Payload, CodecError> {
        Self::encode(&FixJson {
            ts: fix.timestamp_ms,
            lat: fix.latitude,
            lng: fix.longitude,
            alt: fix.altitude_m,
            spd: fix.speed_kmh,
            hdop: fix.hdop,
            sats: fix.satellites,
        })
    }

    fn encode_device_info(&self, info: &DeviceInfo) -> Result<Payload, CodecError> {
        Self::encode(&BootJson {
            ts: info.timestamp_ms,
            imei: &info.imei,
            ver: &info.app_version,
            bat: info.battery_mv,
            rsrp: info.rsrp,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Postcard
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardCodec;

impl PostcardCodec {
    fn encode<T: Serialize>(value: &T) -> Result<Payload, CodecError> {
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        let used = postcard::to_slice(value, &mut buf).map_err(|e| match e {
            postcard::Error::SerializeBufferFull => CodecError::BufferTooSmall,
            _ => CodecError::Serialize,
        })?;
        Payload::from_slice(used).map_err(|_| CodecError::BufferTooSmall)
    }
}

impl Codec for PostcardCodec {
    fn encode_motion(&self, sample: &MotionSample) -> Result<Payload, CodecError> {
        Self::encode(sample)
    }

    fn encode_fix(&self, fix: &LocationFix) -> Result<Payload, CodecError> {
        Self::encode(fix)
    }

    fn encode_device_info(&self, info: &DeviceInfo) -> Result<Payload, CodecError> {
        Self::encode(info)
    }
}
