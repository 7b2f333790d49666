//! Timestamp and duration encodings used on the log boundary.
//!
//! Log lines carry timestamps as fractional epoch seconds. Values are
//! rounded to whole microseconds on the way in, which is exactly what
//! `to_epoch_seconds` produces on the way out.

use chrono::{DateTime, TimeDelta, Utc};

pub fn to_epoch_seconds(at: &DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

pub fn delta_seconds(delta: &TimeDelta) -> f64 {
    delta.num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| delta.num_seconds() as f64)
}

/// `#[serde(with = "epoch_seconds")]` for `DateTime<Utc>` fields.
pub mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::to_epoch_seconds(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        super::from_epoch_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }
}

/// `#[serde(with = "duration_seconds")]` for `TimeDelta` fields.
pub mod duration_seconds {
    use chrono::TimeDelta;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::delta_seconds(delta))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(D::Error::custom("duration is not finite"));
        }
        let micros = (secs * 1_000_000.0).round();
        if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
            return Err(D::Error::custom(format!("duration out of range: {secs}")));
        }
        Ok(TimeDelta::microseconds(micros as i64))
    }
}
