use std::time::Duration;

use crate::foundation::error::{CaptureError, CaptureResult};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> CaptureResult<Self> {
        if den == 0 {
            return Err(CaptureError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(CaptureError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Rational equality: `30/1` and `60/2` describe the same rate.
    pub fn same_rate(self, other: Fps) -> bool {
        u64::from(self.num) * u64::from(other.den) == u64::from(other.num) * u64::from(self.den)
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Capture window in composition-local seconds, `end > start` always.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> CaptureResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(CaptureError::range_invalid("range bounds must be finite"));
        }
        if start < 0.0 {
            return Err(CaptureError::range_invalid("range start must be >= 0"));
        }
        if end <= start {
            return Err(CaptureError::range_invalid(format!(
                "range end ({end}) must be greater than start ({start})"
            )));
        }
        if Duration::try_from_secs_f64(end).is_err() {
            return Err(CaptureError::range_invalid(format!(
                "range end ({end}s) is beyond any schedulable time"
            )));
        }
        Ok(Self { start, end })
    }

    /// `[0, duration]`.
    pub fn full(duration: f64) -> CaptureResult<Self> {
        Self::new(0.0, duration)
    }

    pub fn duration_secs(self) -> f64 {
        self.end - self.start
    }

    /// Length as a [`Duration`], saturating for ranges built without [`TimeRange::new`].
    pub fn duration(self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs()).unwrap_or(Duration::MAX)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.3}s, {:.3}s]", self.start, self.end)
    }
}

/// Caller-chosen job identifier, unique within a batch.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one recording session; keys the durable cross-boundary store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// First 8 hex digits, used in temp asset names.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Serde adapter storing a [`Duration`] as fractional seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(
                "duration must be a finite, non-negative number of seconds",
            ));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
