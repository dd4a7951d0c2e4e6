// Copyright 2023 RobustMQ Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, Local, Utc};
use core::fmt;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{
    ops::Add,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis()
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Absolute point in time, used for message-expiry deadlines and keepalive
/// bookkeeping (§4.6, §4.4).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EdgeTimestamp(SystemTime);

pub const UTC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl EdgeTimestamp {
    pub fn now() -> Self {
        EdgeTimestamp::default()
    }

    pub fn zero() -> Self {
        EdgeTimestamp(UNIX_EPOCH)
    }

    pub fn to_secs(&self) -> u64 {
        self.0.duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    pub fn as_micros(&self) -> u64 {
        self.0.duration_since(UNIX_EPOCH).unwrap().as_micros() as u64
    }

    pub fn as_millis(&self) -> u64 {
        self.0.duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
    }

    pub fn to_utc_string(&self, format: &str) -> String {
        DateTime::<Utc>::from(self.0).format(format).to_string()
    }

    pub fn to_local_string(&self, format: &str) -> String {
        DateTime::<Local>::from(self.0).format(format).to_string()
    }

    pub fn plus_secs(&self, secs: u64) -> EdgeTimestamp {
        EdgeTimestamp(self.0 + Duration::from_secs(secs))
    }

    pub fn is_past(&self, now: EdgeTimestamp) -> bool {
        now.0 > self.0
    }
}

impl From<u64> for EdgeTimestamp {
    fn from(timestamp: u64) -> Self {
        EdgeTimestamp(UNIX_EPOCH + Duration::from_micros(timestamp))
    }
}

impl From<EdgeTimestamp> for u64 {
    fn from(timestamp: EdgeTimestamp) -> u64 {
        timestamp.as_micros()
    }
}

impl Add<Duration> for EdgeTimestamp {
    type Output = EdgeTimestamp;

    fn add(self, other: Duration) -> EdgeTimestamp {
        EdgeTimestamp(self.0 + other)
    }
}

impl Default for EdgeTimestamp {
    fn default() -> Self {
        Self(SystemTime::now())
    }
}

impl fmt::Display for EdgeTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_utc_string(UTC_TIME_FORMAT))
    }
}

impl Serialize for EdgeTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.as_micros())
    }
}

impl<'de> Deserialize<'de> for EdgeTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u64(EdgeTimestampVisitor)
    }
}
struct EdgeTimestampVisitor;

impl Visitor<'_> for EdgeTimestampVisitor {
    type Value = EdgeTimestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a microsecond timestamp as a u64")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(EdgeTimestamp::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_returns_nonzero_micros() {
        assert!(EdgeTimestamp::now().as_micros() > 0);
    }

    #[test]
    fn converts_to_and_from_micros() {
        let ts = EdgeTimestamp::from(1_738_405_752_756_068);
        assert_eq!(ts.as_micros(), 1_738_405_752_756_068);
        let back: u64 = ts.into();
        assert_eq!(back, 1_738_405_752_756_068);
    }

    #[test]
    fn formats_as_utc_string() {
        let ts = EdgeTimestamp::from(1_738_405_752_756_068);
        assert_eq!(ts.to_utc_string(UTC_TIME_FORMAT), "2025-02-01 18:29:12");
    }

    #[test]
    fn plus_secs_advances_wall_clock() {
        let ts = EdgeTimestamp::from(0);
        let later = ts.plus_secs(10);
        assert_eq!(later.to_secs(), 10);
    }
}
