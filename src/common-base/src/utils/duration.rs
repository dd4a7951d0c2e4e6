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

//! Microsecond-precision duration newtype shared by keepalive, expiry and
//! scheduler-interval configuration across both engines.

use humantime::format_duration;
use humantime::Duration as HumanDuration;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{Display, Formatter},
    ops::Add,
    str::FromStr,
    time::Duration,
};

pub const SEC_IN_MICRO: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EdgeDuration {
    duration: Duration,
}

impl EdgeDuration {
    pub const ONE_SECOND: EdgeDuration = EdgeDuration {
        duration: Duration::from_secs(1),
    };

    pub const ZERO: EdgeDuration = EdgeDuration {
        duration: Duration::ZERO,
    };

    pub fn new(duration: Duration) -> EdgeDuration {
        EdgeDuration { duration }
    }

    pub fn new_from_secs(secs: u64) -> EdgeDuration {
        EdgeDuration {
            duration: Duration::from_secs(secs),
        }
    }

    pub fn as_human_time_string(&self) -> String {
        format!("{}", format_duration(self.duration))
    }

    pub fn as_secs(&self) -> u32 {
        self.duration.as_secs() as u32
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    pub fn as_micros(&self) -> u64 {
        self.duration.as_micros() as u64
    }

    pub fn get_duration(&self) -> Duration {
        self.duration
    }

    pub fn is_zero(&self) -> bool {
        self.duration.as_secs() == 0
    }

    pub fn abs_diff(&self, other: EdgeDuration) -> EdgeDuration {
        EdgeDuration {
            duration: self.duration.abs_diff(other.duration),
        }
    }
}

impl FromStr for EdgeDuration {
    type Err = humantime::DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = &s.to_lowercase();
        if s == "0" || s == "unlimited" || s == "disabled" || s == "none" {
            Ok(EdgeDuration {
                duration: Duration::new(0, 0),
            })
        } else {
            Ok(EdgeDuration {
                duration: humantime::parse_duration(s)?,
            })
        }
    }
}

impl From<Option<u64>> for EdgeDuration {
    fn from(micros: Option<u64>) -> Self {
        match micros {
            Some(value) => EdgeDuration {
                duration: Duration::from_micros(value),
            },
            None => EdgeDuration {
                duration: Duration::new(0, 0),
            },
        }
    }
}

impl From<u64> for EdgeDuration {
    fn from(value: u64) -> Self {
        EdgeDuration {
            duration: Duration::from_micros(value),
        }
    }
}

impl From<Duration> for EdgeDuration {
    fn from(duration: Duration) -> Self {
        EdgeDuration { duration }
    }
}

impl From<HumanDuration> for EdgeDuration {
    fn from(human_duration: HumanDuration) -> Self {
        Self {
            duration: human_duration.into(),
        }
    }
}

impl From<EdgeDuration> for u64 {
    fn from(value: EdgeDuration) -> u64 {
        value.duration.as_micros() as u64
    }
}

impl Default for EdgeDuration {
    fn default() -> Self {
        EdgeDuration {
            duration: Duration::new(0, 0),
        }
    }
}

impl Display for EdgeDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_human_time_string())
    }
}

impl Add for EdgeDuration {
    type Output = EdgeDuration;

    fn add(self, rhs: Self) -> Self::Output {
        EdgeDuration {
            duration: self.duration + rhs.duration,
        }
    }
}

impl Serialize for EdgeDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.as_micros())
    }
}

struct EdgeDurationVisitor;

impl<'de> Deserialize<'de> for EdgeDuration {
    fn deserialize<D>(deserializer: D) -> Result<EdgeDuration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u64(EdgeDurationVisitor)
    }
}

impl Visitor<'_> for EdgeDurationVisitor {
    type Value = EdgeDuration;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a duration in microseconds")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(EdgeDuration::new(Duration::from_micros(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_durations() {
        let d: EdgeDuration = "1h 1m 1s".parse().unwrap();
        assert_eq!(d.as_secs(), 3661);
    }

    #[test]
    fn zero_aliases_parse_to_zero() {
        for s in ["0", "unlimited", "disabled", "none"] {
            let d: EdgeDuration = s.parse().unwrap();
            assert_eq!(d.as_secs(), 0);
        }
    }

    #[test]
    fn add_sums_durations() {
        let a: EdgeDuration = "6s".parse().unwrap();
        let b: EdgeDuration = "1m".parse().unwrap();
        assert_eq!((a + b).as_secs(), 66);
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let result: Result<EdgeDuration, _> = "1 hour and 30 minutes".parse();
        assert!(result.is_err());
    }

    #[test]
    fn round_trips_through_micros() {
        let d = EdgeDuration::new_from_secs(42);
        let micros: u64 = d.into();
        assert_eq!(EdgeDuration::from(micros).as_secs(), 42);
    }
}
