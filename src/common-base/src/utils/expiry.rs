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

//! Expiry semantics shared by session-expiry-interval (§3 Session) and
//! message-expiry-interval (§4.6) accounting.

use crate::utils::duration::EdgeDuration;
use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// Tri-state expiry: inherit the server default, expire after a fixed
/// duration, or never expire (MQTT 5 session_expiry_interval == 0xFFFFFFFF).
#[derive(Debug, Copy, Default, Clone, Eq, PartialEq)]
pub enum EdgeExpiry {
    #[default]
    ServerDefault,
    ExpireDuration(EdgeDuration),
    NeverExpire,
}

impl EdgeExpiry {
    pub fn new(values: Option<Vec<EdgeExpiry>>) -> Option<Self> {
        values.map(|items| items.into_iter().sum())
    }

    pub fn is_expired_at(&self, age: EdgeDuration) -> bool {
        match self {
            EdgeExpiry::NeverExpire | EdgeExpiry::ServerDefault => false,
            EdgeExpiry::ExpireDuration(limit) => age.as_micros() >= limit.as_micros(),
        }
    }
}

impl From<&EdgeExpiry> for Option<u64> {
    fn from(value: &EdgeExpiry) -> Self {
        match value {
            EdgeExpiry::ExpireDuration(value) => Some(value.as_micros()),
            EdgeExpiry::NeverExpire => Some(u64::MAX),
            EdgeExpiry::ServerDefault => None,
        }
    }
}

impl Display for EdgeExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverExpire => write!(f, "none"),
            Self::ServerDefault => write!(f, "server_default"),
            Self::ExpireDuration(value) => write!(f, "{value}"),
        }
    }
}

impl Sum for EdgeExpiry {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(EdgeExpiry::NeverExpire, |acc, x| acc + x)
    }
}

impl Add for EdgeExpiry {
    type Output = EdgeExpiry;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (EdgeExpiry::NeverExpire, EdgeExpiry::NeverExpire) => EdgeExpiry::NeverExpire,
            (EdgeExpiry::NeverExpire, expiry) => expiry,
            (expiry, EdgeExpiry::NeverExpire) => expiry,
            (EdgeExpiry::ExpireDuration(lhs), EdgeExpiry::ExpireDuration(rhs)) => {
                EdgeExpiry::ExpireDuration(lhs + rhs)
            }
            (EdgeExpiry::ServerDefault, _) | (_, EdgeExpiry::ServerDefault) => {
                EdgeExpiry::ServerDefault
            }
        }
    }
}

impl FromStr for EdgeExpiry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "unlimited" | "none" | "None" | "Unlimited" => EdgeExpiry::NeverExpire,
            "default" | "server_default" | "Default" | "Server_default" => {
                EdgeExpiry::ServerDefault
            }
            value => {
                let duration: EdgeDuration = value.parse().map_err(|e| format!("{e}"))?;
                EdgeExpiry::ExpireDuration(duration)
            }
        };

        Ok(result)
    }
}

impl From<u64> for EdgeExpiry {
    fn from(value: u64) -> Self {
        match value {
            u64::MAX => EdgeExpiry::NeverExpire,
            0 => EdgeExpiry::ServerDefault,
            value => EdgeExpiry::ExpireDuration(EdgeDuration::from(value)),
        }
    }
}

impl From<Option<u64>> for EdgeExpiry {
    fn from(value: Option<u64>) -> Self {
        match value {
            Some(value) => EdgeExpiry::from(value),
            None => EdgeExpiry::NeverExpire,
        }
    }
}

impl From<EdgeExpiry> for u64 {
    fn from(val: EdgeExpiry) -> Self {
        match val {
            EdgeExpiry::ExpireDuration(value) => value.as_micros(),
            EdgeExpiry::ServerDefault => 0,
            EdgeExpiry::NeverExpire => u64::MAX,
        }
    }
}

impl Serialize for EdgeExpiry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let expiry: u64 = (*self).into();
        serializer.serialize_u64(expiry)
    }
}

impl<'de> Deserialize<'de> for EdgeExpiry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u64(EdgeExpiryVisitor)
    }
}

struct EdgeExpiryVisitor;

impl Visitor<'_> for EdgeExpiryVisitor {
    type Value = EdgeExpiry;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a microsecond expiry as a u64")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(EdgeExpiry::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::duration::SEC_IN_MICRO;

    #[test]
    fn parses_named_variants() {
        assert_eq!(EdgeExpiry::from_str("none").unwrap(), EdgeExpiry::NeverExpire);
        assert_eq!(
            EdgeExpiry::from_str("default").unwrap(),
            EdgeExpiry::ServerDefault
        );
        assert_eq!(
            EdgeExpiry::from_str("2min").unwrap(),
            EdgeExpiry::ExpireDuration(EdgeDuration::from(SEC_IN_MICRO * 60 * 2))
        );
    }

    #[test]
    fn never_expire_absorbs_server_default_via_max() {
        assert_eq!(
            EdgeExpiry::NeverExpire + EdgeExpiry::ExpireDuration(EdgeDuration::from(3)),
            EdgeExpiry::ExpireDuration(EdgeDuration::from(3))
        );
    }

    #[test]
    fn u64_max_round_trips_to_never_expire() {
        let expiry: EdgeExpiry = EdgeExpiry::from(u64::MAX);
        assert_eq!(expiry, EdgeExpiry::NeverExpire);
        let back: u64 = expiry.into();
        assert_eq!(back, u64::MAX);
    }

    #[test]
    fn zero_round_trips_to_server_default() {
        assert_eq!(EdgeExpiry::from(0u64), EdgeExpiry::ServerDefault);
    }

    #[test]
    fn is_expired_at_checks_elapsed_age() {
        let expiry = EdgeExpiry::ExpireDuration(EdgeDuration::new_from_secs(10));
        assert!(!expiry.is_expired_at(EdgeDuration::new_from_secs(5)));
        assert!(expiry.is_expired_at(EdgeDuration::new_from_secs(10)));
        assert!(!EdgeExpiry::NeverExpire.is_expired_at(EdgeDuration::new_from_secs(u64::MAX / 2)));
    }
}
