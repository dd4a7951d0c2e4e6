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

//! MQTT broker configuration flags, §6 "Configuration (MQTT broker)". Loaded
//! from TOML, the way the teacher's `common/config/src/server.rs` loads its
//! node configuration.

use crate::error::CommonError;
use serde::Deserialize;
use std::path::Path;

fn default_max_inflight_messages() -> u16 {
    20
}

fn default_max_queued_messages() -> u32 {
    1000
}

fn default_max_keepalive() -> u16 {
    65535
}

fn default_true() -> bool {
    true
}

fn default_max_qos() -> u8 {
    2
}

fn default_max_topic_alias() -> u16 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub max_inflight_bytes: Option<u64>,
    #[serde(default = "default_max_inflight_messages")]
    pub max_inflight_messages: u16,
    #[serde(default)]
    pub max_queued_bytes: Option<u64>,
    #[serde(default = "default_max_queued_messages")]
    pub max_queued_messages: u32,
    #[serde(default)]
    pub message_size_limit: Option<u32>,
    #[serde(default = "default_max_keepalive")]
    pub max_keepalive: u16,
    #[serde(default)]
    pub max_packet_size: Option<u32>,
    #[serde(default)]
    pub persistence: bool,
    #[serde(default = "default_true")]
    pub retain_available: bool,
    #[serde(default = "default_max_qos")]
    pub max_qos: u8,
    #[serde(default)]
    pub allow_zero_length_clientid: bool,
    #[serde(default)]
    pub use_username_as_clientid: bool,
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,
    #[serde(default = "default_max_topic_alias")]
    pub max_topic_alias: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            max_inflight_bytes: None,
            max_inflight_messages: default_max_inflight_messages(),
            max_queued_bytes: None,
            max_queued_messages: default_max_queued_messages(),
            message_size_limit: None,
            max_keepalive: default_max_keepalive(),
            max_packet_size: None,
            persistence: false,
            retain_available: true,
            max_qos: default_max_qos(),
            allow_zero_length_clientid: false,
            use_username_as_clientid: false,
            allow_anonymous: true,
            max_topic_alias: default_max_topic_alias(),
        }
    }
}

impl BrokerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, CommonError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CommonError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CommonError::ConfigRead(path.display().to_string(), e))?;
        Self::from_toml_str(&contents)
    }
}
