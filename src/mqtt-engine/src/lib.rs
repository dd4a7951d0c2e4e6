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

//! The MQTT session engine: frame assembly, the per-connection state
//! machine, subscription matching, retained messages, and the QoS 1/2
//! in-flight accounting (§4.2, §4.4-4.7).

pub mod auth;
pub mod error;
pub mod frame_assembler;
pub mod message_store;
pub mod retained_store;
pub mod session;
pub mod stored_message;
pub mod subscription_index;

pub use error::SessionError;
pub use session::{Delivery, MqttSession, SessionState};
