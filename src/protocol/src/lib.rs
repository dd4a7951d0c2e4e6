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

//! Wire-level codec shared by the MQTT broker and the Modbus master: the
//! bytes-in, bytes-out layer with no session state of its own.

pub mod error;
pub mod fixed_header;
pub mod mqtt;
pub mod modbus;
pub mod primitives;
pub mod varint;

pub use error::ProtocolError;
