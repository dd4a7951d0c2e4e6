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

//! The Modbus master engine: frame assembly, per-slave register/coil state,
//! the polling scheduler, and typed value decoding (§3-§5, §4.8-§4.9).

pub mod error;
pub mod events;
pub mod frame_assembler;
pub mod scheduler;
pub mod slave_data;
pub mod value_decoder;

pub use error::SchedulerError;
pub use scheduler::{ModbusScheduler, PollCursor, PollOutcome};
