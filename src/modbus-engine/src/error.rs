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

//! Scheduler-level errors (§7). Response mismatches do not appear here:
//! per §7 "Modbus response decode errors do NOT drop the connection, the
//! scheduler simply advances" — those are logged and discarded inline,
//! never surfaced as an `Err`. This type covers only configuration-time
//! and framing failures.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),

    #[error("map address range out of bounds: address {address} size {size}")]
    MapOutOfBounds { address: u16, size: u16 },

    #[error("no slaves configured")]
    NoSlavesConfigured,
}
