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

//! Events the scheduler hands back to its caller at the end of a polling
//! cycle (§4.9, §6); the byte transport and timer stay the caller's
//! responsibility (§1 non-goals), so this module only carries the
//! publish-ready output, not a transport/timer abstraction.

use crate::value_decoder::DecodedValue;

/// A cycle-end snapshot for one slave, ready to publish (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct SlaveSnapshot {
    pub slave_id: u8,
    pub values: Vec<(String, DecodedValue)>,
}

/// A process-wide notification, decoupled from any single scheduler (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum EmittedEvent {
    Snapshot(SlaveSnapshot),
}
