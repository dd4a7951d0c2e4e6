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

use protocol::ProtocolError;
use thiserror::Error;

/// Session-level errors (§7). Every variant maps to a wire-visible reason
/// code via `disconnect_reason`/`connack_reason` before the session drops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("client sent a non-CONNECT command before authenticating")]
    FirstFrameNotConnect,

    #[error("client id rejected: {0}")]
    IdentifierRejected(String),

    #[error("keepalive timeout")]
    KeepAliveTimeout,
}

impl SessionError {
    pub fn v5_disconnect_reason(&self) -> u8 {
        match self {
            SessionError::Protocol(e) => e.v5_disconnect_reason(),
            SessionError::FirstFrameNotConnect => 0x82,
            SessionError::IdentifierRejected(_) => 0x85,
            SessionError::KeepAliveTimeout => 0x8D,
        }
    }

    pub fn v3_connack_reason(&self) -> u8 {
        match self {
            SessionError::Protocol(e) => e.v3_connack_reason(),
            SessionError::IdentifierRejected(_) => 2,
            SessionError::FirstFrameNotConnect | SessionError::KeepAliveTimeout => 2,
        }
    }
}
