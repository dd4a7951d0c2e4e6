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

//! Resumable byte-stream to frame assembly (§4.2). Feeds arbitrary chunks
//! in via `push` and yields one complete frame at a time via `poll_frame`,
//! regardless of how the caller split the underlying stream.

use crate::error::SessionError;
use bytes::{Bytes, BytesMut};
use protocol::fixed_header::{parse_fixed_header, FixedHeader};

/// Enforced ceiling on CONNECT specifically when no `max_packet_size` is
/// configured (§4.2: "default unlimited but implementation enforces 100 KB
/// for CONNECT specifically").
pub const DEFAULT_CONNECT_LIMIT: usize = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitHeader,
    WaitPayload(FixedHeader),
}

#[derive(Debug)]
pub struct FrameComplete {
    pub command: u8,
    pub flags: u8,
    pub payload: Bytes,
}

#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    state: State,
    max_packet_size: Option<usize>,
    first_frame_seen: bool,
}

impl FrameAssembler {
    pub fn new(max_packet_size: Option<usize>) -> Self {
        FrameAssembler {
            buf: BytesMut::new(),
            state: State::WaitHeader,
            max_packet_size,
            first_frame_seen: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempts to produce the next complete frame from buffered bytes.
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn poll_frame(&mut self) -> Result<Option<FrameComplete>, SessionError> {
        loop {
            match self.state {
                State::WaitHeader => {
                    let header = match parse_fixed_header(&self.buf)
                        .map_err(SessionError::Protocol)?
                    {
                        Some(h) => h,
                        None => return Ok(None),
                    };

                    let limit = self.max_packet_size.unwrap_or(if self.first_frame_seen {
                        usize::MAX
                    } else {
                        DEFAULT_CONNECT_LIMIT
                    });
                    if header.remaining_len > limit {
                        return Err(SessionError::Protocol(protocol::ProtocolError::malformed(
                            "remaining length exceeds configured packet size limit",
                        )));
                    }
                    self.state = State::WaitPayload(header);
                }
                State::WaitPayload(header) => {
                    if self.buf.len() < header.total_len() {
                        return Ok(None);
                    }
                    let _ = self.buf.split_to(header.header_len);
                    let payload = self.buf.split_to(header.remaining_len).freeze();
                    self.state = State::WaitHeader;
                    self.first_frame_seen = true;
                    return Ok(Some(FrameComplete {
                        command: header.command,
                        flags: header.flags,
                        payload,
                    }));
                }
            }
        }
    }
}
