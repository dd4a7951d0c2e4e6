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

//! Thin logging facade over `tracing`. Call sites pass an owned message
//! (matching the rest of the engine's "log and continue" recoverable-error
//! policy from §7), so the macro expansion site doesn't leak into callers.

pub fn error(msg: String) {
    tracing::error!("{msg}");
}

pub fn warn(msg: String) {
    tracing::warn!("{msg}");
}

pub fn info(msg: String) {
    tracing::info!("{msg}");
}

pub fn debug(msg: String) {
    tracing::debug!("{msg}");
}
