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

//! Errors shared by both engines for concerns that are not wire-format
//! specific: configuration loading and generic internal failures (§7
//! `Unspecified`/`Nomem`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("failed to read config file {0}: {1}")]
    ConfigRead(String, std::io::Error),

    #[error("failed to parse toml config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to parse json config: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("unspecified internal error: {0}")]
    Unspecified(String),
}
