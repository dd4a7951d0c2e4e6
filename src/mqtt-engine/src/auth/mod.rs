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

//! Credential check (§4.7) plus the single `authorize()` hook that stands
//! in for the source's plugin/ACL engine (§1 non-goals).

pub mod password;

/// What an authorized action is being checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeAction {
    Publish,
    Subscribe,
}

/// Replaces the source's plugin/ACL engine with one hook. The default
/// implementation permits everything; a deployment wires in its own
/// policy by implementing this trait.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, client_id: &str, action: AuthorizeAction, topic: &str) -> bool;
}

/// Permits every action; used when no ACL policy is configured.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _client_id: &str, _action: AuthorizeAction, _topic: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_permits_everything() {
        let authorizer = AllowAll;
        assert!(authorizer.authorize("c1", AuthorizeAction::Publish, "a/b"));
        assert!(authorizer.authorize("c1", AuthorizeAction::Subscribe, "a/#"));
    }
}
