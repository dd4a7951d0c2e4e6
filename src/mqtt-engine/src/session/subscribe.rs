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

//! SUBSCRIBE / UNSUBSCRIBE handling (§4.4). Both mutate the shared
//! `SubscriptionIndex`, so the session only builds `Subscription` records
//! and the SUBACK/UNSUBACK payload; the caller applies them to the index
//! and replays retained messages (§4.4, §4.5).

use super::{Delivery, MqttSession};
use crate::retained_store::RetainedStore;
use crate::subscription_index::{validate_topic_filter, Subscription, SubscriptionIndex};
use protocol::mqtt::packet::Packet;
use protocol::mqtt::property::{PropertyBag, PropertyId};
use protocol::mqtt::reason_code::{UnsubackReasonCode, SUBACK_FAILURE};
use protocol::mqtt::suback::Suback;
use protocol::mqtt::subscribe::{RetainHandling, Subscribe};
use protocol::mqtt::unsuback::Unsuback;
use protocol::mqtt::unsubscribe::Unsubscribe;
use crate::error::SessionError;
use protocol::ProtocolError;

/// One subscribe request ready for the caller to apply to the shared
/// index, alongside the pre-built (but not yet fully populated) SUBACK and
/// any retained messages replayed for the newly-granted filters.
pub struct SubscribeOutcome {
    pub accepted: Vec<Subscription>,
    pub suback: Packet,
    pub retained_replay: Vec<Packet>,
}

impl MqttSession {
    /// `retained` is consulted for every granted filter per its
    /// `retain_handling` option (§4.4, §4.5): `SendOnSubscribe` always
    /// replays, `SendIfNew` only when the client had no prior subscription
    /// to that exact filter, `Never` skips replay entirely.
    pub fn handle_subscribe(
        &mut self,
        subscribe: Subscribe,
        index: &mut SubscriptionIndex,
        retained: &RetainedStore,
    ) -> Result<SubscribeOutcome, SessionError> {
        let subscription_identifier = subscribe.properties.get_varint(PropertyId::SubscriptionIdentifier);
        if subscription_identifier == Some(0) {
            return Err(SessionError::Protocol(ProtocolError::protocol(
                "subscription identifier must not be zero",
            )));
        }

        let mut accepted = Vec::new();
        let mut reason_codes = Vec::with_capacity(subscribe.filters.len());
        let mut retained_replay = Vec::new();
        for filter in &subscribe.filters {
            if validate_topic_filter(&filter.topic_filter).is_err() {
                reason_codes.push(SUBACK_FAILURE);
                continue;
            }
            let granted_qos = filter.qos.min(self.max_qos);
            let already_subscribed = index
                .client_subscriptions(&self.client_id)
                .iter()
                .any(|s| s.topic_filter == filter.topic_filter);
            let subscription = Subscription {
                client_id: self.client_id.clone(),
                topic_filter: filter.topic_filter.clone(),
                qos: granted_qos,
                subscription_identifier,
                no_local: filter.no_local,
                retain_as_published: filter.retain_as_published,
                retain_handling: filter.retain_handling,
            };
            match index.subscribe(subscription.clone()) {
                Ok(()) => {
                    reason_codes.push(granted_qos);
                    let should_replay = match filter.retain_handling {
                        RetainHandling::Never => false,
                        RetainHandling::SendIfNew => !already_subscribed,
                        RetainHandling::SendOnSubscribe => true,
                    };
                    if should_replay {
                        for message in retained.matching(&filter.topic_filter) {
                            let delivery = Delivery {
                                client_id: self.client_id.clone(),
                                message,
                                qos: granted_qos,
                                subscription_identifier,
                                retain_as_published: true,
                            };
                            if let Some(packet) = self.receive_delivery(delivery) {
                                retained_replay.push(packet);
                            }
                        }
                    }
                    accepted.push(subscription);
                }
                Err(_) => reason_codes.push(SUBACK_FAILURE),
            }
        }

        let suback = Packet::Suback(Suback {
            mid: subscribe.mid,
            properties: PropertyBag::new(),
            reason_codes,
        });

        Ok(SubscribeOutcome {
            accepted,
            suback,
            retained_replay,
        })
    }

    pub fn handle_unsubscribe(
        &mut self,
        unsubscribe: Unsubscribe,
        index: &mut SubscriptionIndex,
    ) -> Packet {
        let reason_codes = unsubscribe
            .filters
            .iter()
            .map(|filter| {
                if index.unsubscribe(&self.client_id, filter) {
                    UnsubackReasonCode::Success.as_u8()
                } else {
                    UnsubackReasonCode::NoSubscriptionExisted.as_u8()
                }
            })
            .collect();

        Packet::Unsuback(Unsuback {
            mid: unsubscribe.mid,
            properties: PropertyBag::new(),
            reason_codes,
        })
    }
}
