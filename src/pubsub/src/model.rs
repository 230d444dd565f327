// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The resource types used by the Pub/Sub [REST API].
//!
//! [REST API]: https://cloud.google.com/pubsub/docs/reference/rest

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message published to a topic.
///
/// The message payload travels base64-encoded on the wire, the client
/// library handles the encoding.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PubsubMessage {
    /// The message payload.
    #[serde_as(as = "serde_with::base64::Base64")]
    #[serde(skip_serializing_if = "bytes::Bytes::is_empty")]
    pub data: bytes::Bytes,

    /// Attributes for this message, used to filter messages on a
    /// subscription.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,

    /// Messages with the same non-empty ordering key are delivered in the
    /// order the service received them.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ordering_key: String,
}

impl PubsubMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message payload.
    pub fn set_data<V: Into<bytes::Bytes>>(mut self, v: V) -> Self {
        self.data = v.into();
        self
    }

    /// Sets the message attributes.
    pub fn set_attributes<I, K, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Sets the ordering key.
    pub fn set_ordering_key<V: Into<String>>(mut self, v: V) -> Self {
        self.ordering_key = v.into();
        self
    }

    /// An estimate of the wire size of this message, used for batching
    /// limits.
    pub(crate) fn approx_size(&self) -> usize {
        self.data.len()
            + self
                .attributes
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
            + self.ordering_key.len()
    }
}

/// A named resource to which messages are sent by publishers.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Topic {
    /// The name of the topic, in
    /// `projects/{project}/topics/{topic}` format.
    pub name: String,

    /// User labels.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// The response from a publish request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PublishResponse {
    /// The server-assigned ids, one per published message, in the same
    /// order as the messages in the request.
    pub message_ids: Vec<String>,
}

/// The response from a list topics request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListTopicsResponse {
    /// The topics in the requested page.
    pub topics: Vec<Topic>,

    /// Pass this token in a new request to fetch the next page. Empty on
    /// the last page.
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    type Result = anyhow::Result<()>;

    #[test]
    fn message_serialization() -> Result {
        let msg = PubsubMessage::new()
            .set_data("hello")
            .set_attributes([("origin", "test")])
            .set_ordering_key("key-0");
        let got = serde_json::to_value(&msg)?;
        assert_eq!(
            got,
            serde_json::json!({
                "data": "aGVsbG8=",
                "attributes": {"origin": "test"},
                "orderingKey": "key-0"
            })
        );
        Ok(())
    }

    #[test]
    fn empty_fields_are_omitted() -> Result {
        let msg = PubsubMessage::new().set_data("x");
        let got = serde_json::to_value(&msg)?;
        assert_eq!(got, serde_json::json!({"data": "eA=="}));
        Ok(())
    }

    #[test]
    fn message_roundtrip() -> Result {
        let msg = PubsubMessage::new().set_data("payload").set_ordering_key("k");
        let json = serde_json::to_string(&msg)?;
        let back = serde_json::from_str::<PubsubMessage>(&json)?;
        assert_eq!(back, msg);
        Ok(())
    }

    #[test]
    fn approx_size() {
        let msg = PubsubMessage::new()
            .set_data("12345")
            .set_attributes([("ab", "cd")])
            .set_ordering_key("xyz");
        assert_eq!(msg.approx_size(), 5 + 4 + 3);
    }

    #[test]
    fn publish_response() -> Result {
        let response = serde_json::from_value::<PublishResponse>(serde_json::json!({
            "messageIds": ["1", "2", "3"]
        }))?;
        assert_eq!(response.message_ids, vec!["1", "2", "3"]);
        Ok(())
    }
}
