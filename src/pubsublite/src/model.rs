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

//! The resource types used by the Pub/Sub Lite admin [REST API].
//!
//! Unlike Pub/Sub, Lite topics have provisioned capacity: a fixed number of
//! partitions, per-partition throughput, and per-partition storage.
//!
//! [REST API]: https://cloud.google.com/pubsub/lite/docs/reference/rest

use serde::{Deserialize, Serialize};

/// A Pub/Sub Lite topic.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Topic {
    /// The name of the topic, in
    /// `projects/{project}/locations/{location}/topics/{topic}` format.
    pub name: String,

    /// The partition configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_config: Option<PartitionConfig>,

    /// The message retention configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_config: Option<RetentionConfig>,
}

impl Topic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partition configuration.
    pub fn set_partition_config(mut self, v: PartitionConfig) -> Self {
        self.partition_config = Some(v);
        self
    }

    /// Sets the retention configuration.
    pub fn set_retention_config(mut self, v: RetentionConfig) -> Self {
        self.retention_config = Some(v);
        self
    }
}

/// The partition count and per-partition capacity of a topic.
///
/// The partition count can grow but never shrink.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PartitionConfig {
    /// The number of partitions.
    #[serde(with = "i64_as_string")]
    pub count: i64,

    /// The provisioned throughput capacity, per partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Capacity>,
}

impl PartitionConfig {
    /// Creates a configuration with `count` partitions.
    pub fn new(count: i64) -> Self {
        Self {
            count,
            capacity: None,
        }
    }

    /// Sets the per-partition capacity.
    pub fn set_capacity(mut self, publish_mib_per_sec: i32, subscribe_mib_per_sec: i32) -> Self {
        self.capacity = Some(Capacity {
            publish_mib_per_sec,
            subscribe_mib_per_sec,
        });
        self
    }
}

/// Provisioned throughput, in MiB/s.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Capacity {
    pub publish_mib_per_sec: i32,
    pub subscribe_mib_per_sec: i32,
}

/// How long, and how much, message data is retained per partition.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct RetentionConfig {
    /// The provisioned storage, per partition.
    #[serde(with = "i64_as_string")]
    pub per_partition_bytes: i64,

    /// How long messages are retained, in the `{seconds}s` wire format.
    /// Empty means "as long as storage allows".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub period: String,
}

impl RetentionConfig {
    /// Creates a configuration with the given per-partition storage.
    pub fn new(per_partition_bytes: i64) -> Self {
        Self {
            per_partition_bytes,
            period: String::new(),
        }
    }

    /// Sets the retention period.
    pub fn set_period(mut self, v: std::time::Duration) -> Self {
        self.period = format!("{}s", v.as_secs());
        self
    }
}

/// A Pub/Sub Lite subscription.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Subscription {
    /// The name of the subscription, in
    /// `projects/{project}/locations/{location}/subscriptions/{name}`
    /// format.
    pub name: String,

    /// The topic this subscription receives messages from.
    pub topic: String,

    /// When the service delivers messages relative to persistence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_config: Option<DeliveryConfig>,
}

impl Subscription {
    /// Creates a subscription for `topic`.
    pub fn new<T: Into<String>>(topic: T) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Sets the delivery requirement.
    pub fn set_delivery_requirement(mut self, v: DeliveryRequirement) -> Self {
        self.delivery_config = Some(DeliveryConfig {
            delivery_requirement: v,
        });
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct DeliveryConfig {
    pub delivery_requirement: DeliveryRequirement,
}

/// When the service delivers messages relative to persistence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub enum DeliveryRequirement {
    #[default]
    #[serde(rename = "DELIVERY_REQUIREMENT_UNSPECIFIED")]
    Unspecified,
    /// Deliver only after the message is persisted.
    #[serde(rename = "DELIVER_AFTER_STORED")]
    DeliverAfterStored,
    /// Deliver as soon as possible, possibly before persistence.
    #[serde(rename = "DELIVER_IMMEDIATELY")]
    DeliverImmediately,
}

/// The response from a list topics request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListTopicsResponse {
    pub topics: Vec<Topic>,
    pub next_page_token: Option<String>,
}

mod i64_as_string {
    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse::<i64>().map_err(serde::de::Error::custom)
    }

    use serde::Deserialize;
}

#[cfg(test)]
mod tests {
    use super::*;

    type Result = anyhow::Result<()>;

    #[test]
    fn topic_wire_format() -> Result {
        let topic = Topic::new()
            .set_partition_config(PartitionConfig::new(4).set_capacity(4, 8))
            .set_retention_config(
                RetentionConfig::new(30 * 1024 * 1024 * 1024)
                    .set_period(std::time::Duration::from_secs(86400)),
            );
        let got = serde_json::to_value(&topic)?;
        assert_eq!(
            got,
            serde_json::json!({
                "name": "",
                "partitionConfig": {
                    "count": "4",
                    "capacity": {"publishMibPerSec": 4, "subscribeMibPerSec": 8}
                },
                "retentionConfig": {
                    "perPartitionBytes": "32212254720",
                    "period": "86400s"
                }
            })
        );
        let back = serde_json::from_value::<Topic>(got)?;
        assert_eq!(back, topic);
        Ok(())
    }

    #[test]
    fn subscription_wire_format() -> Result {
        let sub = Subscription::new("projects/p/locations/l/topics/t")
            .set_delivery_requirement(DeliveryRequirement::DeliverAfterStored);
        let got = serde_json::to_value(&sub)?;
        assert_eq!(
            got,
            serde_json::json!({
                "name": "",
                "topic": "projects/p/locations/l/topics/t",
                "deliveryConfig": {"deliveryRequirement": "DELIVER_AFTER_STORED"}
            })
        );
        Ok(())
    }
}
