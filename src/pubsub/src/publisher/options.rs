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

use std::time::Duration;

/// Controls when a [BatchingPublisher] flushes a bundle of messages.
///
/// A batch is sent as soon as any of the three limits is reached: message
/// count, accumulated payload size, or the linger delay since the first
/// message entered the batch.
///
/// [BatchingPublisher]: crate::batching::BatchingPublisher
#[derive(Clone, Debug)]
pub struct BatchingOptions {
    max_messages: usize,
    max_bytes: usize,
    max_delay: Duration,
}

impl BatchingOptions {
    /// Flush after this many messages. Clamped to the service limit of
    /// 1000 messages per publish request.
    pub fn set_max_messages(mut self, v: usize) -> Self {
        self.max_messages = v.clamp(1, 1000);
        self
    }

    /// Flush once the accumulated payload reaches this size.
    pub fn set_max_bytes(mut self, v: usize) -> Self {
        self.max_bytes = std::cmp::max(v, 1);
        self
    }

    /// Flush after the first message has been waiting this long.
    pub fn set_max_delay(mut self, v: Duration) -> Self {
        self.max_delay = std::cmp::max(v, Duration::from_millis(1));
        self
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for BatchingOptions {
    fn default() -> Self {
        Self {
            max_messages: 100,
            max_bytes: 1024 * 1024,
            max_delay: Duration::from_millis(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = BatchingOptions::default();
        assert_eq!(options.max_messages(), 100);
        assert_eq!(options.max_bytes(), 1024 * 1024);
        assert_eq!(options.max_delay(), Duration::from_millis(10));
    }

    #[test]
    fn limits_are_clamped() {
        let options = BatchingOptions::default()
            .set_max_messages(0)
            .set_max_bytes(0)
            .set_max_delay(Duration::ZERO);
        assert_eq!(options.max_messages(), 1);
        assert_eq!(options.max_bytes(), 1);
        assert_eq!(options.max_delay(), Duration::from_millis(1));

        let options = BatchingOptions::default().set_max_messages(100_000);
        assert_eq!(options.max_messages(), 1000);
    }
}
