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

use crate::publisher::client::Publisher;
use crate::publisher::worker::BundledMessage;
use std::sync::Arc;

/// One bundle of messages, published in a single request.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    messages: Vec<BundledMessage>,
    messages_byte_size: usize,
}

impl Batch {
    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn size(&self) -> usize {
        self.messages_byte_size
    }

    pub(crate) fn push(&mut self, msg: BundledMessage) {
        self.messages_byte_size += msg.msg.approx_size();
        self.messages.push(msg);
    }

    /// Publishes the batch, delivering per-message results to the waiting
    /// handles.
    ///
    /// Returns `true` on success. Errors are fanned out to every message in
    /// the batch; the caller only needs the boolean to decide whether to
    /// pause an ordering key.
    pub(crate) async fn send(self, client: Publisher, topic: String) -> bool {
        let (msgs, txs): (Vec<_>, Vec<_>) = self
            .messages
            .into_iter()
            .map(|m| (m.msg, m.tx))
            .unzip();
        match client.publish(topic, msgs).await {
            Err(e) => {
                let shared = Arc::new(e);
                for tx in txs {
                    // The application may have dropped the handle, it is ok
                    // if this fails.
                    let _ = tx.send(Err(crate::Error::io(shared.clone())));
                }
                false
            }
            Ok(response) => {
                for (tx, id) in txs.into_iter().zip(response.message_ids.into_iter()) {
                    let _ = tx.send(Ok(id));
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PubsubMessage;
    use crate::publisher::client::tests::test_client;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use tokio::sync::oneshot;

    fn bundled(data: &str) -> (BundledMessage, oneshot::Receiver<crate::Result<String>>) {
        let (tx, rx) = oneshot::channel();
        (
            BundledMessage {
                msg: PubsubMessage::new().set_data(data.to_string()),
                tx,
            },
            rx,
        )
    }

    #[test]
    fn accumulates_size_and_count() {
        let mut batch = Batch::default();
        assert!(batch.is_empty());
        let (m, _rx) = bundled("hello");
        batch.push(m);
        let (m, _rx2) = bundled("worlds");
        batch.push(m);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size(), 11);
    }

    #[tokio::test]
    async fn send_distributes_message_ids() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "POST",
                "/v1/projects/p/topics/t:publish",
            ))
            .respond_with(json_encoded(serde_json::json!({
                "messageIds": ["id-a", "id-b"]
            }))),
        );

        let mut batch = Batch::default();
        let (m, rx_a) = bundled("a");
        batch.push(m);
        let (m, rx_b) = bundled("b");
        batch.push(m);

        let client = test_client(server.url_str(""));
        let ok = batch.send(client, "projects/p/topics/t".to_string()).await;
        assert!(ok);
        assert_eq!(rx_a.await??, "id-a");
        assert_eq!(rx_b.await??, "id-b");
        Ok(())
    }

    #[tokio::test]
    async fn send_fans_out_errors() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "POST",
                "/v1/projects/p/topics/t:publish",
            ))
            .respond_with(status_code(403).body(
                r#"{"error": {"code": 403, "message": "denied", "status": "PERMISSION_DENIED"}}"#,
            )),
        );

        let mut batch = Batch::default();
        let (m, rx_a) = bundled("a");
        batch.push(m);
        let (m, rx_b) = bundled("b");
        batch.push(m);

        let client = test_client(server.url_str(""));
        let ok = batch.send(client, "projects/p/topics/t".to_string()).await;
        assert!(!ok);
        assert!(rx_a.await.unwrap().is_err());
        assert!(rx_b.await.unwrap().is_err());
    }
}
