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

//! Maps HTTP responses to client errors and runs requests through the retry
//! loop.

use gax::Result;
use gax::error::Error;
use gax::retry_loop::retry_loop;
use std::time::Duration;

/// Converts a non-success HTTP response into an [Error].
///
/// The services usually return the standard `{"error": {...}}` payload; when
/// they do, the error carries the parsed [Status][gax::error::rpc::Status].
/// Proxies and load balancers may return arbitrary payloads, those become
/// transport errors with the raw payload attached.
pub async fn to_http_error<T>(response: reqwest::Response) -> Result<T> {
    let status_code = response.status().as_u16();
    let headers = response.headers().clone();
    let payload = response.bytes().await.map_err(Error::io)?;
    match gax::error::rpc::Status::try_from(&payload) {
        Ok(status) => Err(Error::service_with_http_metadata(
            status,
            Some(status_code),
            Some(headers),
        )),
        Err(_) => Err(Error::http(status_code, headers, payload)),
    }
}

/// Maps `reqwest` send failures to the client error taxonomy.
pub fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::timeout(e);
    }
    Error::io(e)
}

/// The timeout for a single attempt, given the configured per-attempt
/// timeout and the time remaining in the retry policy.
pub fn effective_timeout(
    options: &gax::options::RequestOptions,
    remaining_time: Option<Duration>,
) -> Option<Duration> {
    match (options.attempt_timeout(), remaining_time) {
        (None, None) => None,
        (None, Some(r)) => Some(r),
        (Some(t), None) => Some(t),
        (Some(t), Some(r)) => Some(std::cmp::min(t, r)),
    }
}

/// Runs `attempt` through the retry loop configured in `options`.
///
/// The attempt function receives the timeout to apply to that attempt, if
/// any.
pub async fn execute_retry<F, T>(
    options: &gax::options::RequestOptions,
    idempotent: bool,
    attempt: F,
) -> Result<T>
where
    F: AsyncFn(Option<Duration>) -> Result<T> + Send,
{
    let idempotent = options.idempotency().unwrap_or(idempotent);
    let inner =
        async |remaining: Option<Duration>| attempt(effective_timeout(options, remaining)).await;
    let sleep = async |d: Duration| tokio::time::sleep(d).await;
    retry_loop(
        inner,
        sleep,
        idempotent,
        options.retry_throttler(),
        options.retry_policy().clone(),
        options.backoff_policy().clone(),
    )
    .await
}
