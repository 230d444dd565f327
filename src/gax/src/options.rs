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

//! Per-request options for the client libraries.

use crate::backoff_policy::{BackoffPolicy, BackoffPolicyArg};
use crate::retry_policy::{RetryPolicy, RetryPolicyArg};
use crate::retry_throttler::{RetryThrottlerArg, SharedRetryThrottler};
use std::sync::Arc;
use std::time::Duration;

/// The set of policies controlling a single request.
///
/// Clients initialize these options from their configuration and apply any
/// request-level overrides before starting the retry loop.
#[derive(Clone)]
pub struct RequestOptions {
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
    retry_throttler: SharedRetryThrottler,
    idempotency: Option<bool>,
    attempt_timeout: Option<Duration>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("retry_policy", &self.retry_policy)
            .field("backoff_policy", &self.backoff_policy)
            .field("idempotency", &self.idempotency)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}

impl RequestOptions {
    /// Creates options with the given defaults.
    pub fn new<P: Into<RetryPolicyArg>>(default_retry_policy: P) -> Self {
        Self {
            retry_policy: default_retry_policy.into().into(),
            backoff_policy: Arc::new(crate::exponential_backoff::ExponentialBackoff::default()),
            retry_throttler: RetryThrottlerArg::from(
                crate::retry_throttler::AdaptiveThrottler::default(),
            )
            .into(),
            idempotency: None,
            attempt_timeout: None,
        }
    }

    /// The retry policy for this request.
    pub fn retry_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.retry_policy
    }

    /// Changes the retry policy.
    pub fn set_retry_policy<V: Into<RetryPolicyArg>>(&mut self, v: V) {
        self.retry_policy = v.into().into();
    }

    /// The backoff policy for this request.
    pub fn backoff_policy(&self) -> &Arc<dyn BackoffPolicy> {
        &self.backoff_policy
    }

    /// Changes the backoff policy.
    pub fn set_backoff_policy<V: Into<BackoffPolicyArg>>(&mut self, v: V) {
        self.backoff_policy = v.into().into();
    }

    /// The retry throttler for this request.
    pub fn retry_throttler(&self) -> SharedRetryThrottler {
        self.retry_throttler.clone()
    }

    /// Changes the retry throttler.
    pub fn set_retry_throttler<V: Into<RetryThrottlerArg>>(&mut self, v: V) {
        self.retry_throttler = v.into().into();
    }

    /// The idempotency override, if any.
    ///
    /// When unset, the client library decides idempotency per operation.
    pub fn idempotency(&self) -> Option<bool> {
        self.idempotency
    }

    /// Treats the request as idempotent (or not), regardless of the default
    /// for the operation.
    pub fn set_idempotency(&mut self, v: bool) {
        self.idempotency = Some(v);
    }

    /// The per-attempt timeout, if any.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Limits the time spent on each attempt.
    ///
    /// The retry loop may use a shorter timeout when the retry policy is
    /// about to expire.
    pub fn set_attempt_timeout<V: Into<Duration>>(&mut self, v: V) {
        self.attempt_timeout = Some(v.into());
    }
}
