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

//! Defines traits for retry policies and some common implementations.
//!
//! The client libraries automatically retry RPCs when they fail due to
//! transient errors and the RPC is idempotent, that is, when it is safe to
//! perform the RPC more than once.
//!
//! Applications may override the default behavior, and may retry operations
//! that, while not safe in general, may be safe given how the application
//! manages resources.
//!
//! # Example
//! ```
//! # use gcp_sdk_gax::retry_policy::{Aip194Strict, RetryPolicyExt};
//! use std::time::Duration;
//! let policy = Aip194Strict
//!     .with_time_limit(Duration::from_secs(10))
//!     .with_attempt_limit(5);
//! ```

use crate::error::Error;
use crate::retry_result::RetryResult;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Controls the retry loop behavior.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Queries the retry policy after an error.
    ///
    /// # Parameters
    /// * `loop_start` - when the retry loop started.
    /// * `attempt_count` - the number of attempts, including the one that
    ///   just failed.
    /// * `idempotent` - if `true` assume the operation is idempotent. Many
    ///   more errors are retryable on idempotent operations.
    /// * `error` - the last error received from a request. Not all are
    ///   server errors, the client library may have been unable to send or
    ///   complete the RPC.
    fn on_error(
        &self,
        loop_start: Instant,
        attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult;

    /// Queries the retry policy after a throttled attempt.
    ///
    /// Throttled attempts count against limits-based policies. Returns
    /// `Some(error)` when the policy is exhausted by throttling alone.
    fn on_throttle(&self, loop_start: Instant, attempt_count: u32) -> Option<Error> {
        let _ = (loop_start, attempt_count);
        None
    }

    /// The remaining time in the retry policy.
    ///
    /// For policies based on time, this returns the remaining time in the
    /// policy. The retry loop uses this value to adjust the next RPC
    /// timeout. For policies that are not time based this returns `None`.
    fn remaining_time(&self, loop_start: Instant, attempt_count: u32) -> Option<Duration> {
        let _ = (loop_start, attempt_count);
        None
    }
}

/// A helper type to use [RetryPolicy] in client and request options.
#[derive(Clone)]
pub struct RetryPolicyArg(pub(crate) Arc<dyn RetryPolicy>);

impl<T: RetryPolicy + 'static> From<T> for RetryPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl From<Arc<dyn RetryPolicy>> for RetryPolicyArg {
    fn from(value: Arc<dyn RetryPolicy>) -> Self {
        Self(value)
    }
}

impl From<RetryPolicyArg> for Arc<dyn RetryPolicy> {
    fn from(value: RetryPolicyArg) -> Self {
        value.0
    }
}

/// Extension trait to decorate retry policies with limits.
pub trait RetryPolicyExt: RetryPolicy + Sized {
    /// Stops the retry loop after `maximum_attempts` attempts.
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::new(self, maximum_attempts)
    }

    /// Stops the retry loop once `maximum_duration` has elapsed.
    fn with_time_limit(self, maximum_duration: Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::new(self, maximum_duration)
    }
}

impl<T: RetryPolicy + Sized> RetryPolicyExt for T {}

/// A retry policy that strictly follows [AIP-194](https://google.aip.dev/194).
///
/// This policy should be decorated to limit the number of retry attempts or
/// the duration of the retry loop.
///
/// The policy interprets AIP-194 strictly: the retry decision for server-side
/// errors is based only on the status code, and the only retryable status
/// code is `UNAVAILABLE`.
#[derive(Clone, Debug)]
pub struct Aip194Strict;

impl RetryPolicy for Aip194Strict {
    fn on_error(
        &self,
        _loop_start: Instant,
        _attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
        // Errors generated before the RPC started never made it to the
        // service, so they are safe to retry even on non-idempotent calls.
        if error.is_transient_and_before_rpc() {
            return RetryResult::Continue(error);
        }
        if error.is_authentication() {
            return RetryResult::Permanent(error);
        }
        if !idempotent {
            return RetryResult::Permanent(error);
        }
        if error.is_io() || error.is_timeout() {
            return RetryResult::Continue(error);
        }
        if let Some(status) = error.status() {
            return if status.code == crate::error::rpc::Code::Unavailable {
                RetryResult::Continue(error)
            } else {
                RetryResult::Permanent(error)
            };
        }
        if let Some(code) = error.http_status_code() {
            return if code == 503 {
                RetryResult::Continue(error)
            } else {
                RetryResult::Permanent(error)
            };
        }
        RetryResult::Permanent(error)
    }
}

/// A retry policy that retries all errors.
///
/// This policy must be decorated to limit the number of retry attempts or
/// the duration of the retry loop.
///
/// The policy retries all errors. This may be useful if the service guarantees
/// idempotency, maybe through the use of request ids.
#[derive(Clone, Debug)]
pub struct AlwaysRetry;

impl RetryPolicy for AlwaysRetry {
    fn on_error(
        &self,
        _loop_start: Instant,
        _attempt_count: u32,
        _idempotent: bool,
        error: Error,
    ) -> RetryResult {
        RetryResult::Continue(error)
    }
}

/// A retry policy decorator that limits the total time in the retry loop.
///
/// Once the loop exceeds its duration limit, this policy converts retryable
/// errors into [RetryResult::Exhausted]. Before the deadline is reached, the
/// policy delegates to the inner policy.
#[derive(Clone, Debug)]
pub struct LimitedElapsedTime<P>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_duration: Duration,
}

impl<P> LimitedElapsedTime<P>
where
    P: RetryPolicy,
{
    pub fn new(inner: P, maximum_duration: Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn deadline(&self, loop_start: Instant) -> Instant {
        loop_start + self.maximum_duration
    }
}

impl<P> RetryPolicy for LimitedElapsedTime<P>
where
    P: RetryPolicy,
{
    fn on_error(
        &self,
        loop_start: Instant,
        attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
        match self.inner.on_error(loop_start, attempt_count, idempotent, error) {
            RetryResult::Continue(e) if Instant::now() >= self.deadline(loop_start) => {
                RetryResult::Exhausted(e)
            }
            flow => flow,
        }
    }

    fn on_throttle(&self, loop_start: Instant, attempt_count: u32) -> Option<Error> {
        if Instant::now() >= self.deadline(loop_start) {
            return Some(Error::exhausted(format!(
                "retry policy expired after {:?}",
                self.maximum_duration
            )));
        }
        self.inner.on_throttle(loop_start, attempt_count)
    }

    fn remaining_time(&self, loop_start: Instant, attempt_count: u32) -> Option<Duration> {
        let remaining = self
            .deadline(loop_start)
            .saturating_duration_since(Instant::now());
        if let Some(inner) = self.inner.remaining_time(loop_start, attempt_count) {
            return Some(std::cmp::min(remaining, inner));
        }
        Some(remaining)
    }
}

/// A retry policy decorator that limits the number of attempts.
///
/// Once the maximum attempt count is reached, this policy converts retryable
/// errors into [RetryResult::Exhausted]. Before the maximum is reached, the
/// policy delegates to the inner policy.
#[derive(Clone, Debug)]
pub struct LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl<P> LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    pub fn new(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }
}

impl<P> RetryPolicy for LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    fn on_error(
        &self,
        loop_start: Instant,
        attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
        match self.inner.on_error(loop_start, attempt_count, idempotent, error) {
            RetryResult::Continue(e) if attempt_count >= self.maximum_attempts => {
                RetryResult::Exhausted(e)
            }
            flow => flow,
        }
    }

    fn on_throttle(&self, loop_start: Instant, attempt_count: u32) -> Option<Error> {
        if attempt_count >= self.maximum_attempts {
            return Some(Error::exhausted(format!(
                "retry policy exhausted after {} attempts",
                self.maximum_attempts
            )));
        }
        self.inner.on_throttle(loop_start, attempt_count)
    }

    fn remaining_time(&self, loop_start: Instant, attempt_count: u32) -> Option<Duration> {
        self.inner.remaining_time(loop_start, attempt_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialsError;
    use crate::error::rpc::{Code, Status};

    fn from_status(code: Code) -> Error {
        Error::service(Status::default().set_code(code).set_message("test only"))
    }

    fn http_error(code: u16) -> Error {
        Error::http(code, http::HeaderMap::new(), bytes::Bytes::new())
    }

    #[test]
    fn aip194_strict_service_errors() {
        let now = Instant::now();
        let p = Aip194Strict;

        let flow = p.on_error(now, 1, true, from_status(Code::Unavailable));
        assert!(flow.is_continue(), "{flow:?}");
        let flow = p.on_error(now, 1, false, from_status(Code::Unavailable));
        assert!(flow.is_permanent(), "{flow:?}");

        let flow = p.on_error(now, 1, true, from_status(Code::PermissionDenied));
        assert!(flow.is_permanent(), "{flow:?}");
        let flow = p.on_error(now, 1, false, from_status(Code::PermissionDenied));
        assert!(flow.is_permanent(), "{flow:?}");
    }

    #[test]
    fn aip194_strict_http_errors() {
        let now = Instant::now();
        let p = Aip194Strict;

        assert!(p.on_error(now, 1, true, http_error(503)).is_continue());
        assert!(p.on_error(now, 1, false, http_error(503)).is_permanent());
        assert!(p.on_error(now, 1, true, http_error(404)).is_permanent());
    }

    #[test]
    fn aip194_strict_client_errors() {
        let now = Instant::now();
        let p = Aip194Strict;

        assert!(p.on_error(now, 1, true, Error::io("err")).is_continue());
        assert!(p.on_error(now, 1, false, Error::io("err")).is_permanent());
        assert!(p.on_error(now, 1, true, Error::timeout("err")).is_continue());

        // Transient credential errors never left the client, they are safe
        // to retry even if not idempotent.
        let transient = Error::authentication(CredentialsError::from_msg(true, "err"));
        assert!(p.on_error(now, 1, false, transient).is_continue());
        let permanent = Error::authentication(CredentialsError::from_msg(false, "err"));
        assert!(p.on_error(now, 1, false, permanent).is_permanent());

        assert!(p.on_error(now, 1, true, Error::ser("err")).is_permanent());
        assert!(p.on_error(now, 1, true, Error::other("err")).is_permanent());
    }

    #[test]
    fn always_retry() {
        let now = Instant::now();
        let p = AlwaysRetry;
        assert!(p.on_error(now, 1, true, Error::other("err")).is_continue());
        assert!(p.on_error(now, 1, false, Error::ser("err")).is_continue());
        assert!(p.remaining_time(now, 1).is_none());
    }

    #[test]
    fn attempt_limit() {
        let now = Instant::now();
        let p = AlwaysRetry.with_attempt_limit(3);
        assert!(p.on_error(now, 1, true, Error::other("err")).is_continue());
        assert!(p.on_error(now, 2, true, Error::other("err")).is_continue());
        assert!(p.on_error(now, 3, true, Error::other("err")).is_exhausted());
        assert!(p.on_error(now, 4, true, Error::other("err")).is_exhausted());

        // Permanent errors pass through unchanged, even past the limit.
        let p = Aip194Strict.with_attempt_limit(3);
        let flow = p.on_error(now, 5, true, from_status(Code::PermissionDenied));
        assert!(flow.is_permanent(), "{flow:?}");
    }

    #[test]
    fn attempt_limit_on_throttle() {
        let now = Instant::now();
        let p = AlwaysRetry.with_attempt_limit(3);
        assert!(p.on_throttle(now, 1).is_none());
        let err = p.on_throttle(now, 3).expect("limit reached");
        assert!(err.is_exhausted(), "{err:?}");
    }

    #[test]
    fn time_limit() {
        let start = Instant::now() - Duration::from_secs(120);
        let p = AlwaysRetry.with_time_limit(Duration::from_secs(60));
        assert!(p.on_error(start, 1, true, Error::other("err")).is_exhausted());
        assert!(p.on_throttle(start, 1).is_some());

        let start = Instant::now();
        let p = AlwaysRetry.with_time_limit(Duration::from_secs(60));
        assert!(p.on_error(start, 1, true, Error::other("err")).is_continue());
        assert!(p.on_throttle(start, 1).is_none());
        let remaining = p.remaining_time(start, 1).unwrap();
        assert!(remaining <= Duration::from_secs(60), "{remaining:?}");
    }

    #[test]
    fn time_limit_composes() {
        let start = Instant::now();
        let p = AlwaysRetry
            .with_time_limit(Duration::from_secs(60))
            .with_time_limit(Duration::from_secs(10));
        let remaining = p.remaining_time(start, 1).unwrap();
        assert!(remaining <= Duration::from_secs(10), "{remaining:?}");
    }

    #[test]
    fn arg_conversions() {
        let _ = RetryPolicyArg::from(Aip194Strict);
        let policy: Arc<dyn RetryPolicy> = Arc::new(AlwaysRetry.with_attempt_limit(3));
        let _ = RetryPolicyArg::from(policy);
    }
}
