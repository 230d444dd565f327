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

//! Defines the retry policies for Cloud Storage.
//!
//! The storage service [recommends] retrying 408, 429, and all 5xx HTTP
//! status codes, in addition to the usual connection-level failures.
//!
//! [recommends]: https://cloud.google.com/storage/docs/retry-strategy

use gax::error::Error;
use gax::retry_policy::{RetryPolicy, RetryPolicyExt};
use gax::retry_result::RetryResult;
use std::time::Duration;

/// The default retry policy for the Storage client.
///
/// Retries all the errors shown as retryable in the service documentation,
/// and stops retrying after 60 seconds.
pub(crate) fn storage_default() -> impl RetryPolicy {
    RetryableErrors.with_time_limit(Duration::from_secs(60))
}

/// Follows the [retry strategy] recommended by the Cloud Storage service.
///
/// This policy should be decorated to limit the number of retry attempts
/// and/or the duration of the retry loop.
///
/// # Example
/// ```
/// # use gcp_sdk_storage::retry_policy::RetryableErrors;
/// use gax::retry_policy::RetryPolicyExt;
/// use gcp_sdk_storage::client::Storage;
/// use std::time::Duration;
/// let builder = Storage::builder().with_retry_policy(
///     RetryableErrors
///         .with_time_limit(Duration::from_secs(60))
///         .with_attempt_limit(10),
/// );
/// ```
///
/// [retry strategy]: https://cloud.google.com/storage/docs/retry-strategy
#[derive(Clone, Debug)]
pub struct RetryableErrors;

impl RetryPolicy for RetryableErrors {
    fn on_error(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
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
        if let Some(code) = error.http_status_code() {
            return match code {
                408 | 429 | 500..600 => RetryResult::Continue(error),
                _ => RetryResult::Permanent(error),
            };
        }
        RetryResult::Permanent(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::CredentialsError;
    use gax::error::rpc::{Code, Status};
    use std::time::Instant;
    use test_case::test_case;

    fn http_error(code: u16) -> Error {
        Error::service_with_http_metadata(
            Status::default().set_code(Code::from_http_status(code)),
            Some(code),
            None,
        )
    }

    #[test_case(408)]
    #[test_case(429)]
    #[test_case(500)]
    #[test_case(502)]
    #[test_case(503)]
    #[test_case(504)]
    fn retryable_status_codes(code: u16) {
        let p = RetryableErrors;
        let flow = p.on_error(Instant::now(), 1, true, http_error(code));
        assert!(flow.is_continue(), "{code}: {flow:?}");
        // Never retried when the operation is not idempotent.
        let flow = p.on_error(Instant::now(), 1, false, http_error(code));
        assert!(flow.is_permanent(), "{code}: {flow:?}");
    }

    #[test_case(400)]
    #[test_case(401)]
    #[test_case(403)]
    #[test_case(404)]
    #[test_case(412)]
    fn permanent_status_codes(code: u16) {
        let p = RetryableErrors;
        let flow = p.on_error(Instant::now(), 1, true, http_error(code));
        assert!(flow.is_permanent(), "{code}: {flow:?}");
    }

    #[test]
    fn connection_errors() {
        let p = RetryableErrors;
        assert!(
            p.on_error(Instant::now(), 1, true, Error::io("reset"))
                .is_continue()
        );
        assert!(
            p.on_error(Instant::now(), 1, true, Error::timeout("slow"))
                .is_continue()
        );
        assert!(
            p.on_error(Instant::now(), 1, false, Error::io("reset"))
                .is_permanent()
        );
    }

    #[test]
    fn credential_errors() {
        let p = RetryableErrors;
        let transient = Error::authentication(CredentialsError::from_msg(true, "retry me"));
        assert!(p.on_error(Instant::now(), 1, false, transient).is_continue());
        let permanent = Error::authentication(CredentialsError::from_msg(false, "bad key"));
        assert!(
            p.on_error(Instant::now(), 1, true, permanent)
                .is_permanent()
        );
    }
}
