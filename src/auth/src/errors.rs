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

use http::StatusCode;

pub use gax::error::CredentialsError;

/// A helper to create a transient error.
pub(crate) fn transient<T: std::error::Error + Send + Sync + 'static>(
    source: T,
) -> CredentialsError {
    CredentialsError::new(true, source)
}

/// A helper to create a permanent error.
pub(crate) fn non_transient<T: std::error::Error + Send + Sync + 'static>(
    source: T,
) -> CredentialsError {
    CredentialsError::new(false, source)
}

pub(crate) fn transient_from_str<T: Into<String>>(message: T) -> CredentialsError {
    CredentialsError::from_msg(true, message)
}

pub(crate) fn non_transient_from_str<T: Into<String>>(message: T) -> CredentialsError {
    CredentialsError::from_msg(false, message)
}

/// Whether a failed token exchange is worth retrying.
pub(crate) fn is_retryable(c: StatusCode) -> bool {
    match c {
        // Internal server errors do not indicate that there is anything wrong
        // with our request, so we retry them.
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(StatusCode::INTERNAL_SERVER_ERROR)]
    #[test_case(StatusCode::SERVICE_UNAVAILABLE)]
    #[test_case(StatusCode::REQUEST_TIMEOUT)]
    #[test_case(StatusCode::TOO_MANY_REQUESTS)]
    fn retryable(c: StatusCode) {
        assert!(is_retryable(c));
    }

    #[test_case(StatusCode::NOT_FOUND)]
    #[test_case(StatusCode::UNAUTHORIZED)]
    #[test_case(StatusCode::BAD_REQUEST)]
    #[test_case(StatusCode::BAD_GATEWAY)]
    #[test_case(StatusCode::PRECONDITION_FAILED)]
    fn non_retryable(c: StatusCode) {
        assert!(!is_retryable(c));
    }

    #[test]
    fn helpers() {
        let e = transient_from_str("try again");
        assert!(e.is_transient());
        let e = non_transient_from_str("give up");
        assert!(!e.is_transient());
        let e = transient(std::io::Error::other("io"));
        assert!(e.is_transient());
        let e = non_transient(std::io::Error::other("io"));
        assert!(!e.is_transient());
    }
}
