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

use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

/// Represents an error creating or using credentials.
///
/// The client libraries may experience problems creating credentials (e.g. a
/// badly formatted or missing key file) or using them (e.g. a temporary
/// failure to retrieve an access token). Note that the latter kind of errors
/// may happen even after the credential files are successfully loaded and
/// parsed.
///
/// Applications rarely need to create instances of this error type. The
/// exception might be when mocking a client library behavior in tests.
///
/// # Example
/// ```
/// # use gcp_sdk_gax::error::CredentialsError;
/// let err = CredentialsError::from_msg(
///     true, "simulated transient error while trying to create credentials");
/// assert!(err.is_transient());
/// assert!(format!("{err}").contains("simulated transient error"));
/// ```
#[derive(Clone, Debug)]
pub struct CredentialsError {
    /// If `true`, the operation that resulted in this error might succeed
    /// upon retry.
    is_transient: bool,

    /// The underlying source of the error.
    source: CredentialsErrorImpl,
}

#[derive(Clone, Debug)]
enum CredentialsErrorImpl {
    SimpleMessage(String),
    Source(Arc<dyn Error + Send + Sync>),
}

impl CredentialsError {
    /// Creates a new `CredentialsError` from another error.
    ///
    /// # Arguments
    /// * `is_transient` - whether the error is retryable.
    /// * `source` - the underlying error that caused the auth failure.
    pub fn new<T: Error + Send + Sync + 'static>(is_transient: bool, source: T) -> Self {
        CredentialsError {
            is_transient,
            source: CredentialsErrorImpl::Source(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialsError` from a message string.
    pub fn from_msg<T: Into<String>>(is_transient: bool, message: T) -> Self {
        CredentialsError {
            is_transient,
            source: CredentialsErrorImpl::SimpleMessage(message.into()),
        }
    }

    /// Returns `true` if a retry of the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.is_transient
    }
}

impl std::error::Error for CredentialsErrorImpl {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            CredentialsErrorImpl::SimpleMessage(_) => None,
            CredentialsErrorImpl::Source(source) => Some(source),
        }
    }
}

impl Display for CredentialsErrorImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self {
            CredentialsErrorImpl::SimpleMessage(message) => write!(f, "{message}"),
            CredentialsErrorImpl::Source(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for CredentialsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

const TRANSIENT_MSG: &str = "but future attempts may succeed";
const PERMANENT_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.is_transient {
            TRANSIENT_MSG
        } else {
            PERMANENT_MSG
        };
        write!(f, "cannot create auth headers, {}: {}", msg, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt() {
        let e = CredentialsError::from_msg(true, "test-only-err-123");
        let got = format!("{e}");
        assert!(got.contains("test-only-err-123"), "{got}");
        assert!(got.contains(TRANSIENT_MSG), "{got}");

        let e = CredentialsError::from_msg(false, "test-only-err-123");
        let got = format!("{e}");
        assert!(got.contains("test-only-err-123"), "{got}");
        assert!(got.contains(PERMANENT_MSG), "{got}");
    }

    #[test]
    fn source_chain() {
        let inner = std::io::Error::other("cannot read key file");
        let e = CredentialsError::new(false, inner);
        assert!(!e.is_transient());
        use std::error::Error as _;
        let source = e.source().expect("wrapped errors have a source");
        assert!(format!("{source}").contains("cannot read key file"));

        let e = CredentialsError::from_msg(true, "flat message");
        assert!(e.source().is_none());
    }
}
