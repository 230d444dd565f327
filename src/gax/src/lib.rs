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

//! Shared helpers for the cloud client libraries.
//!
//! This crate contains the types and functions shared by all the service
//! clients in this workspace: the error taxonomy, the retry loop, and the
//! policies (retry, backoff, throttling) that control it. Applications
//! normally interact with these types only to configure a client, for
//! example to change the retry policy or the backoff parameters.

/// An alias of [std::result::Result] where the error is always [error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by the client libraries.
pub mod error;

pub mod backoff_policy;
pub mod exponential_backoff;
pub mod options;
pub mod retry_policy;
pub mod retry_result;
pub mod retry_throttler;

/// The retry loop implementation, used by the client libraries.
#[doc(hidden)]
pub mod retry_loop;
