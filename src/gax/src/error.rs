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

//! Error types for the client libraries.
//!
//! The client libraries distinguish between errors detected while trying to
//! send a request (e.g. the authentication headers cannot be created), errors
//! trying to receive a response (e.g. the connection is dropped before the
//! full response arrives), and errors returned by the service itself.

mod core_error;
mod credentials;
pub use core_error::*;
pub use credentials::CredentialsError;

/// Errors and error details returned by service RPCs.
///
/// The types in this module represent the detailed error information returned
/// by the services, following the error model described in the
/// [API Design Guide](https://cloud.google.com/apis/design/errors).
pub mod rpc;
