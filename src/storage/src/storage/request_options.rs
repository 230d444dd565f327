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

/// Resumable uploads must send full 256 KiB quanta on each intermediate
/// chunk.
pub(crate) const RESUMABLE_UPLOAD_QUANTUM: usize = 256 * 1024;

const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// The per-request options for storage operations.
#[derive(Clone, Debug)]
pub(crate) struct RequestOptions {
    pub(crate) retry: gax::options::RequestOptions,
    pub(crate) upload_chunk_size: usize,
}

impl RequestOptions {
    pub(crate) fn new() -> Self {
        Self {
            retry: gax::options::RequestOptions::new(crate::retry_policy::storage_default()),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }

    /// Rounds the chunk size up to the next upload quantum.
    pub(crate) fn set_upload_chunk_size(&mut self, size: usize) {
        let size = std::cmp::max(size, 1);
        self.upload_chunk_size = size.div_ceil(RESUMABLE_UPLOAD_QUANTUM) * RESUMABLE_UPLOAD_QUANTUM;
    }
}
