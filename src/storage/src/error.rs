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

//! Custom errors for the Cloud Storage client.
//!
//! These types are often returned as the `source()` of an
//! [Error][crate::Error].

use crate::model::ObjectChecksums;

/// Indicates that a checksum mismatch was detected while reading or writing
/// a Cloud Storage object.
///
/// When reading an object in full, the client library computes the CRC32C
/// checksum (and optionally the MD5 hash) of the received data and compares
/// it against the values reported by the service. Likewise, when writing an
/// object, the checksums of the sent data are compared against the values
/// reported by the service when the object is finalized. If the values do
/// not match, the operation completes with an error wrapping this type.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ChecksumMismatch {
    /// The CRC32C checksum reported by the service does not match the
    /// computed (or expected) value.
    Crc32c { got: u32, want: u32 },

    /// The MD5 hash reported by the service does not match the computed (or
    /// expected) value.
    Md5 {
        got: bytes::Bytes,
        want: bytes::Bytes,
    },

    /// Both the CRC32C checksum **and** the MD5 hash do not match.
    Both {
        got: Box<ObjectChecksums>,
        want: Box<ObjectChecksums>,
    },
}

impl std::fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crc32c { got, want } => write!(
                f,
                "the CRC32C checksums do not match: got=0x{got:08x}, want=0x{want:08x}"
            ),
            Self::Md5 { got, want } => write!(
                f,
                "the MD5 hashes do not match: got={got:02x?}, want={want:02x?}"
            ),
            Self::Both { got, want } => write!(
                f,
                "both the CRC32C checksums and MD5 hashes do not match: got={got:?}, want={want:?}"
            ),
        }
    }
}

impl std::error::Error for ChecksumMismatch {}

/// A parallel upload was aborted before all shards completed.
///
/// The first shard failure aborts the upload: writes and finishes on the
/// remaining shards fail fast with this error, and the upload handle reports
/// the original failure.
#[derive(thiserror::Error, Clone, Debug)]
#[error("the parallel upload was aborted, shard {shard} failed first")]
pub struct ParallelUploadAborted {
    pub(crate) shard: usize,
}

impl ParallelUploadAborted {
    /// The index of the shard whose failure aborted the upload.
    pub fn shard(&self) -> usize {
        self.shard
    }
}
