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

//! Computes checksums for Cloud Storage transfers.

use crate::error::ChecksumMismatch;
use crate::model::ObjectChecksums;

/// Incrementally computes the CRC32C checksum (and optionally the MD5 hash)
/// of uploaded or downloaded data.
///
/// Uploads may be partially retried: the retry loop seeks the data source
/// back to the last persisted offset and replays from there. The engine
/// tracks the high-water mark of hashed data and ignores replayed bytes, so
/// each byte is hashed exactly once.
#[derive(Clone, Default)]
pub(crate) struct ChecksumEngine {
    crc32c: u32,
    md5: Option<md5::Context>,
    hashed: u64,
}

impl std::fmt::Debug for ChecksumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumEngine")
            .field("crc32c", &self.crc32c)
            .field("md5", &self.md5.as_ref().map(|_| "[skipped]"))
            .field("hashed", &self.hashed)
            .finish()
    }
}

impl ChecksumEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_md5() -> Self {
        Self {
            md5: Some(md5::Context::default()),
            ..Self::default()
        }
    }

    /// Folds `data`, which starts at `offset` in the stream, into the
    /// checksums. Bytes before the high-water mark are skipped.
    pub(crate) fn update(&mut self, offset: u64, data: &bytes::Bytes) {
        let end = offset + data.len() as u64;
        if end <= self.hashed {
            return;
        }
        let skip = self.hashed.saturating_sub(offset) as usize;
        let fresh = &data[skip..];
        self.crc32c = crc32c::crc32c_append(self.crc32c, fresh);
        if let Some(md5) = &mut self.md5 {
            md5.consume(fresh);
        }
        self.hashed = end;
    }

    pub(crate) fn finalize(&self) -> ObjectChecksums {
        ObjectChecksums {
            crc32c: Some(self.crc32c),
            md5_hash: self.md5.clone().map(|c| {
                let digest = c.finalize();
                bytes::Bytes::copy_from_slice(&digest.0)
            }),
        }
    }
}

/// Compares the locally computed checksums against the values reported by
/// the service.
///
/// Only checksums present on both sides are compared. The service omits the
/// MD5 hash for composite objects, and the client may not compute one.
pub(crate) fn validate(
    computed: &ObjectChecksums,
    reported: &ObjectChecksums,
) -> Result<(), ChecksumMismatch> {
    let crc_mismatch = match (computed.crc32c, reported.crc32c) {
        (Some(got), Some(want)) if got != want => Some((want, got)),
        _ => None,
    };
    let md5_mismatch = match (&computed.md5_hash, &reported.md5_hash) {
        (Some(got), Some(want)) if got != want => Some((want.clone(), got.clone())),
        _ => None,
    };
    match (crc_mismatch, md5_mismatch) {
        (None, None) => Ok(()),
        (Some((want, got)), None) => Err(ChecksumMismatch::Crc32c { got, want }),
        (None, Some((want, got))) => Err(ChecksumMismatch::Md5 { got, want }),
        (Some(_), Some(_)) => Err(ChecksumMismatch::Both {
            got: Box::new(computed.clone()),
            want: Box::new(reported.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICK: &[u8] = b"The quick brown fox jumps over the lazy dog";
    const QUICK_CRC32C: u32 = 0x22620404;

    #[test]
    fn crc32c_known_value() {
        let mut engine = ChecksumEngine::new();
        engine.update(0, &bytes::Bytes::from_static(QUICK));
        let checksums = engine.finalize();
        assert_eq!(checksums.crc32c, Some(QUICK_CRC32C));
        assert_eq!(checksums.md5_hash, None);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut engine = ChecksumEngine::with_md5();
        engine.update(0, &bytes::Bytes::from_static(&QUICK[..16]));
        engine.update(16, &bytes::Bytes::from_static(&QUICK[16..]));
        let checksums = engine.finalize();
        assert_eq!(checksums.crc32c, Some(QUICK_CRC32C));
        assert_eq!(
            checksums.md5_hash,
            Some(bytes::Bytes::copy_from_slice(&md5::compute(QUICK).0))
        );
    }

    #[test]
    fn replayed_bytes_are_ignored() {
        let mut engine = ChecksumEngine::new();
        engine.update(0, &bytes::Bytes::from_static(&QUICK[..20]));
        // A retry replays from offset 10; the overlapping bytes must not be
        // hashed twice.
        engine.update(10, &bytes::Bytes::from_static(&QUICK[10..]));
        assert_eq!(engine.finalize().crc32c, Some(QUICK_CRC32C));

        // A full replay of already-hashed data is a no-op.
        let mut engine = ChecksumEngine::new();
        engine.update(0, &bytes::Bytes::from_static(QUICK));
        engine.update(0, &bytes::Bytes::from_static(&QUICK[..10]));
        assert_eq!(engine.finalize().crc32c, Some(QUICK_CRC32C));
    }

    #[test]
    fn validate_matching() {
        let computed = ObjectChecksums {
            crc32c: Some(QUICK_CRC32C),
            md5_hash: None,
        };
        let reported = ObjectChecksums {
            crc32c: Some(QUICK_CRC32C),
            md5_hash: Some(bytes::Bytes::from_static(b"ignored, not computed")),
        };
        assert!(validate(&computed, &reported).is_ok());
    }

    #[test]
    fn validate_crc_mismatch() {
        let computed = ObjectChecksums {
            crc32c: Some(1),
            md5_hash: None,
        };
        let reported = ObjectChecksums {
            crc32c: Some(2),
            md5_hash: None,
        };
        let err = validate(&computed, &reported).unwrap_err();
        assert!(
            matches!(err, ChecksumMismatch::Crc32c { got: 1, want: 2 }),
            "{err:?}"
        );
    }

    #[test]
    fn validate_both_mismatch() {
        let computed = ObjectChecksums {
            crc32c: Some(1),
            md5_hash: Some(bytes::Bytes::from_static(b"a")),
        };
        let reported = ObjectChecksums {
            crc32c: Some(2),
            md5_hash: Some(bytes::Bytes::from_static(b"b")),
        };
        let err = validate(&computed, &reported).unwrap_err();
        assert!(matches!(err, ChecksumMismatch::Both { .. }), "{err:?}");
    }
}
