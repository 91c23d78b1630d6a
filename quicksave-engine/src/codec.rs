//! Blob codec
//!
//! Compression is an explicit encode/decode step at the checkpoint-store
//! boundary, not a side effect of the backend. The store persists whatever
//! bytes the codec produces, so backends can be swapped without touching
//! merge or recovery logic. Checkpoints are zlib streams by default, which
//! keeps stored blobs compatible with what the reporting stack already holds.

use quicksave_core::RawContent;

/// How checkpoint state bytes are encoded for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobCodec {
    /// No compression (passthrough).
    None,
    /// Zlib compression. Level 0-9, higher compresses smaller but slower.
    Zlib { level: u32 },
}

impl Default for BlobCodec {
    fn default() -> Self {
        // Level 6 balances ratio against autosave latency.
        BlobCodec::Zlib { level: 6 }
    }
}

impl BlobCodec {
    /// Maximum allowed decoded size. Stored blobs are caller form state and
    /// legitimately stay far below this; anything expanding past it is a
    /// corrupt or hostile stream.
    pub const MAX_DECODED_BYTES: usize = 64 * 1024 * 1024;

    /// Zlib at the default level (6).
    pub fn zlib() -> Self {
        BlobCodec::Zlib { level: 6 }
    }

    /// Zlib at a specific level, clamped to 9.
    #[must_use]
    pub fn zlib_with_level(level: u32) -> Self {
        BlobCodec::Zlib {
            level: level.min(9),
        }
    }

    /// Fast compression (level 1).
    pub fn fast() -> Self {
        BlobCodec::Zlib { level: 1 }
    }

    /// Best compression (level 9).
    pub fn best() -> Self {
        BlobCodec::Zlib { level: 9 }
    }

    /// Encode canonical state bytes for storage. The error is a reason
    /// string; callers wrap it with their operation context.
    pub fn encode(&self, data: &[u8]) -> Result<RawContent, String> {
        match self {
            BlobCodec::None => Ok(data.to_vec()),
            BlobCodec::Zlib { level } => {
                use flate2::write::ZlibEncoder;
                use flate2::Compression;
                use std::io::Write;

                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(*level));
                encoder
                    .write_all(data)
                    .map_err(|e| format!("zlib encode failed: {}", e))?;
                encoder
                    .finish()
                    .map_err(|e| format!("zlib encode failed: {}", e))
            }
        }
    }

    /// Decode stored bytes back to canonical state bytes. Output is capped at
    /// [`Self::MAX_DECODED_BYTES`] so a corrupt stream cannot allocate
    /// unboundedly.
    pub fn decode(&self, data: &[u8]) -> Result<RawContent, String> {
        match self {
            BlobCodec::None => Ok(data.to_vec()),
            BlobCodec::Zlib { .. } => {
                use flate2::read::ZlibDecoder;
                use std::io::Read;

                let decoder = ZlibDecoder::new(data);
                let mut limited = decoder.take(Self::MAX_DECODED_BYTES as u64 + 1);
                let mut decoded = Vec::new();
                limited
                    .read_to_end(&mut decoded)
                    .map_err(|e| format!("zlib decode failed: {}", e))?;

                if decoded.len() > Self::MAX_DECODED_BYTES {
                    return Err(format!(
                        "decoded size exceeds limit of {} bytes",
                        Self::MAX_DECODED_BYTES
                    ));
                }
                Ok(decoded)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
