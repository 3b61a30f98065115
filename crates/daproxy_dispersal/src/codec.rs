//! Blob codec.
//!
//! Payloads are laid out as 32-byte field elements whose high byte is always
//! zero, so every element is a valid scalar for the network's commitment
//! scheme:
//!
//! ```text
//! element 0:    [0x00, version, len (u32 BE), 0x00 * 26]
//! element 1..n: [0x00, 31 payload bytes (last one zero padded)]
//! ```

use daproxy_storage::{StoreError, StoreResult};
use thiserror::Error;

/// Current codec version.
pub const CODEC_VERSION: u8 = 0;

/// Size of one encoded field element.
pub const ELEMENT_SIZE: usize = 32;

/// Payload bytes carried by one field element.
pub const ELEMENT_PAYLOAD: usize = ELEMENT_SIZE - 1;

/// Errors raised while decoding a blob.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Encoded length is not a whole number of elements.
    #[error("encoded blob length {0} is not a multiple of {ELEMENT_SIZE}")]
    Misaligned(usize),

    /// Unknown codec version byte.
    #[error("unsupported codec version {0}")]
    UnsupportedVersion(u8),

    /// An element's high byte is set.
    #[error("element {0} is not a valid field element")]
    InvalidElement(usize),

    /// The header claims more bytes than the blob carries.
    #[error("header claims {claimed} bytes but blob carries {available}")]
    Truncated {
        /// Length from the header.
        claimed: usize,
        /// Payload bytes present.
        available: usize,
    },
}

/// Length of the encoding of a `payload_len`-byte payload.
#[must_use]
pub fn encoded_len(payload_len: usize) -> usize {
    ELEMENT_SIZE + payload_len.div_ceil(ELEMENT_PAYLOAD) * ELEMENT_SIZE
}

/// Encodes a payload.
///
/// Payloads longer than `u32::MAX` bytes saturate the length header; stores
/// reject them earlier through their size limit.
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(payload.len()));

    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    out.push(0x00);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_be_bytes());
    out.resize(ELEMENT_SIZE, 0);

    for chunk in payload.chunks(ELEMENT_PAYLOAD) {
        out.push(0x00);
        out.extend_from_slice(chunk);
        out.resize(out.len() + ELEMENT_PAYLOAD - chunk.len(), 0);
    }
    out
}

/// Encodes a payload, rejecting it if the encoding exceeds `max_encoded`.
///
/// # Errors
///
/// Returns [`StoreError::OversizedBlob`] carrying the encoded size.
pub fn encode_bounded(payload: &[u8], max_encoded: usize) -> StoreResult<Vec<u8>> {
    let size = encoded_len(payload.len());
    if size > max_encoded {
        return Err(StoreError::OversizedBlob {
            size,
            max: max_encoded,
        });
    }
    Ok(encode(payload))
}

/// Decodes a blob produced by [`encode`].
///
/// # Errors
///
/// Returns an error if the blob is misaligned, carries another version, has
/// an invalid element, or is shorter than its header claims.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
    if encoded.len() < ELEMENT_SIZE || encoded.len() % ELEMENT_SIZE != 0 {
        return Err(CodecError::Misaligned(encoded.len()));
    }

    let (header, body) = encoded.split_at(ELEMENT_SIZE);
    if header[0] != 0 {
        return Err(CodecError::InvalidElement(0));
    }
    if header[1] != CODEC_VERSION {
        return Err(CodecError::UnsupportedVersion(header[1]));
    }
    let claimed = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;

    let mut payload = Vec::with_capacity(body.len() / ELEMENT_SIZE * ELEMENT_PAYLOAD);
    for (i, element) in body.chunks(ELEMENT_SIZE).enumerate() {
        if element[0] != 0 {
            return Err(CodecError::InvalidElement(i + 1));
        }
        payload.extend_from_slice(&element[1..]);
    }

    if claimed > payload.len() {
        return Err(CodecError::Truncated {
            claimed,
            available: payload.len(),
        });
    }
    payload.truncate(claimed);
    Ok(payload)
}
