//! Transport decoding of artifact payloads.
//!
//! Results files carry attachments as standard (padded) base64. Decoding
//! happens once, before the bytes reach the content store.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use testlog_error::{ErrorCategory, IngestError};
use testlog_schema::result::ArtifactPayload;

/// Encodes bytes to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes a base64 string to bytes
pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded)
}

/// Decode one artifact of `test`.
///
/// A malformed payload is a hard failure of the whole batch, so the error
/// carries enough context to find the offending record.
pub fn decode_payload(test: &str, payload: &ArtifactPayload) -> testlog_error::Result<Vec<u8>> {
    decode(payload.base64.trim()).map_err(|err| {
        IngestError::with_source(
            "artifact payload is not valid base64",
            ErrorCategory::Decode,
            err,
        )
        .with_context("test", test)
        .with_context("artifact", payload.name.clone())
    })
}
