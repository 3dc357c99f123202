//! Parse phase: HAR bytes → typed archive.

pub mod types;

pub use types::*;

use crate::error::TranslateError;

/// Deserialize a HAR document. Missing required fields and malformed JSON are
/// both reported as `H001`.
pub fn parse(bytes: &[u8]) -> Result<Har, TranslateError> {
    let har = serde_json::from_slice::<Har>(bytes).map_err(|e| {
        TranslateError::parse("H001", format!("Failed to parse HAR JSON: {}", e))
    })?;
    tracing::debug!(entries = har.log.entries.len(), "parsed HAR archive");
    Ok(har)
}
