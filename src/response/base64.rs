//! Base64 encoding and decoding utilities

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 string to binary data.
///
/// Accepts both raw base64 and data-URL form ("data:image/png;base64,...").
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let data = if encoded.contains(',') {
        encoded.split(',').last().unwrap_or(encoded)
    } else {
        encoded
    };

    STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::InvalidRequest(format!("Invalid base64 image data: {}", e)))
}

/// Check if a string is decodable base64 (raw or data-URL)
pub fn is_valid(data: &str) -> bool {
    decode(data).is_ok()
}
