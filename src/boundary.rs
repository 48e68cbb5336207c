//! Multipart boundary handling: extraction from a `Content-Type` header for
//! decoding and generation of fresh boundaries for encoding.

use crate::error::FormDataError;

/// Literal prefix of every generated boundary
pub const BOUNDARY_PREFIX: &str = "----IronFormBoundary";

const BOUNDARY_PARAM: &str = "boundary=";
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Extract the boundary token from a `Content-Type` header value.
///
/// The header must mention `multipart` (any case) and carry a `boundary=`
/// parameter. A quoted value (`boundary="a b;c"`) is taken up to the closing
/// quote; a bare value runs until the next `;`. When both shapes could match
/// at the same position the quoted one wins.
pub fn resolve_boundary(content_type: &str) -> Result<String, FormDataError> {
    // ASCII lowercasing keeps byte offsets aligned with the original string
    let lowered = content_type.to_ascii_lowercase();

    if !lowered.contains("multipart") {
        return Err(FormDataError::invalid_content_type(content_type));
    }

    let mut search_from = 0;
    while let Some(found) = lowered[search_from..].find(BOUNDARY_PARAM) {
        let value_start = search_from + found + BOUNDARY_PARAM.len();
        let value = &content_type[value_start..];

        if let Some(quoted) = quoted_value(value) {
            return Ok(quoted.to_string());
        }

        let bare = value.split(';').next().unwrap_or("");
        if !bare.is_empty() {
            return Ok(bare.to_string());
        }

        search_from = value_start;
    }

    Err(FormDataError::MissingBoundary)
}

/// `"..."` with at least one character between the quotes
fn quoted_value(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('"')?;
    let end = inner.find('"')?;
    if end == 0 { None } else { Some(&inner[..end]) }
}

/// Source of boundaries for the encoder.
///
/// Implementations must return tokens that are vanishingly unlikely to appear
/// inside encoded content; they are not required to be cryptographically random.
pub trait BoundaryGenerator {
    fn generate(&self) -> String;
}

/// Default generator: [`BOUNDARY_PREFIX`] followed by a random base-36 suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBoundary;

impl BoundaryGenerator for RandomBoundary {
    fn generate(&self) -> String {
        format!("{BOUNDARY_PREFIX}{}", to_base36(fastrand::u64(..)))
    }
}

/// Always returns the same boundary. Useful for reproducible output.
#[derive(Debug, Clone)]
pub struct FixedBoundary(pub String);

impl BoundaryGenerator for FixedBoundary {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

impl<F: Fn() -> String> BoundaryGenerator for F {
    fn generate(&self) -> String {
        self()
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
