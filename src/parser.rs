//! Entry points tying boundary resolution, ingestion, and encoding together.
//!
//! # Example
//! ```rust
//! use ironform::parser::{form_data_to_stream, stream_to_form_data};
//! use ironform::{DecoderConfig, FormData};
//!
//! let mut form = FormData::new();
//! form.append_text("greeting", "hello");
//!
//! let encoded = form_data_to_stream(&form);
//! let content_type = encoded.content_type.clone();
//! let mut source = encoded.into_source(16);
//!
//! let decoded = stream_to_form_data(&mut source, &content_type, &DecoderConfig::default()).unwrap();
//! assert_eq!(decoded.form_data, form);
//! ```

use crate::body::{DecoderConfig, assemble, ingest};
use crate::boundary::resolve_boundary;
use crate::encoder::{EncodedForm, Encoder};
use crate::error::FormDataError;
use crate::form_data::FormData;
use crate::multipart::{MultipartReader, PartDecoder};
use crate::source::BodySource;
use log::debug;

/// Result of a successful decode
#[derive(Debug, Clone)]
pub struct DecodedBody {
    pub form_data: FormData,
    /// The raw body exactly as received
    pub buffer: Vec<u8>,
}

/// Decode a streamed `multipart/form-data` body.
///
/// Fails before reading anything when `content_type` is not multipart or has
/// no boundary. Either every entry is returned or an error is; a body that
/// stops early never yields a partial collection.
pub fn stream_to_form_data<S>(
    source: &mut S,
    content_type: &str,
    config: &DecoderConfig,
) -> Result<DecodedBody, FormDataError>
where
    S: BodySource + ?Sized,
{
    let boundary = resolve_boundary(content_type)?;
    debug!("Decoding multipart body with boundary '{boundary}'");

    let reader = MultipartReader::new(&boundary, config.multipart.clone())?;
    stream_to_form_data_with(source, reader, config)
}

/// Decode a body with a caller-supplied decoder already bound to its boundary
pub fn stream_to_form_data_with<S, D>(
    source: &mut S,
    mut decoder: D,
    config: &DecoderConfig,
) -> Result<DecodedBody, FormDataError>
where
    S: BodySource + ?Sized,
    D: PartDecoder,
{
    let ingested = ingest(source, &mut decoder, config)?;
    let buffer = assemble(&ingested.chunks, ingested.total)?;
    let form_data = decoder.finish()?;

    Ok(DecodedBody { form_data, buffer })
}

/// Encode `form` with a freshly generated boundary
pub fn form_data_to_stream(form: &FormData) -> EncodedForm {
    Encoder::new().encode(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Completion, chunks};

    const BODY: &str = "--b\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n1\r\n--b--\r\n";

    #[test]
    fn test_decode_from_text_chunks() {
        let mut source = chunks(vec![&BODY[..10], &BODY[10..30], &BODY[30..]]);
        let decoded = stream_to_form_data(
            &mut source,
            "multipart/form-data; boundary=b",
            &DecoderConfig::default(),
        )
        .unwrap();

        assert_eq!(decoded.form_data.get("x").unwrap().as_text(), Some("1"));
        assert_eq!(decoded.buffer, BODY.as_bytes());
    }

    #[test]
    fn test_header_checked_before_reading() {
        let mut source = chunks(vec![BODY]);
        let err = stream_to_form_data(&mut source, "text/plain", &DecoderConfig::default())
            .unwrap_err();
        assert!(matches!(err, FormDataError::InvalidContentType(_)));
        assert_eq!(source.completion(), Completion::Unknown);

        let err = stream_to_form_data(
            &mut source,
            "multipart/form-data",
            &DecoderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FormDataError::MissingBoundary));
    }

    #[test]
    fn test_premature_close_discards_entries() {
        let mut source = chunks(vec![BODY]).with_completion(Completion::Aborted);
        let err = stream_to_form_data(
            &mut source,
            "multipart/form-data; boundary=b",
            &DecoderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FormDataError::PrematureClose));
    }
}
