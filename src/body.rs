// SPDX-License-Identifier: MIT

//! Draining a [`BodySource`] into a decoder and reassembling the raw body.

use crate::error::FormDataError;
use crate::multipart::{MultipartConfig, PartDecoder};
use crate::source::{BodySource, Chunk, Completion};
use log::{debug, trace, warn};

/// Settings for a single decode call
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Limits handed to the multipart reader
    pub multipart: MultipartConfig,
    /// Maximum total body size in bytes; `None` accepts any size
    pub max_body_size: Option<u64>,
    /// Treat a source that cannot report its completion state as truncated
    pub strict_completion: bool,
}

/// Chunks collected while draining a source
#[derive(Debug, Default)]
pub struct Ingested {
    pub chunks: Vec<Chunk>,
    /// Sum of all chunk lengths in bytes
    pub total: usize,
}

/// Pull every chunk from `source`, feeding each one to `decoder` before
/// keeping it for [`assemble`].
///
/// Read errors that already carry a [`FormDataError`] are passed on as-is,
/// anything else is reported as [`FormDataError::StreamRead`]. Once the
/// source is drained its completion state decides between success and
/// [`FormDataError::PrematureClose`].
pub fn ingest<S, D>(
    source: &mut S,
    decoder: &mut D,
    config: &DecoderConfig,
) -> Result<Ingested, FormDataError>
where
    S: BodySource + ?Sized,
    D: PartDecoder + ?Sized,
{
    let mut ingested = Ingested::default();

    while let Some(next) = source.next_chunk() {
        let chunk = next.map_err(|e| match FormDataError::from_io(e) {
            Ok(classified) => classified,
            Err(other) => FormDataError::stream_read(other.to_string()),
        })?;

        if let Some(limit) = config.max_body_size {
            if (ingested.total + chunk.len()) as u64 > limit {
                return Err(FormDataError::payload_too_large(limit));
            }
        }

        decoder.write(chunk.as_bytes())?;
        ingested.total += chunk.len();
        trace!(
            "Ingested chunk {} ({} bytes, {} total)",
            ingested.chunks.len(),
            chunk.len(),
            ingested.total
        );
        ingested.chunks.push(chunk);
    }

    match source.completion() {
        Completion::Ended => {}
        Completion::Aborted => return Err(FormDataError::PrematureClose),
        Completion::Unknown if config.strict_completion => {
            return Err(FormDataError::PrematureClose);
        }
        Completion::Unknown => {
            warn!("Body source did not report how it ended; assuming it completed");
        }
    }

    debug!(
        "Read body: {} chunks, {} bytes",
        ingested.chunks.len(),
        ingested.total
    );
    Ok(ingested)
}

/// Concatenate chunks into one contiguous buffer.
///
/// A body whose first chunk is text is joined as text, so any byte chunk in
/// it must be valid UTF-8. A binary body may not contain text chunks.
pub fn assemble(chunks: &[Chunk], total: usize) -> Result<Vec<u8>, FormDataError> {
    match chunks.first() {
        None => Ok(Vec::new()),
        Some(Chunk::Text(_)) => {
            let mut text = String::with_capacity(total);
            for (index, chunk) in chunks.iter().enumerate() {
                match chunk {
                    Chunk::Text(part) => text.push_str(part),
                    Chunk::Bytes(bytes) => {
                        let part = std::str::from_utf8(bytes).map_err(|e| {
                            FormDataError::buffer_construction(format!(
                                "chunk {index} is not valid UTF-8: {e}"
                            ))
                        })?;
                        text.push_str(part);
                    }
                }
            }
            Ok(text.into_bytes())
        }
        Some(Chunk::Bytes(_)) => {
            let mut buffer = Vec::with_capacity(total);
            for (index, chunk) in chunks.iter().enumerate() {
                match chunk {
                    Chunk::Bytes(bytes) => buffer.extend_from_slice(bytes),
                    Chunk::Text(_) => {
                        return Err(FormDataError::buffer_construction(format!(
                            "chunk {index} is text in a binary body"
                        )));
                    }
                }
            }
            Ok(buffer)
        }
    }
}
