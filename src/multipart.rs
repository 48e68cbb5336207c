//! RFC 7578 multipart/form-data reader
//!
//! [`MultipartReader`] is fed raw body bytes through [`PartDecoder::write`] as
//! they arrive and parses every part as soon as its closing delimiter has been
//! seen. [`PartDecoder::finish`] hands back the collected [`FormData`] once the
//! close delimiter (`--boundary--`) was reached.
//!
//! # Security Features
//! - Boundary validation
//! - Maximum part size and part count limits
//! - Maximum header block size
//! - Field name and filename length limits
//!
//! # Example
//! ```rust
//! use ironform::multipart::{MultipartConfig, MultipartReader, PartDecoder};
//!
//! fn parse() -> Result<(), ironform::error::FormDataError> {
//!     let mut reader = MultipartReader::new("xyz", MultipartConfig::default())?;
//!     reader.write(b"--xyz\r\nContent-Disposition: form-data; name=\"greeting\"\r\n\r\n")?;
//!     reader.write(b"hello\r\n--xyz--\r\n")?;
//!     let form = reader.finish()?;
//!     assert_eq!(form.get("greeting").and_then(|v| v.as_text()), Some("hello"));
//!     Ok(())
//! }
//! # parse().unwrap();
//! ```

use crate::error::FormDataError;
use crate::escape::unescape_name;
use crate::form_data::{FormData, FormFile, FormValue};
use log::{debug, trace};

/// Default limits for multipart parsing security
const DEFAULT_MAX_PARTS: usize = 1000;
const DEFAULT_MAX_PART_SIZE: u64 = 1024 * 1024 * 1024; // 1GB per part
const DEFAULT_MAX_FILENAME_LENGTH: usize = 255;
const DEFAULT_MAX_FIELD_NAME_LENGTH: usize = 1024;
const DEFAULT_MAX_HEADERS_SIZE: usize = 8 * 1024; // 8KB for part headers
/// RFC 2046 limit for boundaries this crate generates
pub const MAX_BOUNDARY_LENGTH: usize = 70;

/// Configuration for multipart parsing with security limits
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Maximum number of parts allowed
    pub max_parts: usize,
    /// Maximum size per part in bytes
    pub max_part_size: u64,
    /// Maximum filename length
    pub max_filename_length: usize,
    /// Maximum field name length
    pub max_field_name_length: usize,
    /// Maximum size for part headers
    pub max_headers_size: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_parts: DEFAULT_MAX_PARTS,
            max_part_size: DEFAULT_MAX_PART_SIZE,
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
            max_field_name_length: DEFAULT_MAX_FIELD_NAME_LENGTH,
            max_headers_size: DEFAULT_MAX_HEADERS_SIZE,
        }
    }
}

/// Incremental consumer of a multipart body.
///
/// `write` receives chunks in body order and may fail as soon as the bytes
/// seen so far are malformed. `finish` is called exactly once, after the
/// source is known to have completed.
pub trait PartDecoder {
    fn write(&mut self, chunk: &[u8]) -> Result<(), FormDataError>;

    fn finish(self) -> Result<FormData, FormDataError>
    where
        Self: Sized;
}

/// Represents the Content-Disposition header of a multipart part
#[derive(Debug, Clone)]
pub struct ContentDisposition {
    /// The disposition type (usually "form-data")
    pub disposition_type: String,
    /// The name of the form field
    pub name: String,
    /// Optional filename for file uploads
    pub filename: Option<String>,
}

/// Represents the headers of a multipart part
#[derive(Debug, Clone, Default)]
pub struct PartHeaders {
    /// Content-Disposition header (required for form-data)
    pub disposition: Option<ContentDisposition>,
    /// Content-Type header
    pub content_type: Option<String>,
}

impl PartHeaders {
    /// Parse part headers from a string
    pub fn parse(headers_str: &str, config: &MultipartConfig) -> Result<Self, FormDataError> {
        if headers_str.len() > config.max_headers_size {
            return Err(FormDataError::part_parse(format!(
                "Part headers too large: {} bytes",
                headers_str.len()
            )));
        }

        let mut disposition = None;
        let mut content_type = None;

        for line in headers_str.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim().to_lowercase();
                let value = value.trim();

                match name.as_str() {
                    "content-disposition" => {
                        disposition = Some(Self::parse_content_disposition(value, config)?);
                    }
                    "content-type" => {
                        content_type = Some(value.to_string());
                    }
                    _ => {}
                }
            } else {
                return Err(FormDataError::part_parse(format!(
                    "Invalid header format: {line}"
                )));
            }
        }

        Ok(Self {
            disposition,
            content_type,
        })
    }

    /// Parse the Content-Disposition header
    pub fn parse_content_disposition(
        value: &str,
        config: &MultipartConfig,
    ) -> Result<ContentDisposition, FormDataError> {
        let parts = split_parameters(value);

        let Some(first) = parts.first() else {
            return Err(FormDataError::part_parse(
                "Empty Content-Disposition header",
            ));
        };

        let disposition_type = first.to_lowercase();
        let mut name = None;
        let mut filename = None;

        for part in parts.iter().skip(1) {
            if let Some((key, val)) = part.split_once('=') {
                let key = key.trim().to_lowercase();
                let mut val = val.trim();

                // Remove quotes if present
                if val.starts_with('"') && val.ends_with('"') && val.len() > 1 {
                    val = &val[1..val.len() - 1];
                }

                match key.as_str() {
                    "name" => {
                        let unescaped = unescape_name(val);
                        if unescaped.len() > config.max_field_name_length {
                            return Err(FormDataError::part_parse(format!(
                                "Field name too long: {} characters",
                                unescaped.len()
                            )));
                        }
                        name = Some(unescaped);
                    }
                    "filename" => {
                        let unescaped = unescape_name(val);
                        if unescaped.len() > config.max_filename_length {
                            return Err(FormDataError::part_parse(format!(
                                "Filename too long: {} characters",
                                unescaped.len()
                            )));
                        }
                        filename = Some(unescaped);
                    }
                    _ => {}
                }
            }
        }

        let Some(name) = name else {
            return Err(FormDataError::part_parse(
                "Missing 'name' in Content-Disposition",
            ));
        };

        Ok(ContentDisposition {
            disposition_type,
            name,
            filename,
        })
    }
}

/// Split a header value on `;`, ignoring separators inside quoted strings
fn split_parameters(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Check that `boundary` can frame a body: non-empty and free of line breaks.
/// Any length is accepted so that bodies from lenient senders still decode.
pub fn validate_boundary(boundary: &str) -> Result<(), FormDataError> {
    if boundary.is_empty() {
        return Err(FormDataError::invalid_boundary("Boundary is empty"));
    }

    if boundary.contains('\r') || boundary.contains('\n') {
        return Err(FormDataError::invalid_boundary("Boundary contains line breaks"));
    }

    Ok(())
}

/// [`validate_boundary`] plus the RFC 2046 length cap, for boundaries we emit
pub fn validate_outgoing_boundary(boundary: &str) -> Result<(), FormDataError> {
    validate_boundary(boundary)?;

    if boundary.len() > MAX_BOUNDARY_LENGTH {
        return Err(FormDataError::invalid_boundary(format!(
            "Boundary too long: {} characters, maximum {MAX_BOUNDARY_LENGTH}",
            boundary.len()
        )));
    }

    Ok(())
}

#[derive(Debug)]
enum ReaderState {
    /// Before the first delimiter line
    Preamble,
    /// Right after a delimiter line, expecting part headers
    Headers,
    /// Inside a part body
    Body(PendingPart),
    /// Close delimiter seen; remaining bytes are epilogue
    Done,
}

/// What follows `--boundary` in the buffer
#[derive(Debug, Clone, Copy)]
enum DelimiterLine {
    /// `--boundary--`
    Close,
    /// Delimiter line ending at the given offset
    Next(usize),
    /// Not enough bytes buffered to decide
    Incomplete,
    /// The boundary text is followed by other content
    NotDelimiter,
}

#[derive(Debug)]
struct PendingPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
}

/// Incremental, binary-safe multipart/form-data reader
#[derive(Debug)]
pub struct MultipartReader {
    delimiter: Vec<u8>,
    config: MultipartConfig,
    state: ReaderState,
    buffer: Vec<u8>,
    /// Offset in `buffer` before which no delimiter can start
    scan_from: usize,
    /// Part of the preamble was dropped, so offset 0 is no longer the body start
    preamble_discarded: bool,
    form: FormData,
    bytes_written: u64,
}

impl MultipartReader {
    /// Create a reader bound to `boundary`
    pub fn new(boundary: &str, config: MultipartConfig) -> Result<Self, FormDataError> {
        validate_boundary(boundary)?;

        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Ok(Self {
            delimiter,
            config,
            state: ReaderState::Preamble,
            buffer: Vec::new(),
            scan_from: 0,
            preamble_discarded: false,
            form: FormData::new(),
            bytes_written: 0,
        })
    }

    /// Create reader with default configuration
    pub fn with_default_config(boundary: &str) -> Result<Self, FormDataError> {
        Self::new(boundary, MultipartConfig::default())
    }

    /// Number of entries parsed so far
    pub fn parts_parsed(&self) -> usize {
        self.form.len()
    }

    /// Whether the close delimiter has been seen
    pub fn is_complete(&self) -> bool {
        matches!(self.state, ReaderState::Done)
    }

    /// Run the state machine until it needs more input
    fn advance(&mut self) -> Result<(), FormDataError> {
        loop {
            let progressed = match self.state {
                ReaderState::Preamble => self.skip_preamble()?,
                ReaderState::Headers => self.read_headers()?,
                ReaderState::Body(_) => self.read_body()?,
                ReaderState::Done => {
                    self.buffer.clear();
                    false
                }
            };
            if !progressed {
                return Ok(());
            }
        }
    }

    fn consume(&mut self, len: usize) {
        self.buffer.drain(..len);
        self.scan_from = 0;
    }

    /// `\n--boundary`, the anchor every delimiter line is searched by
    fn lf_delimiter(&self) -> Vec<u8> {
        let mut pattern = Vec::with_capacity(self.delimiter.len() + 1);
        pattern.push(b'\n');
        pattern.extend_from_slice(&self.delimiter);
        pattern
    }

    /// Classify what follows `--boundary` at `after`
    fn delimiter_line(&self, after: usize) -> DelimiterLine {
        let rest = &self.buffer[after..];
        if rest.len() < 2 {
            return DelimiterLine::Incomplete;
        }
        if rest.starts_with(b"--") {
            return DelimiterLine::Close;
        }
        // Only linear whitespace may pad a delimiter before its line break
        for (i, &b) in rest.iter().enumerate() {
            match b {
                b' ' | b'\t' => continue,
                b'\n' => return DelimiterLine::Next(after + i + 1),
                b'\r' => {
                    return match rest.get(i + 1) {
                        Some(b'\n') => DelimiterLine::Next(after + i + 2),
                        Some(_) => DelimiterLine::NotDelimiter,
                        None => DelimiterLine::Incomplete,
                    };
                }
                _ => return DelimiterLine::NotDelimiter,
            }
        }
        DelimiterLine::Incomplete
    }

    fn skip_preamble(&mut self) -> Result<bool, FormDataError> {
        let lf_delimiter = self.lf_delimiter();
        // The very first delimiter may open the body without a leading line break
        let mut candidate = (!self.preamble_discarded
            && self.buffer.starts_with(&self.delimiter))
        .then_some(0);

        let mut from = self.scan_from;
        loop {
            let start = match candidate.take() {
                Some(start) => start,
                None => match find_bytes_pattern(&self.buffer, &lf_delimiter, from) {
                    Some(pos) => {
                        from = pos + 1;
                        pos + 1
                    }
                    None => break,
                },
            };

            match self.delimiter_line(start + self.delimiter.len()) {
                DelimiterLine::Close => {
                    trace!("Multipart body closes before its first part");
                    self.state = ReaderState::Done;
                    self.buffer.clear();
                    return Ok(true);
                }
                DelimiterLine::Next(line_end) => {
                    trace!("Found first multipart delimiter at byte {start}");
                    self.state = ReaderState::Headers;
                    self.consume(line_end);
                    return Ok(true);
                }
                DelimiterLine::Incomplete => {
                    self.scan_from = start.saturating_sub(1);
                    return Ok(false);
                }
                DelimiterLine::NotDelimiter => continue,
            }
        }

        // Keep enough tail to recognise a delimiter split across writes
        let keep = lf_delimiter.len();
        if self.buffer.len() > keep {
            let discard = self.buffer.len() - keep;
            self.consume(discard);
            self.preamble_discarded = true;
        }
        Ok(false)
    }

    fn read_headers(&mut self) -> Result<bool, FormDataError> {
        // A part without any header line starts with the blank line itself
        let (headers_end, content_start) = if self.buffer.starts_with(b"\r\n") {
            (0, 2)
        } else if self.buffer.starts_with(b"\n") {
            (0, 1)
        } else {
            let crlf = find_bytes_pattern(&self.buffer, b"\r\n\r\n", 0);
            let lf = find_bytes_pattern(&self.buffer, b"\n\n", 0);
            match (crlf, lf) {
                (Some(c), Some(l)) if l < c => (l, l + 2),
                (Some(c), _) => (c, c + 4),
                (None, Some(l)) => (l, l + 2),
                (None, None) => {
                    if self.buffer.len() > self.config.max_headers_size {
                        return Err(FormDataError::part_parse("Part headers too large"));
                    }
                    return Ok(false);
                }
            }
        };

        if self.form.len() >= self.config.max_parts {
            return Err(FormDataError::part_parse(format!(
                "Too many parts: maximum {} allowed",
                self.config.max_parts
            )));
        }

        let headers_str = String::from_utf8_lossy(&self.buffer[..headers_end]).to_string();
        let headers = PartHeaders::parse(&headers_str, &self.config)?;
        let disposition = headers.disposition.ok_or_else(|| {
            FormDataError::part_parse("Missing Content-Disposition header in part")
        })?;

        self.state = ReaderState::Body(PendingPart {
            name: disposition.name,
            filename: disposition.filename,
            content_type: headers.content_type,
        });
        self.consume(content_start);
        Ok(true)
    }

    fn read_body(&mut self) -> Result<bool, FormDataError> {
        let lf_delimiter = self.lf_delimiter();
        let mut from = self.scan_from;

        loop {
            let Some(pos) = find_bytes_pattern(&self.buffer, &lf_delimiter, from) else {
                if self.buffer.len() as u64 > self.config.max_part_size + lf_delimiter.len() as u64 {
                    return Err(FormDataError::payload_too_large(self.config.max_part_size));
                }
                self.scan_from = self.buffer.len().saturating_sub(lf_delimiter.len() - 1);
                return Ok(false);
            };

            // CRLF belongs to the delimiter, not to the content
            let content_end = if pos > 0 && self.buffer[pos - 1] == b'\r' {
                pos - 1
            } else {
                pos
            };

            if content_end as u64 > self.config.max_part_size {
                return Err(FormDataError::payload_too_large(self.config.max_part_size));
            }

            let line = self.delimiter_line(pos + lf_delimiter.len());
            let next_state = match line {
                DelimiterLine::NotDelimiter => {
                    from = pos + 1;
                    continue;
                }
                DelimiterLine::Incomplete => {
                    self.scan_from = pos;
                    return Ok(false);
                }
                DelimiterLine::Close => ReaderState::Done,
                DelimiterLine::Next(_) => ReaderState::Headers,
            };

            let content = self.buffer[..content_end].to_vec();
            let ReaderState::Body(pending) = std::mem::replace(&mut self.state, next_state) else {
                return Err(FormDataError::part_parse("Part body ended outside of a part"));
            };
            self.push_part(pending, content)?;

            match line {
                DelimiterLine::Next(line_end) => self.consume(line_end),
                _ => self.buffer.clear(),
            }
            return Ok(true);
        }
    }

    fn push_part(&mut self, pending: PendingPart, content: Vec<u8>) -> Result<(), FormDataError> {
        let value = match pending.filename {
            Some(filename) => FormValue::File(FormFile::new(
                filename,
                pending.content_type.unwrap_or_default(),
                content,
            )),
            None => FormValue::Text(
                String::from_utf8(content)
                    .map_err(|_| FormDataError::part_parse("Part contains invalid UTF-8"))?,
            ),
        };
        trace!(
            "Parsed part '{}' ({})",
            pending.name,
            if value.is_file() { "file" } else { "text" }
        );
        self.form.append(pending.name, value);
        Ok(())
    }
}

impl PartDecoder for MultipartReader {
    fn write(&mut self, chunk: &[u8]) -> Result<(), FormDataError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.bytes_written += chunk.len() as u64;
        if matches!(self.state, ReaderState::Done) {
            return Ok(());
        }
        self.buffer.extend_from_slice(chunk);
        self.advance()
    }

    fn finish(self) -> Result<FormData, FormDataError> {
        match self.state {
            ReaderState::Done => {
                debug!(
                    "Multipart body complete: {} entries from {} bytes",
                    self.form.len(),
                    self.bytes_written
                );
                Ok(self.form)
            }
            ReaderState::Preamble if self.bytes_written == 0 => Ok(self.form),
            ReaderState::Preamble => Err(FormDataError::part_parse(
                "No boundary found in multipart data",
            )),
            ReaderState::Headers | ReaderState::Body(_) => Err(FormDataError::part_parse(
                "Unexpected end of multipart body: missing closing boundary",
            )),
        }
    }
}

/// Binary pattern search - find needle in haystack starting at `from`
fn find_bytes_pattern(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() || from > haystack.len() - needle.len() {
        return None;
    }

    (from..=(haystack.len() - needle.len())).find(|&i| haystack[i..i + needle.len()] == *needle)
}
