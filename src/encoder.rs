//! Serialising [`FormData`] into a `multipart/form-data` body.

use crate::boundary::{BoundaryGenerator, RandomBoundary};
use crate::escape::{escape_name, normalize_line_breaks};
use crate::form_data::{FormData, FormValue};
use crate::source::ReaderSource;
use log::debug;
use std::io::Cursor;

const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// A fully framed multipart body
#[derive(Debug, Clone)]
pub struct EncodedForm {
    pub boundary: String,
    /// `multipart/form-data; boundary=<boundary>`
    pub content_type: String,
    pub content_length: usize,
    pub buffer: Vec<u8>,
}

impl EncodedForm {
    /// Single-pass reader over the body
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.buffer)
    }

    /// The body as a source that ends cleanly after `content_length` bytes
    pub fn into_source(self, chunk_size: usize) -> ReaderSource<Cursor<Vec<u8>>> {
        let len = self.content_length as u64;
        ReaderSource::with_chunk_size(self.into_reader(), chunk_size).expect_length(len)
    }
}

pub struct Encoder<G = RandomBoundary> {
    boundary: G,
    close_delimiter: bool,
}

impl Default for Encoder<RandomBoundary> {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<RandomBoundary> {
    pub fn new() -> Self {
        Self::with_boundary(RandomBoundary)
    }
}

impl<G: BoundaryGenerator> Encoder<G> {
    pub fn with_boundary(boundary: G) -> Self {
        Self {
            boundary,
            close_delimiter: true,
        }
    }

    /// Emit only the per-part framing, without the trailing `--boundary--` line
    pub fn without_close_delimiter(mut self) -> Self {
        self.close_delimiter = false;
        self
    }

    pub fn encode(&self, form: &FormData) -> EncodedForm {
        let boundary = self.boundary.generate();
        let prefix = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"");
        let mut buffer = Vec::new();

        for (name, value) in form.iter() {
            buffer.extend_from_slice(prefix.as_bytes());
            buffer.extend_from_slice(escape_name(name, false).as_bytes());

            match value {
                FormValue::Text(text) => {
                    buffer.extend_from_slice(b"\"\r\n\r\n");
                    buffer.extend_from_slice(normalize_line_breaks(text).as_bytes());
                }
                FormValue::File(file) => {
                    let content_type = if file.content_type.is_empty() {
                        DEFAULT_FILE_CONTENT_TYPE
                    } else {
                        file.content_type.as_str()
                    };
                    buffer.extend_from_slice(
                        format!(
                            "\"; filename=\"{}\"\r\nContent-Type: {content_type}\r\n\r\n",
                            escape_name(&file.name, true)
                        )
                        .as_bytes(),
                    );
                    buffer.extend_from_slice(&file.content);
                }
            }
            buffer.extend_from_slice(b"\r\n");
        }

        if self.close_delimiter {
            buffer.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        }

        debug!(
            "Encoded {} form entries into {} bytes",
            form.len(),
            buffer.len()
        );

        EncodedForm {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            content_length: buffer.len(),
            boundary,
            buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{BOUNDARY_PREFIX, FixedBoundary};
    use crate::form_data::FormFile;
    use std::io::Read;

    fn fixed() -> Encoder<FixedBoundary> {
        Encoder::with_boundary(FixedBoundary("XyZ".to_string()))
    }

    #[test]
    fn test_single_text_entry() {
        let mut form = FormData::new();
        form.append_text("field", "hello");

        let encoded = fixed().without_close_delimiter().encode(&form);
        assert_eq!(
            encoded.buffer,
            b"--XyZ\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nhello\r\n"
        );
        assert_eq!(encoded.content_type, "multipart/form-data; boundary=XyZ");
        assert_eq!(encoded.content_length, encoded.buffer.len());
    }

    #[test]
    fn test_close_delimiter_by_default() {
        let mut form = FormData::new();
        form.append_text("a", "1");

        let encoded = fixed().encode(&form);
        assert!(encoded.buffer.ends_with(b"\r\n1\r\n--XyZ--\r\n"));
    }

    #[test]
    fn test_text_line_breaks_are_normalized() {
        let mut form = FormData::new();
        form.append_text("t", "a\nb\rc\r\nd");

        let encoded = fixed().without_close_delimiter().encode(&form);
        let body = String::from_utf8(encoded.buffer).unwrap();
        assert!(body.ends_with("\r\n\r\na\r\nb\r\nc\r\nd\r\n"));
    }

    #[test]
    fn test_file_entry() {
        let mut form = FormData::new();
        form.append_file(
            "up\"load",
            FormFile::new("a\nb.bin", "", vec![b'\n', 0xff, b'\r']),
        );

        let encoded = fixed().without_close_delimiter().encode(&form);
        let mut expected = b"--XyZ\r\nContent-Disposition: form-data; name=\"up%22load\"; \
            filename=\"a%0Ab.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            .to_vec();
        expected.extend_from_slice(&[b'\n', 0xff, b'\r']);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(encoded.buffer, expected);
    }

    #[test]
    fn test_file_keeps_declared_type() {
        let mut form = FormData::new();
        form.append_file("f", FormFile::new("x.png", "image/png", vec![1, 2]));

        let encoded = fixed().encode(&form);
        let body = String::from_utf8_lossy(&encoded.buffer);
        assert!(body.contains("Content-Type: image/png\r\n\r\n"));
    }

    #[test]
    fn test_entries_in_order() {
        let form: FormData = vec![("b", "2"), ("a", "1"), ("b", "3")].into_iter().collect();
        let encoded = fixed().encode(&form);
        let body = String::from_utf8(encoded.buffer).unwrap();

        let first = body.find("name=\"b\"\r\n\r\n2").unwrap();
        let second = body.find("name=\"a\"\r\n\r\n1").unwrap();
        let third = body.find("name=\"b\"\r\n\r\n3").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_random_boundary_in_content_type() {
        let encoded = Encoder::new().encode(&FormData::new());
        assert!(encoded.boundary.starts_with(BOUNDARY_PREFIX));
        assert_eq!(
            encoded.content_type,
            format!("multipart/form-data; boundary={}", encoded.boundary)
        );
    }

    #[test]
    fn test_reader_view() {
        let mut form = FormData::new();
        form.append_text("a", "1");
        let encoded = fixed().encode(&form);
        let expected = encoded.buffer.clone();

        let mut read_back = Vec::new();
        encoded.into_reader().read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, expected);
    }
}
