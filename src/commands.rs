//! Implementations of the `decode` and `encode` subcommands.

use crate::boundary::FixedBoundary;
use crate::cli::EncodeEntry;
use crate::config::Config;
use crate::encoder::{EncodedForm, Encoder};
use crate::error::FormDataError;
use crate::form_data::{FormData, FormFile, FormValue};
use crate::parser::stream_to_form_data;
use crate::source::ReaderSource;
use log::info;
use std::io::{Read, Write};
use std::path::Path;

/// Decode the body read from `input` and print one line per entry to `out`.
/// Returns the number of entries.
pub fn decode<R: Read, W: Write>(
    input: R,
    content_type: &str,
    content_length: Option<u64>,
    config: &Config,
    out: &mut W,
) -> Result<usize, FormDataError> {
    let mut source = ReaderSource::with_chunk_size(input, config.chunk_size);
    if let Some(len) = content_length {
        source = source.expect_length(len);
    }

    let decoded = stream_to_form_data(&mut source, content_type, &config.decoder_config())?;
    info!(
        "Decoded {} entries from {} bytes",
        decoded.form_data.len(),
        decoded.buffer.len()
    );

    for (name, value) in decoded.form_data.iter() {
        writeln!(out, "{}", describe_entry(name, value))?;
    }
    Ok(decoded.form_data.len())
}

fn describe_entry(name: &str, value: &FormValue) -> String {
    match value {
        FormValue::Text(text) => format!("{}: {}", name.escape_debug(), text.escape_debug()),
        FormValue::File(file) => format!(
            "{}: <file \"{}\" {} {} bytes>",
            name.escape_debug(),
            file.name.escape_debug(),
            if file.content_type.is_empty() {
                "(no type)"
            } else {
                file.content_type.as_str()
            },
            file.size()
        ),
    }
}

/// Build a form from command-line entries, keeping their order
pub fn build_form(entries: &[EncodeEntry]) -> Result<FormData, FormDataError> {
    let mut form = FormData::new();
    for entry in entries {
        match entry {
            EncodeEntry::Field(name, value) => form.append_text(name.as_str(), value.as_str()),
            EncodeEntry::File(file) => {
                let content = std::fs::read(&file.path)?;
                let filename = file
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let content_type = file.content_type.clone().unwrap_or_default();
                form.append_file(file.name.as_str(), FormFile::new(filename, content_type, content));
            }
        }
    }
    Ok(form)
}

/// Encode `form`, write the body to `out` and return the encoded form
pub fn encode<W: Write>(
    form: &FormData,
    boundary: Option<&str>,
    out: &mut W,
) -> Result<EncodedForm, FormDataError> {
    let encoded = match boundary {
        Some(boundary) => {
            crate::multipart::validate_outgoing_boundary(boundary)?;
            Encoder::with_boundary(FixedBoundary(boundary.to_string())).encode(form)
        }
        None => Encoder::new().encode(form),
    };

    out.write_all(&encoded.buffer)?;
    out.flush()?;
    info!(
        "Wrote {} bytes with boundary {}",
        encoded.content_length, encoded.boundary
    );
    Ok(encoded)
}

/// Open `path` for reading, or stdin when `None`
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>, FormDataError> {
    Ok(match path {
        Some(path) => Box::new(std::fs::File::open(path)?),
        None => Box::new(std::io::stdin().lock()),
    })
}

/// Create `path` for writing, or stdout when `None`
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, FormDataError> {
    Ok(match path {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::FileSpec;
    use std::io::Cursor;

    #[test]
    fn test_encode_then_decode() {
        let form: FormData = vec![("a", "1"), ("b", "two\nlines")].into_iter().collect();

        let mut body = Vec::new();
        let encoded = encode(&form, Some("cli-boundary"), &mut body).unwrap();
        assert_eq!(body, encoded.buffer);

        let mut listing = Vec::new();
        let count = decode(
            Cursor::new(body),
            &encoded.content_type,
            Some(encoded.content_length as u64),
            &Config::default(),
            &mut listing,
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(listing).unwrap(),
            "a: 1\nb: two\\r\\nlines\n"
        );
    }

    #[test]
    fn test_decode_short_body_is_premature_close() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--b--\r\n";
        let err = decode(
            Cursor::new(body.to_vec()),
            "multipart/form-data; boundary=b",
            Some(body.len() as u64 + 10),
            &Config::default(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FormDataError::PrematureClose));
    }

    #[test]
    fn test_encode_rejects_bad_boundary() {
        let err = encode(&FormData::new(), Some("bad\r\nboundary"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FormDataError::InvalidBoundary(_)));

        let long = "x".repeat(71);
        let err = encode(&FormData::new(), Some(&long), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Boundary too long"));
        assert!(encode(&FormData::new(), Some(&long[..70]), &mut Vec::new()).is_ok());
    }

    #[test]
    fn test_describe_file_entry() {
        let file = FormValue::File(FormFile::new("x.bin", "", vec![0; 3]));
        assert_eq!(
            describe_entry("up", &file),
            "up: <file \"x.bin\" (no type) 3 bytes>"
        );
    }

    #[test]
    fn test_build_form_reads_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let form = build_form(&[
            EncodeEntry::File(FileSpec {
                name: "upload".to_string(),
                path: path.clone(),
                content_type: Some("application/x-test".to_string()),
            }),
            EncodeEntry::Field("title".to_string(), "hi".to_string()),
        ])
        .unwrap();

        let names: Vec<&str> = form.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["upload", "title"]);
        assert_eq!(form.get("title").unwrap().as_text(), Some("hi"));
        let file = form.get("upload").unwrap().as_file().unwrap();
        assert_eq!(file.name, "data.bin");
        assert_eq!(file.content_type, "application/x-test");
        assert_eq!(file.content, vec![1, 2, 3]);
    }
}
