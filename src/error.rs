// SPDX-License-Identifier: MIT

use std::fmt;

#[derive(Debug)]
pub enum FormDataError {
    InvalidContentType(String), // Contains the rejected Content-Type value
    MissingBoundary,
    PrematureClose,
    StreamRead(String),         // Contains the underlying read error message
    BufferConstruction(String), // Contains the concatenation failure message
    PartParse(String),          // Contains the parser diagnostic
    PayloadTooLarge(u64),       // Contains the maximum allowed size
    InvalidBoundary(String),    // Contains the reason the boundary was rejected
    Io(std::io::Error),
}

impl fmt::Display for FormDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormDataError::InvalidContentType(_) => write!(
                f,
                "Failed to build FormData object: The \"content-type\" header isn't of type \"multipart/form-data\"."
            ),
            FormDataError::MissingBoundary => write!(
                f,
                "Failed to build FormData object: The \"content-type\" header doesn't contain any multipart boundary."
            ),
            FormDataError::PrematureClose => write!(f, "Premature close of server response."),
            FormDataError::StreamRead(msg) => {
                write!(f, "Failed to read response body. Error: {msg}.")
            }
            FormDataError::BufferConstruction(msg) => {
                write!(f, "Could not create Buffer from response body. Error: {msg}.")
            }
            FormDataError::PartParse(msg) => write!(f, "Invalid multipart body: {msg}"),
            FormDataError::PayloadTooLarge(max_size) => {
                write!(
                    f,
                    "Multipart payload too large. Maximum allowed size: {max_size} bytes"
                )
            }
            FormDataError::InvalidBoundary(reason) => {
                write!(f, "Invalid multipart boundary: {reason}")
            }
            FormDataError::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl From<std::io::Error> for FormDataError {
    fn from(err: std::io::Error) -> Self {
        FormDataError::Io(err)
    }
}

impl std::error::Error for FormDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormDataError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl FormDataError {
    /// Creates an InvalidContentType error for the given header value
    pub fn invalid_content_type<S: Into<String>>(content_type: S) -> Self {
        FormDataError::InvalidContentType(content_type.into())
    }

    /// Creates a StreamRead error wrapping an unexpected read failure
    pub fn stream_read<S: Into<String>>(message: S) -> Self {
        FormDataError::StreamRead(message.into())
    }

    /// Creates a BufferConstruction error
    pub fn buffer_construction<S: Into<String>>(message: S) -> Self {
        FormDataError::BufferConstruction(message.into())
    }

    /// Creates a PartParse error
    pub fn part_parse<S: Into<String>>(message: S) -> Self {
        FormDataError::PartParse(message.into())
    }

    /// Creates a PayloadTooLarge error with the maximum allowed size
    pub fn payload_too_large(max_size: u64) -> Self {
        FormDataError::PayloadTooLarge(max_size)
    }

    /// Creates an InvalidBoundary error
    pub fn invalid_boundary<S: Into<String>>(reason: S) -> Self {
        FormDataError::InvalidBoundary(reason.into())
    }

    /// Name of the DOMException this failure maps to for browser-facing callers
    pub fn exception_name(&self) -> &'static str {
        match self {
            FormDataError::InvalidContentType(_)
            | FormDataError::MissingBoundary
            | FormDataError::PrematureClose
            | FormDataError::BufferConstruction(_) => "InvalidStateError",
            FormDataError::StreamRead(_) => "EncodingError",
            FormDataError::PartParse(_) | FormDataError::InvalidBoundary(_) => "SyntaxError",
            FormDataError::PayloadTooLarge(_) => "QuotaExceededError",
            FormDataError::Io(_) => "UnknownError",
        }
    }

    /// Wraps this error in an `io::Error` so a byte source can surface it
    /// through `Read`-shaped interfaces without it being reclassified.
    pub fn into_io(self) -> std::io::Error {
        std::io::Error::other(self)
    }

    /// Recovers a `FormDataError` previously wrapped with [`FormDataError::into_io`].
    /// Any other I/O error comes back untouched in the `Err` branch.
    pub fn from_io(err: std::io::Error) -> Result<Self, std::io::Error> {
        err.downcast::<FormDataError>()
    }

    /// Checks if the error was caused by the shape of the incoming body
    /// rather than by the transport delivering it
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            FormDataError::InvalidContentType(_)
                | FormDataError::MissingBoundary
                | FormDataError::PartParse(_)
                | FormDataError::InvalidBoundary(_)
                | FormDataError::PayloadTooLarge(_)
        )
    }
}
