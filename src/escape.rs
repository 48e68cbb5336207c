//! Escaping of field names and filenames for `Content-Disposition` values.
//!
//! Field names have every line break normalised to CRLF before escaping,
//! filenames are escaped as-is. Only `\n`, `\r` and `"` are percent-encoded,
//! which is what browsers emit for `multipart/form-data` submissions.

/// Normalise lone `\r` and lone `\n` to `\r\n`, leaving existing pairs alone.
pub fn normalize_line_breaks(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            other => out.push(other),
        }
    }

    out
}

/// Escape a name for inclusion inside a quoted `Content-Disposition` parameter.
pub fn escape_name(name: &str, is_filename: bool) -> String {
    let normalized;
    let source = if is_filename {
        name
    } else {
        normalized = normalize_line_breaks(name);
        normalized.as_str()
    };

    let mut out = String::with_capacity(source.len());
    for c in source.chars() {
        match c {
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            '"' => out.push_str("%22"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_name`]. Other percent sequences are left untouched.
pub fn unescape_name(escaped: &str) -> String {
    if !escaped.contains('%') {
        return escaped.to_string();
    }

    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let replacement = match tail.get(..3) {
            Some("%0A") | Some("%0a") => Some('\n'),
            Some("%0D") | Some("%0d") => Some('\r'),
            Some("%22") => Some('"'),
            _ => None,
        };
        match replacement {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
