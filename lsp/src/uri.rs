//! Path <-> `file://` URI translation.
//!
//! Works on path *strings* rather than [`std::path::Path`] so that drive-letter
//! and UNC forms translate the same way on every host: a Linux build still
//! renders `file:///C:/proj/a.rs` as `C:\proj\a.rs`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters left unescaped inside a path segment (`encodeURIComponent` set).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Convert an absolute path to a `file://` URI.
///
/// - `C:\proj\a.rs` -> `file:///C:/proj/a.rs`
/// - `\\server\share\f.txt` -> `file://server/share/f.txt`
/// - `/home/me/a.rs` -> `file:///home/me/a.rs`
#[must_use]
pub fn to_uri(path: &str) -> String {
    let normalized = path.replace('\\', "/");

    if let Some(rest) = normalized.strip_prefix("//") {
        let mut segments = rest.split('/');
        let host = segments.next().unwrap_or_default();
        let tail: Vec<String> = segments.map(encode_segment).collect();
        return format!("file://{}/{}", encode_segment(host), tail.join("/"));
    }

    if has_drive_prefix(&normalized) {
        let (drive, rest) = normalized.split_at(2);
        let tail: Vec<String> = rest
            .trim_start_matches('/')
            .split('/')
            .map(encode_segment)
            .collect();
        return format!("file:///{drive}/{}", tail.join("/"));
    }

    let encoded: Vec<String> = normalized.split('/').map(encode_segment).collect();
    format!("file://{}", encoded.join("/"))
}

/// Convert a `file://` URI back to an OS-native path string.
///
/// Returns `None` for other schemes, unparsable URIs and paths that do not
/// percent-decode to UTF-8. Never panics.
///
/// The authority is read from the raw text: [`url::Url`] lowercases hosts
/// and rejects some that are valid UNC server names.
#[must_use]
pub fn from_uri(uri: &str) -> Option<String> {
    let (scheme, rest) = uri.split_once(':')?;
    if !scheme.eq_ignore_ascii_case("file") {
        return None;
    }

    let (authority, path) = match rest.strip_prefix("//") {
        Some(after) => after.split_at(after.find('/').unwrap_or(after.len())),
        None => ("", rest),
    };

    let url = url::Url::parse(&format!("file:{path}")).ok()?;
    let decoded = percent_decode_str(url.path()).decode_utf8().ok()?;

    if let Some(drive_path) = decoded.strip_prefix('/')
        && has_drive_prefix(drive_path)
    {
        return Some(drive_path.replace('/', "\\"));
    }

    let host = percent_decode_str(authority).decode_utf8().ok()?;
    if host.is_empty() || host.eq_ignore_ascii_case("localhost") {
        return Some(decoded.into_owned());
    }
    Some(format!("\\\\{host}{}", decoded.replace('/', "\\")))
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// `C:` or `C:/...`
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/')
}

/// Last component of a path in either separator style; used as the
/// workspace folder name.
#[must_use]
pub fn folder_name(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
}
