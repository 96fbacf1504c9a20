//! Resource locator value type and the textual archive markers.
//!
//! # Invariants
//! - A `Locator` is immutable once parsed; classification never mutates it.
//! - The archive suffix is the literal `.jar` (case-sensitive) and counts as
//!   a marker only as a path-segment suffix: at end of path or followed by
//!   `!`. A name that merely contains `.jar` as a substring (for example
//!   `project.jarvis`) is not an archive marker.
//! - The inner-path separator is the literal `!/`.
//!
//! # Design Notes
//! - Parsing is registry-gated: a scheme the registry does not carry is
//!   rejected up front, which is exactly what the registration shim exists
//!   to prevent for the container schemes.
//! - Percent-decoding is lenient: an invalid escape is kept literally
//!   rather than failing the whole locator, since decoded paths are only
//!   used for store resolution and display.
//! - An authority marker (`//`) is collapsed into the path root; this core
//!   has no use for hosts, and the container locators observed in the wild
//!   put path text there.

use crate::registry::SchemeRegistry;
use crate::VfsError;

/// Archive suffix recognized by classification.
pub const ARCHIVE_SUFFIX: &str = ".jar";
/// Separator introducing the inner path of a nested archive locator.
pub const INNER_SEPARATOR: &str = "!/";

/// An addressable reference to a resource: scheme plus path text.
///
/// Produced by [`Locator::parse`]; read-only to the rest of the crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    scheme: String,
    path: String,
}

impl Locator {
    /// Parse locator text against the given scheme registry.
    ///
    /// Fails with `MalformedLocator` when the scheme separator is missing,
    /// the scheme is syntactically invalid, or the registry does not carry
    /// the scheme.
    pub fn parse(input: &str, registry: &SchemeRegistry) -> Result<Self, VfsError> {
        let colon = match input.find(':') {
            Some(i) if i > 0 => i,
            _ => {
                return Err(VfsError::MalformedLocator {
                    input: input.to_string(),
                    reason: "missing scheme separator",
                })
            }
        };
        let scheme_text = &input[..colon];
        if !is_valid_scheme(scheme_text) {
            return Err(VfsError::MalformedLocator {
                input: input.to_string(),
                reason: "invalid scheme",
            });
        }
        let scheme = scheme_text.to_ascii_lowercase();
        if !registry.recognizes(&scheme) {
            return Err(VfsError::MalformedLocator {
                input: input.to_string(),
                reason: "unrecognized scheme",
            });
        }

        let mut rest = &input[colon + 1..];
        let path = if let Some(stripped) = rest.strip_prefix("//") {
            rest = stripped;
            if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{rest}")
            }
        } else {
            rest.to_string()
        };

        Ok(Self {
            raw: input.to_string(),
            scheme,
            path,
        })
    }

    /// The original locator text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased scheme.
    #[inline]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Path text after the scheme (authority collapsed), undecoded.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Percent-decoded path text.
    pub fn decoded_path(&self) -> String {
        percent_decode(&self.path)
    }

    /// Decoded path of the outer archive file for a nested locator: the
    /// path up to and including the first `.jar` that is followed by `!`,
    /// with any embedded scheme prefixes stripped.
    ///
    /// Returns `None` when the path carries no nested archive segment.
    pub fn outer_archive_path(&self) -> Option<String> {
        let stripped = strip_embedded_schemes(&self.path);
        let marker = find_nested_marker(stripped)?;
        Some(percent_decode(&stripped[..marker + ARCHIVE_SUFFIX.len()]))
    }

    /// Decoded member path addressed inside the outer archive (text after
    /// the first `!/`), with any leading slash stripped to match
    /// archive-native member names.
    pub fn inner_member_path(&self) -> Option<String> {
        let stripped = strip_embedded_schemes(&self.path);
        let marker = find_nested_marker(stripped)?;
        let after = &stripped[marker + ARCHIVE_SUFFIX.len()..];
        let inner = after.strip_prefix(INNER_SEPARATOR)?;
        Some(percent_decode(inner.trim_start_matches('/')))
    }
}

/// `.jar` at end of path or followed by `!`.
pub fn has_archive_marker(path: &str) -> bool {
    for (i, _) in path.match_indices(ARCHIVE_SUFFIX) {
        let tail = &path[i + ARCHIVE_SUFFIX.len()..];
        if tail.is_empty() || tail.starts_with('!') {
            return true;
        }
    }
    false
}

/// Path ends with the archive suffix.
#[inline]
pub fn ends_with_archive(path: &str) -> bool {
    path.ends_with(ARCHIVE_SUFFIX)
}

/// Archive suffix appears anywhere in the path text (the catch-all
/// predicate of the streamed fallback kind).
#[inline]
pub fn contains_archive(path: &str) -> bool {
    path.contains(ARCHIVE_SUFFIX)
}

/// The path addresses an archive inside another archive: after the first
/// `.jar!/` the remaining text contains the archive suffix again.
pub fn has_inner_archive(path: &str) -> bool {
    let marker = match find_nested_marker(path) {
        Some(i) => i,
        None => return false,
    };
    let after = &path[marker + ARCHIVE_SUFFIX.len()..];
    match after.strip_prefix(INNER_SEPARATOR) {
        Some(inner) => inner.contains(ARCHIVE_SUFFIX),
        None => false,
    }
}

/// Decode `%HH` escapes, keeping invalid escapes literally.
pub fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[inline]
fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_valid_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Strip embedded `jar:`/`zip:`/`wsjar:`/`file:` prefixes left inside the
/// path by nested locators, and collapse the leading slash run.
fn strip_embedded_schemes(path: &str) -> &str {
    let mut rest = path;
    loop {
        let mut stripped = false;
        for prefix in ["jar:", "zip:", "wsjar:", "file:"] {
            if let Some(r) = rest.strip_prefix(prefix) {
                rest = r;
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }
    while rest.starts_with("//") {
        rest = &rest[1..];
    }
    rest
}

/// Byte offset of the first `.jar` immediately followed by `!`.
fn find_nested_marker(path: &str) -> Option<usize> {
    for (i, _) in path.match_indices(ARCHIVE_SUFFIX) {
        if path[i + ARCHIVE_SUFFIX.len()..].starts_with('!') {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemeRegistry;

    fn parse(s: &str) -> Locator {
        Locator::parse(s, &SchemeRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn parses_scheme_and_path() {
        let loc = parse("file:/tmp/some/dir");
        assert_eq!(loc.scheme(), "file");
        assert_eq!(loc.path(), "/tmp/some/dir");
    }

    #[test]
    fn collapses_authority_into_path() {
        let loc = parse("vfs://Users/someone/lib/api.jar!/");
        assert_eq!(loc.scheme(), "vfs");
        assert_eq!(loc.path(), "/Users/someone/lib/api.jar!/");

        let loc = parse("file:///tmp/x");
        assert_eq!(loc.path(), "/tmp/x");
    }

    #[test]
    fn rejects_unknown_scheme_and_bad_syntax() {
        let registry = SchemeRegistry::with_defaults();
        assert!(matches!(
            Locator::parse("gopher:/x", &registry),
            Err(VfsError::MalformedLocator { reason: "unrecognized scheme", .. })
        ));
        assert!(matches!(
            Locator::parse("/no/scheme", &registry),
            Err(VfsError::MalformedLocator { .. })
        ));
        assert!(matches!(
            Locator::parse("1bad:/x", &registry),
            Err(VfsError::MalformedLocator { reason: "invalid scheme", .. })
        ));
    }

    #[test]
    fn archive_marker_requires_segment_boundary() {
        assert!(has_archive_marker("/tmp/lib/api.jar"));
        assert!(has_archive_marker("/tmp/outer.jar!/pack"));
        assert!(!has_archive_marker("/tmp/project.jarvis"));
        assert!(contains_archive("/tmp/project.jarvis"));
    }

    #[test]
    fn inner_archive_detection() {
        assert!(has_inner_archive("file:/a/outer.jar!/lib/inner.jar"));
        assert!(!has_inner_archive("file:/a/outer.jar!/pack/empty.class"));
        assert!(!has_inner_archive("file:/a/outer.jar!/"));
        assert!(!has_inner_archive("/a/plain.jar"));
    }

    #[test]
    fn nested_resolution_strips_prefixes() {
        let loc = parse("jar:file:/a/outer.jar!/BOOT-INF/lib/inner.jar");
        assert_eq!(loc.outer_archive_path().as_deref(), Some("/a/outer.jar"));
        assert_eq!(
            loc.inner_member_path().as_deref(),
            Some("BOOT-INF/lib/inner.jar")
        );
    }

    #[test]
    fn nested_resolution_handles_authority_form() {
        let loc = parse("jar:file:///a/outer.jar!/x.class");
        assert_eq!(loc.outer_archive_path().as_deref(), Some("/a/outer.jar"));
        assert_eq!(loc.inner_member_path().as_deref(), Some("x.class"));
    }

    #[test]
    fn percent_decoding_is_lenient() {
        assert_eq!(percent_decode("/dir%20with%20spaces"), "/dir with spaces");
        assert_eq!(percent_decode("/literal%zz"), "/literal%zz");
        assert_eq!(percent_decode("/plain"), "/plain");
    }

    #[test]
    fn decoded_path_round_trips_spaces() {
        let loc = parse("file:/tmp/dir+with%20spaces");
        assert_eq!(loc.decoded_path(), "/tmp/dir+with spaces");
    }
}
