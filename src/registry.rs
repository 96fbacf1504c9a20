//! Scheme registration shim: scheme-name to connection-opener mapping.
//!
//! # Invariants
//! - The registry is explicit process-wide configuration: built once by a
//!   bootstrap step and passed into the core by reference, never consulted
//!   through a global.
//! - Restricted connections fail every data-access operation with
//!   `UnsupportedConnectionOperation`; they exist so locator parsing does
//!   not reject container schemes outright. Content access for those
//!   schemes is expected to go through the classifier, which reports
//!   `UnsupportedLocatorContent` instead of attempting a doomed connection.
//!
//! # Design Notes
//! - Syntax acceptance is decoupled from content-access capability on
//!   purpose; both layers fail predictably rather than crash.
//! - Re-registration is last-wins; the host is assumed to install the
//!   registry at most once per process.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::config::ArchiveLimits;
use crate::error::{ArchiveOpenCause, ConnectionOp, VfsError};
use crate::locator::Locator;
use crate::zip::central::{self, MemberReader};

/// Connection opener installed for one scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeHandler {
    /// Path is a local store path; content streams from the file.
    LocalFile,
    /// Path addresses a member inside a local archive; content streams the
    /// member's decompressed bytes.
    ArchiveMember,
    /// Scheme parses but carries no generic byte-stream access.
    Restricted,
}

/// Scheme-name to connection-opener table.
pub struct SchemeRegistry {
    handlers: BTreeMap<String, SchemeHandler>,
}

impl SchemeRegistry {
    /// Empty registry; every parse attempt will be rejected until handlers
    /// are registered.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// The default table: working openers for `file` and the archive-member
    /// schemes, restricted openers for the container and bundle schemes.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("file", SchemeHandler::LocalFile);
        registry.register("jar", SchemeHandler::ArchiveMember);
        registry.register("zip", SchemeHandler::ArchiveMember);
        registry.register("wsjar", SchemeHandler::ArchiveMember);
        registry.register("vfs", SchemeHandler::Restricted);
        registry.register("vfszip", SchemeHandler::Restricted);
        registry.register("vfsfile", SchemeHandler::Restricted);
        registry.register("bundle", SchemeHandler::Restricted);
        registry
    }

    /// Register (or replace, last-wins) the opener for a scheme.
    pub fn register(&mut self, scheme: &str, handler: SchemeHandler) {
        self.handlers
            .insert(scheme.to_ascii_lowercase(), handler);
    }

    /// Whether a locator with this scheme can be parsed at all.
    pub fn recognizes(&self, scheme: &str) -> bool {
        self.handlers.contains_key(scheme)
    }

    pub fn handler(&self, scheme: &str) -> Option<SchemeHandler> {
        self.handlers.get(scheme).copied()
    }

    /// Open the connection object for a locator.
    ///
    /// This performs no I/O; data access happens through the returned
    /// connection's operations.
    pub fn open_connection(
        &self,
        locator: &Locator,
        limits: &ArchiveLimits,
    ) -> Result<Connection, VfsError> {
        match self.handler(locator.scheme()) {
            Some(SchemeHandler::LocalFile) => Ok(Connection::File {
                path: resolve_local_path(locator.path()),
            }),
            Some(SchemeHandler::ArchiveMember) => {
                let outer = match locator.outer_archive_path() {
                    Some(p) => resolve_local_path(&p),
                    None => {
                        return Err(VfsError::MalformedLocator {
                            input: locator.as_str().to_string(),
                            reason: "archive member locator missing inner path",
                        })
                    }
                };
                let member = match locator.inner_member_path() {
                    Some(m) if !m.is_empty() => m,
                    _ => {
                        return Err(VfsError::MalformedLocator {
                            input: locator.as_str().to_string(),
                            reason: "archive member locator missing inner path",
                        })
                    }
                };
                Ok(Connection::Member {
                    outer,
                    member,
                    display: locator.decoded_path(),
                    limits: limits.clone(),
                })
            }
            Some(SchemeHandler::Restricted) => Ok(Connection::Restricted {
                scheme: locator.scheme().to_string(),
            }),
            None => Err(VfsError::MalformedLocator {
                input: locator.as_str().to_string(),
                reason: "unrecognized scheme",
            }),
        }
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Try the percent-decoded path first, then the raw text; fall back to the
/// decoded form for error reporting when neither exists.
pub(crate) fn resolve_local_path(path_text: &str) -> PathBuf {
    let decoded = crate::locator::percent_decode(path_text);
    if Path::new(&decoded).exists() {
        return PathBuf::from(decoded);
    }
    if Path::new(path_text).exists() {
        return PathBuf::from(path_text);
    }
    PathBuf::from(decoded)
}

/// Connection object for one locator.
///
/// Mirrors the three data operations of the host runtime's connection
/// surface; restricted schemes fail all of them.
pub enum Connection {
    File {
        path: PathBuf,
    },
    Member {
        outer: PathBuf,
        member: String,
        display: String,
        limits: ArchiveLimits,
    },
    Restricted {
        scheme: String,
    },
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::File { path } => f
                .debug_struct("Connection::File")
                .field("path", path)
                .finish(),
            Connection::Member {
                outer,
                member,
                display,
                ..
            } => f
                .debug_struct("Connection::Member")
                .field("outer", outer)
                .field("member", member)
                .field("display", display)
                .finish(),
            Connection::Restricted { scheme } => f
                .debug_struct("Connection::Restricted")
                .field("scheme", scheme)
                .finish(),
        }
    }
}

impl Connection {
    /// Probe that the resource is reachable without handing out content.
    pub fn connect(&self) -> Result<(), VfsError> {
        match self {
            Connection::File { path } => {
                File::open(path).map_err(VfsError::Io)?;
                Ok(())
            }
            Connection::Member { .. } => {
                self.input_stream()?;
                Ok(())
            }
            Connection::Restricted { scheme } => Err(VfsError::UnsupportedConnectionOperation {
                scheme: scheme.clone(),
                op: ConnectionOp::Connect,
            }),
        }
    }

    /// Materialize the full content.
    pub fn content(&self) -> Result<Vec<u8>, VfsError> {
        match self {
            Connection::Restricted { scheme } => Err(VfsError::UnsupportedConnectionOperation {
                scheme: scheme.clone(),
                op: ConnectionOp::Content,
            }),
            _ => {
                let mut out = Vec::new();
                self.input_stream()?
                    .read_to_end(&mut out)
                    .map_err(VfsError::Io)?;
                Ok(out)
            }
        }
    }

    /// Open a fresh forward-only byte stream; each call yields an
    /// independent stream.
    pub fn input_stream(&self) -> Result<InputStream, VfsError> {
        match self {
            Connection::File { path } => {
                let file = File::open(path).map_err(VfsError::Io)?;
                Ok(InputStream::File(file))
            }
            Connection::Member {
                outer,
                member,
                display,
                limits,
            } => {
                let reader =
                    open_member_stream(outer, member, limits).map_err(|cause| {
                        VfsError::ArchiveOpenFailed {
                            path: display.clone(),
                            cause,
                        }
                    })?;
                Ok(InputStream::Member(reader))
            }
            Connection::Restricted { scheme } => Err(VfsError::UnsupportedConnectionOperation {
                scheme: scheme.clone(),
                op: ConnectionOp::InputStream,
            }),
        }
    }
}

/// Open the outer archive and stream the addressed member's bytes.
fn open_member_stream(
    outer: &Path,
    member: &str,
    limits: &ArchiveLimits,
) -> Result<MemberReader, ArchiveOpenCause> {
    let file = File::open(outer)?;
    let file_len = file.metadata()?.len();
    let cd = central::parse_central_directory(&file, file_len, limits)?;
    let mut pos = cd.cd_off;
    while let Some((meta, next)) = central::read_member_header(&file, pos, cd.cd_end, limits)? {
        if meta.name == member {
            return central::open_member(outer, &meta);
        }
        pos = next;
    }
    Err(ArchiveOpenCause::Malformed("member not found in archive"))
}

/// Byte stream handed out by a working connection.
pub enum InputStream {
    File(File),
    Member(MemberReader),
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            InputStream::File(_) => "File",
            InputStream::Member(_) => "Member",
        };
        f.debug_tuple("InputStream").field(&variant).finish()
    }
}

impl Read for InputStream {
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self {
            InputStream::File(f) => f.read(dst),
            InputStream::Member(r) => r.read(dst),
        }
    }
}
