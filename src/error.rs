//! Error taxonomy for locator classification and directory enumeration.
//!
//! # Invariants
//! - Every failure is local to a single classify/create/enumerate call; no
//!   type in this crate retains mutable state after returning an error.
//! - Variants are part of the public surface; renaming or removing one is a
//!   breaking change.
//!
//! # Design Notes
//! - Causes are chained through `std::error::Error::source` so callers can
//!   walk from a wrapped `DirectoryCreationFailed` down to the underlying
//!   I/O failure.
//! - `ConnectionOp` has stable snake_case `name()`s for telemetry keys.

use std::error::Error;
use std::fmt;
use std::io;

/// Data-access operation invoked on a scheme connection.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionOp {
    Connect = 0,
    Content = 1,
    InputStream = 2,
}

impl ConnectionOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Content => "content",
            Self::InputStream => "input_stream",
        }
    }
}

impl fmt::Display for ConnectionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an archive container could not be opened (or stopped mid-walk).
#[derive(Debug)]
pub enum ArchiveOpenCause {
    /// Underlying I/O failure (missing file, permission, short read).
    Io(io::Error),
    /// The bytes are not a parsable archive (bad signature, truncated
    /// records, zip64/multi-disk, limit violations).
    Malformed(&'static str),
}

impl fmt::Display for ArchiveOpenCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Malformed(what) => f.write_str(what),
        }
    }
}

impl Error for ArchiveOpenCause {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Malformed(_) => None,
        }
    }
}

impl From<io::Error> for ArchiveOpenCause {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Failure surface of the VFS core.
///
/// One variant per failure kind; see the crate docs for which operations
/// produce which variants.
#[derive(Debug)]
pub enum VfsError {
    /// No locator kind in the ordered table matched the locator.
    UnclassifiableLocator { locator: String },
    /// A matched kind's directory factory failed; `cause` carries the
    /// strategy-level error.
    DirectoryCreationFailed {
        locator: String,
        cause: Box<VfsError>,
    },
    /// The archive backing a random-access or streamed walk could not be
    /// opened or stopped parsing mid-walk.
    ArchiveOpenFailed {
        path: String,
        cause: ArchiveOpenCause,
    },
    /// The matched kind recognizes the scheme but cannot construct a
    /// directory by design (container VFS and bundle schemes).
    UnsupportedLocatorContent { scheme: String },
    /// A restricted scheme connection was invoked for data access.
    UnsupportedConnectionOperation { scheme: String, op: ConnectionOp },
    /// A streamed entry was read, or a streamed directory re-iterated,
    /// after the cursor advanced past the requested data.
    StreamAlreadyConsumed { path: String },
    /// The locator text could not be parsed against the scheme registry.
    MalformedLocator {
        input: String,
        reason: &'static str,
    },
    /// I/O failure surfaced mid-enumeration (directory walk, entry read).
    Io(io::Error),
}

impl VfsError {
    /// Stable snake_case kind name, usable as a telemetry key.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::UnclassifiableLocator { .. } => "unclassifiable_locator",
            Self::DirectoryCreationFailed { .. } => "directory_creation_failed",
            Self::ArchiveOpenFailed { .. } => "archive_open_failed",
            Self::UnsupportedLocatorContent { .. } => "unsupported_locator_content",
            Self::UnsupportedConnectionOperation { .. } => "unsupported_connection_operation",
            Self::StreamAlreadyConsumed { .. } => "stream_already_consumed",
            Self::MalformedLocator { .. } => "malformed_locator",
            Self::Io(_) => "io",
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnclassifiableLocator { locator } => {
                write!(f, "no locator kind matches '{locator}'")
            }
            Self::DirectoryCreationFailed { locator, cause } => {
                write!(f, "could not create directory for '{locator}': {cause}")
            }
            Self::ArchiveOpenFailed { path, cause } => {
                write!(f, "could not open archive '{path}': {cause}")
            }
            Self::UnsupportedLocatorContent { scheme } => {
                write!(f, "scheme '{scheme}' has no reachable backing store")
            }
            Self::UnsupportedConnectionOperation { scheme, op } => {
                write!(f, "the {op}() operation is not supported for scheme '{scheme}'")
            }
            Self::StreamAlreadyConsumed { path } => {
                write!(f, "archive stream for '{path}' already consumed")
            }
            Self::MalformedLocator { input, reason } => {
                write!(f, "malformed locator '{input}': {reason}")
            }
            Self::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl Error for VfsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DirectoryCreationFailed { cause, .. } => Some(cause.as_ref()),
            Self::ArchiveOpenFailed { cause, .. } => Some(cause),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for VfsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Wrap a `VfsError` into an `io::Error` for use behind `io::Read`.
///
/// Streamed entry readers must report `StreamAlreadyConsumed` through the
/// `Read` trait; callers can recover the original error via
/// `io::Error::get_ref` and downcasting.
pub(crate) fn to_io_error(e: VfsError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}
