//! Ordered locator classification and the enumeration facade.
//!
//! # Invariants
//! - Kinds are tried in the order of `DEFAULT_LOCATOR_KINDS`, first match
//!   wins. Order is contract: the specific suffix/scheme predicates must
//!   run before the catch-all substring predicate, or a directory merely
//!   named with the archive suffix inside (`project.jarvis`) would be
//!   misclassified as an archive.
//! - Predicates are free of content I/O; only the directory kind probes the
//!   store (a stat), and only `create_dir` opens anything.
//!
//! # Design Notes
//! - The table is a closed enum, not an open registry, so callers can
//!   reason about (and test) precedence exactly.
//! - Callers that already know the representation can bypass
//!   classification with `Vfs::open_as` (for example to force a streamed
//!   walk over something the table would open with random access).

use std::fs;
use std::path::Path;

use crate::config::ArchiveLimits;
use crate::error::VfsError;
use crate::locator::{
    contains_archive, ends_with_archive, has_archive_marker, has_inner_archive, Locator,
};
use crate::registry::{resolve_local_path, SchemeRegistry};

use super::dir::Dir;
use super::stream_dir::ZipStreamDir;
use super::system::{display_path, SystemDir};
use super::zip_dir::ZipDir;

/// One row of the classification table.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    /// Local file whose path ends in the archive suffix.
    ArchiveFile = 0,
    /// Archive-member addressing scheme (`jar`/`zip`/`wsjar`), excluding
    /// jar-inside-jar locators, which fall through to `ArchiveStream`.
    NestedArchive = 1,
    /// Local file whose target is a directory on the store.
    Directory = 2,
    /// Container VFS scheme for non-file-backed resources.
    ContainerVfs = 3,
    /// Container VFS zip-like scheme.
    ContainerZip = 4,
    /// Component bundle scheme.
    Bundle = 5,
    /// Catch-all: anything whose path mentions the archive suffix, walked
    /// as a forward-only stream.
    ArchiveStream = 6,
}

/// The fixed classification order. First match wins.
pub const DEFAULT_LOCATOR_KINDS: [LocatorKind; 7] = [
    LocatorKind::ArchiveFile,
    LocatorKind::NestedArchive,
    LocatorKind::Directory,
    LocatorKind::ContainerVfs,
    LocatorKind::ContainerZip,
    LocatorKind::Bundle,
    LocatorKind::ArchiveStream,
];

impl LocatorKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ArchiveFile => "archive_file",
            Self::NestedArchive => "nested_archive",
            Self::Directory => "directory",
            Self::ContainerVfs => "container_vfs",
            Self::ContainerZip => "container_zip",
            Self::Bundle => "bundle",
            Self::ArchiveStream => "archive_stream",
        }
    }

    /// Whether this kind services the locator. Pure apart from the
    /// directory kind's store stat.
    pub fn matches(self, locator: &Locator) -> bool {
        match self {
            Self::ArchiveFile => {
                locator.scheme() == "file" && ends_with_archive(locator.path())
            }
            Self::NestedArchive => {
                matches!(locator.scheme(), "jar" | "zip" | "wsjar")
                    && !has_inner_archive(locator.path())
            }
            Self::Directory => {
                locator.scheme() == "file"
                    && !has_archive_marker(locator.path())
                    && Path::new(&locator.decoded_path()).is_dir()
            }
            Self::ContainerVfs => locator.scheme() == "vfs",
            Self::ContainerZip => matches!(locator.scheme(), "vfszip" | "vfsfile"),
            Self::Bundle => locator.scheme().starts_with("bundle"),
            Self::ArchiveStream => contains_archive(locator.path()),
        }
    }

    /// Build the directory for a locator this kind matched.
    ///
    /// May be invoked directly to bypass classification; the kind is not
    /// re-checked against the locator.
    pub fn create_dir(
        self,
        locator: &Locator,
        registry: &SchemeRegistry,
        limits: &ArchiveLimits,
    ) -> Result<Dir, VfsError> {
        match self {
            Self::ArchiveFile => {
                let resolved = resolve_local_path(locator.path());
                let canonical = fs::canonicalize(&resolved).map_err(|e| {
                    VfsError::ArchiveOpenFailed {
                        path: locator.decoded_path(),
                        cause: e.into(),
                    }
                })?;
                let display = display_path(&canonical);
                Ok(Dir::Zip(ZipDir::open(&canonical, display, limits)?))
            }
            Self::NestedArchive => {
                let outer = locator.outer_archive_path().ok_or_else(|| {
                    VfsError::ArchiveOpenFailed {
                        path: locator.decoded_path(),
                        cause: crate::error::ArchiveOpenCause::Malformed(
                            "no archive segment in locator path",
                        ),
                    }
                })?;
                let resolved = resolve_local_path(&outer);
                // The walk runs over the dereferenced outer archive, but
                // the directory represents the nested resource, so the
                // reported path is the locator's own decoded path.
                Ok(Dir::Zip(ZipDir::open(
                    &resolved,
                    locator.decoded_path(),
                    limits,
                )?))
            }
            Self::Directory => Ok(Dir::System(SystemDir::open(locator.path())?)),
            Self::ContainerVfs | Self::ContainerZip | Self::Bundle => {
                Err(VfsError::UnsupportedLocatorContent {
                    scheme: locator.scheme().to_string(),
                })
            }
            Self::ArchiveStream => {
                let connection = registry.open_connection(locator, limits)?;
                let stream = connection.input_stream()?;
                Ok(Dir::Stream(ZipStreamDir::new(
                    locator.decoded_path(),
                    Box::new(stream),
                    limits,
                )))
            }
        }
    }
}

/// First matching kind from the fixed table.
pub fn classify(locator: &Locator) -> Result<LocatorKind, VfsError> {
    for kind in DEFAULT_LOCATOR_KINDS {
        if kind.matches(locator) {
            return Ok(kind);
        }
    }
    Err(VfsError::UnclassifiableLocator {
        locator: locator.as_str().to_string(),
    })
}

/// Enumeration facade: the scheme registry capability plus archive limits.
pub struct Vfs {
    registry: SchemeRegistry,
    limits: ArchiveLimits,
}

impl Vfs {
    pub fn new(registry: SchemeRegistry, limits: ArchiveLimits) -> Self {
        Self { registry, limits }
    }

    /// Default registry table and limits.
    pub fn with_defaults() -> Self {
        Self::new(SchemeRegistry::with_defaults(), ArchiveLimits::default())
    }

    #[inline]
    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    #[inline]
    pub fn limits(&self) -> &ArchiveLimits {
        &self.limits
    }

    /// Parse locator text against this facade's registry.
    pub fn parse(&self, text: &str) -> Result<Locator, VfsError> {
        Locator::parse(text, &self.registry)
    }

    /// First matching kind from the fixed table.
    pub fn classify(&self, locator: &Locator) -> Result<LocatorKind, VfsError> {
        classify(locator)
    }

    /// Classify and build the directory.
    ///
    /// Factory failures are wrapped as `DirectoryCreationFailed`;
    /// classification failures pass through unchanged.
    pub fn open(&self, locator: &Locator) -> Result<Dir, VfsError> {
        let kind = classify(locator)?;
        self.open_as(kind, locator)
            .map_err(|cause| VfsError::DirectoryCreationFailed {
                locator: locator.as_str().to_string(),
                cause: Box::new(cause),
            })
    }

    /// Build a directory with an explicitly chosen kind, bypassing
    /// classification. Errors are the kind's own, unwrapped.
    pub fn open_as(&self, kind: LocatorKind, locator: &Locator) -> Result<Dir, VfsError> {
        kind.create_dir(locator, &self.registry, &self.limits)
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::with_defaults()
    }
}
