//! Random-access archive enumeration.
//!
//! # Invariants
//! - The container is validated eagerly at open time; a missing, empty, or
//!   EOCD-less file never produces a directory (so "could not open" is
//!   never mistaken for "empty archive").
//! - Members are yielded in central-directory listing order; directory
//!   placeholders are not yielded.
//! - Every content open uses its own file handle, so repeated and
//!   concurrent reads of entries are independent.
//!
//! # Design Notes
//! - The reported directory path differs by matcher: the archive file's own
//!   canonical path when the locator addressed the file directly, but the
//!   full original locator's decoded path (inner segment included) when the
//!   archive was dereferenced from a nested locator. Callers re-derive
//!   member locators from that path, so the asymmetry is contract, not
//!   accident.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ArchiveLimits;
use crate::error::VfsError;
use crate::zip::central::{self, CentralDirectory, MemberMeta, MemberReader};

/// A zip archive opened with random access.
pub struct ZipDir {
    shared: Arc<ZipShared>,
    display: String,
}

struct ZipShared {
    file: File,
    archive_path: PathBuf,
    cd: CentralDirectory,
    limits: ArchiveLimits,
    /// Store path of the archive file itself, used in error reports (the
    /// directory display path may be a nested locator path instead).
    archive_display: String,
}

impl std::fmt::Debug for ZipDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipDir")
            .field("path", &self.display)
            .finish()
    }
}

impl ZipDir {
    /// Open `archive` and validate its central directory.
    ///
    /// `display` becomes the directory's reported path.
    pub fn open(
        archive: &Path,
        display: String,
        limits: &ArchiveLimits,
    ) -> Result<Self, VfsError> {
        let archive_display = super::system::display_path(archive);
        let open_failed = |cause| VfsError::ArchiveOpenFailed {
            path: archive_display.clone(),
            cause,
        };

        let file = File::open(archive).map_err(|e| open_failed(e.into()))?;
        let file_len = file.metadata().map_err(|e| open_failed(e.into()))?.len();
        let cd = central::parse_central_directory(&file, file_len, limits)
            .map_err(open_failed)?;

        Ok(Self {
            shared: Arc::new(ZipShared {
                file,
                archive_path: archive.to_path_buf(),
                cd,
                limits: limits.clone(),
                archive_display,
            }),
            display,
        })
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.display
    }

    /// Number of members recorded in the central directory (directories
    /// included).
    #[inline]
    pub fn member_count(&self) -> u32 {
        self.shared.cd.member_count
    }

    /// Walk the central directory, one item per non-directory member.
    pub fn members(&self) -> ZipEntries {
        ZipEntries {
            shared: Arc::clone(&self.shared),
            pos: self.shared.cd.cd_off,
            done: false,
        }
    }
}

/// Lazy walk over the central directory.
pub struct ZipEntries {
    shared: Arc<ZipShared>,
    pos: u64,
    done: bool,
}

impl Iterator for ZipEntries {
    type Item = Result<ZipMemberEntry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let read = central::read_member_header(
                &self.shared.file,
                self.pos,
                self.shared.cd.cd_end,
                &self.shared.limits,
            );
            match read {
                Ok(Some((meta, next))) => {
                    self.pos = next;
                    if meta.is_dir {
                        continue;
                    }
                    return Some(Ok(ZipMemberEntry {
                        shared: Arc::clone(&self.shared),
                        meta,
                    }));
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(cause) => {
                    // A malformed central directory ends the walk; there is
                    // no way to resynchronize a directory region.
                    self.done = true;
                    return Some(Err(VfsError::ArchiveOpenFailed {
                        path: self.shared.archive_display.clone(),
                        cause,
                    }));
                }
            }
        }
    }
}

/// One non-directory archive member.
pub struct ZipMemberEntry {
    shared: Arc<ZipShared>,
    meta: MemberMeta,
}

impl ZipMemberEntry {
    /// Member name, archive-native (already forward-slash).
    #[inline]
    pub fn relative_path(&self) -> &str {
        &self.meta.name
    }

    /// Uncompressed size recorded in the central directory.
    #[inline]
    pub fn size(&self) -> u64 {
        self.meta.uncompressed_size
    }

    /// Open an independent reader onto this member's decompressed bytes.
    ///
    /// Safe to call repeatedly and from multiple threads; every call opens
    /// its own handle.
    pub fn open(&self) -> Result<MemberReader, VfsError> {
        central::open_member(&self.shared.archive_path, &self.meta).map_err(|cause| {
            VfsError::ArchiveOpenFailed {
                path: self.shared.archive_display.clone(),
                cause,
            }
        })
    }
}
