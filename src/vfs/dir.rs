//! Directory and entry surface shared by the enumeration strategies.
//!
//! # Invariants
//! - Every entry's `relative_path()` is a normalized forward-slash path
//!   rooted at its directory's root.
//! - A directory holds whatever OS state it needs (open archive handle,
//!   stream cursor) for its own lifetime only; dropping it releases
//!   everything. Nothing is cached across `create_dir` calls.
//!
//! # Design Notes
//! - The strategy set is closed, so directories and entries are tagged
//!   variants rather than boxed trait objects; the classifier's ordering
//!   contract wants an inspectable, deterministic table, not an open
//!   registry.
//! - `Dir` as a sum type is not `Send` because the streamed variant owns a
//!   single-threaded cursor; the plain-directory and random-access types
//!   can be used directly where cross-thread handoff is needed.

use std::fs::File;
use std::io::{self, Read};

use crate::error::VfsError;
use crate::zip::central::MemberReader;

use super::stream_dir::{StreamEntries, StreamEntry, StreamEntryReader, ZipStreamDir};
use super::system::{SystemDir, SystemEntries, SystemEntry};
use super::zip_dir::{ZipDir, ZipEntries, ZipMemberEntry};

/// One resource root, produced by a locator kind's directory factory.
pub enum Dir {
    System(SystemDir),
    Zip(ZipDir),
    Stream(ZipStreamDir),
}

impl Dir {
    /// The root's display path (forward slashes).
    pub fn path(&self) -> &str {
        match self {
            Dir::System(d) => d.path(),
            Dir::Zip(d) => d.path(),
            Dir::Stream(d) => d.path(),
        }
    }

    /// Lazily enumerate the files reachable under this root.
    ///
    /// Per-member failures surface as `Err` items; whether iteration can
    /// continue past one depends on the strategy (a directory walk can, a
    /// malformed archive cannot).
    pub fn entries(&self) -> Entries {
        match self {
            Dir::System(d) => Entries::System(d.walk()),
            Dir::Zip(d) => Entries::Zip(d.members()),
            Dir::Stream(d) => Entries::Stream(d.members()),
        }
    }
}

impl std::fmt::Debug for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Dir::System(_) => "System",
            Dir::Zip(_) => "Zip",
            Dir::Stream(_) => "Stream",
        };
        f.debug_struct("Dir")
            .field("kind", &variant)
            .field("path", &self.path())
            .finish()
    }
}

/// Lazy entry sequence for one directory.
pub enum Entries {
    System(SystemEntries),
    Zip(ZipEntries),
    Stream(StreamEntries),
}

impl Iterator for Entries {
    type Item = Result<Entry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Entries::System(it) => it.next().map(|r| r.map(Entry::System)),
            Entries::Zip(it) => it.next().map(|r| r.map(Entry::Zip)),
            Entries::Stream(it) => it.next().map(|r| r.map(Entry::Stream)),
        }
    }
}

/// One logical file inside a resource root.
pub enum Entry {
    System(SystemEntry),
    Zip(ZipMemberEntry),
    Stream(StreamEntry),
}

impl Entry {
    /// Final path segment of the relative path.
    pub fn name(&self) -> &str {
        leaf(self.relative_path())
    }

    /// Forward-slash path rooted at the owning directory.
    pub fn relative_path(&self) -> &str {
        match self {
            Entry::System(e) => e.relative_path(),
            Entry::Zip(e) => e.relative_path(),
            Entry::Stream(e) => e.relative_path(),
        }
    }

    /// Open this entry's byte content.
    ///
    /// Plain-directory and random-access entries yield a fresh independent
    /// stream on every call (each open acquires its own handle); a streamed
    /// entry is readable only until its directory's cursor advances, after
    /// which this fails with `StreamAlreadyConsumed`.
    pub fn open(&self) -> Result<ByteStream, VfsError> {
        match self {
            Entry::System(e) => Ok(ByteStream::File(e.open()?)),
            Entry::Zip(e) => Ok(ByteStream::Member(e.open()?)),
            Entry::Stream(e) => Ok(ByteStream::Stream(e.open()?)),
        }
    }
}

/// Byte content of one entry.
pub enum ByteStream {
    File(File),
    Member(MemberReader),
    Stream(StreamEntryReader),
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            ByteStream::File(_) => "File",
            ByteStream::Member(_) => "Member",
            ByteStream::Stream(_) => "Stream",
        };
        f.debug_tuple("ByteStream").field(&variant).finish()
    }
}

impl Read for ByteStream {
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteStream::File(f) => f.read(dst),
            ByteStream::Member(r) => r.read(dst),
            ByteStream::Stream(r) => r.read(dst),
        }
    }
}

#[inline]
fn leaf(path: &str) -> &str {
    match path.rsplit('/').next() {
        Some(last) => last,
        None => path,
    }
}
