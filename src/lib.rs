//! Uniform enumeration of files reachable from heterogeneous resource
//! locators.
//!
//! ## Scope
//! A higher-level scanner wants to walk "all entries under this resource"
//! without caring whether the resource is a directory on disk, a jar/zip
//! archive, a jar nested inside another jar, or an opaque forward-only
//! byte stream. This crate classifies the locator, picks the enumeration
//! strategy, and hands back a lazy sequence of entries.
//!
//! ## Key invariants
//! - Classification is an ordered table ([`DEFAULT_LOCATOR_KINDS`]), first
//!   match wins; order is part of the contract because the predicates are
//!   not mutually exclusive.
//! - Directories are created per call and own their OS state for their own
//!   lifetime only; nothing is cached across calls.
//! - Archive metadata is hostile input: counts, sizes, and names are
//!   validated against [`ArchiveLimits`].
//! - Locators with container-runtime schemes (`vfs`, `vfszip`, `vfsfile`,
//!   `bundle`) parse (the [`SchemeRegistry`] shim exists for exactly that)
//!   but fail all content access predictably.
//!
//! ## Flow
//! `locator text -> Locator::parse -> Vfs::classify -> LocatorKind::create_dir
//!  -> Dir::entries -> Entry::open`
//!
//! ## Notable entry points
//! - [`Vfs`]: facade owning the registry capability and limits.
//! - [`Locator`]: parsed scheme + path value.
//! - [`Dir`] / [`Entry`]: the enumeration surface.
//! - [`SchemeRegistry`]: explicit process-wide scheme table, built once at
//!   bootstrap and passed in by reference.
//!
//! ## Concurrency model
//! Synchronous blocking I/O throughout. Plain-directory and random-access
//! directories can be enumerated by independent callers (one directory
//! instance each), and random-access entry contents can be read
//! concurrently (each open clones its handle). The streamed strategy is a
//! stateful single-threaded cursor and its types are deliberately not
//! `Send`.

pub mod config;
pub mod error;
pub mod locator;
pub mod registry;
pub mod vfs;
pub mod zip;

pub use config::{ArchiveLimits, LimitsError};
pub use error::{ArchiveOpenCause, ConnectionOp, VfsError};
pub use locator::{Locator, ARCHIVE_SUFFIX, INNER_SEPARATOR};
pub use registry::{Connection, InputStream, SchemeHandler, SchemeRegistry};
pub use vfs::{
    classify, ByteStream, Dir, Entries, Entry, LocatorKind, SystemDir, Vfs, ZipDir,
    ZipStreamDir, DEFAULT_LOCATOR_KINDS,
};
