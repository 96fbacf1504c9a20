//! Locator classification and the three enumeration strategies.
//!
//! `classify` picks a [`LocatorKind`] from the fixed ordered table;
//! [`Vfs::open`] composes classification with the matched kind's directory
//! factory. The strategies are independent: a plain directory walk, a
//! random-access archive walk, and a single-pass streamed archive walk.

mod classify;
mod dir;
mod stream_dir;
mod system;
mod zip_dir;

pub use classify::{classify, LocatorKind, Vfs, DEFAULT_LOCATOR_KINDS};
pub use dir::{ByteStream, Dir, Entries, Entry};
pub use stream_dir::{StreamEntries, StreamEntry, StreamEntryReader, ZipStreamDir};
pub use system::{SystemDir, SystemEntries, SystemEntry};
pub use zip_dir::{ZipDir, ZipEntries, ZipMemberEntry};
