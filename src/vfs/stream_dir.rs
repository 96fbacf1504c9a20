//! Streamed (forward-only) archive enumeration.
//!
//! # Invariants
//! - The walk is single-pass and non-restartable: entries come out in
//!   stream order, each entry's content is readable only until the walk
//!   advances, and a second `entries()` call on the same directory fails
//!   with `StreamAlreadyConsumed`.
//! - Leading non-member bytes are skipped by a bounded byte-by-byte
//!   signature scan; a stream with no member data yields zero entries and
//!   no error.
//!
//! # Design Notes
//! - Staleness is tracked with a generation counter on the shared cursor
//!   state, checked on every open and every read, so a stale accessor fails
//!   fast instead of returning bytes from the wrong member.
//! - The shared state is `Rc<RefCell<..>>`: the type is deliberately not
//!   `Send`, which makes the single-threaded cursor contract a compile-time
//!   property rather than a documentation footnote.

use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

use crate::config::ArchiveLimits;
use crate::error::{to_io_error, VfsError};
use crate::zip::local::StreamCursor;

/// An archive reachable only as a forward-only byte stream.
pub struct ZipStreamDir {
    display: String,
    state: Rc<RefCell<StreamState>>,
}

struct StreamState {
    cursor: StreamCursor<Box<dyn Read>>,
    /// Bumped on every advance; stale entries and readers compare against
    /// it and fail with `StreamAlreadyConsumed`.
    generation: u64,
    iterated: bool,
}

impl ZipStreamDir {
    /// Wrap a byte stream; `display` is the original locator's decoded
    /// path, reported verbatim as the directory path.
    pub fn new(display: String, stream: Box<dyn Read>, limits: &ArchiveLimits) -> Self {
        Self {
            display,
            state: Rc::new(RefCell::new(StreamState {
                cursor: StreamCursor::new(stream, limits),
                generation: 0,
                iterated: false,
            })),
        }
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.display
    }

    /// Single-pass walk over the stream's members.
    pub fn members(&self) -> StreamEntries {
        let mut state = self.state.borrow_mut();
        let poisoned = state.iterated;
        state.iterated = true;
        StreamEntries {
            state: Rc::clone(&self.state),
            display: self.display.clone(),
            poisoned,
            done: false,
        }
    }
}

/// Single-pass walk over the stream's members.
pub struct StreamEntries {
    state: Rc<RefCell<StreamState>>,
    display: String,
    poisoned: bool,
    done: bool,
}

impl Iterator for StreamEntries {
    type Item = Result<StreamEntry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.poisoned {
            self.done = true;
            return Some(Err(VfsError::StreamAlreadyConsumed {
                path: self.display.clone(),
            }));
        }

        let mut state = self.state.borrow_mut();
        // Invalidate the previous entry's accessor before moving the
        // cursor; its unread payload is drained by the cursor itself.
        state.generation += 1;
        let generation = state.generation;
        match state.cursor.next_member() {
            Ok(Some(member)) => Some(Ok(StreamEntry {
                relative: member.name,
                display: self.display.clone(),
                state: Rc::clone(&self.state),
                generation,
            })),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(cause) => {
                self.done = true;
                Some(Err(VfsError::ArchiveOpenFailed {
                    path: self.display.clone(),
                    cause,
                }))
            }
        }
    }
}

/// One member yielded by the streamed walk.
pub struct StreamEntry {
    relative: String,
    display: String,
    state: Rc<RefCell<StreamState>>,
    generation: u64,
}

impl StreamEntry {
    /// Member name, archive-native (already forward-slash).
    #[inline]
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    /// Open the member's content.
    ///
    /// Valid only while the walk still sits on this member; afterwards the
    /// bytes are gone and this fails with `StreamAlreadyConsumed`.
    pub fn open(&self) -> Result<StreamEntryReader, VfsError> {
        let state = self.state.borrow();
        if state.generation != self.generation {
            return Err(VfsError::StreamAlreadyConsumed {
                path: self.display.clone(),
            });
        }
        Ok(StreamEntryReader {
            state: Rc::clone(&self.state),
            display: self.display.clone(),
            generation: self.generation,
        })
    }
}

/// Reader over the current member's decompressed bytes.
///
/// Reads fail with an `io::Error` wrapping `StreamAlreadyConsumed` once the
/// walk has advanced; the original error is recoverable through
/// `io::Error::get_ref`.
pub struct StreamEntryReader {
    state: Rc<RefCell<StreamState>>,
    display: String,
    generation: u64,
}

impl std::fmt::Debug for StreamEntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEntryReader")
            .field("path", &self.display)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Read for StreamEntryReader {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.generation != self.generation {
            return Err(to_io_error(VfsError::StreamAlreadyConsumed {
                path: self.display.clone(),
            }));
        }
        state.cursor.read_payload(dst)
    }
}
