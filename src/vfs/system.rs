//! Plain-directory enumeration over the local store.
//!
//! # Invariants
//! - The root is canonicalized at open time; the reported path is absolute
//!   with forward slashes.
//! - Only regular files are yielded. Directories and non-regular entries
//!   (sockets, devices, symlinks) are skipped silently; this is the one
//!   documented silent-skip policy in the crate.
//! - Symbolic links are not followed, so link cycles cannot occur.
//!
//! # Design Notes
//! - Walk errors (permission denied, vanished entries) surface as `Err`
//!   items and the walk continues; membership of the remaining sequence is
//!   unaffected.
//! - Enumeration order is store-defined; callers must not assume one.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::VfsError;
use crate::registry::resolve_local_path;

/// A directory root on the local store.
pub struct SystemDir {
    root: PathBuf,
    display: String,
}

impl SystemDir {
    /// Canonicalize and open a directory root from locator path text.
    pub fn open(path_text: &str) -> Result<Self, VfsError> {
        let resolved = resolve_local_path(path_text);
        let root = fs::canonicalize(&resolved)?;
        let meta = fs::metadata(&root)?;
        if !meta.is_dir() {
            return Err(VfsError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {}", root.display()),
            )));
        }
        let display = display_path(&root);
        Ok(Self { root, display })
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.display
    }

    /// Recursively walk the root, one item per regular file.
    pub fn walk(&self) -> SystemEntries {
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .build();
        SystemEntries {
            root: self.root.clone(),
            walker,
        }
    }
}

/// Render a store path with forward slashes.
pub(crate) fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Recursive walk yielding one entry per regular file.
pub struct SystemEntries {
    root: PathBuf,
    walker: ignore::Walk,
}

impl Iterator for SystemEntries {
    type Item = Result<SystemEntry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dirent = match self.walker.next()? {
                Ok(d) => d,
                Err(e) => {
                    return Some(Err(VfsError::Io(io::Error::new(
                        io::ErrorKind::Other,
                        e,
                    ))))
                }
            };
            let is_file = dirent.file_type().map_or(false, |t| t.is_file());
            if !is_file {
                continue;
            }
            let relative = match dirent.path().strip_prefix(&self.root) {
                Ok(rel) => relative_display(rel),
                // The walker only yields paths under the root it was built
                // with; anything else is skipped.
                Err(_) => continue,
            };
            return Some(Ok(SystemEntry {
                full: dirent.into_path(),
                relative,
            }));
        }
    }
}

fn relative_display(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// One regular file under a directory root.
pub struct SystemEntry {
    full: PathBuf,
    relative: String,
}

impl SystemEntry {
    #[inline]
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    /// Absolute path on the store.
    #[inline]
    pub fn full_path(&self) -> &Path {
        &self.full
    }

    /// Open a fresh read handle on the file.
    pub fn open(&self) -> Result<File, VfsError> {
        File::open(&self.full).map_err(VfsError::Io)
    }
}
