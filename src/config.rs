//! Enumeration policy and hard limits.
//!
//! # Invariants
//! - All limits are hard bounds and must be internally consistent.
//! - Archive metadata is treated as hostile input: sizes, counts, and names
//!   are untrusted and validated against these bounds before use.
//!
//! # Design Notes
//! - Limits are shared by the random-access and streamed strategies to keep
//!   behavior consistent regardless of which path an archive takes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default maximum number of members processed per archive.
pub const DEFAULT_MAX_MEMBERS: u32 = 65_534;
/// Default maximum member name length in bytes.
pub const DEFAULT_MAX_MEMBER_NAME_LEN: usize = 4 * 1024;
/// Default end-of-central-directory search window (64 KiB comment + margin).
pub const DEFAULT_EOCD_SEARCH_MAX: usize = 66 * 1024;
/// Default bound on leading non-member bytes scanned by the streamed strategy.
pub const DEFAULT_MAX_LEADING_SCAN_BYTES: u64 = 8 * 1024 * 1024;
/// Default rolling buffer length for the streamed strategy.
pub const DEFAULT_STREAM_BUF_LEN: usize = 64 * 1024;

/// Hard bounds applied while parsing archive containers.
///
/// Both archive strategies enforce these; exceeding a bound fails the walk
/// explicitly rather than degrading into partial silent output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveLimits {
    /// Maximum number of members read per archive.
    pub max_members: u32,
    /// Maximum member name length in bytes.
    pub max_member_name_len: usize,
    /// Tail window searched for the end-of-central-directory record.
    pub eocd_search_max: usize,
    /// Maximum leading bytes scanned for the first member signature before
    /// the streamed strategy gives up and reports zero members.
    pub max_leading_scan_bytes: u64,
    /// Rolling buffer length for forward-only stream parsing.
    pub stream_buf_len: usize,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_members: DEFAULT_MAX_MEMBERS,
            max_member_name_len: DEFAULT_MAX_MEMBER_NAME_LEN,
            eocd_search_max: DEFAULT_EOCD_SEARCH_MAX,
            max_leading_scan_bytes: DEFAULT_MAX_LEADING_SCAN_BYTES,
            stream_buf_len: DEFAULT_STREAM_BUF_LEN,
        }
    }
}

/// Validation error returned by `ArchiveLimits::validate`.
///
/// Callers should treat this as a configuration bug, not hostile input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LimitsError {
    MaxMembersZero,
    MaxMemberNameLenZero,
    EocdSearchWindowTooSmall { window: usize },
    StreamBufTooSmall { len: usize },
}

/// Minimum end-of-central-directory record length; the search window must
/// hold at least one full record.
pub(crate) const EOCD_MIN_LEN: usize = 22;

/// The stream buffer must hold a full local header plus a name prefix.
pub(crate) const STREAM_BUF_MIN: usize = 1024;

impl ArchiveLimits {
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.max_members == 0 {
            return Err(LimitsError::MaxMembersZero);
        }
        if self.max_member_name_len == 0 {
            return Err(LimitsError::MaxMemberNameLenZero);
        }
        if self.eocd_search_max < EOCD_MIN_LEN {
            return Err(LimitsError::EocdSearchWindowTooSmall {
                window: self.eocd_search_max,
            });
        }
        if self.stream_buf_len < STREAM_BUF_MIN {
            return Err(LimitsError::StreamBufTooSmall {
                len: self.stream_buf_len,
            });
        }
        Ok(())
    }
}

impl fmt::Display for LimitsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitsError::MaxMembersZero => write!(f, "max_members must be > 0"),
            LimitsError::MaxMemberNameLenZero => {
                write!(f, "max_member_name_len must be > 0")
            }
            LimitsError::EocdSearchWindowTooSmall { window } => {
                write!(
                    f,
                    "eocd_search_max must be >= {EOCD_MIN_LEN}, got {window}"
                )
            }
            LimitsError::StreamBufTooSmall { len } => {
                write!(f, "stream_buf_len must be >= {STREAM_BUF_MIN}, got {len}")
            }
        }
    }
}

impl std::error::Error for LimitsError {}
