//! Random-access central-directory parsing and member readers.
//!
//! # Invariants
//! - The end-of-central-directory record is located and validated before any
//!   member is reported; a container without one never yields a reader.
//! - Member iteration is sequential over the central directory region; every
//!   payload read opens its own file handle, so concurrent reads of
//!   distinct members never share a cursor.
//!
//! # Algorithm
//! - Scan a bounded tail window backward for the EOCD signature, skipping
//!   false positives whose comment length does not fit the window.
//! - Walk central directory file headers from `cd_off`, validating each
//!   record's signature, name length, and zip64 sentinels.
//! - To open a member, re-validate its local header and hand out a reader
//!   bounded to the compressed payload.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Take};

use flate2::read::DeflateDecoder;

use crate::config::ArchiveLimits;
use crate::error::ArchiveOpenCause;

use super::{
    is_dir_name, le_u16, le_u32, read_exact_n, CDFH_LEN, EOCD_MIN_LEN, FLAG_ENCRYPTED, LFH_LEN,
    METHOD_DEFLATE, METHOD_STORED, SIG_CDFH, SIG_EOCD, SIG_LFH,
};

/// Parsed end-of-central-directory summary.
#[derive(Clone, Copy, Debug)]
pub struct CentralDirectory {
    pub cd_off: u64,
    pub cd_end: u64,
    pub member_count: u32,
}

/// Central-directory metadata for one member.
#[derive(Clone, Debug)]
pub struct MemberMeta {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub is_dir: bool,
}

impl MemberMeta {
    #[inline(always)]
    pub fn is_encrypted(&self) -> bool {
        (self.flags & FLAG_ENCRYPTED) != 0
    }
}

/// Locate and validate the end-of-central-directory record.
///
/// Fails on containers that are too short to hold one, carry no record in
/// the search window, span multiple disks, or use zip64 fields.
pub fn parse_central_directory(
    file: &File,
    file_len: u64,
    limits: &ArchiveLimits,
) -> Result<CentralDirectory, ArchiveOpenCause> {
    if file_len < EOCD_MIN_LEN as u64 {
        return Err(ArchiveOpenCause::Malformed(
            "too short for an end-of-central-directory record",
        ));
    }

    let win_len = (file_len as usize).min(limits.eocd_search_max);
    let win_off = file_len - win_len as u64;
    let mut win = vec![0u8; win_len];
    let mut f = file;
    f.seek(SeekFrom::Start(win_off))?;
    read_exact_n(&mut f, &mut win)?;

    // Scan backward; a signature whose comment does not fit the window is a
    // false positive inside comment or payload bytes.
    let mut candidate = None;
    if win_len >= EOCD_MIN_LEN {
        let mut i = win_len - EOCD_MIN_LEN;
        loop {
            if le_u32(&win[i..i + 4]) == SIG_EOCD {
                let comment_len = le_u16(&win[i + 20..i + 22]) as usize;
                if i + EOCD_MIN_LEN + comment_len <= win_len {
                    candidate = Some(i);
                    break;
                }
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }
    }
    let eocd_rel = match candidate {
        Some(i) => i,
        None => {
            return Err(ArchiveOpenCause::Malformed(
                "no end-of-central-directory record",
            ))
        }
    };

    let eocd = &win[eocd_rel..];
    let disk_no = le_u16(&eocd[4..6]);
    let cd_disk = le_u16(&eocd[6..8]);
    let entries_disk = le_u16(&eocd[8..10]);
    let entries_total = le_u16(&eocd[10..12]);
    let cd_size = le_u32(&eocd[12..16]);
    let cd_off = le_u32(&eocd[16..20]);

    if disk_no != 0 || cd_disk != 0 || entries_disk != entries_total {
        return Err(ArchiveOpenCause::Malformed("multi-disk archive"));
    }
    if entries_total == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_off == 0xFFFF_FFFF {
        return Err(ArchiveOpenCause::Malformed("zip64 archive"));
    }
    if u32::from(entries_total) > limits.max_members {
        return Err(ArchiveOpenCause::Malformed("member count exceeds limit"));
    }

    let cd_off = u64::from(cd_off);
    let cd_end = cd_off.saturating_add(u64::from(cd_size));
    if cd_off > file_len || cd_end > file_len {
        return Err(ArchiveOpenCause::Malformed(
            "central directory outside archive bounds",
        ));
    }

    Ok(CentralDirectory {
        cd_off,
        cd_end,
        member_count: u32::from(entries_total),
    })
}

/// Read the central-directory header at `pos`.
///
/// Returns the member metadata and the position of the following header, or
/// `None` once `pos` reaches the end of the central directory region.
pub fn read_member_header(
    file: &File,
    pos: u64,
    cd_end: u64,
    limits: &ArchiveLimits,
) -> Result<Option<(MemberMeta, u64)>, ArchiveOpenCause> {
    if pos >= cd_end {
        return Ok(None);
    }
    if pos.saturating_add(CDFH_LEN as u64) > cd_end {
        return Err(ArchiveOpenCause::Malformed(
            "truncated central directory header",
        ));
    }

    let mut f = file;
    f.seek(SeekFrom::Start(pos))?;
    let mut hdr = [0u8; CDFH_LEN];
    read_exact_n(&mut f, &mut hdr)?;

    if le_u32(&hdr[0..4]) != SIG_CDFH {
        return Err(ArchiveOpenCause::Malformed(
            "bad central directory signature",
        ));
    }

    let flags = le_u16(&hdr[8..10]);
    let method = le_u16(&hdr[10..12]);
    let comp_size = le_u32(&hdr[20..24]);
    let uncomp_size = le_u32(&hdr[24..28]);
    let name_len = le_u16(&hdr[28..30]) as usize;
    let extra_len = le_u16(&hdr[30..32]) as usize;
    let comment_len = le_u16(&hdr[32..34]) as usize;
    let lfh_off = le_u32(&hdr[42..46]);

    if comp_size == 0xFFFF_FFFF || uncomp_size == 0xFFFF_FFFF || lfh_off == 0xFFFF_FFFF {
        return Err(ArchiveOpenCause::Malformed("zip64 member"));
    }
    if name_len > limits.max_member_name_len {
        return Err(ArchiveOpenCause::Malformed("member name exceeds limit"));
    }

    let mut name_buf = vec![0u8; name_len];
    read_exact_n(&mut f, &mut name_buf)?;
    let name = String::from_utf8_lossy(&name_buf).into_owned();
    let is_dir = is_dir_name(&name);

    let var_total = name_len
        .saturating_add(extra_len)
        .saturating_add(comment_len);
    let next = pos.saturating_add((CDFH_LEN + var_total) as u64);
    if next > cd_end {
        return Err(ArchiveOpenCause::Malformed(
            "central directory record overruns region",
        ));
    }

    Ok(Some((
        MemberMeta {
            name,
            flags,
            method,
            compressed_size: u64::from(comp_size),
            uncompressed_size: u64::from(uncomp_size),
            local_header_offset: u64::from(lfh_off),
            is_dir,
        },
        next,
    )))
}

/// Open an independent reader onto one member's decompressed bytes.
///
/// Opens a fresh handle on the archive (a duplicated descriptor would share
/// its seek offset), validates the local header against the central
/// directory record, and bounds the payload read to the compressed size.
/// Readers for distinct members, or repeated reads of the same member, do
/// not interfere.
pub fn open_member(
    archive: &std::path::Path,
    meta: &MemberMeta,
) -> Result<MemberReader, ArchiveOpenCause> {
    if meta.is_encrypted() {
        return Err(ArchiveOpenCause::Malformed("encrypted member"));
    }

    let mut handle = File::open(archive)?;
    let file_len = handle.metadata()?.len();
    if meta
        .local_header_offset
        .saturating_add(LFH_LEN as u64)
        > file_len
    {
        return Err(ArchiveOpenCause::Malformed(
            "local header outside archive bounds",
        ));
    }

    handle.seek(SeekFrom::Start(meta.local_header_offset))?;
    let mut lfh = [0u8; LFH_LEN];
    read_exact_n(&mut handle, &mut lfh)?;
    if le_u32(&lfh[0..4]) != SIG_LFH {
        return Err(ArchiveOpenCause::Malformed("bad local header signature"));
    }

    let name_len = u64::from(le_u16(&lfh[26..28]));
    let extra_len = u64::from(le_u16(&lfh[28..30]));
    let data_start = meta
        .local_header_offset
        .saturating_add(LFH_LEN as u64)
        .saturating_add(name_len)
        .saturating_add(extra_len);
    let data_end = data_start.saturating_add(meta.compressed_size);
    if data_start > file_len || data_end > file_len {
        return Err(ArchiveOpenCause::Malformed(
            "member payload outside archive bounds",
        ));
    }

    handle.seek(SeekFrom::Start(data_start))?;
    let take = handle.take(meta.compressed_size);
    match meta.method {
        METHOD_STORED => Ok(MemberReader::Stored(take)),
        METHOD_DEFLATE => Ok(MemberReader::Deflate(DeflateDecoder::new(take))),
        _ => Err(ArchiveOpenCause::Malformed("unsupported compression method")),
    }
}

/// Decompressed reader over one member, owning its file handle.
pub enum MemberReader {
    Stored(Take<File>),
    Deflate(DeflateDecoder<Take<File>>),
}

impl Read for MemberReader {
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self {
            MemberReader::Stored(r) => r.read(dst),
            MemberReader::Deflate(r) => r.read(dst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn limits() -> ArchiveLimits {
        ArchiveLimits::default()
    }

    fn write_fixture(members: &[(&str, &[u8])]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        {
            let mut zw = zip::ZipWriter::new(tmp.as_file_mut());
            let opts = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            for (name, data) in members {
                zw.start_file(*name, opts).unwrap();
                zw.write_all(data).unwrap();
            }
            zw.finish().unwrap();
        }
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn parses_and_reads_members() {
        let tmp = write_fixture(&[("pack/a.class", b"alpha"), ("b.txt", b"beta")]);
        let file = tmp.reopen().unwrap();
        let file_len = file.metadata().unwrap().len();

        let cd = parse_central_directory(&file, file_len, &limits()).unwrap();
        assert_eq!(cd.member_count, 2);

        let (first, next) = read_member_header(&file, cd.cd_off, cd.cd_end, &limits())
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "pack/a.class");
        assert!(!first.is_dir);

        let mut out = Vec::new();
        open_member(tmp.path(), &first)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"alpha");

        let (second, after) = read_member_header(&file, next, cd.cd_end, &limits())
            .unwrap()
            .unwrap();
        assert_eq!(second.name, "b.txt");
        assert!(read_member_header(&file, after, cd.cd_end, &limits())
            .unwrap()
            .is_none());
    }

    #[test]
    fn repeated_opens_are_independent() {
        let tmp = write_fixture(&[("x", b"payload")]);
        let file = tmp.reopen().unwrap();
        let file_len = file.metadata().unwrap().len();
        let cd = parse_central_directory(&file, file_len, &limits()).unwrap();
        let (meta, _) = read_member_header(&file, cd.cd_off, cd.cd_end, &limits())
            .unwrap()
            .unwrap();

        let mut a = open_member(tmp.path(), &meta).unwrap();
        let mut b = open_member(tmp.path(), &meta).unwrap();
        let mut out_a = Vec::new();
        let mut out_b = Vec::new();
        a.read_to_end(&mut out_a).unwrap();
        b.read_to_end(&mut out_b).unwrap();
        assert_eq!(out_a, b"payload");
        assert_eq!(out_b, b"payload");
    }

    #[test]
    fn empty_file_is_not_an_archive() {
        let tmp = NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        let err = parse_central_directory(&file, 0, &limits()).unwrap_err();
        assert!(matches!(err, ArchiveOpenCause::Malformed(_)));
    }

    #[test]
    fn garbage_tail_is_rejected() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&[0xAAu8; 256]).unwrap();
        tmp.flush().unwrap();
        let file = tmp.reopen().unwrap();
        let err = parse_central_directory(&file, 256, &limits()).unwrap_err();
        assert!(matches!(err, ArchiveOpenCause::Malformed(_)));
    }

    #[test]
    fn member_count_limit_enforced() {
        let tmp = write_fixture(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let file = tmp.reopen().unwrap();
        let file_len = file.metadata().unwrap().len();
        let tight = ArchiveLimits {
            max_members: 2,
            ..ArchiveLimits::default()
        };
        let err = parse_central_directory(&file, file_len, &tight).unwrap_err();
        assert!(matches!(
            err,
            ArchiveOpenCause::Malformed("member count exceeds limit")
        ));
    }
}
