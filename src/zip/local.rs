//! Forward-only local-file-header parsing over a byte stream.
//!
//! # Invariants
//! - The input is consumed strictly forward; no seeks are performed.
//! - Leading non-member bytes (self-extracting prefixes) are skipped by a
//!   byte-by-byte signature scan bounded by `max_leading_scan_bytes`; after
//!   the first member, records must be exactly adjacent.
//! - A payload is always fully drained before the next header is parsed, so
//!   the signature check never runs inside member data.
//!
//! # Algorithm
//! - Scan for the first local-file-header signature; a stream that never
//!   produces one yields zero members without error.
//! - Parse headers sequentially; a central-directory or end record
//!   terminates iteration.
//! - Known-size payloads are skipped by length; deflate payloads with a
//!   data descriptor are decoded to stream end and the descriptor consumed.
//!
//! # Not Supported
//! - Stored members with a data descriptor (length is undecidable without
//!   random access) and zip64 descriptors.

use std::io::{self, Read};

use flate2::{Decompress, FlushDecompress, Status};
use memchr::memmem;

use crate::config::ArchiveLimits;
use crate::error::ArchiveOpenCause;

use super::{
    is_dir_name, le_u16, le_u32, DESCRIPTOR_LEN, FLAG_DESCRIPTOR, FLAG_ENCRYPTED, LFH_LEN,
    METHOD_DEFLATE, METHOD_STORED, SIG_CDFH, SIG_DESCRIPTOR, SIG_EOCD, SIG_LFH,
};

const DRAIN_CHUNK: usize = 8192;

/// Metadata parsed from one local file header.
#[derive(Clone, Debug)]
pub struct LocalMember {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub is_dir: bool,
}

impl LocalMember {
    #[inline(always)]
    pub fn is_encrypted(&self) -> bool {
        (self.flags & FLAG_ENCRYPTED) != 0
    }

    #[inline(always)]
    pub fn has_descriptor(&self) -> bool {
        (self.flags & FLAG_DESCRIPTOR) != 0
    }
}

/// Rolling read buffer over a forward-only input.
struct StreamBuf<R> {
    input: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> StreamBuf<R> {
    fn new(input: R, buf_len: usize) -> Self {
        Self {
            input,
            buf: vec![0u8; buf_len],
            start: 0,
            end: 0,
            eof: false,
        }
    }

    #[inline(always)]
    fn avail(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    fn peek(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    #[inline(always)]
    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.avail());
        self.start += n;
    }

    /// Pull more bytes from the input, compacting first when the tail of the
    /// buffer is full. Sets `eof` on end of input.
    fn fill_more(&mut self) -> io::Result<()> {
        if self.eof {
            return Ok(());
        }
        if self.end == self.buf.len() {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        loop {
            match self.input.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Make at least `n` bytes available (`n` must fit the buffer).
    fn ensure(&mut self, n: usize) -> io::Result<()> {
        debug_assert!(n <= self.buf.len());
        while self.avail() < n && !self.eof {
            self.fill_more()?;
        }
        if self.avail() < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive stream truncated",
            ));
        }
        Ok(())
    }

    /// Discard exactly `n` bytes.
    fn skip(&mut self, mut n: u64) -> io::Result<()> {
        while n > 0 {
            if self.avail() == 0 {
                if self.eof {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "archive stream truncated",
                    ));
                }
                self.fill_more()?;
                continue;
            }
            let step = (self.avail() as u64).min(n) as usize;
            self.consume(step);
            n -= step as u64;
        }
        Ok(())
    }

    /// Read exactly `n` bytes into an owned vector (may exceed the rolling
    /// buffer length).
    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        let mut off = 0;
        while off < n {
            if self.avail() == 0 {
                if self.eof {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "archive stream truncated",
                    ));
                }
                self.fill_more()?;
                continue;
            }
            let step = self.avail().min(n - off);
            out[off..off + step].copy_from_slice(&self.buf[self.start..self.start + step]);
            self.consume(step);
            off += step;
        }
        Ok(out)
    }

    /// Read up to `dst.len()` bytes, returning 0 only at end of input.
    fn read_into(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        if self.avail() == 0 {
            if self.eof {
                return Ok(0);
            }
            self.fill_more()?;
            if self.avail() == 0 {
                return Ok(0);
            }
        }
        let step = self.avail().min(dst.len());
        dst[..step].copy_from_slice(&self.buf[self.start..self.start + step]);
        self.consume(step);
        Ok(step)
    }
}

/// Progress through the current member's payload.
enum Payload {
    None,
    /// Known-length payload consumed by length (stored members, and opaque
    /// skips of encrypted/unsupported members).
    Sized { remaining: u64 },
    Deflate {
        inflate: Box<Decompress>,
        /// Compressed bytes remaining when the length is known up front;
        /// `None` for descriptor members (decode to stream end).
        remaining_in: Option<u64>,
        descriptor: bool,
        done: bool,
    },
}

/// Single-pass cursor yielding members of a zip byte stream.
pub struct StreamCursor<R> {
    stream: StreamBuf<R>,
    payload: Payload,
    aligned: bool,
    finished: bool,
    leading_scanned: u64,
    members_seen: u32,
    max_leading: u64,
    max_name_len: usize,
    max_members: u32,
}

impl<R: Read> StreamCursor<R> {
    pub fn new(input: R, limits: &ArchiveLimits) -> Self {
        Self {
            stream: StreamBuf::new(input, limits.stream_buf_len),
            payload: Payload::None,
            aligned: false,
            finished: false,
            leading_scanned: 0,
            members_seen: 0,
            max_leading: limits.max_leading_scan_bytes,
            max_name_len: limits.max_member_name_len,
            max_members: limits.max_members,
        }
    }

    /// Advance to the next non-directory member, draining any unread bytes
    /// of the current payload first.
    ///
    /// Returns `None` at end of stream, at a central-directory or end
    /// record, or when no member signature exists in the scan window.
    pub fn next_member(&mut self) -> Result<Option<LocalMember>, ArchiveOpenCause> {
        if self.finished {
            return Ok(None);
        }
        self.finish_payload()?;

        loop {
            if !self.try_align()? {
                self.finished = true;
                return Ok(None);
            }

            let member = self.parse_header()?;

            if member.has_descriptor()
                && (member.is_encrypted() || member.method != METHOD_DEFLATE)
            {
                // Without random access there is no way to find the end of
                // such a payload.
                return Err(ArchiveOpenCause::Malformed(
                    "streamed member with undecidable length",
                ));
            }

            // Directory placeholders and members this strategy cannot decode
            // forward-only are consumed, not yielded.
            if member.is_dir || member.is_encrypted() || !is_supported_method(member.method) {
                self.set_payload(&member);
                self.finish_payload()?;
                continue;
            }

            self.set_payload(&member);
            return Ok(Some(member));
        }
    }

    /// Read decompressed payload bytes of the current member.
    pub fn read_payload(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let stream = &mut self.stream;
        match &mut self.payload {
            Payload::None => Ok(0),
            Payload::Sized { remaining } => {
                if *remaining == 0 || dst.is_empty() {
                    return Ok(0);
                }
                let cap = (*remaining).min(dst.len() as u64) as usize;
                let n = stream.read_into(&mut dst[..cap])?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "archive stream truncated",
                    ));
                }
                *remaining -= n as u64;
                Ok(n)
            }
            Payload::Deflate {
                inflate,
                remaining_in,
                done,
                ..
            } => {
                if *done || dst.is_empty() {
                    return Ok(0);
                }
                loop {
                    if stream.avail() == 0 && !stream.eof {
                        stream.fill_more()?;
                    }
                    let input = match remaining_in {
                        Some(r) => {
                            let cap = (*r).min(stream.avail() as u64) as usize;
                            &stream.peek()[..cap]
                        }
                        None => stream.peek(),
                    };
                    let no_input = input.is_empty();

                    let before_in = inflate.total_in();
                    let before_out = inflate.total_out();
                    let status = inflate
                        .decompress(input, dst, FlushDecompress::None)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    let consumed = (inflate.total_in() - before_in) as usize;
                    let produced = (inflate.total_out() - before_out) as usize;

                    stream.consume(consumed);
                    if let Some(r) = remaining_in {
                        *r -= consumed as u64;
                    }

                    match status {
                        Status::StreamEnd => {
                            *done = true;
                            return Ok(produced);
                        }
                        Status::Ok | Status::BufError => {
                            if produced > 0 {
                                return Ok(produced);
                            }
                            if no_input && stream.eof {
                                return Err(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    "archive stream truncated",
                                ));
                            }
                            if no_input && matches!(remaining_in, Some(0)) {
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    "deflate stream overruns compressed size",
                                ));
                            }
                            if !no_input && consumed == 0 {
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    "deflate stream stalled",
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    fn set_payload(&mut self, member: &LocalMember) {
        self.payload = if member.method == METHOD_DEFLATE
            && !member.is_encrypted()
            && !member.is_dir
        {
            if member.has_descriptor() {
                Payload::Deflate {
                    inflate: Box::new(Decompress::new(false)),
                    remaining_in: None,
                    descriptor: true,
                    done: false,
                }
            } else {
                Payload::Deflate {
                    inflate: Box::new(Decompress::new(false)),
                    remaining_in: Some(member.compressed_size),
                    descriptor: false,
                    done: false,
                }
            }
        } else {
            Payload::Sized {
                remaining: member.compressed_size,
            }
        };
    }

    /// Drain whatever remains of the current payload so the cursor sits on
    /// the next record boundary.
    fn finish_payload(&mut self) -> Result<(), ArchiveOpenCause> {
        // A payload with a known input length is skipped without decoding;
        // only descriptor members must be decoded to find their end.
        let skip = match &self.payload {
            Payload::None => return Ok(()),
            Payload::Sized { remaining } => Some(*remaining),
            Payload::Deflate {
                remaining_in: Some(r),
                ..
            } => Some(*r),
            Payload::Deflate {
                remaining_in: None, ..
            } => None,
        };
        match skip {
            Some(n) => self.stream.skip(n)?,
            None => {
                let mut scratch = [0u8; DRAIN_CHUNK];
                while !matches!(&self.payload, Payload::Deflate { done: true, .. }) {
                    self.read_payload(&mut scratch)?;
                }
                self.consume_descriptor()?;
            }
        }
        self.payload = Payload::None;
        Ok(())
    }

    fn consume_descriptor(&mut self) -> Result<(), ArchiveOpenCause> {
        self.stream.ensure(4)?;
        if le_u32(&self.stream.peek()[..4]) == SIG_DESCRIPTOR {
            self.stream.skip(4)?;
        }
        self.stream.skip(DESCRIPTOR_LEN as u64)?;
        Ok(())
    }

    /// Position the cursor on a local-file-header signature.
    ///
    /// Before the first member this scans byte-by-byte through arbitrary
    /// leading bytes; afterwards the next record must start immediately.
    /// Returns false when iteration should end (end records, end of input,
    /// or scan window exhausted).
    fn try_align(&mut self) -> Result<bool, ArchiveOpenCause> {
        if self.aligned {
            while self.stream.avail() < 4 && !self.stream.eof {
                self.stream.fill_more()?;
            }
            if self.stream.avail() == 0 {
                // Stream ended cleanly after a payload; archives written
                // without a central directory stop here.
                return Ok(false);
            }
            if self.stream.avail() < 4 {
                return Err(ArchiveOpenCause::Malformed("truncated record signature"));
            }
            return match le_u32(&self.stream.peek()[..4]) {
                SIG_LFH => Ok(true),
                SIG_CDFH | SIG_EOCD => Ok(false),
                _ => Err(ArchiveOpenCause::Malformed(
                    "expected member or end record",
                )),
            };
        }

        let finder = memmem::Finder::new(b"PK");
        loop {
            if self.leading_scanned > self.max_leading {
                return Ok(false);
            }
            while self.stream.avail() < 4 && !self.stream.eof {
                self.stream.fill_more()?;
            }
            if self.stream.avail() < 4 {
                return Ok(false);
            }
            match finder.find(self.stream.peek()) {
                Some(pos) if pos + 4 <= self.stream.avail() => {
                    if le_u32(&self.stream.peek()[pos..pos + 4]) == SIG_LFH {
                        self.stream.consume(pos);
                        self.leading_scanned += pos as u64;
                        self.aligned = true;
                        return Ok(true);
                    }
                    self.stream.consume(pos + 1);
                    self.leading_scanned += (pos + 1) as u64;
                }
                Some(pos) => {
                    // Candidate may straddle the buffer edge; drop the bytes
                    // before it and let the loop head refill.
                    self.stream.consume(pos);
                    self.leading_scanned += pos as u64;
                    if self.stream.eof {
                        return Ok(false);
                    }
                }
                None => {
                    // Keep one byte: a trailing 'P' may pair with the next
                    // chunk.
                    let drop = self.stream.avail() - 1;
                    self.stream.consume(drop);
                    self.leading_scanned += drop as u64;
                    if self.stream.eof {
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Parse the local file header at the cursor, charging the member count.
    fn parse_header(&mut self) -> Result<LocalMember, ArchiveOpenCause> {
        self.stream.ensure(LFH_LEN)?;
        let hdr = self.stream.read_bytes(LFH_LEN)?;
        debug_assert_eq!(le_u32(&hdr[0..4]), SIG_LFH);

        let flags = le_u16(&hdr[6..8]);
        let method = le_u16(&hdr[8..10]);
        let comp_size = le_u32(&hdr[18..22]);
        let uncomp_size = le_u32(&hdr[22..26]);
        let name_len = le_u16(&hdr[26..28]) as usize;
        let extra_len = le_u16(&hdr[28..30]) as usize;

        if name_len > self.max_name_len {
            return Err(ArchiveOpenCause::Malformed("member name exceeds limit"));
        }
        self.members_seen = self.members_seen.saturating_add(1);
        if self.members_seen > self.max_members {
            return Err(ArchiveOpenCause::Malformed("member count exceeds limit"));
        }

        let name_buf = self.stream.read_bytes(name_len)?;
        let name = String::from_utf8_lossy(&name_buf).into_owned();
        self.stream.skip(extra_len as u64)?;

        let is_dir = is_dir_name(&name);
        Ok(LocalMember {
            name,
            flags,
            method,
            compressed_size: u64::from(comp_size),
            uncompressed_size: u64::from(uncomp_size),
            is_dir,
        })
    }
}

#[inline(always)]
fn is_supported_method(method: u16) -> bool {
    method == METHOD_STORED || method == METHOD_DEFLATE
}
