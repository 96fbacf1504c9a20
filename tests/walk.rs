//! End-to-end enumeration tests over real archive fixtures.
//!
//! Fixtures are written with the `zip` crate into scratch space: a plain
//! jar, a jar nested inside another jar (stored, the way boot loaders ship
//! them), and streams with leading non-member bytes.

use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use resource_vfs::{classify, ArchiveLimits, Dir, Entry, LocatorKind, Vfs, VfsError, ZipDir};
use tempfile::TempDir;

/// Write a jar holding the given members (deflated).
fn write_jar(path: &Path, members: &[(&str, &[u8])]) {
    let mut file = fs::File::create(path).unwrap();
    let mut zw = zip::ZipWriter::new(&mut file);
    let opts =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in members {
        zw.start_file(*name, opts).unwrap();
        zw.write_all(data).unwrap();
    }
    zw.finish().unwrap();
    drop(zw);
    file.flush().unwrap();
}

/// Build `outer.jar` with `inner.jar` stored at `BOOT-INF/lib/inner.jar`.
fn write_nested_fixture(dir: &Path) -> (PathBuf, Vec<u8>) {
    let inner_path = dir.join("inner.jar");
    write_jar(
        &inner_path,
        &[("pack/empty.class", b"\xca\xfe\xba\xbe fixture")],
    );
    let inner_bytes = fs::read(&inner_path).unwrap();

    let outer_path = dir.join("outer.jar");
    let mut file = fs::File::create(&outer_path).unwrap();
    let mut zw = zip::ZipWriter::new(&mut file);
    let stored =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zw.start_file("BOOT-INF/lib/inner.jar", stored).unwrap();
    zw.write_all(&inner_bytes).unwrap();
    zw.start_file("META-INF/MANIFEST.MF", stored).unwrap();
    zw.write_all(b"Manifest-Version: 1.0\n").unwrap();
    zw.finish().unwrap();
    drop(zw);
    file.flush().unwrap();

    (outer_path, inner_bytes)
}

fn relative_paths(dir: &Dir) -> BTreeSet<String> {
    dir.entries()
        .map(|r| r.unwrap().relative_path().to_string())
        .collect()
}

fn read_all(entry: &Entry) -> Vec<u8> {
    let mut out = Vec::new();
    entry.open().unwrap().read_to_end(&mut out).unwrap();
    out
}

#[test]
fn plain_jar_file_walks_with_random_access() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("lib.jar");
    write_jar(&jar, &[("pack/a.class", b"a"), ("pack/b.class", b"b")]);

    let vfs = Vfs::with_defaults();
    let loc = vfs.parse(&format!("file:{}", jar.display())).unwrap();
    assert_eq!(classify(&loc).unwrap(), LocatorKind::ArchiveFile);

    let dir = vfs.open(&loc).unwrap();
    let canonical = fs::canonicalize(&jar).unwrap();
    assert_eq!(dir.path(), canonical.to_string_lossy().replace('\\', "/"));

    let got = relative_paths(&dir);
    assert_eq!(
        got,
        ["pack/a.class".to_string(), "pack/b.class".to_string()].into()
    );

    // Content reads are repeatable.
    let entry = dir
        .entries()
        .map(|r| r.unwrap())
        .find(|e| e.name() == "a.class")
        .unwrap();
    assert_eq!(read_all(&entry), b"a");
    assert_eq!(read_all(&entry), b"a");
}

#[test]
fn nested_locator_reports_its_own_decoded_path_not_the_outer_archive() {
    let tmp = TempDir::new().unwrap();
    let (outer, _) = write_nested_fixture(tmp.path());
    let vfs = Vfs::with_defaults();

    let text = format!("jar:file:{}!/BOOT-INF/lib/inner.jar", outer.display());
    let loc = vfs.parse(&text).unwrap();

    // Jar-in-jar: the nested random-access kind refuses it, the streamed
    // fallback takes it.
    assert!(!LocatorKind::NestedArchive.matches(&loc));
    assert_eq!(classify(&loc).unwrap(), LocatorKind::ArchiveStream);

    // Forced random access dereferences the outer file but represents the
    // inner resource: reported path is the locator's decoded path.
    let ra_dir = vfs.open_as(LocatorKind::NestedArchive, &loc).unwrap();
    assert_eq!(ra_dir.path(), loc.decoded_path());
    assert_ne!(ra_dir.path(), outer.to_string_lossy().replace('\\', "/"));
    // ...and the walk itself runs over the dereferenced outer archive.
    assert!(relative_paths(&ra_dir).contains("BOOT-INF/lib/inner.jar"));

    // The streamed kind reports the identical path: round-trip identity.
    let stream_dir = vfs.open_as(LocatorKind::ArchiveStream, &loc).unwrap();
    assert_eq!(stream_dir.path(), loc.decoded_path());
    assert_eq!(stream_dir.path(), ra_dir.path());
}

#[test]
fn jar_in_jar_streams_the_inner_archive_members() {
    let tmp = TempDir::new().unwrap();
    let (outer, _) = write_nested_fixture(tmp.path());
    let vfs = Vfs::with_defaults();

    let text = format!("jar:file:{}!/BOOT-INF/lib/inner.jar", outer.display());
    let loc = vfs.parse(&text).unwrap();
    let dir = vfs.open(&loc).unwrap();

    let mut entries = dir.entries();
    let entry = entries.next().unwrap().unwrap();
    assert_eq!(entry.name(), "empty.class");
    assert_eq!(entry.relative_path(), "pack/empty.class");
    assert_eq!(read_all(&entry), b"\xca\xfe\xba\xbe fixture");
    assert!(entries.next().is_none());
}

#[test]
fn nested_locator_with_empty_inner_path_opens_the_outer_archive() {
    let tmp = TempDir::new().unwrap();
    let (outer, _) = write_nested_fixture(tmp.path());
    let vfs = Vfs::with_defaults();

    let text = format!("jar:file:{}!/", outer.display());
    let loc = vfs.parse(&text).unwrap();
    assert_eq!(classify(&loc).unwrap(), LocatorKind::NestedArchive);

    let dir = vfs.open(&loc).unwrap();
    assert_eq!(dir.path(), loc.decoded_path());
    let got = relative_paths(&dir);
    assert!(got.contains("BOOT-INF/lib/inner.jar"));
    assert!(got.contains("META-INF/MANIFEST.MF"));
}

#[test]
fn streamed_walk_is_single_pass_and_invalidates_stale_entries() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("stream.jar");
    write_jar(&jar, &[("one", b"first"), ("two", b"second")]);

    let vfs = Vfs::with_defaults();
    let loc = vfs.parse(&format!("file:{}", jar.display())).unwrap();
    let dir = vfs.open_as(LocatorKind::ArchiveStream, &loc).unwrap();

    let mut walk = dir.entries();
    let one = walk.next().unwrap().unwrap();
    assert_eq!(read_all(&one), b"first");

    let two = walk.next().unwrap().unwrap();
    // The cursor moved: the first entry's accessor is dead.
    assert!(matches!(
        one.open().unwrap_err(),
        VfsError::StreamAlreadyConsumed { .. }
    ));
    assert_eq!(read_all(&two), b"second");
    assert!(walk.next().is_none());

    // Re-iterating the same directory instance never repeats entries.
    let mut again = dir.entries();
    match again.next() {
        Some(Err(VfsError::StreamAlreadyConsumed { .. })) | None => {}
        other => panic!("expected consumed stream, got entry: {:?}", other.is_some()),
    }
}

#[test]
fn streamed_walk_skips_self_extracting_prefix() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("clean.jar");
    write_jar(&jar, &[("payload.txt", b"data")]);

    let prefixed = tmp.path().join("sfx.jar");
    let mut bytes = b"#!/bin/sh\nexec unzip \"$0\"\n".to_vec();
    bytes.extend_from_slice(&[0x90u8; 2048]);
    bytes.extend_from_slice(&fs::read(&jar).unwrap());
    fs::write(&prefixed, bytes).unwrap();

    let vfs = Vfs::with_defaults();
    let loc = vfs.parse(&format!("file:{}", prefixed.display())).unwrap();
    let dir = vfs.open_as(LocatorKind::ArchiveStream, &loc).unwrap();

    let entries: Vec<Entry> = dir.entries().map(|r| r.unwrap()).collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].relative_path(), "payload.txt");
}

#[test]
fn stream_with_no_member_data_completes_empty() {
    let tmp = TempDir::new().unwrap();
    let noise = tmp.path().join("noise.jar");
    fs::write(&noise, vec![0x42u8; 4096]).unwrap();

    let vfs = Vfs::with_defaults();
    let loc = vfs.parse(&format!("file:{}", noise.display())).unwrap();
    let dir = vfs.open_as(LocatorKind::ArchiveStream, &loc).unwrap();
    assert_eq!(dir.entries().count(), 0);
}

#[test]
fn missing_and_empty_archives_fail_to_open_not_silently_empty() {
    let tmp = TempDir::new().unwrap();
    let vfs = Vfs::with_defaults();

    let missing = tmp.path().join("missing.jar");
    let loc = vfs.parse(&format!("file:{}", missing.display())).unwrap();
    assert_eq!(classify(&loc).unwrap(), LocatorKind::ArchiveFile);
    match vfs.open(&loc).unwrap_err() {
        VfsError::DirectoryCreationFailed { cause, .. } => {
            assert!(matches!(*cause, VfsError::ArchiveOpenFailed { .. }));
        }
        other => panic!("expected DirectoryCreationFailed, got {other}"),
    }

    let empty = tmp.path().join("empty.jar");
    fs::write(&empty, b"").unwrap();
    let loc = vfs.parse(&format!("file:{}", empty.display())).unwrap();
    assert!(matches!(
        vfs.open_as(LocatorKind::ArchiveFile, &loc).unwrap_err(),
        VfsError::ArchiveOpenFailed { .. }
    ));
}

#[test]
fn directory_with_spaces_round_trips_through_percent_encoding() {
    let tmp = TempDir::new().unwrap();
    let spaced = tmp.path().join("dir+with spaces");
    fs::create_dir(&spaced).unwrap();
    fs::write(spaced.join("note.txt"), b"hello").unwrap();

    let vfs = Vfs::with_defaults();
    let encoded = spaced.to_string_lossy().replace(' ', "%20");
    let loc = vfs.parse(&format!("file:{encoded}")).unwrap();
    assert_eq!(classify(&loc).unwrap(), LocatorKind::Directory);

    let dir = vfs.open(&loc).unwrap();
    let entries: Vec<Entry> = dir.entries().map(|r| r.unwrap()).collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].relative_path(), "note.txt");
    assert_eq!(read_all(&entries[0]), b"hello");
}

#[test]
fn distinct_members_can_be_read_concurrently() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("par.jar");
    let a = vec![b'a'; 100_000];
    let b = vec![b'b'; 100_000];
    write_jar(&jar, &[("big/a.bin", &a), ("big/b.bin", &b)]);

    let dir = ZipDir::open(&jar, "par".into(), &ArchiveLimits::default()).unwrap();
    let members: Vec<_> = dir.members().map(|r| r.unwrap()).collect();
    assert_eq!(members.len(), 2);

    std::thread::scope(|scope| {
        for member in &members {
            scope.spawn(move || {
                // Two interleaved reads of the same member on top of the
                // cross-member interleaving.
                let mut first = member.open().unwrap();
                let mut second = member.open().unwrap();
                let mut out_a = Vec::new();
                let mut out_b = Vec::new();
                first.read_to_end(&mut out_a).unwrap();
                second.read_to_end(&mut out_b).unwrap();
                assert_eq!(out_a.len(), 100_000);
                assert_eq!(out_a, out_b);
                let lead = out_a[0];
                assert!(out_a.iter().all(|&byte| byte == lead));
            });
        }
    });
}

#[test]
fn oversized_member_names_fail_enumeration_explicitly() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("long.jar");
    let long_name = "n".repeat(512);
    write_jar(&jar, &[(long_name.as_str(), b"x")]);

    let tight = ArchiveLimits {
        max_member_name_len: 64,
        ..ArchiveLimits::default()
    };
    let dir = ZipDir::open(&jar, "long".into(), &tight).unwrap();
    let results: Vec<_> = dir.members().collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(VfsError::ArchiveOpenFailed { .. })
    ));
}

#[test]
fn plain_directory_walk_reports_membership_not_order() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("a/b")).unwrap();
    fs::write(tmp.path().join("top.txt"), b"1").unwrap();
    fs::write(tmp.path().join("a/mid.txt"), b"2").unwrap();
    fs::write(tmp.path().join("a/b/deep.bin"), b"3").unwrap();

    let vfs = Vfs::with_defaults();
    let loc = vfs
        .parse(&format!("file:{}", tmp.path().display()))
        .unwrap();
    let dir = vfs.open(&loc).unwrap();

    let got = relative_paths(&dir);
    let want: BTreeSet<String> = [
        "top.txt".to_string(),
        "a/mid.txt".to_string(),
        "a/b/deep.bin".to_string(),
    ]
    .into();
    assert_eq!(got, want);
}
