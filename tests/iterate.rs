use std::{
    fs::File,
    io::{ErrorKind, Write},
};

use similar_asserts::assert_eq;
use tar::{Builder, EntryType, Header};
use tempfile::NamedTempFile;

use tar_entries::{
    ArchiveEntry, ArchiveEntryIterator, RawTarEntry, TarEntryIterator, TarStream, TarStreamOptions,
};

fn header(entry_type: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_uid(1000);
    header.set_gid(1000);
    header.set_mtime(1234567890);
    header.set_username("alice").unwrap();
    header.set_groupname("staff").unwrap();
    header
}

/// Appends a member whose name is stored verbatim, trailing slash included
fn append_verbatim(
    builder: &mut Builder<&mut Vec<u8>>,
    mut header: Header,
    name: &str,
    data: &[u8],
) {
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_cksum();
    builder.append(&header, data).unwrap();
}

fn dir_and_file_archive() -> Vec<u8> {
    let mut tar_data = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_data);
        append_verbatim(
            &mut builder,
            header(EntryType::Directory, 0o755, 0),
            "dir/",
            b"",
        );
        append_verbatim(
            &mut builder,
            header(EntryType::Regular, 0o644, 42),
            "dir/file.txt",
            &[b'x'; 42],
        );
        builder.finish().unwrap();
    }
    tar_data
}

fn collect_paths(entries: &mut impl ArchiveEntryIterator) -> Vec<String> {
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().unwrap() {
        paths.push(entry.path().to_owned());
    }
    paths
}

#[test]
fn test_directory_and_file() {
    let tar_data = dir_and_file_archive();
    let mut entries = TarEntryIterator::from_reader(&tar_data[..]).unwrap();

    assert!(entries.has_next_entry());
    let first = entries.next_entry().unwrap().unwrap();
    assert_eq!(first.path(), "dir/");
    assert!(first.is_directory());
    assert_eq!(first.name(), "dir");
    assert_eq!(first.permissions().to_string(), "rwxr-xr-x");

    let second = entries.next_entry().unwrap().unwrap();
    assert_eq!(second.path(), "dir/file.txt");
    assert_eq!(second.size(), 42);
    assert!(!second.is_directory());
    assert_eq!(second.mtime(), 1234567890);
    assert_eq!(second.owner(), "alice");
    assert_eq!(second.group(), "staff");
    assert_eq!(second.depth(), 2);

    assert!(!entries.has_next_entry());
    assert!(entries.next_entry().unwrap().is_none());
    entries.close().unwrap();
}

#[test]
fn test_empty_archive() {
    let mut tar_data = Vec::new();
    Builder::new(&mut tar_data).finish().unwrap();

    let mut entries = TarEntryIterator::from_reader(&tar_data[..]).unwrap();
    assert!(!entries.has_next_entry());
    assert!(entries.next_entry().unwrap().is_none());
    assert!(entries.current_entry().is_none());
}

#[test]
fn test_type_bits_are_masked() {
    let mut tar_data = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_data);
        // some writers store the file type in the mode field as well
        append_verbatim(
            &mut builder,
            header(EntryType::Regular, 0o104755, 3),
            "setuid-binary",
            b"bin",
        );
        builder.finish().unwrap();
    }

    let mut entries = TarEntryIterator::from_reader(&tar_data[..]).unwrap();
    let entry = entries.next_entry().unwrap().unwrap();
    assert_eq!(entry.permissions().bits(), 0o755);

    let raw = entry.entry_object::<RawTarEntry>().unwrap();
    assert_eq!(raw.mode, 0o104755);
    assert_eq!(raw.entry_type, EntryType::Regular);
}

#[test]
fn test_back_reference_keeps_format_details() {
    let mut tar_data = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_data);
        let mut link = header(EntryType::Symlink, 0o777, 0);
        builder
            .append_link(&mut link, "current", "releases/v2")
            .unwrap();
        builder.finish().unwrap();
    }

    let mut entries = TarEntryIterator::from_reader(&tar_data[..]).unwrap();
    let entry = entries.next_entry().unwrap().unwrap();
    let raw = entry.entry_object::<RawTarEntry>().unwrap();
    assert_eq!(raw.entry_type, EntryType::Symlink);
    assert_eq!(raw.link_name.as_deref(), Some("releases/v2"));
    assert_eq!(raw.header.entry_type(), EntryType::Symlink);
}

#[test]
fn test_corrupt_member_ends_iteration() {
    let mut tar_data = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_data);
        for name in ["a", "b", "c", "d"] {
            append_verbatim(&mut builder, header(EntryType::Regular, 0o644, 1), name, b"!");
        }
        builder.finish().unwrap();
    }
    // every member is one header block plus one data block; break the checksum of "c"
    tar_data[2 * 1024 + 100] ^= 0x7f;

    let mut entries = TarEntryIterator::from_reader(&tar_data[..]).unwrap();
    assert_eq!(entries.next_entry().unwrap().unwrap().path(), "a");

    // reading "c" as lookahead fails while "b" is being returned
    let err = entries.next_entry().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert_eq!(entries.current_entry().unwrap().path(), "b");

    assert!(!entries.has_next_entry());
    assert!(entries.next_entry().unwrap().is_none());
}

#[test]
fn test_iterator_adapter() {
    let tar_data = dir_and_file_archive();
    let entries = TarEntryIterator::from_reader(&tar_data[..]).unwrap();

    let files: Vec<ArchiveEntry> = entries
        .collect::<tar_entries::Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .filter(|entry| !entry.is_directory())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path(), "dir/file.txt");
}

#[test]
fn test_concatenated_archives() {
    let archive = dir_and_file_archive();
    let concatenated = [archive.clone(), archive].concat();

    let mut entries = TarEntryIterator::from_reader(&concatenated[..]).unwrap();
    assert_eq!(collect_paths(&mut entries), vec!["dir/", "dir/file.txt"]);

    let stream = TarStream::with_options(
        &concatenated[..],
        TarStreamOptions { ignore_zeros: true },
    );
    let mut entries = TarEntryIterator::new(stream).unwrap();
    assert_eq!(
        collect_paths(&mut entries),
        vec!["dir/", "dir/file.txt", "dir/", "dir/file.txt"]
    );
}

#[test]
fn test_read_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&dir_and_file_archive()).unwrap();

    let mut entries = TarEntryIterator::from_reader(File::open(file.path()).unwrap()).unwrap();
    assert_eq!(collect_paths(&mut entries), vec!["dir/", "dir/file.txt"]);

    entries.close().unwrap();
    assert!(entries.get_ref().is_closed());
    // closing twice is harmless
    entries.close().unwrap();
}

#[test]
fn test_oversized_member_is_an_error() {
    let mut huge = header(EntryType::Regular, 0o644, u64::MAX);
    huge.as_old_mut().name[..4].copy_from_slice(b"huge");
    huge.set_cksum();
    let tar_data = [huge.as_bytes(), &[0u8; 1024][..]].concat();

    let err = TarEntryIterator::from_reader(&tar_data[..]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_dangling_long_link_is_an_error() {
    let target = b"some/far/away/target\0";
    let mut long_link = Header::new_gnu();
    long_link.set_size(target.len() as u64);
    long_link.set_entry_type(EntryType::GNULongLink);
    long_link.as_old_mut().name[..13].copy_from_slice(b"././@LongLink");
    long_link.set_cksum();

    let mut tar_data = long_link.as_bytes().to_vec();
    tar_data.extend_from_slice(target);
    tar_data.resize(512 * 4, 0);

    let err = TarEntryIterator::from_reader(&tar_data[..]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}
