//! Forward-only tar stream reading.
//!
//! [`TarStream`] walks a tar byte stream one member header at a time and hands out a
//! [`RawTarEntry`] per member.  GNU long name/link records and PAX extended headers are folded
//! into the member they describe, so callers only ever see real members.  Member data is skipped
//! lazily: the stream stays positioned at the data of the last returned member until the next
//! header is requested.
//!
//! The [`RawEntrySource`] trait is the seam between this reader and
//! [`TarEntryIterator`](crate::iterator::TarEntryIterator).

use std::io::{self, ErrorKind, Read};

use log::{debug, trace};
use tar::{EntryType, Header, PaxExtensions};

use crate::util::{read_exactish, read_vec, skip_exact};

const TAR_BLOCK_SIZE: u64 = 512;

/// GNU long name/link records and PAX headers larger than this are rejected as malformed.
const MAX_EXTENSION_SIZE: u64 = 1024 * 1024;

/// A forward-only cursor over raw tar member descriptors.
pub trait RawEntrySource {
    /// Advances past the current member and returns the next one, or `None` at the end of the
    /// archive.
    fn next_raw_entry(&mut self) -> io::Result<Option<RawTarEntry>>;

    /// Releases the underlying stream.
    fn close(&mut self) -> io::Result<()>;
}

/// The metadata of one tar member, as decoded from its header and any extension records that
/// preceded it.
#[derive(Debug, Clone)]
pub struct RawTarEntry {
    /// Member path as stored, including the UStar prefix and any trailing `/`.
    pub name: String,
    pub entry_type: EntryType,
    /// Size of the member data in bytes.
    pub size: u64,
    /// The raw mode field, which may include file type bits.
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: i64,
    /// Owning user name; empty if the header doesn't carry one.
    pub user_name: String,
    /// Owning group name; empty if the header doesn't carry one.
    pub group_name: String,
    /// Target of a hard or symbolic link.
    pub link_name: Option<String>,
    /// The member's own header block.
    pub header: Header,
}

impl RawTarEntry {
    /// A member is a directory if its type says so or, for old archives, if its name ends in `/`.
    pub fn is_directory(&self) -> bool {
        self.entry_type.is_dir() || self.name.ends_with('/')
    }
}

/// Options for [`TarStream`].
#[derive(Debug, Clone, Default)]
pub struct TarStreamOptions {
    /// Skip all-zero blocks instead of treating the first one as the end of the archive.  This
    /// allows reading concatenated archives.
    pub ignore_zeros: bool,
}

/// Values from GNU long name/link records and PAX extended headers that apply to the next member.
#[derive(Default)]
struct Overrides {
    name: Option<Vec<u8>>,
    link_name: Option<Vec<u8>>,
    size: Option<u64>,
    mtime: Option<i64>,
    uid: Option<u64>,
    gid: Option<u64>,
    user_name: Option<Vec<u8>>,
    group_name: Option<Vec<u8>>,
}

impl Overrides {
    fn apply_pax(&mut self, content: &[u8]) -> io::Result<()> {
        for item in PaxExtensions::new(content) {
            let extension = item?;
            let key = extension
                .key()
                .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
            let value = extension.value_bytes();

            match key {
                "path" => self.name = Some(value.to_vec()),
                "linkpath" => self.link_name = Some(value.to_vec()),
                "uname" => self.user_name = Some(value.to_vec()),
                "gname" => self.group_name = Some(value.to_vec()),
                "size" => self.size = Some(parse_pax_number(key, value)?),
                "uid" => self.uid = Some(parse_pax_number(key, value)?),
                "gid" => self.gid = Some(parse_pax_number(key, value)?),
                "mtime" => {
                    // fractional seconds are dropped
                    let value = value.split(|c| *c == b'.').next().unwrap_or_default();
                    self.mtime = Some(parse_pax_number(key, value)?);
                }
                _ => trace!("ignoring pax record {key}"),
            }
        }
        Ok(())
    }
}

fn parse_pax_number<T: std::str::FromStr>(key: &str, value: &[u8]) -> io::Result<T> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "invalid pax {key} value {:?}",
                    String::from_utf8_lossy(value)
                ),
            )
        })
}

/// The space `size` bytes of member data occupy, padding to the next block included.
fn padded_size(size: u64, offset: u64) -> io::Result<u64> {
    size.checked_next_multiple_of(TAR_BLOCK_SIZE).ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("invalid member size {size} at offset {offset}"),
        )
    })
}

/// Extension records describe the member after them; running into the end of the archive instead
/// means the archive is corrupt.
fn check_no_orphans(has_extensions: bool, offset: u64) -> io::Result<()> {
    if !has_extensions {
        return Ok(());
    }
    Err(io::Error::new(
        ErrorKind::InvalidData,
        format!("extension records without a following member at offset {offset}"),
    ))
}

fn string_from_tar(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// GNU long name/link records are NUL terminated.
fn trim_nul(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

fn verify_checksum(header: &Header, offset: u64) -> io::Result<()> {
    let bytes = header.as_bytes();
    // the checksum field itself is summed as if it were all spaces
    let computed: u32 = bytes[..148]
        .iter()
        .chain(&[b' '; 8])
        .chain(&bytes[156..])
        .map(|b| u32::from(*b))
        .sum();
    let stored = header.cksum()?;

    if computed != stored {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!(
                "tar header checksum mismatch at offset {offset}: stored {stored}, computed {computed}"
            ),
        ));
    }
    Ok(())
}

fn raw_entry_from_header(
    header: Header,
    overrides: Overrides,
    size: u64,
) -> io::Result<RawTarEntry> {
    let name = match overrides.name {
        Some(name) => string_from_tar(&name),
        None => string_from_tar(&header.path_bytes()),
    };
    let link_name = match overrides.link_name {
        Some(link) => Some(string_from_tar(&link)),
        None => header.link_name_bytes().map(|link| string_from_tar(&link)),
    };
    let user_name = match overrides.user_name {
        Some(user) => string_from_tar(&user),
        None => header.username_bytes().map(string_from_tar).unwrap_or_default(),
    };
    let group_name = match overrides.group_name {
        Some(group) => string_from_tar(&group),
        None => header.groupname_bytes().map(string_from_tar).unwrap_or_default(),
    };
    let uid = match overrides.uid {
        Some(uid) => uid,
        None => header.uid()?,
    };
    let gid = match overrides.gid {
        Some(gid) => gid,
        None => header.gid()?,
    };
    let mtime = match overrides.mtime {
        Some(mtime) => mtime,
        None => i64::try_from(header.mtime()?).map_err(|_| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("mtime of {:?} out of range", String::from_utf8_lossy(&header.path_bytes())),
            )
        })?,
    };

    Ok(RawTarEntry {
        name,
        entry_type: header.entry_type(),
        size,
        mode: header.mode()?,
        uid,
        gid,
        mtime,
        user_name,
        group_name,
        link_name,
        header,
    })
}

/// Reads [`RawTarEntry`] values from a tar byte stream.
pub struct TarStream<R: Read> {
    reader: Option<R>,
    options: TarStreamOptions,
    /// Bytes of member data (plus padding) between the stream position and the next header.
    remaining: u64,
    /// Number of bytes consumed from the reader so far.
    position: u64,
    done: bool,
}

impl<R: Read> TarStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, TarStreamOptions::default())
    }

    pub fn with_options(reader: R, options: TarStreamOptions) -> Self {
        TarStream {
            reader: Some(reader),
            options,
            remaining: 0,
            position: 0,
            done: false,
        }
    }

    /// Number of bytes consumed from the underlying reader.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns true once [`close()`](RawEntrySource::close) was called.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl<R: Read> RawEntrySource for TarStream<R> {
    fn next_raw_entry(&mut self) -> io::Result<Option<RawTarEntry>> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(io::Error::new(ErrorKind::Other, "tar stream is closed"));
        };

        if self.done {
            return Ok(None);
        }

        // Move past the data of the member returned last time
        skip_exact(reader, self.remaining)?;
        self.position += self.remaining;
        self.remaining = 0;

        let mut overrides = Overrides::default();
        // set by any record that describes the next member; global pax headers don't count
        let mut has_extensions = false;

        loop {
            let mut header = Header::new_old();
            if !read_exactish(reader, header.as_mut_bytes())? {
                check_no_orphans(has_extensions, self.position)?;
                debug!(
                    "tar stream ended without end-of-archive marker at offset {}",
                    self.position
                );
                self.done = true;
                return Ok(None);
            }
            let offset = self.position;
            self.position += TAR_BLOCK_SIZE;

            if header.as_bytes() == &[0u8; 512] {
                if self.options.ignore_zeros {
                    trace!("skipping zero block at offset {offset}");
                    continue;
                }
                check_no_orphans(has_extensions, offset)?;
                debug!("end-of-archive marker at offset {offset}");
                self.done = true;
                return Ok(None);
            }

            verify_checksum(&header, offset)?;

            let entry_type = header.entry_type();
            if entry_type.is_gnu_longname()
                || entry_type.is_gnu_longlink()
                || entry_type.is_pax_local_extensions()
                || entry_type.is_pax_global_extensions()
            {
                let size = header.entry_size()?;
                if size > MAX_EXTENSION_SIZE {
                    return Err(io::Error::new(
                        ErrorKind::InvalidData,
                        format!(
                            "oversized {entry_type:?} record ({size} bytes) at offset {offset}"
                        ),
                    ));
                }

                let stored_size = padded_size(size, offset)?;
                let content = read_vec(reader, size)?;
                skip_exact(reader, stored_size - size)?;
                self.position += stored_size;

                has_extensions |= !entry_type.is_pax_global_extensions();
                if entry_type.is_gnu_longname() {
                    overrides.name = Some(trim_nul(content));
                } else if entry_type.is_gnu_longlink() {
                    overrides.link_name = Some(trim_nul(content));
                } else if entry_type.is_pax_local_extensions() {
                    overrides.apply_pax(&content)?;
                } else {
                    // Global PAX headers would apply to all following members; we don't track them.
                    trace!("skipping global pax header at offset {offset}");
                }
                continue;
            }

            let size = match overrides.size {
                Some(size) => size,
                None => header.entry_size()?,
            };
            self.remaining = padded_size(size, offset)?;

            let entry = raw_entry_from_header(header, overrides, size)?;
            trace!(
                "tar member {:?} ({:?}, {} bytes) at offset {offset}",
                entry.name,
                entry.entry_type,
                entry.size
            );
            return Ok(Some(entry));
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if self.reader.take().is_some() {
            debug!("closed tar stream after {} bytes", self.position);
        }
        self.done = true;
        Ok(())
    }
}
