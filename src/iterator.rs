//! Lazy, single-pass iteration over archive entries.
//!
//! [`TarEntryIterator`] turns a [`RawEntrySource`] into a sequence of [`ArchiveEntry`] values.
//! It always holds one converted entry of lookahead, so [`has_next_entry()`] can answer without
//! touching the stream, and it remembers the entry it returned last as the current entry.
//!
//! If reading the lookahead entry fails, [`next_entry()`] reports the error instead of the entry
//! it was about to return.  That entry is still available from [`current_entry()`], and the
//! iterator is exhausted from then on: no entry is ever returned twice and the stream is not read
//! again.
//!
//! [`has_next_entry()`]: TarEntryIterator::has_next_entry
//! [`next_entry()`]: TarEntryIterator::next_entry
//! [`current_entry()`]: TarEntryIterator::current_entry

use std::io::Read;

use log::{debug, trace};

use crate::{
    entry::{ArchiveEntry, FilePermissions},
    error::Result,
    stream::{RawEntrySource, RawTarEntry, TarStream},
};

/// Pull-style iteration over the entries of an archive, independent of the archive format.
pub trait ArchiveEntryIterator {
    /// Returns true if [`next_entry()`](Self::next_entry) will return another entry.  Never
    /// performs I/O.
    fn has_next_entry(&self) -> bool;

    /// Returns the next entry, or `None` once the archive is exhausted.
    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>>;

    /// Releases the underlying stream.
    fn close(&mut self) -> Result<()>;
}

/// Converts a raw tar member into an [`ArchiveEntry`].
///
/// The permission bits are the raw mode masked to
/// [`FULL_PERMISSION_BITS`](crate::entry::FULL_PERMISSION_BITS).  The raw entry is attached as the
/// entry object and can be recovered with `entry.entry_object::<RawTarEntry>()`.
pub fn archive_entry_from_tar(raw: RawTarEntry) -> ArchiveEntry {
    let mut entry = ArchiveEntry::new(raw.name.clone(), raw.is_directory(), raw.mtime, raw.size);
    entry.set_permissions(FilePermissions::from_mode(raw.mode));
    entry.set_owner(raw.user_name.clone());
    entry.set_group(raw.group_name.clone());
    entry.set_entry_object(raw);
    entry
}

fn fetch_entry(stream: &mut impl RawEntrySource) -> Result<Option<ArchiveEntry>> {
    Ok(stream.next_raw_entry()?.map(archive_entry_from_tar))
}

/// An [`ArchiveEntryIterator`] over a tar stream.
pub struct TarEntryIterator<S: RawEntrySource> {
    stream: S,
    closed: bool,
    /// The entry the next call to next_entry() returns; None once exhausted
    pending: Option<ArchiveEntry>,
    /// The entry next_entry() returned last
    current: Option<ArchiveEntry>,
}

impl<R: Read> TarEntryIterator<TarStream<R>> {
    /// Iterates over the tar archive read from `reader`, with default [`TarStream`] options.
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::new(TarStream::new(reader))
    }
}

impl<S: RawEntrySource> TarEntryIterator<S> {
    /// Takes ownership of `stream` and reads the first entry from it.
    ///
    /// If that read fails the stream is dropped and the error returned.
    pub fn new(mut stream: S) -> Result<Self> {
        let pending = fetch_entry(&mut stream)?;
        if pending.is_none() {
            debug!("archive has no entries");
        }

        Ok(TarEntryIterator {
            stream,
            closed: false,
            pending,
            current: None,
        })
    }

    /// The entry most recently returned by [`next_entry()`](Self::next_entry), which is where the
    /// underlying stream is logically positioned.
    pub fn current_entry(&self) -> Option<&ArchiveEntry> {
        self.current.as_ref()
    }

    /// The stream this iterator was created from.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn has_next_entry(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let Some(entry) = self.pending.take() else {
            return Ok(None);
        };
        trace!("next archive entry {:?}", entry.path());
        self.current = Some(entry.clone());

        // pending stays empty if this fails, which ends the iteration
        self.pending = fetch_entry(&mut self.stream).inspect_err(|err| {
            debug!("reading the entry after {:?} failed: {err}", entry.path());
        })?;

        Ok(Some(entry))
    }

    /// Closes the underlying stream.  Only the first call reaches the stream; later calls succeed
    /// without doing anything.  The iterator is exhausted afterwards.
    pub fn close(&mut self) -> Result<()> {
        self.pending = None;
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        debug!("closing archive entry iterator");
        self.stream.close()?;
        Ok(())
    }
}

impl<S: RawEntrySource> ArchiveEntryIterator for TarEntryIterator<S> {
    fn has_next_entry(&self) -> bool {
        TarEntryIterator::has_next_entry(self)
    }

    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        TarEntryIterator::next_entry(self)
    }

    fn close(&mut self) -> Result<()> {
        TarEntryIterator::close(self)
    }
}

/// Yields the same sequence as repeated calls to [`next_entry()`](TarEntryIterator::next_entry):
/// entries, at most one error, then `None`.
impl<S: RawEntrySource> Iterator for TarEntryIterator<S> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
