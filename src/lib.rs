//! Lazy iteration over the entries of tar archives.
//!
//! A [`TarStream`] reads raw member descriptors from any [`std::io::Read`], and a
//! [`TarEntryIterator`] turns them, one entry ahead, into format-agnostic [`ArchiveEntry`]
//! values:
//!
//! ```no_run
//! use tar_entries::TarEntryIterator;
//!
//! # fn main() -> tar_entries::Result<()> {
//! let mut entries = TarEntryIterator::from_reader(std::io::stdin())?;
//! while let Some(entry) = entries.next_entry()? {
//!     println!("{} {}", entry.permissions(), entry.path());
//! }
//! entries.close()?;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod error;
pub mod iterator;
pub mod stream;

mod util;

pub use entry::{ArchiveEntry, FilePermissions};
pub use error::{Error, Result};
pub use iterator::{ArchiveEntryIterator, TarEntryIterator};
pub use stream::{RawEntrySource, RawTarEntry, TarStream, TarStreamOptions};
