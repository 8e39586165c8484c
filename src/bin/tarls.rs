use std::{
    fs::File,
    io::{self, BufReader, Read, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use tar::EntryType;

use tar_entries::{
    ArchiveEntry, ArchiveEntryIterator, RawTarEntry, TarEntryIterator, TarStream, TarStreamOptions,
};

/// tarls
#[derive(Debug, Parser)]
#[clap(name = "tarls", version)]
pub struct App {
    /// the tar archive to list, standard input if omitted
    archive: Option<PathBuf>,
    /// show type, permissions, owner, size and modification time of each entry
    #[clap(short, long)]
    long: bool,
    /// keep reading past end-of-archive markers, for concatenated archives
    #[clap(long)]
    ignore_zeros: bool,
}

fn type_char(entry: &ArchiveEntry) -> char {
    if entry.is_directory() {
        return 'd';
    }
    match entry.entry_object::<RawTarEntry>().map(|raw| raw.entry_type) {
        Some(EntryType::Symlink) => 'l',
        Some(EntryType::Link) => 'h',
        Some(EntryType::Char) => 'c',
        Some(EntryType::Block) => 'b',
        Some(EntryType::Fifo) => 'p',
        _ => '-',
    }
}

fn write_entry(out: &mut impl Write, entry: &ArchiveEntry, long: bool) -> io::Result<()> {
    if !long {
        return writeln!(out, "{}", entry.path());
    }

    write!(
        out,
        "{}{} {}/{} {:>10} {:>11} {}",
        type_char(entry),
        entry.permissions(),
        entry.owner(),
        entry.group(),
        entry.size(),
        entry.mtime(),
        entry.path()
    )?;
    if let Some(target) = entry
        .entry_object::<RawTarEntry>()
        .and_then(|raw| raw.link_name.as_deref())
    {
        write!(out, " -> {target}")?;
    }
    writeln!(out)
}

fn list(entries: &mut impl ArchiveEntryIterator, long: bool, out: &mut impl Write) -> Result<()> {
    while let Some(entry) = entries.next_entry()? {
        write_entry(out, &entry, long)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    let reader: Box<dyn Read> = match &args.archive {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {path:?}"))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let options = TarStreamOptions {
        ignore_zeros: args.ignore_zeros,
    };

    let mut entries = TarEntryIterator::new(TarStream::with_options(reader, options))
        .context("Failed to read the first archive entry")?;

    let listed = list(&mut entries, args.long, &mut io::stdout().lock());
    // close even if listing failed, but report the listing error first
    let closed = entries.close();
    listed?;
    closed.context("Failed to close the archive")?;

    Ok(())
}
