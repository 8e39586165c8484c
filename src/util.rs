//! Small read helpers for block-oriented streams.
//!
//! Tar data arrives in fixed size blocks and member data is skipped rather than seeked over, so
//! these helpers distinguish a clean end of stream from a truncated one.

use std::io::{self, Error, ErrorKind, Read, Result};

/// This function reads the exact amount of bytes required to fill the buffer, possibly performing
/// multiple reads to do so (and also retrying if required to deal with EINTR).
///
/// The "-ish" is that, unlike the standard Read::read_exact() method, it's possible to determine
/// the difference between an incomplete read (where some amount of bytes were read, but the buffer
/// wasn't filled) and a "clean" EOF where an EOF occurred immediately with no data read at all,
/// which is still considered to be a success.
///
/// # Return value
///
/// There are four possible return values:
///
///  - in case the requested number of bytes were successfully read into the buffer, returns
///    Ok(true)
///  - in case of a "clean" EOF where the stream ends immediately, the function returns
///    Ok(false)
///  - in case of an unexpected EOF after some bytes were read, the function returns an Error with
///    ErrorKind::UnexpectedEof
///  - in case of underlying errors from the Read implementation, the error is returned directly
pub(crate) fn read_exactish(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let buflen = buf.len();
    let mut todo: &mut [u8] = buf;

    while !todo.is_empty() {
        match reader.read(todo) {
            Ok(0) => {
                return match todo.len() {
                    s if s == buflen => Ok(false), // clean EOF
                    _ => Err(Error::from(ErrorKind::UnexpectedEof)),
                };
            }
            Ok(n) => todo = &mut todo[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(true)
}

/// Reads and discards exactly `count` bytes.
///
/// Running out of data before `count` bytes were consumed is an ErrorKind::UnexpectedEof error.
pub(crate) fn skip_exact(reader: &mut impl Read, count: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.take(count), &mut io::sink())?;
    if skipped != count {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!("expected {count} bytes of member data, stream ended after {skipped}"),
        ));
    }
    Ok(())
}

/// Reads exactly `count` bytes into a freshly allocated buffer.
pub(crate) fn read_vec(reader: &mut impl Read, count: u64) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.take(count).read_to_end(&mut buffer)?;
    if buffer.len() as u64 != count {
        return Err(ErrorKind::UnexpectedEof.into());
    }
    Ok(buffer)
}
