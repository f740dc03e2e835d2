use crate::error::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom};

//===========================================================================//

// The most bytes a `PeekReader` can look ahead; enough for a PNG signature.
const PEEK_CAPACITY: usize = 8;

//===========================================================================//

/// Wraps a byte source, tracking the read position and seeking natively when
/// the source supports it.  Forward-only sources get forward seeks emulated by
/// reading and discarding.
pub(crate) struct StreamReader<R> {
    inner: R,
    pos: u64,
    seek_fn: Option<fn(&mut R, SeekFrom) -> io::Result<u64>>,
    can_seek: Option<bool>,
}

impl<R: Read> StreamReader<R> {
    /// Wraps a source that can only be read front to back.
    pub(crate) fn forward_only(inner: R) -> StreamReader<R> {
        StreamReader { inner, pos: 0, seek_fn: None, can_seek: Some(false) }
    }

    /// Returns true if the source can seek natively, in both directions.
    /// The first call probes the source with a zero-length relative seek;
    /// the answer is cached after that.
    pub(crate) fn can_seek(&mut self) -> bool {
        if let Some(can_seek) = self.can_seek {
            return can_seek;
        }
        // A type implementing `Seek` doesn't guarantee seeking actually works
        // (a pipe opened as a file, say) until it's been tried.
        let can_seek = match self.seek_fn {
            Some(seek_fn) => seek_fn(&mut self.inner, SeekFrom::Current(0)).is_ok(),
            None => false,
        };
        if !can_seek {
            tracing::debug!("Source can't seek; falling back to forward reads");
        }
        self.can_seek = Some(can_seek);
        can_seek
    }

    /// Moves to a new position.  Only `SeekFrom::Start` and
    /// `SeekFrom::Current` are accepted; without native seeking, the target
    /// must not be behind the current position.
    pub(crate) fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => match self.pos.checked_add_signed(delta) {
                Some(target) => target,
                None => unsupported!("overlapping offset"),
            },
            SeekFrom::End(_) => unsupported!("seeking from the end"),
        };
        if self.can_seek() {
            if let Some(seek_fn) = self.seek_fn {
                self.pos = seek_fn(&mut self.inner, SeekFrom::Start(target))
                    .map_err(Error::Io)?;
                return Ok(self.pos);
            }
        }
        if target < self.pos {
            unsupported!("overlapping offset");
        }
        let gap = target - self.pos;
        let skipped = io::copy(&mut (&mut self.inner).take(gap), &mut io::sink())
            .map_err(Error::Io)?;
        self.pos += skipped;
        if skipped < gap {
            return Err(Error::Truncated);
        }
        Ok(self.pos)
    }
}

impl<R: Read + Seek> StreamReader<R> {
    /// Wraps a source that claims to support seeking.  Whether it really does
    /// is probed on first use.
    pub(crate) fn seekable(inner: R) -> StreamReader<R> {
        StreamReader { inner, pos: 0, seek_fn: Some(R::seek), can_seek: None }
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.pos += count as u64;
        Ok(count)
    }
}

//===========================================================================//

/// A reader that can look at its next few bytes without consuming them.
pub(crate) struct PeekReader<R> {
    inner: R,
    buffer: [u8; PEEK_CAPACITY],
    start: usize,
    end: usize,
}

impl<R: Read> PeekReader<R> {
    pub(crate) fn new(inner: R) -> PeekReader<R> {
        PeekReader { inner, buffer: [0; PEEK_CAPACITY], start: 0, end: 0 }
    }

    /// Returns the next `len` bytes without consuming them.  Fails with
    /// `Error::Truncated` if the source ends first.
    pub(crate) fn peek(&mut self, len: usize) -> Result<&[u8]> {
        debug_assert!(len <= PEEK_CAPACITY);
        if self.start > 0 {
            self.buffer.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        while self.end < len {
            match self.inner.read(&mut self.buffer[self.end..]) {
                Ok(0) => return Err(Error::Truncated),
                Ok(count) => self.end += count,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(&self.buffer[..len])
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.start < self.end {
            let count = buf.len().min(self.end - self.start);
            buf[..count]
                .copy_from_slice(&self.buffer[self.start..self.start + count]);
            self.start += count;
            return Ok(count);
        }
        self.inner.read(buf)
    }
}

/// Reads and discards exactly `len` bytes.
pub(crate) fn skip<R: Read>(reader: &mut R, len: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if skipped < len {
        return Err(Error::Truncated);
    }
    Ok(())
}

//===========================================================================//


//===========================================================================//
