//! Virtual concatenation of random-access sources

use std::fmt;
use std::io;
use std::path::Path;

use super::error::{ReadError, SourceError};
use super::part::{open_parts, RandomAccessSource};

/// A part together with its logical start offset
struct Entry {
    start: u64,
    size: u64,
    source: Box<dyn RandomAccessSource>,
}

impl Entry {
    fn end(&self) -> u64 {
        self.start + self.size
    }
}

/// Several sources presented as one seekable stream.
///
/// Start offsets are the prefix sums of the part sizes, fixed at
/// construction. The composite is immutable afterwards, so concurrent
/// `read_at` calls need no locking.
pub struct CompositeSource {
    entries: Vec<Entry>,
    size: u64,
}

impl CompositeSource {
    /// Build a composite over `parts`, in order. An empty list yields a
    /// zero-size source.
    pub fn new<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn RandomAccessSource>>,
    {
        let mut offset = 0u64;
        let entries: Vec<Entry> = parts
            .into_iter()
            .map(|source| {
                let size = source.size();
                let entry = Entry {
                    start: offset,
                    size,
                    source,
                };
                offset += size;
                entry
            })
            .collect();

        tracing::debug!(parts = entries.len(), size = offset, "Built composite source");

        Self {
            entries,
            size: offset,
        }
    }

    /// Open every path as a file part and concatenate them.
    ///
    /// Fails as a whole when any part cannot be opened.
    pub fn open<I, P>(paths: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Ok(Self::new(open_parts(paths)?))
    }

    pub fn part_count(&self) -> usize {
        self.entries.len()
    }

    /// Index of the first part whose end lies beyond `offset`
    fn locate(&self, offset: u64) -> usize {
        self.entries.partition_point(|entry| entry.end() <= offset)
    }
}

impl RandomAccessSource for CompositeSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ReadError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut index = self.locate(offset);
        let mut part_offset = match self.entries.get(index) {
            Some(entry) => offset - entry.start,
            None => return Err(ReadError::ShortRead { read: 0 }),
        };

        let mut written = 0;
        while written < buf.len() && index < self.entries.len() {
            let entry = &self.entries[index];
            let len = ((buf.len() - written) as u64).min(entry.size - part_offset) as usize;

            if len > 0 {
                match entry.source.read_at(&mut buf[written..written + len], part_offset) {
                    Ok(n) => written += n,
                    Err(ReadError::ShortRead { read }) => {
                        // The part ended before its advertised size
                        return Err(ReadError::Io {
                            read: written + read,
                            source: io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                format!("part {} ended early", index),
                            ),
                        });
                    }
                    Err(e) => return Err(e.after(written)),
                }
            }

            index += 1;
            part_offset = 0;
        }

        if written < buf.len() {
            Err(ReadError::ShortRead { read: written })
        } else {
            Ok(written)
        }
    }
}

impl fmt::Debug for CompositeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSource")
            .field("parts", &self.entries.len())
            .field("size", &self.size)
            .finish()
    }
}
