//! Leaf sources and the shared random-access contract

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{ReadError, SourceError};

/// A fixed-size byte source readable at explicit offsets.
///
/// `read_at` fills `buf` with the bytes starting at `offset`:
/// - `Ok(buf.len())` when the whole buffer was filled
/// - `Err(ShortRead { read })` when the source ended after `read` bytes
/// - `Err(Io { read, .. })` when the underlying storage failed
///
/// Reads never move shared state, so one instance may serve concurrent
/// readers.
pub trait RandomAccessSource: Send + Sync {
    /// Total length in bytes
    fn size(&self) -> u64;

    /// Positioned read, see the trait documentation for the result contract
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ReadError>;
}

impl<T: RandomAccessSource + ?Sized> RandomAccessSource for Box<T> {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ReadError> {
        (**self).read_at(buf, offset)
    }
}

impl<T: RandomAccessSource + ?Sized> RandomAccessSource for Arc<T> {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ReadError> {
        (**self).read_at(buf, offset)
    }
}

/// Number of bytes a read of `buf_len` at `offset` can take from a source of `size`
fn readable(size: u64, buf_len: usize, offset: u64) -> usize {
    let remaining = size.saturating_sub(offset);
    (buf_len as u64).min(remaining) as usize
}

/// One file on disk, read with positioned I/O.
///
/// The size is captured when the file is opened. A file that shrinks
/// afterwards produces an `UnexpectedEof` I/O error rather than a short
/// read, since the advertised size can no longer be honoured.
#[derive(Debug)]
pub struct FilePart {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FilePart {
    /// Open and stat `path`. Directories are rejected.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source: io::Error| SourceError::PartOpenFailed {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(open_failed)?;
        let metadata = file.metadata().map_err(open_failed)?;
        if metadata.is_dir() {
            return Err(open_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            )));
        }

        Ok(Self {
            size: metadata.len(),
            path,
            file,
        })
    }

    /// Path the part was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

impl RandomAccessSource for FilePart {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ReadError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let want = readable(self.size, buf.len(), offset);
        let mut read = 0;
        while read < want {
            match self.pread(&mut buf[read..want], offset + read as u64) {
                Ok(0) => {
                    return Err(ReadError::Io {
                        read,
                        source: io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("{} shrank below {} bytes", self.path.display(), self.size),
                        ),
                    });
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(ReadError::Io { read, source }),
            }
        }

        if read < buf.len() {
            Err(ReadError::ShortRead { read })
        } else {
            Ok(read)
        }
    }
}

/// In-memory byte buffer
#[derive(Debug, Clone)]
pub struct MemoryPart {
    data: Arc<[u8]>,
}

impl MemoryPart {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::from(data.into()),
        }
    }
}

impl RandomAccessSource for MemoryPart {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ReadError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let n = readable(self.size(), buf.len(), offset);
        if n > 0 {
            let start = offset as usize;
            buf[..n].copy_from_slice(&self.data[start..start + n]);
        }

        if n < buf.len() {
            Err(ReadError::ShortRead { read: n })
        } else {
            Ok(n)
        }
    }
}

/// Open every path in order as a [`FilePart`].
///
/// The first failure aborts the whole list; a missing part would shift the
/// offsets of every part after it.
pub fn open_parts<I, P>(paths: I) -> Result<Vec<Box<dyn RandomAccessSource>>, SourceError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .map(|p| FilePart::open(p).map(|part| Box::new(part) as Box<dyn RandomAccessSource>))
        .collect()
}
