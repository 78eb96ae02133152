//! Record Store Reader
//!
//! Scoped byte-range reads from the record store file.
//!
//! Every [`RecordStore::read_range`] call opens its own file handle, seeks, reads,
//! and drops the handle. No cursor is shared between calls, so any number of
//! in-flight requests can read disjoint or overlapping ranges concurrently.
//!
//! ```ignore
//! let store = RecordStore::open("./data/phones.json").await?;
//! let range = locator.locate(42)?;
//! let bytes = store.read_range(range).await?;
//! ```

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::Result;
use crate::locator::ByteRange;

/// Handle to the record store file
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Open the store, failing if the path is not a readable file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )
            .into());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the store in bytes
    pub async fn len(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Read the bytes in `range`. A range running past end-of-file yields the
    /// bytes that exist, possibly none.
    pub async fn read_range(&self, range: ByteRange) -> Result<Bytes> {
        let mut file = File::open(&self.path).await?;
        let file_len = file.metadata().await?.len();

        if range.is_empty() || range.start >= file_len {
            return Ok(Bytes::new());
        }

        let available = range.len().min(file_len - range.start);
        file.seek(SeekFrom::Start(range.start)).await?;

        let mut buf = Vec::with_capacity(available as usize);
        file.take(available).read_to_end(&mut buf).await?;

        Ok(Bytes::from(buf))
    }

    /// Read up to `len` bytes from the start of the store
    pub async fn read_head(&self, len: u64) -> Result<Bytes> {
        self.read_range(ByteRange::new(0, len)).await
    }
}
